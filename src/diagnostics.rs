use std::fmt::Write as _;

use crate::error::Error;
use crate::types::{LinkResult, ReasonCode, ReferenceKind};

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Print markdown to stderr with bold headings.
pub fn print_markdown(md: &str) {
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an engine error (policy loading, CLI input) as a markdown diagnostic.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::ConfigNotFound { path } => format!("\
# Error: Policy Not Found

`{}` does not exist.

## Fix

Point `--policy` at an existing file, or drop the flag to use `.linkgate.toml`
from the working directory.
", path.display()),

        Error::TomlDe(e) => format!("\
# Error: Invalid Policy

{e}

## Fix

Check the key types in `.linkgate.toml`; run `linkgate policy` to see the defaults.
"),

        _ => format!("\
# Error

{e}
"),
    };
}

/// Render a processed link as markdown: what happened and, on failure,
/// why and how to fix it.
pub fn render_result(href: &str, kind: ReferenceKind, result: &LinkResult) -> String {
    let mut out = if result.success {
        format!("\
# Link: {}

`{href}` ({kind})
", result.action)
    } else {
        let reason = result.reason.unwrap_or(ReasonCode::InternalError);
        format!("\
# Link Blocked: {reason}

`{href}` ({kind}): {}
", result.message)
    };

    if !result.payload.is_empty() {
        out.push_str("\n## Payload\n\n");
        for (key, value) in &result.payload {
            let _ = writeln!(out, "- {key}: `{value}`");
        }
    }

    if let Some(fix) = result.reason.and_then(fix_hint) {
        let _ = write!(out, "\n## Fix\n\n{fix}");
    }

    return out;
}

/// Remedy for each failure reason, when there is one to suggest.
fn fix_hint(reason: ReasonCode) -> Option<&'static str> {
    return match reason {
        ReasonCode::InternalError => Some("\
This is a bug in linkgate or in a registered handler. Re-run with
`RUST_LOG=linkgate=debug` and report the log.
"),
        ReasonCode::NotFound => Some("\
The target does not exist. Check the link text for typos, or set
`check_exists = false` in `.linkgate.toml` to allow dangling links.
"),
        ReasonCode::Ok => None,
        ReasonCode::PermissionDenied => Some("\
The target exists but is not readable by this process. Fix its permissions,
or set `check_acl = false` in `.linkgate.toml`.
"),
        ReasonCode::ResolveError => Some("\
The link could not be turned into a path. Check its percent-escapes and,
for `file://` links, the URL syntax.
"),
        ReasonCode::SecurityBlocked => Some("\
A policy rule denied the link. External hosts must be listed:

    [security]
    allowed_domains = [\"example.com\"]
"),
        ReasonCode::Unsupported => Some("\
No handler is registered for this kind of link.
"),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, ValidationOutcome};

    #[test]
    fn success_lists_payload() {
        let result = LinkResult::ok(Action::ScrollToAnchor).with_payload("id", "intro");
        let md = render_result("#intro", ReferenceKind::Anchor, &result);
        assert!(md.starts_with("# Link: scroll-to-anchor"));
        assert!(md.contains("- id: `intro`"));
        assert!(!md.contains("## Fix"));
    }

    #[test]
    fn denial_names_reason_and_fix() {
        let outcome = ValidationOutcome::deny(ReasonCode::SecurityBlocked, "domain not allowed");
        let result = LinkResult::denied(&outcome);
        let md = render_result("https://x.test", ReferenceKind::ExternalHttp, &result);
        assert!(md.starts_with("# Link Blocked: SECURITY_BLOCKED"));
        assert!(md.contains("domain not allowed"));
        assert!(md.contains("allowed_domains"));
    }
}
