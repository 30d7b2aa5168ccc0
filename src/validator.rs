//! Fail-closed security validation of resolved link targets.
//!
//! Rule order for paths is fixed: forbidden patterns, depth, drive, existence,
//! readability. The shape rules run before any filesystem call, so a deep or
//! forbidden path is denied whether or not it exists.

use std::path::{Component, Path};

use crate::policy::SecurityPolicy;
use crate::resolver::normalize_path;
use crate::types::{ReasonCode, ResolvedTarget, ValidationOutcome};

/// Validate a resolved target against `policy`.
pub fn validate(target: &ResolvedTarget, policy: &SecurityPolicy) -> ValidationOutcome {
    return validate_with_origin(target, None, policy);
}

/// Validate a resolved target, also matching forbidden patterns against the
/// href it was resolved from. Canonicalization can collapse a forbidden
/// substring such as `..`; the origin still carries it.
pub fn validate_with_origin(
    target: &ResolvedTarget,
    origin: Option<&str>,
    policy: &SecurityPolicy,
) -> ValidationOutcome {
    let outcome = match target {
        ResolvedTarget::Path(path) | ResolvedTarget::TocEntry { path, .. } => {
            validate_path(path, origin, policy)
        },
        ResolvedTarget::Url(url) => validate_url(url, policy),
        ResolvedTarget::Raw(_) => ValidationOutcome::allow(),
    };
    if !outcome.allowed {
        tracing::warn!(
            reason = %outcome.reason,
            message = %outcome.message,
            details = ?outcome.details,
            "link target denied"
        );
    }
    return outcome;
}

/// Segments below the root or drive anchor.
fn depth_of(path: &Path) -> usize {
    let mut depth = 0_usize;
    for (index, component) in path.components().enumerate() {
        let Component::Normal(segment) = component else {
            continue;
        };
        if index == 0 && drive_segment(segment.to_str().unwrap_or("")).is_some() {
            continue;
        }
        depth = depth.saturating_add(1);
    }
    return depth;
}

/// The drive prefix of `path`, if it has one: a Windows prefix component,
/// or a leading `X:` segment when a Windows path is handled on POSIX.
fn drive_of(path: &Path) -> Option<String> {
    return match path.components().next()? {
        Component::Prefix(prefix) => Some(prefix.as_os_str().to_string_lossy().into_owned()),
        Component::Normal(first) => drive_segment(first.to_str()?).map(str::to_string),
        Component::CurDir | Component::ParentDir | Component::RootDir => None,
    };
}

/// `segment` itself when it is exactly `X:`.
fn drive_segment(segment: &str) -> Option<&str> {
    let mut chars = segment.chars();
    return match (chars.next(), chars.next(), chars.next()) {
        (Some(d), Some(':'), None) if d.is_ascii_alphabetic() => Some(segment),
        _ => None,
    };
}

/// Whether this process can read `path`: open it, or list it if it is a directory.
fn is_readable(path: &Path) -> bool {
    if path.is_dir() {
        return std::fs::read_dir(path).is_ok();
    }
    return std::fs::File::open(path).is_ok();
}

/// Path rules in order: patterns, depth, drive, existence, readability.
fn validate_path(path: &Path, origin: Option<&str>, policy: &SecurityPolicy) -> ValidationOutcome {
    let original = path.to_string_lossy();
    for pattern in &policy.security.forbidden_patterns {
        if pattern.is_empty() {
            continue;
        }
        let in_origin = origin.is_some_and(|o| return o.contains(pattern.as_str()));
        if in_origin || original.contains(pattern.as_str()) {
            return ValidationOutcome::deny(ReasonCode::SecurityBlocked, "forbidden pattern")
                .with_detail("pattern", pattern);
        }
    }

    let normalized = normalize_path(path);

    if let Some(max) = policy.max_path_depth() {
        let depth = depth_of(&normalized);
        if depth > max {
            return ValidationOutcome::deny(ReasonCode::SecurityBlocked, "max depth exceeded")
                .with_detail("depth", depth)
                .with_detail("max", max);
        }
    }

    let allowed_drives = &policy.windows_specific.drive_letters;
    if !allowed_drives.is_empty()
        && let Some(drive) = drive_of(&normalized)
        && !allowed_drives.iter().any(|d| return d.eq_ignore_ascii_case(&drive))
    {
        return ValidationOutcome::deny(ReasonCode::SecurityBlocked, "drive not allowed")
            .with_detail("drive", drive);
    }

    if policy.check_exists && !normalized.exists() {
        return ValidationOutcome::deny(ReasonCode::NotFound, "path not found")
            .with_detail("path", normalized.display());
    }

    if policy.check_acl && !is_readable(&normalized) {
        return ValidationOutcome::deny(ReasonCode::PermissionDenied, "no read permission")
            .with_detail("path", normalized.display());
    }

    return ValidationOutcome::allow();
}

/// URL rules: scheme allow-list, then the fail-closed domain allow-list for web links.
/// A web link that does not parse is denied; other unparseable text carries
/// no scheme and is allowed.
fn validate_url(url: &str, policy: &SecurityPolicy) -> ValidationOutcome {
    let Ok(parsed) = url::Url::parse(url) else {
        if has_web_scheme(url) {
            return ValidationOutcome::deny(ReasonCode::SecurityBlocked, "invalid url").with_detail("url", url);
        }
        return ValidationOutcome::allow();
    };
    let scheme = parsed.scheme();

    let protocols = &policy.security.allowed_protocols;
    if !protocols.is_empty() && !protocols.iter().any(|p| return p.eq_ignore_ascii_case(scheme)) {
        return ValidationOutcome::deny(ReasonCode::SecurityBlocked, "protocol not allowed")
            .with_detail("scheme", scheme);
    }

    if scheme != "http" && scheme != "https" {
        return ValidationOutcome::allow();
    }

    let host = parsed.host_str().unwrap_or("");
    let host_with_port = parsed.port().map(|port| return format!("{host}:{port}"));
    let domains = policy.security.allowed_domains.as_deref().unwrap_or(&[]);
    let listed = domains.iter().any(|d| {
        return d.eq_ignore_ascii_case(host)
            || host_with_port.as_deref().is_some_and(|hp| return d.eq_ignore_ascii_case(hp));
    });
    if !listed {
        return ValidationOutcome::deny(ReasonCode::SecurityBlocked, "domain not allowed")
            .with_detail("domain", host_with_port.as_deref().unwrap_or(host));
    }
    return ValidationOutcome::allow();
}

/// `http://` or `https://` in any case.
fn has_web_scheme(url: &str) -> bool {
    let lowered = url.trim_start().to_ascii_lowercase();
    return lowered.starts_with("http://") || lowered.starts_with("https://");
}
