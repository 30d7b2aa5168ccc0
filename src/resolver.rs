//! Turn path-like hrefs and `file://` URLs into canonical absolute paths.
//!
//! Nothing here touches the filesystem except to read the working directory
//! when no base document is known. Targets do not need to exist.

use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

use crate::classifier::is_windows_absolute;
use crate::error::Error;

/// Collapse `.` and `..` components and unify separators without touching the
/// filesystem. `..` never climbs above a root or drive. Idempotent:
/// `normalize_path(&normalize_path(p)) == normalize_path(p)`.
pub fn normalize_path(path: &Path) -> PathBuf {
    let unified = unify_separators(path);
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in unified.components() {
        push_normalized_component(&mut components, component);
    }
    if components.is_empty() {
        return PathBuf::from(".");
    }
    return components.iter().collect();
}

/// Percent-decode an href, rejecting escapes that do not form UTF-8.
///
/// # Errors
///
/// Returns `Error::InvalidPercentEncoding` if the decoded bytes are not UTF-8.
pub fn percent_decode(href: &str) -> Result<String, Error> {
    return percent_decode_str(href)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .map_err(|_err| {
            return Error::InvalidPercentEncoding {
                href: href.to_string(),
            };
        });
}

/// Resolve `file:///...` URLs and bare Windows absolute paths (`C:\docs\a.md`),
/// the two shapes the classifier files under the file protocol.
///
/// # Errors
///
/// Returns the errors of [`resolve_file_protocol`] for URL input.
pub fn resolve_file_reference(href: &str) -> Result<PathBuf, Error> {
    let trimmed = href.trim();
    if is_windows_absolute(trimmed) {
        return Ok(normalize_path(Path::new(trimmed)));
    }
    return resolve_file_protocol(trimmed);
}

/// Resolve a `file://` URL to a canonical path.
/// `file:///C:/docs/a.md` unwraps to `C:/docs/a.md`.
///
/// # Errors
///
/// Returns `Error::MalformedUrl` if the text is not a URL,
/// `Error::NotFileUrl` for any scheme other than `file`,
/// or `Error::InvalidPercentEncoding` if the path does not decode.
pub fn resolve_file_protocol(url: &str) -> Result<PathBuf, Error> {
    let parsed = url::Url::parse(url).map_err(|e| {
        return Error::MalformedUrl {
            url: url.to_string(),
            reason: e.to_string(),
        };
    })?;
    if parsed.scheme() != "file" {
        return Err(Error::NotFileUrl {
            scheme: parsed.scheme().to_string(),
            url: url.to_string(),
        });
    }

    let decoded = percent_decode(parsed.path())?;
    let raw = strip_drive_wrapper(&decoded);
    tracing::debug!(url, path = raw, "resolved file url");
    return Ok(normalize_path(Path::new(raw)));
}

/// Resolve `href` against the directory of `current_document`, or the working
/// directory when there is none.
///
/// The base directory and href are joined first and the combined path is
/// collapsed in one step, so chained `..` hops are measured from the real
/// base rather than from an already flattened intermediate.
///
/// # Errors
///
/// Returns `Error::InvalidPercentEncoding` if the href does not decode,
/// or `Error::Io` if the working directory cannot be read.
pub fn resolve_relative(current_document: Option<&Path>, href: &str) -> Result<PathBuf, Error> {
    let decoded = if href.contains('%') && !href.contains("://") {
        percent_decode(href)?
    } else {
        href.to_string()
    };

    let candidate = Path::new(&decoded);
    if candidate.is_absolute() || is_windows_absolute(&decoded) {
        return Ok(normalize_path(candidate));
    }

    let base_dir = match current_document.and_then(Path::parent) {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()?,
    };
    let combined = std::path::absolute(base_dir.join(candidate))?;
    let resolved = normalize_path(&combined);
    tracing::debug!(href, resolved = %resolved.display(), "resolved relative href");
    return Ok(resolved);
}

/// Whether the component list currently ends at an anchor `..` cannot climb past:
/// a root, a Windows prefix, or a leading `X:` segment.
fn ends_at_anchor(components: &[Component<'_>]) -> bool {
    return match components {
        [.., Component::RootDir | Component::Prefix(_)] => true,
        [Component::Normal(first)] => is_drive_segment(first.to_str().unwrap_or("")),
        _ => false,
    };
}

/// `C:` as a standalone segment, which is how a Windows drive appears on POSIX.
fn is_drive_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    return matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(d), Some(':'), None) if d.is_ascii_alphabetic()
    );
}

/// Handle a single path component during normalization.
/// Pops the last component for `..` when possible, drops it at an anchor,
/// and preserves it otherwise (leading `..` of a relative path).
fn push_normalized_component<'a>(components: &mut Vec<Component<'a>>, component: Component<'a>) {
    match component {
        Component::CurDir => {},
        Component::ParentDir => {
            if ends_at_anchor(components) {
                return;
            }
            let can_pop = matches!(components.last(), Some(Component::Normal(_)));
            if can_pop {
                components.pop();
            } else {
                components.push(component);
            }
        },
        other => components.push(other),
    }
}

/// `/C:/x` → `C:/x`; anything else unchanged.
fn strip_drive_wrapper(path: &str) -> &str {
    let Some(rest) = path.strip_prefix('/') else {
        return path;
    };
    let mut chars = rest.chars();
    return match (chars.next(), chars.next()) {
        (Some(d), Some(':')) if d.is_ascii_alphabetic() => rest,
        _ => path,
    };
}

/// Backslashes become `/` where the platform does not already treat them as separators.
fn unify_separators(path: &Path) -> PathBuf {
    if cfg!(windows) {
        return path.to_path_buf();
    }
    return match path.to_str() {
        Some(text) if text.contains('\\') => PathBuf::from(text.replace('\\', "/")),
        _ => path.to_path_buf(),
    };
}
