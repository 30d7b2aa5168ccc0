//! Reference classification. Pure and total: every href gets exactly one kind.

use crate::types::{DIAGRAM_CONTAINER_HINT, ReferenceKind, RequestContext};

/// Extensions routed to the image viewer.
const IMAGE_EXTENSIONS: [&str; 6] = [".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp"];

/// Extensions routed to the diagram viewer.
const DIAGRAM_EXTENSIONS: [&str; 2] = [".mmd", ".mermaid"];

/// Markdown document extension.
pub const DOCUMENT_EXTENSION: &str = ".md";

/// Classify `href` in `context`. Rules are checked in a fixed order and the
/// first match wins, so `https://x/a.png` is external and `a.md#x` is a document.
pub fn classify(href: &str, context: &RequestContext) -> ReferenceKind {
    let h = href.trim().to_lowercase();

    if h.is_empty() {
        return ReferenceKind::Unknown;
    }
    if h.starts_with('#') {
        return ReferenceKind::Anchor;
    }
    if h.starts_with("mailto:") || is_web_url(&h) {
        return ReferenceKind::ExternalHttp;
    }
    if h.starts_with("file:///") || is_windows_absolute(&h) {
        return ReferenceKind::FileProtocol;
    }
    if IMAGE_EXTENSIONS.iter().any(|ext| return h.ends_with(ext)) {
        return ReferenceKind::Image;
    }
    if h.ends_with(DOCUMENT_EXTENSION) {
        return ReferenceKind::RelativeDocument;
    }
    if h.ends_with('/') || h.ends_with('\\') {
        return ReferenceKind::Directory;
    }
    if context.extension_flag(DIAGRAM_CONTAINER_HINT)
        || DIAGRAM_EXTENSIONS.iter().any(|ext| return h.ends_with(ext))
    {
        return ReferenceKind::Diagram;
    }
    if h.contains('#') {
        return ReferenceKind::TableOfContentsEntry;
    }
    return ReferenceKind::Unknown;
}

/// `X:` followed by a separator, e.g. `C:\docs` or `d:/notes`.
pub fn is_windows_absolute(s: &str) -> bool {
    let mut chars = s.chars();
    let (Some(drive), Some(colon), Some(sep)) = (chars.next(), chars.next(), chars.next()) else {
        return false;
    };
    return drive.is_ascii_alphabetic() && colon == ':' && (sep == '/' || sep == '\\');
}

/// `http://` or `https://`, case already folded by the caller.
fn is_web_url(h: &str) -> bool {
    return h.starts_with("http://") || h.starts_with("https://");
}
