//! Navigation handlers and the registry that routes each kind to one.
//!
//! The default handlers only describe the action; executing it (opening a
//! tree node, launching a browser) is up to the embedding application.

use std::collections::HashMap;

use crate::resolver::percent_decode;
use crate::types::{Action, LinkResult, ReferenceKind, RequestContext, ResolvedTarget};

/// Executes the navigation action for one reference kind.
pub trait LinkHandler: Send + Sync {
    /// Produce the result for a link that already passed validation.
    fn handle(&self, ctx: &RequestContext, target: &ResolvedTarget) -> LinkResult;
}

/// Maps each kind to at most one handler. A missing entry is a normal condition.
#[derive(Default)]
pub struct HandlerRegistry {
    /// Registered handlers keyed by kind.
    handlers: HashMap<ReferenceKind, Box<dyn LinkHandler>>,
}

impl HandlerRegistry {
    /// The handler registered for `kind`, if any.
    pub fn get(&self, kind: ReferenceKind) -> Option<&dyn LinkHandler> {
        return self.handlers.get(&kind).map(|h| return h.as_ref());
    }

    /// Register `handler` for `kind`, replacing any previous one.
    pub fn insert(&mut self, kind: ReferenceKind, handler: Box<dyn LinkHandler>) {
        self.handlers.insert(kind, handler);
    }

    /// Registry with a handler for every kind except `Unknown`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.insert(ReferenceKind::Anchor, Box::new(AnchorHandler));
        registry.insert(ReferenceKind::Diagram, Box::new(ViewerHandler(Action::OpenDiagram)));
        registry.insert(ReferenceKind::Directory, Box::new(DirectoryHandler));
        registry.insert(ReferenceKind::ExternalHttp, Box::new(ExternalHandler));
        registry.insert(ReferenceKind::FileProtocol, Box::new(DocumentHandler));
        registry.insert(ReferenceKind::Image, Box::new(ViewerHandler(Action::OpenImage)));
        registry.insert(ReferenceKind::RelativeDocument, Box::new(DocumentHandler));
        registry.insert(ReferenceKind::TableOfContentsEntry, Box::new(TocHandler));
        return registry;
    }
}

/// `#section` → scroll the current document.
pub struct AnchorHandler;

impl LinkHandler for AnchorHandler {
    fn handle(&self, ctx: &RequestContext, _target: &ResolvedTarget) -> LinkResult {
        let id = decode_anchor(ctx.href.trim().trim_start_matches('#'));
        return LinkResult::ok(Action::ScrollToAnchor).with_payload("id", id);
    }
}

/// Reveal a resolved directory.
pub struct DirectoryHandler;

impl LinkHandler for DirectoryHandler {
    fn handle(&self, _ctx: &RequestContext, target: &ResolvedTarget) -> LinkResult {
        return LinkResult::ok(Action::OpenDirectory).with_payload("path", target_text(target));
    }
}

/// Open a resolved markdown document.
pub struct DocumentHandler;

impl LinkHandler for DocumentHandler {
    fn handle(&self, _ctx: &RequestContext, target: &ResolvedTarget) -> LinkResult {
        return LinkResult::ok(Action::OpenDocument).with_payload("path", target_text(target));
    }
}

/// Hand a validated web or mail link to the system.
pub struct ExternalHandler;

impl LinkHandler for ExternalHandler {
    fn handle(&self, ctx: &RequestContext, _target: &ResolvedTarget) -> LinkResult {
        return LinkResult::ok(Action::OpenExternal).with_payload("url", ctx.href.clone());
    }
}

/// Table-of-contents entries: cross-document when given a `TocEntry`,
/// otherwise a scroll within the current document.
pub struct TocHandler;

impl LinkHandler for TocHandler {
    fn handle(&self, ctx: &RequestContext, target: &ResolvedTarget) -> LinkResult {
        if let ResolvedTarget::TocEntry { fragment, path } = target {
            // A fragment may itself contain `#`; only what follows the first one counts.
            let fragment = fragment.split_once('#').map_or(fragment.as_str(), |(_, rest)| return rest);
            let anchor = decode_anchor(fragment.trim_start_matches('#'));
            let mut result =
                LinkResult::ok(Action::OpenDocument).with_payload("path", path.display().to_string());
            if !anchor.is_empty() {
                result = result.with_payload("anchor", anchor);
            }
            return result;
        }

        let fragment = ctx.href.split_once('#').map_or(ctx.href.as_str(), |(_, rest)| return rest);
        return LinkResult::ok(Action::ScrollToAnchor).with_payload("id", decode_anchor(fragment));
    }
}

/// Images and diagrams: the viewer receives the href as written.
pub struct ViewerHandler(
    /// Viewer action to report.
    pub Action,
);

impl LinkHandler for ViewerHandler {
    fn handle(&self, _ctx: &RequestContext, target: &ResolvedTarget) -> LinkResult {
        return LinkResult::ok(self.0).with_payload("path", target_text(target));
    }
}

/// Percent-decode an anchor id so it matches the heading slug, keeping the
/// raw text if the escapes do not decode.
fn decode_anchor(raw: &str) -> String {
    return percent_decode(raw).unwrap_or_else(|_err| return raw.to_string());
}

/// The target rendered as the single string a payload carries.
fn target_text(target: &ResolvedTarget) -> String {
    return match target {
        ResolvedTarget::Path(path) | ResolvedTarget::TocEntry { path, .. } => path.display().to_string(),
        ResolvedTarget::Raw(text) | ResolvedTarget::Url(text) => text.clone(),
    };
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "tests")]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn raw(ctx: &RequestContext) -> ResolvedTarget {
        return ResolvedTarget::Raw(ctx.href.clone());
    }

    #[test]
    fn anchor_strips_hash_and_decodes() {
        let ctx = RequestContext::new("#%E7%AE%80%E4%BB%8B");
        let result = AnchorHandler.handle(&ctx, &raw(&ctx));
        assert_eq!(result.action, Action::ScrollToAnchor);
        assert_eq!(result.payload.get("id").map(String::as_str), Some("简介"));
    }

    #[test]
    fn anchor_ignores_surrounding_whitespace() {
        let ctx = RequestContext::new("  #intro ");
        let result = AnchorHandler.handle(&ctx, &raw(&ctx));
        assert_eq!(result.payload.get("id").map(String::as_str), Some("intro"));
    }

    #[test]
    fn toc_cross_document() {
        let ctx = RequestContext::new("guide.md#setup");
        let target = ResolvedTarget::TocEntry {
            fragment: "setup".to_string(),
            path: PathBuf::from("/docs/guide.md"),
        };
        let result = TocHandler.handle(&ctx, &target);
        assert_eq!(result.action, Action::OpenDocument);
        assert_eq!(result.payload.get("path").map(String::as_str), Some("/docs/guide.md"));
        assert_eq!(result.payload.get("anchor").map(String::as_str), Some("setup"));
    }

    #[test]
    fn toc_fragment_with_second_hash_keeps_tail() {
        let ctx = RequestContext::new("guide.md#a#b");
        let target = ResolvedTarget::TocEntry {
            fragment: "a#b".to_string(),
            path: PathBuf::from("/docs/guide.md"),
        };
        let result = TocHandler.handle(&ctx, &target);
        assert_eq!(result.payload.get("anchor").map(String::as_str), Some("b"));
    }

    #[test]
    fn toc_empty_fragment_has_no_anchor() {
        let ctx = RequestContext::new("guide.md#");
        let target = ResolvedTarget::TocEntry {
            fragment: String::new(),
            path: PathBuf::from("/docs/guide.md"),
        };
        let result = TocHandler.handle(&ctx, &target);
        assert!(!result.payload.contains_key("anchor"));
    }

    #[test]
    fn toc_fallback_scrolls_to_fragment() {
        let ctx = RequestContext::new("docs/guide.md#intro");
        let result = TocHandler.handle(&ctx, &raw(&ctx));
        assert_eq!(result.action, Action::ScrollToAnchor);
        assert_eq!(result.payload.get("id").map(String::as_str), Some("intro"));
    }

    #[test]
    fn registry_defaults_cover_all_but_unknown() {
        let registry = HandlerRegistry::with_defaults();
        assert!(registry.get(ReferenceKind::Unknown).is_none());
        assert!(registry.get(ReferenceKind::Image).is_some());
        assert!(registry.get(ReferenceKind::TableOfContentsEntry).is_some());
    }
}
