/// Core domain types for linkgate requests, targets, and outcomes.
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Extension key marking a reference as living inside a diagram container.
pub const DIAGRAM_CONTAINER_HINT: &str = "diagram_container";

/// Synthetic file name used as the base when only a directory is known.
/// Resolution takes the parent of the base, so the name itself never matters.
const DIRECTORY_ANCHOR_FILE: &str = "_base_.md";

/// What to do with a link, as reported back to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// No action; used by failures that have nothing to show.
    #[default]
    #[serde(rename = "")]
    None,
    /// Show the diagram viewer.
    OpenDiagram,
    /// Reveal a directory.
    OpenDirectory,
    /// Open a markdown document, optionally at an anchor.
    OpenDocument,
    /// Hand the link to the system browser or mail client.
    OpenExternal,
    /// Open an arbitrary non-document file.
    OpenFile,
    /// Show the image viewer.
    OpenImage,
    /// Scroll the current document to an anchor.
    ScrollToAnchor,
    /// Display an error instead of navigating.
    ShowError,
}

impl Action {
    /// The stable tag used in payloads, logs, and snapshots.
    pub const fn as_str(self) -> &'static str {
        return match self {
            Self::None => "",
            Self::OpenDiagram => "open-diagram",
            Self::OpenDirectory => "open-directory",
            Self::OpenDocument => "open-document",
            Self::OpenExternal => "open-external",
            Self::OpenFile => "open-file",
            Self::OpenImage => "open-image",
            Self::ScrollToAnchor => "scroll-to-anchor",
            Self::ShowError => "show-error",
        };
    }

    /// Whether following this action would navigate somewhere.
    pub const fn navigates(self) -> bool {
        return !matches!(self, Self::None | Self::ShowError);
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(self.as_str());
    }
}

/// Outcome of processing one link. A failed result never carries a
/// navigating action: see [`LinkResult::sanitized`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkResult {
    /// What the caller should do.
    pub action: Action,
    /// Human-readable explanation, empty on plain success.
    pub message: String,
    /// Action-specific data such as `path`, `url`, `id`, or `anchor`.
    pub payload: BTreeMap<String, String>,
    /// Why the link failed; `None` on success.
    pub reason: Option<ReasonCode>,
    /// Whether the link may be followed.
    pub success: bool,
}

impl LinkResult {
    /// A failure that surfaces a validation denial to the user.
    pub fn denied(outcome: &ValidationOutcome) -> Self {
        return Self {
            action: Action::ShowError,
            message: outcome.message.clone(),
            payload: BTreeMap::new(),
            reason: Some(outcome.reason),
            success: false,
        };
    }

    /// A failure raised inside the engine or one of its handlers.
    pub fn internal_error(message: impl Into<String>) -> Self {
        return Self {
            action: Action::None,
            message: message.into(),
            payload: BTreeMap::new(),
            reason: Some(ReasonCode::InternalError),
            success: false,
        };
    }

    /// A successful result carrying `action`.
    pub fn ok(action: Action) -> Self {
        return Self {
            action,
            message: String::new(),
            payload: BTreeMap::new(),
            reason: None,
            success: true,
        };
    }

    /// A failure to turn the href into a concrete target.
    pub fn resolve_error(message: impl Into<String>) -> Self {
        return Self {
            action: Action::ShowError,
            message: message.into(),
            payload: BTreeMap::new(),
            reason: Some(ReasonCode::ResolveError),
            success: false,
        };
    }

    /// Enforce that failures never navigate. A handler returning
    /// `success = false` with a navigating action is downgraded to an
    /// error display, and a missing reason becomes `InternalError`.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        if self.success {
            return self;
        }
        if self.action.navigates() {
            self.action = Action::ShowError;
        }
        if self.reason.is_none() || self.reason == Some(ReasonCode::Ok) {
            self.reason = Some(ReasonCode::InternalError);
        }
        return self;
    }

    /// No handler is registered for the kind.
    pub fn unsupported(kind: ReferenceKind) -> Self {
        return Self {
            action: Action::None,
            message: format!("no handler registered for {kind}"),
            payload: BTreeMap::new(),
            reason: Some(ReasonCode::Unsupported),
            success: false,
        };
    }

    /// Add one payload entry.
    #[must_use]
    pub fn with_payload(mut self, key: &str, value: impl Into<String>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        return self;
    }
}

/// Closed taxonomy of link failure reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// An unexpected fault inside the engine or a handler.
    InternalError,
    /// The target does not exist.
    NotFound,
    /// Allowed by policy.
    Ok,
    /// The target exists but is not readable.
    PermissionDenied,
    /// The href could not be turned into a target.
    ResolveError,
    /// A policy rule denied the target.
    SecurityBlocked,
    /// No handler is registered for the kind.
    Unsupported,
}

impl ReasonCode {
    /// The stable tag used in logs and JSON output.
    pub const fn as_str(self) -> &'static str {
        return match self {
            Self::InternalError => "INTERNAL_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Ok => "OK",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ResolveError => "RESOLVE_ERROR",
            Self::SecurityBlocked => "SECURITY_BLOCKED",
            Self::Unsupported => "UNSUPPORTED",
        };
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(self.as_str());
    }
}

/// Every link falls into exactly one kind. `Unknown` is the catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceKind {
    /// Same-document fragment such as `#intro`.
    Anchor,
    /// Mermaid source or a link inside a diagram container.
    Diagram,
    /// Path ending in a separator.
    Directory,
    /// `http`, `https`, or `mailto` link.
    ExternalHttp,
    /// `file:///` URL or a Windows absolute path.
    FileProtocol,
    /// Path ending in a known image extension.
    Image,
    /// Path to another markdown document.
    RelativeDocument,
    /// `other.md#section` style link produced by a table of contents.
    TableOfContentsEntry,
    /// Nothing else matched.
    Unknown,
}

impl ReferenceKind {
    /// The stable tag used in logs and JSON output.
    pub const fn as_str(self) -> &'static str {
        return match self {
            Self::Anchor => "ANCHOR",
            Self::Diagram => "DIAGRAM",
            Self::Directory => "DIRECTORY",
            Self::ExternalHttp => "EXTERNAL_HTTP",
            Self::FileProtocol => "FILE_PROTOCOL",
            Self::Image => "IMAGE",
            Self::RelativeDocument => "RELATIVE_DOCUMENT",
            Self::TableOfContentsEntry => "TABLE_OF_CONTENTS_ENTRY",
            Self::Unknown => "UNKNOWN",
        };
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(self.as_str());
    }
}

/// One link click: the raw href plus where it was clicked from.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Directory being browsed; only consulted when no document is open.
    pub current_dir: Option<PathBuf>,
    /// Document containing the link.
    pub current_document: Option<PathBuf>,
    /// Kind-specific hints such as [`DIAGRAM_CONTAINER_HINT`], `session_id`, or `policy`.
    pub extensions: HashMap<String, serde_json::Value>,
    /// The raw reference string.
    pub href: String,
    /// Free-form tag naming the UI component that produced the link.
    pub source_component: String,
}

impl RequestContext {
    /// Context for `href` with nothing else known.
    pub fn new(href: impl Into<String>) -> Self {
        return Self {
            href: href.into(),
            ..Self::default()
        };
    }

    /// The file that relative links resolve against: the current document,
    /// or a synthetic file inside the current directory.
    pub fn base_document(&self) -> Option<PathBuf> {
        if let Some(doc) = &self.current_document {
            return Some(doc.clone());
        }
        return self.current_dir.as_ref().map(|dir| return dir.join(DIRECTORY_ANCHOR_FILE));
    }

    /// Whether a boolean extension is present and true.
    pub fn extension_flag(&self, key: &str) -> bool {
        return self
            .extensions
            .get(key)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
    }

    /// A string extension, if present.
    pub fn extension_str(&self, key: &str) -> Option<&str> {
        return self.extensions.get(key).and_then(serde_json::Value::as_str);
    }

    /// Set the current directory.
    #[must_use]
    pub fn with_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        return self;
    }

    /// Set the current document.
    #[must_use]
    pub fn with_document(mut self, doc: impl Into<PathBuf>) -> Self {
        self.current_document = Some(doc.into());
        return self;
    }

    /// Add an extension hint.
    #[must_use]
    pub fn with_extension(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extensions.insert(key.to_string(), value.into());
        return self;
    }

    /// Set the source component tag.
    #[must_use]
    pub fn with_source_component(mut self, component: impl Into<String>) -> Self {
        self.source_component = component.into();
        return self;
    }
}

/// What a link points at once resolved. Handlers receive one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// Canonical absolute filesystem path.
    Path(PathBuf),
    /// The href passed through untouched (anchors, images, diagrams).
    Raw(String),
    /// A markdown document plus the fragment to scroll to inside it.
    TocEntry {
        /// Text after the first `#` of the href.
        fragment: String,
        /// Canonical path of the target document.
        path: PathBuf,
    },
    /// External URL string, validated against the domain allow-list.
    Url(String),
}

/// Allow or deny, with a reason code and structured details when denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    /// Whether the target may be followed.
    pub allowed: bool,
    /// Structured context such as the offending pattern or measured depth.
    pub details: BTreeMap<String, String>,
    /// Human-readable explanation.
    pub message: String,
    /// `Ok` when allowed, otherwise the denial reason.
    pub reason: ReasonCode,
}

impl ValidationOutcome {
    /// The target is allowed.
    pub const fn allow() -> Self {
        return Self {
            allowed: true,
            details: BTreeMap::new(),
            message: String::new(),
            reason: ReasonCode::Ok,
        };
    }

    /// The target is denied for `reason`.
    pub fn deny(reason: ReasonCode, message: impl Into<String>) -> Self {
        return Self {
            allowed: false,
            details: BTreeMap::new(),
            message: message.into(),
            reason,
        };
    }

    /// Add one detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: &str, value: impl ToString) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        return self;
    }
}
