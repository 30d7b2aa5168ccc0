/// Crate-level error types for linkgate.
use std::path::PathBuf;

/// Internal failures of the link engine. None of these escape
/// `LinkProcessor::process`; they are folded into a `ReasonCode` there.
/// Each variant names the href, path, or reason for the failure.
#[allow(clippy::error_impl_error, reason = "crate-wide error type re-exported from the library")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An explicitly requested policy file does not exist on disk.
    #[error("config not found: {}", path.display())]
    ConfigNotFound {
        /// Path to the missing policy file.
        path: PathBuf,
    },

    /// An injected handler panicked while executing its action.
    #[error("handler for {kind} panicked: {reason}")]
    HandlerPanicked {
        /// Reference kind whose handler faulted.
        kind: String,
        /// Panic payload rendered as text, when it was a string.
        reason: String,
    },

    /// A percent-escape in a path decoded to bytes that are not UTF-8.
    #[error("invalid percent-encoding in `{href}`")]
    InvalidPercentEncoding {
        /// The raw reference that failed to decode.
        href: String,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON serialization of an event or result failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped JSON error.
        #[from]
        serde_json::Error,
    ),

    /// The reference could not be parsed as a URL at all.
    #[error("malformed url `{url}`: {reason}")]
    MalformedUrl {
        /// Description of the parse failure.
        reason: String,
        /// The offending URL text.
        url: String,
    },

    /// A file-protocol resolution was asked to handle some other scheme.
    #[error("url scheme is not file: `{scheme}` in {url}")]
    NotFileUrl {
        /// Scheme actually present on the URL.
        scheme: String,
        /// The offending URL text.
        url: String,
    },

    /// An injected logger, snapshot, or metrics sink failed.
    #[error("sink `{sink}` failed: {reason}")]
    Sink {
        /// Description of the sink failure.
        reason: String,
        /// Name of the sink that failed.
        sink: &'static str,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// TOML serialization failed.
    #[error("toml serialize: {0}")]
    TomlSer(
        /// The wrapped TOML serialization error.
        #[from]
        toml::ser::Error,
    ),
}

impl Error {
    /// Whether this error came from turning an href into a target,
    /// as opposed to a fault inside the engine or its collaborators.
    pub const fn is_resolve_failure(&self) -> bool {
        return matches!(
            self,
            Self::InvalidPercentEncoding { .. } | Self::MalformedUrl { .. } | Self::NotFileUrl { .. }
        );
    }
}
