//! Observability collaborators: per-request events, snapshots, and metrics.
//!
//! Sink failures are logged by the processor and never change the result.

use serde::Serialize;

use crate::error::Error;

/// Structured record emitted once per processed link.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEvent {
    /// Action tag of the result.
    pub action: String,
    /// Fixed application name.
    pub app: &'static str,
    /// Engine build version.
    pub build_version: String,
    /// The href as clicked.
    pub href: String,
    /// Classified kind tag.
    pub kind: String,
    /// Fixed module name.
    pub module_name: &'static str,
    /// Reason code tag, if the link failed.
    pub reason: Option<String>,
    /// Caller session, from the `session_id` extension.
    pub session_id: Option<String>,
    /// Whether the link may be followed.
    pub success: bool,
}

impl LinkEvent {
    /// The event as one JSON object, for the `logging.json` mode.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if serialization fails.
    pub fn to_json(&self) -> Result<String, Error> {
        return Ok(serde_json::to_string(self)?);
    }
}

/// Last-known state of link processing, for a diagnostics snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct LinkSnapshot {
    /// Action tag of the result.
    pub action: String,
    /// Current directory when the link was clicked.
    pub current_dir: Option<String>,
    /// Current document when the link was clicked.
    pub current_document: Option<String>,
    /// The href as clicked.
    pub href: String,
    /// `"none"` when the result has no action.
    pub last_action: String,
    /// `"ok"`, `"warn"` (failed but showed something), or `"error"`.
    pub last_result: &'static str,
    /// Result message.
    pub message: String,
    /// Named policy profile, from the `policy` extension.
    pub policy_profile: String,
    /// Reason code tag, empty on success.
    pub reason: String,
    /// UI component that produced the link.
    pub source_component: String,
}

/// Receives one [`LinkEvent`] per processed link.
pub trait EventSink: Send + Sync {
    /// Record an event.
    ///
    /// # Errors
    ///
    /// Implementations return `Error::Sink` or `Error::Json` when recording fails.
    fn record_event(&self, event: &LinkEvent, as_json: bool) -> Result<(), Error>;
}

/// Receives a counter update per processed link.
pub trait MetricsSink: Send + Sync {
    /// Record `"ok"` or `"error"` for the latest link.
    ///
    /// # Errors
    ///
    /// Implementations return `Error::Sink` when recording fails.
    fn record_link_update(&self, last_result: &str) -> Result<(), Error>;
}

/// Receives a [`LinkSnapshot`] per processed link.
pub trait SnapshotSink: Send + Sync {
    /// Save the snapshot.
    ///
    /// # Errors
    ///
    /// Implementations return `Error::Sink` or `Error::Io` when saving fails.
    fn save_snapshot(&self, snapshot: &LinkSnapshot) -> Result<(), Error>;
}

/// Default event sink: one `info` event on the `linkgate` tracing target.
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record_event(&self, event: &LinkEvent, as_json: bool) -> Result<(), Error> {
        if as_json {
            let line = event.to_json()?;
            tracing::info!(target: "linkgate", "{line}");
            return Ok(());
        }
        tracing::info!(
            target: "linkgate",
            app = event.app,
            module_name = event.module_name,
            build_version = %event.build_version,
            session_id = ?event.session_id,
            href = %event.href,
            kind = %event.kind,
            action = %event.action,
            success = event.success,
            reason = ?event.reason,
            "link_processed"
        );
        return Ok(());
    }
}
