//! Per-request orchestration: classify, resolve, validate, dispatch, report.
//!
//! `process` always returns a well-formed `LinkResult`. Resolution failures,
//! validation denials, missing handlers, engine errors, and handler panics
//! all become failed results, and every result is reported to the sinks.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::classifier::{DOCUMENT_EXTENSION, classify};
use crate::error::Error;
use crate::handlers::{HandlerRegistry, LinkHandler};
use crate::policy::SecurityPolicy;
use crate::resolver;
use crate::sinks::{EventSink, LinkEvent, LinkSnapshot, MetricsSink, SnapshotSink, TracingEventSink};
use crate::types::{
    Action, LinkResult, ReasonCode, ReferenceKind, RequestContext, ResolvedTarget, ValidationOutcome,
};
use crate::validator::validate_with_origin;

/// Environment variable consulted when the policy names no build version.
pub const BUILD_VERSION_ENV: &str = "LINKGATE_BUILD_VERSION";

/// Name of the application in structured events.
const APP_NAME: &str = "linkgate";

/// Name of this module in structured events.
const MODULE_NAME: &str = "processor";

/// A kind plus the result produced for it. The kind may differ from the
/// classified one when an unknown href turns out to be a directory.
type Routed = (ReferenceKind, LinkResult);

/// The link engine. Holds the read-only policy, the handler table, and the
/// optional sinks; processes each request independently.
pub struct LinkProcessor {
    /// Lazily computed version string, fixed for the processor's lifetime.
    build_version: OnceLock<String>,
    /// Receives one structured event per link.
    event_sink: Option<Box<dyn EventSink>>,
    /// Kind → handler routing table.
    handlers: HandlerRegistry,
    /// Receives `ok` / `error` counter updates.
    metrics_sink: Option<Box<dyn MetricsSink>>,
    /// Policy consulted by every validation.
    policy: SecurityPolicy,
    /// Receives a diagnostics snapshot per link.
    snapshot_sink: Option<Box<dyn SnapshotSink>>,
}

impl LinkProcessor {
    /// Engine version reported in events. Computed on first use from the
    /// policy, then [`BUILD_VERSION_ENV`], then the crate version. Two threads
    /// racing here may both compute it; the first stored value wins.
    pub fn build_version(&self) -> &str {
        if let Some(version) = self.build_version.get() {
            return version;
        }
        let _ = self.build_version.set(compute_build_version(&self.policy));
        return self
            .build_version
            .get()
            .map_or(env!("CARGO_PKG_VERSION"), String::as_str);
    }

    /// Processor with no handlers and the tracing event sink.
    pub fn new(policy: SecurityPolicy) -> Self {
        return Self {
            build_version: OnceLock::new(),
            event_sink: Some(Box::new(TracingEventSink)),
            handlers: HandlerRegistry::default(),
            metrics_sink: None,
            policy,
            snapshot_sink: None,
        };
    }

    /// The policy currently in force.
    pub const fn policy(&self) -> &SecurityPolicy {
        return &self.policy;
    }

    /// Classify, resolve, validate, and dispatch one link.
    pub fn process(&self, ctx: &RequestContext) -> LinkResult {
        let kind = classify(&ctx.href, ctx);
        tracing::debug!(href = %ctx.href, %kind, source = %ctx.source_component, "classified link");

        let (kind, result) = match catch_unwind(AssertUnwindSafe(|| return self.route(kind, ctx))) {
            Ok(Ok((routed_kind, result))) => (routed_kind, result.sanitized()),
            Ok(Err(e)) => {
                tracing::error!(href = %ctx.href, %kind, error = %e, "link processing failed");
                (kind, LinkResult::internal_error(e.to_string()))
            },
            Err(panic) => {
                let e = Error::HandlerPanicked {
                    kind: kind.to_string(),
                    reason: panic_reason(panic.as_ref()),
                };
                tracing::error!(href = %ctx.href, %kind, error = %e, "link processing panicked");
                (kind, LinkResult::internal_error(e.to_string()))
            },
        };

        self.report(ctx, kind, &result);
        return result;
    }

    /// Register one handler, replacing any previous one for `kind`.
    pub fn register(&mut self, kind: ReferenceKind, handler: Box<dyn LinkHandler>) {
        self.handlers.insert(kind, handler);
    }

    /// Replace the event sink; `None` disables events.
    pub fn set_event_sink(&mut self, sink: Option<Box<dyn EventSink>>) {
        self.event_sink = sink;
    }

    /// Replace the whole handler table.
    pub fn set_handlers(&mut self, handlers: HandlerRegistry) {
        self.handlers = handlers;
    }

    /// Install a metrics sink.
    pub fn set_metrics_sink(&mut self, sink: Box<dyn MetricsSink>) {
        self.metrics_sink = Some(sink);
    }

    /// Replace the policy for subsequent requests.
    pub fn set_policy(&mut self, policy: SecurityPolicy) {
        self.policy = policy;
    }

    /// Install a snapshot sink.
    pub fn set_snapshot_sink(&mut self, sink: Box<dyn SnapshotSink>) {
        self.snapshot_sink = Some(sink);
    }

    /// Processor with every default handler registered.
    pub fn with_default_handlers(policy: SecurityPolicy) -> Self {
        let mut processor = Self::new(policy);
        processor.handlers = HandlerRegistry::with_defaults();
        return processor;
    }

    // ── Routing ────────────────────────────────────────────────────────

    /// Run the handler for `kind`, or report it as unsupported.
    fn dispatch(&self, kind: ReferenceKind, ctx: &RequestContext, target: &ResolvedTarget) -> LinkResult {
        let Some(handler) = self.handlers.get(kind) else {
            tracing::warn!(href = %ctx.href, %kind, "no handler registered");
            return LinkResult::unsupported(kind);
        };
        return handler.handle(ctx, target);
    }

    /// Web and mail links: always validated, whatever else the policy says.
    fn open_external(&self, ctx: &RequestContext) -> Routed {
        let kind = ReferenceKind::ExternalHttp;
        let target = ResolvedTarget::Url(ctx.href.clone());
        let outcome = validate_with_origin(&target, None, &self.policy);
        if !outcome.allowed {
            return (kind, LinkResult::denied(&outcome).with_payload("url", ctx.href.clone()));
        }
        return (kind, self.dispatch(kind, ctx, &target));
    }

    /// `file://` URLs and bare drive paths.
    fn open_file_reference(&self, ctx: &RequestContext) -> Result<Routed, Error> {
        let kind = ReferenceKind::FileProtocol;
        let path = match resolver::resolve_file_reference(&ctx.href) {
            Ok(path) => path,
            Err(e) => return Ok((kind, resolution_failure(e)?)),
        };
        let target = ResolvedTarget::Path(path);
        let outcome = validate_with_origin(&target, Some(ctx.href.as_str()), &self.policy);
        if !outcome.allowed {
            return Ok((kind, denied_at(&outcome, &target)));
        }
        return Ok((kind, self.dispatch(kind, ctx, &target)));
    }

    /// Documents and directories, resolved against the current location.
    fn open_local(&self, kind: ReferenceKind, ctx: &RequestContext) -> Result<Routed, Error> {
        let path = match resolver::resolve_relative(ctx.base_document().as_deref(), &ctx.href) {
            Ok(path) => path,
            Err(e) => return Ok((kind, resolution_failure(e)?)),
        };
        let (path, outcome) = self.validate_with_correction(path, &ctx.href);
        let target = ResolvedTarget::Path(path);
        if !outcome.allowed {
            return Ok((kind, denied_at(&outcome, &target)));
        }
        return Ok((kind, self.dispatch(kind, ctx, &target)));
    }

    /// `other.md#section` opens another document at an anchor when a current
    /// document is known; anything else scrolls within the current document.
    fn open_toc_entry(&self, ctx: &RequestContext) -> Result<Routed, Error> {
        let kind = ReferenceKind::TableOfContentsEntry;
        let raw = ResolvedTarget::Raw(ctx.href.clone());
        let Some((path_part, fragment)) = ctx.href.split_once('#') else {
            return Ok((kind, self.dispatch(kind, ctx, &raw)));
        };
        let names_document = path_part.trim().to_lowercase().ends_with(DOCUMENT_EXTENSION);
        let Some(document) = ctx.current_document.as_deref().filter(|_| return names_document) else {
            return Ok((kind, self.dispatch(kind, ctx, &raw)));
        };

        let path = match resolver::resolve_relative(Some(document), path_part) {
            Ok(path) => path,
            Err(e) => return Ok((kind, resolution_failure(e)?)),
        };
        let (path, outcome) = self.validate_with_correction(path, path_part);
        if !outcome.allowed {
            return Ok((kind, denied_at(&outcome, &ResolvedTarget::Path(path))));
        }
        let target = ResolvedTarget::TocEntry {
            fragment: fragment.to_string(),
            path,
        };
        return Ok((kind, self.dispatch(kind, ctx, &target)));
    }

    /// An unclassified href next to a known document may still name a local
    /// directory or file. Directories go through the directory handler; plain
    /// files get a direct `open-file` result without any handler.
    fn probe_unknown(&self, ctx: &RequestContext) -> Result<Routed, Error> {
        let kind = ReferenceKind::Unknown;
        let path = match resolver::resolve_relative(ctx.base_document().as_deref(), &ctx.href) {
            Ok(path) => path,
            Err(e) => return Ok((kind, resolution_failure(e)?)),
        };
        let target = ResolvedTarget::Path(path.clone());

        if path.is_dir() {
            let kind = ReferenceKind::Directory;
            tracing::debug!(href = %ctx.href, path = %path.display(), "unknown href is a directory");
            let outcome = validate_with_origin(&target, Some(ctx.href.as_str()), &self.policy);
            if !outcome.allowed {
                return Ok((kind, denied_at(&outcome, &target)));
            }
            return Ok((kind, self.dispatch(kind, ctx, &target)));
        }

        if path.is_file() {
            tracing::debug!(href = %ctx.href, path = %path.display(), "unknown href is a plain file");
            let outcome = validate_with_origin(&target, Some(ctx.href.as_str()), &self.policy);
            if !outcome.allowed {
                return Ok((kind, denied_at(&outcome, &target)));
            }
            let result = LinkResult::ok(Action::OpenFile).with_payload("path", path.display().to_string());
            return Ok((kind, result));
        }

        return Ok((kind, self.dispatch(kind, ctx, &ResolvedTarget::Raw(ctx.href.clone()))));
    }

    /// Pick the branch for the classified kind.
    fn route(&self, kind: ReferenceKind, ctx: &RequestContext) -> Result<Routed, Error> {
        return match kind {
            ReferenceKind::Directory | ReferenceKind::RelativeDocument => self.open_local(kind, ctx),
            ReferenceKind::ExternalHttp => Ok(self.open_external(ctx)),
            ReferenceKind::FileProtocol => self.open_file_reference(ctx),
            ReferenceKind::TableOfContentsEntry => self.open_toc_entry(ctx),
            ReferenceKind::Unknown if !ctx.href.trim().is_empty() && ctx.base_document().is_some() => {
                self.probe_unknown(ctx)
            },
            ReferenceKind::Anchor | ReferenceKind::Diagram | ReferenceKind::Image | ReferenceKind::Unknown => {
                Ok((kind, self.dispatch(kind, ctx, &ResolvedTarget::Raw(ctx.href.clone()))))
            },
        };
    }

    /// Validate `path`; if it is missing and its name doubles the document
    /// extension (`notes.md.md`), retry once with one extension removed. The
    /// corrected path is used only if it exists and passes validation.
    fn validate_with_correction(&self, path: PathBuf, origin: &str) -> (PathBuf, ValidationOutcome) {
        let outcome = validate_with_origin(&ResolvedTarget::Path(path.clone()), Some(origin), &self.policy);
        if outcome.allowed || outcome.reason != ReasonCode::NotFound {
            return (path, outcome);
        }
        let Some(candidate) = strip_duplicated_extension(&path).filter(|c| return c.exists()) else {
            return (path, outcome);
        };

        let retry = validate_with_origin(&ResolvedTarget::Path(candidate.clone()), Some(origin), &self.policy);
        if !retry.allowed {
            return (path, outcome);
        }
        tracing::info!(
            from = %path.display(),
            to = %candidate.display(),
            "corrected duplicated document extension"
        );
        return (candidate, retry);
    }

    // ── Reporting ──────────────────────────────────────────────────────

    /// Send the outcome to every installed sink. Sink errors and panics are logged only.
    fn report(&self, ctx: &RequestContext, kind: ReferenceKind, result: &LinkResult) {
        let reason = result.reason.map(|r| return r.as_str().to_string());

        if let Some(sink) = &self.event_sink {
            let event = LinkEvent {
                action: result.action.as_str().to_string(),
                app: APP_NAME,
                build_version: self.build_version().to_string(),
                href: ctx.href.clone(),
                kind: kind.as_str().to_string(),
                module_name: MODULE_NAME,
                reason: reason.clone(),
                session_id: ctx.extension_str("session_id").map(str::to_string),
                success: result.success,
            };
            contain_sink("event", || return sink.record_event(&event, self.policy.logging.json));
        }

        if let Some(sink) = &self.snapshot_sink {
            let snapshot = snapshot_of(ctx, result, reason.unwrap_or_default());
            contain_sink("snapshot", || return sink.save_snapshot(&snapshot));
        }

        if let Some(sink) = &self.metrics_sink {
            let last_result = if result.success { "ok" } else { "error" };
            contain_sink("metrics", || return sink.record_link_update(last_result));
        }
    }
}

/// Policy value, then the environment, then the crate version.
fn compute_build_version(policy: &SecurityPolicy) -> String {
    if let Some(version) = policy.build_version.as_deref().filter(|v| return !v.is_empty()) {
        return version.to_string();
    }
    if let Ok(version) = std::env::var(BUILD_VERSION_ENV)
        && !version.is_empty()
    {
        return version;
    }
    return env!("CARGO_PKG_VERSION").to_string();
}

/// Run one sink call. An error or a panic is logged and dropped.
fn contain_sink(sink: &'static str, call: impl FnOnce() -> Result<(), Error>) {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => {},
        Ok(Err(e)) => tracing::warn!(sink, error = %e, "sink failed"),
        Err(panic) => tracing::warn!(sink, reason = %panic_reason(panic.as_ref()), "sink panicked"),
    }
}

/// A denial that names the path it was about.
fn denied_at(outcome: &ValidationOutcome, target: &ResolvedTarget) -> LinkResult {
    let result = LinkResult::denied(outcome);
    return match target {
        ResolvedTarget::Path(path) | ResolvedTarget::TocEntry { path, .. } => {
            result.with_payload("path", path.display().to_string())
        },
        ResolvedTarget::Raw(_) | ResolvedTarget::Url(_) => result,
    };
}

/// Text of a panic payload, when it has any.
fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        return (*text).to_string();
    }
    if let Some(text) = payload.downcast_ref::<String>() {
        return text.clone();
    }
    return "non-string panic payload".to_string();
}

/// Resolver errors become a `ResolveError` result; anything else is an engine fault.
///
/// # Errors
///
/// Returns `e` unchanged when it is not a resolution failure.
fn resolution_failure(e: Error) -> Result<LinkResult, Error> {
    if e.is_resolve_failure() {
        tracing::warn!(error = %e, "link did not resolve");
        return Ok(LinkResult::resolve_error(e.to_string()));
    }
    return Err(e);
}

/// Build the diagnostics snapshot for one processed link.
fn snapshot_of(ctx: &RequestContext, result: &LinkResult, reason: String) -> LinkSnapshot {
    let last_result = if result.success {
        "ok"
    } else if result.action == Action::None {
        "error"
    } else {
        "warn"
    };
    let last_action = if result.action == Action::None {
        "none".to_string()
    } else {
        result.action.as_str().to_string()
    };
    return LinkSnapshot {
        action: result.action.as_str().to_string(),
        current_dir: ctx.current_dir.as_ref().map(|d| return d.display().to_string()),
        current_document: ctx.current_document.as_ref().map(|d| return d.display().to_string()),
        href: ctx.href.clone(),
        last_action,
        last_result,
        message: result.message.clone(),
        policy_profile: ctx.extension_str("policy").unwrap_or("default").to_string(),
        reason,
        source_component: ctx.source_component.clone(),
    };
}

/// `notes.md.md` → `notes.md`, case-insensitively; `None` for any other name.
fn strip_duplicated_extension(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let doubled_len = DOCUMENT_EXTENSION.len().checked_mul(2)?;
    let tail = name.get(name.len().checked_sub(doubled_len)?..)?;
    if !tail.eq_ignore_ascii_case(".md.md") {
        return None;
    }
    let fixed = name.get(..name.len().checked_sub(DOCUMENT_EXTENSION.len())?)?;
    return Some(path.with_file_name(fixed));
}
