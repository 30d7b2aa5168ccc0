//! Link classification, resolution, and fail-closed security validation for
//! links clicked in rendered markdown.
//!
//! [`LinkProcessor::process`] takes a [`RequestContext`] and always returns a
//! [`LinkResult`]: classify the href, resolve it to a path or URL, check it
//! against the [`SecurityPolicy`], and dispatch to the registered handler.

pub mod classifier;
pub mod diagnostics;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod policy;
pub mod processor;
pub mod resolver;
pub mod sinks;
pub mod types;
pub mod validator;

pub use classifier::classify;
pub use error::Error;
pub use handlers::{HandlerRegistry, LinkHandler};
pub use policy::SecurityPolicy;
pub use processor::LinkProcessor;
pub use resolver::{normalize_path, resolve_file_protocol, resolve_relative};
pub use types::{
    Action, LinkResult, ReasonCode, ReferenceKind, RequestContext, ResolvedTarget, ValidationOutcome,
};
pub use validator::validate;
