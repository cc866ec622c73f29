//! Event-driven processing orchestrator.
//!
//! Receives the registry's change notifications over a webhook, atomically
//! claims each newly inserted clip, runs the pluggable transformation, and
//! finalizes the record as `READY` or `FAILED`. Safe under at-least-once
//! delivery and concurrent orchestrator instances.

pub mod config;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod reconciler;
pub mod routes;
pub mod state;
pub mod transformer;

pub use config::ProcessorConfig;
pub use error::{ProcessError, ProcessResult};
pub use pipeline::{process_clip, PipelineOutcome};
pub use reconciler::Reconciler;
pub use routes::create_router;
pub use state::AppState;
pub use transformer::{ClipTransformer, CommandTransformer, PassthroughTransformer};
