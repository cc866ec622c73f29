//! Application state.

use std::sync::Arc;

use clipflow_registry::ClipRegistry;
use clipflow_storage::ObjectStore;

use crate::config::ProcessorConfig;
use crate::transformer::ClipTransformer;

/// Shared orchestrator state.
///
/// Everything behind a trait object so the webhook and pipeline can be
/// exercised against in-memory doubles.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProcessorConfig>,
    pub registry: Arc<dyn ClipRegistry>,
    pub store: Arc<dyn ObjectStore>,
    pub transformer: Arc<dyn ClipTransformer>,
}

impl AppState {
    pub fn new(
        config: ProcessorConfig,
        registry: Arc<dyn ClipRegistry>,
        store: Arc<dyn ObjectStore>,
        transformer: Arc<dyn ClipTransformer>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            store,
            transformer,
        }
    }
}
