use std::sync::Arc;

use tracing::info;

use crate::config::ServerConfig;
use crate::core::{
    ClipDelivery, ClipOrchestrator, GeneratorResult, HuggingFaceGenerator, SharedClipGenerator,
    SharedClipStore, create_clip_store,
};

/// Application state shared by every request handler
pub struct AppState {
    pub config: ServerConfig,
    pub orchestrator: Arc<ClipOrchestrator>,
    pub delivery: ClipDelivery,
}

impl AppState {
    /// Build state from configuration: clip store, Hugging Face generator, catalog.
    pub async fn new(config: ServerConfig) -> GeneratorResult<Arc<Self>> {
        let store = create_clip_store(config.cache_path.as_deref(), config.cache_max_entries);
        let generator: SharedClipGenerator =
            Arc::new(HuggingFaceGenerator::new(config.generator_config())?);
        Ok(Self::with_components(config, store, generator))
    }

    /// Build state around explicit collaborators
    pub fn with_components(
        config: ServerConfig,
        store: SharedClipStore,
        generator: SharedClipGenerator,
    ) -> Arc<Self> {
        let catalog = config.prompt_catalog();
        info!(
            slots = catalog.len(),
            ttl_seconds = config.cache_ttl_seconds,
            "Clip orchestrator ready"
        );

        let orchestrator = Arc::new(ClipOrchestrator::new(
            store,
            generator,
            catalog,
            config.cache_ttl(),
        ));
        let delivery = ClipDelivery::new(Arc::clone(&orchestrator));

        Arc::new(Self {
            config,
            orchestrator,
            delivery,
        })
    }
}
