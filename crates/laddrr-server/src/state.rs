use std::path::PathBuf;
use std::sync::Arc;

use laddrr_core::config::Config;
use laddrr_core::{CompletionService, Pipeline, Store};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub store: Store,
    pub pipeline: Pipeline,
    /// Model name reported by `/api/health`.
    pub model: String,
}

impl AppState {
    pub fn new(root: PathBuf, store: Store, service: Arc<dyn CompletionService>) -> Self {
        Self {
            root,
            store,
            pipeline: Pipeline::new(service),
            model: String::new(),
        }
    }

    /// Wire the configured medium and completion backend.
    pub fn from_config(root: PathBuf, config: &Config) -> anyhow::Result<Self> {
        let store = Store::open(&root, config.store.medium)?;
        let service = laddrr_llm::backend_from_config(&config.llm)?;
        Ok(Self {
            root,
            store,
            pipeline: Pipeline::new(service).with_policy(config.llm.call_policy()),
            model: config.llm.backend.model().to_string(),
        })
    }
}
