//! Completion-service backends.
//!
//! Two implementations of [`laddrr_core::CompletionService`]:
//!
//! - [`AnthropicClient`] talks to the Messages API over HTTPS.
//! - [`ClaudeCli`] drives a local `claude` binary in stream-json mode.
//!
//! Both frame the flow's output schema into the system prompt and extract a
//! single JSON document from the reply. A reply without one is `Ok(None)`.

mod anthropic;
mod cli;
mod error;
mod json;
mod process;
mod types;

use std::sync::Arc;

use laddrr_core::config::{LlmBackend, LlmConfig};
use laddrr_core::CompletionService;

pub use anthropic::{AnthropicClient, ANTHROPIC_VERSION};
pub use cli::ClaudeCli;
pub use error::LlmError;
pub use json::{extract_json, system_prompt};

/// Build the backend named in the `llm` config section.
pub fn backend_from_config(config: &LlmConfig) -> Result<Arc<dyn CompletionService>, LlmError> {
    let backend: Arc<dyn CompletionService> = match &config.backend {
        LlmBackend::Anthropic {
            model,
            api_key_env,
            base_url,
            max_tokens,
        } => Arc::new(AnthropicClient::new(
            base_url.clone(),
            model.clone(),
            *max_tokens,
            api_key_env.clone(),
        )?),
        LlmBackend::ClaudeCli { model, executable } => {
            Arc::new(ClaudeCli::new(executable.clone(), model.clone()))
        }
    };
    tracing::debug!(model = config.backend.model(), "completion backend ready");
    Ok(backend)
}
