use async_trait::async_trait;
use laddrr_core::{BoxError, CompletionRequest, CompletionService};
use serde_json::Value;

use crate::json::{extract_json, system_prompt};
use crate::process::{ClaudeProcess, Invocation};
use crate::types::ResultMessage;

/// Completion backend that shells out to a local `claude` binary.
#[derive(Debug, Clone)]
pub struct ClaudeCli {
    executable: String,
    model: String,
}

impl ClaudeCli {
    pub fn new(executable: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionService for ClaudeCli {
    async fn complete(&self, request: &CompletionRequest) -> Result<Option<Value>, BoxError> {
        let system = system_prompt(request);
        let inv = Invocation {
            executable: &self.executable,
            model: &self.model,
            system_prompt: &system,
        };

        let mut process = ClaudeProcess::spawn(&request.prompt, &inv).await?;
        let outcome = process.read_result().await;
        process.kill().await;
        let result = outcome?;

        if let ResultMessage::Success(r) = &result {
            tracing::debug!(
                flow = %request.flow,
                session_id = %r.session_id,
                turns = r.num_turns,
                cost_usd = r.total_cost_usd,
                "claude run finished"
            );
        }
        let Some(text) = result.result_text() else {
            tracing::warn!(flow = %request.flow, error = %result.describe_error(), "claude run failed");
            return Ok(None);
        };
        let value = extract_json(text);
        if value.is_none() {
            tracing::warn!(flow = %request.flow, "claude reply had no JSON document");
        }
        Ok(value)
    }
}
