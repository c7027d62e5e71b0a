use std::time::Duration;

use async_trait::async_trait;
use laddrr_core::{BoxError, CompletionRequest, CompletionService};
use serde_json::Value;

use crate::error::LlmError;
use crate::json::{extract_json, system_prompt};
use crate::types::{ApiMessage, MessagesRequest, MessagesResponse};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Where the key comes from. Resolved per call so a server can start
/// without one and report the problem on use.
#[derive(Debug, Clone)]
enum KeySource {
    Env(String),
    Fixed(String),
}

/// Completion backend for the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    key: KeySource,
}

impl AnthropicClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        api_key_env: impl Into<String>,
    ) -> Result<Self, LlmError> {
        Self::build(base_url.into(), model.into(), max_tokens, KeySource::Env(api_key_env.into()))
    }

    pub fn with_api_key(
        base_url: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        api_key: impl Into<String>,
    ) -> Result<Self, LlmError> {
        Self::build(base_url.into(), model.into(), max_tokens, KeySource::Fixed(api_key.into()))
    }

    fn build(base_url: String, model: String, max_tokens: u32, key: KeySource) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_tokens,
            key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn api_key(&self) -> Result<String, LlmError> {
        match &self.key {
            KeySource::Fixed(k) => Ok(k.clone()),
            KeySource::Env(var) => match std::env::var(var) {
                Ok(k) if !k.trim().is_empty() => Ok(k),
                _ => Err(LlmError::MissingApiKey(var.clone())),
            },
        }
    }

    /// Send one prompt and return the concatenated reply text.
    pub async fn send(&self, system: String, prompt: &str) -> Result<String, LlmError> {
        let key = self.api_key()?;
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: vec![ApiMessage {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = resp.json().await?;
        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                stop_reason = parsed.stop_reason.as_deref().unwrap_or(""),
                "anthropic reply"
            );
        }
        Ok(parsed.text())
    }
}

#[async_trait]
impl CompletionService for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Option<Value>, BoxError> {
        let text = self.send(system_prompt(request), &request.prompt).await?;
        let value = extract_json(&text);
        if value.is_none() {
            tracing::warn!(flow = %request.flow, "anthropic reply had no JSON document");
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn request() -> CompletionRequest {
        CompletionRequest {
            flow: "rewriteText".into(),
            prompt: "Rewrite: you never listen".into(),
            output_schema: json!({"type": "object"}),
        }
    }

    fn reply(text: &str) -> String {
        json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 8}
        })
        .to_string()
    }

    #[tokio::test]
    async fn posts_messages_request_and_parses_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-test")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .match_body(Matcher::PartialJson(json!({
                "model": "claude-haiku-4-5",
                "max_tokens": 256,
                "messages": [{"role": "user", "content": "Rewrite: you never listen"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(reply("{\"rewrittenText\":\"I'd like to feel heard.\"}"))
            .create_async()
            .await;

        let client = AnthropicClient::with_api_key(server.url(), "claude-haiku-4-5", 256, "sk-test").unwrap();
        let out = client.complete(&request()).await.unwrap();
        assert_eq!(out, Some(json!({"rewrittenText": "I'd like to feel heard."})));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn prose_reply_is_no_output() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(reply("I'd rather not."))
            .create_async()
            .await;

        let client = AnthropicClient::with_api_key(server.url(), "m", 64, "k").unwrap();
        assert_eq!(client.complete(&request()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body(r#"{"type":"error","error":{"type":"overloaded_error"}}"#)
            .create_async()
            .await;

        let client = AnthropicClient::with_api_key(server.url(), "m", 64, "k").unwrap();
        let err = client.send(String::new(), "hi").await.unwrap_err();
        let LlmError::Status { status, body } = err else {
            panic!("expected Status, got {err:?}");
        };
        assert_eq!(status, 529);
        assert!(body.contains("overloaded_error"));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/v1/messages").expect(0).create_async().await;

        let client =
            AnthropicClient::new(server.url(), "m", 64, "LADDRR_TEST_KEY_THAT_IS_NEVER_SET").unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(err.to_string().contains("LADDRR_TEST_KEY_THAT_IS_NEVER_SET"), "{err}");
        mock.assert_async().await;
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = AnthropicClient::with_api_key("http://x/", "m", 1, "k").unwrap();
        assert_eq!(client.base_url, "http://x");
    }
}
