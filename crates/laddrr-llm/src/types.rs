//! Wire types for both backends.

use serde::{Deserialize, Serialize};

// ─── claude CLI stream-json ───────────────────────────────────────────────

/// The subset of `claude --output-format stream-json` messages a one-shot
/// completion cares about. Other message types are skipped by the reader.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    System {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    Assistant {
        message: AssistantBody,
    },
    User {},
    Result(ResultMessage),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantBody {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

/// `type = "result"`: the terminal message of every run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum ResultMessage {
    Success(ResultSuccess),
    ErrorDuringExecution(ResultError),
    ErrorMaxTurns(ResultError),
    ErrorMaxBudgetUsd(ResultError),
}

impl ResultMessage {
    pub fn result_text(&self) -> Option<&str> {
        match self {
            ResultMessage::Success(r) if !r.is_error => Some(&r.result),
            _ => None,
        }
    }

    pub fn describe_error(&self) -> String {
        match self {
            ResultMessage::Success(r) => format!("result flagged as error: {}", r.result),
            ResultMessage::ErrorDuringExecution(e)
            | ResultMessage::ErrorMaxTurns(e)
            | ResultMessage::ErrorMaxBudgetUsd(e) => {
                if e.errors.is_empty() {
                    "claude run ended with an error".to_string()
                } else {
                    e.errors.join("; ")
                }
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultSuccess {
    #[serde(default)]
    pub session_id: String,
    pub result: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub num_turns: u32,
    #[serde(default)]
    pub total_cost_usd: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultError {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub errors: Vec<String>,
}

// ─── Anthropic Messages API ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<ApiMessage<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl MessagesResponse {
    /// Concatenated text of every text block.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_result_success() {
        let json = r#"{"type":"result","subtype":"success","session_id":"s1","result":"{\"tip\":\"x\"}","duration_ms":5,"is_error":false,"num_turns":1,"total_cost_usd":0.001,"usage":{"input_tokens":1,"output_tokens":1}}"#;
        let StreamMessage::Result(r) = serde_json::from_str(json).unwrap() else {
            panic!("expected Result");
        };
        assert_eq!(r.result_text(), Some("{\"tip\":\"x\"}"));
    }

    #[test]
    fn parse_result_error() {
        let json = r#"{"type":"result","subtype":"error_max_turns","session_id":"s1","is_error":true,"errors":["Reached maximum turn limit"]}"#;
        let StreamMessage::Result(r) = serde_json::from_str(json).unwrap() else {
            panic!("expected Result");
        };
        assert_eq!(r.result_text(), None);
        assert_eq!(r.describe_error(), "Reached maximum turn limit");
    }

    #[test]
    fn parse_assistant_with_tool_block() {
        let json = r#"{"type":"assistant","session_id":"s1","message":{"role":"assistant","content":[{"type":"text","text":"hi"},{"type":"tool_use","id":"t","name":"Read","input":{}}]}}"#;
        let StreamMessage::Assistant { message } = serde_json::from_str(json).unwrap() else {
            panic!("expected Assistant");
        };
        assert_eq!(message.content.len(), 2);
        assert!(matches!(message.content[1], ContentBlock::Other));
    }

    #[test]
    fn messages_response_text_joins_blocks() {
        let json = r#"{"id":"msg_1","content":[{"type":"text","text":"{\"a\":"},{"type":"text","text":"1}"}],"stop_reason":"end_turn","usage":{"input_tokens":3,"output_tokens":4}}"#;
        let resp: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.text(), "{\"a\":1}");
        assert_eq!(resp.usage.unwrap().output_tokens, 4);
    }
}
