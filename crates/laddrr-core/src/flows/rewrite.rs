use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::flow::{FlowSpec, Pipeline};
use crate::schema::{FieldSchema, Schema};

pub const REWRITE_TEXT: &str = "rewriteText";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteTextInput {
    pub text_to_rewrite: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteTextOutput {
    pub rewritten_text: String,
}

const PROMPT: &str = r#"You are an expert editor specializing in professional and clear communication. A user wants to submit an anonymous concern and needs help phrasing it effectively.

Rewrite the following text to be clearer, more concise and professional while preserving the original meaning and key details. Keep the tone serious and direct, suitable for a formal complaint or feedback to HR or management.

Original Text:
"{{{textToRewrite}}}"

Generate the rewritten text now."#;

pub fn spec() -> &'static FlowSpec {
    static SPEC: OnceLock<FlowSpec> = OnceLock::new();
    SPEC.get_or_init(|| {
        FlowSpec::new(
            REWRITE_TEXT,
            Schema::new().field(
                "textToRewrite",
                FieldSchema::string()
                    .non_empty()
                    .describe("The user-provided text that needs to be rewritten."),
            ),
            Schema::new().field(
                "rewrittenText",
                FieldSchema::string()
                    .non_empty()
                    .describe("The rewritten text."),
            ),
            PROMPT,
        )
        .unwrap()
    })
}

pub async fn rewrite_text(pipeline: &Pipeline, input: &RewriteTextInput) -> Result<RewriteTextOutput> {
    pipeline.run_typed(spec(), input).await
}
