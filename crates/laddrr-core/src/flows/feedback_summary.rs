use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::flow::{FlowSpec, Pipeline};
use crate::schema::{FieldSchema, Schema};

pub const SUMMARIZE_ANONYMOUS_FEEDBACK: &str = "summarizeAnonymousFeedback";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criticality {
    Low,
    Medium,
    High,
    Critical,
}

impl Criticality {
    pub const ALL: [Criticality; 4] = [
        Criticality::Low,
        Criticality::Medium,
        Criticality::High,
        Criticality::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Criticality::Low => "Low",
            Criticality::Medium => "Medium",
            Criticality::High => "High",
            Criticality::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for Criticality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeAnonymousFeedbackInput {
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeAnonymousFeedbackOutput {
    pub summary: String,
    pub criticality: Criticality,
    pub criticality_reasoning: String,
}

const PROMPT: &str = r#"You are an expert HR analyst AI. Analyze an anonymous feedback submission and provide a concise summary and a criticality rating.

Analyze the following submission:
Subject: {{{subject}}}
Message: {{{message}}}

Instructions:
1.  **Summary**: A neutral, one-sentence summary of the main point of the feedback.
2.  **Criticality**: One of 'Low', 'Medium', 'High', 'Critical'.
    -   'Low': General feedback, suggestions, minor issues.
    -   'Medium': Concerns affecting team morale, workflow issues, repeated minor problems.
    -   'High': Allegations of unfair treatment, significant project impact, potential policy gray areas.
    -   'Critical': Reports of harassment, discrimination, safety violations, or clear policy breaches.
3.  **Criticality Reasoning**: Briefly explain why you chose that level.

Generate the JSON output now."#;

pub fn spec() -> &'static FlowSpec {
    static SPEC: OnceLock<FlowSpec> = OnceLock::new();
    SPEC.get_or_init(|| {
        FlowSpec::new(
            SUMMARIZE_ANONYMOUS_FEEDBACK,
            Schema::new()
                .field(
                    "subject",
                    FieldSchema::string()
                        .non_empty()
                        .describe("Subject line of the anonymous feedback."),
                )
                .field(
                    "message",
                    FieldSchema::string()
                        .non_empty()
                        .describe("Detailed message of the anonymous feedback."),
                ),
            Schema::new()
                .field(
                    "summary",
                    FieldSchema::string()
                        .non_empty()
                        .describe("One-sentence summary of the core issue."),
                )
                .field(
                    "criticality",
                    FieldSchema::string()
                        .one_of(Criticality::ALL.map(Criticality::as_str))
                        .describe("Urgency and potential impact of the feedback."),
                )
                .field(
                    "criticalityReasoning",
                    FieldSchema::string()
                        .non_empty()
                        .describe("Justification for the assigned criticality."),
                ),
            PROMPT,
        )
        .unwrap()
    })
}

pub async fn summarize_anonymous_feedback(
    pipeline: &Pipeline,
    input: &SummarizeAnonymousFeedbackInput,
) -> Result<SummarizeAnonymousFeedbackOutput> {
    pipeline.run_typed(spec(), input).await
}
