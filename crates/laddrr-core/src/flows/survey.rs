//! Organizational-health survey flows: question generation and result
//! summarization.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::flow::{FlowSpec, Pipeline};
use crate::schema::{FieldSchema, Schema};

pub const GENERATE_SURVEY_QUESTIONS: &str = "generateSurveyQuestions";
pub const SUMMARIZE_SURVEY_RESULTS: &str = "summarizeSurveyResults";

// ---------------------------------------------------------------------------
// generateSurveyQuestions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSurveyQuestionsInput {
    pub objective: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyQuestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub question_text: String,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_custom: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSurveyQuestionsOutput {
    pub questions: Vec<SurveyQuestion>,
}

/// Shape of one survey question, shared by the flow output and deployed
/// surveys.
pub fn question_schema() -> Schema {
    Schema::new()
        .field(
            "id",
            FieldSchema::string()
                .optional()
                .describe("Unique ID for the question, added after generation."),
        )
        .field(
            "questionText",
            FieldSchema::string()
                .non_empty()
                .describe("The exact text of the question shown to employees."),
        )
        .field(
            "reasoning",
            FieldSchema::string()
                .non_empty()
                .describe("Why this question is valuable and what it helps measure."),
        )
        .field(
            "isCustom",
            FieldSchema::boolean()
                .optional()
                .describe("True when the question was added by a person rather than generated."),
        )
}

const GENERATE_PROMPT: &str = r#"You are an expert in organizational psychology and survey design. An HR Head wants to create an anonymized survey to check the health of the organization.

**Survey Objective:**
"{{objective}}"

**Your Task:**
Generate 5-7 relevant, insightful and neutrally-worded survey questions that help measure the stated objective. The questions must suit a general employee audience. For each question you MUST give clear reasoning for why it is asked and how it helps measure the objective.

- 'questionText' is the exact question shown to the employee.
- 'reasoning' explains the purpose of the question to the HR Head.

Generate the JSON output with the 'questions' array now."#;

pub fn generate_questions_spec() -> &'static FlowSpec {
    static SPEC: OnceLock<FlowSpec> = OnceLock::new();
    SPEC.get_or_init(|| {
        FlowSpec::new(
            GENERATE_SURVEY_QUESTIONS,
            Schema::new().field(
                "objective",
                FieldSchema::string()
                    .non_empty()
                    .describe("The high-level objective of the survey."),
            ),
            Schema::new().field(
                "questions",
                FieldSchema::array(FieldSchema::object(question_schema()))
                    .items(Some(5), Some(7))
                    .describe("Suggested survey questions."),
            ),
            GENERATE_PROMPT,
        )
        .unwrap()
    })
}

pub async fn generate_survey_questions(
    pipeline: &Pipeline,
    input: &GenerateSurveyQuestionsInput,
) -> Result<GenerateSurveyQuestionsOutput> {
    pipeline.run_typed(generate_questions_spec(), input).await
}

// ---------------------------------------------------------------------------
// summarizeSurveyResults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeSurveyResultsInput {
    pub survey_objective: String,
    pub anonymous_responses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyTheme {
    pub theme: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeSurveyResultsOutput {
    pub overall_sentiment: String,
    pub key_themes: Vec<KeyTheme>,
    pub recommendations: Vec<String>,
}

/// Shape of a survey results report, also consumed by the leadership pulse.
pub fn results_summary_schema() -> Schema {
    Schema::new()
        .field(
            "overallSentiment",
            FieldSchema::string()
                .non_empty()
                .describe("High-level summary of the overall mood."),
        )
        .field(
            "keyThemes",
            FieldSchema::array(FieldSchema::object(
                Schema::new()
                    .field("theme", FieldSchema::string().non_empty())
                    .field("summary", FieldSchema::string().non_empty()),
            ))
            .items(Some(1), None)
            .describe("Top recurring themes."),
        )
        .field(
            "recommendations",
            FieldSchema::array(FieldSchema::string().non_empty())
                .items(Some(1), None)
                .describe("Concrete, actionable recommendations."),
        )
}

const SUMMARIZE_PROMPT: &str = r#"You are an expert HR analyst specializing in sentiment analysis and organizational health. You have received a set of anonymous employee responses from a survey.

**Survey Objective:**
"{{surveyObjective}}"

**Anonymous Responses:**
---
{{#each anonymousResponses}}
- "{{this}}"
{{/each}}
---

**Your Task:**
Analyze the raw, anonymous feedback and produce a structured JSON report for the HR Head.

1.  **overallSentiment**: A high-level summary of the overall mood. Positive, negative or mixed, and the general feeling behind it.
2.  **keyThemes**: The top 3-4 recurring themes. For each, a 'theme' name (e.g. 'Work-Life Balance') and a 'summary' of what employees are saying about it.
3.  **recommendations**: 2-3 concrete, actionable recommendations for the HR Head based on the themes.

Generate the summary report now."#;

pub fn summarize_results_spec() -> &'static FlowSpec {
    static SPEC: OnceLock<FlowSpec> = OnceLock::new();
    SPEC.get_or_init(|| {
        FlowSpec::new(
            SUMMARIZE_SURVEY_RESULTS,
            Schema::new()
                .field(
                    "surveyObjective",
                    FieldSchema::string()
                        .non_empty()
                        .describe("The original objective of the survey."),
                )
                .field(
                    "anonymousResponses",
                    FieldSchema::array(FieldSchema::string())
                        .items(Some(1), None)
                        .describe("Every raw, anonymous text response."),
                ),
            results_summary_schema(),
            SUMMARIZE_PROMPT,
        )
        .unwrap()
    })
}

pub async fn summarize_survey_results(
    pipeline: &Pipeline,
    input: &SummarizeSurveyResultsInput,
) -> Result<SummarizeSurveyResultsOutput> {
    pipeline.run_typed(summarize_results_spec(), input).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
