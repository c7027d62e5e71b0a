//! Leadership pulse: a follow-up survey for team leads and managers, built
//! from the summary of an anonymous employee survey.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::flow::{FlowSpec, Pipeline};
use crate::flows::survey::{results_summary_schema, SummarizeSurveyResultsOutput};
use crate::schema::{FieldSchema, Schema};

pub const GENERATE_LEADERSHIP_PULSE: &str = "generateLeadershipPulse";

pub const QUESTION_TYPES: [&str; 3] = ["rating", "multiple-choice", "free-text"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateLeadershipPulseInput {
    pub survey_objective: String,
    pub anonymous_survey_summary: SummarizeSurveyResultsOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadershipQuestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub question_text: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateLeadershipPulseOutput {
    pub questions: Vec<LeadershipQuestion>,
}

const PROMPT: &str = r#"You are an expert in organizational development and leadership coaching. You have the results of an anonymous employee survey. Generate a short, targeted follow-up survey for leadership roles (Team Leads, AMs, Managers) that diagnoses the root causes of the employee feedback.

**Anonymous Survey Objective:** "{{surveyObjective}}"

**AI-Generated Summary of Anonymous Feedback:**
- **Overall Sentiment:** {{anonymousSurveySummary.overallSentiment}}
- **Key Themes:**
{{#each anonymousSurveySummary.keyThemes}}
  - **{{this.theme}}**: {{this.summary}}
{{/each}}
- **Recommendations:**
{{#each anonymousSurveySummary.recommendations}}
  - {{this}}
{{/each}}

**Your Task:**
Create 3-5 insightful multiple-choice or rating-scale questions for leaders that clarify the "why" behind the employee sentiment. Give each question a brief reasoning.

**Example Question Format:**
- questionText: "How confident are you in your team's understanding of our current project priorities? (1-5 scale)"
- type: "rating"
- reasoning: "Targets the 'Clarity from Leadership' theme and shows whether communication gaps exist."
- options: ["1 - Not Confident", "2", "3 - Somewhat Confident", "4", "5 - Very Confident"]

Generate the JSON output with the 'questions' array now. The questions are for the leaders, not the employees."#;

pub fn spec() -> &'static FlowSpec {
    static SPEC: OnceLock<FlowSpec> = OnceLock::new();
    SPEC.get_or_init(|| {
        let question = Schema::new()
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
                    .describe("The exact text of the question asked to a leader."),
            )
            .field(
                "type",
                FieldSchema::string()
                    .one_of(QUESTION_TYPES)
                    .describe("The type of question."),
            )
            .field(
                "reasoning",
                FieldSchema::string()
                    .non_empty()
                    .describe("Why this question helps diagnose leadership behaviors."),
            )
            .field(
                "options",
                FieldSchema::array(FieldSchema::string())
                    .optional()
                    .describe("Choices for multiple-choice or rating questions."),
            );

        FlowSpec::new(
            GENERATE_LEADERSHIP_PULSE,
            Schema::new()
                .field(
                    "surveyObjective",
                    FieldSchema::string()
                        .non_empty()
                        .describe("The original objective of the anonymous employee survey."),
                )
                .field(
                    "anonymousSurveySummary",
                    FieldSchema::object(results_summary_schema())
                        .describe("The summary of the anonymous survey results."),
                ),
            Schema::new().field(
                "questions",
                FieldSchema::array(FieldSchema::object(question))
                    .items(Some(3), Some(5))
                    .describe("Questions for the leadership pulse survey."),
            ),
            PROMPT,
        )
        .unwrap()
    })
}

/// Generate the pulse questions. Every question comes back with an id.
pub async fn generate_leadership_pulse(
    pipeline: &Pipeline,
    input: &GenerateLeadershipPulseInput,
) -> Result<GenerateLeadershipPulseOutput> {
    let mut out: GenerateLeadershipPulseOutput = pipeline.run_typed(spec(), input).await?;
    for q in &mut out.questions {
        if q.id.as_deref().map_or(true, str::is_empty) {
            q.id = Some(uuid::Uuid::new_v4().to_string());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LaddrrError;
    use crate::flow::ScriptedCompletion;
    use crate::flows::survey::KeyTheme;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn input() -> GenerateLeadershipPulseInput {
        GenerateLeadershipPulseInput {
            survey_objective: "measure morale".into(),
            anonymous_survey_summary: SummarizeSurveyResultsOutput {
                overall_sentiment: "Mixed.".into(),
                key_themes: vec![
                    KeyTheme {
                        theme: "Workload".into(),
                        summary: "Teams feel stretched.".into(),
                    },
                    KeyTheme {
                        theme: "Recognition".into(),
                        summary: "Wins go unnoticed.".into(),
                    },
                ],
                recommendations: vec!["Review sprint commitments.".into()],
            },
        }
    }

    fn questions(n: usize) -> Value {
        let qs: Vec<Value> = (1..=n)
            .map(|i| {
                json!({
                    "questionText": format!("Leader question {i}?"),
                    "type": "rating",
                    "reasoning": "Checks workload.",
                    "options": ["1", "2", "3", "4", "5"]
                })
            })
            .collect();
        json!({ "questions": qs })
    }

    #[tokio::test]
    async fn questions_get_ids_and_prompt_lists_themes() {
        let svc = Arc::new(ScriptedCompletion::new().reply(questions(3)));
        let out = generate_leadership_pulse(&Pipeline::new(svc.clone()), &input())
            .await
            .unwrap();
        assert_eq!(out.questions.len(), 3);
        assert!(out.questions.iter().all(|q| q.id.is_some()));
        assert_eq!(out.questions[0].kind, "rating");

        let prompt = &svc.requests()[0].prompt;
        assert!(prompt.contains("- **Overall Sentiment:** Mixed.\n"));
        assert!(prompt.contains(
            "  - **Workload**: Teams feel stretched.\n  - **Recognition**: Wins go unnoticed.\n"
        ));
        assert!(prompt.contains("- **Recommendations:**\n  - Review sprint commitments.\n"));
    }

    #[tokio::test]
    async fn unknown_question_type_is_a_generation_failure() {
        let mut reply = questions(3);
        reply["questions"][1]["type"] = json!("essay");
        let svc = Arc::new(ScriptedCompletion::new().reply(reply));
        let err = generate_leadership_pulse(&Pipeline::new(svc), &input())
            .await
            .unwrap_err();
        assert!(matches!(err, LaddrrError::GenerationFailed { .. }));
    }

    #[tokio::test]
    async fn summary_without_themes_is_rejected() {
        let svc = Arc::new(ScriptedCompletion::new().reply(questions(3)));
        let mut bad = input();
        bad.anonymous_survey_summary.key_themes.clear();
        let err = generate_leadership_pulse(&Pipeline::new(svc.clone()), &bad)
            .await
            .unwrap_err();
        assert!(matches!(err, LaddrrError::InvalidInput { .. }));
        assert_eq!(svc.calls(), 0);
    }
}
