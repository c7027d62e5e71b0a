//! Coaching feedback on a recorded 1-on-1 session.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::flow::{FlowSpec, Pipeline};
use crate::schema::{FieldSchema, Schema};

pub const ANALYZE_ONE_ON_ONE: &str = "analyzeOneOnOne";

pub const FEEDBACK_TONES: [&str; 4] = ["Constructive", "Positive", "Corrective", "Neutral"];
pub const RECEPTIONS: [&str; 3] = ["Fully", "Partially", "Not Well"];
pub const STRESS_ANSWERS: [&str; 3] = ["Yes", "No", "Unsure"];

/// What the supervisor recorded after the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeOneOnOneInput {
    pub location: String,
    pub live_conversation: bool,
    pub employee_aware: bool,
    pub primary_feedback: String,
    pub feedback_tone: String,
    pub employee_accepted_feedback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improvement_areas: Option<String>,
    pub growth_rating: String,
    pub showed_signs_of_stress: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stress_description: Option<String>,
    pub expressed_aspirations: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspiration_details: Option<String>,
    pub did_appreciate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appreciation_message: Option<String>,
    pub is_cross_functional: bool,
    pub broadcast_appreciation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeOneOnOneOutput {
    pub key_themes: Vec<String>,
    pub action_items: Vec<String>,
    pub sentiment_analysis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_alert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coaching_impact_analysis: Option<String>,
}

const PROMPT: &str = r#"You are an expert HR analyst and executive coach. Analyze the feedback recorded after a 1-on-1 session and produce a structured, insightful summary.

Session data:
- **Location**: {{{location}}}
- **Feedback Tone**: {{{feedbackTone}}}
- **How Feedback Was Received**: {{{employeeAcceptedFeedback}}}
- **Growth/Performance Rating (1-5)**: {{{growthRating}}}
- **Signs of Stress**: {{{showedSignsOfStress}}}{{#if stressDescription}} (Details: {{{stressDescription}}}){{/if}}
- **Expressed Aspirations**: {{#if expressedAspirations}}Yes{{#if aspirationDetails}} (Details: {{{aspirationDetails}}}){{/if}}{{else}}No{{/if}}
- **Appreciation Given**: {{#if didAppreciate}}Yes{{#if appreciationMessage}} (Message: {{{appreciationMessage}}}){{/if}}{{else}}No{{/if}}

**Primary Feedback & Key Points Discussed**:
<feedback>
{{{primaryFeedback}}}
</feedback>

**Specific Improvement Areas Mentioned**:
<improvement>
{{{improvementAreas}}}
</improvement>

**Other Comments**:
<comments>
{{{otherComments}}}
</comments>

{{#if transcript}}
**Conversation Transcript**:
<transcript>
{{{transcript}}}
</transcript>
{{/if}}

Using ALL of the information above, produce the JSON output:

1.  **keyThemes**: The 3-5 most important themes: performance, goals, challenges or morale.
2.  **actionItems**: Clear next steps, with an owner where possible (e.g. "Supervisor to schedule follow-up").
3.  **sentimentAnalysis**: The overall mood. Consider how the feedback was received and any signs of stress.
4.  **escalationAlert**: CRITICAL. Look for red flags that may need HR: harassment, discrimination, extreme burnout, clear intent to quit, serious policy violations. If found, write a concise, professional alert. Otherwise OMIT this field.
5.  **coachingImpactAnalysis**: The single area where the supervisor's coaching would have the most impact."#;

pub fn spec() -> &'static FlowSpec {
    static SPEC: OnceLock<FlowSpec> = OnceLock::new();
    SPEC.get_or_init(|| {
        let text = || FieldSchema::string().optional();
        FlowSpec::new(
            ANALYZE_ONE_ON_ONE,
            Schema::new()
                .field("location", FieldSchema::string().non_empty())
                .field("liveConversation", FieldSchema::boolean())
                .field("employeeAware", FieldSchema::boolean())
                .field(
                    "primaryFeedback",
                    FieldSchema::string()
                        .non_empty()
                        .describe("Key points the supervisor discussed."),
                )
                .field("feedbackTone", FieldSchema::string().one_of(FEEDBACK_TONES))
                .field(
                    "employeeAcceptedFeedback",
                    FieldSchema::string().one_of(RECEPTIONS),
                )
                .field("improvementAreas", text())
                .field(
                    "growthRating",
                    FieldSchema::string().one_of(["1", "2", "3", "4", "5"]),
                )
                .field(
                    "showedSignsOfStress",
                    FieldSchema::string().one_of(STRESS_ANSWERS),
                )
                .field("stressDescription", text())
                .field("expressedAspirations", FieldSchema::boolean())
                .field("aspirationDetails", text())
                .field("didAppreciate", FieldSchema::boolean())
                .field("appreciationMessage", text())
                .field("isCrossFunctional", FieldSchema::boolean())
                .field("broadcastAppreciation", FieldSchema::boolean())
                .field("otherComments", text())
                .field(
                    "transcript",
                    text().describe("Optional transcript of the conversation."),
                ),
            Schema::new()
                .field(
                    "keyThemes",
                    FieldSchema::array(FieldSchema::string().non_empty())
                        .items(Some(1), None)
                        .describe("3-5 key themes that emerged from the conversation."),
                )
                .field(
                    "actionItems",
                    FieldSchema::array(FieldSchema::string().non_empty())
                        .describe("Actionable items for the employee or supervisor."),
                )
                .field(
                    "sentimentAnalysis",
                    FieldSchema::string()
                        .non_empty()
                        .describe("Overall sentiment and tone of the conversation."),
                )
                .field(
                    "escalationAlert",
                    FieldSchema::string()
                        .optional()
                        .describe("Concise alert when the conversation contains red flags."),
                )
                .field(
                    "coachingImpactAnalysis",
                    FieldSchema::string()
                        .optional()
                        .describe("Where the supervisor's coaching could have the most impact."),
                ),
            PROMPT,
        )
        .unwrap()
    })
}

pub async fn analyze_one_on_one(
    pipeline: &Pipeline,
    input: &AnalyzeOneOnOneInput,
) -> Result<AnalyzeOneOnOneOutput> {
    pipeline.run_typed(spec(), input).await
}

#[cfg(test)]
pub(crate) fn sample_input() -> AnalyzeOneOnOneInput {
    AnalyzeOneOnOneInput {
        location: "Meeting room 2".into(),
        live_conversation: true,
        employee_aware: true,
        primary_feedback: "Release notes were late twice this month.".into(),
        feedback_tone: "Constructive".into(),
        employee_accepted_feedback: "Partially".into(),
        improvement_areas: None,
        growth_rating: "3".into(),
        showed_signs_of_stress: "Yes".into(),
        stress_description: Some("Mentioned long evenings".into()),
        expressed_aspirations: true,
        aspiration_details: None,
        did_appreciate: false,
        appreciation_message: Some("ignored when not appreciating".into()),
        is_cross_functional: false,
        broadcast_appreciation: false,
        other_comments: None,
        transcript: None,
    }
}
