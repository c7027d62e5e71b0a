//! Coaching flows: the daily tip and development-goal suggestions.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::flow::{FlowSpec, Pipeline};
use crate::schema::{FieldSchema, Schema};

pub const DAILY_COACHING_TIP: &str = "dailyCoachingTip";
pub const DEVELOPMENT_SUGGESTION: &str = "developmentSuggestion";

// ---------------------------------------------------------------------------
// dailyCoachingTip
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCoachingTipInput {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_themes: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCoachingTipOutput {
    pub tip: String,
}

const TIP_PROMPT: &str = r#"You are an expert executive coach. Generate a single micro-coaching tip for a user based on their role.

If recent performance themes are provided, tailor the tip to one of them. Otherwise give a general but useful tip for the role.

The tip must be short, actionable and encouraging. Frame it as a "Tip of the Day".

**User Role:** {{{role}}}
{{#if recentThemes}}
**Recent Themes:** {{#each recentThemes}}{{{this}}}{{#unless @last}}, {{/unless}}{{/each}}
{{/if}}

**Examples:**
- "Tip of the Day: In your next meeting, summarize the key takeaway in your own words. It is a great way to practice active listening."
- "Tip of the Day: When giving feedback today, start by stating your positive intent, for example 'I'm sharing this because I want to see you succeed.'"

Generate one coaching tip now."#;

pub fn tip_spec() -> &'static FlowSpec {
    static SPEC: OnceLock<FlowSpec> = OnceLock::new();
    SPEC.get_or_init(|| {
        FlowSpec::new(
            DAILY_COACHING_TIP,
            Schema::new()
                .field(
                    "role",
                    FieldSchema::string()
                        .non_empty()
                        .describe("The user's role, e.g. 'Employee' or 'Team Lead'."),
                )
                .field(
                    "recentThemes",
                    FieldSchema::array(FieldSchema::string().non_empty())
                        .optional()
                        .describe("Recent performance themes, e.g. ['Clarity', 'Empathy']."),
                ),
            Schema::new().field(
                "tip",
                FieldSchema::string()
                    .non_empty()
                    .describe("A single, concise, actionable coaching tip for the day."),
            ),
            TIP_PROMPT,
        )
        .unwrap()
    })
}

pub async fn daily_coaching_tip(
    pipeline: &Pipeline,
    input: &DailyCoachingTipInput,
) -> Result<DailyCoachingTipOutput> {
    pipeline.run_typed(tip_spec(), input).await
}

// ---------------------------------------------------------------------------
// developmentSuggestion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PastIssue {
    pub employee_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missed_signals: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_insight_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coaching_recs: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachingGoal {
    pub area: String,
    pub resource: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevelopmentSuggestionInput {
    pub user_name: String,
    pub past_issues: Vec<PastIssue>,
    pub coaching_goals_in_progress: Vec<CoachingGoal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub area: String,
    pub resource: String,
    pub justification: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevelopmentSuggestionOutput {
    pub suggestions: Vec<Suggestion>,
}

const SUGGESTION_PROMPT: &str = r#"You are an expert executive coach. Analyze a user's recent performance history and active development goals, then suggest 1-2 highly relevant, concrete development goals.

**Context:**
- User: {{{userName}}}

**Recent Performance & Feedback (sessions where they were the supervisor):**
{{#if pastIssues}}
{{#each pastIssues}}
- **With {{this.employeeName}}:**
{{#if this.missedSignals}}
  - Missed Signals: {{#each this.missedSignals}}'{{this}}'{{#unless @last}}, {{/unless}}{{/each}}
{{/if}}
{{#if this.criticalInsightSummary}}
  - Critical Insight: "{{this.criticalInsightSummary}}"
{{/if}}
{{#if this.coachingRecs}}
  - AI Coaching Recs: {{#each this.coachingRecs}}'{{this}}'{{#unless @last}}, {{/unless}}{{/each}}
{{/if}}
{{/each}}
{{else}}
- No past sessions found.
{{/if}}

**User's Active Coaching Goals:**
{{#if coachingGoalsInProgress}}
{{#each coachingGoalsInProgress}}
- **Goal:** Practice '{{this.area}}' (Related to: {{this.resource}})
{{/each}}
{{else}}
- No active coaching goals.
{{/if}}

---

**Your Task:**

From the context, identify recurring themes or significant gaps in the user's performance: a repeated type of missed signal, a critical insight that needs practice, or a theme from past coaching recommendations.

Produce a JSON object with a 'suggestions' array of 1-2 development goals. Each must have:
1.  **area**: A high-level skill to improve (e.g. "Conflict Resolution", "Giving Recognition").
2.  **resource**: A *specific, actionable activity* (e.g. "Initiate a conversation with a disengaged employee", not "Read a book").
3.  **justification**: One sentence on *why* this goal fits their history.

Generate the suggestions now."#;

pub fn suggestion_spec() -> &'static FlowSpec {
    static SPEC: OnceLock<FlowSpec> = OnceLock::new();
    SPEC.get_or_init(|| {
        let past_issue = Schema::new()
            .field("employeeName", FieldSchema::string().non_empty())
            .field(
                "missedSignals",
                FieldSchema::array(FieldSchema::string()).optional(),
            )
            .field("criticalInsightSummary", FieldSchema::string().optional())
            .field(
                "coachingRecs",
                FieldSchema::array(FieldSchema::string()).optional(),
            );
        let goal = Schema::new()
            .field("area", FieldSchema::string().non_empty())
            .field("resource", FieldSchema::string().non_empty());
        let suggestion = Schema::new()
            .field(
                "area",
                FieldSchema::string()
                    .non_empty()
                    .describe("High-level skill to improve, e.g. 'Public Speaking'."),
            )
            .field(
                "resource",
                FieldSchema::string()
                    .non_empty()
                    .describe("Specific, actionable activity the user can undertake."),
            )
            .field(
                "justification",
                FieldSchema::string()
                    .non_empty()
                    .describe("Why this suggestion fits the user's history."),
            );

        FlowSpec::new(
            DEVELOPMENT_SUGGESTION,
            Schema::new()
                .field("userName", FieldSchema::string().non_empty())
                .field("pastIssues", FieldSchema::array(FieldSchema::object(past_issue)))
                .field(
                    "coachingGoalsInProgress",
                    FieldSchema::array(FieldSchema::object(goal)),
                ),
            Schema::new().field(
                "suggestions",
                FieldSchema::array(FieldSchema::object(suggestion)).items(Some(1), Some(2)),
            ),
            SUGGESTION_PROMPT,
        )
        .unwrap()
    })
}

pub async fn development_suggestion(
    pipeline: &Pipeline,
    input: &DevelopmentSuggestionInput,
) -> Result<DevelopmentSuggestionOutput> {
    pipeline.run_typed(suggestion_spec(), input).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
