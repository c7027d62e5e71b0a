//! Pre-1-on-1 briefing packet, tailored to whoever is about to read it.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::flow::{FlowSpec, Pipeline};
use crate::schema::{FieldSchema, Schema};

pub const GENERATE_BRIEFING_PACKET: &str = "generateBriefingPacket";

/// Viewer role that receives the employee-facing packet.
pub const EMPLOYEE_ROLE: &str = "Employee";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub date: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalInsight {
    pub date: String,
    pub summary: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    pub area: String,
    pub resource: String,
    pub progress: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefingPacketInput {
    pub supervisor_name: String,
    pub employee_name: String,
    pub viewer_role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub past_issues: Option<Vec<SessionSummary>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_items: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_critical_insights: Option<Vec<CriticalInsight>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coaching_goals_in_progress: Option<Vec<GoalProgress>>,
}

/// Supervisor packets fill the discussion, follow-up, coaching and question
/// lists; employee packets fill talking points and the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefingPacketOutput {
    pub action_item_analysis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_discussion_points: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outstanding_action_items: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coaching_opportunities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_questions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub talking_points: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_summary: Option<String>,
}

const PROMPT: &str = r#"You are an expert leadership and performance coach. Generate a concise, actionable pre-1-on-1 briefing packet. The content MUST be tailored to the person viewing it (the viewer).

**Context:**
- Supervisor: {{{supervisorName}}}
- Employee: {{{employeeName}}}
- Viewer: {{{viewerRole}}}

**Recent Sessions (Summary):**
{{#if pastIssues}}
{{#each pastIssues}}
- **Date:** {{this.date}}
  **Summary:** {{this.summary}}
{{/each}}
{{else}}
- No past sessions found.
{{/if}}

**All Past Action Items:**
{{#if actionItems}}
{{#each actionItems}}
- Task: "{{this}}"
{{/each}}
{{else}}
- No action items found.
{{/if}}

**Open Critical Insights (Visible to Supervisor Only):**
{{#if openCriticalInsights}}
{{#each openCriticalInsights}}
- **From Session on:** {{this.date}}
  **Insight:** {{this.summary}}
  **Status:** {{this.status}}
{{/each}}
{{else}}
- No open critical insights.
{{/if}}

**Supervisor's Active Coaching Goals (Visible to Supervisor Only):**
{{#if coachingGoalsInProgress}}
{{#each coachingGoalsInProgress}}
- **Goal:** {{this.area}} ({{this.resource}}) - {{this.progress}}% complete
{{/each}}
{{else}}
- No active coaching goals.
{{/if}}

---

**Your Task:**

Generate a JSON output SPECIFICALLY for the '{{{viewerRole}}}'.

**1. actionItemAnalysis**: Analyze the past action items. Who owns most of them, how many look completed, and are there patterns in the kinds of tasks assigned? Keep it brief and neutral.

{{#if isEmployeeView}}
**2. talkingPoints**: For the EMPLOYEE. 2-3 forward-looking talking points to bring to the meeting: progress, recent achievements and growth areas. Frame them positively.

**3. employeeSummary**: For the EMPLOYEE. A very brief, encouraging summary of their journey based on the session history.
{{else}}
**2. keyDiscussionPoints**: For the SUPERVISOR. 2-3 key themes or recurring topics from past sessions to follow up on.

**3. outstandingActionItems**: For the SUPERVISOR. Any critical unresolved issues, focusing on the open critical insights. If there are none, state that all critical items are resolved.

**4. coachingOpportunities**: For the SUPERVISOR. 1-2 specific ways to practice their active coaching goals in this meeting.

**5. suggestedQuestions**: For the SUPERVISOR. 3-4 insightful, open-ended questions inspired by the past issues and goals.
{{/if}}"#;

fn mark_viewer(fields: &mut Map<String, Value>) {
    let is_employee = fields.get("viewerRole").and_then(Value::as_str) == Some(EMPLOYEE_ROLE);
    fields.insert("isEmployeeView".into(), Value::Bool(is_employee));
}

pub fn spec() -> &'static FlowSpec {
    static SPEC: OnceLock<FlowSpec> = OnceLock::new();
    SPEC.get_or_init(|| {
        let session = Schema::new()
            .field("date", FieldSchema::string().non_empty())
            .field("summary", FieldSchema::string().non_empty());
        let insight = Schema::new()
            .field("date", FieldSchema::string().non_empty())
            .field("summary", FieldSchema::string().non_empty())
            .field(
                "status",
                FieldSchema::string().describe("Current status, e.g. 'open'."),
            );
        let goal = Schema::new()
            .field("area", FieldSchema::string().non_empty())
            .field("resource", FieldSchema::string().non_empty())
            .field(
                "progress",
                FieldSchema::integer()
                    .range(0.0, 100.0)
                    .describe("Completion percentage."),
            );
        let bullets = |what: &str| {
            FieldSchema::array(FieldSchema::string().non_empty())
                .optional()
                .describe(what)
        };

        FlowSpec::with_derived(
            GENERATE_BRIEFING_PACKET,
            Schema::new()
                .field("supervisorName", FieldSchema::string().non_empty())
                .field("employeeName", FieldSchema::string().non_empty())
                .field(
                    "viewerRole",
                    FieldSchema::string()
                        .non_empty()
                        .describe("Role of the person reading the packet, e.g. 'Employee' or 'Team Lead'."),
                )
                .field(
                    "pastIssues",
                    FieldSchema::array(FieldSchema::object(session))
                        .optional()
                        .describe("Summaries from the last few sessions."),
                )
                .field(
                    "actionItems",
                    FieldSchema::array(FieldSchema::string().non_empty()).optional(),
                )
                .field(
                    "openCriticalInsights",
                    FieldSchema::array(FieldSchema::object(insight)).optional(),
                )
                .field(
                    "coachingGoalsInProgress",
                    FieldSchema::array(FieldSchema::object(goal)).optional(),
                ),
            Schema::new()
                .field(
                    "actionItemAnalysis",
                    FieldSchema::string()
                        .non_empty()
                        .describe("Neutral analysis of past action items."),
                )
                .field(
                    "keyDiscussionPoints",
                    bullets("2-3 recurring topics to follow up on."),
                )
                .field(
                    "outstandingActionItems",
                    bullets("Unresolved critical insights or high-priority items."),
                )
                .field(
                    "coachingOpportunities",
                    bullets("1-2 ways to practice active coaching goals."),
                )
                .field(
                    "suggestedQuestions",
                    bullets("3-4 open-ended questions for the supervisor."),
                )
                .field(
                    "talkingPoints",
                    bullets("2-3 talking points for the employee."),
                )
                .field(
                    "employeeSummary",
                    FieldSchema::string()
                        .optional()
                        .describe("Encouraging summary for the employee."),
                ),
            PROMPT,
            &["isEmployeeView"],
            mark_viewer,
        )
        .unwrap()
    })
}

pub async fn generate_briefing_packet(
    pipeline: &Pipeline,
    input: &BriefingPacketInput,
) -> Result<BriefingPacketOutput> {
    pipeline.run_typed(spec(), input).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LaddrrError;
    use crate::flow::ScriptedCompletion;
    use serde_json::json;
    use std::sync::Arc;

    fn input(viewer: &str) -> BriefingPacketInput {
        BriefingPacketInput {
            supervisor_name: "Dana".into(),
            employee_name: "Sam".into(),
            viewer_role: viewer.into(),
            past_issues: Some(vec![SessionSummary {
                date: "March 3, 2025".into(),
                summary: "Tired but engaged.".into(),
            }]),
            action_items: Some(vec!["Supervisor to review release calendar".into()]),
            open_critical_insights: None,
            coaching_goals_in_progress: Some(vec![GoalProgress {
                area: "Active Listening".into(),
                resource: "Summarize concerns back".into(),
                progress: 40,
            }]),
        }
    }

    #[tokio::test]
    async fn supervisor_view_asks_for_supervisor_sections() {
        let svc = Arc::new(ScriptedCompletion::new().reply(json!({
            "actionItemAnalysis": "All items owned by the supervisor.",
            "keyDiscussionPoints": ["Workload"],
            "suggestedQuestions": ["What would make evenings lighter?"]
        })));
        let out = generate_briefing_packet(&Pipeline::new(svc.clone()), &input("Team Lead"))
            .await
            .unwrap();
        assert_eq!(out.key_discussion_points.unwrap(), vec!["Workload"]);

        let prompt = &svc.requests()[0].prompt;
        assert!(prompt.contains("**2. keyDiscussionPoints**"));
        assert!(!prompt.contains("talkingPoints"));
        assert!(prompt.contains("- **Date:** March 3, 2025\n  **Summary:** Tired but engaged.\n"));
        assert!(prompt.contains("- Task: \"Supervisor to review release calendar\"\n"));
        assert!(prompt.contains("- No open critical insights.\n"));
        assert!(prompt.contains("- **Goal:** Active Listening (Summarize concerns back) - 40% complete\n"));
    }

    #[tokio::test]
    async fn employee_view_asks_for_talking_points() {
        let svc = Arc::new(ScriptedCompletion::new().reply(json!({
            "actionItemAnalysis": "One open item.",
            "talkingPoints": ["Release ownership"],
            "employeeSummary": "Steady progress."
        })));
        let out = generate_briefing_packet(&Pipeline::new(svc.clone()), &input(EMPLOYEE_ROLE))
            .await
            .unwrap();
        assert_eq!(out.employee_summary.as_deref(), Some("Steady progress."));

        let prompt = &svc.requests()[0].prompt;
        assert!(prompt.contains("**2. talkingPoints**"));
        assert!(!prompt.contains("keyDiscussionPoints"));
    }

    #[tokio::test]
    async fn caller_cannot_set_the_view_flag() {
        let svc = Arc::new(ScriptedCompletion::new());
        let mut raw = serde_json::to_value(input("Team Lead")).unwrap();
        raw["isEmployeeView"] = json!(true);
        let err = Pipeline::new(svc.clone()).run(spec(), &raw).await.unwrap_err();
        assert!(matches!(err, LaddrrError::InvalidInput { .. }));
        assert_eq!(svc.calls(), 0);
    }
}
