//! Recorded 1-on-1 sessions and the briefing packets built from them.
//!
//! Each session is analyzed once when it is recorded; the analysis is stored
//! with the supervisor and employee names so later briefings can draw on the
//! pair's history.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LaddrrError, Result};
use crate::flow::Pipeline;
use crate::flows::briefing::{
    generate_briefing_packet, BriefingPacketInput, BriefingPacketOutput, CriticalInsight,
    SessionSummary,
};
use crate::flows::one_on_one::{analyze_one_on_one, AnalyzeOneOnOneInput, AnalyzeOneOnOneOutput};
use crate::schema::{FieldSchema, Schema};
use crate::store::{Record, Store};

pub const HISTORY_KEY: &str = "one_on_one_history_v3";

pub const RECORD_ONE_ON_ONE: &str = "recordOneOnOne";
pub const PREPARE_BRIEFING: &str = "prepareBriefing";

/// Sessions summarized in a briefing.
const BRIEFING_SESSIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneOnOneHistoryItem {
    #[serde(default)]
    pub id: String,
    pub supervisor_name: String,
    pub employee_name: String,
    #[serde(default)]
    pub date: String,
    pub analysis: AnalyzeOneOnOneOutput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
}

impl Record for OneOnOneHistoryItem {
    const ID_FIELD: &'static str = "id";
    const CREATED_FIELD: &'static str = "date";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSessionInput {
    pub supervisor_name: String,
    pub employee_name: String,
    pub session: AnalyzeOneOnOneInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefingRequest {
    pub supervisor_name: String,
    pub employee_name: String,
    pub viewer_role: String,
}

fn pair_schema() -> Schema {
    Schema::new()
        .field("supervisorName", FieldSchema::string().non_empty())
        .field("employeeName", FieldSchema::string().non_empty())
}

pub fn briefing_request_schema() -> Schema {
    pair_schema().field(
        "viewerRole",
        FieldSchema::string()
            .non_empty()
            .describe("Role of the person reading the packet."),
    )
}

fn check_pair(flow: &str, supervisor: &str, employee: &str) -> Result<()> {
    pair_schema()
        .validate(&serde_json::json!({
            "supervisorName": supervisor,
            "employeeName": employee,
        }))
        .map_err(|violations| LaddrrError::InvalidInput {
            flow: flow.to_string(),
            violations,
        })
}

/// Check the names on a session before any model call.
pub fn validate_session(input: &RecordSessionInput) -> Result<()> {
    check_pair(RECORD_ONE_ON_ONE, &input.supervisor_name, &input.employee_name)
}

pub fn parse_briefing_request(input: &Value) -> Result<BriefingRequest> {
    briefing_request_schema()
        .validate(input)
        .map_err(|violations| LaddrrError::InvalidInput {
            flow: PREPARE_BRIEFING.to_string(),
            violations,
        })?;
    Ok(serde_json::from_value(input.clone())?)
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Persist an analyzed session. A blank id or date is filled in.
pub fn save(store: &Store, item: OneOnOneHistoryItem) -> Result<OneOnOneHistoryItem> {
    check_pair(RECORD_ONE_ON_ONE, &item.supervisor_name, &item.employee_name)?;
    let saved = store.append(HISTORY_KEY, item)?;
    tracing::info!(
        id = %saved.id,
        escalated = saved.analysis.escalation_alert.is_some(),
        "1-on-1 session recorded"
    );
    Ok(saved)
}

/// Every session, newest first.
pub fn list_all(store: &Store) -> Result<Vec<OneOnOneHistoryItem>> {
    store.list(HISTORY_KEY, |_| true)
}

/// Sessions between one supervisor and one employee, newest first.
pub fn for_pair(store: &Store, supervisor: &str, employee: &str) -> Result<Vec<OneOnOneHistoryItem>> {
    store.list(HISTORY_KEY, |i: &OneOnOneHistoryItem| {
        i.supervisor_name == supervisor && i.employee_name == employee
    })
}

pub fn get(store: &Store, id: &str) -> Result<Option<OneOnOneHistoryItem>> {
    store.get(HISTORY_KEY, id)
}

/// Analyze a session and store the result. Nothing is stored when the
/// analysis fails.
pub async fn record_session(
    store: &Store,
    pipeline: &Pipeline,
    input: &RecordSessionInput,
) -> Result<OneOnOneHistoryItem> {
    validate_session(input)?;
    let analysis = analyze_one_on_one(pipeline, &input.session).await?;
    save(store, new_item(input, analysis))
}

/// An unsaved history item for `input`.
pub fn new_item(input: &RecordSessionInput, analysis: AnalyzeOneOnOneOutput) -> OneOnOneHistoryItem {
    OneOnOneHistoryItem {
        id: String::new(),
        supervisor_name: input.supervisor_name.clone(),
        employee_name: input.employee_name.clone(),
        date: String::new(),
        analysis,
        assigned_to: None,
    }
}

// ---------------------------------------------------------------------------
// Briefings
// ---------------------------------------------------------------------------

fn display_date(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.format("%B %-d, %Y").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

/// Assemble the briefing flow input from the pair's stored sessions.
pub fn briefing_input(store: &Store, request: &BriefingRequest) -> Result<BriefingPacketInput> {
    parse_briefing_request(&serde_json::to_value(request)?)?;
    let sessions = for_pair(store, &request.supervisor_name, &request.employee_name)?;

    let past_issues = sessions
        .iter()
        .take(BRIEFING_SESSIONS)
        .map(|s| SessionSummary {
            date: display_date(&s.date),
            summary: s.analysis.sentiment_analysis.clone(),
        })
        .collect();
    let action_items = sessions
        .iter()
        .flat_map(|s| s.analysis.action_items.iter().cloned())
        .collect();
    let insights = sessions
        .iter()
        .filter_map(|s| {
            s.analysis.escalation_alert.as_ref().map(|alert| CriticalInsight {
                date: display_date(&s.date),
                summary: alert.clone(),
                status: "open".into(),
            })
        })
        .collect();

    Ok(BriefingPacketInput {
        supervisor_name: request.supervisor_name.clone(),
        employee_name: request.employee_name.clone(),
        viewer_role: request.viewer_role.clone(),
        past_issues: non_empty(past_issues),
        action_items: non_empty(action_items),
        open_critical_insights: non_empty(insights),
        coaching_goals_in_progress: None,
    })
}

/// Generate a briefing packet for the pair from their stored history.
pub async fn briefing(
    store: &Store,
    pipeline: &Pipeline,
    request: &BriefingRequest,
) -> Result<BriefingPacketOutput> {
    let input = briefing_input(store, request)?;
    generate_briefing_packet(pipeline, &input).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::ScriptedCompletion;
    use crate::flows::briefing::GENERATE_BRIEFING_PACKET;
    use crate::flows::one_on_one::sample_input;
    use serde_json::json;
    use std::sync::Arc;

    fn analysis(sentiment: &str, items: &[&str], alert: Option<&str>) -> AnalyzeOneOnOneOutput {
        AnalyzeOneOnOneOutput {
            key_themes: vec!["Workload".into()],
            action_items: items.iter().map(|s| s.to_string()).collect(),
            sentiment_analysis: sentiment.into(),
            escalation_alert: alert.map(str::to_string),
            coaching_impact_analysis: None,
        }
    }

    fn item(supervisor: &str, employee: &str, date: &str, a: AnalyzeOneOnOneOutput) -> OneOnOneHistoryItem {
        OneOnOneHistoryItem {
            id: String::new(),
            supervisor_name: supervisor.into(),
            employee_name: employee.into(),
            date: date.into(),
            analysis: a,
            assigned_to: None,
        }
    }

    fn request(viewer: &str) -> BriefingRequest {
        BriefingRequest {
            supervisor_name: "Dana".into(),
            employee_name: "Sam".into(),
            viewer_role: viewer.into(),
        }
    }

    #[test]
    fn save_fills_identity_and_date() {
        let store = Store::in_memory();
        let saved = save(&store, item("Dana", "Sam", "", analysis("Calm.", &[], None))).unwrap();
        assert!(!saved.id.is_empty());
        assert!(DateTime::parse_from_rfc3339(&saved.date).is_ok());
        assert_eq!(get(&store, &saved.id).unwrap(), Some(saved));
    }

    #[test]
    fn save_rejects_blank_names() {
        let store = Store::in_memory();
        let err = save(&store, item("  ", "Sam", "", analysis("Calm.", &[], None))).unwrap_err();
        let LaddrrError::InvalidInput { flow, violations } = err else {
            panic!("expected InvalidInput");
        };
        assert_eq!(flow, RECORD_ONE_ON_ONE);
        assert_eq!(violations[0].path, "supervisorName");
        assert!(list_all(&store).unwrap().is_empty());
    }

    #[test]
    fn pair_history_is_newest_first_and_scoped() {
        let store = Store::in_memory();
        save(&store, item("Dana", "Sam", "2025-01-10T09:00:00Z", analysis("Old.", &[], None))).unwrap();
        save(&store, item("Dana", "Ana", "2025-02-10T09:00:00Z", analysis("Other.", &[], None))).unwrap();
        save(&store, item("Dana", "Sam", "2025-03-10T09:00:00Z", analysis("New.", &[], None))).unwrap();

        let sentiments: Vec<String> = for_pair(&store, "Dana", "Sam")
            .unwrap()
            .into_iter()
            .map(|i| i.analysis.sentiment_analysis)
            .collect();
        assert_eq!(sentiments, vec!["New.", "Old."]);
        assert_eq!(list_all(&store).unwrap().len(), 3);
    }

    #[test]
    fn briefing_input_draws_on_recent_sessions() {
        let store = Store::in_memory();
        for (day, sentiment) in [(1, "First."), (2, "Second."), (3, "Third."), (4, "Fourth.")] {
            let alert = (day == 2).then_some("Mentioned quitting.");
            save(
                &store,
                item(
                    "Dana",
                    "Sam",
                    &format!("2025-03-0{day}T09:00:00Z"),
                    analysis(sentiment, &[format!("Item {day}").as_str()], alert),
                ),
            )
            .unwrap();
        }

        let input = briefing_input(&store, &request("Team Lead")).unwrap();
        let past = input.past_issues.unwrap();
        assert_eq!(past.len(), BRIEFING_SESSIONS);
        assert_eq!(past[0].date, "March 4, 2025");
        assert_eq!(past[0].summary, "Fourth.");
        assert_eq!(input.action_items.unwrap().len(), 4);
        let insights = input.open_critical_insights.unwrap();
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].summary, "Mentioned quitting.");
        assert_eq!(insights[0].date, "March 2, 2025");
    }

    #[test]
    fn briefing_input_without_history_is_empty() {
        let store = Store::in_memory();
        let input = briefing_input(&store, &request(crate::flows::briefing::EMPLOYEE_ROLE)).unwrap();
        assert!(input.past_issues.is_none());
        assert!(input.action_items.is_none());
        assert!(input.open_critical_insights.is_none());
    }

    #[tokio::test]
    async fn record_session_stores_the_analysis() {
        let store = Store::in_memory();
        let svc = Arc::new(ScriptedCompletion::new().reply(json!({
            "keyThemes": ["Deadlines"],
            "actionItems": ["Supervisor to review release calendar"],
            "sentimentAnalysis": "Tired.",
            "escalationAlert": "Signs of burnout."
        })));
        let input = RecordSessionInput {
            supervisor_name: "Dana".into(),
            employee_name: "Sam".into(),
            session: sample_input(),
        };
        let saved = record_session(&store, &Pipeline::new(svc), &input).await.unwrap();
        assert_eq!(saved.analysis.escalation_alert.as_deref(), Some("Signs of burnout."));
        assert_eq!(for_pair(&store, "Dana", "Sam").unwrap(), vec![saved]);
    }

    #[tokio::test]
    async fn failed_analysis_stores_nothing() {
        let store = Store::in_memory();
        let svc = Arc::new(ScriptedCompletion::new().reply_nothing());
        let input = RecordSessionInput {
            supervisor_name: "Dana".into(),
            employee_name: "Sam".into(),
            session: sample_input(),
        };
        let err = record_session(&store, &Pipeline::new(svc), &input)
            .await
            .unwrap_err();
        assert!(matches!(err, LaddrrError::GenerationFailed { .. }));
        assert!(list_all(&store).unwrap().is_empty());
    }

    #[tokio::test]
    async fn briefing_runs_the_packet_flow_on_history() {
        let store = Store::in_memory();
        save(
            &store,
            item("Dana", "Sam", "2025-03-03T09:00:00Z", analysis("Tired but engaged.", &["Sam to draft notes"], None)),
        )
        .unwrap();
        let svc = Arc::new(ScriptedCompletion::new().reply(json!({
            "actionItemAnalysis": "One item, owned by Sam.",
            "talkingPoints": ["Release notes"]
        })));
        let out = briefing(&store, &Pipeline::new(svc.clone()), &request("Employee"))
            .await
            .unwrap();
        assert_eq!(out.talking_points.unwrap(), vec!["Release notes"]);

        let req = &svc.requests()[0];
        assert_eq!(req.flow, GENERATE_BRIEFING_PACKET);
        assert!(req.prompt.contains("**Summary:** Tired but engaged."));
        assert!(req.prompt.contains("- Task: \"Sam to draft notes\""));
    }
}
