//! Deployed organizational-health surveys.
//!
//! Responses are anonymous: the store only keeps counters, never answers.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{LaddrrError, Result};
use crate::flows::survey::{question_schema, SurveyQuestion};
use crate::schema::{FieldSchema, Schema};
use crate::store::{Record, Store};

pub const SURVEY_KEY: &str = "org_health_surveys_v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyStatus {
    Active,
    Closed,
}

impl std::fmt::Display for SurveyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SurveyStatus::Active => "active",
            SurveyStatus::Closed => "closed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedSurvey {
    #[serde(default)]
    pub id: String,
    pub objective: String,
    pub questions: Vec<SurveyQuestion>,
    #[serde(default)]
    pub deployed_at: String,
    pub status: SurveyStatus,
    #[serde(default)]
    pub submission_count: u64,
    #[serde(default)]
    pub opt_out_count: u64,
}

impl Record for DeployedSurvey {
    const ID_FIELD: &'static str = "id";
    const CREATED_FIELD: &'static str = "deployedAt";
}

/// Shape accepted by [`deploy`].
pub fn deploy_input_schema() -> Schema {
    Schema::new()
        .field(
            "objective",
            FieldSchema::string()
                .non_empty()
                .describe("The high-level objective of the survey."),
        )
        .field(
            "questions",
            FieldSchema::array(FieldSchema::object(question_schema()))
                .items(Some(1), None)
                .describe("Questions shown to employees."),
        )
}

/// Store a new active survey. Questions without an id get one.
pub fn deploy(store: &Store, objective: &str, questions: Vec<SurveyQuestion>) -> Result<DeployedSurvey> {
    deploy_input_schema()
        .validate(&json!({ "objective": objective, "questions": questions }))
        .map_err(|violations| LaddrrError::InvalidInput {
            flow: "deploySurvey".into(),
            violations,
        })?;

    let questions = questions
        .into_iter()
        .map(|mut q| {
            if q.id.as_deref().map_or(true, str::is_empty) {
                q.id = Some(uuid::Uuid::new_v4().to_string());
            }
            q
        })
        .collect();

    let survey = store.append(
        SURVEY_KEY,
        DeployedSurvey {
            id: String::new(),
            objective: objective.trim().to_string(),
            questions,
            deployed_at: String::new(),
            status: SurveyStatus::Active,
            submission_count: 0,
            opt_out_count: 0,
        },
    )?;
    tracing::info!(id = %survey.id, questions = survey.questions.len(), "survey deployed");
    Ok(survey)
}

/// Every survey, newest deployment first.
pub fn list_all(store: &Store) -> Result<Vec<DeployedSurvey>> {
    store.list(SURVEY_KEY, |_| true)
}

/// The most recently deployed survey that is still active.
pub fn latest_active(store: &Store) -> Result<Option<DeployedSurvey>> {
    Ok(store
        .list(SURVEY_KEY, |s: &DeployedSurvey| s.status == SurveyStatus::Active)?
        .into_iter()
        .next())
}

pub fn get(store: &Store, id: &str) -> Result<Option<DeployedSurvey>> {
    store.get(SURVEY_KEY, id)
}

/// Count one anonymous response.
pub fn submit_response(store: &Store, id: &str) -> Result<DeployedSurvey> {
    store.update(SURVEY_KEY, id, |s: &mut DeployedSurvey| {
        if s.status == SurveyStatus::Closed {
            return Err(LaddrrError::SurveyClosed(s.id.clone()));
        }
        s.submission_count += 1;
        Ok(())
    })
}

pub fn log_opt_out(store: &Store, id: &str) -> Result<DeployedSurvey> {
    store.update(SURVEY_KEY, id, |s: &mut DeployedSurvey| {
        s.opt_out_count += 1;
        Ok(())
    })
}

/// Close an active survey. Closing an already closed survey changes nothing.
pub fn close(store: &Store, id: &str) -> Result<DeployedSurvey> {
    let survey = store.update(SURVEY_KEY, id, |s: &mut DeployedSurvey| {
        s.status = SurveyStatus::Closed;
        Ok(())
    })?;
    tracing::info!(id, "survey closed");
    Ok(survey)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn q(text: &str) -> SurveyQuestion {
        SurveyQuestion {
            id: None,
            question_text: text.into(),
            reasoning: "Because.".into(),
            is_custom: None,
        }
    }

    fn deploy_one(store: &Store, objective: &str) -> DeployedSurvey {
        deploy(store, objective, vec![q("How supported do you feel?")]).unwrap()
    }

    #[test]
    fn deploy_starts_active_with_zero_counters() {
        let store = Store::in_memory();
        let s = deploy_one(&store, "measure morale");
        assert!(!s.id.is_empty());
        assert!(!s.deployed_at.is_empty());
        assert_eq!(s.status, SurveyStatus::Active);
        assert_eq!((s.submission_count, s.opt_out_count), (0, 0));
        assert!(s.questions[0].id.is_some());
    }

    #[test]
    fn deploy_rejects_empty_objective_and_questions() {
        let store = Store::in_memory();
        let err = deploy(&store, " ", vec![]).unwrap_err();
        let LaddrrError::InvalidInput { violations, .. } = err else {
            panic!("expected InvalidInput");
        };
        assert_eq!(violations.len(), 2);
        assert!(list_all(&store).unwrap().is_empty());
    }

    #[test]
    fn deploy_checks_each_question_against_the_question_shape() {
        let store = Store::in_memory();
        let mut blank_reasoning = q("Is the workload fair?");
        blank_reasoning.reasoning = " ".into();
        let err = deploy(&store, "workload", vec![q("  "), blank_reasoning]).unwrap_err();
        let LaddrrError::InvalidInput { flow, violations } = err else {
            panic!("expected InvalidInput");
        };
        assert_eq!(flow, "deploySurvey");
        let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["questions[0].questionText", "questions[1].reasoning"]);
        assert!(list_all(&store).unwrap().is_empty());
    }

    #[test]
    fn latest_active_skips_closed() {
        let store = Store::in_memory();
        let older = deploy_one(&store, "first");
        let newer = deploy_one(&store, "second");
        assert_eq!(latest_active(&store).unwrap().unwrap().id, newer.id);

        close(&store, &newer.id).unwrap();
        assert_eq!(latest_active(&store).unwrap().unwrap().id, older.id);

        close(&store, &older.id).unwrap();
        assert!(latest_active(&store).unwrap().is_none());
        assert_eq!(list_all(&store).unwrap().len(), 2);
    }

    #[test]
    fn counters_increment() {
        let store = Store::in_memory();
        let s = deploy_one(&store, "x");
        submit_response(&store, &s.id).unwrap();
        submit_response(&store, &s.id).unwrap();
        let s = log_opt_out(&store, &s.id).unwrap();
        assert_eq!(s.submission_count, 2);
        assert_eq!(s.opt_out_count, 1);
    }

    #[test]
    fn closed_survey_refuses_responses() {
        let store = Store::in_memory();
        let s = deploy_one(&store, "x");
        close(&store, &s.id).unwrap();
        let err = submit_response(&store, &s.id).unwrap_err();
        assert!(matches!(err, LaddrrError::SurveyClosed(_)));
        assert_eq!(get(&store, &s.id).unwrap().unwrap().submission_count, 0);
    }

    #[test]
    fn closing_twice_is_a_silent_noop() {
        let store = Store::in_memory();
        let s = deploy_one(&store, "x");
        close(&store, &s.id).unwrap();
        let mut sub = store.subscribe(SURVEY_KEY);
        let again = close(&store, &s.id).unwrap();
        assert_eq!(again.status, SurveyStatus::Closed);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn unknown_survey_is_not_found() {
        let store = Store::in_memory();
        for result in [
            submit_response(&store, "missing"),
            log_opt_out(&store, "missing"),
            close(&store, "missing"),
        ] {
            assert!(matches!(result, Err(LaddrrError::NotFound { .. })));
        }
    }
}
