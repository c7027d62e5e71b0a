//! Anonymous feedback submissions and their case lifecycle.
//!
//! A submission is identified by a human-friendly tracking id
//! (`Org-Ref-NNNNNN`) that the submitter keeps to follow the case. Public
//! tracking exposes a redacted view; the full record is for reviewers.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LaddrrError, Result};
use crate::flow::Pipeline;
use crate::flows::feedback_summary::{
    summarize_anonymous_feedback, Criticality, SummarizeAnonymousFeedbackInput,
    SummarizeAnonymousFeedbackOutput,
};
use crate::flows::{SUBMIT_ANONYMOUS_FEEDBACK, TRACK_FEEDBACK};
use crate::schema::{FieldSchema, Schema};
use crate::store::{Record, Store};

pub const FEEDBACK_KEY: &str = "accountability_feedback_v3";

const TRACKING_PREFIX: &str = "Org-Ref-";
const MAX_ID_ATTEMPTS: usize = 32;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackStatus {
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
}

impl FeedbackStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackStatus::Open => "Open",
            FeedbackStatus::InProgress => "In Progress",
            FeedbackStatus::Resolved => "Resolved",
        }
    }
}

impl std::fmt::Display for FeedbackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub event: String,
    pub timestamp: String,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AuditEvent {
    fn now(event: &str, actor: &str, details: Option<String>) -> Self {
        Self {
            event: event.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            actor: actor.to_string(),
            details,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSubmission {
    pub tracking_id: String,
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub submitted_at: String,
    pub status: FeedbackStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criticality: Option<Criticality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criticality_reasoning: Option<String>,
    #[serde(default)]
    pub viewed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default)]
    pub audit_trail: Vec<AuditEvent>,
}

impl Record for FeedbackSubmission {
    const ID_FIELD: &'static str = "trackingId";
    const CREATED_FIELD: &'static str = "submittedAt";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymousFeedbackInput {
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymousFeedbackOutput {
    pub tracking_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackFeedbackInput {
    pub tracking_id: String,
}

/// What a submitter sees when tracking a case: no message body, no
/// reviewer notes except on the resolution event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedFeedback {
    pub tracking_id: String,
    pub subject: String,
    pub submitted_at: String,
    pub status: FeedbackStatus,
    pub audit_trail: Vec<AuditEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackFeedbackOutput {
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<TrackedFeedback>,
}

// ---------------------------------------------------------------------------
// Input schemas
// ---------------------------------------------------------------------------

pub fn submit_input_schema() -> Schema {
    Schema::new()
        .field(
            "subject",
            FieldSchema::string()
                .non_empty()
                .describe("Subject line of the concern."),
        )
        .field(
            "message",
            FieldSchema::string()
                .non_empty()
                .describe("Full text of the concern."),
        )
}

pub fn submit_output_schema() -> Schema {
    Schema::new().field("trackingId", FieldSchema::string().non_empty())
}

pub fn track_input_schema() -> Schema {
    Schema::new().field(
        "trackingId",
        FieldSchema::string()
            .non_empty()
            .describe("Tracking id returned at submission."),
    )
}

fn parse_with<T: serde::de::DeserializeOwned>(schema: &Schema, flow: &str, input: &Value) -> Result<T> {
    schema
        .validate(input)
        .map_err(|violations| LaddrrError::InvalidInput {
            flow: flow.to_string(),
            violations,
        })?;
    Ok(serde_json::from_value(input.clone())?)
}

pub fn parse_submit_input(input: &Value) -> Result<AnonymousFeedbackInput> {
    parse_with(&submit_input_schema(), SUBMIT_ANONYMOUS_FEEDBACK, input)
}

pub fn parse_track_input(input: &Value) -> Result<TrackFeedbackInput> {
    parse_with(&track_input_schema(), TRACK_FEEDBACK, input)
}

// ---------------------------------------------------------------------------
// Submission and tracking
// ---------------------------------------------------------------------------

fn random_tracking_id() -> String {
    let n: u32 = rand::thread_rng().gen_range(100_000..=999_999);
    format!("{TRACKING_PREFIX}{n}")
}

pub fn submit_anonymous(store: &Store, input: &AnonymousFeedbackInput) -> Result<AnonymousFeedbackOutput> {
    parse_submit_input(&serde_json::to_value(input)?)?;

    let submitted_at = Utc::now().to_rfc3339();
    let mut record = FeedbackSubmission {
        tracking_id: String::new(),
        subject: input.subject.clone(),
        message: input.message.clone(),
        submitted_at: submitted_at.clone(),
        status: FeedbackStatus::Open,
        summary: None,
        criticality: None,
        criticality_reasoning: None,
        viewed: false,
        resolution: None,
        audit_trail: vec![AuditEvent {
            event: "Submitted".into(),
            timestamp: submitted_at,
            actor: "Anonymous".into(),
            details: Some("Feedback was received by the system.".into()),
        }],
    };

    for _ in 0..MAX_ID_ATTEMPTS {
        record.tracking_id = random_tracking_id();
        if let Some(stored) = store.append_unique(FEEDBACK_KEY, record.clone())? {
            tracing::info!(tracking_id = %stored.tracking_id, "anonymous feedback submitted");
            return Ok(AnonymousFeedbackOutput {
                tracking_id: stored.tracking_id,
            });
        }
        tracing::debug!(tracking_id = %record.tracking_id, "tracking id collision, regenerating");
    }
    Err(LaddrrError::Store(
        "could not allocate a unique tracking id".into(),
    ))
}

pub fn track(store: &Store, input: &TrackFeedbackInput) -> Result<TrackFeedbackOutput> {
    let Some(f) = store.get::<FeedbackSubmission>(FEEDBACK_KEY, &input.tracking_id)? else {
        return Ok(TrackFeedbackOutput {
            found: false,
            feedback: None,
        });
    };
    let audit_trail = f
        .audit_trail
        .into_iter()
        .map(|e| AuditEvent {
            details: if e.event == "Resolved" { e.details } else { None },
            ..e
        })
        .collect();
    Ok(TrackFeedbackOutput {
        found: true,
        feedback: Some(TrackedFeedback {
            tracking_id: f.tracking_id,
            subject: f.subject,
            submitted_at: f.submitted_at,
            status: f.status,
            audit_trail,
            resolution: f.resolution,
        }),
    })
}

// ---------------------------------------------------------------------------
// Reviewer operations
// ---------------------------------------------------------------------------

/// Every submission, newest first.
pub fn list_all(store: &Store) -> Result<Vec<FeedbackSubmission>> {
    store.list(FEEDBACK_KEY, |_| true)
}

pub fn get(store: &Store, tracking_id: &str) -> Result<Option<FeedbackSubmission>> {
    store.get(FEEDBACK_KEY, tracking_id)
}

/// The submission under `tracking_id`, or `NotFound`.
pub fn require(store: &Store, tracking_id: &str) -> Result<FeedbackSubmission> {
    get(store, tracking_id)?.ok_or_else(|| LaddrrError::NotFound {
        key: FEEDBACK_KEY.to_string(),
        id: tracking_id.to_string(),
    })
}

/// Attach a model-generated summary and criticality.
///
/// Runs the summarization flow at most once per submission: an already
/// summarized record is returned unchanged without calling the model.
pub async fn summarize(store: &Store, pipeline: &Pipeline, tracking_id: &str) -> Result<FeedbackSubmission> {
    let current = require(store, tracking_id)?;
    if current.summary.is_some() {
        return Ok(current);
    }
    let analysis = analyze(pipeline, &current).await?;
    attach_summary(store, tracking_id, analysis)
}

/// Run the summarization flow on a submission without touching the store.
pub async fn analyze(
    pipeline: &Pipeline,
    submission: &FeedbackSubmission,
) -> Result<SummarizeAnonymousFeedbackOutput> {
    summarize_anonymous_feedback(
        pipeline,
        &SummarizeAnonymousFeedbackInput {
            subject: submission.subject.clone(),
            message: submission.message.clone(),
        },
    )
    .await
}

/// Persist an analysis. A record summarized in the meantime keeps its
/// first summary.
pub fn attach_summary(
    store: &Store,
    tracking_id: &str,
    analysis: SummarizeAnonymousFeedbackOutput,
) -> Result<FeedbackSubmission> {
    store.update(FEEDBACK_KEY, tracking_id, |f: &mut FeedbackSubmission| {
        if f.summary.is_some() {
            return Ok(());
        }
        f.summary = Some(analysis.summary);
        f.criticality = Some(analysis.criticality);
        f.criticality_reasoning = Some(analysis.criticality_reasoning);
        f.audit_trail.push(AuditEvent::now(
            "AI Analysis Completed",
            "System",
            Some(format!("AI assessed criticality as {}.", analysis.criticality)),
        ));
        Ok(())
    })
}

pub fn mark_viewed(store: &Store, tracking_id: &str) -> Result<FeedbackSubmission> {
    store.update(FEEDBACK_KEY, tracking_id, |f: &mut FeedbackSubmission| {
        f.viewed = true;
        Ok(())
    })
}

/// Append a reviewer comment to the audit trail. The case status is left
/// as it is.
pub fn add_update(store: &Store, tracking_id: &str, actor: &str, comment: &str) -> Result<FeedbackSubmission> {
    require_text("addFeedbackUpdate", "comment", comment)?;
    store.update(FEEDBACK_KEY, tracking_id, |f: &mut FeedbackSubmission| {
        f.audit_trail
            .push(AuditEvent::now("Update Added", actor, Some(comment.to_string())));
        Ok(())
    })
}

pub fn resolve(store: &Store, tracking_id: &str, actor: &str, resolution: &str) -> Result<FeedbackSubmission> {
    require_text("resolveFeedback", "resolution", resolution)?;
    let f = store.update(FEEDBACK_KEY, tracking_id, |f: &mut FeedbackSubmission| {
        f.status = FeedbackStatus::Resolved;
        f.resolution = Some(resolution.to_string());
        f.audit_trail
            .push(AuditEvent::now("Resolved", actor, Some(resolution.to_string())));
        Ok(())
    })?;
    tracing::info!(tracking_id, actor, "feedback resolved");
    Ok(f)
}

fn require_text(operation: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LaddrrError::InvalidInput {
            flow: operation.to_string(),
            violations: vec![crate::error::Violation {
                path: field.to_string(),
                reason: "must not be empty".into(),
            }],
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
