//! The flow catalog.
//!
//! Each submodule declares its flows with typed input/output structs, a
//! lazily built [`FlowSpec`] and a typed entry point. This module exposes the
//! catalog and untyped dispatch for the HTTP and CLI surfaces.

pub mod briefing;
pub mod coaching;
pub mod feedback_summary;
pub mod nets;
pub mod one_on_one;
pub mod pulse;
pub mod rewrite;
pub mod survey;

use serde::Serialize;
use serde_json::Value;

use crate::error::{LaddrrError, Result};
use crate::feedback;
use crate::flow::{FlowSpec, Pipeline};
use crate::store::Store;

pub const SUBMIT_ANONYMOUS_FEEDBACK: &str = "submitAnonymousFeedback";
pub const TRACK_FEEDBACK: &str = "trackFeedback";

/// Flows served by the record store rather than a model.
pub const STORE_FLOWS: [&str; 2] = [SUBMIT_ANONYMOUS_FEEDBACK, TRACK_FEEDBACK];

/// Every model-backed flow, in a stable order.
pub fn catalog() -> Vec<&'static FlowSpec> {
    vec![
        survey::generate_questions_spec(),
        survey::summarize_results_spec(),
        feedback_summary::spec(),
        rewrite::spec(),
        coaching::tip_spec(),
        coaching::suggestion_spec(),
        one_on_one::spec(),
        pulse::spec(),
        briefing::spec(),
        nets::analysis_spec(),
        nets::nudge_spec(),
    ]
}

/// Model-backed flows that pick among several prompts and so have no single
/// [`FlowSpec`].
pub const COMPOSITE_FLOWS: [&str; 1] = [nets::RUN_NETS_CONVERSATION];

pub fn find(name: &str) -> Option<&'static FlowSpec> {
    catalog().into_iter().find(|s| s.name == name)
}

pub fn is_store_flow(name: &str) -> bool {
    STORE_FLOWS.contains(&name)
}

/// Whether `name` can be dispatched at all.
pub fn exists(name: &str) -> bool {
    is_store_flow(name) || COMPOSITE_FLOWS.contains(&name) || find(name).is_some()
}

/// Catalog entry for listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowInfo {
    pub name: String,
    pub uses_model: bool,
    pub input_schema: Value,
    pub output_schema: Value,
}

pub fn describe() -> Vec<FlowInfo> {
    let mut out: Vec<FlowInfo> = catalog()
        .into_iter()
        .map(|s| FlowInfo {
            name: s.name.clone(),
            uses_model: true,
            input_schema: s.input.to_json_schema(),
            output_schema: s.output.to_json_schema(),
        })
        .collect();
    out.push(FlowInfo {
        name: nets::RUN_NETS_CONVERSATION.to_string(),
        uses_model: true,
        input_schema: nets::conversation_input_schema().to_json_schema(),
        output_schema: nets::message_schema().to_json_schema(),
    });
    out.push(FlowInfo {
        name: SUBMIT_ANONYMOUS_FEEDBACK.to_string(),
        uses_model: false,
        input_schema: feedback::submit_input_schema().to_json_schema(),
        output_schema: feedback::submit_output_schema().to_json_schema(),
    });
    out.push(FlowInfo {
        name: TRACK_FEEDBACK.to_string(),
        uses_model: false,
        input_schema: feedback::track_input_schema().to_json_schema(),
        output_schema: serde_json::json!({ "type": "object" }),
    });
    out
}

/// Run a model-backed flow by name on untyped JSON.
pub async fn run_by_name(pipeline: &Pipeline, name: &str, input: &Value) -> Result<Value> {
    if name == nets::RUN_NETS_CONVERSATION {
        return nets::run_conversation_value(pipeline, input).await;
    }
    let spec = find(name).ok_or_else(|| LaddrrError::UnknownFlow(name.to_string()))?;
    pipeline.run(spec, input).await
}

/// Run a store-backed flow by name on untyped JSON. Blocking: performs I/O on
/// the store's medium.
pub fn run_store_flow(store: &Store, name: &str, input: &Value) -> Result<Value> {
    match name {
        SUBMIT_ANONYMOUS_FEEDBACK => {
            let input = feedback::parse_submit_input(input)?;
            Ok(serde_json::to_value(feedback::submit_anonymous(store, &input)?)?)
        }
        TRACK_FEEDBACK => {
            let input = feedback::parse_track_input(input)?;
            Ok(serde_json::to_value(feedback::track(store, &input)?)?)
        }
        other => Err(LaddrrError::UnknownFlow(other.to_string())),
    }
}
