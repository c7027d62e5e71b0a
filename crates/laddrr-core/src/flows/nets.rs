//! Nets: role-play practice for difficult conversations.
//!
//! The model plays a persona, can be asked for a mid-conversation nudge, and
//! scores the finished conversation. [`run_nets_conversation`] picks the
//! opening or follow-up prompt depending on the history and never fails on a
//! bad reply: it falls back to a canned line instead.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LaddrrError, Result};
use crate::flow::{FlowSpec, Pipeline};
use crate::schema::{FieldSchema, Schema};

pub const RUN_NETS_CONVERSATION: &str = "runNetsConversation";
pub const NETS_OPENING_LINE: &str = "netsOpeningLine";
pub const NETS_NEXT_TURN: &str = "netsNextTurn";
pub const ANALYZE_NETS_CONVERSATION: &str = "analyzeNetsConversation";
pub const GENERATE_NETS_NUDGE: &str = "generateNetsNudge";

const RETRY_LINE: &str = "I'm sorry, I'm not sure how to respond to that. Could you try rephrasing?";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetsRole {
    User,
    Model,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetsMessage {
    pub role: NetsRole,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetsInitialInput {
    pub scenario: String,
    pub persona: String,
    pub difficulty: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetsConversationInput {
    pub scenario: String,
    pub persona: String,
    pub difficulty: String,
    pub history: Vec<NetsMessage>,
}

impl NetsConversationInput {
    fn initial(&self) -> NetsInitialInput {
        NetsInitialInput {
            scenario: self.scenario.clone(),
            persona: self.persona.clone(),
            difficulty: self.difficulty.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Turn {
    reply: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetsScores {
    pub clarity: f64,
    pub empathy: f64,
    pub assertiveness: f64,
    pub overall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedMessage {
    pub role: NetsRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetsAnalysisOutput {
    pub scores: NetsScores,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub annotated_conversation: Vec<AnnotatedMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetsNudgeOutput {
    pub nudge: String,
}

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

const ROLES: [&str; 3] = ["user", "model", "system"];

fn setup_schema() -> Schema {
    Schema::new()
        .field(
            "scenario",
            FieldSchema::string()
                .non_empty()
                .describe("The scenario to practice, e.g. 'Give tough feedback'."),
        )
        .field(
            "persona",
            FieldSchema::string()
                .non_empty()
                .describe("The persona the model plays, e.g. 'Challenging Manager'."),
        )
        .field(
            "difficulty",
            FieldSchema::string()
                .non_empty()
                .describe("How hard the persona pushes back, e.g. 'Strict'."),
        )
}

pub fn message_schema() -> Schema {
    Schema::new()
        .field("role", FieldSchema::string().one_of(ROLES))
        .field("content", FieldSchema::string())
}

/// Setup plus the conversation so far.
pub fn conversation_input_schema() -> Schema {
    setup_schema().field(
        "history",
        FieldSchema::array(FieldSchema::object(message_schema()))
            .describe("The conversation history so far."),
    )
}

fn turn_schema() -> Schema {
    Schema::new().field(
        "reply",
        FieldSchema::string()
            .non_empty()
            .describe("The persona's next line in the conversation."),
    )
}

/// Tag each history entry with `isUser` / `isModel` for the templates.
fn mark_speakers(fields: &mut Map<String, Value>) {
    let Some(Value::Array(history)) = fields.get_mut("history") else {
        return;
    };
    for message in history.iter_mut().filter_map(Value::as_object_mut) {
        let role = message.get("role").and_then(Value::as_str).unwrap_or_default();
        let (is_user, is_model) = (role == "user", role == "model");
        message.insert("isUser".into(), Value::Bool(is_user));
        message.insert("isModel".into(), Value::Bool(is_model));
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

const OPENING_PROMPT: &str = r#"You are an AI actor in a role-playing simulation. Your task is to start a conversation.

**Your Persona:**
- You are playing the role of a {{persona}}.
- Your demeanor should be {{difficulty}}.

**The Scenario:**
- The user wants to practice the following scenario they have described: "{{scenario}}".

**Your Task:**
- Generate ONLY the first line of the conversation from your perspective as the {{persona}}.
- Do NOT wait for the user to speak. Your response is the opening statement.
- Keep it concise and conversational.

For example, if the scenario is "giving feedback about missed deadlines," a good opening is "Hi, thanks for joining. I wanted to chat about the recent project deadlines."

Reply with JSON: {"reply": "<your opening line>"}."#;

const NEXT_TURN_PROMPT: &str = r#"You are an AI actor in a role-playing simulation that helps users practice difficult conversations.

**Your Persona:**
- You are playing the role of a {{persona}}.
- Your demeanor should be {{difficulty}}.

**The Scenario:**
- The user wants to practice the following scenario they have described: "{{scenario}}".

**Your Task:**
- Stay in character as the {{persona}} at all times.
- Respond realistically for your role and difficulty.
- Do NOT break character or reveal that you are an AI.
- Do NOT be overly agreeable. If the user is vague, push back. If their tone is poor, react accordingly.
- Keep your responses concise and conversational.

**Conversation History:**
{{#each history}}
{{#if this.isUser}}
User: {{{this.content}}}
{{else}}
{{#if this.isModel}}
You: {{{this.content}}}
{{/if}}
{{/if}}
{{/each}}

Reply with JSON: {"reply": "<your next line as the {{persona}}>"}."#;

const ANALYSIS_PROMPT: &str = r#"You are an expert conversation and executive coach. Analyze a practice conversation from a role-play simulation and provide a detailed scorecard.

**The Simulation Context:**
- Scenario: "{{scenario}}"
- The user was practicing a conversation with an AI playing a {{difficulty}} {{persona}}.

**Conversation History:**
{{#each history}}
{{#if this.isUser}}
User: {{{this.content}}}
{{else}}
{{#if this.isModel}}
{{../persona}}: {{{this.content}}}
{{/if}}
{{/if}}
{{/each}}

---

**Your Task:**

Generate a complete JSON scorecard:

1.  **scores**: clarity, empathy and assertiveness, each from 1.0 to 10.0, plus an overall score for this scenario.
2.  **strengths**: 2-3 specific things the user did well.
3.  **gaps**: 2-3 specific areas for improvement.
4.  **annotatedConversation**: Copy every message's 'role' and 'content'. For 3-4 key user turns add an 'annotation' explaining why the phrasing worked or did not, and a 'type' of 'positive' or 'negative'. Never annotate the model's turns.

Generate the complete scorecard now."#;

const NUDGE_PROMPT: &str = r#"You are an expert conversation coach observing a role-play simulation. The user has asked for a hint. Give a single, actionable "nudge" that helps them with their *next* turn. Do not comment on the whole conversation.

**The Simulation Context:**
- Scenario: "{{scenario}}"
- The user is practicing with an AI playing a {{difficulty}} {{persona}}.

**Conversation History:**
{{#each history}}
{{#if this.isUser}}
User: {{{this.content}}}
{{else}}
{{#if this.isModel}}
{{../persona}}: {{{this.content}}}
{{/if}}
{{/if}}
{{/each}}

---

Generate a JSON object with a single field, 'nudge': a short, encouraging and specific piece of advice.

**Examples of good nudges:**
- "Try asking an open-ended question to understand their perspective."
- "Consider acknowledging their last point before stating your own."
- "You've stated the problem well. What's a potential solution you can propose?""#;

// ---------------------------------------------------------------------------
// Specs
// ---------------------------------------------------------------------------

pub fn opening_spec() -> &'static FlowSpec {
    static SPEC: OnceLock<FlowSpec> = OnceLock::new();
    SPEC.get_or_init(|| {
        FlowSpec::new(NETS_OPENING_LINE, setup_schema(), turn_schema(), OPENING_PROMPT).unwrap()
    })
}

pub fn next_turn_spec() -> &'static FlowSpec {
    static SPEC: OnceLock<FlowSpec> = OnceLock::new();
    SPEC.get_or_init(|| {
        FlowSpec::with_derived(
            NETS_NEXT_TURN,
            conversation_input_schema(),
            turn_schema(),
            NEXT_TURN_PROMPT,
            &[],
            mark_speakers,
        )
        .unwrap()
    })
}

pub fn analysis_spec() -> &'static FlowSpec {
    static SPEC: OnceLock<FlowSpec> = OnceLock::new();
    SPEC.get_or_init(|| {
        let score = |what: &str| FieldSchema::number().range(1.0, 10.0).describe(what);
        let annotated = message_schema()
            .field("annotation", FieldSchema::string().optional())
            .field(
                "type",
                FieldSchema::string()
                    .one_of(["positive", "negative"])
                    .optional(),
            );
        FlowSpec::with_derived(
            ANALYZE_NETS_CONVERSATION,
            conversation_input_schema(),
            Schema::new()
                .field(
                    "scores",
                    FieldSchema::object(
                        Schema::new()
                            .field("clarity", score("Were they direct and easy to understand?"))
                            .field("empathy", score("Did they acknowledge the other perspective?"))
                            .field("assertiveness", score("Did they state their needs confidently?"))
                            .field("overall", score("Overall performance in this scenario.")),
                    ),
                )
                .field(
                    "strengths",
                    FieldSchema::array(FieldSchema::string().non_empty()).items(Some(1), None),
                )
                .field(
                    "gaps",
                    FieldSchema::array(FieldSchema::string().non_empty()).items(Some(1), None),
                )
                .field(
                    "annotatedConversation",
                    FieldSchema::array(FieldSchema::object(annotated)),
                ),
            ANALYSIS_PROMPT,
            &[],
            mark_speakers,
        )
        .unwrap()
    })
}

pub fn nudge_spec() -> &'static FlowSpec {
    static SPEC: OnceLock<FlowSpec> = OnceLock::new();
    SPEC.get_or_init(|| {
        FlowSpec::with_derived(
            GENERATE_NETS_NUDGE,
            conversation_input_schema(),
            Schema::new().field(
                "nudge",
                FieldSchema::string()
                    .non_empty()
                    .describe("A short, specific hint for the user's next turn."),
            ),
            NUDGE_PROMPT,
            &[],
            mark_speakers,
        )
        .unwrap()
    })
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// The persona's next message. An unusable reply is replaced by a canned
/// line; invalid input and transport failures are still errors.
pub async fn run_nets_conversation(
    pipeline: &Pipeline,
    input: &NetsConversationInput,
) -> Result<NetsMessage> {
    let outcome = if input.history.is_empty() {
        pipeline
            .run_typed::<_, Turn>(opening_spec(), &input.initial())
            .await
    } else {
        pipeline.run_typed::<_, Turn>(next_turn_spec(), input).await
    };

    let content = match outcome {
        Ok(turn) => turn.reply,
        Err(LaddrrError::GenerationFailed { flow, reason }) => {
            tracing::warn!(%flow, %reason, "nets reply unusable, using fallback line");
            if input.history.is_empty() {
                format!("Hi, you wanted to chat about: \"{}\"?", input.scenario)
            } else {
                RETRY_LINE.to_string()
            }
        }
        Err(e) => return Err(e),
    };
    Ok(NetsMessage {
        role: NetsRole::Model,
        content,
    })
}

/// Untyped form of [`run_nets_conversation`] for the catalog.
pub async fn run_conversation_value(pipeline: &Pipeline, input: &Value) -> Result<Value> {
    conversation_input_schema()
        .validate(input)
        .map_err(|violations| LaddrrError::InvalidInput {
            flow: RUN_NETS_CONVERSATION.to_string(),
            violations,
        })?;
    let input: NetsConversationInput = serde_json::from_value(input.clone())?;
    Ok(serde_json::to_value(run_nets_conversation(pipeline, &input).await?)?)
}

pub async fn analyze_nets_conversation(
    pipeline: &Pipeline,
    input: &NetsConversationInput,
) -> Result<NetsAnalysisOutput> {
    pipeline.run_typed(analysis_spec(), input).await
}

pub async fn generate_nets_nudge(
    pipeline: &Pipeline,
    input: &NetsConversationInput,
) -> Result<NetsNudgeOutput> {
    pipeline.run_typed(nudge_spec(), input).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
