//! The flow pipeline: validate input → render prompt → call the completion
//! service → validate output.
//!
//! A [`FlowSpec`] declares one AI-backed capability. A [`Pipeline`] executes
//! any spec against a [`CompletionService`]. The pipeline holds no per-call
//! state, so one instance can serve concurrent invocations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{join_violations, BoxError, LaddrrError, Result};
use crate::schema::Schema;
use crate::template::Template;

// ---------------------------------------------------------------------------
// FlowSpec
// ---------------------------------------------------------------------------

/// Adds prompt-only fields computed from an already validated input.
pub type Prepare = fn(&mut Map<String, Value>);

#[derive(Debug, Clone)]
pub struct FlowSpec {
    pub name: String,
    pub input: Schema,
    pub output: Schema,
    pub template: Template,
    prepare: Option<Prepare>,
}

impl FlowSpec {
    /// Build a spec, checking that every field the template reads is declared
    /// in the input schema.
    pub fn new(
        name: impl Into<String>,
        input: Schema,
        output: Schema,
        template: &str,
    ) -> Result<Self> {
        Self::build(name.into(), input, output, template, &[], None)
    }

    /// Build a spec whose template may also read `derived` root fields.
    /// Callers cannot supply them; `prepare` fills them in before rendering.
    pub fn with_derived(
        name: impl Into<String>,
        input: Schema,
        output: Schema,
        template: &str,
        derived: &[&str],
        prepare: Prepare,
    ) -> Result<Self> {
        Self::build(name.into(), input, output, template, derived, Some(prepare))
    }

    fn build(
        name: String,
        input: Schema,
        output: Schema,
        template: &str,
        derived: &[&str],
        prepare: Option<Prepare>,
    ) -> Result<Self> {
        let template = Template::parse(template)?;
        let undeclared: Vec<String> = template
            .root_fields()
            .into_iter()
            .filter(|f| !input.has_field(f) && !derived.contains(&f.as_str()))
            .collect();
        if !undeclared.is_empty() {
            return Err(LaddrrError::Template(format!(
                "{name}: template references undeclared input field(s): {}",
                undeclared.join(", ")
            )));
        }
        Ok(Self {
            name,
            input,
            output,
            template,
            prepare,
        })
    }

    /// Validate a caller-supplied input value.
    pub fn check_input(&self, input: &Value) -> Result<()> {
        self.input
            .validate(input)
            .map_err(|violations| LaddrrError::InvalidInput {
                flow: self.name.clone(),
                violations,
            })
    }

    /// Validate a model-produced value. Any mismatch is a generation failure.
    pub fn check_output(&self, output: &Value) -> Result<()> {
        self.output
            .validate(output)
            .map_err(|violations| LaddrrError::GenerationFailed {
                flow: self.name.clone(),
                reason: format!("output does not match schema: {}", join_violations(&violations)),
            })
    }

    pub fn render(&self, input: &Value) -> String {
        match (self.prepare, input) {
            (Some(prepare), Value::Object(fields)) => {
                let mut fields = fields.clone();
                prepare(&mut fields);
                self.template.render(&Value::Object(fields))
            }
            _ => self.template.render(input),
        }
    }
}

// ---------------------------------------------------------------------------
// Completion service
// ---------------------------------------------------------------------------

/// What the pipeline hands to the completion service.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub flow: String,
    pub prompt: String,
    /// JSON Schema document the reply must conform to.
    pub output_schema: Value,
}

/// A model-backed service that turns a prompt into a structured value.
///
/// `Ok(None)` means the model answered but produced nothing usable;
/// `Err` means the service could not be reached or failed outright.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> std::result::Result<Option<Value>, BoxError>;
}

/// Replays queued replies in order and records every request it receives.
///
/// Used by tests and for offline runs. When the queue is empty it answers
/// `Ok(None)`.
#[derive(Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<std::result::Result<Option<Value>, String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, value: Value) -> Self {
        self.push(Ok(Some(value)));
        self
    }

    pub fn reply_nothing(self) -> Self {
        self.push(Ok(None));
        self
    }

    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    pub fn push(&self, reply: std::result::Result<Option<Value>, String>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(reply);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> std::result::Result<Option<Value>, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut r) = self.requests.lock() {
            r.push(request.clone());
        }
        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        match next {
            Some(Ok(v)) => Ok(v),
            Some(Err(msg)) => Err(msg.into()),
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// CallPolicy
// ---------------------------------------------------------------------------

/// Timeout and retry settings for the external call.
///
/// Only transport failures and timeouts are retried; a reply that fails
/// output validation is final.
#[derive(Debug, Clone, PartialEq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_attempts: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Double the delay, pinned at `Duration::MAX`.
fn next_backoff(current: Duration) -> Duration {
    current.saturating_mul(2)
}

#[derive(Debug, thiserror::Error)]
#[error("completion timed out after {0:?}")]
struct TimedOut(Duration);

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Pipeline {
    service: Arc<dyn CompletionService>,
    policy: CallPolicy,
}

impl Pipeline {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self {
            service,
            policy: CallPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &CallPolicy {
        &self.policy
    }

    /// Execute `spec` against an untyped JSON input.
    pub async fn run(&self, spec: &FlowSpec, input: &Value) -> Result<Value> {
        spec.check_input(input)?;

        let prompt = spec.render(input);
        tracing::debug!(flow = %spec.name, prompt_len = prompt.len(), "rendered prompt");

        let request = CompletionRequest {
            flow: spec.name.clone(),
            prompt,
            output_schema: spec.output.to_json_schema(),
        };

        let started = Instant::now();
        let reply = self.call(&request).await?;

        let Some(output) = reply else {
            tracing::warn!(flow = %spec.name, "completion returned no output");
            return Err(LaddrrError::GenerationFailed {
                flow: spec.name.clone(),
                reason: "model returned no output".into(),
            });
        };

        if let Err(e) = spec.check_output(&output) {
            tracing::warn!(flow = %spec.name, error = %e, "rejected non-conformant output");
            return Err(e);
        }

        tracing::info!(
            flow = %spec.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "flow completed"
        );
        Ok(output)
    }

    /// Execute `spec` with typed input and output.
    pub async fn run_typed<I, O>(&self, spec: &FlowSpec, input: &I) -> Result<O>
    where
        I: Serialize + Sync,
        O: DeserializeOwned,
    {
        let input = serde_json::to_value(input)?;
        let output = self.run(spec, &input).await?;
        serde_json::from_value(output).map_err(|e| LaddrrError::GenerationFailed {
            flow: spec.name.clone(),
            reason: format!("output could not be decoded: {e}"),
        })
    }

    async fn call(&self, request: &CompletionRequest) -> Result<Option<Value>> {
        let attempts = self.policy.max_attempts.max(1);
        let mut backoff = self.policy.backoff;
        let mut attempt = 1;
        loop {
            let outcome = tokio::time::timeout(self.policy.timeout, self.service.complete(request))
                .await
                .unwrap_or_else(|_| Err(Box::new(TimedOut(self.policy.timeout)) as BoxError));

            match outcome {
                Ok(reply) => return Ok(reply),
                Err(source) if attempt >= attempts => {
                    return Err(LaddrrError::Transport {
                        flow: request.flow.clone(),
                        source,
                    })
                }
                Err(source) => {
                    tracing::warn!(
                        flow = %request.flow,
                        attempt,
                        error = %source,
                        "completion failed, retrying in {backoff:?}"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = next_backoff(backoff);
                    attempt += 1;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;
    use serde_json::json;

    fn echo_spec() -> FlowSpec {
        FlowSpec::new(
            "echoFlow",
            Schema::new()
                .field("text", FieldSchema::string().non_empty())
                .field("tone", FieldSchema::string().one_of(["formal", "casual"]).optional()),
            Schema::new().field("reply", FieldSchema::string().non_empty()),
            "Say: {{text}}{{#if tone}} ({{tone}}){{/if}}",
        )
        .unwrap()
    }

    fn pipeline(service: Arc<ScriptedCompletion>) -> Pipeline {
        Pipeline::new(service)
    }

    #[test]
    fn spec_rejects_undeclared_placeholders() {
        let err = FlowSpec::new(
            "broken",
            Schema::new().field("a", FieldSchema::string()),
            Schema::new(),
            "{{a}} {{b}} {{#each c}}{{d}}{{/each}}",
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.ends_with("field(s): b, c"), "{msg}");
    }

    #[tokio::test]
    async fn valid_input_yields_validated_output() {
        let svc = Arc::new(ScriptedCompletion::new().reply(json!({ "reply": "hi" })));
        let out = pipeline(svc.clone())
            .run(&echo_spec(), &json!({ "text": "hello", "tone": "formal" }))
            .await
            .unwrap();
        assert_eq!(out, json!({ "reply": "hi" }));
        assert_eq!(svc.calls(), 1);

        let req = &svc.requests()[0];
        assert_eq!(req.flow, "echoFlow");
        assert_eq!(req.prompt, "Say: hello (formal)");
        assert_eq!(req.output_schema["required"], json!(["reply"]));
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_service() {
        let svc = Arc::new(ScriptedCompletion::new().reply(json!({ "reply": "hi" })));
        let p = pipeline(svc.clone());
        let bad_inputs = [
            json!({}),
            json!({ "text": "" }),
            json!({ "text": "x", "tone": "angry" }),
            json!({ "text": "x", "extra": 1 }),
            json!("just a string"),
        ];
        for input in bad_inputs {
            let err = p.run(&echo_spec(), &input).await.unwrap_err();
            assert!(
                matches!(err, LaddrrError::InvalidInput { .. }),
                "{input}: {err}"
            );
        }
        assert_eq!(svc.calls(), 0);
    }

    #[tokio::test]
    async fn empty_reply_is_generation_failure() {
        let svc = Arc::new(ScriptedCompletion::new().reply_nothing());
        let err = pipeline(svc)
            .run(&echo_spec(), &json!({ "text": "x" }))
            .await
            .unwrap_err();
        match err {
            LaddrrError::GenerationFailed { flow, .. } => assert_eq!(flow, "echoFlow"),
            other => panic!("expected GenerationFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn partially_matching_output_is_rejected() {
        for reply in [
            json!({ "reply": "hi", "extra": true }),
            json!({ "reply": "" }),
            json!({ "answer": "hi" }),
            json!(["hi"]),
        ] {
            let svc = Arc::new(ScriptedCompletion::new().reply(reply.clone()));
            let err = pipeline(svc)
                .run(&echo_spec(), &json!({ "text": "x" }))
                .await
                .unwrap_err();
            assert!(
                matches!(err, LaddrrError::GenerationFailed { .. }),
                "{reply}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn service_failure_is_transport_error_with_cause() {
        let svc = Arc::new(ScriptedCompletion::new().fail("connection refused"));
        let err = pipeline(svc.clone())
            .run(&echo_spec(), &json!({ "text": "x" }))
            .await
            .unwrap_err();
        let LaddrrError::Transport { flow, source } = err else {
            panic!("expected Transport");
        };
        assert_eq!(flow, "echoFlow");
        assert_eq!(source.to_string(), "connection refused");
        assert_eq!(svc.calls(), 1);
    }

    #[tokio::test]
    async fn default_policy_calls_exactly_once() {
        let svc = Arc::new(
            ScriptedCompletion::new()
                .fail("flaky")
                .reply(json!({ "reply": "hi" })),
        );
        let result = pipeline(svc.clone())
            .run(&echo_spec(), &json!({ "text": "x" }))
            .await;
        assert!(result.is_err());
        assert_eq!(svc.calls(), 1);
    }

    #[tokio::test]
    async fn retry_policy_retries_transport_errors_only() {
        let policy = CallPolicy {
            timeout: Duration::from_secs(5),
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        };

        let svc = Arc::new(
            ScriptedCompletion::new()
                .fail("flaky")
                .fail("flaky")
                .reply(json!({ "reply": "third time" })),
        );
        let out = Pipeline::new(svc.clone())
            .with_policy(policy.clone())
            .run(&echo_spec(), &json!({ "text": "x" }))
            .await
            .unwrap();
        assert_eq!(out["reply"], "third time");
        assert_eq!(svc.calls(), 3);

        let svc = Arc::new(
            ScriptedCompletion::new()
                .reply_nothing()
                .reply(json!({ "reply": "never used" })),
        );
        let err = Pipeline::new(svc.clone())
            .with_policy(policy)
            .run(&echo_spec(), &json!({ "text": "x" }))
            .await
            .unwrap_err();
        assert!(matches!(err, LaddrrError::GenerationFailed { .. }));
        assert_eq!(svc.calls(), 1);
    }

    struct Stalled;

    #[async_trait]
    impl CompletionService for Stalled {
        async fn complete(&self, _: &CompletionRequest) -> std::result::Result<Option<Value>, BoxError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn timeout_maps_to_transport_error() {
        let p = Pipeline::new(Arc::new(Stalled)).with_policy(CallPolicy {
            timeout: Duration::from_millis(20),
            max_attempts: 1,
            backoff: Duration::from_millis(1),
        });
        let err = p.run(&echo_spec(), &json!({ "text": "x" })).await.unwrap_err();
        let LaddrrError::Transport { source, .. } = err else {
            panic!("expected Transport");
        };
        assert!(source.to_string().contains("timed out"));
    }

    #[test]
    fn derived_fields_reach_the_template_only() {
        fn shout(fields: &mut Map<String, Value>) {
            let loud = fields
                .get("text")
                .and_then(Value::as_str)
                .map(str::to_uppercase)
                .unwrap_or_default();
            fields.insert("loud".into(), json!(loud));
        }
        let spec = FlowSpec::with_derived(
            "shoutFlow",
            Schema::new().field("text", FieldSchema::string()),
            Schema::new(),
            "{{text}} / {{loud}}",
            &["loud"],
            shout,
        )
        .unwrap();
        assert_eq!(spec.render(&json!({ "text": "hey" })), "hey / HEY");
        assert!(spec.check_input(&json!({ "text": "hey", "loud": "x" })).is_err());

        let err = FlowSpec::with_derived(
            "broken",
            Schema::new().field("text", FieldSchema::string()),
            Schema::new(),
            "{{loud}} {{other}}",
            &["loud"],
            shout,
        )
        .unwrap_err();
        assert!(err.to_string().ends_with("field(s): other"), "{err}");
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(next_backoff(Duration::from_millis(500)), Duration::from_secs(1));
        assert_eq!(next_backoff(Duration::MAX / 2 + Duration::from_secs(1)), Duration::MAX);
        assert_eq!(next_backoff(Duration::MAX), Duration::MAX);
    }

    /// Answers each request with its own prompt after a short, prompt-dependent
    /// delay so concurrent calls finish out of order.
    struct Echo;

    #[async_trait]
    impl CompletionService for Echo {
        async fn complete(&self, request: &CompletionRequest) -> std::result::Result<Option<Value>, BoxError> {
            let delay = if request.prompt.contains("slow") { 30 } else { 1 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(Some(json!({ "reply": request.prompt })))
        }
    }

    #[tokio::test]
    async fn concurrent_runs_share_one_service() {
        let p = Pipeline::new(Arc::new(Echo));
        let spec = echo_spec();
        let slow = json!({ "text": "slow" });
        let fast = json!({ "text": "fast", "tone": "casual" });
        let other = json!({ "text": "other" });
        let (a, b, c) = tokio::join!(p.run(&spec, &slow), p.run(&spec, &fast), p.run(&spec, &other));
        assert_eq!(a.unwrap()["reply"], "Say: slow");
        assert_eq!(b.unwrap()["reply"], "Say: fast (casual)");
        assert_eq!(c.unwrap()["reply"], "Say: other");
    }

    #[derive(Serialize)]
    struct EchoIn<'a> {
        text: &'a str,
    }

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct EchoOut {
        reply: String,
    }

    #[tokio::test]
    async fn typed_round_trip() {
        let svc = Arc::new(ScriptedCompletion::new().reply(json!({ "reply": "typed" })));
        let out: EchoOut = pipeline(svc)
            .run_typed(&echo_spec(), &EchoIn { text: "x" })
            .await
            .unwrap();
        assert_eq!(
            out,
            EchoOut {
                reply: "typed".into()
            }
        );
    }
}
