//! Extraction client: turns transcripts into task records and tasks into
//! sub-steps using a generative model.
//!
//! Every call goes through the same sequence:
//! 1. Wait on the rate gate
//! 2. Send one prompt to the model
//! 3. Strip code fences from the reply
//! 4. Parse and shape-check the JSON
//!
//! Analysis failures are returned to the caller. Sub-step generation never
//! fails; it falls back to fixed placeholder steps instead.

mod prompts;
mod sanitize;

pub use prompts::{truncate_chars, SUB_STEP_COUNT, TRANSCRIPT_CHAR_LIMIT};
pub use sanitize::sanitize;

use serde::Deserialize;
use std::sync::Arc;

use crate::llm::{GenerativeModel, LlmError, RateGate};
use crate::task::{clamp_timestamp, TaskId, TaskRecord};

/// Name of the placeholder task returned when the provider blocks a prompt.
pub const BLOCKED_TASK_NAME: &str = "Content Blocked";
pub const BLOCKED_TASK_DESCRIPTION: &str = "This content was blocked by AI safety policies.";

/// Returned when the sub-step reply is valid JSON of the wrong shape.
pub const SUB_STEPS_SHAPE_FALLBACK: [&str; 2] =
    ["Could not generate steps.", "Please try again."];
/// Returned when the call fails or its reply cannot be read as JSON.
pub const SUB_STEPS_CALL_FALLBACK: [&str; 2] =
    ["Error generating steps.", "Check API Key or Network."];

/// Transcript sent when checking a credential.
const VALIDATION_TRANSCRIPT: &str = "Hello world";

/// Errors from transcript analysis.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The model answered, but not with a JSON array of task records.
    #[error("Failed to parse AI response: {0}")]
    ResponseParse(String),

    /// No API key was supplied.
    #[error("API key cannot be empty")]
    MissingCredential,

    /// The model call failed (network, auth, quota). Passed through untouched.
    #[error(transparent)]
    Call(#[from] anyhow::Error),
}

impl ExtractionError {
    /// The classified HTTP failure behind a `Call` error, if there is one.
    pub fn llm_error(&self) -> Option<&LlmError> {
        match self {
            Self::Call(e) => e.downcast_ref::<LlmError>(),
            _ => None,
        }
    }
}

/// Task fields the model is asked to produce. Anything else it sends
/// (ids, screenshots) is dropped.
#[derive(Debug, Deserialize)]
struct RawTask {
    task_name: String,
    timestamp_seconds: f64,
    description: String,
}

/// Shape-check the sanitized analysis reply.
fn parse_task_array(cleaned: &str) -> Result<Vec<RawTask>, ExtractionError> {
    let value: serde_json::Value = serde_json::from_str(cleaned)
        .map_err(|e| ExtractionError::ResponseParse(format!("invalid JSON: {}", e)))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        other => {
            return Err(ExtractionError::ResponseParse(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            )))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value::<RawTask>(item).map_err(|e| {
                ExtractionError::ResponseParse(format!("element {} is not a task: {}", i, e))
            })
        })
        .collect()
}

/// Outcome of reading a sub-step reply.
#[derive(Debug, PartialEq)]
enum StepReply {
    /// Up to [`SUB_STEP_COUNT`] steps.
    Steps(Vec<String>),
    /// Valid JSON, but not a non-empty array of strings.
    WrongShape,
    /// Not JSON at all.
    Unreadable(String),
}

/// Parse and shape-check the sanitized sub-step reply.
fn parse_step_array(cleaned: &str) -> StepReply {
    let value: serde_json::Value = match serde_json::from_str(cleaned) {
        Ok(v) => v,
        Err(e) => return StepReply::Unreadable(e.to_string()),
    };

    match serde_json::from_value::<Vec<String>>(value) {
        Ok(steps) if !steps.is_empty() => {
            StepReply::Steps(steps.into_iter().take(SUB_STEP_COUNT).collect())
        }
        _ => StepReply::WrongShape,
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

fn owned(steps: [&str; 2]) -> Vec<String> {
    steps.iter().map(|s| s.to_string()).collect()
}

/// Composes the rate gate, a model client, and response validation.
#[derive(Clone)]
pub struct ExtractionClient {
    model: Arc<dyn GenerativeModel>,
    rate_gate: Arc<RateGate>,
}

impl ExtractionClient {
    /// Create a client that paces calls through the process-wide gate.
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self::with_rate_gate(model, RateGate::shared())
    }

    /// Create a client with its own gate.
    pub fn with_rate_gate(model: Arc<dyn GenerativeModel>, rate_gate: Arc<RateGate>) -> Self {
        Self { model, rate_gate }
    }

    /// Segment a transcript into tasks.
    ///
    /// Only the first [`TRANSCRIPT_CHAR_LIMIT`] characters are sent. A safety
    /// block is a success carrying a single "Content Blocked" record.
    pub async fn analyze_transcript(
        &self,
        credential: &str,
        transcript_text: &str,
        model: &str,
    ) -> Result<Vec<TaskRecord>, ExtractionError> {
        self.rate_gate.acquire().await;

        let prompt = prompts::analysis_prompt(transcript_text);
        let response = self
            .model
            .generate_content(credential, model, &prompt)
            .await
            .map_err(|e| {
                tracing::error!("Transcript analysis call failed: {:#}", e);
                ExtractionError::Call(e)
            })?;

        if let Some(reason) = &response.block_reason {
            tracing::warn!("Transcript analysis blocked by safety policy: {}", reason);
            return Ok(vec![TaskRecord {
                id: TaskId::generate(),
                task_name: BLOCKED_TASK_NAME.to_string(),
                timestamp_seconds: 0.0,
                description: BLOCKED_TASK_DESCRIPTION.to_string(),
                screenshot_base64: String::new(),
                sub_steps: None,
            }]);
        }

        let text = response.text.unwrap_or_default();
        if text.trim().is_empty() {
            tracing::error!("Transcript analysis returned an empty response");
            return Err(ExtractionError::ResponseParse("empty response".to_string()));
        }

        let raw_tasks = parse_task_array(&sanitize(&text)).map_err(|e| {
            tracing::error!("JSON parse failed for analysis response: {}", text);
            e
        })?;

        let tasks: Vec<TaskRecord> = raw_tasks
            .into_iter()
            .map(|raw| TaskRecord {
                id: TaskId::generate(),
                task_name: raw.task_name,
                timestamp_seconds: clamp_timestamp(raw.timestamp_seconds),
                description: raw.description,
                screenshot_base64: String::new(),
                sub_steps: None,
            })
            .collect();

        tracing::info!("Extracted {} tasks from transcript", tasks.len());
        Ok(tasks)
    }

    /// Break a task into at most [`SUB_STEP_COUNT`] steps.
    ///
    /// Never fails: a malformed reply or a failed call yields a fixed
    /// two-step fallback.
    pub async fn generate_sub_steps(
        &self,
        credential: &str,
        task_name: &str,
        context_description: &str,
        model: &str,
    ) -> Vec<String> {
        self.rate_gate.acquire().await;

        let prompt = prompts::sub_steps_prompt(task_name, context_description);
        let response = match self.model.generate_content(credential, model, &prompt).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("Sub-step generation failed for {:?}: {:#}", task_name, e);
                return owned(SUB_STEPS_CALL_FALLBACK);
            }
        };

        // A blocked or empty reply has no text to read, same as unparseable text.
        let Some(text) = response.text.as_deref() else {
            tracing::error!(
                "No sub-step text for {:?} (blocked: {})",
                task_name,
                response.is_blocked()
            );
            return owned(SUB_STEPS_CALL_FALLBACK);
        };

        match parse_step_array(&sanitize(text)) {
            StepReply::Steps(steps) => {
                tracing::debug!("Generated {} sub-steps for {:?}", steps.len(), task_name);
                steps
            }
            StepReply::WrongShape => {
                tracing::warn!("Sub-step response for {:?} has the wrong shape", task_name);
                owned(SUB_STEPS_SHAPE_FALLBACK)
            }
            StepReply::Unreadable(e) => {
                tracing::error!("Sub-step JSON parse failed for {:?}: {}", task_name, e);
                owned(SUB_STEPS_CALL_FALLBACK)
            }
        }
    }

    /// Check a credential with a throwaway analysis.
    pub async fn validate_credential(
        &self,
        credential: &str,
        model: &str,
    ) -> Result<(), ExtractionError> {
        if credential.trim().is_empty() {
            return Err(ExtractionError::MissingCredential);
        }
        self.analyze_transcript(credential, VALIDATION_TRANSCRIPT, model)
            .await
            .map(|_| ())
    }
}
