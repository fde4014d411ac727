//! Task records and the persisted project snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::cues::format_clock;

/// Opaque, unique task identifier.
///
/// New ids are random UUIDs; ids loaded from storage or imports are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A topic segment extracted from a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub task_name: String,
    /// Offset into the video, in seconds. Never negative.
    pub timestamp_seconds: f64,
    pub description: String,
    /// Thumbnail data URL, filled in after creation by the capture step.
    #[serde(default)]
    pub screenshot_base64: String,
    /// Generated action steps. When present, never empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_steps: Option<Vec<String>>,
}

impl TaskRecord {
    /// Create a locally authored task with a fresh id.
    pub fn new(
        task_name: impl Into<String>,
        timestamp_seconds: f64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: TaskId::generate(),
            task_name: task_name.into(),
            timestamp_seconds: clamp_timestamp(timestamp_seconds),
            description: description.into(),
            screenshot_base64: String::new(),
            sub_steps: None,
        }
    }

    /// Timestamp formatted as `MM:SS` for feed display.
    pub fn display_time(&self) -> String {
        format_clock(self.timestamp_seconds)
    }

    /// Apply the fields set in `patch`. The id never changes.
    pub fn apply(&mut self, patch: TaskPatch) {
        if let Some(name) = patch.task_name {
            self.task_name = name;
        }
        if let Some(ts) = patch.timestamp_seconds {
            self.timestamp_seconds = clamp_timestamp(ts);
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(screenshot) = patch.screenshot_base64 {
            self.screenshot_base64 = screenshot;
        }
        if let Some(steps) = patch.sub_steps {
            // An empty list means "no steps", not "zero steps".
            self.sub_steps = if steps.is_empty() { None } else { Some(steps) };
        }
    }
}

/// Negative and non-finite timestamps collapse to the start of the video.
pub(crate) fn clamp_timestamp(ts: f64) -> f64 {
    if ts.is_finite() && ts > 0.0 {
        ts
    } else {
        0.0
    }
}

/// Partial update for a [`TaskRecord`]. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_steps: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Default::default()
        }
    }

    pub fn sub_steps(steps: Vec<String>) -> Self {
        Self {
            sub_steps: Some(steps),
            ..Default::default()
        }
    }
}

/// The whole project as written to storage in one blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub tasks: Vec<TaskRecord>,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

impl ProjectSnapshot {
    /// Snapshot of `tasks` stamped with the current time.
    pub fn now(tasks: Vec<TaskRecord>) -> Self {
        Self {
            tasks,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}
