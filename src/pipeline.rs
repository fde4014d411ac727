//! Transcript ingestion and task enrichment on top of the extraction client
//! and the task store.

use std::sync::Arc;

use crate::cues::{cues_to_transcript, parse_cues};
use crate::extraction::{ExtractionClient, ExtractionError};
use crate::llm::LlmError;
use crate::store::{StoreError, TaskStore};
use crate::task::{TaskId, TaskPatch, TaskRecord};

/// Errors from pipeline runs.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A batch append stopped partway. The first `appended` tasks are in the
    /// feed; the rest of the batch was not added.
    #[error("Added {appended} of {total} extracted tasks: {source}")]
    PartialIngest {
        appended: usize,
        total: usize,
        source: StoreError,
    },
}

impl PipelineError {
    /// The classified model failure behind this error, if any.
    pub fn llm_error(&self) -> Option<&LlmError> {
        match self {
            Self::Extraction(e) => e.llm_error(),
            _ => None,
        }
    }
}

pub struct Pipeline {
    extraction: ExtractionClient,
    store: Arc<TaskStore>,
}

impl Pipeline {
    pub fn new(extraction: ExtractionClient, store: Arc<TaskStore>) -> Self {
        Self { extraction, store }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// Analyze a WebVTT transcript and append the resulting tasks in order.
    ///
    /// Input without any cues is sent to the model verbatim. Returns the
    /// appended records.
    pub async fn ingest_transcript(
        &self,
        credential: &str,
        raw_transcript: &str,
        model: &str,
    ) -> Result<Vec<TaskRecord>, PipelineError> {
        let cues = parse_cues(raw_transcript);
        tracing::info!("Parsed {} cues from transcript", cues.len());

        let transcript = if cues.is_empty() {
            raw_transcript.to_string()
        } else {
            cues_to_transcript(&cues)
        };

        let tasks = self
            .extraction
            .analyze_transcript(credential, &transcript, model)
            .await?;

        let total = tasks.len();
        for (i, task) in tasks.iter().enumerate() {
            if let Err(source) = self.store.append(task.clone()).await {
                // A failed write still leaves its task in the in-memory list.
                let appended = match source {
                    StoreError::Persist(_) => i + 1,
                    _ => i,
                };
                tracing::error!(
                    "Stopped ingest after {} of {} tasks: {}",
                    appended,
                    total,
                    source
                );
                return Err(PipelineError::PartialIngest {
                    appended,
                    total,
                    source,
                });
            }
        }
        Ok(tasks)
    }

    /// Generate sub-steps for a stored task and save them on it.
    pub async fn cubit(
        &self,
        credential: &str,
        task_id: &TaskId,
        model: &str,
    ) -> Result<Vec<String>, PipelineError> {
        let task = self
            .store
            .get(task_id)
            .ok_or_else(|| StoreError::TaskNotFound(task_id.clone()))?;

        let steps = self
            .extraction
            .generate_sub_steps(credential, &task.task_name, &task.description, model)
            .await;

        self.store
            .update(task_id, TaskPatch::sub_steps(steps.clone()))
            .await?;
        Ok(steps)
    }
}
