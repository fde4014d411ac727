//! # Cubit Connect
//!
//! Turns a time-coded video transcript into a persisted feed of tasks.
//!
//! This library provides:
//! - A lenient WebVTT cue parser
//! - A paced Gemini client that extracts tasks and generates sub-steps
//! - A task store with optimistic in-memory updates and whole-snapshot
//!   persistence
//!
//! ## Task Flow
//!
//! ```text
//!   WebVTT ──► cues::parse_cues ──► ExtractionClient::analyze_transcript
//!                                          │
//!                                          ▼
//!                                 TaskStore::append ──► BlobStore
//!
//!   TaskRecord ──► ExtractionClient::generate_sub_steps ──► TaskStore::update
//! ```
//!
//! ## Modules
//! - `cues`: transcript parsing
//! - `llm`: model client trait, Gemini implementation, rate gate
//! - `extraction`: prompts, fence stripping, response validation
//! - `task`: task records and the project snapshot
//! - `store`: the task store
//! - `storage`: blob store trait and backends
//! - `credentials`: API key slot
//! - `pipeline`: ingestion and sub-step enrichment
//! - `config`: environment configuration

pub mod config;
pub mod credentials;
pub mod cues;
pub mod extraction;
pub mod llm;
pub mod pipeline;
pub mod storage;
pub mod store;
pub mod task;

pub use config::Config;
pub use cues::{parse_cues, Cue};
pub use extraction::{ExtractionClient, ExtractionError};
pub use pipeline::{Pipeline, PipelineError};
pub use store::{StoreError, TaskStore};
pub use task::{ProjectSnapshot, TaskId, TaskPatch, TaskRecord};
