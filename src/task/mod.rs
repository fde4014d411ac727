//! Task module - defines task records, partial updates, and the persisted
//! project snapshot.
//!
//! Invariants enforced by constructors and `TaskRecord::apply`:
//! - `timestamp_seconds` is never negative
//! - `sub_steps`, when present, is never empty
//! - an id never changes once assigned

mod record;

pub(crate) use record::clamp_timestamp;
pub use record::{ProjectSnapshot, TaskId, TaskPatch, TaskRecord};
