//! Undo/redo history of step sequences
//!
//! SequenceHistoryStore owns the visible sequence and its snapshots for one
//! editing session.

mod store;

pub use store::{CommitOutcome, DEFAULT_HISTORY_LIMIT, SequenceHistoryStore, SessionToken};
