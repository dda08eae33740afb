//! Workflow editor
//!
//! Actor that owns the editable sequence, its history and the per-step
//! revision state.

mod events;
mod manager;
mod messages;

pub use events::EditorEvent;
pub use manager::{EditorSettings, Snapshot, WorkflowEditor};
pub use messages::{EditorCommand, EditorError, EditorResponse, LoadOutcome};
