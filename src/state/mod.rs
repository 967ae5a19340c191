//! Persistent sync state.
//!
//! A single `sync_state.json` in the output directory maps every tracked
//! (group, member) pair to the highest message id already merged, so the
//! next cycle only asks the feed for newer records.

pub mod checkpoint;
pub mod error;
pub mod types;

pub use checkpoint::{CheckpointStore, STATE_FILE};
pub use error::StateError;
pub use types::CheckpointKey;
