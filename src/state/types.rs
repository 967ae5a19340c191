//! Types for the state module.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies one tracked entity. Rendered as `"{group_id}_{member_id}"`,
/// which is also the key used in `sync_state.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CheckpointKey {
    pub group_id: i64,
    pub member_id: i64,
}

impl CheckpointKey {
    pub fn new(group_id: i64, member_id: i64) -> Self {
        Self {
            group_id,
            member_id,
        }
    }
}

impl fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.group_id, self.member_id)
    }
}

/// Summary of the last successful sync of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_message_id: i64,
    pub total_messages: usize,
    pub last_sync: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        assert_eq!(CheckpointKey::new(3, 42).to_string(), "3_42");
    }

    #[test]
    fn test_checkpoint_serializes_rfc3339() {
        let cp = Checkpoint {
            last_message_id: 10,
            total_messages: 1,
            last_sync: "2024-05-01T12:00:00Z".parse().unwrap(),
        };
        let value = serde_json::to_value(&cp).unwrap();
        assert_eq!(value["last_message_id"], 10);
        assert_eq!(value["total_messages"], 1);
        assert_eq!(value["last_sync"], "2024-05-01T12:00:00Z");
    }
}
