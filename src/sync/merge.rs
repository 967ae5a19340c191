//! Upsert of freshly normalized messages into the persisted set.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::message::{Message, MessageType};

/// Per-kind message totals stored alongside the message list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCounts {
    #[serde(default)]
    pub text: usize,
    #[serde(default)]
    pub picture: usize,
    #[serde(default)]
    pub video: usize,
    #[serde(default)]
    pub voice: usize,
}

impl TypeCounts {
    pub fn tally<'a>(messages: impl IntoIterator<Item = &'a Message>) -> Self {
        let mut counts = Self::default();
        for msg in messages {
            match msg.kind {
                MessageType::Text => counts.text += 1,
                MessageType::Picture => counts.picture += 1,
                MessageType::Video => counts.video += 1,
                MessageType::Voice => counts.voice += 1,
            }
        }
        counts
    }
}

/// The full message history of one member, ascending by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedSet {
    pub messages: Vec<Message>,
    pub counts: TypeCounts,
}

impl MergedSet {
    pub fn max_id(&self) -> Option<i64> {
        self.messages.iter().map(|m| m.id).max()
    }

    /// Checkpoint value after this merge: the highest id present, or
    /// `previous` when the set is empty.
    pub fn last_message_id(&self, previous: Option<i64>) -> Option<i64> {
        self.max_id().or(previous)
    }
}

/// Union `existing` and `incoming` by id. On conflict the incoming message
/// replaces the stored one; ids only in `existing` are kept untouched.
///
/// The result is sorted by timestamp, ties broken by id, so repeated merges
/// of the same input produce identical output.
pub fn merge(existing: Vec<Message>, incoming: Vec<Message>) -> MergedSet {
    let mut by_id: HashMap<i64, Message> = HashMap::with_capacity(existing.len() + incoming.len());
    for msg in existing.into_iter().chain(incoming) {
        by_id.insert(msg.id, msg);
    }

    let mut messages: Vec<Message> = by_id.into_values().collect();
    messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));

    let counts = TypeCounts::tally(&messages);
    MergedSet { messages, counts }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: i64, ts: &str, kind: MessageType, content: &str) -> Message {
        Message {
            id,
            timestamp: ts.to_string(),
            kind,
            is_favorite: false,
            content: Some(content.to_string()),
            media_file: None,
        }
    }

    fn existing() -> Vec<Message> {
        vec![
            msg(1, "2024-01-01T00:00:01Z", MessageType::Text, "a"),
            msg(2, "2024-01-01T00:00:02Z", MessageType::Picture, "b"),
            msg(3, "2024-01-01T00:00:03Z", MessageType::Voice, "c"),
        ]
    }

    fn incoming() -> Vec<Message> {
        vec![
            msg(3, "2024-01-01T00:00:03Z", MessageType::Voice, "c edited"),
            msg(4, "2024-01-01T00:00:04Z", MessageType::Video, "d"),
        ]
    }

    #[test]
    fn test_merge_incoming_wins_on_conflict() {
        let merged = merge(existing(), incoming());
        let ids: Vec<i64> = merged.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(merged.messages[2].content.as_deref(), Some("c edited"));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let once = merge(existing(), incoming());
        let twice = merge(once.messages.clone(), incoming());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_is_non_destructive() {
        let merged = merge(existing(), incoming());
        for old in existing().iter().filter(|m| m.id != 3) {
            assert!(merged.messages.contains(old));
        }
    }

    #[test]
    fn test_merge_sorts_by_timestamp_then_id() {
        let merged = merge(
            vec![msg(9, "2024-01-02T00:00:00Z", MessageType::Text, "late")],
            vec![
                msg(7, "2024-01-01T00:00:00Z", MessageType::Text, "tie b"),
                msg(5, "2024-01-01T00:00:00Z", MessageType::Text, "tie a"),
            ],
        );
        let ids: Vec<i64> = merged.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![5, 7, 9]);
    }

    #[test]
    fn test_counts_cover_full_result() {
        let merged = merge(existing(), incoming());
        assert_eq!(
            merged.counts,
            TypeCounts {
                text: 1,
                picture: 1,
                video: 1,
                voice: 1
            }
        );
        let c = merged.counts;
        assert_eq!(c.text + c.picture + c.video + c.voice, merged.messages.len());
    }

    #[test]
    fn test_last_message_id() {
        assert_eq!(merge(existing(), incoming()).last_message_id(Some(2)), Some(4));
        assert_eq!(MergedSet::default().last_message_id(Some(100)), Some(100));
        assert_eq!(MergedSet::default().last_message_id(None), None);
    }
}
