//! Usage types for per-day entity counters

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Running totals for one entity on one day. Fields only ever grow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityCounters {
    pub total_time_ms: u64,
    #[serde(alias = "userMsgCount")]
    pub user_message_count: u64,
    #[serde(alias = "aiMsgCount")]
    pub ai_message_count: u64,
    pub user_word_count: u64,
    pub ai_word_count: u64,
}

impl EntityCounters {
    pub fn add(&mut self, delta: &IncrementDelta) {
        self.total_time_ms = self.total_time_ms.saturating_add(delta.time_ms);
        self.user_message_count = self
            .user_message_count
            .saturating_add(delta.user_messages);
        self.ai_message_count = self.ai_message_count.saturating_add(delta.ai_messages);
        self.user_word_count = self.user_word_count.saturating_add(delta.user_words);
        self.ai_word_count = self.ai_word_count.saturating_add(delta.ai_words);
    }
}

/// Validated amounts to add to one entity's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IncrementDelta {
    pub time_ms: u64,
    pub user_messages: u64,
    pub ai_messages: u64,
    pub user_words: u64,
    pub ai_words: u64,
}

impl IncrementDelta {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Entity id → counters for a single day. Serialized as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayBucket(BTreeMap<String, EntityCounters>);

impl DayBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity_id: &str) -> Option<&EntityCounters> {
        self.0.get(entity_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Zero-initialize the entity if unseen, then add the delta
    pub fn apply(&mut self, entity_id: &str, delta: &IncrementDelta) {
        match self.0.get_mut(entity_id) {
            Some(counters) => counters.add(delta),
            None => {
                let mut counters = EntityCounters::default();
                counters.add(delta);
                self.0.insert(entity_id.to_string(), counters);
            }
        }
    }
}

/// Inbound tracking payload.
///
/// Numeric fields stay as raw JSON so that strings, negatives and other
/// junk can be dropped field by field instead of failing the whole request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    pub entity_id: Option<String>,
    pub time_increment_ms: Option<Value>,
    pub message_increment: Option<Value>,
    pub word_increment: Option<Value>,
    /// True when the increment belongs to the human user, false for the AI
    pub is_user: Option<bool>,
}

/// Inbound query payload; `date` defaults to today
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    pub date: Option<String>,
}
