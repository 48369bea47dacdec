//! Keyed bank of free-text context/reasoning records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::metadata::{now_unix_secs, JsonMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningRecord {
    pub id: String,
    pub context: String,
    pub reasoning: String,
    #[serde(default)]
    pub metadata: JsonMap,
    pub created_at: u64,
}

/// Records are append-only: no single-record delete exists, only
/// [`ReasoningBank::clear`].
#[derive(Default)]
pub struct ReasoningBank {
    records: HashMap<String, ReasoningRecord>,
    order: Vec<String>,
    seq: u64,
}

impl ReasoningBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        context: impl Into<String>,
        reasoning: impl Into<String>,
        metadata: JsonMap,
    ) -> String {
        let id = self.next_id();
        let record = ReasoningRecord {
            id: id.clone(),
            context: context.into(),
            reasoning: reasoning.into(),
            metadata,
            created_at: now_unix_secs(),
        };
        self.records.insert(id.clone(), record);
        self.order.push(id.clone());
        id
    }

    /// Re-insert a record under its existing id (snapshot replay).
    pub fn restore(&mut self, record: ReasoningRecord) {
        let id = record.id.clone();
        if self.records.insert(id.clone(), record).is_none() {
            self.order.push(id);
        }
        self.seq = self.seq.max(self.order.len() as u64);
    }

    pub fn get(&self, id: &str) -> Option<&ReasoningRecord> {
        self.records.get(id)
    }

    /// Case-insensitive substring match over `context` and `reasoning`,
    /// in insertion order. A linear scan; this bank stays small next to the
    /// vector index.
    pub fn search(&self, term: &str) -> Vec<&ReasoningRecord> {
        let needle = term.to_lowercase();
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .filter(|r| {
                r.context.to_lowercase().contains(&needle)
                    || r.reasoning.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReasoningRecord> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.order.clear();
        self.seq = 0;
    }

    // A bare counter would collide after clear/import replay and wall-clock
    // time repeats within a second, so ids combine both a sequence number
    // and a random suffix.
    fn next_id(&mut self) -> String {
        let seq = self.seq;
        self.seq += 1;
        format!("rsn_{seq}_{:08x}", rand::random::<u32>())
    }
}
