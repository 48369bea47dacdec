//! Whole-store snapshots.
//!
//! A snapshot carries vectors, metadata, the reasoning bank, the id counter
//! and the index configuration — everything needed to rebuild the store.
//! Graph structure is deliberately absent: import replays inserts, so a
//! snapshot stays valid across any internal graph change.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::metadata::VectorRecord;
use crate::reasoning::ReasoningRecord;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub config: StoreConfig,
    pub next_id: u64,
    /// Live vector records in insertion order.
    pub vectors: Vec<VectorRecord>,
    pub reasoning: Vec<ReasoningRecord>,
}

impl Snapshot {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Full validation up front so a failed import can leave the live store
    /// untouched.
    pub(crate) fn validate(&self, live_dimension: usize) -> Result<(), StoreError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(StoreError::Snapshot(format!(
                "unsupported snapshot version {}",
                self.version
            )));
        }
        self.config.validate()?;
        if self.config.dimension != live_dimension {
            return Err(StoreError::Snapshot(format!(
                "snapshot dimension {} does not match store dimension {}",
                self.config.dimension, live_dimension
            )));
        }

        let mut ids = HashSet::with_capacity(self.vectors.len());
        let mut max_id = None;
        for record in &self.vectors {
            if record.vector.len() != self.config.dimension {
                return Err(StoreError::Snapshot(format!(
                    "vector {} has length {}, expected {}",
                    record.id,
                    record.vector.len(),
                    self.config.dimension
                )));
            }
            if !ids.insert(record.id) {
                return Err(StoreError::Snapshot(format!(
                    "duplicate vector id {}",
                    record.id
                )));
            }
            max_id = Some(max_id.map_or(record.id, |m: u64| m.max(record.id)));
        }
        if let Some(max_id) = max_id {
            if self.next_id <= max_id {
                return Err(StoreError::Snapshot(format!(
                    "id counter {} is behind max vector id {}",
                    self.next_id, max_id
                )));
            }
        }

        let mut reasoning_ids = HashSet::with_capacity(self.reasoning.len());
        for record in &self.reasoning {
            if !reasoning_ids.insert(record.id.as_str()) {
                return Err(StoreError::Snapshot(format!(
                    "duplicate reasoning id {}",
                    record.id
                )));
            }
        }

        Ok(())
    }
}
