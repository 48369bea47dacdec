//! Store construction parameters.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::metric::DistanceMetric;

/// Parameters fixed at store creation.
///
/// `dimension`, `m` and `ef_construction` cannot change without a full
/// rebuild; `ef_search` may be raised or lowered at any time through
/// [`crate::MemoryStore::set_ef_search`]. `capacity` only sizes the initial
/// allocations — inserting past it reallocates, it never fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Vector length every payload and query must match.
    pub dimension: usize,
    /// Pre-allocation hint for the graph and the payload map.
    pub capacity: usize,
    /// Max neighbors per node per layer; the base layer holds `2 * m`.
    pub m: usize,
    /// Candidate budget while wiring neighbors on insert.
    pub ef_construction: usize,
    /// Candidate budget at query time.
    pub ef_search: usize,
    pub metric: DistanceMetric,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            capacity: 10_000,
            m: 16,
            ef_construction: 200,
            ef_search: 50,
            metric: DistanceMetric::Cosine,
        }
    }
}

impl StoreConfig {
    /// Default configuration for a given vector dimension.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.dimension == 0 {
            return Err(StoreError::Config("dimension must be positive".into()));
        }
        // ml = 1/ln(m) drives layer assignment, so m == 1 would divide by zero.
        if self.m < 2 {
            return Err(StoreError::Config("m must be at least 2".into()));
        }
        if self.ef_construction == 0 || self.ef_search == 0 {
            return Err(StoreError::Config(
                "candidate budgets must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(StoreConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_dimension() {
        let config = StoreConfig::with_dimension(0);
        assert!(matches!(config.validate(), Err(StoreError::Config(_))));
    }

    #[test]
    fn rejects_degenerate_m() {
        let config = StoreConfig {
            m: 1,
            ..StoreConfig::with_dimension(8)
        };
        assert!(matches!(config.validate(), Err(StoreError::Config(_))));
    }
}
