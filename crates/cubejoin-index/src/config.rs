use cubejoin_error::{JoinError, Result};
use cubejoin_types::limits::{DEFAULT_MAX_FANOUT, MIN_FANOUT};
use serde::{Deserialize, Serialize};

/// Shape parameters of a [`MemRTree`](crate::MemRTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RTreeConfig {
    /// Maximum tuples per page; one more triggers a split.
    pub max_fanout: usize,
}

impl Default for RTreeConfig {
    fn default() -> Self {
        Self {
            max_fanout: DEFAULT_MAX_FANOUT,
        }
    }
}

impl RTreeConfig {
    #[must_use]
    pub fn with_max_fanout(max_fanout: usize) -> Self {
        Self { max_fanout }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_fanout < MIN_FANOUT {
            return Err(JoinError::invalid_config(format!(
                "max_fanout must be at least {MIN_FANOUT}, got {}",
                self.max_fanout
            )));
        }
        Ok(())
    }
}
