use cubejoin_error::{JoinError, Result};
use cubejoin_types::limits::{DEFAULT_MAX_RIGHT_LINK_CHAIN, DEFAULT_SEGMENT_CAPACITY};
use serde::{Deserialize, Serialize};

/// Tuning knobs of a [`CubeJoin`](crate::CubeJoin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    /// Entries per segment of the pending stack and the result queue.
    pub segment_capacity: usize,
    /// Right links followed from one page before the chain is declared
    /// broken.
    pub max_right_link_chain: usize,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            segment_capacity: DEFAULT_SEGMENT_CAPACITY,
            max_right_link_chain: DEFAULT_MAX_RIGHT_LINK_CHAIN,
        }
    }
}

impl JoinConfig {
    #[must_use]
    pub fn with_segment_capacity(mut self, segment_capacity: usize) -> Self {
        self.segment_capacity = segment_capacity;
        self
    }

    #[must_use]
    pub fn with_max_right_link_chain(mut self, max_right_link_chain: usize) -> Self {
        self.max_right_link_chain = max_right_link_chain;
        self
    }

    /// Parse a JSON object; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| JoinError::invalid_config(format!("malformed join config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.segment_capacity == 0 {
            return Err(JoinError::invalid_config(
                "segment_capacity must be positive",
            ));
        }
        if self.max_right_link_chain == 0 {
            return Err(JoinError::invalid_config(
                "max_right_link_chain must be positive",
            ));
        }
        Ok(())
    }
}
