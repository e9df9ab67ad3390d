//! Retry settings for background recalculation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
  /// Retries after the first attempt for transient storage errors.
  pub max_retries:        u32,
  /// Delay before the first retry; doubles on each further retry.
  pub initial_backoff_ms: u64,
  pub max_backoff_ms:     u64,
}

impl Default for DispatchConfig {
  fn default() -> Self {
    Self { max_retries: 3, initial_backoff_ms: 50, max_backoff_ms: 2_000 }
  }
}

impl DispatchConfig {
  pub fn initial_backoff(&self) -> Duration { Duration::from_millis(self.initial_backoff_ms) }

  pub fn max_backoff(&self) -> Duration { Duration::from_millis(self.max_backoff_ms) }
}
