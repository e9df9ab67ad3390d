//! Exponential backoff between retries of a failed recalculation.

use std::time::Duration;

use crate::DispatchConfig;

/// Doubling delays, capped at a maximum.
#[derive(Debug, Clone)]
pub struct Backoff {
  next: Duration,
  max:  Duration,
}

impl Backoff {
  pub fn new(config: &DispatchConfig) -> Self {
    let max = config.max_backoff();
    Self { next: config.initial_backoff().min(max), max }
  }

  /// The delay to wait before the next attempt.
  pub fn next_delay(&mut self) -> Duration {
    let delay = self.next;
    self.next = (self.next * 2).min(self.max);
    delay
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn doubles_until_the_cap() {
    let mut b = Backoff::new(&DispatchConfig {
      max_retries:        5,
      initial_backoff_ms: 100,
      max_backoff_ms:     500,
    });
    let delays: Vec<u64> = (0..5).map(|_| b.next_delay().as_millis() as u64).collect();
    assert_eq!(delays, vec![100, 200, 400, 500, 500]);
  }

  #[test]
  fn initial_delay_never_exceeds_the_cap() {
    let mut b = Backoff::new(&DispatchConfig {
      max_retries:        1,
      initial_backoff_ms: 900,
      max_backoff_ms:     10,
    });
    assert_eq!(b.next_delay(), Duration::from_millis(10));
  }
}
