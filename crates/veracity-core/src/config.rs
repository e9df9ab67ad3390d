//! Tunable constants for the scoring engine.
//!
//! Every field has a default, so an empty `[scoring]` table in the server
//! configuration is valid.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  scoring::{check_decay_rate, check_unit},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
  /// Multiplicative penalty per open challenge.
  pub challenge_penalty:             f64,
  /// Lower bound on the compounded challenge impact.
  pub challenge_floor:               f64,
  /// Decay constant (per day) when neither the evidence nor its target's
  /// domain specifies one.
  pub default_decay_rate:            f64,
  /// Per-domain decay constants, keyed by target domain.
  pub domain_decay_rates:            BTreeMap<String, f64>,
  /// Weight multiplier for evidence discredited by an upheld challenge.
  pub discredited_weight_factor:     f64,
  /// Evidence count below which source credibility is blended toward 0.5.
  pub credibility_min_sample:        u32,
  pub credibility_survival_weight:   f64,
  pub credibility_alignment_weight:  f64,
  /// Minimum credibility move that rescores the source's targets.
  pub credibility_rescore_threshold: f64,
  /// Lifetime of a score that depends on decaying evidence.
  pub decay_refresh_interval_hours:  u32,
  /// Default cut-off for the disputed-targets listing.
  pub disputed_threshold:            f64,
}

impl Default for ScoringConfig {
  fn default() -> Self {
    Self {
      challenge_penalty:             0.1,
      challenge_floor:               0.1,
      default_decay_rate:            0.01,
      domain_decay_rates:            BTreeMap::new(),
      discredited_weight_factor:     0.1,
      credibility_min_sample:        5,
      credibility_survival_weight:   0.7,
      credibility_alignment_weight:  0.3,
      credibility_rescore_threshold: 0.01,
      decay_refresh_interval_hours:  24,
      disputed_threshold:            0.5,
    }
  }
}

impl ScoringConfig {
  pub fn validate(&self) -> Result<()> {
    check_unit("challenge_penalty", self.challenge_penalty)?;
    check_unit("challenge_floor", self.challenge_floor)?;
    check_unit("discredited_weight_factor", self.discredited_weight_factor)?;
    check_unit("credibility_rescore_threshold", self.credibility_rescore_threshold)?;
    check_unit("disputed_threshold", self.disputed_threshold)?;
    check_decay_rate(self.default_decay_rate)?;
    for rate in self.domain_decay_rates.values() {
      check_decay_rate(*rate)?;
    }
    for (name, w) in [
      ("credibility_survival_weight", self.credibility_survival_weight),
      ("credibility_alignment_weight", self.credibility_alignment_weight),
    ] {
      if !w.is_finite() || w < 0.0 {
        return Err(Error::InvalidInput(format!("{name} must be non-negative")));
      }
    }
    if self.credibility_survival_weight + self.credibility_alignment_weight <= 0.0
    {
      return Err(Error::InvalidInput(
        "credibility weights must not both be zero".into(),
      ));
    }
    if self.decay_refresh_interval_hours == 0 {
      return Err(Error::InvalidInput(
        "decay_refresh_interval_hours must be positive".into(),
      ));
    }
    Ok(())
  }

  /// Resolve the decay constant: evidence override, then domain, then
  /// default.
  pub fn decay_rate_for(&self, evidence_rate: Option<f64>, domain: Option<&str>) -> f64 {
    evidence_rate
      .or_else(|| domain.and_then(|d| self.domain_decay_rates.get(d).copied()))
      .unwrap_or(self.default_decay_rate)
  }

  pub fn decay_refresh_interval(&self) -> chrono::Duration {
    chrono::Duration::hours(i64::from(self.decay_refresh_interval_hours))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() { ScoringConfig::default().validate().unwrap(); }

  #[test]
  fn decay_rate_resolution_order() {
    let mut cfg = ScoringConfig::default();
    cfg.domain_decay_rates.insert("news".into(), 0.2);

    assert_eq!(cfg.decay_rate_for(Some(0.05), Some("news")), 0.05);
    assert_eq!(cfg.decay_rate_for(None, Some("news")), 0.2);
    assert_eq!(cfg.decay_rate_for(None, Some("physics")), 0.01);
    assert_eq!(cfg.decay_rate_for(None, None), 0.01);
  }

  #[test]
  fn penalty_out_of_range_is_rejected() {
    let cfg = ScoringConfig { challenge_penalty: 1.5, ..Default::default() };
    assert!(cfg.validate().is_err());
  }

  #[test]
  fn deserialises_partial_table() {
    let cfg: ScoringConfig =
      serde_json::from_str(r#"{ "challenge_penalty": 0.2 }"#).unwrap();
    assert_eq!(cfg.challenge_penalty, 0.2);
    assert_eq!(cfg.challenge_floor, 0.1);
  }
}
