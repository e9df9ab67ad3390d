//! Source credibility.
//!
//! ```text
//! survival  = 1 - discredited / n
//! alignment = agreeing / judged                (0.5 when nothing judged)
//! raw       = (w_s × survival + w_a × alignment) / (w_s + w_a)
//! λ         = min(n / min_sample, 1)
//! score     = 0.5 × (1 - λ) + raw × λ
//! ```
//!
//! Small samples are pulled toward neutral so a single early mistake does not
//! sink a source, and a single early success does not crown one.

use serde::{Deserialize, Serialize};

use crate::{
  ScoringConfig,
  evidence::{Direction, Evidence, ReviewStatus},
  score::NEUTRAL_SCORE,
};

/// Counts gathered from a source's evidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CredibilityInputs {
  /// Non-removed evidence from the source.
  pub evidence_count:    u32,
  /// Of those, how many an upheld challenge discredited.
  pub discredited_count: u32,
  /// Evidence on targets whose consensus has taken a side.
  pub judged_count:      u32,
  /// Of the judged evidence, how many agree with that side.
  pub aligned_count:     u32,
}

impl CredibilityInputs {
  /// Tally a source's evidence against the current scores of its targets.
  ///
  /// `current_score` is `None` when the target has no score row.
  pub fn tally<'a>(
    items: impl IntoIterator<Item = (&'a Evidence, Option<f64>)>,
  ) -> Self {
    let mut inputs = Self::default();
    for (evidence, current_score) in items {
      if evidence.is_removed() {
        continue;
      }
      inputs.evidence_count += 1;
      if evidence.review_status == ReviewStatus::Discredited {
        inputs.discredited_count += 1;
      }
      if let Some(agrees) =
        current_score.and_then(|s| agrees_with_consensus(evidence.direction, s))
      {
        inputs.judged_count += 1;
        if agrees {
          inputs.aligned_count += 1;
        }
      }
    }
    inputs
  }
}

/// Whether evidence pointing in `direction` agrees with a target scored
/// `score`. `None` while the target sits exactly at neutral.
pub fn agrees_with_consensus(direction: Direction, score: f64) -> Option<bool> {
  if score > NEUTRAL_SCORE {
    Some(direction == Direction::Supporting)
  } else if score < NEUTRAL_SCORE {
    Some(direction == Direction::Refuting)
  } else {
    None
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CredibilityAssessment {
  pub score:               f64,
  pub challenged_fraction: f64,
  pub consensus_alignment: f64,
}

pub fn assess(inputs: &CredibilityInputs, config: &ScoringConfig) -> CredibilityAssessment {
  if inputs.evidence_count == 0 {
    return CredibilityAssessment {
      score:               NEUTRAL_SCORE,
      challenged_fraction: 0.0,
      consensus_alignment: NEUTRAL_SCORE,
    };
  }

  let n = f64::from(inputs.evidence_count);
  let challenged_fraction = f64::from(inputs.discredited_count) / n;
  let survival = 1.0 - challenged_fraction;
  let consensus_alignment = if inputs.judged_count == 0 {
    NEUTRAL_SCORE
  } else {
    f64::from(inputs.aligned_count) / f64::from(inputs.judged_count)
  };

  let ws = config.credibility_survival_weight;
  let wa = config.credibility_alignment_weight;
  let raw = if ws + wa > 0.0 {
    (ws * survival + wa * consensus_alignment) / (ws + wa)
  } else {
    survival
  };

  let lambda = if config.credibility_min_sample == 0 {
    1.0
  } else {
    (n / f64::from(config.credibility_min_sample)).min(1.0)
  };
  let score = NEUTRAL_SCORE * (1.0 - lambda) + raw * lambda;

  CredibilityAssessment {
    score: score.clamp(0.0, 1.0),
    challenged_fraction,
    consensus_alignment,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const EPS: f64 = 1e-9;

  fn inputs(n: u32, discredited: u32, judged: u32, aligned: u32) -> CredibilityInputs {
    CredibilityInputs {
      evidence_count:    n,
      discredited_count: discredited,
      judged_count:      judged,
      aligned_count:     aligned,
    }
  }

  #[test]
  fn no_evidence_is_neutral() {
    let a = assess(&CredibilityInputs::default(), &ScoringConfig::default());
    assert_eq!(a.score, 0.5);
  }

  #[test]
  fn perfect_record_at_full_sample_is_one() {
    let a = assess(&inputs(5, 0, 5, 5), &ScoringConfig::default());
    assert!((a.score - 1.0).abs() < EPS);
  }

  #[test]
  fn small_samples_are_pulled_toward_neutral() {
    let cfg = ScoringConfig::default();
    let one = assess(&inputs(1, 0, 1, 1), &cfg);
    let five = assess(&inputs(5, 0, 5, 5), &cfg);
    assert!(one.score > 0.5 && one.score < five.score);
    // λ = 1/5 → 0.5 × 0.8 + 1.0 × 0.2
    assert!((one.score - 0.6).abs() < EPS);
  }

  #[test]
  fn discredited_evidence_lowers_credibility() {
    let cfg = ScoringConfig::default();
    let clean = assess(&inputs(10, 0, 0, 0), &cfg);
    let dirty = assess(&inputs(10, 5, 0, 0), &cfg);
    assert!(dirty.score < clean.score);
    assert_eq!(dirty.challenged_fraction, 0.5);
    // raw = 0.7 × 0.5 + 0.3 × 0.5
    assert!((dirty.score - 0.5).abs() < EPS);
  }

  #[test]
  fn alignment_requires_a_side() {
    assert_eq!(agrees_with_consensus(Direction::Supporting, 0.5), None);
    assert_eq!(agrees_with_consensus(Direction::Supporting, 0.9), Some(true));
    assert_eq!(agrees_with_consensus(Direction::Refuting, 0.9), Some(false));
    assert_eq!(agrees_with_consensus(Direction::Refuting, 0.1), Some(true));
  }
}
