//! The scoring engine: pure functions from ledger state to a veracity score.
//!
//! ```text
//! effective_weight = base_weight × confidence × source_credibility
//!                  × temporal_decay × review_factor
//! temporal_decay   = e^(-rate × days_elapsed)          (1.0 without a date)
//! consensus        = support / (support + refute)      (0.5 without evidence)
//! challenge_impact = max((1 - penalty)^open, floor)
//! veracity         = clamp(consensus × challenge_impact, 0, 1)
//! ```
//!
//! Nothing here reads the clock or the database; callers pass a
//! [`LedgerSnapshot`] and the reference time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result, ScoringConfig,
  evidence::{Direction, Evidence, ReviewStatus},
  score::NEUTRAL_SCORE,
  target::Target,
};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

// ─── Input checks ────────────────────────────────────────────────────────────

/// Reject values outside [0, 1] (and NaN).
pub fn check_unit(name: &str, value: f64) -> Result<()> {
  if value.is_finite() && (0.0..=1.0).contains(&value) {
    Ok(())
  } else {
    Err(Error::InvalidInput(format!("{name} must be within [0, 1], got {value}")))
  }
}

pub fn check_decay_rate(rate: f64) -> Result<()> {
  if rate.is_finite() && rate >= 0.0 {
    Ok(())
  } else {
    Err(Error::InvalidInput(format!("decay rate must be non-negative, got {rate}")))
  }
}

// ─── Evidence weighting ──────────────────────────────────────────────────────

/// Fractional days from `from` to `now`; zero when `from` is in the future.
pub fn days_elapsed(from: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
  ((now - from).num_milliseconds().max(0) as f64) / MILLIS_PER_DAY
}

/// Exponential decay factor in (0, 1]. Undated evidence does not decay.
pub fn temporal_decay(
  relevance_date: Option<DateTime<Utc>>,
  rate: f64,
  now: DateTime<Utc>,
) -> f64 {
  match relevance_date {
    Some(date) => (-rate * days_elapsed(date, now)).exp(),
    None => 1.0,
  }
}

/// Multiplier contributed by the evidence's peer-review status.
pub fn review_factor(status: ReviewStatus, config: &ScoringConfig) -> f64 {
  match status {
    ReviewStatus::Unreviewed | ReviewStatus::Verified => 1.0,
    ReviewStatus::Discredited => config.discredited_weight_factor,
  }
}

/// Everything needed to weight one evidence record.
#[derive(Debug, Clone, Copy)]
pub struct WeightInputs {
  pub base_weight:    f64,
  pub confidence:     f64,
  pub credibility:    f64,
  pub review_status:  ReviewStatus,
  pub relevance_date: Option<DateTime<Utc>>,
  pub decay_rate:     f64,
}

/// Effective weight of one evidence record, in [0, 1].
///
/// Out-of-range inputs are an error, never silently clamped.
pub fn effective_weight(
  inputs: &WeightInputs,
  config: &ScoringConfig,
  now: DateTime<Utc>,
) -> Result<f64> {
  check_unit("base_weight", inputs.base_weight)?;
  check_unit("confidence", inputs.confidence)?;
  check_unit("source_credibility", inputs.credibility)?;
  check_decay_rate(inputs.decay_rate)?;

  let decay = temporal_decay(inputs.relevance_date, inputs.decay_rate, now);
  let weight = inputs.base_weight
    * inputs.confidence
    * inputs.credibility
    * decay
    * review_factor(inputs.review_status, config);

  Ok(weight.clamp(0.0, 1.0))
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

/// Share of effective weight that supports the target; neutral without any.
pub fn consensus(support_total: f64, refute_total: f64) -> f64 {
  let total = support_total + refute_total;
  if total > 0.0 { support_total / total } else { NEUTRAL_SCORE }
}

/// Compounded penalty of the open challenges, never below the floor.
pub fn challenge_impact(open_challenges: u32, config: &ScoringConfig) -> f64 {
  let exponent = i32::try_from(open_challenges).unwrap_or(i32::MAX);
  (1.0 - config.challenge_penalty)
    .powi(exponent)
    .max(config.challenge_floor)
    .min(1.0)
}

pub fn aggregate(consensus: f64, challenge_impact: f64) -> f64 {
  (consensus * challenge_impact).clamp(0.0, 1.0)
}

// ─── Whole-target evaluation ─────────────────────────────────────────────────

/// An evidence record paired with the credibility of its source, read in the
/// same snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotEvidence {
  pub evidence:           Evidence,
  pub source_credibility: f64,
}

/// The ledger state a single recalculation reads.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
  pub target:          Target,
  pub evidence:        Vec<SnapshotEvidence>,
  pub open_challenges: u32,
}

/// Every intermediate value of a score, for storage and explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
  pub support_weight:   f64,
  pub refute_weight:    f64,
  pub evidence_count:   u32,
  pub consensus:        f64,
  pub challenge_impact: f64,
  pub open_challenges:  u32,
  /// Whether any counted evidence decays, i.e. the score drifts with time.
  pub decaying:         bool,
  pub score:            f64,
}

impl ScoreBreakdown {
  /// When a score computed at `now` has to be refreshed.
  pub fn expires_at(
    &self,
    config: &ScoringConfig,
    now: DateTime<Utc>,
  ) -> Option<DateTime<Utc>> {
    self.decaying.then(|| now + config.decay_refresh_interval())
  }
}

/// Score a tier-1 target from its ledger snapshot.
///
/// Tier-0 targets have a constant score and are refused here.
pub fn evaluate(
  snapshot: &LedgerSnapshot,
  config: &ScoringConfig,
  now: DateTime<Utc>,
) -> Result<ScoreBreakdown> {
  if snapshot.target.tier.is_fixed() {
    return Err(Error::ImmutableTargetViolation(snapshot.target.target));
  }

  let domain = snapshot.target.domain.as_deref();
  let mut support_weight = 0.0;
  let mut refute_weight = 0.0;
  let mut evidence_count = 0;
  let mut decaying = false;

  for item in &snapshot.evidence {
    let evidence = &item.evidence;
    if evidence.is_removed() {
      continue;
    }

    let rate = config.decay_rate_for(evidence.decay_rate, domain);
    let weight = effective_weight(
      &WeightInputs {
        base_weight: evidence.base_weight,
        confidence: evidence.confidence,
        credibility: item.source_credibility,
        review_status: evidence.review_status,
        relevance_date: evidence.relevance_date,
        decay_rate: rate,
      },
      config,
      now,
    )?;
    if weight <= 0.0 {
      continue;
    }

    evidence_count += 1;
    decaying |= evidence.relevance_date.is_some() && rate > 0.0;
    match evidence.direction {
      Direction::Supporting => support_weight += weight,
      Direction::Refuting => refute_weight += weight,
    }
  }

  let consensus = consensus(support_weight, refute_weight);
  let challenge_impact = challenge_impact(snapshot.open_challenges, config);

  Ok(ScoreBreakdown {
    support_weight,
    refute_weight,
    evidence_count,
    consensus,
    challenge_impact,
    open_challenges: snapshot.open_challenges,
    decaying,
    score: aggregate(consensus, challenge_impact),
  })
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};
  use uuid::Uuid;

  use super::*;
  use crate::target::{TargetRef, Tier};

  const EPS: f64 = 1e-9;

  fn approx(a: f64, b: f64) -> bool { (a - b).abs() < EPS }

  fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap() }

  fn target(tier: Tier) -> Target {
    Target {
      target: TargetRef::Claim(Uuid::new_v4()),
      tier,
      domain: None,
      created_at: now(),
    }
  }

  fn evidence(
    target: TargetRef,
    direction: Direction,
    base_weight: f64,
  ) -> Evidence {
    Evidence {
      evidence_id: Uuid::new_v4(),
      target,
      source_id: Uuid::new_v4(),
      direction,
      base_weight,
      confidence: 1.0,
      content: String::new(),
      relevance_date: None,
      decay_rate: None,
      review_status: ReviewStatus::Unreviewed,
      submitted_at: now(),
      updated_at: now(),
      removed_at: None,
      removal_reason: None,
    }
  }

  fn snapshot(target: Target, evidence: Vec<Evidence>, open: u32) -> LedgerSnapshot {
    LedgerSnapshot {
      target,
      evidence: evidence
        .into_iter()
        .map(|evidence| SnapshotEvidence { evidence, source_credibility: 1.0 })
        .collect(),
      open_challenges: open,
    }
  }

  fn inputs(relevance_date: Option<DateTime<Utc>>, rate: f64) -> WeightInputs {
    WeightInputs {
      base_weight: 0.8,
      confidence: 0.9,
      credibility: 0.7,
      review_status: ReviewStatus::Unreviewed,
      relevance_date,
      decay_rate: rate,
    }
  }

  // ── Weighting ─────────────────────────────────────────────────────────────

  #[test]
  fn undated_evidence_does_not_decay() {
    assert_eq!(temporal_decay(None, 0.5, now()), 1.0);
  }

  #[test]
  fn weight_at_zero_days_is_the_plain_product() {
    let w = effective_weight(&inputs(Some(now()), 0.01), &ScoringConfig::default(), now())
      .unwrap();
    assert_eq!(w, 0.8 * 0.9 * 0.7);
  }

  #[test]
  fn weight_strictly_decreases_with_age() {
    let cfg = ScoringConfig::default();
    let mut previous = f64::INFINITY;
    for days in [0, 1, 10, 100, 1000] {
      let date = now() - Duration::days(days);
      let w = effective_weight(&inputs(Some(date), 0.01), &cfg, now()).unwrap();
      assert!(w < previous, "weight at {days} days did not decrease");
      previous = w;
    }
  }

  #[test]
  fn hundred_days_at_one_percent_is_one_over_e() {
    let date = now() - Duration::days(100);
    let decay = temporal_decay(Some(date), 0.01, now());
    assert!(approx(decay, (-1.0f64).exp()));
    assert!((decay - 0.368).abs() < 1e-3);
  }

  #[test]
  fn future_relevance_date_counts_as_zero_days() {
    let date = now() + Duration::days(3);
    assert_eq!(temporal_decay(Some(date), 0.2, now()), 1.0);
  }

  #[test]
  fn out_of_range_credibility_is_an_error() {
    let mut i = inputs(None, 0.0);
    i.credibility = 1.01;
    let err = effective_weight(&i, &ScoringConfig::default(), now()).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
  }

  #[test]
  fn discredited_evidence_is_discounted() {
    let cfg = ScoringConfig::default();
    let mut i = inputs(None, 0.0);
    let full = effective_weight(&i, &cfg, now()).unwrap();
    i.review_status = ReviewStatus::Discredited;
    let discounted = effective_weight(&i, &cfg, now()).unwrap();
    assert!(approx(discounted, full * cfg.discredited_weight_factor));
  }

  // ── Consensus and challenges ──────────────────────────────────────────────

  #[test]
  fn no_evidence_is_neutral() {
    assert_eq!(consensus(0.0, 0.0), 0.5);
  }

  #[test]
  fn one_strong_source_outweighs_many_weak_ones() {
    let c = consensus(0.95, 9.0 * 0.01);
    assert!(c > 0.9);
  }

  #[test]
  fn challenge_impact_is_bounded() {
    let cfg = ScoringConfig::default();
    assert_eq!(challenge_impact(0, &cfg), 1.0);
    assert!(approx(challenge_impact(1, &cfg), 0.9));
    assert!(approx(challenge_impact(2, &cfg), 0.81));
    for open in [10, 100, 10_000, u32::MAX] {
      let impact = challenge_impact(open, &cfg);
      assert!((0.1..=1.0).contains(&impact), "impact {impact} for {open}");
    }
    assert_eq!(challenge_impact(u32::MAX, &cfg), cfg.challenge_floor);
  }

  // ── Evaluation ────────────────────────────────────────────────────────────

  #[test]
  fn empty_ledger_scores_neutral() {
    let b = evaluate(&snapshot(target(Tier::Mutable), vec![], 0), &ScoringConfig::default(), now())
      .unwrap();
    assert_eq!(b.consensus, 0.5);
    assert_eq!(b.score, 0.5);
    assert_eq!(b.evidence_count, 0);
    assert!(!b.decaying);
  }

  #[test]
  fn eighty_twenty_split_scores_point_eight() {
    let t = target(Tier::Mutable);
    let ev = vec![
      evidence(t.target, Direction::Supporting, 0.8),
      evidence(t.target, Direction::Refuting, 0.2),
    ];
    let cfg = ScoringConfig::default();

    let b = evaluate(&snapshot(t.clone(), ev.clone(), 0), &cfg, now()).unwrap();
    assert!(approx(b.consensus, 0.8));
    assert_eq!(b.challenge_impact, 1.0);
    assert!(approx(b.score, 0.8));

    let b = evaluate(&snapshot(t, ev, 1), &cfg, now()).unwrap();
    assert!(approx(b.challenge_impact, 0.9));
    assert!(approx(b.score, 0.72));
  }

  #[test]
  fn decayed_evidence_shifts_consensus_by_the_formula() {
    let t = target(Tier::Mutable);
    let mut old = evidence(t.target, Direction::Supporting, 0.8);
    old.relevance_date = Some(now() - Duration::days(100));
    old.decay_rate = Some(0.01);
    let fresh = evidence(t.target, Direction::Refuting, 0.2);

    let cfg = ScoringConfig::default();
    let b = evaluate(&snapshot(t, vec![old, fresh], 0), &cfg, now()).unwrap();

    let support = 0.8 * (-1.0f64).exp();
    assert!(approx(b.support_weight, support));
    assert!(approx(b.consensus, support / (support + 0.2)));
    assert!(approx(b.score, b.consensus));
    assert!(b.decaying);
    assert_eq!(b.expires_at(&cfg, now()), Some(now() + Duration::hours(24)));
  }

  #[test]
  fn removed_evidence_is_ignored() {
    let t = target(Tier::Mutable);
    let mut gone = evidence(t.target, Direction::Refuting, 1.0);
    gone.removed_at = Some(now());
    let kept = evidence(t.target, Direction::Supporting, 0.3);

    let b = evaluate(&snapshot(t, vec![gone, kept], 0), &ScoringConfig::default(), now())
      .unwrap();
    assert_eq!(b.evidence_count, 1);
    assert_eq!(b.score, 1.0);
  }

  #[test]
  fn fixed_targets_are_never_evaluated() {
    let err = evaluate(&snapshot(target(Tier::Fixed), vec![], 0), &ScoringConfig::default(), now())
      .unwrap_err();
    assert!(matches!(err, Error::ImmutableTargetViolation(_)));
  }
}
