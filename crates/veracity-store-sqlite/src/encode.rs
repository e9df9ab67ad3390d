//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so that lexical order in SQL matches chronological order. UUIDs are
//! stored as hyphenated lowercase strings. Lists of ids are compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use uuid::Uuid;
use veracity_core::{
  challenge::{Challenge, ChallengeOutcome, ChallengeStatus},
  evidence::{Direction, Evidence, ReviewStatus},
  score::{ScoreHistoryEntry, Trigger, VeracityScore},
  source::{Source, SourceCredibility, SourceKind},
  target::{Claim, Relationship, TargetRef, Tier},
};

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("bad timestamp {s:?}: {e}")))
}

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Targets ──────────────────────────────────────────────────────────────────

pub fn decode_target(
  claim_id: Option<&str>,
  relationship_id: Option<&str>,
) -> Result<TargetRef> {
  TargetRef::from_parts(decode_opt_uuid(claim_id)?, decode_opt_uuid(relationship_id)?)
    .map_err(|e| Error::Decode(e.to_string()))
}

/// The `(claim_id, relationship_id)` column values for a target.
pub fn encode_target(target: TargetRef) -> (Option<String>, Option<String>) {
  let (claim, relationship) = target.into_parts();
  (claim.map(encode_uuid), relationship.map(encode_uuid))
}

pub fn encode_tier(tier: Tier) -> i64 { i64::from(tier.level()) }

pub fn decode_tier(level: i64) -> Result<Tier> {
  u8::try_from(level)
    .ok()
    .and_then(|l| Tier::from_level(l).ok())
    .ok_or_else(|| Error::Decode(format!("unknown tier: {level}")))
}

// ─── Enums ────────────────────────────────────────────────────────────────────

pub fn encode_source_kind(k: SourceKind) -> &'static str {
  match k {
    SourceKind::Document => "document",
    SourceKind::Testimony => "testimony",
    SourceKind::Interview => "interview",
    SourceKind::Dataset => "dataset",
    SourceKind::Publication => "publication",
    SourceKind::Website => "website",
    SourceKind::Other => "other",
  }
}

pub fn decode_source_kind(s: &str) -> Result<SourceKind> {
  match s {
    "document" => Ok(SourceKind::Document),
    "testimony" => Ok(SourceKind::Testimony),
    "interview" => Ok(SourceKind::Interview),
    "dataset" => Ok(SourceKind::Dataset),
    "publication" => Ok(SourceKind::Publication),
    "website" => Ok(SourceKind::Website),
    "other" => Ok(SourceKind::Other),
    other => Err(Error::Decode(format!("unknown source kind: {other:?}"))),
  }
}

pub fn encode_direction(d: Direction) -> &'static str {
  match d {
    Direction::Supporting => "supporting",
    Direction::Refuting => "refuting",
  }
}

pub fn decode_direction(s: &str) -> Result<Direction> {
  match s {
    "supporting" => Ok(Direction::Supporting),
    "refuting" => Ok(Direction::Refuting),
    other => Err(Error::Decode(format!("unknown direction: {other:?}"))),
  }
}

pub fn encode_review_status(r: ReviewStatus) -> &'static str {
  match r {
    ReviewStatus::Unreviewed => "unreviewed",
    ReviewStatus::Verified => "verified",
    ReviewStatus::Discredited => "discredited",
  }
}

pub fn decode_review_status(s: &str) -> Result<ReviewStatus> {
  match s {
    "unreviewed" => Ok(ReviewStatus::Unreviewed),
    "verified" => Ok(ReviewStatus::Verified),
    "discredited" => Ok(ReviewStatus::Discredited),
    other => Err(Error::Decode(format!("unknown review status: {other:?}"))),
  }
}

pub fn encode_outcome(o: ChallengeOutcome) -> &'static str {
  match o {
    ChallengeOutcome::Upheld => "upheld",
    ChallengeOutcome::Rejected => "rejected",
  }
}

pub fn decode_outcome(s: &str) -> Result<ChallengeOutcome> {
  match s {
    "upheld" => Ok(ChallengeOutcome::Upheld),
    "rejected" => Ok(ChallengeOutcome::Rejected),
    other => Err(Error::Decode(format!("unknown challenge outcome: {other:?}"))),
  }
}

/// Split a trigger into its `(trigger_kind, trigger_id)` columns.
pub fn encode_trigger(t: Trigger) -> (&'static str, Option<String>) {
  match t {
    Trigger::Created => ("created", None),
    Trigger::Evidence(id) => ("evidence", Some(encode_uuid(id))),
    Trigger::Challenge(id) => ("challenge", Some(encode_uuid(id))),
    Trigger::SourceCredibility(id) => ("source_credibility", Some(encode_uuid(id))),
    Trigger::Manual => ("manual", None),
    Trigger::DecayRefresh => ("decay_refresh", None),
  }
}

pub fn decode_trigger(kind: &str, id: Option<&str>) -> Result<Trigger> {
  let id = || {
    id.map(decode_uuid)
      .transpose()?
      .ok_or_else(|| Error::Decode(format!("trigger {kind:?} is missing its id")))
  };
  match kind {
    "created" => Ok(Trigger::Created),
    "evidence" => Ok(Trigger::Evidence(id()?)),
    "challenge" => Ok(Trigger::Challenge(id()?)),
    "source_credibility" => Ok(Trigger::SourceCredibility(id()?)),
    "manual" => Ok(Trigger::Manual),
    "decay_refresh" => Ok(Trigger::DecayRefresh),
    other => Err(Error::Decode(format!("unknown trigger kind: {other:?}"))),
  }
}

// ─── Id lists ────────────────────────────────────────────────────────────────

pub fn encode_id_list(ids: &[Uuid]) -> Result<String> {
  Ok(serde_json::to_string(ids)?)
}

pub fn decode_id_list(s: &str) -> Result<Vec<Uuid>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────
//
// Each `Raw*` struct is filled straight from a row in the column order of the
// matching `*_COLUMNS` constant in `queries.rs`.

pub struct RawClaim {
  pub claim_id:   String,
  pub statement:  String,
  pub tier:       i64,
  pub domain:     Option<String>,
  pub created_at: String,
}

impl RawClaim {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      claim_id:   row.get(0)?,
      statement:  row.get(1)?,
      tier:       row.get(2)?,
      domain:     row.get(3)?,
      created_at: row.get(4)?,
    })
  }

  pub fn into_claim(self) -> Result<Claim> {
    Ok(Claim {
      claim_id:   decode_uuid(&self.claim_id)?,
      statement:  self.statement,
      tier:       decode_tier(self.tier)?,
      domain:     self.domain,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawRelationship {
  pub relationship_id: String,
  pub from_claim:      String,
  pub to_claim:        String,
  pub relation:        String,
  pub tier:            i64,
  pub domain:          Option<String>,
  pub created_at:      String,
}

impl RawRelationship {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      relationship_id: row.get(0)?,
      from_claim:      row.get(1)?,
      to_claim:        row.get(2)?,
      relation:        row.get(3)?,
      tier:            row.get(4)?,
      domain:          row.get(5)?,
      created_at:      row.get(6)?,
    })
  }

  pub fn into_relationship(self) -> Result<Relationship> {
    Ok(Relationship {
      relationship_id: decode_uuid(&self.relationship_id)?,
      from_claim:      decode_uuid(&self.from_claim)?,
      to_claim:        decode_uuid(&self.to_claim)?,
      relation:        self.relation,
      tier:            decode_tier(self.tier)?,
      domain:          self.domain,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// A `sources` row joined with its `source_credibility` row.
pub struct RawSource {
  pub source_id:           String,
  pub kind:                String,
  pub title:               String,
  pub url:                 Option<String>,
  pub description:         Option<String>,
  pub created_at:          String,
  pub score:               f64,
  pub evidence_count:      i64,
  pub challenged_fraction: f64,
  pub consensus_alignment: f64,
  pub overridden_at:       Option<String>,
  pub override_reason:     Option<String>,
  pub updated_at:          String,
}

impl RawSource {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      source_id:           row.get(0)?,
      kind:                row.get(1)?,
      title:               row.get(2)?,
      url:                 row.get(3)?,
      description:         row.get(4)?,
      created_at:          row.get(5)?,
      score:               row.get(6)?,
      evidence_count:      row.get(7)?,
      challenged_fraction: row.get(8)?,
      consensus_alignment: row.get(9)?,
      overridden_at:       row.get(10)?,
      override_reason:     row.get(11)?,
      updated_at:          row.get(12)?,
    })
  }

  pub fn into_source(self) -> Result<Source> {
    Ok(Source {
      source_id:   decode_uuid(&self.source_id)?,
      kind:        decode_source_kind(&self.kind)?,
      title:       self.title,
      url:         self.url,
      description: self.description,
      created_at:  decode_dt(&self.created_at)?,
      credibility: SourceCredibility {
        score:               self.score,
        evidence_count:      u32::try_from(self.evidence_count)
          .map_err(|e| Error::Decode(e.to_string()))?,
        challenged_fraction: self.challenged_fraction,
        consensus_alignment: self.consensus_alignment,
        overridden_at:       decode_opt_dt(self.overridden_at.as_deref())?,
        override_reason:     self.override_reason,
        updated_at:          decode_dt(&self.updated_at)?,
      },
    })
  }
}

pub struct RawEvidence {
  pub evidence_id:     String,
  pub claim_id:        Option<String>,
  pub relationship_id: Option<String>,
  pub source_id:       String,
  pub direction:       String,
  pub base_weight:     f64,
  pub confidence:      f64,
  pub content:         String,
  pub relevance_date:  Option<String>,
  pub decay_rate:      Option<f64>,
  pub review_status:   String,
  pub submitted_at:    String,
  pub updated_at:      String,
  pub removed_at:      Option<String>,
  pub removal_reason:  Option<String>,
}

impl RawEvidence {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      evidence_id:     row.get(0)?,
      claim_id:        row.get(1)?,
      relationship_id: row.get(2)?,
      source_id:       row.get(3)?,
      direction:       row.get(4)?,
      base_weight:     row.get(5)?,
      confidence:      row.get(6)?,
      content:         row.get(7)?,
      relevance_date:  row.get(8)?,
      decay_rate:      row.get(9)?,
      review_status:   row.get(10)?,
      submitted_at:    row.get(11)?,
      updated_at:      row.get(12)?,
      removed_at:      row.get(13)?,
      removal_reason:  row.get(14)?,
    })
  }

  pub fn into_evidence(self) -> Result<Evidence> {
    Ok(Evidence {
      evidence_id:    decode_uuid(&self.evidence_id)?,
      target:         decode_target(
        self.claim_id.as_deref(),
        self.relationship_id.as_deref(),
      )?,
      source_id:      decode_uuid(&self.source_id)?,
      direction:      decode_direction(&self.direction)?,
      base_weight:    self.base_weight,
      confidence:     self.confidence,
      content:        self.content,
      relevance_date: decode_opt_dt(self.relevance_date.as_deref())?,
      decay_rate:     self.decay_rate,
      review_status:  decode_review_status(&self.review_status)?,
      submitted_at:   decode_dt(&self.submitted_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
      removed_at:     decode_opt_dt(self.removed_at.as_deref())?,
      removal_reason: self.removal_reason,
    })
  }
}

pub struct RawChallenge {
  pub challenge_id:      String,
  pub claim_id:          Option<String>,
  pub relationship_id:   Option<String>,
  pub reason:            String,
  pub disputed_evidence: String,
  pub status:            String,
  pub outcome:           Option<String>,
  pub resolution_note:   Option<String>,
  pub resolved_at:       Option<String>,
  pub opened_at:         String,
}

impl RawChallenge {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      challenge_id:      row.get(0)?,
      claim_id:          row.get(1)?,
      relationship_id:   row.get(2)?,
      reason:            row.get(3)?,
      disputed_evidence: row.get(4)?,
      status:            row.get(5)?,
      outcome:           row.get(6)?,
      resolution_note:   row.get(7)?,
      resolved_at:       row.get(8)?,
      opened_at:         row.get(9)?,
    })
  }

  pub fn into_challenge(self) -> Result<Challenge> {
    let status = match (self.status.as_str(), self.outcome, self.resolved_at) {
      ("open", None, _) => ChallengeStatus::Open,
      ("resolved", Some(outcome), Some(at)) => ChallengeStatus::Resolved {
        outcome: decode_outcome(&outcome)?,
        note:    self.resolution_note,
        at:      decode_dt(&at)?,
      },
      (status, ..) => {
        return Err(Error::Decode(format!("inconsistent challenge status: {status:?}")));
      }
    };

    Ok(Challenge {
      challenge_id: decode_uuid(&self.challenge_id)?,
      target: decode_target(self.claim_id.as_deref(), self.relationship_id.as_deref())?,
      reason: self.reason,
      disputed_evidence: decode_id_list(&self.disputed_evidence)?,
      status,
      opened_at: decode_dt(&self.opened_at)?,
    })
  }
}

pub struct RawScore {
  pub claim_id:          Option<String>,
  pub relationship_id:   Option<String>,
  pub score:             f64,
  pub evidence_count:    i64,
  pub consensus:         f64,
  pub challenge_impact:  f64,
  pub weighted_evidence: f64,
  pub support_weight:    f64,
  pub refute_weight:     f64,
  pub open_challenges:   i64,
  pub calculated_at:     String,
  pub expires_at:        Option<String>,
}

impl RawScore {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      claim_id:          row.get(0)?,
      relationship_id:   row.get(1)?,
      score:             row.get(2)?,
      evidence_count:    row.get(3)?,
      consensus:         row.get(4)?,
      challenge_impact:  row.get(5)?,
      weighted_evidence: row.get(6)?,
      support_weight:    row.get(7)?,
      refute_weight:     row.get(8)?,
      open_challenges:   row.get(9)?,
      calculated_at:     row.get(10)?,
      expires_at:        row.get(11)?,
    })
  }

  pub fn into_score(self) -> Result<VeracityScore> {
    let count = |v: i64| u32::try_from(v).map_err(|e| Error::Decode(e.to_string()));
    Ok(VeracityScore {
      target:            decode_target(
        self.claim_id.as_deref(),
        self.relationship_id.as_deref(),
      )?,
      score:             self.score,
      evidence_count:    count(self.evidence_count)?,
      consensus:         self.consensus,
      challenge_impact:  self.challenge_impact,
      weighted_evidence: self.weighted_evidence,
      support_weight:    self.support_weight,
      refute_weight:     self.refute_weight,
      open_challenges:   count(self.open_challenges)?,
      calculated_at:     decode_dt(&self.calculated_at)?,
      expires_at:        decode_opt_dt(self.expires_at.as_deref())?,
    })
  }
}

pub struct RawHistory {
  pub history_id:      String,
  pub claim_id:        Option<String>,
  pub relationship_id: Option<String>,
  pub old_score:       Option<f64>,
  pub new_score:       f64,
  pub delta:           f64,
  pub reason:          String,
  pub trigger_kind:    String,
  pub trigger_id:      Option<String>,
  pub snapshot_digest: String,
  pub recorded_at:     String,
}

impl RawHistory {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      history_id:      row.get(0)?,
      claim_id:        row.get(1)?,
      relationship_id: row.get(2)?,
      old_score:       row.get(3)?,
      new_score:       row.get(4)?,
      delta:           row.get(5)?,
      reason:          row.get(6)?,
      trigger_kind:    row.get(7)?,
      trigger_id:      row.get(8)?,
      snapshot_digest: row.get(9)?,
      recorded_at:     row.get(10)?,
    })
  }

  pub fn into_entry(self) -> Result<ScoreHistoryEntry> {
    Ok(ScoreHistoryEntry {
      history_id:      decode_uuid(&self.history_id)?,
      target:          decode_target(
        self.claim_id.as_deref(),
        self.relationship_id.as_deref(),
      )?,
      old_score:       self.old_score,
      new_score:       self.new_score,
      delta:           self.delta,
      reason:          self.reason,
      trigger:         decode_trigger(&self.trigger_kind, self.trigger_id.as_deref())?,
      snapshot_digest: self.snapshot_digest,
      recorded_at:     decode_dt(&self.recorded_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_sort_lexically() {
    let a = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let b = a + chrono::Duration::microseconds(1500);
    let c = a + chrono::Duration::seconds(10);
    assert!(encode_dt(a) < encode_dt(b));
    assert!(encode_dt(b) < encode_dt(c));
    assert_eq!(decode_dt(&encode_dt(b)).unwrap(), b);
  }

  #[test]
  fn trigger_columns_roundtrip() {
    let id = Uuid::new_v4();
    for t in [
      Trigger::Created,
      Trigger::Evidence(id),
      Trigger::Challenge(id),
      Trigger::SourceCredibility(id),
      Trigger::Manual,
      Trigger::DecayRefresh,
    ] {
      let (kind, tid) = encode_trigger(t);
      assert_eq!(decode_trigger(kind, tid.as_deref()).unwrap(), t);
    }
  }

  #[test]
  fn trigger_without_required_id_is_rejected() {
    assert!(decode_trigger("evidence", None).is_err());
  }
}
