//! Synchronous SQL helpers run on the connection thread.
//!
//! Every function takes a plain `&rusqlite::Connection`, so the same helper
//! works inside or outside a transaction (a `Transaction` derefs to one).

use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;
use veracity_core::{
  challenge::{Challenge, ChallengeStatus},
  evidence::Evidence,
  score::{Page, ScoreHistoryEntry, VeracityScore},
  scoring::SnapshotEvidence,
  source::{Source, SourceCredibility},
  target::{Claim, Relationship, Target, TargetKind, TargetRef},
};

use crate::{
  Error, Result,
  encode::{
    RawChallenge, RawClaim, RawEvidence, RawHistory, RawRelationship, RawScore,
    RawSource, decode_target, decode_uuid, encode_direction, encode_dt,
    encode_id_list, encode_outcome, encode_review_status, encode_source_kind,
    encode_target, encode_tier, encode_trigger, encode_uuid,
  },
};

// ─── Column lists ────────────────────────────────────────────────────────────

const CLAIM_COLUMNS: &str = "claim_id, statement, tier, domain, created_at";

const RELATIONSHIP_COLUMNS: &str =
  "relationship_id, from_claim, to_claim, relation, tier, domain, created_at";

const SOURCE_SELECT: &str = "SELECT s.source_id, s.kind, s.title, s.url, s.description, \
   s.created_at, c.score, c.evidence_count, c.challenged_fraction, \
   c.consensus_alignment, c.overridden_at, c.override_reason, c.updated_at \
   FROM sources s JOIN source_credibility c ON c.source_id = s.source_id";

const EVIDENCE_COLUMNS: &str = "e.evidence_id, e.claim_id, e.relationship_id, e.source_id, \
   e.direction, e.base_weight, e.confidence, e.content, e.relevance_date, \
   e.decay_rate, e.review_status, e.submitted_at, e.updated_at, e.removed_at, \
   e.removal_reason";

const CHALLENGE_COLUMNS: &str = "challenge_id, claim_id, relationship_id, reason, \
   disputed_evidence, status, outcome, resolution_note, resolved_at, opened_at";

const SCORE_COLUMNS: &str = "claim_id, relationship_id, score, evidence_count, consensus, \
   challenge_impact, weighted_evidence, support_weight, refute_weight, \
   open_challenges, calculated_at, expires_at";

const HISTORY_COLUMNS: &str = "history_id, claim_id, relationship_id, old_score, \
   new_score, delta, reason, trigger_kind, trigger_id, snapshot_digest, recorded_at";

/// The column holding a reference of this kind.
pub fn target_column(kind: TargetKind) -> &'static str {
  match kind {
    TargetKind::Claim => "claim_id",
    TargetKind::Relationship => "relationship_id",
  }
}

fn sql_count(n: usize) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

// ─── Entities ────────────────────────────────────────────────────────────────

pub fn insert_claim(conn: &Connection, claim: &Claim) -> Result<()> {
  conn.execute(
    "INSERT INTO claims (claim_id, statement, tier, domain, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    params![
      encode_uuid(claim.claim_id),
      claim.statement,
      encode_tier(claim.tier),
      claim.domain,
      encode_dt(claim.created_at),
    ],
  )?;
  Ok(())
}

pub fn insert_relationship(conn: &Connection, rel: &Relationship) -> Result<()> {
  conn.execute(
    "INSERT INTO relationships
       (relationship_id, from_claim, to_claim, relation, tier, domain, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    params![
      encode_uuid(rel.relationship_id),
      encode_uuid(rel.from_claim),
      encode_uuid(rel.to_claim),
      rel.relation,
      encode_tier(rel.tier),
      rel.domain,
      encode_dt(rel.created_at),
    ],
  )?;
  Ok(())
}

pub fn read_claim(conn: &Connection, id: Uuid) -> Result<Option<Claim>> {
  conn
    .query_row(
      &format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE claim_id = ?1"),
      params![encode_uuid(id)],
      RawClaim::from_row,
    )
    .optional()?
    .map(RawClaim::into_claim)
    .transpose()
}

pub fn read_relationship(conn: &Connection, id: Uuid) -> Result<Option<Relationship>> {
  conn
    .query_row(
      &format!(
        "SELECT {RELATIONSHIP_COLUMNS} FROM relationships WHERE relationship_id = ?1"
      ),
      params![encode_uuid(id)],
      RawRelationship::from_row,
    )
    .optional()?
    .map(RawRelationship::into_relationship)
    .transpose()
}

pub fn read_target(conn: &Connection, target: TargetRef) -> Result<Option<Target>> {
  Ok(match target {
    TargetRef::Claim(id) => read_claim(conn, id)?.map(|c| c.as_target()),
    TargetRef::Relationship(id) => read_relationship(conn, id)?.map(|r| r.as_target()),
  })
}

pub fn require_target(conn: &Connection, target: TargetRef) -> Result<Target> {
  read_target(conn, target)?
    .ok_or(Error::Core(veracity_core::Error::TargetNotFound(target)))
}

// ─── Sources ─────────────────────────────────────────────────────────────────

pub fn insert_source(conn: &Connection, source: &Source) -> Result<()> {
  conn.execute(
    "INSERT INTO sources (source_id, kind, title, url, description, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![
      encode_uuid(source.source_id),
      encode_source_kind(source.kind),
      source.title,
      source.url,
      source.description,
      encode_dt(source.created_at),
    ],
  )?;
  let cred = &source.credibility;
  conn.execute(
    "INSERT INTO source_credibility
       (source_id, score, evidence_count, challenged_fraction, consensus_alignment,
        overridden_at, override_reason, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    params![
      encode_uuid(source.source_id),
      cred.score,
      cred.evidence_count,
      cred.challenged_fraction,
      cred.consensus_alignment,
      cred.overridden_at.map(encode_dt),
      cred.override_reason,
      encode_dt(cred.updated_at),
    ],
  )?;
  Ok(())
}

pub fn read_source(conn: &Connection, id: Uuid) -> Result<Option<Source>> {
  conn
    .query_row(
      &format!("{SOURCE_SELECT} WHERE s.source_id = ?1"),
      params![encode_uuid(id)],
      RawSource::from_row,
    )
    .optional()?
    .map(RawSource::into_source)
    .transpose()
}

pub fn require_source(conn: &Connection, id: Uuid) -> Result<Source> {
  read_source(conn, id)?.ok_or(Error::Core(veracity_core::Error::SourceNotFound(id)))
}

pub fn list_sources(conn: &Connection, page: Page) -> Result<Vec<Source>> {
  let mut stmt = conn.prepare(&format!(
    "{SOURCE_SELECT} ORDER BY s.created_at, s.source_id LIMIT ?1 OFFSET ?2"
  ))?;
  let raws = stmt
    .query_map(
      params![sql_count(page.limit()), sql_count(page.offset())],
      RawSource::from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawSource::into_source).collect()
}

pub fn write_credibility(
  conn: &Connection,
  source_id: Uuid,
  cred: &SourceCredibility,
) -> Result<()> {
  conn.execute(
    "UPDATE source_credibility
     SET score = ?2, evidence_count = ?3, challenged_fraction = ?4,
         consensus_alignment = ?5, overridden_at = ?6, override_reason = ?7,
         updated_at = ?8
     WHERE source_id = ?1",
    params![
      encode_uuid(source_id),
      cred.score,
      cred.evidence_count,
      cred.challenged_fraction,
      cred.consensus_alignment,
      cred.overridden_at.map(encode_dt),
      cred.override_reason,
      encode_dt(cred.updated_at),
    ],
  )?;
  Ok(())
}

/// Distinct targets with live evidence from this source.
pub fn targets_for_source(conn: &Connection, source_id: Uuid) -> Result<Vec<TargetRef>> {
  let mut stmt = conn.prepare(
    "SELECT DISTINCT claim_id, relationship_id FROM evidence
     WHERE source_id = ?1 AND removed_at IS NULL
     ORDER BY claim_id, relationship_id",
  )?;
  let pairs = stmt
    .query_map(params![encode_uuid(source_id)], |row| {
      Ok((row.get::<_, Option<String>>(0)?, row.get::<_, Option<String>>(1)?))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  pairs
    .iter()
    .map(|(c, r)| decode_target(c.as_deref(), r.as_deref()))
    .collect()
}

// ─── Evidence ────────────────────────────────────────────────────────────────

pub fn insert_evidence(conn: &Connection, e: &Evidence) -> Result<()> {
  let (claim_id, relationship_id) = encode_target(e.target);
  conn.execute(
    "INSERT INTO evidence
       (evidence_id, claim_id, relationship_id, source_id, direction, base_weight,
        confidence, content, relevance_date, decay_rate, review_status,
        submitted_at, updated_at, removed_at, removal_reason)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
    params![
      encode_uuid(e.evidence_id),
      claim_id,
      relationship_id,
      encode_uuid(e.source_id),
      encode_direction(e.direction),
      e.base_weight,
      e.confidence,
      e.content,
      e.relevance_date.map(encode_dt),
      e.decay_rate,
      encode_review_status(e.review_status),
      encode_dt(e.submitted_at),
      encode_dt(e.updated_at),
      e.removed_at.map(encode_dt),
      e.removal_reason,
    ],
  )?;
  Ok(())
}

/// Rewrite the mutable columns of an existing record.
pub fn update_evidence(conn: &Connection, e: &Evidence) -> Result<()> {
  conn.execute(
    "UPDATE evidence
     SET base_weight = ?2, confidence = ?3, content = ?4, relevance_date = ?5,
         decay_rate = ?6, review_status = ?7, updated_at = ?8, removed_at = ?9,
         removal_reason = ?10
     WHERE evidence_id = ?1",
    params![
      encode_uuid(e.evidence_id),
      e.base_weight,
      e.confidence,
      e.content,
      e.relevance_date.map(encode_dt),
      e.decay_rate,
      encode_review_status(e.review_status),
      encode_dt(e.updated_at),
      e.removed_at.map(encode_dt),
      e.removal_reason,
    ],
  )?;
  Ok(())
}

pub fn read_evidence(conn: &Connection, id: Uuid) -> Result<Option<Evidence>> {
  conn
    .query_row(
      &format!("SELECT {EVIDENCE_COLUMNS} FROM evidence e WHERE e.evidence_id = ?1"),
      params![encode_uuid(id)],
      RawEvidence::from_row,
    )
    .optional()?
    .map(RawEvidence::into_evidence)
    .transpose()
}

pub fn require_evidence(conn: &Connection, id: Uuid) -> Result<Evidence> {
  read_evidence(conn, id)?.ok_or(Error::Core(veracity_core::Error::EvidenceNotFound(id)))
}

pub fn evidence_for_target(
  conn: &Connection,
  target: TargetRef,
  include_removed: bool,
) -> Result<Vec<Evidence>> {
  let column = target_column(target.kind());
  let removed_filter = if include_removed { "" } else { "AND e.removed_at IS NULL" };
  let mut stmt = conn.prepare(&format!(
    "SELECT {EVIDENCE_COLUMNS} FROM evidence e
     WHERE e.{column} = ?1 {removed_filter}
     ORDER BY e.submitted_at, e.evidence_id"
  ))?;
  let raws = stmt
    .query_map(params![encode_uuid(target.id())], RawEvidence::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawEvidence::into_evidence).collect()
}

/// All of a source's evidence, each paired with its target's cached score.
pub fn evidence_for_source(
  conn: &Connection,
  source_id: Uuid,
) -> Result<Vec<(Evidence, Option<f64>)>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {EVIDENCE_COLUMNS}, v.score FROM evidence e
     LEFT JOIN veracity_scores v
       ON v.claim_id = e.claim_id OR v.relationship_id = e.relationship_id
     WHERE e.source_id = ?1
     ORDER BY e.submitted_at, e.evidence_id"
  ))?;
  let rows = stmt
    .query_map(params![encode_uuid(source_id)], |row| {
      Ok((RawEvidence::from_row(row)?, row.get::<_, Option<f64>>(15)?))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  rows
    .into_iter()
    .map(|(raw, score)| Ok((raw.into_evidence()?, score)))
    .collect()
}

/// Live evidence for a target, each record joined with its source's current
/// credibility.
pub fn snapshot_evidence(
  conn: &Connection,
  target: TargetRef,
) -> Result<Vec<SnapshotEvidence>> {
  let column = target_column(target.kind());
  let mut stmt = conn.prepare(&format!(
    "SELECT {EVIDENCE_COLUMNS}, c.score FROM evidence e
     JOIN source_credibility c ON c.source_id = e.source_id
     WHERE e.{column} = ?1 AND e.removed_at IS NULL
     ORDER BY e.submitted_at, e.evidence_id"
  ))?;
  let rows = stmt
    .query_map(params![encode_uuid(target.id())], |row| {
      Ok((RawEvidence::from_row(row)?, row.get::<_, f64>(15)?))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  rows
    .into_iter()
    .map(|(raw, source_credibility)| {
      Ok(SnapshotEvidence { evidence: raw.into_evidence()?, source_credibility })
    })
    .collect()
}

// ─── Challenges ──────────────────────────────────────────────────────────────

pub fn insert_challenge(conn: &Connection, c: &Challenge) -> Result<()> {
  let (claim_id, relationship_id) = encode_target(c.target);
  conn.execute(
    "INSERT INTO challenges
       (challenge_id, claim_id, relationship_id, reason, disputed_evidence, opened_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![
      encode_uuid(c.challenge_id),
      claim_id,
      relationship_id,
      c.reason,
      encode_id_list(&c.disputed_evidence)?,
      encode_dt(c.opened_at),
    ],
  )?;
  Ok(())
}

pub fn write_resolution(conn: &Connection, c: &Challenge) -> Result<()> {
  let ChallengeStatus::Resolved { outcome, note, at } = &c.status else {
    return Err(Error::Decode(format!("challenge {} is not resolved", c.challenge_id)));
  };
  conn.execute(
    "UPDATE challenges
     SET status = 'resolved', outcome = ?2, resolution_note = ?3, resolved_at = ?4
     WHERE challenge_id = ?1 AND status = 'open'",
    params![encode_uuid(c.challenge_id), encode_outcome(*outcome), note, encode_dt(*at)],
  )?;
  Ok(())
}

pub fn read_challenge(conn: &Connection, id: Uuid) -> Result<Option<Challenge>> {
  conn
    .query_row(
      &format!("SELECT {CHALLENGE_COLUMNS} FROM challenges WHERE challenge_id = ?1"),
      params![encode_uuid(id)],
      RawChallenge::from_row,
    )
    .optional()?
    .map(RawChallenge::into_challenge)
    .transpose()
}

pub fn challenges_for_target(conn: &Connection, target: TargetRef) -> Result<Vec<Challenge>> {
  let column = target_column(target.kind());
  let mut stmt = conn.prepare(&format!(
    "SELECT {CHALLENGE_COLUMNS} FROM challenges
     WHERE {column} = ?1 ORDER BY opened_at, challenge_id"
  ))?;
  let raws = stmt
    .query_map(params![encode_uuid(target.id())], RawChallenge::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawChallenge::into_challenge).collect()
}

pub fn open_challenge_ids(conn: &Connection, target: TargetRef) -> Result<Vec<Uuid>> {
  let column = target_column(target.kind());
  let mut stmt = conn.prepare(&format!(
    "SELECT challenge_id FROM challenges WHERE {column} = ?1 AND status = 'open'"
  ))?;
  let ids = stmt
    .query_map(params![encode_uuid(target.id())], |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  ids.iter().map(|s| decode_uuid(s)).collect()
}

// ─── Scores ──────────────────────────────────────────────────────────────────

pub fn read_score(conn: &Connection, target: TargetRef) -> Result<Option<VeracityScore>> {
  let column = target_column(target.kind());
  conn
    .query_row(
      &format!("SELECT {SCORE_COLUMNS} FROM veracity_scores WHERE {column} = ?1"),
      params![encode_uuid(target.id())],
      RawScore::from_row,
    )
    .optional()?
    .map(RawScore::into_score)
    .transpose()
}

/// Replace the single current score row of a target.
pub fn write_score(conn: &Connection, score: &VeracityScore, frozen: bool) -> Result<()> {
  let column = target_column(score.target.kind());
  let id = encode_uuid(score.target.id());
  let calculated_at = encode_dt(score.calculated_at);
  let expires_at = score.expires_at.map(encode_dt);

  let updated = conn.execute(
    &format!(
      "UPDATE veracity_scores
       SET frozen = ?2, score = ?3, evidence_count = ?4, consensus = ?5,
           challenge_impact = ?6, weighted_evidence = ?7, support_weight = ?8,
           refute_weight = ?9, open_challenges = ?10, calculated_at = ?11,
           expires_at = ?12
       WHERE {column} = ?1"
    ),
    params![
      id,
      frozen,
      score.score,
      score.evidence_count,
      score.consensus,
      score.challenge_impact,
      score.weighted_evidence,
      score.support_weight,
      score.refute_weight,
      score.open_challenges,
      calculated_at,
      expires_at,
    ],
  )?;
  if updated > 0 {
    return Ok(());
  }

  conn.execute(
    &format!(
      "INSERT INTO veracity_scores
         ({column}, frozen, score, evidence_count, consensus, challenge_impact,
          weighted_evidence, support_weight, refute_weight, open_challenges,
          calculated_at, expires_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
    ),
    params![
      id,
      frozen,
      score.score,
      score.evidence_count,
      score.consensus,
      score.challenge_impact,
      score.weighted_evidence,
      score.support_weight,
      score.refute_weight,
      score.open_challenges,
      calculated_at,
      expires_at,
    ],
  )?;
  Ok(())
}

pub fn disputed_scores(
  conn: &Connection,
  threshold: f64,
  page: Page,
) -> Result<Vec<VeracityScore>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {SCORE_COLUMNS} FROM veracity_scores
     WHERE frozen = 0 AND score < ?1
     ORDER BY score, calculated_at, claim_id, relationship_id
     LIMIT ?2 OFFSET ?3"
  ))?;
  let raws = stmt
    .query_map(
      params![threshold, sql_count(page.limit()), sql_count(page.offset())],
      RawScore::from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawScore::into_score).collect()
}

pub fn expired_targets(conn: &Connection, now: &str) -> Result<Vec<TargetRef>> {
  let mut stmt = conn.prepare(
    "SELECT claim_id, relationship_id FROM veracity_scores
     WHERE frozen = 0 AND expires_at IS NOT NULL AND expires_at <= ?1
     ORDER BY expires_at",
  )?;
  let pairs = stmt
    .query_map(params![now], |row| {
      Ok((row.get::<_, Option<String>>(0)?, row.get::<_, Option<String>>(1)?))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  pairs
    .iter()
    .map(|(c, r)| decode_target(c.as_deref(), r.as_deref()))
    .collect()
}

// ─── History ─────────────────────────────────────────────────────────────────

pub fn insert_history(conn: &Connection, entry: &ScoreHistoryEntry) -> Result<()> {
  let (claim_id, relationship_id) = encode_target(entry.target);
  let (trigger_kind, trigger_id) = encode_trigger(entry.trigger);
  conn.execute(
    "INSERT INTO score_history
       (history_id, claim_id, relationship_id, old_score, new_score, delta,
        reason, trigger_kind, trigger_id, snapshot_digest, recorded_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    params![
      encode_uuid(entry.history_id),
      claim_id,
      relationship_id,
      entry.old_score,
      entry.new_score,
      entry.delta,
      entry.reason,
      trigger_kind,
      trigger_id,
      entry.snapshot_digest,
      encode_dt(entry.recorded_at),
    ],
  )?;
  Ok(())
}

/// History rows for a target, newest first.
pub fn history_for_target(
  conn: &Connection,
  target: TargetRef,
  page: Page,
) -> Result<Vec<ScoreHistoryEntry>> {
  let column = target_column(target.kind());
  let mut stmt = conn.prepare(&format!(
    "SELECT {HISTORY_COLUMNS} FROM score_history
     WHERE {column} = ?1 ORDER BY seq DESC LIMIT ?2 OFFSET ?3"
  ))?;
  let raws = stmt
    .query_map(
      params![
        encode_uuid(target.id()),
        sql_count(page.limit()),
        sql_count(page.offset())
      ],
      RawHistory::from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawHistory::into_entry).collect()
}
