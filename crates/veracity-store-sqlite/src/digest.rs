//! Snapshot digests for score history rows.
//!
//! A digest is a SHA-256 hash over the ledger rows a recalculation read:
//! every evidence record (with its revision stamp, review status, removal
//! flag and the credibility of its source) and every open challenge. Rows are
//! sorted by id first, so the digest does not depend on read order.

use sha2::{Digest, Sha256};
use uuid::Uuid;
use veracity_core::{evidence::ReviewStatus, scoring::SnapshotEvidence};

fn review_byte(status: ReviewStatus) -> u8 {
  match status {
    ReviewStatus::Unreviewed => 0,
    ReviewStatus::Verified => 1,
    ReviewStatus::Discredited => 2,
  }
}

/// Digest the evidence and open challenges observed by one recalculation.
pub fn snapshot_digest(evidence: &[SnapshotEvidence], open_challenges: &[Uuid]) -> String {
  let mut rows: Vec<&SnapshotEvidence> = evidence.iter().collect();
  rows.sort_by_key(|item| item.evidence.evidence_id);

  let mut challenges = open_challenges.to_vec();
  challenges.sort();

  let mut hasher = Sha256::new();
  hasher.update(b"evidence");
  for item in rows {
    let e = &item.evidence;
    hasher.update(e.evidence_id.as_bytes());
    hasher.update(e.updated_at.timestamp_micros().to_le_bytes());
    hasher.update([review_byte(e.review_status), u8::from(e.is_removed())]);
    hasher.update(item.source_credibility.to_bits().to_le_bytes());
  }
  hasher.update(b"challenges");
  for id in challenges {
    hasher.update(id.as_bytes());
  }
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use veracity_core::{
    evidence::{Direction, Evidence},
    target::TargetRef,
  };

  use super::*;

  fn item(id: Uuid, secs: i64) -> SnapshotEvidence {
    let ts = Utc.timestamp_opt(secs, 0).unwrap();
    SnapshotEvidence {
      evidence:           Evidence {
        evidence_id:    id,
        target:         TargetRef::Claim(Uuid::nil()),
        source_id:      Uuid::nil(),
        direction:      Direction::Supporting,
        base_weight:    1.0,
        confidence:     1.0,
        content:        String::new(),
        relevance_date: None,
        decay_rate:     None,
        review_status:  ReviewStatus::Unreviewed,
        submitted_at:   ts,
        updated_at:     ts,
        removed_at:     None,
        removal_reason: None,
      },
      source_credibility: 0.5,
    }
  }

  #[test]
  fn read_order_does_not_matter() {
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let (c1, c2) = (Uuid::new_v4(), Uuid::new_v4());
    let one = snapshot_digest(&[item(a, 1), item(b, 2)], &[c1, c2]);
    let two = snapshot_digest(&[item(b, 2), item(a, 1)], &[c2, c1]);
    assert_eq!(one, two);
    assert_eq!(one.len(), 64);
  }

  #[test]
  fn editing_a_record_changes_the_digest() {
    let a = Uuid::new_v4();
    assert_ne!(snapshot_digest(&[item(a, 1)], &[]), snapshot_digest(&[item(a, 2)], &[]));
  }

  #[test]
  fn credibility_and_challenges_are_part_of_the_digest() {
    let a = Uuid::new_v4();
    let base = snapshot_digest(&[item(a, 1)], &[]);

    let mut shifted = item(a, 1);
    shifted.source_credibility = 0.9;
    assert_ne!(base, snapshot_digest(&[shifted], &[]));

    assert_ne!(base, snapshot_digest(&[item(a, 1)], &[Uuid::new_v4()]));
  }
}
