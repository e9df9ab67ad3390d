//! SQL schema for the veracity SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.
//!
//! Every table that points at a scored target carries a nullable `claim_id`
//! and a nullable `relationship_id`, with a CHECK that exactly one is set.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- ── Entity store ─────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS claims (
    claim_id    TEXT PRIMARY KEY,
    statement   TEXT NOT NULL,
    tier        INTEGER NOT NULL CHECK (tier IN (0, 1)),  -- 0 = fixed truth
    domain      TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS relationships (
    relationship_id TEXT PRIMARY KEY,
    from_claim      TEXT NOT NULL REFERENCES claims(claim_id),
    to_claim        TEXT NOT NULL REFERENCES claims(claim_id),
    relation        TEXT NOT NULL,
    tier            INTEGER NOT NULL CHECK (tier IN (0, 1)),
    domain          TEXT,
    created_at      TEXT NOT NULL,
    CHECK (from_claim != to_claim)
);

-- ── Source registry ──────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS sources (
    source_id   TEXT PRIMARY KEY,
    kind        TEXT NOT NULL,
    title       TEXT NOT NULL,
    url         TEXT,
    description TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS source_credibility (
    source_id           TEXT PRIMARY KEY REFERENCES sources(source_id),
    score               REAL NOT NULL CHECK (score BETWEEN 0.0 AND 1.0),
    evidence_count      INTEGER NOT NULL DEFAULT 0,
    challenged_fraction REAL NOT NULL DEFAULT 0.0,
    consensus_alignment REAL NOT NULL DEFAULT 0.5,
    overridden_at       TEXT,
    override_reason     TEXT,
    updated_at          TEXT NOT NULL
);

-- ── Evidence ledger ──────────────────────────────────────────────────────────

-- Rows are never deleted; soft removal stamps removed_at.
CREATE TABLE IF NOT EXISTS evidence (
    evidence_id     TEXT PRIMARY KEY,
    claim_id        TEXT REFERENCES claims(claim_id),
    relationship_id TEXT REFERENCES relationships(relationship_id),
    source_id       TEXT NOT NULL REFERENCES sources(source_id),
    direction       TEXT NOT NULL CHECK (direction IN ('supporting', 'refuting')),
    base_weight     REAL NOT NULL CHECK (base_weight BETWEEN 0.0 AND 1.0),
    confidence      REAL NOT NULL CHECK (confidence BETWEEN 0.0 AND 1.0),
    content         TEXT NOT NULL,
    relevance_date  TEXT,
    decay_rate      REAL CHECK (decay_rate IS NULL OR decay_rate >= 0.0),
    review_status   TEXT NOT NULL DEFAULT 'unreviewed',
    submitted_at    TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    removed_at      TEXT,
    removal_reason  TEXT,
    CHECK ((claim_id IS NULL) != (relationship_id IS NULL))
);

CREATE TRIGGER IF NOT EXISTS evidence_rejects_fixed_targets
BEFORE INSERT ON evidence
WHEN (NEW.claim_id IS NOT NULL
      AND (SELECT tier FROM claims WHERE claim_id = NEW.claim_id) = 0)
  OR (NEW.relationship_id IS NOT NULL
      AND (SELECT tier FROM relationships
           WHERE relationship_id = NEW.relationship_id) = 0)
BEGIN
    SELECT RAISE(ABORT, 'evidence cannot target a tier-0 entity');
END;

-- ── Challenge ledger ─────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS challenges (
    challenge_id      TEXT PRIMARY KEY,
    claim_id          TEXT REFERENCES claims(claim_id),
    relationship_id   TEXT REFERENCES relationships(relationship_id),
    reason            TEXT NOT NULL,
    disputed_evidence TEXT NOT NULL DEFAULT '[]',  -- JSON array of evidence ids
    status            TEXT NOT NULL DEFAULT 'open' CHECK (status IN ('open', 'resolved')),
    outcome           TEXT CHECK (outcome IS NULL OR outcome IN ('upheld', 'rejected')),
    resolution_note   TEXT,
    resolved_at       TEXT,
    opened_at         TEXT NOT NULL,
    CHECK ((claim_id IS NULL) != (relationship_id IS NULL)),
    CHECK ((status = 'open') = (outcome IS NULL))
);

CREATE TRIGGER IF NOT EXISTS challenges_reject_fixed_targets
BEFORE INSERT ON challenges
WHEN (NEW.claim_id IS NOT NULL
      AND (SELECT tier FROM claims WHERE claim_id = NEW.claim_id) = 0)
  OR (NEW.relationship_id IS NOT NULL
      AND (SELECT tier FROM relationships
           WHERE relationship_id = NEW.relationship_id) = 0)
BEGIN
    SELECT RAISE(ABORT, 'challenges cannot target a tier-0 entity');
END;

-- ── Scores ───────────────────────────────────────────────────────────────────

-- One current row per target. `frozen` mirrors tier 0.
CREATE TABLE IF NOT EXISTS veracity_scores (
    claim_id          TEXT UNIQUE REFERENCES claims(claim_id),
    relationship_id   TEXT UNIQUE REFERENCES relationships(relationship_id),
    frozen            INTEGER NOT NULL CHECK (frozen IN (0, 1)),
    score             REAL NOT NULL CHECK (score BETWEEN 0.0 AND 1.0),
    evidence_count    INTEGER NOT NULL,
    consensus         REAL NOT NULL,
    challenge_impact  REAL NOT NULL,
    weighted_evidence REAL NOT NULL,
    support_weight    REAL NOT NULL,
    refute_weight     REAL NOT NULL,
    open_challenges   INTEGER NOT NULL,
    calculated_at     TEXT NOT NULL,
    expires_at        TEXT,
    CHECK ((claim_id IS NULL) != (relationship_id IS NULL)),
    CHECK (frozen = 0 OR score = 1.0)
);

-- Strictly append-only; `seq` gives a total order per target.
CREATE TABLE IF NOT EXISTS score_history (
    seq             INTEGER PRIMARY KEY AUTOINCREMENT,
    history_id      TEXT NOT NULL UNIQUE,
    claim_id        TEXT REFERENCES claims(claim_id),
    relationship_id TEXT REFERENCES relationships(relationship_id),
    old_score       REAL,
    new_score       REAL NOT NULL,
    delta           REAL NOT NULL,
    reason          TEXT NOT NULL,
    trigger_kind    TEXT NOT NULL,
    trigger_id      TEXT,
    snapshot_digest TEXT NOT NULL,
    recorded_at     TEXT NOT NULL,
    CHECK ((claim_id IS NULL) != (relationship_id IS NULL))
);

CREATE TRIGGER IF NOT EXISTS score_history_no_update
BEFORE UPDATE ON score_history
BEGIN
    SELECT RAISE(ABORT, 'score_history is append-only');
END;

CREATE TRIGGER IF NOT EXISTS score_history_no_delete
BEFORE DELETE ON score_history
BEGIN
    SELECT RAISE(ABORT, 'score_history is append-only');
END;

CREATE INDEX IF NOT EXISTS evidence_claim_idx        ON evidence(claim_id);
CREATE INDEX IF NOT EXISTS evidence_relationship_idx ON evidence(relationship_id);
CREATE INDEX IF NOT EXISTS evidence_source_idx       ON evidence(source_id);
CREATE INDEX IF NOT EXISTS challenges_claim_idx      ON challenges(claim_id);
CREATE INDEX IF NOT EXISTS challenges_rel_idx        ON challenges(relationship_id);
CREATE INDEX IF NOT EXISTS scores_score_idx          ON veracity_scores(score);
CREATE INDEX IF NOT EXISTS scores_expiry_idx         ON veracity_scores(expires_at);
CREATE INDEX IF NOT EXISTS history_claim_idx         ON score_history(claim_id, seq);
CREATE INDEX IF NOT EXISTS history_rel_idx           ON score_history(relationship_id, seq);

PRAGMA user_version = 1;
";
