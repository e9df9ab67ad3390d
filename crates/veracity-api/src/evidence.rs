//! Handlers for `/evidence` endpoints.
//!
//! Every write returns as soon as the ledger commits. The target's score is
//! recomputed in the background; poll its `/score` for `status: "clean"`.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `POST`  | `/evidence` | Body: [`SubmitEvidenceBody`]; returns 201 |
//! | `GET`   | `/evidence/{id}` | Includes removed records |
//! | `PATCH` | `/evidence/{id}` | Body: [`EvidenceEdit`] |
//! | `POST`  | `/evidence/{id}/remove` | Body: `{"reason":"..."}` (optional) |
//! | `POST`  | `/evidence/{id}/review` | Body: `{"status":"verified"}` |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use veracity_core::{
  evidence::{Direction, Evidence, EvidenceEdit, NewEvidence, ReviewStatus},
  store::VeracityStore,
  target::TargetRef,
};
use veracity_dispatch::VeracityService;

use crate::error::ApiError;

// ─── Submit ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /evidence`. Exactly one of `claim_id` and
/// `relationship_id` must be set.
#[derive(Debug, Deserialize)]
pub struct SubmitEvidenceBody {
  pub claim_id:        Option<Uuid>,
  pub relationship_id: Option<Uuid>,
  pub source_id:       Uuid,
  pub direction:       Direction,
  /// Defaults to `1.0`.
  pub base_weight:     Option<f64>,
  /// Defaults to `1.0`.
  pub confidence:      Option<f64>,
  #[serde(default)]
  pub content:         String,
  pub relevance_date:  Option<DateTime<Utc>>,
  pub decay_rate:      Option<f64>,
}

impl TryFrom<SubmitEvidenceBody> for NewEvidence {
  type Error = veracity_core::Error;

  fn try_from(b: SubmitEvidenceBody) -> Result<Self, Self::Error> {
    let target = TargetRef::from_parts(b.claim_id, b.relationship_id)?;
    Ok(NewEvidence {
      target,
      source_id: b.source_id,
      direction: b.direction,
      base_weight: b.base_weight.unwrap_or(1.0),
      confidence: b.confidence.unwrap_or(1.0),
      content: b.content,
      relevance_date: b.relevance_date,
      decay_rate: b.decay_rate,
    })
  }
}

/// `POST /evidence`: returns 201 + the stored [`Evidence`].
pub async fn submit<S>(
  State(service): State<VeracityService<S>>,
  Json(body): Json<SubmitEvidenceBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: VeracityStore + 'static,
{
  let evidence = service.submit_evidence(NewEvidence::try_from(body)?).await?;
  Ok((StatusCode::CREATED, Json(evidence)))
}

// ─── Get / edit ───────────────────────────────────────────────────────────────

/// `GET /evidence/{id}`
pub async fn get_one<S>(
  State(service): State<VeracityService<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Evidence>, ApiError>
where
  S: VeracityStore + 'static,
{
  Ok(Json(service.get_evidence(id).await?))
}

/// `PATCH /evidence/{id}`: omitted fields are left unchanged.
pub async fn edit<S>(
  State(service): State<VeracityService<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<EvidenceEdit>,
) -> Result<Json<Evidence>, ApiError>
where
  S: VeracityStore + 'static,
{
  Ok(Json(service.edit_evidence(id, body).await?))
}

// ─── Remove ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RemoveBody {
  pub reason: Option<String>,
}

/// `POST /evidence/{id}/remove`: soft removal; the record stays readable.
pub async fn remove<S>(
  State(service): State<VeracityService<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<RemoveBody>,
) -> Result<Json<Evidence>, ApiError>
where
  S: VeracityStore + 'static,
{
  Ok(Json(service.remove_evidence(id, body.reason).await?))
}

// ─── Review ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
  pub status: ReviewStatus,
}

/// `POST /evidence/{id}/review`
pub async fn review<S>(
  State(service): State<VeracityService<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ReviewBody>,
) -> Result<Json<Evidence>, ApiError>
where
  S: VeracityStore + 'static,
{
  Ok(Json(service.set_review_status(id, body.status).await?))
}
