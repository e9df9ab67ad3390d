//! Handlers for `/challenges` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/challenges` | Body: [`OpenChallengeBody`]; returns 201 |
//! | `GET`  | `/challenges/{id}` | 404 if not found |
//! | `POST` | `/challenges/{id}/resolve` | Body: `{"outcome":"upheld","note":"..."}` |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;
use veracity_core::{
  challenge::{Challenge, NewChallenge, Resolution},
  store::VeracityStore,
  target::TargetRef,
};
use veracity_dispatch::VeracityService;

use crate::error::ApiError;

/// JSON body accepted by `POST /challenges`.
#[derive(Debug, Deserialize)]
pub struct OpenChallengeBody {
  pub claim_id:          Option<Uuid>,
  pub relationship_id:   Option<Uuid>,
  pub reason:            String,
  /// Evidence on the same target that the challenge disputes.
  #[serde(default)]
  pub disputed_evidence: Vec<Uuid>,
}

impl TryFrom<OpenChallengeBody> for NewChallenge {
  type Error = veracity_core::Error;

  fn try_from(b: OpenChallengeBody) -> Result<Self, Self::Error> {
    Ok(NewChallenge {
      target:            TargetRef::from_parts(b.claim_id, b.relationship_id)?,
      reason:            b.reason,
      disputed_evidence: b.disputed_evidence,
    })
  }
}

/// `POST /challenges`: returns 201; the penalty applies on the next rescore.
pub async fn open<S>(
  State(service): State<VeracityService<S>>,
  Json(body): Json<OpenChallengeBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: VeracityStore + 'static,
{
  let challenge = service.open_challenge(NewChallenge::try_from(body)?).await?;
  Ok((StatusCode::CREATED, Json(challenge)))
}

/// `GET /challenges/{id}`
pub async fn get_one<S>(
  State(service): State<VeracityService<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Challenge>, ApiError>
where
  S: VeracityStore + 'static,
{
  Ok(Json(service.get_challenge(id).await?))
}

/// `POST /challenges/{id}/resolve`
pub async fn resolve<S>(
  State(service): State<VeracityService<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<Resolution>,
) -> Result<Json<Challenge>, ApiError>
where
  S: VeracityStore + 'static,
{
  Ok(Json(service.resolve_challenge(id, body).await?))
}
