//! Handlers for claims, relationships, and per-target ledgers.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/claims` | Body: [`NewClaim`]; returns 201 |
//! | `POST` | `/relationships` | Body: [`NewRelationship`]; returns 201 |
//! | `GET`  | `/targets/{kind}/{id}` | `kind` is `claim` or `relationship` |
//! | `GET`  | `/targets/{kind}/{id}/evidence` | Optional `?include_removed=true` |
//! | `GET`  | `/targets/{kind}/{id}/challenges` | Open and resolved |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use veracity_core::{
  challenge::Challenge,
  evidence::Evidence,
  store::{EvidenceQuery, VeracityStore},
  target::{Claim, NewClaim, NewRelationship, Relationship, TargetKind, TargetRef},
};
use veracity_dispatch::VeracityService;

use crate::error::ApiError;

/// Parse the `{kind}/{id}` segment pair shared by every `/targets` route.
/// An unknown kind is a 400 with the usual JSON error body.
pub(crate) fn target_ref((kind, id): (String, Uuid)) -> Result<TargetRef, ApiError> {
  Ok(TargetRef::new(kind.parse::<TargetKind>()?, id))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /claims`: returns 201 + the stored [`Claim`].
pub async fn create_claim<S>(
  State(service): State<VeracityService<S>>,
  Json(body): Json<NewClaim>,
) -> Result<impl IntoResponse, ApiError>
where
  S: VeracityStore + 'static,
{
  let claim = service.create_claim(body).await?;
  Ok((StatusCode::CREATED, Json(claim)))
}

/// `POST /relationships`: both endpoint claims must already exist.
pub async fn create_relationship<S>(
  State(service): State<VeracityService<S>>,
  Json(body): Json<NewRelationship>,
) -> Result<impl IntoResponse, ApiError>
where
  S: VeracityStore + 'static,
{
  let rel = service.create_relationship(body).await?;
  Ok((StatusCode::CREATED, Json(rel)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TargetBody {
  Claim(Claim),
  Relationship(Relationship),
}

/// `GET /targets/{kind}/{id}`
pub async fn get_one<S>(
  State(service): State<VeracityService<S>>,
  Path(path): Path<(String, Uuid)>,
) -> Result<Json<TargetBody>, ApiError>
where
  S: VeracityStore + 'static,
{
  let body = match target_ref(path)? {
    TargetRef::Claim(id) => TargetBody::Claim(service.get_claim(id).await?),
    TargetRef::Relationship(id) => {
      TargetBody::Relationship(service.get_relationship(id).await?)
    }
  };
  Ok(Json(body))
}

// ─── Ledgers ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EvidenceParams {
  /// If `true`, also return soft-removed evidence. Default `false`.
  #[serde(default)]
  pub include_removed: bool,
}

/// `GET /targets/{kind}/{id}/evidence[?include_removed=true]`
pub async fn evidence<S>(
  State(service): State<VeracityService<S>>,
  Path(path): Path<(String, Uuid)>,
  Query(params): Query<EvidenceParams>,
) -> Result<Json<Vec<Evidence>>, ApiError>
where
  S: VeracityStore + 'static,
{
  let target = target_ref(path)?;
  service.get_target(target).await?;
  let evidence = service
    .list_evidence(target, EvidenceQuery { include_removed: params.include_removed })
    .await?;
  Ok(Json(evidence))
}

/// `GET /targets/{kind}/{id}/challenges`
pub async fn challenges<S>(
  State(service): State<VeracityService<S>>,
  Path(path): Path<(String, Uuid)>,
) -> Result<Json<Vec<Challenge>>, ApiError>
where
  S: VeracityStore + 'static,
{
  let target = target_ref(path)?;
  service.get_target(target).await?;
  Ok(Json(service.list_challenges(target).await?))
}
