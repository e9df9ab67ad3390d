//! Handlers for `/sources` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/sources` | With current credibility; `?limit&offset` |
//! | `POST` | `/sources` | Body: [`NewSource`]; returns 201 |
//! | `GET`  | `/sources/{id}` | 404 if not found |
//! | `PUT`  | `/sources/{id}/credibility` | Body: `{"score":0.2,"reason":"..."}` |
//! | `DELETE` | `/sources/{id}/credibility` | Clears an override |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use uuid::Uuid;
use veracity_core::{
  score::Page,
  source::{CredibilityChange, CredibilityOverride, NewSource, Source},
  store::VeracityStore,
};
use veracity_dispatch::VeracityService;

use crate::error::ApiError;

/// `GET /sources[?limit=..][&offset=..]`
pub async fn list<S>(
  State(service): State<VeracityService<S>>,
  Query(page): Query<Page>,
) -> Result<Json<Vec<Source>>, ApiError>
where
  S: VeracityStore + 'static,
{
  Ok(Json(service.list_sources(page).await?))
}

/// `POST /sources`: new sources start at neutral credibility.
pub async fn create<S>(
  State(service): State<VeracityService<S>>,
  Json(body): Json<NewSource>,
) -> Result<impl IntoResponse, ApiError>
where
  S: VeracityStore + 'static,
{
  let source = service.create_source(body).await?;
  Ok((StatusCode::CREATED, Json(source)))
}

/// `GET /sources/{id}`
pub async fn get_one<S>(
  State(service): State<VeracityService<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Source>, ApiError>
where
  S: VeracityStore + 'static,
{
  Ok(Json(service.get_source(id).await?))
}

/// `PUT /sources/{id}/credibility`: pins the score until it is replaced or
/// cleared.
pub async fn override_credibility<S>(
  State(service): State<VeracityService<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<CredibilityOverride>,
) -> Result<Json<CredibilityChange>, ApiError>
where
  S: VeracityStore + 'static,
{
  Ok(Json(service.override_credibility(id, body).await?))
}

/// `DELETE /sources/{id}/credibility`: back to the evidence-based score.
pub async fn clear_override<S>(
  State(service): State<VeracityService<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<CredibilityChange>, ApiError>
where
  S: VeracityStore + 'static,
{
  Ok(Json(service.clear_credibility_override(id).await?))
}
