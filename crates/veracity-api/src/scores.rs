//! Handlers for scores and score history.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/targets/{kind}/{id}/score` | Cached score plus `status` |
//! | `GET`  | `/targets/{kind}/{id}/history` | Newest first; `?limit&offset` |
//! | `POST` | `/targets/{kind}/{id}/recalculate` | Blocks until committed; optional `?reason` |
//! | `GET`  | `/disputed` | `?threshold&limit&offset`, lowest score first |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::Deserialize;
use uuid::Uuid;
use veracity_core::{
  score::{Page, Recalculated, ScoreHistoryEntry, VeracityScore},
  store::VeracityStore,
};
use veracity_dispatch::{ScoreView, VeracityService};

use crate::{error::ApiError, targets::target_ref};

/// `GET /targets/{kind}/{id}/score`
///
/// The cached score is returned even while a recalculation is pending; the
/// `status` field says whether it is `clean`, `dirty`, or `recalculating`.
pub async fn current<S>(
  State(service): State<VeracityService<S>>,
  Path(path): Path<(String, Uuid)>,
) -> Result<Json<ScoreView>, ApiError>
where
  S: VeracityStore + 'static,
{
  Ok(Json(service.get_score(target_ref(path)?).await?))
}

/// `GET /targets/{kind}/{id}/history[?limit=..][&offset=..]`
pub async fn history<S>(
  State(service): State<VeracityService<S>>,
  Path(path): Path<(String, Uuid)>,
  Query(page): Query<Page>,
) -> Result<Json<Vec<ScoreHistoryEntry>>, ApiError>
where
  S: VeracityStore + 'static,
{
  let target = target_ref(path)?;
  service.get_target(target).await?;
  Ok(Json(service.score_history(target, page).await?))
}

// ─── Recalculate ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RecalculateParams {
  /// Recorded as the history row's reason.
  pub reason: Option<String>,
}

/// `POST /targets/{kind}/{id}/recalculate[?reason=..]`
pub async fn recalculate<S>(
  State(service): State<VeracityService<S>>,
  Path(path): Path<(String, Uuid)>,
  Query(params): Query<RecalculateParams>,
) -> Result<Json<Recalculated>, ApiError>
where
  S: VeracityStore + 'static,
{
  Ok(Json(service.recalculate(target_ref(path)?, params.reason).await?))
}

// ─── Disputed ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DisputedParams {
  /// Defaults to the configured disputed threshold.
  pub threshold: Option<f64>,
  pub limit:     Option<usize>,
  pub offset:    Option<usize>,
}

/// `GET /disputed[?threshold=..][&limit=..][&offset=..]`
pub async fn disputed<S>(
  State(service): State<VeracityService<S>>,
  Query(params): Query<DisputedParams>,
) -> Result<Json<Vec<VeracityScore>>, ApiError>
where
  S: VeracityStore + 'static,
{
  if let Some(t) = params.threshold
    && !(0.0..=1.0).contains(&t)
  {
    return Err(ApiError::BadRequest(format!("threshold must be in [0, 1], got {t}")));
  }
  let page = Page { limit: params.limit, offset: params.offset };
  Ok(Json(service.disputed(params.threshold, page).await?))
}
