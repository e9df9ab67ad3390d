//! HTTP server wiring for the veracity engine.
//!
//! Builds the [`VeracityService`] from a [`ServerConfig`], mounts the JSON
//! API, and runs the periodic decay sweep.

use std::{path::PathBuf, time::Duration};

use axum::{Json, Router, routing::get};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use veracity_core::{ScoringConfig, store::VeracityStore};
use veracity_dispatch::{DispatchConfig, VeracityService};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `veracity.toml` and
/// `VERACITY_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                      String,
  pub port:                      u16,
  pub store_path:                PathBuf,
  /// How often expired scores are queued for a decay refresh. `0` disables
  /// the sweep.
  pub decay_sweep_interval_secs: u64,
  pub scoring:                   ScoringConfig,
  pub dispatch:                  DispatchConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                      "127.0.0.1".to_string(),
      port:                      8080,
      store_path:                PathBuf::from("veracity.db"),
      decay_sweep_interval_secs: 300,
      scoring:                   ScoringConfig::default(),
      dispatch:                  DispatchConfig::default(),
    }
  }
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full application: the JSON API plus `/health`, with request tracing.
pub fn app<S>(service: VeracityService<S>) -> Router
where
  S: VeracityStore + 'static,
{
  Router::new()
    .route("/health", get(health))
    .merge(veracity_api::api_router(service))
    .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

// ─── Decay sweep ──────────────────────────────────────────────────────────────

/// One sweep: queue every expired score and reschedule stalled targets.
/// Returns the number of expired scores queued.
pub async fn sweep<S>(service: &VeracityService<S>) -> veracity_dispatch::Result<usize>
where
  S: VeracityStore + 'static,
{
  let expired = service.refresh_expired(Utc::now()).await?;
  let stalled = service.dispatcher().retry_stalled();
  if stalled > 0 {
    info!(stalled, "stalled targets rescheduled");
  }
  Ok(expired)
}

/// Run [`sweep`] every `every` until the runtime shuts down.
pub fn spawn_sweeper<S>(service: VeracityService<S>, every: Duration) -> JoinHandle<()>
where
  S: VeracityStore + 'static,
{
  tokio::spawn(async move {
    let mut ticks = tokio::time::interval(every);
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
      ticks.tick().await;
      if let Err(e) = sweep(&service).await {
        error!(error = %e, "decay sweep failed");
      }
    }
  })
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use tower::ServiceExt as _;
  use veracity_core::{
    evidence::{Direction, NewEvidence},
    source::{NewSource, SourceKind},
    target::{NewClaim, TargetRef},
  };
  use veracity_store_sqlite::SqliteStore;

  async fn make_service() -> VeracityService<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    VeracityService::new(store, ScoringConfig::default(), DispatchConfig::default())
  }

  #[tokio::test]
  async fn health_returns_ok() {
    let app = app(make_service().await);
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn api_routes_are_mounted_at_root() {
    let app = app(make_service().await);
    let req = Request::builder().uri("/sources").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn sweep_with_nothing_expired_is_a_no_op() {
    let service = make_service().await;
    service.create_claim(NewClaim::new("water boils at 100C at sea level")).await.unwrap();
    assert_eq!(sweep(&service).await.unwrap(), 0);
  }

  #[tokio::test]
  async fn sweep_ignores_fresh_decaying_scores() {
    let service = make_service().await;
    let claim = service.create_claim(NewClaim::new("the mill burned down")).await.unwrap();
    let source = service
      .create_source(NewSource::new(SourceKind::Document, "parish register"))
      .await
      .unwrap();
    let mut input = NewEvidence::new(
      TargetRef::Claim(claim.claim_id),
      source.source_id,
      Direction::Supporting,
      "burial entries",
    );
    input.relevance_date = Some(Utc::now() - chrono::Duration::days(30));
    service.submit_evidence(input).await.unwrap();
    service.wait_idle().await;

    // The refreshed score expires a day from now, so nothing is due yet.
    assert_eq!(sweep(&service).await.unwrap(), 0);
  }

  #[test]
  fn config_reads_nested_tables() {
    let toml = r#"
      port = 9000
      decay_sweep_interval_secs = 60

      [scoring]
      challenge_penalty = 0.2

      [dispatch]
      max_retries = 5
    "#;
    let cfg: ServerConfig = config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();

    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.decay_sweep_interval_secs, 60);
    assert_eq!(cfg.scoring.challenge_penalty, 0.2);
    assert_eq!(cfg.scoring.challenge_floor, 0.1);
    assert_eq!(cfg.dispatch.max_retries, 5);
    assert_eq!(cfg.dispatch.initial_backoff_ms, 50);
  }

  #[test]
  fn empty_config_uses_defaults() {
    let cfg: ServerConfig = config::Config::builder()
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(cfg.address(), "127.0.0.1:8080");
    assert_eq!(cfg.scoring, ScoringConfig::default());
  }
}
