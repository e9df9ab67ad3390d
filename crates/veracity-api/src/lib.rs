//! JSON REST API for the veracity engine.
//!
//! Exposes an axum [`Router`] backed by a [`VeracityService`] over any
//! [`veracity_core::store::VeracityStore`]. Auth, TLS, and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", veracity_api::api_router(service.clone()))
//! ```

pub mod challenges;
pub mod error;
pub mod evidence;
pub mod scores;
pub mod sources;
pub mod targets;

use axum::{
  Router,
  routing::{get, post, put},
};
use veracity_core::store::VeracityStore;
use veracity_dispatch::VeracityService;

pub use error::ApiError;

/// Build a fully-materialised API router for `service`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(service: VeracityService<S>) -> Router<()>
where
  S: VeracityStore + 'static,
{
  Router::new()
    // Targets
    .route("/claims", post(targets::create_claim::<S>))
    .route("/relationships", post(targets::create_relationship::<S>))
    .route("/targets/{kind}/{id}", get(targets::get_one::<S>))
    .route("/targets/{kind}/{id}/evidence", get(targets::evidence::<S>))
    .route("/targets/{kind}/{id}/challenges", get(targets::challenges::<S>))
    // Scores
    .route("/targets/{kind}/{id}/score", get(scores::current::<S>))
    .route("/targets/{kind}/{id}/history", get(scores::history::<S>))
    .route("/targets/{kind}/{id}/recalculate", post(scores::recalculate::<S>))
    .route("/disputed", get(scores::disputed::<S>))
    // Sources
    .route("/sources", get(sources::list::<S>).post(sources::create::<S>))
    .route("/sources/{id}", get(sources::get_one::<S>))
    .route(
      "/sources/{id}/credibility",
      put(sources::override_credibility::<S>).delete(sources::clear_override::<S>),
    )
    // Evidence
    .route("/evidence", post(evidence::submit::<S>))
    .route("/evidence/{id}", get(evidence::get_one::<S>).patch(evidence::edit::<S>))
    .route("/evidence/{id}/remove", post(evidence::remove::<S>))
    .route("/evidence/{id}/review", post(evidence::review::<S>))
    // Challenges
    .route("/challenges", post(challenges::open::<S>))
    .route("/challenges/{id}", get(challenges::get_one::<S>))
    .route("/challenges/{id}/resolve", post(challenges::resolve::<S>))
    .with_state(service)
}
