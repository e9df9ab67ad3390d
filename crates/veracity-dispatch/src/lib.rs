//! Recomputation dispatch for the veracity engine.
//!
//! [`Dispatcher`] owns the per-target state machine that turns ledger writes
//! into score recalculations. [`VeracityService`] pairs it with a store and is
//! what the HTTP layer and the server binary talk to.

mod config;
mod dispatcher;
mod retry;
mod service;

pub mod error;

pub use config::DispatchConfig;
pub use dispatcher::{Dispatcher, RecalcStatus};
pub use error::{Error, Result};
pub use service::{ScoreView, VeracityService};

#[cfg(test)]
mod tests;
