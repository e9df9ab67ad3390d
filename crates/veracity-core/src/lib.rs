//! Core types, scoring math, and trait definitions for the veracity engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! scoring functions in [`scoring`] and [`credibility`] are pure: every one of
//! them takes the reference time as an argument instead of reading the clock.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod challenge;
pub mod config;
pub mod credibility;
pub mod error;
pub mod evidence;
pub mod score;
pub mod scoring;
pub mod source;
pub mod store;
pub mod target;

pub use config::ScoringConfig;
pub use error::{Error, Result, StoreError};
