//! SQLite backend for the veracity engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every write runs inside a single
//! immediate transaction, so it reads a consistent snapshot and either
//! commits in full or not at all.

mod digest;
mod encode;
mod queries;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
