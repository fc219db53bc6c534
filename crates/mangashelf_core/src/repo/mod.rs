//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for series and volumes.
//! - Isolate SQLite query details from callers.
//!
//! # Invariants
//! - Series/volume writes are staged and only become durable on `save_all`.
//! - "Single" reads never pick the first of several matches; they fail with
//!   `RepoError::Cardinality`.

pub mod async_series_repo;
pub mod change_set;
pub mod error;
pub mod series_repo;
mod sql;
pub mod user_state_repo;

pub use error::{RepoError, RepoResult};
