//! Library domain model and read-model projections.
//!
//! # Responsibility
//! - Define the persisted entity shapes (series, volumes, files, user state).
//! - Define the per-request DTOs handed to callers.
//!
//! # Invariants
//! - Every entity carries a caller-generated stable `Uuid` identity.
//! - DTOs are never written back to the store.

pub mod dto;
pub mod series;
pub mod user_state;
pub mod validation;
