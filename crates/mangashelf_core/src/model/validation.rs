//! Write-path validation errors shared by library entities.

use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Rejection reason for an entity that must not be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required text field is empty after trimming.
    EmptyField(&'static str),
    /// A page counter is negative.
    NegativePages { field: &'static str, value: i32 },
    /// A child record points at a different parent than the one it is staged with.
    ParentMismatch {
        entity: &'static str,
        expected: Uuid,
        actual: Uuid,
    },
    /// Rating outside the accepted `0..=5` scale.
    RatingOutOfRange(i32),
    /// Adding `added` pages to `current` does not fit the page counter.
    PagesOverflow {
        field: &'static str,
        current: i32,
        added: i32,
    },
    /// Progress beyond the number of pages in the volume.
    PagesReadOutOfRange { pages_read: i32, pages: i32 },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField(field) => write!(f, "`{field}` must not be empty"),
            Self::NegativePages { field, value } => {
                write!(f, "`{field}` must be >= 0, got {value}")
            }
            Self::ParentMismatch {
                entity,
                expected,
                actual,
            } => write!(
                f,
                "{entity} belongs to {actual} but was staged under {expected}"
            ),
            Self::RatingOutOfRange(value) => {
                write!(f, "rating must be within 0..=5, got {value}")
            }
            Self::PagesOverflow {
                field,
                current,
                added,
            } => write!(f, "`{field}` overflows when adding {added} to {current}"),
            Self::PagesReadOutOfRange { pages_read, pages } => write!(
                f,
                "pages read {pages_read} is outside 0..={pages} for this volume"
            ),
        }
    }
}

impl Error for ValidationError {}
