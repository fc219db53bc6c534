//! Per-user reading state rows.

use crate::model::series::{SeriesId, VolumeId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an application user. Users live outside this crate.
pub type UserId = Uuid;

/// Pages read by one user in one volume.
///
/// Series-level progress is the sum over the series' volumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    pub user_id: UserId,
    pub series_id: SeriesId,
    pub volume_id: VolumeId,
    pub pages_read: i32,
}

/// A user's rating and optional review of one series. At most one per pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRating {
    pub user_id: UserId,
    pub series_id: SeriesId,
    /// Scale `0..=5`.
    pub rating: i32,
    pub review: Option<String>,
}
