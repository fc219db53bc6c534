//! Per-user overlay of reading progress and ratings onto projected DTOs.
//!
//! # Responsibility
//! - Join a batch of series/volume DTOs against the requesting user's
//!   progress and rating rows.
//! - Keep the join itself store-independent so it can be exercised without
//!   a database.
//!
//! # Invariants
//! - A batch costs a fixed number of queries (two for series, one for
//!   volumes), never one per DTO.
//! - `pages_read` is the sum of matching progress rows, `0` when none match.
//!   Sums are accumulated as `i64` and cannot overflow for `i32` rows.
//! - Rating/review fields are only written when a rating row exists.
//! - More than one rating row for the same series is a cardinality error.

use crate::model::dto::{SeriesDto, VolumeDto};
use crate::model::series::{SeriesId, VolumeId};
use crate::model::user_state::{UserId, UserProgress, UserRating};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::user_state_repo::{progress_for_series, progress_for_volumes, ratings_for_series};
use rusqlite::Connection;
use std::collections::HashMap;
use uuid::Uuid;

/// Overlays `progress` and `ratings` onto `series` in place.
///
/// Rows whose series is not part of the batch are ignored.
pub fn apply_series_modifiers(
    series: &mut [SeriesDto],
    progress: &[UserProgress],
    ratings: &[UserRating],
) -> RepoResult<()> {
    let pages_by_series = sum_pages_by(progress, |row| row.series_id);

    let mut rating_by_series: HashMap<SeriesId, &UserRating> = HashMap::new();
    for rating in ratings {
        if rating_by_series.insert(rating.series_id, rating).is_some() {
            return Err(RepoError::Cardinality {
                entity: "user rating",
                key: format!("series_id={}", rating.series_id),
                matched: ratings
                    .iter()
                    .filter(|other| other.series_id == rating.series_id)
                    .count(),
            });
        }
    }

    for dto in series.iter_mut() {
        dto.pages_read = pages_by_series.get(&dto.id).copied().unwrap_or(0);
        let Some(rating) = rating_by_series.get(&dto.id) else {
            continue;
        };
        dto.user_rating = Some(rating.rating);
        dto.user_review = rating.review.clone();
    }

    Ok(())
}

/// Overlays `progress` onto `volumes` in place, keyed by volume id.
pub fn apply_volume_modifiers(volumes: &mut [VolumeDto], progress: &[UserProgress]) {
    let pages_by_volume = sum_pages_by(progress, |row| row.volume_id);
    for dto in volumes.iter_mut() {
        dto.pages_read = pages_by_volume.get(&dto.id).copied().unwrap_or(0);
    }
}

/// Loads `user_id`'s progress and ratings for the batch and applies them.
pub fn add_series_modifiers(
    conn: &Connection,
    user_id: UserId,
    series: &mut [SeriesDto],
) -> RepoResult<()> {
    if series.is_empty() {
        return Ok(());
    }

    let ids: Vec<SeriesId> = series.iter().map(|dto| dto.id).collect();
    let progress = progress_for_series(conn, user_id, &ids)?;
    let ratings = ratings_for_series(conn, user_id, &ids)?;
    apply_series_modifiers(series, &progress, &ratings)
}

/// Loads `user_id`'s progress for the volume batch and applies it.
pub fn add_volume_modifiers(
    conn: &Connection,
    user_id: UserId,
    volumes: &mut [VolumeDto],
) -> RepoResult<()> {
    if volumes.is_empty() {
        return Ok(());
    }

    let ids: Vec<VolumeId> = volumes.iter().map(|dto| dto.id).collect();
    let progress = progress_for_volumes(conn, user_id, &ids)?;
    apply_volume_modifiers(volumes, &progress);
    Ok(())
}

fn sum_pages_by(
    progress: &[UserProgress],
    key: impl Fn(&UserProgress) -> Uuid,
) -> HashMap<Uuid, i64> {
    let mut totals = HashMap::new();
    for row in progress {
        *totals.entry(key(row)).or_insert(0) += i64::from(row.pages_read);
    }
    totals
}
