//! Per-user reading progress and rating persistence.
//!
//! # Responsibility
//! - Write the progress/rating rows that the modifier merge reads.
//! - Provide the batched id-set reads used by the merge.
//!
//! # Invariants
//! - One progress row per (user, volume); `pages_read` within the volume size.
//! - One rating row per (user, series); rating within `0..=5`.
//! - Writes here are immediate; they are not part of a series change set.

use crate::model::series::{SeriesId, VolumeId};
use crate::model::user_state::{UserId, UserProgress, UserRating};
use crate::model::validation::ValidationError;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::sql::{ensure_connection_ready, parse_uuid, query_by_ids, uuid_column};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};

const MAX_RATING: i32 = 5;

/// Repository interface for per-user series state.
pub trait UserStateRepository {
    /// Sets the pages read in one volume for one user.
    fn record_progress(
        &self,
        user_id: UserId,
        volume_id: VolumeId,
        pages_read: i32,
    ) -> RepoResult<UserProgress>;
    /// Sets the single rating/review of one series for one user.
    fn rate_series(
        &self,
        user_id: UserId,
        series_id: SeriesId,
        rating: i32,
        review: Option<&str>,
    ) -> RepoResult<UserRating>;
    /// All progress rows of `user_id` whose series is in `series_ids`.
    fn progress_for_series(
        &self,
        user_id: UserId,
        series_ids: &[SeriesId],
    ) -> RepoResult<Vec<UserProgress>>;
    /// All progress rows of `user_id` whose volume is in `volume_ids`.
    fn progress_for_volumes(
        &self,
        user_id: UserId,
        volume_ids: &[VolumeId],
    ) -> RepoResult<Vec<UserProgress>>;
    /// All rating rows of `user_id` whose series is in `series_ids`.
    fn ratings_for_series(
        &self,
        user_id: UserId,
        series_ids: &[SeriesId],
    ) -> RepoResult<Vec<UserRating>>;
}

/// SQLite-backed user state repository.
pub struct SqliteUserStateRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserStateRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl UserStateRepository for SqliteUserStateRepository<'_> {
    fn record_progress(
        &self,
        user_id: UserId,
        volume_id: VolumeId,
        pages_read: i32,
    ) -> RepoResult<UserProgress> {
        let volume = self
            .conn
            .query_row(
                "SELECT series_id, pages FROM volumes WHERE id = ?1;",
                [volume_id.to_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)?)),
            )
            .optional()?;
        let Some((series_text, pages)) = volume else {
            return Err(RepoError::NotFound {
                entity: "volume",
                id: volume_id,
            });
        };

        if !(0..=pages).contains(&pages_read) {
            return Err(ValidationError::PagesReadOutOfRange { pages_read, pages }.into());
        }
        let series_id = parse_uuid(&series_text, "volumes.series_id")?;

        self.conn.execute(
            "INSERT INTO user_progress (user_id, series_id, volume_id, pages_read)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id, volume_id) DO UPDATE SET
                pages_read = excluded.pages_read,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                user_id.to_string(),
                series_id.to_string(),
                volume_id.to_string(),
                pages_read,
            ],
        )?;

        debug!("event=record_progress module=repo status=ok pages_read={pages_read}");
        Ok(UserProgress {
            user_id,
            series_id,
            volume_id,
            pages_read,
        })
    }

    fn rate_series(
        &self,
        user_id: UserId,
        series_id: SeriesId,
        rating: i32,
        review: Option<&str>,
    ) -> RepoResult<UserRating> {
        if !(0..=MAX_RATING).contains(&rating) {
            return Err(ValidationError::RatingOutOfRange(rating).into());
        }

        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM series WHERE id = ?1);",
            [series_id.to_string()],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::NotFound {
                entity: "series",
                id: series_id,
            });
        }

        self.conn.execute(
            "INSERT INTO user_ratings (user_id, series_id, rating, review)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id, series_id) DO UPDATE SET
                rating = excluded.rating,
                review = excluded.review,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![user_id.to_string(), series_id.to_string(), rating, review],
        )?;

        debug!("event=rate_series module=repo status=ok rating={rating}");
        Ok(UserRating {
            user_id,
            series_id,
            rating,
            review: review.map(str::to_string),
        })
    }

    fn progress_for_series(
        &self,
        user_id: UserId,
        series_ids: &[SeriesId],
    ) -> RepoResult<Vec<UserProgress>> {
        progress_for_series(self.conn, user_id, series_ids)
    }

    fn progress_for_volumes(
        &self,
        user_id: UserId,
        volume_ids: &[VolumeId],
    ) -> RepoResult<Vec<UserProgress>> {
        progress_for_volumes(self.conn, user_id, volume_ids)
    }

    fn ratings_for_series(
        &self,
        user_id: UserId,
        series_ids: &[SeriesId],
    ) -> RepoResult<Vec<UserRating>> {
        ratings_for_series(self.conn, user_id, series_ids)
    }
}

pub(crate) fn progress_for_series(
    conn: &Connection,
    user_id: UserId,
    series_ids: &[SeriesId],
) -> RepoResult<Vec<UserProgress>> {
    query_by_ids(
        conn,
        series_ids,
        &[Value::Text(user_id.to_string())],
        |ids| {
            format!(
                "SELECT user_id, series_id, volume_id, pages_read
                 FROM user_progress
                 WHERE user_id = ? AND series_id IN ({ids});"
            )
        },
        parse_progress_row,
    )
}

pub(crate) fn progress_for_volumes(
    conn: &Connection,
    user_id: UserId,
    volume_ids: &[VolumeId],
) -> RepoResult<Vec<UserProgress>> {
    query_by_ids(
        conn,
        volume_ids,
        &[Value::Text(user_id.to_string())],
        |ids| {
            format!(
                "SELECT user_id, series_id, volume_id, pages_read
                 FROM user_progress
                 WHERE user_id = ? AND volume_id IN ({ids});"
            )
        },
        parse_progress_row,
    )
}

pub(crate) fn ratings_for_series(
    conn: &Connection,
    user_id: UserId,
    series_ids: &[SeriesId],
) -> RepoResult<Vec<UserRating>> {
    query_by_ids(
        conn,
        series_ids,
        &[Value::Text(user_id.to_string())],
        |ids| {
            format!(
                "SELECT user_id, series_id, rating, review
                 FROM user_ratings
                 WHERE user_id = ? AND series_id IN ({ids});"
            )
        },
        |row| {
            Ok(UserRating {
                user_id: uuid_column(row, "user_id")?,
                series_id: uuid_column(row, "series_id")?,
                rating: row.get("rating")?,
                review: row.get("review")?,
            })
        },
    )
}

fn parse_progress_row(row: &Row<'_>) -> RepoResult<UserProgress> {
    Ok(UserProgress {
        user_id: uuid_column(row, "user_id")?,
        series_id: uuid_column(row, "series_id")?,
        volume_id: uuid_column(row, "volume_id")?,
        pages_read: row.get("pages_read")?,
    })
}
