//! Owned, async-capable handle over one library unit of work.
//!
//! # Responsibility
//! - Expose the asynchronous variants of the series/volume reads and saves.
//! - Run blocking SQLite work on the tokio blocking pool.
//!
//! # Invariants
//! - Clones share one connection and one change set.
//! - Operations are sequential: each one holds the connection lock for its
//!   whole duration, so a merge's queries never interleave with another call.
//! - Lock order is connection, then change set.
//! - Methods that only touch the change set stay synchronous and return
//!   `RepoResult`; a poisoned change-set lock is `LockPoisoned`.

use crate::model::dto::{SeriesDto, VolumeDto};
use crate::model::series::{LibraryId, MangaFile, Series, SeriesId, Volume, VolumeId};
use crate::model::user_state::UserId;
use crate::repo::change_set::ChangeSet;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::series_repo::{
    files_for_volume, series_by_name, series_dto_by_id, series_dto_for_library,
    series_for_library, stage_series_removal, volume_by_id, volume_dto, volume_with_files,
    volumes_dto, volumes_for_series_ids, volumes_with_files,
};
use crate::repo::sql::ensure_connection_ready;
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

/// Async series repository backed by a shared SQLite connection.
#[derive(Debug, Clone)]
pub struct AsyncSeriesRepository {
    conn: Arc<Mutex<Connection>>,
    changes: Arc<Mutex<ChangeSet>>,
}

impl AsyncSeriesRepository {
    /// Takes ownership of a migrated connection.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        ensure_connection_ready(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            changes: Arc::new(Mutex::new(ChangeSet::new())),
        })
    }

    /// Stages a new series for insertion.
    pub fn add(&self, series: Series) -> RepoResult<()> {
        self.lock_changes()?.stage_add(series)
    }

    /// Stages a modification of a stored series.
    pub fn update(&self, series: Series) -> RepoResult<()> {
        self.lock_changes()?.stage_update(series)
    }

    /// Stages a new volume together with its files.
    pub fn add_volume(&self, volume: Volume) -> RepoResult<()> {
        self.lock_changes()?.stage_add_volume(volume)
    }

    /// Stages a modification of a stored volume row; its files are kept.
    pub fn update_volume(&self, volume: Volume) -> RepoResult<()> {
        self.lock_changes()?.stage_update_volume(volume)
    }

    /// Returns whether anything is staged.
    pub fn has_changes(&self) -> RepoResult<bool> {
        Ok(!self.lock_changes()?.is_empty())
    }

    /// Locates a series and stages its removal; `NotFound` when absent.
    pub async fn delete_series(&self, series_id: SeriesId) -> RepoResult<()> {
        let changes = Arc::clone(&self.changes);
        self.run(move |conn| {
            let mut staged = changes.lock().map_err(|_| RepoError::LockPoisoned)?;
            stage_series_removal(conn, &mut staged, series_id)
        })
        .await
    }

    /// Commits every staged change; returns whether any row was affected.
    pub async fn save_all(&self) -> RepoResult<bool> {
        let changes = Arc::clone(&self.changes);
        self.run(move |conn| {
            let mut staged = changes.lock().map_err(|_| RepoError::LockPoisoned)?;
            Ok(staged.commit(conn)? > 0)
        })
        .await
    }

    pub async fn get_series_by_name(&self, name: impl Into<String>) -> RepoResult<Option<Series>> {
        let name = name.into();
        self.run(move |conn| series_by_name(conn, &name)).await
    }

    pub async fn get_series_for_library_id(
        &self,
        library_id: LibraryId,
    ) -> RepoResult<Vec<Series>> {
        self.run(move |conn| series_for_library(conn, library_id))
            .await
    }

    pub async fn get_series_dto_for_library_id(
        &self,
        library_id: LibraryId,
        user_id: UserId,
    ) -> RepoResult<Vec<SeriesDto>> {
        self.run(move |conn| series_dto_for_library(conn, library_id, user_id))
            .await
    }

    pub async fn get_series_dto_by_id(
        &self,
        series_id: SeriesId,
        user_id: UserId,
    ) -> RepoResult<SeriesDto> {
        self.run(move |conn| series_dto_by_id(conn, series_id, user_id))
            .await
    }

    pub async fn get_volumes(&self, series_id: SeriesId) -> RepoResult<Vec<Volume>> {
        self.run(move |conn| volumes_with_files(conn, series_id))
            .await
    }

    pub async fn get_volumes_dto(
        &self,
        series_id: SeriesId,
        user_id: UserId,
    ) -> RepoResult<Vec<VolumeDto>> {
        self.run(move |conn| volumes_dto(conn, series_id, user_id))
            .await
    }

    pub async fn get_volume(&self, volume_id: VolumeId) -> RepoResult<Option<Volume>> {
        self.run(move |conn| volume_with_files(conn, volume_id))
            .await
    }

    pub async fn get_volume_dto(
        &self,
        volume_id: VolumeId,
        user_id: UserId,
    ) -> RepoResult<VolumeDto> {
        self.run(move |conn| volume_dto(conn, volume_id, user_id))
            .await
    }

    pub async fn get_volumes_for_series(
        &self,
        series_ids: Vec<SeriesId>,
    ) -> RepoResult<Vec<Volume>> {
        self.run(move |conn| volumes_for_series_ids(conn, &series_ids))
            .await
    }

    pub async fn get_volume_by_id(&self, volume_id: VolumeId) -> RepoResult<Option<Volume>> {
        self.run(move |conn| volume_by_id(conn, volume_id)).await
    }

    pub async fn get_files_for_volume(&self, volume_id: VolumeId) -> RepoResult<Vec<MangaFile>> {
        self.run(move |conn| files_for_volume(conn, volume_id))
            .await
    }

    async fn run<T, F>(&self, op: F) -> RepoResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> RepoResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| RepoError::LockPoisoned)?;
            op(&guard)
        })
        .await
        .map_err(|err| RepoError::Join(err.to_string()))?
    }

    fn lock_changes(&self) -> RepoResult<MutexGuard<'_, ChangeSet>> {
        self.changes.lock().map_err(|_| RepoError::LockPoisoned)
    }
}
