//! Series/volume repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the filtered, ordered reads over `series`, `volumes` and
//!   `manga_files`, plus their per-user DTO projections.
//! - Stage series/volume writes and commit them as one batch.
//!
//! # Invariants
//! - Library listings are ordered by `sort_name ASC, id ASC`.
//! - Volume listings are ordered by `number ASC, id ASC`.
//! - DTO reads always pass through the modifier merge before returning.
//! - Nothing staged is visible to reads until `save_all` succeeds.

use crate::model::dto::{SeriesDto, VolumeDto};
use crate::model::series::{
    LibraryId, MangaFile, MangaFormat, Series, SeriesId, Volume, VolumeId,
};
use crate::model::user_state::UserId;
use crate::modifiers::{add_series_modifiers, add_volume_modifiers};
use crate::repo::change_set::ChangeSet;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::sql::{
    ensure_connection_ready, query_by_ids, single, single_or_default, uuid_column,
};
use log::{debug, info};
use rusqlite::{Connection, Params, Row};
use std::collections::HashMap;
use std::time::Instant;

const SERIES_SELECT_SQL: &str = "SELECT
    id,
    name,
    original_name,
    sort_name,
    summary,
    pages,
    library_id
FROM series";

const VOLUME_SELECT_SQL: &str = "SELECT
    id,
    series_id,
    number,
    name,
    pages
FROM volumes";

/// Repository interface for series and volume persistence.
pub trait SeriesRepository {
    /// Stages a new series for insertion.
    fn add(&mut self, series: Series) -> RepoResult<()>;
    /// Stages a modification of a stored series.
    fn update(&mut self, series: Series) -> RepoResult<()>;
    /// Stages a new volume together with its files.
    fn add_volume(&mut self, volume: Volume) -> RepoResult<()>;
    /// Stages a modification of a stored volume row; its files are kept.
    fn update_volume(&mut self, volume: Volume) -> RepoResult<()>;
    /// Locates a series and stages its removal.
    ///
    /// Fails with `NotFound` when no such series exists.
    fn delete_series(&mut self, series_id: SeriesId) -> RepoResult<()>;
    /// Commits every staged change; returns whether any row was affected.
    fn save_all(&mut self) -> RepoResult<bool>;
    /// Returns whether anything is staged.
    fn has_changes(&self) -> bool;

    /// Exact-name lookup. Several matches is a cardinality error.
    fn get_series_by_name(&self, name: &str) -> RepoResult<Option<Series>>;
    /// Series of one library ordered by `sort_name`.
    fn get_series_for_library_id(&self, library_id: LibraryId) -> RepoResult<Vec<Series>>;
    /// Library listing merged with `user_id`'s progress and rating.
    fn get_series_dto_for_library_id(
        &self,
        library_id: LibraryId,
        user_id: UserId,
    ) -> RepoResult<Vec<SeriesDto>>;
    /// Exactly one series must match.
    fn get_series_dto_by_id(&self, series_id: SeriesId, user_id: UserId)
        -> RepoResult<SeriesDto>;
    /// Volumes of one series with their files.
    fn get_volumes(&self, series_id: SeriesId) -> RepoResult<Vec<Volume>>;
    /// Volumes of one series merged with `user_id`'s progress.
    fn get_volumes_dto(&self, series_id: SeriesId, user_id: UserId)
        -> RepoResult<Vec<VolumeDto>>;
    /// One volume with its files, if present.
    fn get_volume(&self, volume_id: VolumeId) -> RepoResult<Option<Volume>>;
    /// Exactly one volume must match.
    fn get_volume_dto(&self, volume_id: VolumeId, user_id: UserId) -> RepoResult<VolumeDto>;
    /// Unordered volumes of every series in `series_ids`, without files.
    fn get_volumes_for_series(&self, series_ids: &[SeriesId]) -> RepoResult<Vec<Volume>>;
    /// One volume without its files, if present.
    fn get_volume_by_id(&self, volume_id: VolumeId) -> RepoResult<Option<Volume>>;
    /// Files of one volume ordered by path; empty for an unknown volume.
    fn get_files_for_volume(&self, volume_id: VolumeId) -> RepoResult<Vec<MangaFile>>;
}

/// SQLite-backed series repository holding one unit of work.
pub struct SqliteSeriesRepository<'conn> {
    conn: &'conn Connection,
    changes: ChangeSet,
}

impl<'conn> SqliteSeriesRepository<'conn> {
    /// Creates repository from migrated connection with an empty change set.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self {
            conn,
            changes: ChangeSet::new(),
        })
    }

    /// Staged changes not yet committed.
    pub fn pending_changes(&self) -> &ChangeSet {
        &self.changes
    }
}

impl SeriesRepository for SqliteSeriesRepository<'_> {
    fn add(&mut self, series: Series) -> RepoResult<()> {
        self.changes.stage_add(series)
    }

    fn update(&mut self, series: Series) -> RepoResult<()> {
        self.changes.stage_update(series)
    }

    fn add_volume(&mut self, volume: Volume) -> RepoResult<()> {
        self.changes.stage_add_volume(volume)
    }

    fn update_volume(&mut self, volume: Volume) -> RepoResult<()> {
        self.changes.stage_update_volume(volume)
    }

    fn delete_series(&mut self, series_id: SeriesId) -> RepoResult<()> {
        stage_series_removal(self.conn, &mut self.changes, series_id)
    }

    fn save_all(&mut self) -> RepoResult<bool> {
        Ok(self.changes.commit(self.conn)? > 0)
    }

    fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    fn get_series_by_name(&self, name: &str) -> RepoResult<Option<Series>> {
        series_by_name(self.conn, name)
    }

    fn get_series_for_library_id(&self, library_id: LibraryId) -> RepoResult<Vec<Series>> {
        series_for_library(self.conn, library_id)
    }

    fn get_series_dto_for_library_id(
        &self,
        library_id: LibraryId,
        user_id: UserId,
    ) -> RepoResult<Vec<SeriesDto>> {
        series_dto_for_library(self.conn, library_id, user_id)
    }

    fn get_series_dto_by_id(
        &self,
        series_id: SeriesId,
        user_id: UserId,
    ) -> RepoResult<SeriesDto> {
        series_dto_by_id(self.conn, series_id, user_id)
    }

    fn get_volumes(&self, series_id: SeriesId) -> RepoResult<Vec<Volume>> {
        volumes_with_files(self.conn, series_id)
    }

    fn get_volumes_dto(
        &self,
        series_id: SeriesId,
        user_id: UserId,
    ) -> RepoResult<Vec<VolumeDto>> {
        volumes_dto(self.conn, series_id, user_id)
    }

    fn get_volume(&self, volume_id: VolumeId) -> RepoResult<Option<Volume>> {
        volume_with_files(self.conn, volume_id)
    }

    fn get_volume_dto(&self, volume_id: VolumeId, user_id: UserId) -> RepoResult<VolumeDto> {
        volume_dto(self.conn, volume_id, user_id)
    }

    fn get_volumes_for_series(&self, series_ids: &[SeriesId]) -> RepoResult<Vec<Volume>> {
        volumes_for_series_ids(self.conn, series_ids)
    }

    fn get_volume_by_id(&self, volume_id: VolumeId) -> RepoResult<Option<Volume>> {
        volume_by_id(self.conn, volume_id)
    }

    fn get_files_for_volume(&self, volume_id: VolumeId) -> RepoResult<Vec<MangaFile>> {
        files_for_volume(self.conn, volume_id)
    }
}

pub(crate) fn stage_series_removal(
    conn: &Connection,
    changes: &mut ChangeSet,
    series_id: SeriesId,
) -> RepoResult<()> {
    if !changes.is_staged_add(series_id) {
        let stored = query_series(
            conn,
            &format!("{SERIES_SELECT_SQL} WHERE id = ?1;"),
            [series_id.to_string()],
        )?;
        if single_or_default(stored, "series", format!("id={series_id}"))?.is_none() {
            return Err(RepoError::NotFound {
                entity: "series",
                id: series_id,
            });
        }
    }

    changes.stage_removal(series_id);
    debug!("event=stage_delete module=repo status=ok entity=series");
    Ok(())
}

pub(crate) fn series_by_name(conn: &Connection, name: &str) -> RepoResult<Option<Series>> {
    let rows = query_series(conn, &format!("{SERIES_SELECT_SQL} WHERE name = ?1;"), [name])?;
    single_or_default(rows, "series", format!("name={name:?}"))
}

pub(crate) fn series_for_library(
    conn: &Connection,
    library_id: LibraryId,
) -> RepoResult<Vec<Series>> {
    query_series(
        conn,
        &format!("{SERIES_SELECT_SQL} WHERE library_id = ?1 ORDER BY sort_name ASC, id ASC;"),
        [library_id.to_string()],
    )
}

pub(crate) fn series_dto_for_library(
    conn: &Connection,
    library_id: LibraryId,
    user_id: UserId,
) -> RepoResult<Vec<SeriesDto>> {
    let started_at = Instant::now();
    let mut series: Vec<SeriesDto> = series_for_library(conn, library_id)?
        .into_iter()
        .map(SeriesDto::from)
        .collect();
    add_series_modifiers(conn, user_id, &mut series)?;

    info!(
        "event=series_dto_for_library module=repo status=ok count={} duration_ms={}",
        series.len(),
        started_at.elapsed().as_millis()
    );
    Ok(series)
}

pub(crate) fn series_dto_by_id(
    conn: &Connection,
    series_id: SeriesId,
    user_id: UserId,
) -> RepoResult<SeriesDto> {
    let rows = query_series(
        conn,
        &format!("{SERIES_SELECT_SQL} WHERE id = ?1;"),
        [series_id.to_string()],
    )?;
    let series = single(rows, "series", format!("id={series_id}"))?;

    let mut batch = [SeriesDto::from(series)];
    add_series_modifiers(conn, user_id, &mut batch)?;
    let [dto] = batch;
    Ok(dto)
}

pub(crate) fn volumes_with_files(
    conn: &Connection,
    series_id: SeriesId,
) -> RepoResult<Vec<Volume>> {
    let mut volumes = query_volumes(
        conn,
        &format!("{VOLUME_SELECT_SQL} WHERE series_id = ?1 ORDER BY number ASC, id ASC;"),
        [series_id.to_string()],
    )?;
    load_files(conn, &mut volumes)?;
    Ok(volumes)
}

pub(crate) fn volumes_dto(
    conn: &Connection,
    series_id: SeriesId,
    user_id: UserId,
) -> RepoResult<Vec<VolumeDto>> {
    let mut volumes: Vec<VolumeDto> = volumes_with_files(conn, series_id)?
        .into_iter()
        .map(VolumeDto::from)
        .collect();
    add_volume_modifiers(conn, user_id, &mut volumes)?;
    Ok(volumes)
}

pub(crate) fn volume_with_files(
    conn: &Connection,
    volume_id: VolumeId,
) -> RepoResult<Option<Volume>> {
    let Some(volume) = volume_by_id(conn, volume_id)? else {
        return Ok(None);
    };
    let mut batch = vec![volume];
    load_files(conn, &mut batch)?;
    Ok(batch.pop())
}

pub(crate) fn volume_dto(
    conn: &Connection,
    volume_id: VolumeId,
    user_id: UserId,
) -> RepoResult<VolumeDto> {
    let rows = query_volumes(
        conn,
        &format!("{VOLUME_SELECT_SQL} WHERE id = ?1;"),
        [volume_id.to_string()],
    )?;
    let mut batch = vec![single(rows, "volume", format!("id={volume_id}"))?];
    load_files(conn, &mut batch)?;

    let mut dtos: Vec<VolumeDto> = batch.into_iter().map(VolumeDto::from).collect();
    add_volume_modifiers(conn, user_id, &mut dtos)?;
    single(dtos, "volume", format!("id={volume_id}"))
}

pub(crate) fn volumes_for_series_ids(
    conn: &Connection,
    series_ids: &[SeriesId],
) -> RepoResult<Vec<Volume>> {
    query_by_ids(
        conn,
        series_ids,
        &[],
        |ids| format!("{VOLUME_SELECT_SQL} WHERE series_id IN ({ids});"),
        parse_volume_row,
    )
}

pub(crate) fn volume_by_id(conn: &Connection, volume_id: VolumeId) -> RepoResult<Option<Volume>> {
    let rows = query_volumes(
        conn,
        &format!("{VOLUME_SELECT_SQL} WHERE id = ?1;"),
        [volume_id.to_string()],
    )?;
    single_or_default(rows, "volume", format!("id={volume_id}"))
}

pub(crate) fn files_for_volume(
    conn: &Connection,
    volume_id: VolumeId,
) -> RepoResult<Vec<MangaFile>> {
    let mut stmt = conn.prepare(
        "SELECT id, volume_id, file_path, pages, format
         FROM manga_files
         WHERE volume_id = ?1
         ORDER BY file_path ASC, id ASC;",
    )?;
    let mut rows = stmt.query([volume_id.to_string()])?;
    let mut files = Vec::new();
    while let Some(row) = rows.next()? {
        files.push(parse_file_row(row)?);
    }
    Ok(files)
}

fn query_series(conn: &Connection, sql: &str, params: impl Params) -> RepoResult<Vec<Series>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut series = Vec::new();
    while let Some(row) = rows.next()? {
        series.push(parse_series_row(row)?);
    }
    Ok(series)
}

fn query_volumes(conn: &Connection, sql: &str, params: impl Params) -> RepoResult<Vec<Volume>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut volumes = Vec::new();
    while let Some(row) = rows.next()? {
        volumes.push(parse_volume_row(row)?);
    }
    Ok(volumes)
}

/// Eagerly loads files for every volume in one batched query.
fn load_files(conn: &Connection, volumes: &mut [Volume]) -> RepoResult<()> {
    if volumes.is_empty() {
        return Ok(());
    }

    let ids: Vec<VolumeId> = volumes.iter().map(|volume| volume.id).collect();
    let files = query_by_ids(
        conn,
        &ids,
        &[],
        |ids| {
            format!(
                "SELECT id, volume_id, file_path, pages, format
                 FROM manga_files
                 WHERE volume_id IN ({ids})
                 ORDER BY file_path ASC, id ASC;"
            )
        },
        parse_file_row,
    )?;

    let mut by_volume: HashMap<VolumeId, Vec<MangaFile>> = HashMap::new();
    for file in files {
        by_volume.entry(file.volume_id).or_default().push(file);
    }
    for volume in volumes.iter_mut() {
        volume.files = by_volume.remove(&volume.id).unwrap_or_default();
    }
    Ok(())
}

fn parse_series_row(row: &Row<'_>) -> RepoResult<Series> {
    Ok(Series {
        id: uuid_column(row, "id")?,
        name: row.get("name")?,
        original_name: row.get("original_name")?,
        sort_name: row.get("sort_name")?,
        summary: row.get("summary")?,
        pages: row.get("pages")?,
        library_id: uuid_column(row, "library_id")?,
    })
}

fn parse_volume_row(row: &Row<'_>) -> RepoResult<Volume> {
    Ok(Volume {
        id: uuid_column(row, "id")?,
        series_id: uuid_column(row, "series_id")?,
        number: row.get("number")?,
        name: row.get("name")?,
        pages: row.get("pages")?,
        files: Vec::new(),
    })
}

fn parse_file_row(row: &Row<'_>) -> RepoResult<MangaFile> {
    let format_text: String = row.get("format")?;
    let format = MangaFormat::parse_db(&format_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid file format `{format_text}` in manga_files.format"
        ))
    })?;

    Ok(MangaFile {
        id: uuid_column(row, "id")?,
        volume_id: uuid_column(row, "volume_id")?,
        file_path: row.get("file_path")?,
        pages: row.get("pages")?,
        format,
    })
}
