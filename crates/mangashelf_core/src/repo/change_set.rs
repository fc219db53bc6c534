//! Staged series/volume writes committed as one batch.
//!
//! # Responsibility
//! - Collect add/update/remove requests without touching the store.
//! - Apply the whole batch inside one immediate transaction on commit.
//!
//! # Invariants
//! - Entities are validated when staged, not at commit time.
//! - Changes are applied in staging order.
//! - A failed commit rolls back every change and keeps the batch staged.

use crate::model::series::{Series, SeriesId, Volume};
use crate::repo::error::{RepoError, RepoResult};
use log::{debug, error, info};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::time::Instant;

/// One pending write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedChange {
    AddSeries(Series),
    UpdateSeries(Series),
    RemoveSeries(SeriesId),
    /// Inserts the volume together with its files.
    AddVolume(Volume),
    /// Rewrites the volume row; stored files are left as they are.
    UpdateVolume(Volume),
}

/// Ordered set of pending writes for one unit of work.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    changes: Vec<StagedChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a new series for insertion.
    pub fn stage_add(&mut self, series: Series) -> RepoResult<()> {
        series.validate()?;
        self.changes.push(StagedChange::AddSeries(series));
        Ok(())
    }

    /// Stages a modification of an existing series.
    ///
    /// Updating a series that is itself still staged for insertion replaces
    /// the pending insert instead of queueing a separate update.
    pub fn stage_update(&mut self, series: Series) -> RepoResult<()> {
        series.validate()?;
        for change in &mut self.changes {
            if let StagedChange::AddSeries(pending) = change {
                if pending.id == series.id {
                    *pending = series;
                    return Ok(());
                }
            }
        }
        self.changes.push(StagedChange::UpdateSeries(series));
        Ok(())
    }

    /// Stages a new volume and its files.
    pub fn stage_add_volume(&mut self, volume: Volume) -> RepoResult<()> {
        volume.validate()?;
        self.changes.push(StagedChange::AddVolume(volume));
        Ok(())
    }

    /// Stages a modification of an existing volume row.
    ///
    /// A volume still staged for insertion is rewritten in place.
    pub fn stage_update_volume(&mut self, volume: Volume) -> RepoResult<()> {
        volume.validate()?;
        for change in &mut self.changes {
            if let StagedChange::AddVolume(pending) = change {
                if pending.id == volume.id {
                    *pending = volume;
                    return Ok(());
                }
            }
        }
        self.changes.push(StagedChange::UpdateVolume(volume));
        Ok(())
    }

    /// Stages removal of a series.
    ///
    /// A series that was only staged for insertion is dropped from the batch
    /// together with everything staged for it, so nothing reaches the store.
    /// Removing a series twice stages a single removal.
    pub fn stage_removal(&mut self, series_id: SeriesId) {
        if self.is_staged_add(series_id) {
            self.changes.retain(|change| match change {
                StagedChange::AddSeries(series) | StagedChange::UpdateSeries(series) => {
                    series.id != series_id
                }
                StagedChange::AddVolume(volume) | StagedChange::UpdateVolume(volume) => {
                    volume.series_id != series_id
                }
                StagedChange::RemoveSeries(_) => true,
            });
            return;
        }
        if self.is_staged_removal(series_id) {
            return;
        }
        self.changes.push(StagedChange::RemoveSeries(series_id));
    }

    /// Returns whether `series_id` is pending insertion in this batch.
    pub fn is_staged_add(&self, series_id: SeriesId) -> bool {
        self.changes.iter().any(
            |change| matches!(change, StagedChange::AddSeries(series) if series.id == series_id),
        )
    }

    /// Returns whether `series_id` is already pending removal in this batch.
    pub fn is_staged_removal(&self, series_id: SeriesId) -> bool {
        self.changes
            .iter()
            .any(|change| matches!(change, StagedChange::RemoveSeries(id) if *id == series_id))
    }

    pub fn changes(&self) -> &[StagedChange] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Discards everything staged.
    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Applies the batch in one immediate transaction and returns the
    /// number of affected rows. The batch is cleared only on success.
    pub(crate) fn commit(&mut self, conn: &Connection) -> RepoResult<usize> {
        if self.changes.is_empty() {
            debug!("event=save_changes module=repo status=skip staged=0");
            return Ok(0);
        }

        let started_at = Instant::now();
        let staged = self.changes.len();
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

        let affected = match apply_all(&tx, &self.changes) {
            Ok(affected) => affected,
            Err(err) => {
                error!(
                    "event=save_changes module=repo status=error staged={staged} duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };
        tx.commit()?;
        self.changes.clear();

        info!(
            "event=save_changes module=repo status=ok staged={staged} affected={affected} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(affected)
    }
}

fn apply_all(conn: &Connection, changes: &[StagedChange]) -> RepoResult<usize> {
    let mut affected = 0;
    for change in changes {
        affected += match change {
            StagedChange::AddSeries(series) => insert_series(conn, series)?,
            StagedChange::UpdateSeries(series) => update_series(conn, series)?,
            StagedChange::RemoveSeries(series_id) => remove_series(conn, *series_id)?,
            StagedChange::AddVolume(volume) => insert_volume(conn, volume)?,
            StagedChange::UpdateVolume(volume) => update_volume(conn, volume)?,
        };
    }
    Ok(affected)
}

fn insert_series(conn: &Connection, series: &Series) -> RepoResult<usize> {
    let changed = conn.execute(
        "INSERT INTO series (
            id,
            name,
            original_name,
            sort_name,
            summary,
            pages,
            library_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            series.id.to_string(),
            series.name.as_str(),
            series.original_name.as_str(),
            series.sort_name.as_str(),
            series.summary.as_deref(),
            series.pages,
            series.library_id.to_string(),
        ],
    )?;
    Ok(changed)
}

fn update_series(conn: &Connection, series: &Series) -> RepoResult<usize> {
    let changed = conn.execute(
        "UPDATE series
         SET
            name = ?2,
            original_name = ?3,
            sort_name = ?4,
            summary = ?5,
            pages = ?6,
            library_id = ?7,
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE id = ?1;",
        params![
            series.id.to_string(),
            series.name.as_str(),
            series.original_name.as_str(),
            series.sort_name.as_str(),
            series.summary.as_deref(),
            series.pages,
            series.library_id.to_string(),
        ],
    )?;

    if changed == 0 {
        return Err(RepoError::ConcurrencyConflict {
            entity: "series",
            id: series.id,
        });
    }
    Ok(changed)
}

fn remove_series(conn: &Connection, series_id: SeriesId) -> RepoResult<usize> {
    let changed = conn.execute(
        "DELETE FROM series WHERE id = ?1;",
        [series_id.to_string()],
    )?;

    if changed == 0 {
        return Err(RepoError::ConcurrencyConflict {
            entity: "series",
            id: series_id,
        });
    }
    Ok(changed)
}

fn insert_volume(conn: &Connection, volume: &Volume) -> RepoResult<usize> {
    let mut changed = conn.execute(
        "INSERT INTO volumes (id, series_id, number, name, pages)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            volume.id.to_string(),
            volume.series_id.to_string(),
            volume.number,
            volume.name.as_str(),
            volume.pages,
        ],
    )?;

    for file in &volume.files {
        changed += conn.execute(
            "INSERT INTO manga_files (id, volume_id, file_path, pages, format)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                file.id.to_string(),
                file.volume_id.to_string(),
                file.file_path.as_str(),
                file.pages,
                file.format.as_db(),
            ],
        )?;
    }

    Ok(changed)
}

fn update_volume(conn: &Connection, volume: &Volume) -> RepoResult<usize> {
    let changed = conn.execute(
        "UPDATE volumes
         SET
            series_id = ?2,
            number = ?3,
            name = ?4,
            pages = ?5,
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE id = ?1;",
        params![
            volume.id.to_string(),
            volume.series_id.to_string(),
            volume.number,
            volume.name.as_str(),
            volume.pages,
        ],
    )?;

    if changed == 0 {
        return Err(RepoError::ConcurrencyConflict {
            entity: "volume",
            id: volume.id,
        });
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::{ChangeSet, StagedChange};
    use crate::model::series::{Series, Volume};
    use crate::repo::error::RepoError;
    use uuid::Uuid;

    #[test]
    fn invalid_series_is_rejected_at_staging() {
        let mut changes = ChangeSet::new();
        let err = changes
            .stage_add(Series::new(Uuid::new_v4(), ""))
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
        assert!(changes.is_empty());
    }

    #[test]
    fn update_of_pending_insert_rewrites_the_insert() {
        let mut changes = ChangeSet::new();
        let mut series = Series::new(Uuid::new_v4(), "Draft");
        changes.stage_add(series.clone()).unwrap();

        series.name = "Final".to_string();
        changes.stage_update(series.clone()).unwrap();

        assert_eq!(changes.changes(), &[StagedChange::AddSeries(series)]);
    }

    #[test]
    fn removing_pending_insert_drops_it_and_its_volumes() {
        let mut changes = ChangeSet::new();
        let keep = Series::new(Uuid::new_v4(), "Keep");
        let drop = Series::new(keep.library_id, "Drop");
        changes.stage_add(keep.clone()).unwrap();
        changes.stage_add(drop.clone()).unwrap();
        changes.stage_add_volume(Volume::new(drop.id, 1)).unwrap();

        changes.stage_removal(drop.id);

        assert_eq!(changes.changes(), &[StagedChange::AddSeries(keep)]);
    }

    #[test]
    fn removing_stored_series_queues_removal() {
        let mut changes = ChangeSet::new();
        let id = Uuid::new_v4();
        changes.stage_removal(id);
        assert_eq!(changes.changes(), &[StagedChange::RemoveSeries(id)]);
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn repeated_removal_is_staged_once() {
        let mut changes = ChangeSet::new();
        let id = Uuid::new_v4();
        changes.stage_removal(id);
        changes.stage_removal(id);
        assert_eq!(changes.changes(), &[StagedChange::RemoveSeries(id)]);
    }

    #[test]
    fn volume_update_of_pending_insert_rewrites_the_insert() {
        let mut changes = ChangeSet::new();
        let mut volume = Volume::new(Uuid::new_v4(), 1);
        changes.stage_add_volume(volume.clone()).unwrap();

        volume.name = "Volume One".to_string();
        changes.stage_update_volume(volume.clone()).unwrap();

        assert_eq!(changes.changes(), &[StagedChange::AddVolume(volume)]);
    }

    #[test]
    fn volume_updates_are_dropped_with_their_pending_series() {
        let mut changes = ChangeSet::new();
        let series = Series::new(Uuid::new_v4(), "Draft");
        changes.stage_add(series.clone()).unwrap();
        changes
            .stage_update_volume(Volume::new(series.id, 1))
            .unwrap();

        changes.stage_removal(series.id);

        assert!(changes.is_empty());
    }
}
