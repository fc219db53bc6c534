//! Read-model projections returned to callers.
//!
//! # Responsibility
//! - Map stored entity shapes to the shapes callers serialize.
//! - Carry the per-user overlay fields filled in by `crate::modifiers`.
//!
//! # Invariants
//! - Overlay fields start unset (`pages_read = 0`, rating/review `None`).

use crate::model::series::{
    LibraryId, MangaFile, MangaFormat, Series, SeriesId, Volume, VolumeId,
};
use serde::Serialize;

/// Series projection plus the requesting user's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesDto {
    pub id: SeriesId,
    pub name: String,
    pub original_name: String,
    pub sort_name: String,
    pub summary: Option<String>,
    pub pages: i32,
    pub library_id: LibraryId,
    /// Sum of pages read across all volumes of the series.
    pub pages_read: i64,
    pub user_rating: Option<i32>,
    pub user_review: Option<String>,
}

impl From<Series> for SeriesDto {
    fn from(series: Series) -> Self {
        Self {
            id: series.id,
            name: series.name,
            original_name: series.original_name,
            sort_name: series.sort_name,
            summary: series.summary,
            pages: series.pages,
            library_id: series.library_id,
            pages_read: 0,
            user_rating: None,
            user_review: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MangaFileDto {
    pub file_path: String,
    pub pages: i32,
    pub format: MangaFormat,
}

impl From<MangaFile> for MangaFileDto {
    fn from(file: MangaFile) -> Self {
        Self {
            file_path: file.file_path,
            pages: file.pages,
            format: file.format,
        }
    }
}

/// Volume projection plus the requesting user's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeDto {
    pub id: VolumeId,
    pub series_id: SeriesId,
    pub number: i32,
    pub name: String,
    pub pages: i32,
    pub pages_read: i64,
    pub files: Vec<MangaFileDto>,
}

impl From<Volume> for VolumeDto {
    fn from(volume: Volume) -> Self {
        Self {
            id: volume.id,
            series_id: volume.series_id,
            number: volume.number,
            name: volume.name,
            pages: volume.pages,
            pages_read: 0,
            files: volume.files.into_iter().map(MangaFileDto::from).collect(),
        }
    }
}
