//! Series, volume and file entities as stored.
//!
//! # Responsibility
//! - Mirror the `series`, `volumes` and `manga_files` tables.
//! - Validate entities before they reach a write path.
//!
//! # Invariants
//! - A volume belongs to exactly one series, a file to exactly one volume.
//! - `sort_name` drives library listing order.

use crate::model::validation::ValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a series.
pub type SeriesId = Uuid;
/// Stable identifier of a volume.
pub type VolumeId = Uuid;
/// Stable identifier of a file record.
pub type MangaFileId = Uuid;
/// Identifier of the owning library. Libraries themselves live outside this crate.
pub type LibraryId = Uuid;

/// One comic/manga series inside a library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub id: SeriesId,
    /// Display name, matched exactly by name lookups.
    pub name: String,
    /// Name as found on disk before any normalization.
    pub original_name: String,
    /// Ordering key for library listings.
    pub sort_name: String,
    pub summary: Option<String>,
    /// Total pages across all volumes.
    pub pages: i32,
    pub library_id: LibraryId,
}

impl Series {
    /// Creates a series with a generated id; `sort_name` and
    /// `original_name` start equal to `name`.
    pub fn new(library_id: LibraryId, name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), library_id, name)
    }

    /// Creates a series with a caller-provided id.
    pub fn with_id(id: SeriesId, library_id: LibraryId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            original_name: name.clone(),
            sort_name: name.clone(),
            name,
            summary: None,
            pages: 0,
            library_id,
        }
    }

    /// Checks the invariants required before persistence.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("name"));
        }
        if self.sort_name.trim().is_empty() {
            return Err(ValidationError::EmptyField("sort_name"));
        }
        if self.pages < 0 {
            return Err(ValidationError::NegativePages {
                field: "pages",
                value: self.pages,
            });
        }
        Ok(())
    }
}

/// Container format of a file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MangaFormat {
    /// cbz/cbr/zip/rar style archive of images.
    Archive,
    /// Loose image file.
    Image,
    Epub,
    Pdf,
    Unknown,
}

impl MangaFormat {
    pub(crate) fn as_db(self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Image => "image",
            Self::Epub => "epub",
            Self::Pdf => "pdf",
            Self::Unknown => "unknown",
        }
    }

    pub(crate) fn parse_db(value: &str) -> Option<Self> {
        match value {
            "archive" => Some(Self::Archive),
            "image" => Some(Self::Image),
            "epub" => Some(Self::Epub),
            "pdf" => Some(Self::Pdf),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// A file backing one volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MangaFile {
    pub id: MangaFileId,
    pub volume_id: VolumeId,
    pub file_path: String,
    pub pages: i32,
    pub format: MangaFormat,
}

impl MangaFile {
    pub fn new(
        volume_id: VolumeId,
        file_path: impl Into<String>,
        pages: i32,
        format: MangaFormat,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            volume_id,
            file_path: file_path.into(),
            pages,
            format,
        }
    }
}

/// One volume of a series, ordered by `number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: VolumeId,
    pub series_id: SeriesId,
    pub number: i32,
    pub name: String,
    pub pages: i32,
    /// Only populated by fetches that eagerly load files.
    pub files: Vec<MangaFile>,
}

impl Volume {
    /// Creates an empty volume; the name defaults to the volume number.
    pub fn new(series_id: SeriesId, number: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            series_id,
            number,
            name: number.to_string(),
            pages: 0,
            files: Vec::new(),
        }
    }

    /// Attaches a file and adds its pages to the volume total.
    ///
    /// Fails without attaching anything when the total would exceed `i32::MAX`.
    pub fn push_file(
        &mut self,
        file_path: impl Into<String>,
        pages: i32,
        format: MangaFormat,
    ) -> Result<(), ValidationError> {
        self.pages = self
            .pages
            .checked_add(pages)
            .ok_or(ValidationError::PagesOverflow {
                field: "pages",
                current: self.pages,
                added: pages,
            })?;
        self.files
            .push(MangaFile::new(self.id, file_path, pages, format));
        Ok(())
    }

    /// Checks the volume and every attached file.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pages < 0 {
            return Err(ValidationError::NegativePages {
                field: "pages",
                value: self.pages,
            });
        }
        for file in &self.files {
            if file.volume_id != self.id {
                return Err(ValidationError::ParentMismatch {
                    entity: "manga file",
                    expected: self.id,
                    actual: file.volume_id,
                });
            }
            if file.file_path.trim().is_empty() {
                return Err(ValidationError::EmptyField("file_path"));
            }
            if file.pages < 0 {
                return Err(ValidationError::NegativePages {
                    field: "file.pages",
                    value: file.pages,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MangaFormat, Series, Volume};
    use crate::model::validation::ValidationError;
    use uuid::Uuid;

    #[test]
    fn new_series_copies_name_into_sort_and_original_name() {
        let series = Series::new(Uuid::new_v4(), "Berserk");
        assert_eq!(series.sort_name, "Berserk");
        assert_eq!(series.original_name, "Berserk");
        assert!(series.validate().is_ok());
    }

    #[test]
    fn blank_name_is_rejected() {
        let series = Series::new(Uuid::new_v4(), "   ");
        assert_eq!(series.validate(), Err(ValidationError::EmptyField("name")));
    }

    #[test]
    fn push_file_accumulates_pages() {
        let mut volume = Volume::new(Uuid::new_v4(), 1);
        volume.push_file("/library/a/v01.cbz", 180, MangaFormat::Archive).unwrap();
        volume.push_file("/library/a/extra.cbz", 20, MangaFormat::Archive).unwrap();
        assert_eq!(volume.pages, 200);
        assert!(volume.validate().is_ok());
    }

    #[test]
    fn push_file_rejects_page_total_overflow() {
        let mut volume = Volume::new(Uuid::new_v4(), 1);
        volume
            .push_file("/library/a/huge.cbz", i32::MAX, MangaFormat::Archive)
            .unwrap();

        let err = volume
            .push_file("/library/a/one-more.cbz", 1, MangaFormat::Archive)
            .unwrap_err();

        assert!(matches!(err, ValidationError::PagesOverflow { added: 1, .. }));
        assert_eq!(volume.pages, i32::MAX);
        assert_eq!(volume.files.len(), 1);
    }

    #[test]
    fn file_of_another_volume_is_rejected() {
        let mut volume = Volume::new(Uuid::new_v4(), 1);
        let foreign = Volume::new(volume.series_id, 2);
        volume.push_file("/library/a/v01.cbz", 10, MangaFormat::Archive).unwrap();
        volume.files[0].volume_id = foreign.id;
        assert!(matches!(
            volume.validate(),
            Err(ValidationError::ParentMismatch { .. })
        ));
    }

    #[test]
    fn format_db_names_are_stable() {
        for format in [
            MangaFormat::Archive,
            MangaFormat::Image,
            MangaFormat::Epub,
            MangaFormat::Pdf,
            MangaFormat::Unknown,
        ] {
            assert_eq!(MangaFormat::parse_db(format.as_db()), Some(format));
        }
        assert_eq!(MangaFormat::parse_db("cbz"), None);
    }
}
