//! Data-access core for the MangaShelf library server.
//! Loads series and volumes, projects them into read models and overlays the
//! requesting user's reading state.

pub mod db;
pub mod logging;
pub mod model;
pub mod modifiers;
pub mod repo;

pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::dto::{MangaFileDto, SeriesDto, VolumeDto};
pub use model::series::{
    LibraryId, MangaFile, MangaFileId, MangaFormat, Series, SeriesId, Volume, VolumeId,
};
pub use model::user_state::{UserId, UserProgress, UserRating};
pub use model::validation::ValidationError;
pub use modifiers::{apply_series_modifiers, apply_volume_modifiers};
pub use repo::async_series_repo::AsyncSeriesRepository;
pub use repo::change_set::{ChangeSet, StagedChange};
pub use repo::series_repo::{SeriesRepository, SqliteSeriesRepository};
pub use repo::user_state_repo::{SqliteUserStateRepository, UserStateRepository};
pub use repo::{RepoError, RepoResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
