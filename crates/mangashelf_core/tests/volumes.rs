use mangashelf_core::db::open_db_in_memory;
use mangashelf_core::{
    MangaFormat, RepoError, Series, SeriesRepository, SqliteSeriesRepository, Volume,
};
use uuid::Uuid;

fn seeded_series(repo: &mut SqliteSeriesRepository<'_>, name: &str) -> Series {
    let series = Series::new(Uuid::new_v4(), name);
    repo.add(series.clone()).unwrap();
    series
}

#[test]
fn volumes_are_ordered_by_number_with_files_loaded() {
    let conn = open_db_in_memory().unwrap();
    let mut repo = SqliteSeriesRepository::try_new(&conn).unwrap();
    let series = seeded_series(&mut repo, "Vagabond");

    let mut third = Volume::new(series.id, 3);
    third.push_file("/library/vagabond/v03.cbz", 200, MangaFormat::Archive).unwrap();
    let mut first = Volume::new(series.id, 1);
    first.push_file("/library/vagabond/v01b.cbz", 90, MangaFormat::Archive).unwrap();
    first.push_file("/library/vagabond/v01a.cbz", 100, MangaFormat::Archive).unwrap();
    let second = Volume::new(series.id, 2);
    for volume in [third, first.clone(), second] {
        repo.add_volume(volume).unwrap();
    }
    repo.save_all().unwrap();

    let volumes = repo.get_volumes(series.id).unwrap();

    let numbers: Vec<i32> = volumes.iter().map(|volume| volume.number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(volumes[0].id, first.id);
    assert_eq!(volumes[0].pages, 190);
    let paths: Vec<&str> = volumes[0]
        .files
        .iter()
        .map(|file| file.file_path.as_str())
        .collect();
    assert_eq!(
        paths,
        vec!["/library/vagabond/v01a.cbz", "/library/vagabond/v01b.cbz"]
    );
    assert!(volumes[1].files.is_empty());
    assert_eq!(volumes[2].files.len(), 1);
}

#[test]
fn volumes_of_unknown_series_are_empty() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSeriesRepository::try_new(&conn).unwrap();

    assert!(repo.get_volumes(Uuid::new_v4()).unwrap().is_empty());
}

#[test]
fn get_volume_loads_files_and_get_volume_by_id_does_not() {
    let conn = open_db_in_memory().unwrap();
    let mut repo = SqliteSeriesRepository::try_new(&conn).unwrap();
    let series = seeded_series(&mut repo, "Akira");
    let mut volume = Volume::new(series.id, 1);
    volume.push_file("/library/akira/v01.pdf", 350, MangaFormat::Pdf).unwrap();
    repo.add_volume(volume.clone()).unwrap();
    repo.save_all().unwrap();

    let with_files = repo.get_volume(volume.id).unwrap();
    assert_eq!(with_files, Some(volume.clone()));

    let bare = repo.get_volume_by_id(volume.id).unwrap().unwrap();
    assert!(bare.files.is_empty());
    assert_eq!(bare.pages, 350);

    assert_eq!(repo.get_volume(Uuid::new_v4()).unwrap(), None);
    assert_eq!(repo.get_volume_by_id(Uuid::new_v4()).unwrap(), None);
}

#[test]
fn volumes_for_several_series_are_fetched_in_bulk() {
    let conn = open_db_in_memory().unwrap();
    let mut repo = SqliteSeriesRepository::try_new(&conn).unwrap();
    let first = seeded_series(&mut repo, "First");
    let second = seeded_series(&mut repo, "Second");
    let excluded = seeded_series(&mut repo, "Excluded");
    for (series_id, number) in [(first.id, 1), (first.id, 2), (second.id, 1), (excluded.id, 1)] {
        repo.add_volume(Volume::new(series_id, number)).unwrap();
    }
    repo.save_all().unwrap();

    let volumes = repo
        .get_volumes_for_series(&[first.id, second.id, first.id])
        .unwrap();

    assert_eq!(volumes.len(), 3);
    assert!(volumes
        .iter()
        .all(|volume| volume.series_id != excluded.id));
    assert!(repo.get_volumes_for_series(&[]).unwrap().is_empty());
}

#[test]
fn volume_staged_for_unknown_series_fails_on_save() {
    let conn = open_db_in_memory().unwrap();
    let mut repo = SqliteSeriesRepository::try_new(&conn).unwrap();
    repo.add_volume(Volume::new(Uuid::new_v4(), 1)).unwrap();

    let err = repo.save_all().unwrap_err();

    assert!(matches!(err, RepoError::Db(_)));
    assert!(repo.has_changes());
}

#[test]
fn volume_dto_requires_exactly_one_match() {
    let conn = open_db_in_memory().unwrap();
    let mut repo = SqliteSeriesRepository::try_new(&conn).unwrap();
    let series = seeded_series(&mut repo, "Blame!");
    let mut volume = Volume::new(series.id, 1);
    volume.push_file("/library/blame/v01.epub", 40, MangaFormat::Epub).unwrap();
    repo.add_volume(volume.clone()).unwrap();
    repo.save_all().unwrap();

    let dto = repo.get_volume_dto(volume.id, Uuid::new_v4()).unwrap();
    assert_eq!(dto.id, volume.id);
    assert_eq!(dto.series_id, series.id);
    assert_eq!(dto.pages_read, 0);
    assert_eq!(dto.files.len(), 1);
    assert_eq!(dto.files[0].format, MangaFormat::Epub);

    let err = repo
        .get_volume_dto(Uuid::new_v4(), Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Cardinality {
            entity: "volume",
            matched: 0,
            ..
        }
    ));
}

#[test]
fn volume_dto_serializes_with_camel_case_keys() {
    let conn = open_db_in_memory().unwrap();
    let mut repo = SqliteSeriesRepository::try_new(&conn).unwrap();
    let series = seeded_series(&mut repo, "Dorohedoro");
    let mut volume = Volume::new(series.id, 1);
    volume.push_file("/library/dorohedoro/v01.cbz", 180, MangaFormat::Archive).unwrap();
    repo.add_volume(volume.clone()).unwrap();
    repo.save_all().unwrap();

    let dtos = repo.get_volumes_dto(series.id, Uuid::new_v4()).unwrap();
    let json = serde_json::to_value(&dtos).unwrap();

    assert_eq!(json[0]["seriesId"], series.id.to_string());
    assert_eq!(json[0]["pagesRead"], 0);
    assert_eq!(json[0]["files"][0]["filePath"], "/library/dorohedoro/v01.cbz");
}

#[test]
fn update_volume_rewrites_row_and_keeps_files() {
    let conn = open_db_in_memory().unwrap();
    let mut repo = SqliteSeriesRepository::try_new(&conn).unwrap();
    let series = seeded_series(&mut repo, "Pluto");
    let mut volume = Volume::new(series.id, 1);
    volume.push_file("/library/pluto/v01.cbz", 180, MangaFormat::Archive).unwrap();
    repo.add_volume(volume.clone()).unwrap();
    repo.save_all().unwrap();

    let mut rescanned = repo.get_volume_by_id(volume.id).unwrap().unwrap();
    rescanned.name = "Volume 1".to_string();
    rescanned.pages = 192;
    repo.update_volume(rescanned).unwrap();
    assert!(repo.save_all().unwrap());

    let stored = repo.get_volume(volume.id).unwrap().unwrap();
    assert_eq!(stored.name, "Volume 1");
    assert_eq!(stored.pages, 192);
    assert_eq!(stored.files, volume.files);
}

#[test]
fn update_of_vanished_volume_is_conflict() {
    let conn = open_db_in_memory().unwrap();
    let mut repo = SqliteSeriesRepository::try_new(&conn).unwrap();
    let series = seeded_series(&mut repo, "Pluto");
    let ghost = Volume::new(series.id, 9);
    repo.update_volume(ghost.clone()).unwrap();

    let err = repo.save_all().unwrap_err();

    assert!(matches!(
        err,
        RepoError::ConcurrencyConflict { entity: "volume", id } if id == ghost.id
    ));
    assert!(repo.get_series_by_name("Pluto").unwrap().is_none());
    assert!(repo.has_changes());
}

#[test]
fn files_for_volume_are_ordered_by_path() {
    let conn = open_db_in_memory().unwrap();
    let mut repo = SqliteSeriesRepository::try_new(&conn).unwrap();
    let series = seeded_series(&mut repo, "Ajin");
    let mut volume = Volume::new(series.id, 1);
    volume.push_file("/library/ajin/v01-b.cbz", 50, MangaFormat::Archive).unwrap();
    volume.push_file("/library/ajin/v01-a.pdf", 60, MangaFormat::Pdf).unwrap();
    repo.add_volume(volume.clone()).unwrap();
    repo.add_volume(Volume::new(series.id, 2)).unwrap();
    repo.save_all().unwrap();

    let files = repo.get_files_for_volume(volume.id).unwrap();

    let paths: Vec<&str> = files.iter().map(|file| file.file_path.as_str()).collect();
    assert_eq!(paths, vec!["/library/ajin/v01-a.pdf", "/library/ajin/v01-b.cbz"]);
    assert_eq!(files[0].format, MangaFormat::Pdf);
    assert!(files.iter().all(|file| file.volume_id == volume.id));
    assert!(repo.get_files_for_volume(Uuid::new_v4()).unwrap().is_empty());
}
