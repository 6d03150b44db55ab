use crate::archive::{chapter_text, example_zip, write_example_dir, write_temp_file};
use rbook_fetch::archive::directory::DirectoryContainer;
use rbook_fetch::errors::ArchiveError;
use rbook_fetch::{Container, Resource};

#[tokio::test]
async fn test_matches_zip() {
    let dir = tempfile::tempdir().unwrap();
    write_example_dir(dir.path());
    let file = write_temp_file(&example_zip());

    let exploded = rbook_fetch::archive::open_container(dir.path()).unwrap();
    let zipped = rbook_fetch::archive::open_container(file.path()).unwrap();
    assert_eq!(zipped.entries(), exploded.entries());

    for entry in exploded.entries() {
        let href = entry.to_encoded();
        let content_a = exploded.get(&href).unwrap().read(None).await.unwrap();
        let content_b = zipped.get(&href).unwrap().read(None).await.unwrap();

        assert_eq!(content_a, content_b, "{entry}");
    }
}

#[tokio::test]
async fn test_read_ranges() {
    let dir = tempfile::tempdir().unwrap();
    write_example_dir(dir.path());
    let chapter = chapter_text();
    let length = chapter.len() as u64;

    let container = DirectoryContainer::new(dir.path()).unwrap();
    let resource = container.get("A/chapter.txt").unwrap();

    assert_eq!(Some("A/chapter.txt"), resource.href());
    assert_eq!(Some(length), resource.estimated_length().await.unwrap());
    assert!(resource.source_path().unwrap().ends_with("A/chapter.txt"));

    assert_eq!(&chapter[500..600], resource.read(Some(500..600)).await.unwrap());
    assert_eq!(&chapter[10..20], resource.read(Some(10..20)).await.unwrap());
    let tail = resource.read(Some(length - 5..length + 5)).await.unwrap();
    assert_eq!(&chapter[chapter.len() - 5..], tail);
    assert!(resource.read(Some(length + 1..length + 2)).await.unwrap().is_empty());

    let properties = resource.properties().await.unwrap();
    assert_eq!(Some("chapter.txt"), properties.filename());
    assert_eq!(None, properties.archive());
}

#[tokio::test]
async fn test_removed_file() {
    let dir = tempfile::tempdir().unwrap();
    write_example_dir(dir.path());

    let container = DirectoryContainer::new(dir.path()).unwrap();
    let resource = container.get("A/file.txt").unwrap();
    std::fs::remove_file(dir.path().join("A/file.txt")).unwrap();

    // The entry set is fixed at creation, while the file is only opened on read
    assert!(container.entries().iter().any(|entry| entry.as_str() == "A/file.txt"));
    assert!(resource.read(None).await.unwrap_err().is_access());
}

#[test]
fn test_open_errors() {
    let file = write_temp_file(b"not a directory");
    let not_a_directory = DirectoryContainer::new(file.path()).unwrap_err();
    assert!(matches!(not_a_directory, ArchiveError::Reading { .. }));

    let missing = rbook_fetch::archive::open_container("tests/missing");
    assert!(matches!(missing, Err(ArchiveError::FileNotFound { .. })));
}
