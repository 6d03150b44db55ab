use crate::archive::{STORED_TEXT, example_zip, write_example_dir, write_temp_file, zip_bytes};
use ::zip::CompressionMethod;
use rbook_fetch::archive::opener::{
    ArchiveOpener, CompositeArchiveOpener, ExplodedArchiveOpener, ZipArchiveOpener,
};
use rbook_fetch::errors::{ArchiveOpenError, ArchiveSniffOpenError, ReadError};
use rbook_fetch::resource::{BufferResource, FileResource};
use rbook_fetch::{Container, MediaType, Resource};
use std::sync::Arc;

#[tokio::test]
async fn test_sniff_zip_file() {
    let file = write_temp_file(&example_zip());
    let resource = Arc::new(FileResource::new(file.path()));

    let asset = CompositeArchiveOpener::default()
        .sniff_open(resource)
        .await
        .unwrap();

    // Refined through the `mimetype` entry
    assert_eq!(MediaType::EPUB, asset.media_type);
    assert_eq!(4, asset.container.entries().len());

    let resource = asset.container.get("A/file.txt").unwrap();
    assert_eq!(STORED_TEXT, resource.read(None).await.unwrap());
}

#[tokio::test]
async fn test_sniff_zip_in_memory() {
    let bytes = zip_bytes(&[("a.txt", &b"a"[..], CompressionMethod::Deflated)]);
    let resource = Arc::new(BufferResource::new(bytes));

    let asset = ZipArchiveOpener::new().sniff_open(resource).await.unwrap();
    assert_eq!(MediaType::ZIP, asset.media_type);
    assert_eq!(&b"a"[..], asset.container.get("a.txt").unwrap().read(None).await.unwrap());
}

#[tokio::test]
async fn test_sniff_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_example_dir(dir.path());
    let resource = Arc::new(FileResource::new(dir.path()));

    let asset = CompositeArchiveOpener::default()
        .sniff_open(resource.clone())
        .await
        .unwrap();
    assert_eq!(MediaType::DIRECTORY, asset.media_type);
    assert!(asset.container.get("A/chapter.txt").is_some());

    let zip_only = ZipArchiveOpener::new().sniff_open(resource).await;
    assert!(matches!(zip_only, Err(ArchiveSniffOpenError::FormatNotRecognized)));
}

#[tokio::test]
async fn test_sniff_not_recognized() {
    let opener = CompositeArchiveOpener::default();

    for content in [&b"%PDF-1.7"[..], &b""[..], &b"PK"[..]] {
        let resource = Arc::new(BufferResource::new(content));
        let result = opener.sniff_open(resource).await;

        assert!(matches!(result, Err(ArchiveSniffOpenError::FormatNotRecognized)));
    }
}

#[tokio::test]
async fn test_open_known_format() {
    let opener = CompositeArchiveOpener::default();
    let resource = Arc::new(BufferResource::new(example_zip()));

    // The requested media type is kept as is
    let asset = opener.open(resource, &MediaType::EPUB).await.unwrap();
    assert_eq!(MediaType::EPUB, asset.media_type);
    assert!(asset.container.get("mimetype").is_some());

    let dir = tempfile::tempdir().unwrap();
    write_example_dir(dir.path());
    let resource = Arc::new(FileResource::new(dir.path()));

    let asset = opener.open(resource, &MediaType::DIRECTORY).await.unwrap();
    assert_eq!(MediaType::DIRECTORY, asset.media_type);
}

#[tokio::test]
async fn test_open_errors() {
    let opener = CompositeArchiveOpener::default();

    let pdf = Arc::new(BufferResource::new("%PDF-1.7"));
    let unsupported = opener.open(pdf.clone(), &MediaType::from("application/pdf")).await;
    assert!(matches!(unsupported, Err(ArchiveOpenError::FormatNotSupported(_))));

    // Supported, although the content is not a ZIP archive
    let not_a_zip = opener.open(pdf, &MediaType::EPUB).await.unwrap_err();
    assert!(matches!(not_a_zip, ArchiveOpenError::Reading(ReadError::Decoding(_))));

    let missing = Arc::new(FileResource::new("tests/missing.epub"));
    let missing = opener.open(missing, &MediaType::EPUB).await.unwrap_err();
    assert!(matches!(missing, ArchiveOpenError::Reading(error) if error.is_access()));

    // A file is never an exploded archive
    let file = write_temp_file(&example_zip());
    let resource = Arc::new(FileResource::new(file.path()));
    let result = ExplodedArchiveOpener.open(resource, &MediaType::DIRECTORY).await;
    assert!(matches!(result, Err(ArchiveOpenError::FormatNotSupported(_))));
}
