use crate::archive::{
    MIMETYPE, STORED_TEXT, chapter_text, example_zip, write_temp_file, zip_bytes,
};
use ::zip::CompressionMethod;
use rbook_fetch::archive::zip::{EntryCompression, ZipContainer, ZipSettings};
use rbook_fetch::errors::{AccessError, ArchiveError, ReadError};
use rbook_fetch::{Container, ContainerExt, Resource, ResourceExt};

#[test]
fn test_entries() {
    let container = ZipContainer::read(example_zip()).unwrap();
    let entries = container
        .entries()
        .iter()
        .map(|entry| entry.as_str())
        .collect::<Vec<_>>();

    assert_eq!(
        vec!["A/chapter.txt", "A/file name.txt", "A/file.txt", "mimetype"],
        entries
    );

    let chapter = container.entry("A/chapter.txt").unwrap();
    assert_eq!(&EntryCompression::Deflated, chapter.compression());
    assert_eq!(chapter_text().len() as u64, chapter.uncompressed_length());
    assert!(chapter.compressed_length().unwrap() < chapter.uncompressed_length());

    let stored = container.entry("A/file.txt").unwrap();
    assert_eq!(&EntryCompression::Stored, stored.compression());
    assert_eq!(None, stored.compressed_length());
}

#[test]
fn test_directory_entries_omitted() {
    let mut writer = ::zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = ::zip::write::SimpleFileOptions::default;
    writer.add_directory("empty/", options()).unwrap();
    writer.start_file("empty.txt", options()).unwrap();
    let bytes = writer.finish().unwrap().into_inner();

    let container = ZipContainer::read(bytes).unwrap();
    assert_eq!(1, container.entries().len());
    assert!(container.contains("empty.txt"));
    assert!(container.get("empty/").is_none());
}

#[tokio::test]
async fn test_lookup_normalization() {
    let container = ZipContainer::read(example_zip()).unwrap();

    #[rustfmt::skip]
    let expected = [
        (Some(STORED_TEXT), "A/file.txt"),
        (Some(STORED_TEXT), "/A/./file.txt#fragment"),
        (Some(STORED_TEXT), "A/B/../file.txt?query"),
        (Some(&b"spaced"[..]), "A/file%20name.txt"),
        (Some(&b"spaced"[..]), "A/file name.txt"),
        (None, "A/FILE.txt"),
        (None, "../A/file.txt"),
        (None, "A"),
    ];

    for (expect_content, href) in expected {
        match container.get(href) {
            Some(resource) => {
                let bytes = resource.read(None).await.unwrap();
                assert_eq!(expect_content, Some(&bytes[..]), "{href}");
            }
            None => assert_eq!(None, expect_content, "{href}"),
        }
    }
}

#[tokio::test]
async fn test_read_stored_ranges() {
    let container = ZipContainer::read(example_zip()).unwrap();
    let resource = container.get("A/file.txt").unwrap();

    assert_eq!(Some("A/file.txt"), resource.href());
    assert_eq!(Some(20), resource.estimated_length().await.unwrap());

    #[rustfmt::skip]
    let expected = [
        (STORED_TEXT, None),
        (&b"Hello"[..], Some(0..5)),
        (&b"file"[..], Some(11..15)),
        (&b"e.txt!"[..], Some(14..20)),
        (&b"txt!"[..], Some(16..1000)),
        (&b""[..], Some(20..30)),
        (&b""[..], Some(9..3)),
        // Backward
        (&b"from"[..], Some(6..10)),
    ];

    for (expect_bytes, range) in expected {
        assert_eq!(expect_bytes, resource.read(range).await.unwrap());
    }
}

#[tokio::test]
async fn test_read_stored_without_seeking() {
    let settings = ZipSettings::builder().seek_stored_entries(false).build();
    let container = ZipContainer::read_with(example_zip(), settings).unwrap();
    let resource = container.get("A/file.txt").unwrap();

    assert_eq!(&b"file.txt"[..], resource.read(Some(11..19)).await.unwrap());
    assert_eq!(&b"Hello"[..], resource.read(Some(0..5)).await.unwrap());
    assert_eq!(STORED_TEXT, resource.read(None).await.unwrap());
}

#[tokio::test]
async fn test_read_deflated_ranges() {
    let chapter = chapter_text();
    let length = chapter.len() as u64;
    let container = ZipContainer::read(example_zip()).unwrap();
    let resource = container.get("A/chapter.txt").unwrap();

    assert_eq!(Some(length), resource.estimated_length().await.unwrap());

    #[rustfmt::skip]
    let ranges = [
        0..100,
        // Forward within the open cursor
        100..250,
        length - 100..length,
        // Backward re-opens the entry
        5_000..5_100,
        0..length,
        12_345..12_346,
    ];

    for range in ranges {
        let expect_bytes = &chapter[range.start as usize..range.end as usize];
        assert_eq!(expect_bytes, resource.read(Some(range)).await.unwrap());
    }

    let tail = resource.read(Some(length - 10..length + 100)).await.unwrap();
    assert_eq!(&chapter[chapter.len() - 10..], tail);
    assert!(resource.read(Some(length..length + 1)).await.unwrap().is_empty());
    assert_eq!(chapter, resource.read(None).await.unwrap());
}

#[tokio::test]
async fn test_read_deflated_small_discard_buffer() {
    let chapter = chapter_text();
    let settings = ZipSettings::builder().discard_buffer_size(7).build();
    let container = ZipContainer::read_with(example_zip(), settings).unwrap();
    let resource = container.get("A/chapter.txt").unwrap();

    assert_eq!(&chapter[9_000..9_050], resource.read(Some(9_000..9_050)).await.unwrap());
    assert_eq!(&chapter[20_000..20_001], resource.read(Some(20_000..20_001)).await.unwrap());
}

#[tokio::test]
async fn test_read_from_file() {
    let file = write_temp_file(&example_zip());
    let container = ZipContainer::open(file.path()).unwrap();

    assert_eq!(file.path().to_str(), container.source_url());

    let mimetype = container.get("mimetype").unwrap();
    assert_eq!(MIMETYPE, mimetype.read(None).await.unwrap());
    assert_eq!(
        "application/epub+zip",
        mimetype.read_as_string().await.unwrap()
    );

    let chapter = container.get("A/chapter.txt").unwrap();
    assert_eq!(&chapter_text()[1_000..1_064], chapter.read(Some(1_000..1_064)).await.unwrap());
}

#[tokio::test]
async fn test_concurrent_reads() {
    let chapter = chapter_text();
    let container = ZipContainer::read(example_zip()).unwrap();
    let mut handles = Vec::new();

    for i in 0..4u64 {
        // Separate resources over the same entry
        let resource = container.get("A/chapter.txt").unwrap();
        handles.push(tokio::spawn(async move {
            let start = i * 6_000;
            let mut reads = Vec::new();

            for offset in [start, start + 10, start / 2] {
                let bytes = resource.read(Some(offset..offset + 500)).await.unwrap();
                reads.push((offset, bytes));
            }
            reads
        }));
    }

    for handle in handles {
        for (offset, bytes) in handle.await.unwrap() {
            let offset = offset as usize;
            assert_eq!(&chapter[offset..offset + 500], bytes);
        }
    }
}

#[tokio::test]
async fn test_close() {
    let container = ZipContainer::read(example_zip()).unwrap();
    let resource = container.get("A/chapter.txt").unwrap();
    assert_eq!(&chapter_text()[..4], resource.read(Some(0..4)).await.unwrap());

    container.close().await;
    container.close().await;

    assert!(container.get("A/file.txt").is_none());
    assert!(matches!(
        resource.read(Some(0..4)).await,
        Err(ReadError::Access(AccessError::Closed))
    ));
    assert!(resource.estimated_length().await.unwrap_err().is_access());
}

#[tokio::test]
async fn test_resource_close() {
    let container = ZipContainer::read(example_zip()).unwrap();
    let first = container.get("A/file.txt").unwrap();
    let second = container.get("A/file.txt").unwrap();

    first.close().await;
    first.close().await;

    assert!(first.read(None).await.unwrap_err().is_access());
    // Closing a resource leaves the container and other resources open
    assert_eq!(STORED_TEXT, second.read(None).await.unwrap());
    assert!(container.get("A/file.txt").is_some());
}

#[test]
fn test_open_errors() {
    let missing = ZipContainer::open("tests/missing.zip").unwrap_err();
    assert!(matches!(missing, ArchiveError::FileNotFound { .. }));

    let pdf = write_temp_file(b"%PDF-1.7 not a zip archive");
    let not_a_zip = ZipContainer::open(pdf.path()).unwrap_err();
    assert!(matches!(not_a_zip, ArchiveError::NotAZip { path: Some(_) }));

    let empty = ZipContainer::read(Vec::new()).unwrap_err();
    assert!(matches!(empty, ArchiveError::NotAZip { path: None }));

    // Valid signature, truncated central directory
    let mut corrupted = example_zip();
    corrupted.truncate(corrupted.len() - 30);
    let corrupted = ZipContainer::read(corrupted).unwrap_err();
    assert!(matches!(corrupted, ArchiveError::Reading { path: None, .. }));
}

#[test]
fn test_stored_length_mismatch() {
    let mut bytes = zip_bytes(&[
        ("a.txt", &b"first"[..], CompressionMethod::Stored),
        ("b.txt", &b"second"[..], CompressionMethod::Stored),
    ]);

    // Central directory header of `a.txt`, declaring a compressed size overlapping `b.txt`
    let header = bytes
        .windows(4)
        .position(|window| window == b"PK\x01\x02")
        .unwrap();
    bytes[header + 20..header + 24].copy_from_slice(&40u32.to_le_bytes());

    let result = ZipContainer::read(bytes);
    assert!(matches!(result, Err(ArchiveError::Reading { path: None, .. })));
}

#[tokio::test]
async fn test_properties() {
    let css = &b"p { margin: 0 }"[..];
    let bytes = zip_bytes(&[("OEBPS/style.css", css, CompressionMethod::Stored)]);
    let container = ZipContainer::read(bytes).unwrap();
    let properties = container.get("OEBPS/style.css").unwrap().properties().await.unwrap();

    assert_eq!(Some("style.css"), properties.filename());
    assert_eq!("text/css", properties.media_type().unwrap().as_str());

    let archive = properties.archive().unwrap();
    assert_eq!(15, archive.entry_length);
    assert!(!archive.is_entry_compressed);
}
