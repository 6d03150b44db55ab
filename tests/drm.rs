use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use async_trait::async_trait;
use bytes::Bytes;
use flate2::Compression;
use flate2::write::DeflateEncoder;
use parking_lot::Mutex;
use rbook_fetch::archive::zip::ZipContainer;
use rbook_fetch::drm::{self, DrmError, DrmLicense, Encryption};
use rbook_fetch::errors::{AccessError, ReadError, ReadResult};
use rbook_fetch::resource::{BufferResource, Resource};
use rbook_fetch::{Container, ResourceExt};
use std::io::Write;
use std::ops::Range;
use std::sync::Arc;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const KEY: [u8; 32] = *b"0123456789abcdef0123456789abcdef";
const IV: [u8; 16] = *b"initialization v";

/// A license holding the content key in the clear.
struct TestLicense;

#[async_trait]
impl DrmLicense for TestLicense {
    async fn decipher(&self, data: Bytes) -> Result<Bytes, DrmError> {
        if data.len() < 16 {
            return Err(DrmError::Decipher("missing initialization vector".to_owned()));
        }
        let (iv, ciphertext) = data.split_at(16);
        let decryptor = Aes256CbcDec::new_from_slices(&KEY, iv)
            .map_err(|error| DrmError::Decipher(error.to_string()))?;

        decryptor
            .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
            .map(Bytes::from)
            .map_err(|error| DrmError::Decipher(error.to_string()))
    }
}

fn license() -> Option<Arc<dyn DrmLicense>> {
    Some(Arc::new(TestLicense))
}

/// AES-256-CBC with PKCS#7 padding, prefixed by the initialization vector.
fn encrypt(plaintext: &[u8]) -> Vec<u8> {
    let encryptor = Aes256CbcEnc::new_from_slices(&KEY, &IV).unwrap();
    let mut encrypted = IV.to_vec();
    encrypted.extend(encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext));
    encrypted
}

fn deflate(content: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap()
}

fn plaintext(length: usize) -> Vec<u8> {
    (0..length).map(|i| (i * 7 % 251) as u8).collect()
}

/// Records the ranges requested from the wrapped resource.
struct Recording<R> {
    inner: R,
    ranges: Arc<Mutex<Vec<Option<Range<u64>>>>>,
}

#[async_trait]
impl<R: Resource> Resource for Recording<R> {
    fn href(&self) -> Option<&str> {
        self.inner.href()
    }

    async fn estimated_length(&self) -> ReadResult<Option<u64>> {
        self.inner.estimated_length().await
    }

    async fn read(&self, range: Option<Range<u64>>) -> ReadResult<Bytes> {
        self.ranges.lock().push(range.clone());
        self.inner.read(range).await
    }

    async fn close(&self) {
        self.inner.close().await
    }
}

#[tokio::test]
async fn test_cbc_ranges() {
    let cbc = Encryption::new(Encryption::AES_256_CBC);

    // A multiple of 16 is padded with a full block
    for length in [1, 15, 16, 17, 31, 32, 1000] {
        let content = plaintext(length);
        let resource = BufferResource::new(encrypt(&content)).with_href("c1.xhtml");
        let resource = drm::decrypt(resource, &cbc, license());

        assert_eq!(Some("c1.xhtml"), resource.href());
        assert_eq!(Some(length as u64), resource.estimated_length().await.unwrap());
        assert_eq!(content, resource.read(None).await.unwrap());

        let length = length as u64;
        #[rustfmt::skip]
        let ranges = [
            0..1, 0..16, 15..17, 16..32, 5..length - 1,
            length - 1..length, length / 2..length + 100, 123..456,
        ];

        for range in ranges {
            let clamped = range.start.min(length) as usize..range.end.min(length) as usize;
            let expect_bytes = content.get(clamped).unwrap_or_default();

            let bytes = resource.read(Some(range.clone())).await.unwrap();
            assert_eq!(expect_bytes, bytes, "{range:?}");
        }
        assert!(resource.read(Some(length..length + 16)).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_cbc_reads_covering_blocks() {
    let content = plaintext(1000);
    let ranges = Arc::new(Mutex::new(Vec::new()));
    let resource = Recording {
        inner: BufferResource::new(encrypt(&content)),
        ranges: ranges.clone(),
    };
    let resource = drm::decrypt(resource, &Encryption::new(Encryption::AES_256_CBC), license());

    assert_eq!(&content[100..110], resource.read(Some(100..110)).await.unwrap());
    assert_eq!(&content[32..48], resource.read(Some(32..48)).await.unwrap());

    // 1000 bytes of content padded to 1008, preceded by the initialization vector
    #[rustfmt::skip]
    let expected = [
        Some(992..1024),
        Some(96..128),
        Some(32..64),
    ];
    assert_eq!(expected.to_vec(), *ranges.lock());
}

#[tokio::test]
async fn test_cbc_invalid_ciphertext() {
    let cbc = Encryption::new(Encryption::AES_256_CBC);

    for ciphertext in [IV.to_vec(), vec![0; 40], Vec::new()] {
        let resource = drm::decrypt(BufferResource::new(ciphertext), &cbc, license());

        assert!(resource.estimated_length().await.unwrap_err().is_decoding());
        assert!(resource.read(Some(0..4)).await.unwrap_err().is_decoding());
    }
}

#[tokio::test]
async fn test_full_deflated() {
    let content = plaintext(5_000);
    let encryption = Encryption::new(Encryption::AES_256_CBC)
        .with_compression("deflate")
        .with_original_length(content.len() as u64);
    let ranges = Arc::new(Mutex::new(Vec::new()));
    let resource = Recording {
        inner: BufferResource::new(encrypt(&deflate(&content))),
        ranges: ranges.clone(),
    };
    let resource = drm::decrypt(resource, &encryption, license());

    assert_eq!(Some(5_000), resource.estimated_length().await.unwrap());
    assert_eq!(&content[1_234..2_345], resource.read(Some(1_234..2_345)).await.unwrap());
    assert_eq!(&content[4_990..], resource.read(Some(4_990..6_000)).await.unwrap());
    assert_eq!(content, resource.read(None).await.unwrap());

    // Deciphered once, then cached
    assert_eq!(vec![None], *ranges.lock());
}

#[tokio::test]
async fn test_full_uncompressed() {
    let content = b"Not encrypted with a block-seekable algorithm.".to_vec();
    // Any algorithm other than AES-256-CBC is deciphered as a whole
    let encryption = Encryption::new("urn:example:whole-content");
    let resource = drm::decrypt(BufferResource::new(encrypt(&content)), &encryption, license());

    assert_eq!(Some(content.len() as u64), resource.estimated_length().await.unwrap());
    assert_eq!(&content[4..13], resource.read(Some(4..13)).await.unwrap());
}

#[tokio::test]
async fn test_full_invalid() {
    let encryption = Encryption::new(Encryption::AES_256_CBC).with_compression("deflate");

    // Deciphered, although the plaintext is not a deflate stream
    let not_deflated = BufferResource::new(encrypt(&[0xFF; 64]));
    let resource = drm::decrypt(not_deflated, &encryption, license());
    assert!(resource.read(None).await.unwrap_err().is_decoding());

    let truncated = BufferResource::new(IV.to_vec());
    let resource = drm::decrypt(truncated, &encryption, license());
    assert!(resource.read(Some(0..1)).await.unwrap_err().is_decoding());
}

#[tokio::test]
async fn test_full_bogus_original_length() {
    let content = plaintext(2_000);
    let encryption = Encryption::new(Encryption::AES_256_CBC)
        .with_compression("deflate")
        .with_original_length(u64::MAX);

    // The declared length is reported, while reads serve the actual content
    let deflated = BufferResource::new(encrypt(&deflate(&content)));
    let resource = drm::decrypt(deflated, &encryption, license());
    assert_eq!(Some(u64::MAX), resource.estimated_length().await.unwrap());
    assert_eq!(content, resource.read(None).await.unwrap());
    assert_eq!(&content[1_990..], resource.read(Some(1_990..u64::MAX)).await.unwrap());

    let not_deflated = BufferResource::new(encrypt(&[0xFF; 64]));
    let resource = drm::decrypt(not_deflated, &encryption, license());
    assert!(resource.read(None).await.unwrap_err().is_decoding());
}

#[tokio::test]
async fn test_no_license() {
    let resource = BufferResource::new(encrypt(b"secret")).with_href("secret.xhtml");
    let resource = drm::decrypt(resource, &Encryption::new(Encryption::AES_256_CBC), None);

    assert_eq!(Some("secret.xhtml"), resource.href());
    assert!(matches!(
        resource.read(None).await,
        Err(ReadError::Access(AccessError::Forbidden(_)))
    ));
    assert!(resource.estimated_length().await.unwrap_err().is_access());
}

#[tokio::test]
async fn test_protected_zip_entry() {
    use zip::CompressionMethod;
    use zip::write::SimpleFileOptions;

    let content = plaintext(3_000);
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let stored = || SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    writer.start_file("OEBPS/protected.xhtml", stored()).unwrap();
    writer.write_all(&encrypt(&content)).unwrap();
    writer.start_file("OEBPS/open.xhtml", stored()).unwrap();
    writer.write_all(b"<html/>").unwrap();
    let bytes = writer.finish().unwrap().into_inner();

    let container = ZipContainer::read(bytes).unwrap();
    let encryption = Encryption::new(Encryption::AES_256_CBC);
    let entry = container.get("OEBPS/protected.xhtml").unwrap();
    let resource = drm::decrypt(entry, &encryption, license());

    assert_eq!(Some("OEBPS/protected.xhtml"), resource.href());
    assert_eq!(&content[2_000..2_100], resource.read(Some(2_000..2_100)).await.unwrap());
    assert_eq!(&content[10..20], resource.read(Some(10..20)).await.unwrap());

    // A missing license only affects the protected resource
    let locked = drm::decrypt(container.get("OEBPS/protected.xhtml").unwrap(), &encryption, None);
    assert!(locked.read(None).await.unwrap_err().is_access());
    let open = container.get("OEBPS/open.xhtml").unwrap();
    assert_eq!("<html/>", open.read_as_string().await.unwrap());

    resource.close().await;
    assert!(resource.read(Some(0..1)).await.unwrap_err().is_access());
}
