use crate::drm::{self, BLOCK_LENGTH, DrmLicense, Encryption};
use crate::errors::{DecodingError, ReadResult};
use crate::resource::{Resource, ResourceProperties, Transform, TransformingResource};
use crate::util::sync::CloseFlag;
use async_trait::async_trait;
use bytes::Bytes;
use flate2::read::DeflateDecoder;
use std::io::Read;
use std::ops::Range;
use std::sync::Arc;

/// Upper bound of the preallocated inflate buffer, relative to the compressed length.
const MAX_EXPECTED_RATIO: u64 = 4;

/// Deciphers the whole content, strips the padding, then inflates if needed.
struct FullDecryption {
    license: Arc<dyn DrmLicense>,
    inflate: bool,
    original_length: Option<u64>,
}

#[async_trait]
impl Transform for FullDecryption {
    async fn transform(&self, content: Bytes) -> ReadResult<Bytes> {
        tracing::trace!(length = content.len(), "deciphering full content");
        let plaintext = drm::decipher(self.license.as_ref(), content).await?;
        let plaintext = strip_padding(plaintext)?;

        if !self.inflate {
            return Ok(plaintext);
        }
        // The declared length may be bogus
        let compressed = plaintext.len() as u64;
        let capacity = self
            .original_length
            .map_or(compressed, |length| length.min(compressed * MAX_EXPECTED_RATIO));
        let mut inflated = Vec::with_capacity(capacity as usize);

        DeflateDecoder::new(plaintext.as_ref())
            .read_to_end(&mut inflated)
            .map_err(|error| DecodingError::Inflate(Arc::new(error)))?;
        Ok(Bytes::from(inflated))
    }
}

/// Removes the trailing padding, whose length is given by the last byte.
fn strip_padding(plaintext: Bytes) -> ReadResult<Bytes> {
    let padding = plaintext.last().copied().unwrap_or_default() as usize;

    if padding == 0 || padding as u64 > BLOCK_LENGTH || padding > plaintext.len() {
        return Err(DecodingError::Decryption(format!("invalid padding length {padding}")).into());
    }
    Ok(plaintext.slice(..plaintext.len() - padding))
}

/// A [`Resource`] decrypting the entire protected content at once.
///
/// Required when the content was compressed before encryption,
/// as offsets within the compressed stream cannot be predicted,
/// or when it is not encrypted with AES-CBC.
/// The plaintext is computed on first access and cached.
///
/// [`estimated_length`](Resource::estimated_length) prefers the declared
/// [`Encryption::original_length`] over deciphering the content.
pub struct FullDecryptResource<R> {
    inner: TransformingResource<R, FullDecryption>,
    original_length: Option<u64>,
    closed: CloseFlag,
}

impl<R: Resource> FullDecryptResource<R> {
    /// Wraps the protected `inner` resource described by `encryption`.
    pub fn new(inner: R, encryption: &Encryption, license: Arc<dyn DrmLicense>) -> Self {
        let transform = FullDecryption {
            license,
            inflate: encryption.is_deflated(),
            original_length: encryption.original_length,
        };

        Self {
            inner: TransformingResource::new(inner, transform),
            original_length: encryption.original_length,
            closed: CloseFlag::new(),
        }
    }
}

#[async_trait]
impl<R: Resource> Resource for FullDecryptResource<R> {
    fn href(&self) -> Option<&str> {
        self.inner.href()
    }

    async fn properties(&self) -> ReadResult<ResourceProperties> {
        self.inner.properties().await
    }

    async fn estimated_length(&self) -> ReadResult<Option<u64>> {
        self.closed.ensure_open()?;

        match self.original_length {
            Some(length) => Ok(Some(length)),
            None => self.inner.estimated_length().await,
        }
    }

    async fn read(&self, range: Option<Range<u64>>) -> ReadResult<Bytes> {
        self.closed.ensure_open()?;
        self.inner.read(range).await
    }

    async fn close(&self) {
        if self.closed.close() {
            self.inner.close().await;
        }
    }
}
