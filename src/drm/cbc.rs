use crate::drm::{self, BLOCK_LENGTH, DrmLicense};
use crate::errors::{DecodingError, ReadResult};
use crate::resource::{self, Resource, ResourceProperties};
use crate::util::sync::CloseFlag;
use async_trait::async_trait;
use bytes::Bytes;
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A [`Resource`] deciphering AES-CBC content block by block.
///
/// The ciphertext starts with a 16-byte initialization vector,
/// so each ciphertext block is the initialization vector of the next one.
/// A ranged read only deciphers the blocks covering the range,
/// preceded by one block serving as their initialization vector.
///
/// The plaintext length is computed once from the last two blocks,
/// whose trailing byte gives the padding length.
pub struct CbcDecryptResource<R> {
    inner: R,
    license: Arc<dyn DrmLicense>,
    length: OnceCell<ReadResult<u64>>,
    closed: CloseFlag,
}

impl<R: Resource> CbcDecryptResource<R> {
    /// Wraps the AES-CBC encrypted `inner` resource.
    pub fn new(inner: R, license: Arc<dyn DrmLicense>) -> Self {
        Self {
            inner,
            license,
            length: OnceCell::new(),
            closed: CloseFlag::new(),
        }
    }

    async fn plaintext_length(&self) -> ReadResult<u64> {
        self.length
            .get_or_init(|| self.compute_plaintext_length())
            .await
            .clone()
    }

    async fn compute_plaintext_length(&self) -> ReadResult<u64> {
        let length = match self.inner.estimated_length().await? {
            Some(length) => length,
            None => {
                tracing::warn!(
                    href = ?self.inner.href(),
                    "ciphertext length unknown, reading the entire resource"
                );
                self.inner.read(None).await?.len() as u64
            }
        };

        if length < 2 * BLOCK_LENGTH || length % BLOCK_LENGTH != 0 {
            return Err(DecodingError::Decryption(format!(
                "invalid ciphertext length {length}"
            ))
            .into());
        }
        let last_blocks = self.inner.read(Some(length - 2 * BLOCK_LENGTH..length)).await?;
        let plaintext = drm::decipher(self.license.as_ref(), last_blocks).await?;
        let padding = plaintext.last().copied().unwrap_or_default() as u64;

        if padding == 0 || padding > BLOCK_LENGTH {
            return Err(
                DecodingError::Decryption(format!("invalid padding length {padding}")).into(),
            );
        }
        Ok(length - BLOCK_LENGTH - padding)
    }
}

/// The ciphertext range covering the plaintext `range`,
/// including the preceding block used as initialization vector.
fn ciphertext_range(range: &Range<u64>) -> Range<u64> {
    let start = range.start / BLOCK_LENGTH * BLOCK_LENGTH;
    let end = range.end.div_ceil(BLOCK_LENGTH) * BLOCK_LENGTH + BLOCK_LENGTH;
    start..end
}

#[async_trait]
impl<R: Resource> Resource for CbcDecryptResource<R> {
    fn href(&self) -> Option<&str> {
        self.inner.href()
    }

    async fn properties(&self) -> ReadResult<ResourceProperties> {
        self.inner.properties().await
    }

    async fn estimated_length(&self) -> ReadResult<Option<u64>> {
        self.closed.ensure_open()?;
        self.plaintext_length().await.map(Some)
    }

    async fn read(&self, range: Option<Range<u64>>) -> ReadResult<Bytes> {
        self.closed.ensure_open()?;
        let range = resource::clamp_range(range, self.plaintext_length().await?);

        if range.is_empty() {
            return Ok(Bytes::new());
        }
        let encrypted = ciphertext_range(&range);
        tracing::trace!(?range, ?encrypted, "deciphering cbc blocks");

        let ciphertext = self.inner.read(Some(encrypted)).await?;
        let plaintext = drm::decipher(self.license.as_ref(), ciphertext).await?;

        let skip = (range.start % BLOCK_LENGTH) as usize;
        let end = skip + (range.end - range.start) as usize;

        if plaintext.len() < end {
            return Err(DecodingError::Decryption(format!(
                "deciphered {} bytes, expected at least {end}",
                plaintext.len()
            ))
            .into());
        }
        Ok(plaintext.slice(skip..end))
    }

    async fn close(&self) {
        if self.closed.close() {
            self.inner.close().await;
        }
    }
}
