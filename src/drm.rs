//! Decryption of DRM-protected resources.
//!
//! # Overview
//! A protected resource is decrypted through a [`DrmLicense`],
//! an oracle performing AES-CBC decryption on behalf of the caller.
//! Key material never crosses this boundary.
//!
//! [`decrypt`] selects a [`DecryptionStrategy`] from the [`Encryption`] details of a resource:
//! - [`DecryptionStrategy::Full`]: The content is compressed before encryption,
//!   or not encrypted with AES-CBC. Everything is deciphered at once, then cached.
//! - [`DecryptionStrategy::Block`]: The content is stored uncompressed and encrypted
//!   with AES-CBC. Any byte range is deciphered independently.

mod cbc;
mod full;

pub use self::cbc::CbcDecryptResource;
pub use self::full::FullDecryptResource;

use crate::errors::{AccessError, DecodingError, ReadError};
use crate::resource::{FailureResource, Resource};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The AES block length in bytes.
pub(crate) const BLOCK_LENGTH: u64 = 16;

/// Possible failures of a [`DrmLicense`].
#[non_exhaustive]
#[derive(thiserror::Error, Clone, Debug)]
pub enum DrmError {
    /// No license is available to decrypt the content.
    ///
    /// Reported as [`AccessError::Forbidden`].
    #[error("[NoLicense]: No license is available to decrypt the content")]
    NoLicense,

    /// A license is available, although deciphering failed or produced invalid data.
    ///
    /// Reported as [`DecodingError::Decryption`].
    #[error("[Decipher]: {0}")]
    Decipher(String),
}

impl From<DrmError> for ReadError {
    fn from(error: DrmError) -> Self {
        match error {
            DrmError::NoLicense => AccessError::Forbidden(error.to_string()).into(),
            DrmError::Decipher(message) => DecodingError::Decryption(message).into(),
        }
    }
}

/// A capability deciphering protected content.
///
/// # Contract
/// [`decipher`](Self::decipher) performs AES-CBC decryption of `data`,
/// treating its first 16 bytes as the initialization vector.
/// The returned plaintext is `data.len() - 16` bytes long,
/// with any trailing padding left in place.
#[async_trait]
pub trait DrmLicense: Send + Sync {
    /// Deciphers `data`, whose first block is the initialization vector.
    async fn decipher(&self, data: Bytes) -> Result<Bytes, DrmError>;
}

#[async_trait]
impl<L: DrmLicense + ?Sized> DrmLicense for Arc<L> {
    async fn decipher(&self, data: Bytes) -> Result<Bytes, DrmError> {
        (**self).decipher(data).await
    }
}

/// Deciphers `data` through `license`, rejecting an empty result.
pub(crate) async fn decipher(license: &dyn DrmLicense, data: Bytes) -> Result<Bytes, ReadError> {
    let plaintext = license.decipher(data).await?;

    if plaintext.is_empty() {
        return Err(DecodingError::Decryption("deciphering produced no data".to_owned()).into());
    }
    Ok(plaintext)
}

/// Encryption details declared for a protected resource.
///
/// # Examples
/// ```
/// # use rbook_fetch::drm::{DecryptionStrategy, Encryption};
/// let encryption: Encryption = serde_json::from_str(r#"{
///     "algorithm": "http://www.w3.org/2001/04/xmlenc#aes256-cbc",
///     "compression": "deflate",
///     "originalLength": 1024,
///     "scheme": "http://readium.org/2014/01/lcp"
/// }"#).unwrap();
///
/// assert!(encryption.is_deflated());
/// assert_eq!(DecryptionStrategy::Full, DecryptionStrategy::select(&encryption));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encryption {
    /// The URI identifying the encryption algorithm.
    pub algorithm: String,
    /// The compression applied before encryption, such as `deflate` or its ZIP method `8`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    /// The length of the content once decrypted and decompressed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_length: Option<u64>,
    /// The URI identifying the DRM scheme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    /// The URI identifying the scheme profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

impl Encryption {
    /// `http://www.w3.org/2001/04/xmlenc#aes256-cbc`
    pub const AES_256_CBC: &'static str = "http://www.w3.org/2001/04/xmlenc#aes256-cbc";

    /// Creates encryption details for the given algorithm URI.
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            ..Self::default()
        }
    }

    /// Sets [`Self::compression`].
    pub fn with_compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Sets [`Self::original_length`].
    pub fn with_original_length(mut self, original_length: u64) -> Self {
        self.original_length = Some(original_length);
        self
    }

    /// Returns `true` if the algorithm is AES-256-CBC.
    pub fn is_cbc(&self) -> bool {
        self.algorithm == Self::AES_256_CBC
    }

    /// Returns `true` if the content was deflated before encryption.
    pub fn is_deflated(&self) -> bool {
        self.compression.as_deref().is_some_and(|compression| {
            compression.eq_ignore_ascii_case("deflate") || compression == "8"
        })
    }

    /// Returns `true` if the content was compressed at all before encryption.
    fn is_compressed(&self) -> bool {
        self.compression.as_deref().is_some_and(|compression| {
            !(compression.is_empty()
                || compression == "0"
                || compression.eq_ignore_ascii_case("none"))
        })
    }
}

/// How a protected resource is decrypted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DecryptionStrategy {
    /// Decipher the entire content at once, then decompress and cache it.
    Full,
    /// Decipher only the ciphertext blocks covering each requested range.
    Block,
}

impl DecryptionStrategy {
    /// Selects the strategy able to decrypt content described by `encryption`.
    ///
    /// [`Block`](Self::Block) is only possible for uncompressed AES-CBC content,
    /// as offsets within a compressed stream cannot be predicted.
    pub fn select(encryption: &Encryption) -> Self {
        if encryption.is_cbc() && !encryption.is_compressed() {
            Self::Block
        } else {
            Self::Full
        }
    }
}

/// Wraps a protected `resource` so that reads return its plaintext.
///
/// Without a `license`, the returned resource fails every read with
/// [`AccessError::Forbidden`], leaving other resources readable.
pub fn decrypt<R: Resource + 'static>(
    resource: R,
    encryption: &Encryption,
    license: Option<Arc<dyn DrmLicense>>,
) -> Box<dyn Resource> {
    let Some(license) = license else {
        let href = resource.href().unwrap_or_default().to_owned();
        tracing::debug!(href = %href, "no license to decrypt resource");
        let failure = FailureResource::new(AccessError::Forbidden(href.clone()));
        return Box::new(failure.with_href(href));
    };

    match DecryptionStrategy::select(encryption) {
        DecryptionStrategy::Block => Box::new(CbcDecryptResource::new(resource, license)),
        DecryptionStrategy::Full => {
            Box::new(FullDecryptResource::new(resource, encryption, license))
        }
    }
}
