use crate::media_type::MediaType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open key/value bag of metadata describing a [`Resource`](super::Resource).
///
/// Well-known keys are exposed through typed accessors;
/// anything else may be stored with [`insert`](Self::insert).
///
/// # Examples
/// ```
/// # use rbook_fetch::resource::{ArchiveProperties, ResourceProperties};
/// let mut properties = ResourceProperties::new();
/// properties.set_archive(ArchiveProperties {
///     entry_length: 512,
///     is_entry_compressed: true,
/// });
/// properties.insert("encrypted", true);
///
/// assert_eq!(Some(512), properties.archive().map(|archive| archive.entry_length));
/// assert_eq!(Some(&serde_json::Value::Bool(true)), properties.get("encrypted"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceProperties(Map<String, Value>);

impl ResourceProperties {
    const ARCHIVE: &'static str = "archive";
    const MEDIA_TYPE: &'static str = "mediaType";
    const FILENAME: &'static str = "filename";

    /// Creates an empty property bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Removes the value stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Returns `true` if no properties are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlays all of `other`'s properties on top of `self`.
    pub fn merge(&mut self, other: ResourceProperties) {
        self.0.extend(other.0);
    }

    /// Archive entry details, present when the resource is backed by an archive entry.
    pub fn archive(&self) -> Option<ArchiveProperties> {
        self.get(Self::ARCHIVE)
            .and_then(|value| ArchiveProperties::deserialize(value).ok())
    }

    /// See [`Self::archive`].
    pub fn set_archive(&mut self, archive: ArchiveProperties) {
        // Serializing a struct of plain fields cannot fail
        if let Ok(value) = serde_json::to_value(archive) {
            self.insert(Self::ARCHIVE, value);
        }
    }

    /// The media type, when known by the backing store.
    pub fn media_type(&self) -> Option<MediaType> {
        self.get(Self::MEDIA_TYPE)
            .and_then(Value::as_str)
            .map(MediaType::from)
    }

    /// See [`Self::media_type`].
    pub fn set_media_type(&mut self, media_type: &MediaType) {
        self.insert(Self::MEDIA_TYPE, media_type.as_str());
    }

    /// The filename, when known by the backing store.
    pub fn filename(&self) -> Option<&str> {
        self.get(Self::FILENAME).and_then(Value::as_str)
    }

    /// See [`Self::filename`].
    pub fn set_filename(&mut self, filename: impl Into<String>) {
        self.insert(Self::FILENAME, filename.into());
    }
}

/// Details about a resource stored as an archive entry.
///
/// Useful to distinguish the length occupied within the archive
/// from the logical length of the content.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveProperties {
    /// Length of the entry within the archive,
    /// which is the compressed length if the entry is compressed.
    pub entry_length: u64,
    /// Whether the entry is compressed within the archive.
    pub is_entry_compressed: bool,
}
