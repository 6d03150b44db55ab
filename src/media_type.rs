//! [`MediaType`] identifying the format of a resource or archive.

use std::borrow::Cow;
use std::fmt::{Display, Formatter};

/// The format of a resource based on
/// [`MIME`](https://developer.mozilla.org/en-US/docs/Web/HTTP/Guides/MIME_types),
/// used to determine if an archive opener supports a resource,
/// or to describe an entry within a container.
///
/// MIME structure: `maintype/subtype[+suffix][;params]`
///
/// # Equality
/// Media types are compared by their components, so the following are treated as equivalent:
/// ```
/// # use rbook_fetch::MediaType;
/// let a = MediaType::from("application/example;param=XYZ;param2=ABC");
/// let b = MediaType::from("  application/EXAMPLE; PARAM2 = ABC;param = XYZ;; ;   ");
/// assert_eq!(a, b);
/// ```
/// - Type components ([`maintype`](MediaType::maintype), [`subtype`](MediaType::subtype),
///   and [`suffix`](MediaType::suffix)) are case-insensitive.
/// - Parameter order does not matter,
///   although parameter keys are case-insensitive and values are case-sensitive.
///
/// # Examples
/// ```
/// # use rbook_fetch::MediaType;
/// let epub = MediaType::from("application/epub+zip");
///
/// assert_eq!("application", epub.maintype());
/// assert_eq!("epub", epub.subtype());
/// assert_eq!(Some("zip"), epub.suffix());
/// assert!(epub.is_zip());
/// assert!(!MediaType::from("application/pdf").is_zip());
/// ```
#[derive(Clone, Debug, Hash, Eq)]
pub struct MediaType(Cow<'static, str>);

impl MediaType {
    /// `application/zip`
    pub const ZIP: MediaType = Self::borrowed("application/zip");
    /// `application/epub+zip`
    pub const EPUB: MediaType = Self::borrowed("application/epub+zip");
    /// `application/vnd.readium.lcp.protected-publication+zip`
    pub const LCP_PROTECTED_PUBLICATION: MediaType =
        Self::borrowed("application/vnd.readium.lcp.protected-publication+zip");
    /// `application/octet-stream`
    pub const BINARY: MediaType = Self::borrowed("application/octet-stream");
    /// `inode/directory`, an exploded archive on the local filesystem.
    pub const DIRECTORY: MediaType = Self::borrowed("inode/directory");

    const fn borrowed(static_str: &'static str) -> MediaType {
        MediaType(Cow::Borrowed(static_str))
    }

    /// Infers a media type from a file extension (case-insensitive, without the dot).
    ///
    /// Returns [`None`] for unknown extensions.
    ///
    /// ```
    /// # use rbook_fetch::MediaType;
    /// assert_eq!(Some(MediaType::EPUB), MediaType::for_extension("EPUB"));
    /// assert_eq!("application/xhtml+xml", MediaType::for_extension("xhtml").unwrap().as_str());
    /// assert_eq!(None, MediaType::for_extension("unknown"));
    /// ```
    pub fn for_extension(extension: &str) -> Option<MediaType> {
        let media_type = match extension.to_ascii_lowercase().as_str() {
            "zip" => "application/zip",
            "epub" => "application/epub+zip",
            "lcpdf" => "application/pdf+lcp",
            "pdf" => "application/pdf",
            "xhtml" => "application/xhtml+xml",
            "html" | "htm" => "text/html",
            "css" => "text/css",
            "js" => "text/javascript",
            "txt" => "text/plain",
            "xml" => "application/xml",
            "opf" => "application/oebps-package+xml",
            "ncx" => "application/x-dtbncx+xml",
            "json" => "application/json",
            "smil" => "application/smil+xml",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "svg" => "image/svg+xml",
            "mp3" => "audio/mpeg",
            "m4a" => "audio/mp4",
            "ogg" | "opus" => "audio/ogg",
            "mp4" => "video/mp4",
            "woff" => "font/woff",
            "woff2" => "font/woff2",
            "ttf" => "font/ttf",
            "otf" => "font/otf",
            _ => return None,
        };
        Some(Self::borrowed(media_type))
    }

    /// Infers a media type from the extension of a path or href.
    pub fn for_path(path: &str) -> Option<MediaType> {
        let filename = path.rsplit(['/', '\\']).next()?;
        let (_, extension) = filename.rsplit_once('.')?;
        Self::for_extension(extension)
    }

    /// The raw underlying string of a media type.
    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }

    /// The maintype, such as `application` within `application/xhtml+xml`.
    pub fn maintype(&self) -> &str {
        self.0.split('/').next().unwrap_or_default().trim()
    }

    /// The subtype, such as `xhtml` within `application/xhtml+xml`.
    pub fn subtype(&self) -> &str {
        self.0
            .split(['/', '+', ';'])
            .nth(1)
            .unwrap_or_default()
            .trim()
    }

    /// The suffix, such as `xml` within `application/xhtml+xml;charset=UTF-8`.
    pub fn suffix(&self) -> Option<&str> {
        // Remove parameters as it can conflict with finding the suffix
        let base_type = self.0.split(';').next()?;
        // With the parameters removed, find the suffix
        base_type
            .rfind('+')
            .map(|index| base_type[index + 1..].trim())
    }

    /// The raw parameters string, such as `charset=UTF-8`.
    pub fn params(&self) -> Option<&str> {
        self.0.find(';').map(|index| self.0[index + 1..].trim())
    }

    /// Returns an iterator over all `(key, value)` parameters.
    ///
    /// ```
    /// # use rbook_fetch::MediaType;
    /// let media_type = MediaType::from("audio/ogg; codecs=opus; other_param=value");
    /// let mut iterator = media_type.params_iter();
    ///
    /// assert_eq!(Some(("codecs", "opus")), iterator.next());
    /// assert_eq!(Some(("other_param", "value")), iterator.next());
    /// assert_eq!(None, iterator.next());
    /// ```
    pub fn params_iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params()
            .unwrap_or_default()
            .split(';')
            .filter_map(|param| param.split_once('='))
            .map(|(key, value)| (key.trim(), value.trim()))
    }

    /// Returns the parameter value associated with the given key if present.
    pub fn get_param(&self, param_key: &str) -> Option<&str> {
        self.params_iter()
            .find_map(|(key, value)| key.eq_ignore_ascii_case(param_key).then_some(value))
    }

    /// Returns `true` if the media type denotes a ZIP-based format,
    /// either `application/zip` or any type with a `+zip` suffix.
    pub fn is_zip(&self) -> bool {
        (self.maintype().eq_ignore_ascii_case("application")
            && self.subtype().eq_ignore_ascii_case("zip"))
            || self
                .suffix()
                .is_some_and(|suffix| suffix.eq_ignore_ascii_case("zip"))
    }

    /// Returns `true` if the [`maintype`](Self::maintype) or
    /// [`subtype`](Self::subtype) is **not** present.
    pub fn is_unspecified(&self) -> bool {
        self.subtype().is_empty() || self.maintype().is_empty()
    }
}

impl PartialEq for MediaType {
    fn eq(&self, other: &Self) -> bool {
        fn extract_type(media_type: &MediaType) -> (&str, bool) {
            let mut split = media_type.0.split(';');
            // Split guarantees at least one entry
            let full_type = split.next().unwrap_or_default().trim();
            let has_params = split.any(|param| !param.trim().is_empty());
            (full_type, has_params)
        }

        let (self_type, self_has_params) = extract_type(self);
        let (other_type, other_has_params) = extract_type(other);

        // - Params must match
        // - Types must match (main, sub, and suffix)
        if self_has_params != other_has_params || !self_type.eq_ignore_ascii_case(other_type) {
            return false;
        }
        // If neither has parameters as this point, they're identical.
        if !self_has_params {
            return true;
        }

        let mut self_params = self.params_iter().collect::<Vec<_>>();
        let mut other_params = other.params_iter().collect::<Vec<_>>();

        if self_params.len() != other_params.len() {
            return false;
        }

        // Sort from [A-z] to ensure proper order (KEY_A == key_a)
        self_params.sort_unstable_by_key(|(k, _)| k.to_ascii_lowercase());
        other_params.sort_unstable_by_key(|(k, _)| k.to_ascii_lowercase());

        // Compare key (case-insensitive) and value (case-sensitive)
        self_params
            .iter()
            .zip(other_params)
            .all(|(&(k1, v1), (k2, v2))| k1.eq_ignore_ascii_case(k2) && v1.eq(v2))
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for MediaType {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for MediaType {
    fn from(value: &str) -> Self {
        Self(Cow::Owned(value.trim().to_owned()))
    }
}

impl From<String> for MediaType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}
