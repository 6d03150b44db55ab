//! Normalized relative URLs addressing entries within a container.

use percent_encoding::{AsciiSet, CONTROLS};
use std::borrow::Cow;
use std::fmt::{Display, Formatter};

/// Characters percent-encoded within a path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A normalized, percent-decoded relative URL identifying an entry within a
/// [`Container`](crate::container::Container).
///
/// Normalization removes any leading `/`, empty and `.` segments,
/// and resolves `..` segments.
/// A URL escaping its root (`../outside.txt`) cannot be represented.
///
/// # Examples
/// ```
/// # use rbook_fetch::RelativeUrl;
/// let url = RelativeUrl::parse("/OEBPS/./text/../c1%20a.xhtml#part-2").unwrap();
/// assert_eq!("OEBPS/c1 a.xhtml", url.as_str());
/// assert_eq!("OEBPS/c1%20a.xhtml", url.to_encoded());
///
/// assert!(RelativeUrl::parse("../escape.xhtml").is_none());
/// assert!(RelativeUrl::parse("https://example.com/c1.xhtml").is_none());
/// ```
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct RelativeUrl(String);

impl RelativeUrl {
    /// Parses a percent-encoded `href`, discarding any query or fragment.
    ///
    /// Returns [`None`] if the href has a scheme, escapes its root, or is empty.
    pub fn parse(href: &str) -> Option<Self> {
        let main_href = strip_query_and_fragment(href);

        if has_scheme(main_href) {
            return None;
        }
        Self::from_path(&decode(main_href))
    }

    /// Creates a relative URL from an already-decoded path, such as a ZIP entry name.
    ///
    /// Backslashes are treated as separators.
    pub fn from_path(path: &str) -> Option<Self> {
        normalize(&path.replace('\\', "/")).map(Self)
    }

    /// Resolves a percent-encoded `relative` href against the directory containing `self`.
    ///
    /// # Examples
    /// ```
    /// # use rbook_fetch::RelativeUrl;
    /// let chapter = RelativeUrl::parse("OPS/content/c1.xhtml").unwrap();
    /// let image = chapter.resolve("../images/cover.png").unwrap();
    /// assert_eq!("OPS/images/cover.png", image.as_str());
    /// ```
    pub fn resolve(&self, relative: &str) -> Option<Self> {
        let main_href = strip_query_and_fragment(relative);

        if has_scheme(main_href) {
            return None;
        }
        if main_href.starts_with('/') {
            return Self::parse(main_href);
        }
        let joined = format!("{}/{}", parent(&self.0), decode(main_href));
        Self::from_path(&joined)
    }

    /// The decoded path.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path with each segment percent-encoded.
    pub fn to_encoded(&self) -> String {
        self.0
            .split('/')
            .map(|segment| percent_encoding::utf8_percent_encode(segment, SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// The last path segment.
    pub fn filename(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }
}

impl Display for RelativeUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelativeUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub(crate) fn parent(href: &str) -> &str {
    href.rfind('/').map_or("", |index| &href[..index])
}

pub(crate) fn decode(encoded: &str) -> Cow<'_, str> {
    percent_encoding::percent_decode_str(encoded).decode_utf8_lossy()
}

fn strip_query_and_fragment(href: &str) -> &str {
    href.find(['?', '#']).map_or(href, |position| &href[..position])
}

/// The provided `href` must not contain a `fragment`
/// and `query` when passed to this method.
fn has_scheme(href: &str) -> bool {
    // A scheme precedes the first separator
    href.split('/')
        .next()
        .is_some_and(|first| first.contains(':'))
}

fn normalize(path: &str) -> Option<String> {
    let mut stack = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                // Popping past the root means the path escapes it
                stack.pop()?;
            }
            _ => stack.push(segment),
        }
    }

    if stack.is_empty() {
        None
    } else {
        Some(stack.join("/"))
    }
}
