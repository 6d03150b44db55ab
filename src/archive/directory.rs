//! Exploded archives, whose entries are files within a directory.

use crate::archive::errors::{ArchiveError, ArchiveResult};
use crate::container::Container;
use crate::resource::{FileResource, Resource};
use crate::util::sync::CloseFlag;
use crate::util::uri::RelativeUrl;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A [`Container`] over the files of a directory on the local filesystem.
///
/// Entries are discovered once by walking the directory tree.
/// Symlinks are skipped, as are files with non UTF-8 names.
/// Each resource is a [`FileResource`] opening its file lazily,
/// which fails to read once the container is closed.
#[derive(Debug)]
pub struct DirectoryContainer {
    root: PathBuf,
    source_url: Option<String>,
    entries: BTreeSet<RelativeUrl>,
    closed: Arc<CloseFlag>,
}

impl DirectoryContainer {
    /// Walks the directory at `path`, collecting its entries.
    ///
    /// This call performs blocking I/O.
    ///
    /// # Errors
    /// - [`ArchiveError::FileNotFound`]: When `path` does not exist.
    /// - [`ArchiveError::Reading`]: When `path` is not a directory or cannot be walked.
    pub fn new(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let path = path.as_ref();
        let root = match path.canonicalize() {
            Ok(root) if root.is_dir() => root,
            Ok(_) => {
                return Err(ArchiveError::reading(
                    io::Error::from(io::ErrorKind::NotADirectory),
                    Some(path.to_path_buf()),
                ));
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(ArchiveError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(error) => return Err(ArchiveError::reading(error, Some(path.to_path_buf()))),
        };

        let mut entries = BTreeSet::new();
        traverse(&mut entries, &root, &root)?;
        tracing::debug!(root = ?root, entries = entries.len(), "opened directory container");

        Ok(Self {
            source_url: root.to_str().map(str::to_owned),
            root,
            entries,
            closed: Arc::new(CloseFlag::new()),
        })
    }

    /// The canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, url: &RelativeUrl) -> Option<PathBuf> {
        let resolved = self.root.join(url.as_str()).canonicalize().ok()?;

        // Path traversal mitigation
        (resolved.starts_with(&self.root) && resolved.is_file()).then_some(resolved)
    }
}

fn traverse(set: &mut BTreeSet<RelativeUrl>, prefix: &Path, path: &Path) -> ArchiveResult<()> {
    fn unreadable(source: io::Error, path: PathBuf) -> ArchiveError {
        ArchiveError::reading(source, Some(path))
    }

    let read_dir = path
        .read_dir()
        .map_err(|err| unreadable(err, path.to_path_buf()))?;

    for entry in read_dir {
        let entry = entry.map_err(|err| unreadable(err, path.to_path_buf()))?;
        // `DirEntry::file_type` does not follow symlinks
        let file_type = entry
            .file_type()
            .map_err(|err| unreadable(err, entry.path()))?;

        if file_type.is_symlink() {
            continue;
        }

        let path = entry.path();
        if file_type.is_dir() {
            traverse(set, prefix, &path)?;
        } else if let Ok(relative) = path.strip_prefix(prefix)
            && let Some(utf8_path) = relative.to_str()
            && let Some(url) = RelativeUrl::from_path(utf8_path)
        {
            set.insert(url);
        }
    }
    Ok(())
}

#[async_trait]
impl Container for DirectoryContainer {
    fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    fn entries(&self) -> &BTreeSet<RelativeUrl> {
        &self.entries
    }

    fn get(&self, href: &str) -> Option<Box<dyn Resource>> {
        if self.closed.is_closed() {
            return None;
        }
        let url = RelativeUrl::parse(href)?;

        if !self.entries.contains(&url) {
            return None;
        }
        let path = self.resolve(&url)?;
        let resource = FileResource::new(path)
            .with_href(url.as_str())
            .with_parent_closed(self.closed.clone());
        Some(Box::new(resource))
    }

    async fn close(&self) {
        self.closed.close();
    }
}
