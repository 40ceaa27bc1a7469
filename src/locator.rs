//! Page identity: locators, page sets, and path helpers.

use std::path::{Path, PathBuf};

/// Joins a container path and an entry name into a cache key.
pub const ENTRY_SEPARATOR: &str = "::";

/// File extensions decoded as pages (lowercase, without the dot).
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// Identifies one page: a standalone file or an entry inside an archive.
///
/// `key` is unique and stable for the session; it is what the page cache is
/// keyed by. Two locators with the same key refer to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageLocator {
    key: String,
    container: Option<PathBuf>,
    entry: Option<String>,
}

impl PageLocator {
    /// A standalone image file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            key: path.to_string_lossy().into_owned(),
            container: None,
            entry: None,
        }
    }

    /// An entry inside an archive container.
    pub fn archive_entry(container: impl Into<PathBuf>, entry: impl Into<String>) -> Self {
        let container = container.into();
        let entry = entry.into();
        let key = format!("{}{ENTRY_SEPARATOR}{entry}", container.to_string_lossy());
        Self {
            key,
            container: Some(container),
            entry: Some(entry),
        }
    }

    /// Cache key (`container::entry` for archive entries, the path otherwise).
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn container(&self) -> Option<&Path> {
        self.container.as_deref()
    }

    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    pub fn is_archive_entry(&self) -> bool {
        self.container.is_some()
    }

    /// Path of the standalone file. For archive entries this is the container.
    pub fn path(&self) -> &Path {
        match &self.container {
            Some(c) => c,
            None => Path::new(&self.key),
        }
    }

    /// Short name for status output: the file name, or `archive:entry-name`.
    pub fn display_name(&self) -> String {
        match (&self.container, &self.entry) {
            (Some(container), Some(entry)) => {
                let archive = file_name_lossy(container);
                let leaf = entry.rsplit(['/', '\\']).next().unwrap_or(entry);
                format!("{archive}:{leaf}")
            }
            _ => file_name_lossy(Path::new(&self.key)),
        }
    }
}

fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Lowercased extension of a path or archive entry name.
pub fn extension_of(name: &str) -> Option<String> {
    let leaf = name.rsplit(['/', '\\']).next()?;
    let (stem, ext) = leaf.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether a file or entry name looks like a decodable image.
pub fn is_image_name(name: &str) -> bool {
    extension_of(name).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// An ordered, immutable sequence of pages for one viewing session.
///
/// Shared between the control thread and the preload worker behind an `Arc`;
/// a rescan builds a new set instead of mutating this one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSet {
    pages: Vec<PageLocator>,
}

impl PageSet {
    pub fn new(pages: Vec<PageLocator>) -> Self {
        Self { pages }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&PageLocator> {
        self.pages.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageLocator> {
        self.pages.iter()
    }

    /// Position of the page with the given key, if present.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.pages.iter().position(|p| p.key() == key)
    }
}

impl FromIterator<PageLocator> for PageSet {
    fn from_iter<I: IntoIterator<Item = PageLocator>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
