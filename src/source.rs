//! Page sources: resolve a locator to a decoded page.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{trace, warn};
use thiserror::Error;

use crate::archive::ContainerKind;
use crate::locator::PageLocator;
use crate::page::{Page, PlaceholderSpec, render_placeholder};

/// Why a page could not be produced. Never fatal: callers turn it into a
/// placeholder page.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{}: no such file", .0.display())]
    NotFound(PathBuf),

    #[error("{}: entry '{entry}' not found", .container.display())]
    EntryNotFound { container: PathBuf, entry: String },

    #[error("{}: unsupported container type", .path.display())]
    UnsupportedContainer { path: PathBuf },

    #[error("{}: {message}", .container.display())]
    Archive { container: PathBuf, message: String },

    #[error("{}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("{label}: {source}")]
    Decode {
        label: String,
        source: image::ImageError,
    },
}

impl SourceError {
    pub(crate) fn from_io(path: &Path, e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            SourceError::NotFound(path.to_path_buf())
        } else {
            SourceError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    }
}

/// Produces decoded pages. Called from both the control thread (synchronous
/// fallback) and the preload worker, so implementations must be shareable.
pub trait PageSource: Send + Sync {
    fn decode(&self, locator: &PageLocator) -> Result<Page, SourceError>;
}

/// Reads plain files and archive entries from the local file system and
/// decodes them with the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSource;

impl DefaultSource {
    /// Raw bytes behind a locator, dispatching on the container extension.
    pub fn read_bytes(&self, locator: &PageLocator) -> Result<Vec<u8>, SourceError> {
        match (locator.container(), locator.entry()) {
            (Some(container), Some(entry)) => {
                let kind = ContainerKind::from_path(container).ok_or_else(|| {
                    SourceError::UnsupportedContainer {
                        path: container.to_path_buf(),
                    }
                })?;
                kind.read_entry(container, entry)
            }
            _ => std::fs::read(locator.path()).map_err(|e| SourceError::from_io(locator.path(), e)),
        }
    }
}

impl PageSource for DefaultSource {
    fn decode(&self, locator: &PageLocator) -> Result<Page, SourceError> {
        let bytes = self.read_bytes(locator)?;
        trace!("source: decoding {} ({} bytes)", locator.key(), bytes.len());
        let image = image::load_from_memory(&bytes).map_err(|source| SourceError::Decode {
            label: locator.display_name(),
            source,
        })?;
        Ok(Page::decoded(locator.display_name(), image))
    }
}

/// Decode a page, substituting a placeholder on failure.
///
/// Returns the page and whether it is a placeholder. Used by both the render
/// path and the preload worker so a failed page is cached once instead of
/// being retried every frame.
pub fn load_page(
    source: &dyn PageSource,
    locator: &PageLocator,
    placeholder: PlaceholderSpec,
) -> (Arc<Page>, bool) {
    match source.decode(locator) {
        Ok(page) => (Arc::new(page), false),
        Err(e) => {
            warn!("source: {} failed: {e}", locator.key());
            let page = render_placeholder(
                placeholder.width,
                placeholder.height,
                &locator.display_name(),
                &e.to_string(),
            );
            (Arc::new(page), true)
        }
    }
}
