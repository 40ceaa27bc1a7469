//! Archive containers: listing entries and reading one entry's bytes.
//!
//! One variant per container family, selected by the container's file
//! extension. Each read opens the archive afresh; nothing is kept open
//! between calls, so the preload worker and the control thread can read the
//! same container concurrently.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::trace;

use crate::locator::extension_of;
use crate::source::SourceError;

/// Container families the viewer can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// `.zip`, `.cbz`
    Zip,
    /// `.rar`, `.cbr`
    Rar,
    /// `.7z`, `.cb7`
    SevenZ,
}

impl ContainerKind {
    /// Pick the container kind from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = extension_of(&path.to_string_lossy())?;
        match ext.as_str() {
            "zip" | "cbz" => Some(ContainerKind::Zip),
            "rar" | "cbr" => Some(ContainerKind::Rar),
            "7z" | "cb7" => Some(ContainerKind::SevenZ),
            _ => None,
        }
    }

    /// Entry names (files only) in archive order.
    pub fn list_entries(self, path: &Path) -> Result<Vec<String>, SourceError> {
        let entries = match self {
            ContainerKind::Zip => zip_list(path),
            ContainerKind::Rar => rar_list(path),
            ContainerKind::SevenZ => sevenz_list(path),
        }?;
        trace!("archive: {} lists {} entries", path.display(), entries.len());
        Ok(entries)
    }

    /// Raw bytes of a single entry.
    pub fn read_entry(self, path: &Path, entry: &str) -> Result<Vec<u8>, SourceError> {
        match self {
            ContainerKind::Zip => zip_read(path, entry),
            ContainerKind::Rar => rar_read(path, entry),
            ContainerKind::SevenZ => sevenz_read(path, entry),
        }
    }
}

fn archive_error(path: &Path, e: impl std::fmt::Display) -> SourceError {
    SourceError::Archive {
        container: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn entry_not_found(path: &Path, entry: &str) -> SourceError {
    SourceError::EntryNotFound {
        container: path.to_path_buf(),
        entry: entry.to_string(),
    }
}

fn open_file(path: &Path) -> Result<File, SourceError> {
    File::open(path).map_err(|e| SourceError::from_io(path, e))
}

// ---------------------------------------------------------------------------
// zip / cbz
// ---------------------------------------------------------------------------

fn zip_list(path: &Path) -> Result<Vec<String>, SourceError> {
    let mut archive = zip::ZipArchive::new(open_file(path)?).map_err(|e| archive_error(path, e))?;
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive.by_index(i).map_err(|e| archive_error(path, e))?;
        if !file.is_dir() {
            names.push(file.name().to_string());
        }
    }
    Ok(names)
}

fn zip_read(path: &Path, entry: &str) -> Result<Vec<u8>, SourceError> {
    let mut archive = zip::ZipArchive::new(open_file(path)?).map_err(|e| archive_error(path, e))?;
    let mut file = match archive.by_name(entry) {
        Ok(f) => f,
        Err(zip::result::ZipError::FileNotFound) => return Err(entry_not_found(path, entry)),
        Err(e) => return Err(archive_error(path, e)),
    };
    let mut buf = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut buf)
        .map_err(|e| archive_error(path, e))?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// rar / cbr
// ---------------------------------------------------------------------------

fn rar_list(path: &Path) -> Result<Vec<String>, SourceError> {
    if !path.exists() {
        return Err(SourceError::NotFound(path.to_path_buf()));
    }
    let archive = unrar::Archive::new(path)
        .open_for_listing()
        .map_err(|e| archive_error(path, e))?;
    let mut names = Vec::new();
    for header in archive {
        let header = header.map_err(|e| archive_error(path, e))?;
        if header.is_file() {
            names.push(header.filename.to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

fn rar_read(path: &Path, entry: &str) -> Result<Vec<u8>, SourceError> {
    if !path.exists() {
        return Err(SourceError::NotFound(path.to_path_buf()));
    }
    let mut archive = unrar::Archive::new(path)
        .open_for_processing()
        .map_err(|e| archive_error(path, e))?;
    while let Some(header) = archive.read_header().map_err(|e| archive_error(path, e))? {
        archive = if header.entry().filename.to_string_lossy() == entry {
            let (data, _rest) = header.read().map_err(|e| archive_error(path, e))?;
            return Ok(data);
        } else {
            header.skip().map_err(|e| archive_error(path, e))?
        };
    }
    Err(entry_not_found(path, entry))
}

// ---------------------------------------------------------------------------
// 7z / cb7
// ---------------------------------------------------------------------------

fn open_sevenz(path: &Path) -> Result<sevenz_rust::SevenZReader<File>, SourceError> {
    if !path.exists() {
        return Err(SourceError::NotFound(path.to_path_buf()));
    }
    sevenz_rust::SevenZReader::open(path, sevenz_rust::Password::empty())
        .map_err(|e| archive_error(path, e))
}

fn sevenz_list(path: &Path) -> Result<Vec<String>, SourceError> {
    let reader = open_sevenz(path)?;
    Ok(reader
        .archive()
        .files
        .iter()
        .filter(|e| e.has_stream && !e.is_directory)
        .map(|e| e.name.clone())
        .collect())
}

fn sevenz_read(path: &Path, entry: &str) -> Result<Vec<u8>, SourceError> {
    let mut reader = open_sevenz(path)?;
    let mut found: Option<Vec<u8>> = None;
    let mut read_error: Option<std::io::Error> = None;
    reader
        .for_each_entries(|e, rd| {
            if e.name != entry {
                return Ok(true);
            }
            let mut buf = Vec::new();
            match rd.read_to_end(&mut buf) {
                Ok(_) => found = Some(buf),
                Err(err) => read_error = Some(err),
            }
            Ok(false)
        })
        .map_err(|e| archive_error(path, e))?;
    if let Some(e) = read_error {
        return Err(archive_error(path, e));
    }
    found.ok_or_else(|| entry_not_found(path, entry))
}
