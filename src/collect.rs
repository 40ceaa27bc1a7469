//! Expand command-line inputs (directories, archives, images) into pages.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::archive::ContainerKind;
use crate::locator::{PageLocator, is_image_name};

/// Collect page locators from files, archives and directories, in input order.
///
/// Directories are walked recursively with entries visited in file-name
/// order; archives found on the way are expanded in place. Archive entries
/// keep archive order. Missing paths and unreadable archives are logged and
/// skipped, so a single bad input never aborts the whole set. Each directory
/// is walked at most once per input, so symlinks pointing back up the tree
/// do not repeat pages.
pub fn collect_locators<P: AsRef<Path>>(inputs: &[P]) -> Vec<PageLocator> {
    let mut out = Vec::new();
    for input in inputs {
        let mut visited = HashSet::new();
        collect_path(input.as_ref(), true, &mut visited, &mut out);
    }
    info!("collect: {} page(s) from {} input(s)", out.len(), inputs.len());
    out
}

fn collect_path(
    path: &Path,
    explicit: bool,
    visited: &mut HashSet<PathBuf>,
    out: &mut Vec<PageLocator>,
) {
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            warn!("collect: skipping {}: {e}", path.display());
            return;
        }
    };

    if meta.is_dir() {
        collect_dir(path, visited, out);
    } else if let Some(kind) = ContainerKind::from_path(path) {
        collect_archive(path, kind, out);
    } else if is_image_name(&path.to_string_lossy()) {
        out.push(PageLocator::file(path));
    } else if explicit {
        warn!("collect: skipping {}: not an image or archive", path.display());
    }
}

fn collect_dir(dir: &Path, visited: &mut HashSet<PathBuf>, out: &mut Vec<PageLocator>) {
    let canonical = match fs::canonicalize(dir) {
        Ok(p) => p,
        Err(e) => {
            warn!("collect: cannot resolve directory {}: {e}", dir.display());
            return;
        }
    };
    if !visited.insert(canonical) {
        debug!("collect: {} already walked, skipping", dir.display());
        return;
    }
    let mut entries: Vec<_> = match fs::read_dir(dir) {
        Ok(rd) => rd.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(e) => {
            warn!("collect: cannot read directory {}: {e}", dir.display());
            return;
        }
    };
    entries.sort();
    debug!("collect: walking {} ({} entries)", dir.display(), entries.len());
    for entry in entries {
        collect_path(&entry, false, visited, out);
    }
}

fn collect_archive(path: &Path, kind: ContainerKind, out: &mut Vec<PageLocator>) {
    match kind.list_entries(path) {
        Ok(names) => {
            let before = out.len();
            out.extend(
                names
                    .into_iter()
                    .filter(|n| is_image_name(n))
                    .map(|n| PageLocator::archive_entry(path, n)),
            );
            debug!("collect: {} -> {} page(s)", path.display(), out.len() - before);
        }
        Err(e) => warn!("collect: skipping archive {e}"),
    }
}
