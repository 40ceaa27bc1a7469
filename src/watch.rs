//! Input watcher — monitors the viewed paths for changes via notify.
//!
//! notify::RecommendedWatcher runs callbacks on an internal thread.
//! DirWatcher bridges change notifications to the control thread via
//! mpsc::channel and debounces them, so a batch copy into a watched
//! directory triggers one rescan instead of one per file.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, warn};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Fires once a burst of notifications has been quiet for `quiet`.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            last_event: None,
        }
    }

    /// Record a notification at `now`. Restarts the quiet period.
    pub fn note(&mut self, now: Instant) {
        self.last_event = Some(now);
    }

    /// True once, when the pending burst has been quiet long enough.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last_event {
            Some(t) if now.saturating_duration_since(t) >= self.quiet => {
                self.last_event = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.last_event.is_some()
    }
}

pub struct DirWatcher {
    rx: mpsc::Receiver<()>,
    debounce: Debouncer,
    _watcher: RecommendedWatcher, // Drop stops watching
}

impl DirWatcher {
    /// Watch every input root. Directories are watched recursively; for a
    /// file (image or archive) the parent directory is watched and events
    /// are filtered by path, since inotify loses the watch on rename.
    pub fn new(roots: &[PathBuf], debounce: Duration) -> Result<Self> {
        let mut targets = Vec::new();
        let mut watch_points: Vec<(PathBuf, RecursiveMode)> = Vec::new();
        for root in roots {
            let canonical = match root.canonicalize() {
                Ok(p) => p,
                Err(e) => {
                    warn!("watch: skipping {}: {e}", root.display());
                    continue;
                }
            };
            if canonical.is_dir() {
                watch_points.push((canonical.clone(), RecursiveMode::Recursive));
            } else {
                let parent = canonical
                    .parent()
                    .ok_or_else(|| anyhow::anyhow!("cannot watch root path"))?;
                watch_points.push((parent.to_path_buf(), RecursiveMode::NonRecursive));
            }
            targets.push(canonical);
        }
        if targets.is_empty() {
            anyhow::bail!("nothing to watch");
        }

        let (tx, rx) = mpsc::channel();
        let filter = targets.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| {
                if let Ok(event) = res
                    && is_content_change(&event.kind)
                    && event.paths.iter().any(|p| touches(&filter, p))
                {
                    let _ = tx.send(());
                }
            },
            notify::Config::default(),
        )?;
        for (path, mode) in &watch_points {
            watcher.watch(path, *mode)?;
            debug!("watch: {} ({mode:?})", path.display());
        }

        Ok(Self {
            rx,
            debounce: Debouncer::new(debounce),
            _watcher: watcher,
        })
    }

    /// Return true if the inputs changed and have since settled
    /// (non-blocking). Queued notifications are collapsed into one.
    pub fn poll(&mut self) -> bool {
        let now = Instant::now();
        while self.rx.try_recv().is_ok() {
            self.debounce.note(now);
        }
        self.debounce.ready(now)
    }

    /// Whether a change is waiting out its quiet period.
    pub fn is_pending(&self) -> bool {
        self.debounce.is_pending()
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

fn touches(targets: &[PathBuf], path: &Path) -> bool {
    targets.iter().any(|t| path.starts_with(t))
}
