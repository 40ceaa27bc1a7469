//! Background preloading: one worker thread warming the page cache around
//! the current position.
//!
//! Queue policy is latest-wins. Every navigation event drains requests that
//! are still queued before enqueuing its own, so the worker only ever picks
//! up the most recent intent. A request the worker has already taken runs to
//! the end of its target list; only shutdown interrupts it, and only between
//! decodes. Requests remember the cache generation they were issued in, and
//! the worker abandons one as soon as the cache has been cleared since.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::cache::PageCache;
use crate::locator::PageSet;
use crate::nav::NavDirection;
use crate::page::PlaceholderSpec;
use crate::source::{PageSource, load_page};

pub const DEFAULT_DEPTH: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloadConfig {
    pub enabled: bool,
    /// Pages warmed per navigation event.
    pub depth: usize,
    pub queue_capacity: usize,
    pub placeholder: PlaceholderSpec,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            depth: DEFAULT_DEPTH,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            placeholder: PlaceholderSpec::default(),
        }
    }
}

/// One unit of preload work. Carries the page set it was issued against so
/// a rescan cannot make the worker resolve indices in the wrong set.
#[derive(Debug, Clone)]
pub struct PreloadRequest {
    pub origin: usize,
    pub direction: NavDirection,
    pub pages: Arc<PageSet>,
    /// Cache generation at issue time. Results are dropped once it is stale.
    pub generation: u64,
}

/// Cooperative cancellation flag shared with the worker.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Observability counters. Not used for control decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreloadStats {
    pub queue_depth: usize,
    pub loaded: u64,
    pub failed: u64,
    pub last_direction: Option<NavDirection>,
}

#[derive(Default)]
struct Counters {
    loaded: AtomicU64,
    failed: AtomicU64,
    last_direction: Mutex<Option<NavDirection>>,
}

/// Indices to warm for a request, nearest first, clipped to `[0, len)`.
///
/// Forward and backward windows never wrap; a jump warms `depth / 2` pages
/// on each side.
pub fn preload_targets(
    origin: usize,
    direction: NavDirection,
    depth: usize,
    len: usize,
) -> Vec<usize> {
    let ahead = move |n: usize| {
        (1..=n)
            .map(move |d| origin + d)
            .take_while(move |&i| i < len)
    };
    let behind = move |n: usize| (1..=n).map_while(move |d| origin.checked_sub(d));
    match direction {
        NavDirection::Forward => ahead(depth).collect(),
        NavDirection::Backward => behind(depth).filter(|&i| i < len).collect(),
        NavDirection::Jump => {
            let half = depth / 2;
            ahead(half)
                .chain(behind(half).filter(|&i| i < len))
                .collect()
        }
    }
}

/// Owns the preload worker and its request queue.
///
/// Lives on the control thread. Dropping it shuts the worker down.
pub struct PreloadCoordinator {
    tx: Option<Sender<PreloadRequest>>,
    cache: Arc<PageCache>,
    /// Second handle on the queue, used to discard stale requests.
    stale: Receiver<PreloadRequest>,
    enabled: bool,
    cancel: CancelToken,
    counters: Arc<Counters>,
    worker: Option<JoinHandle<()>>,
}

impl PreloadCoordinator {
    /// Start the worker thread.
    pub fn spawn(
        cache: Arc<PageCache>,
        source: Arc<dyn PageSource>,
        config: &PreloadConfig,
    ) -> Self {
        let (tx, rx) = bounded::<PreloadRequest>(config.queue_capacity.max(1));
        let cancel = CancelToken::new();
        let counters = Arc::new(Counters::default());

        let worker = Worker {
            cache: cache.clone(),
            source,
            depth: config.depth,
            placeholder: config.placeholder,
            cancel: cancel.clone(),
            counters: counters.clone(),
        };
        let stale = rx.clone();
        let handle = thread::Builder::new()
            .name("koma-preload".into())
            .spawn(move || worker.run(rx));

        let (tx, handle, enabled) = match handle {
            Ok(h) => (Some(tx), Some(h), config.enabled),
            Err(e) => {
                warn!("preload: failed to start worker, preloading disabled: {e}");
                (None, None, false)
            }
        };

        Self {
            tx,
            cache,
            stale,
            enabled,
            cancel,
            counters,
            worker: handle,
        }
    }

    /// Queue a preload around `origin`, replacing any request not yet taken
    /// by the worker. Never blocks. Returns whether the request was queued.
    pub fn start_preload(
        &self,
        pages: &Arc<PageSet>,
        origin: usize,
        direction: NavDirection,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(tx) = &self.tx else {
            return false;
        };

        let mut discarded = 0;
        while self.stale.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("preload: discarded {discarded} stale request(s)");
        }

        let request = PreloadRequest {
            origin,
            direction,
            pages: pages.clone(),
            generation: self.cache.generation(),
        };
        match tx.try_send(request) {
            Ok(()) => {
                debug!("preload: queued {} from {origin}", direction.name());
                true
            }
            Err(TrySendError::Full(_)) => {
                debug!("preload: queue full, dropping {} from {origin}", direction.name());
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("preload: worker gone, dropping request");
                false
            }
        }
    }

    /// Toggle preloading. Disabling leaves cached pages alone.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled && self.tx.is_some();
        info!("preload: {}", if self.enabled { "enabled" } else { "disabled" });
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn stats(&self) -> PreloadStats {
        PreloadStats {
            queue_depth: self.stale.len(),
            loaded: self.counters.loaded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            last_direction: *self.counters.last_direction.lock(),
        }
    }

    /// Token observed by the worker between decodes.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Cancel, close the queue and wait for the worker. The cache keeps
    /// whatever the worker had inserted so far.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        self.enabled = false;
        self.tx = None;
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("preload: worker panicked");
            }
            debug!("preload: worker joined");
        }
    }
}

impl Drop for PreloadCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    cache: Arc<PageCache>,
    source: Arc<dyn PageSource>,
    depth: usize,
    placeholder: PlaceholderSpec,
    cancel: CancelToken,
    counters: Arc<Counters>,
}

impl Worker {
    fn run(self, rx: Receiver<PreloadRequest>) {
        info!("preload worker: started (depth={})", self.depth);
        while let Ok(request) = rx.recv() {
            if self.cancel.is_cancelled() {
                break;
            }
            self.process(&request);
        }
        info!("preload worker: stopped");
    }

    fn process(&self, request: &PreloadRequest) {
        *self.counters.last_direction.lock() = Some(request.direction);
        let targets = preload_targets(
            request.origin,
            request.direction,
            self.depth,
            request.pages.len(),
        );
        debug!(
            "preload worker: {} from {} -> {:?}",
            request.direction.name(),
            request.origin,
            targets
        );

        for idx in targets {
            if self.cancel.is_cancelled() {
                debug!("preload worker: cancelled before page {idx}");
                return;
            }
            let Some(locator) = request.pages.get(idx) else {
                continue;
            };
            if self.cache.contains(locator.key()) {
                continue;
            }
            let start = Instant::now();
            let (page, failed) = load_page(self.source.as_ref(), locator, self.placeholder);
            if !self
                .cache
                .put_if_generation(locator.key(), page, request.generation)
            {
                debug!("preload worker: cache cleared, abandoning request at page {idx}");
                return;
            }
            let counter = if failed {
                &self.counters.failed
            } else {
                &self.counters.loaded
            };
            counter.fetch_add(1, Ordering::Relaxed);
            debug!(
                "preload worker: page {idx} {} in {:.1}ms",
                if failed { "failed" } else { "loaded" },
                start.elapsed().as_secs_f64() * 1000.0
            );
        }
    }
}
