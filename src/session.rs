//! Viewing session: the facade the front end drives.
//!
//! Owns the page set, navigation state, cache and preload coordinator, and
//! turns navigation events into preload requests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::bail;
use log::{debug, info};

use crate::cache::{CacheStats, PageCache};
use crate::collect::collect_locators;
use crate::locator::PageSet;
use crate::nav::{
    NavDirection, NavError, NavEvent, NavigationState, PairMode, PairingConfig,
    ReadingDirection, Step,
};
use crate::page::{Page, PlaceholderSpec};
use crate::preload::{PreloadConfig, PreloadCoordinator, PreloadStats};
use crate::sort::{SortStrategy, sort_locators};
use crate::source::{DefaultSource, PageSource, load_page};

/// Everything a session needs at construction. Built from the resolved
/// [`Config`](crate::config::Config).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub sort: SortStrategy,
    pub cache_capacity: usize,
    pub preload: PreloadConfig,
    pub pair_mode: PairMode,
    pub reading_direction: ReadingDirection,
    pub pairing: PairingConfig,
    pub placeholder: PlaceholderSpec,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sort: SortStrategy::default(),
            cache_capacity: crate::cache::DEFAULT_CAPACITY,
            preload: PreloadConfig::default(),
            pair_mode: PairMode::Single,
            reading_direction: ReadingDirection::Ltr,
            pairing: PairingConfig::default(),
            placeholder: PlaceholderSpec::default(),
        }
    }
}

/// What one frame shows.
#[derive(Debug, Clone)]
pub enum Spread {
    Empty,
    Single {
        index: usize,
        page: Arc<Page>,
    },
    /// Two compatible neighbours, already placed in reading order.
    Pair {
        left: (usize, Arc<Page>),
        right: (usize, Arc<Page>),
    },
}

impl Spread {
    /// Page indices shown, left to right.
    pub fn indices(&self) -> Vec<usize> {
        match self {
            Spread::Empty => Vec::new(),
            Spread::Single { index, .. } => vec![*index],
            Spread::Pair { left, right } => vec![left.0, right.0],
        }
    }

    /// Pages shown, left to right.
    pub fn pages(&self) -> Vec<&Arc<Page>> {
        match self {
            Spread::Empty => Vec::new(),
            Spread::Single { page, .. } => vec![page],
            Spread::Pair { left, right } => vec![&left.1, &right.1],
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Spread::Pair { .. })
    }
}

pub struct Session {
    preload: PreloadCoordinator,
    cache: Arc<PageCache>,
    source: Arc<dyn PageSource>,
    pages: Arc<PageSet>,
    nav: NavigationState,
    inputs: Vec<PathBuf>,
    sort: SortStrategy,
    pairing: PairingConfig,
    placeholder: PlaceholderSpec,
}

impl Session {
    /// Collect, sort and open the pages under `inputs` with the default
    /// file-system source. Fails when nothing viewable is found.
    pub fn open(inputs: Vec<PathBuf>, config: &SessionConfig) -> anyhow::Result<Self> {
        Self::open_with_source(inputs, Arc::new(DefaultSource), config)
    }

    pub fn open_with_source(
        inputs: Vec<PathBuf>,
        source: Arc<dyn PageSource>,
        config: &SessionConfig,
    ) -> anyhow::Result<Self> {
        let pages = scan(&inputs, config.sort);
        if pages.is_empty() {
            bail!("no pages found in {}", describe_inputs(&inputs));
        }
        let mut session = Self::new(pages, source, config);
        session.inputs = inputs;
        Ok(session)
    }

    /// Session over an already-built page set. [`rescan`](Self::rescan) is a
    /// no-op for sessions built this way.
    pub fn new(pages: PageSet, source: Arc<dyn PageSource>, config: &SessionConfig) -> Self {
        let cache = Arc::new(PageCache::new(config.cache_capacity));
        let preload = PreloadCoordinator::spawn(cache.clone(), source.clone(), &config.preload);
        let nav = NavigationState::new(pages.len(), config.pair_mode, config.reading_direction);
        info!(
            "session: {} page(s), mode={:?}, direction={:?}, sort={}",
            pages.len(),
            config.pair_mode,
            config.reading_direction,
            config.sort
        );
        let session = Self {
            preload,
            cache,
            source,
            pages: Arc::new(pages),
            nav,
            inputs: Vec::new(),
            sort: config.sort,
            pairing: config.pairing,
            placeholder: config.placeholder,
        };
        session.preload_from(session.nav.current_index(), NavDirection::Jump);
        session
    }

    pub fn pages(&self) -> &PageSet {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.nav.current_index()
    }

    pub fn pair_mode(&self) -> PairMode {
        self.nav.pair_mode()
    }

    pub fn reading_direction(&self) -> ReadingDirection {
        self.nav.reading_direction()
    }

    pub fn pending_direction(&self) -> NavDirection {
        self.nav.pending_direction()
    }

    pub fn cache(&self) -> &Arc<PageCache> {
        &self.cache
    }

    /// Page at `index`, from the cache or decoded synchronously on a miss.
    /// Failed decodes come back as placeholders and are cached like pages.
    pub fn page_at(&self, index: usize) -> Option<Arc<Page>> {
        let locator = self.pages.get(index)?;
        if let Some(page) = self.cache.get(locator.key()) {
            return Some(page);
        }
        let start = Instant::now();
        let (page, failed) = load_page(self.source.as_ref(), locator, self.placeholder);
        self.cache.put(locator.key(), page.clone());
        debug!(
            "session: sync decode page {index} ({}) {} in {:.1}ms",
            locator.key(),
            if failed { "failed" } else { "ok" },
            start.elapsed().as_secs_f64() * 1000.0
        );
        Some(page)
    }

    pub fn current_page(&self) -> Option<Arc<Page>> {
        self.page_at(self.nav.current_index())
    }

    /// Pages of the current frame as `(left, right)`. `right` is `None` when
    /// a single page is shown; in right-to-left book mode the partner page
    /// takes the left slot.
    pub fn current_pair(&self) -> Option<(Arc<Page>, Option<Arc<Page>>)> {
        match self.current_spread() {
            Spread::Empty => None,
            Spread::Single { page, .. } => Some((page, None)),
            Spread::Pair { left, right } => Some((left.1, Some(right.1))),
        }
    }

    /// Frame for the current position. Book mode falls back to a single page
    /// when a slot is empty or the two pages fail the compatibility check.
    pub fn current_spread(&self) -> Spread {
        let index = self.nav.current_index();
        let Some(current) = self.page_at(index) else {
            return Spread::Empty;
        };
        let partner = self.nav.partner_index().and_then(|i| {
            self.page_at(i)
                .filter(|p| self.pairing.compatible(current.dimensions(), p.dimensions()))
                .map(|p| (i, p))
        });
        let Some(theirs) = partner else {
            return Spread::Single {
                index,
                page: current,
            };
        };
        let mine = (index, current);
        if self.nav.pair_slots().left == Some(index) {
            Spread::Pair {
                left: mine,
                right: theirs,
            }
        } else {
            Spread::Pair {
                left: theirs,
                right: mine,
            }
        }
    }

    pub fn advance(&mut self, step: Step, single_step: bool) -> Option<NavEvent> {
        let event = self.nav.advance(step, single_step)?;
        self.on_nav(event);
        Some(event)
    }

    /// Jump to a 1-based page number.
    pub fn jump_to(&mut self, page_number: usize) -> Result<(), NavError> {
        let event = self.nav.jump_to(page_number)?;
        self.on_nav(event);
        Ok(())
    }

    pub fn jump_first(&mut self) -> Result<(), NavError> {
        let event = self.nav.jump_first()?;
        self.on_nav(event);
        Ok(())
    }

    pub fn jump_last(&mut self) -> Result<(), NavError> {
        let event = self.nav.jump_last()?;
        self.on_nav(event);
        Ok(())
    }

    pub fn toggle_book_mode(&mut self) -> PairMode {
        let mode = self.nav.toggle_book_mode();
        info!("session: pair mode {mode:?}");
        mode
    }

    pub fn toggle_reading_direction(&mut self) -> ReadingDirection {
        let dir = self.nav.toggle_reading_direction();
        info!("session: reading direction {dir:?}");
        dir
    }

    pub fn set_preload_enabled(&mut self, enabled: bool) {
        self.preload.set_enabled(enabled);
    }

    pub fn preload_enabled(&self) -> bool {
        self.preload.is_enabled()
    }

    pub fn preload_stats(&self) -> PreloadStats {
        self.preload.stats()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Re-collect the original inputs and install the result.
    ///
    /// The cache is cleared. The current page is kept when it still exists,
    /// otherwise the index is clamped to the new set. Returns the new page
    /// count.
    pub fn rescan(&mut self) -> usize {
        if self.inputs.is_empty() {
            debug!("session: rescan skipped, no inputs");
            return self.pages.len();
        }
        let current_key = self
            .pages
            .get(self.nav.current_index())
            .map(|l| l.key().to_string());
        let pages = scan(&self.inputs, self.sort);
        let kept = current_key.and_then(|k| pages.position(&k));

        self.cache.clear();
        self.nav.set_len(pages.len());
        self.pages = Arc::new(pages);
        if let Some(pos) = kept {
            self.nav.set_index(pos);
        }
        info!(
            "session: rescan -> {} page(s), index {}",
            self.pages.len(),
            self.nav.current_index()
        );
        self.preload_from(self.nav.current_index(), NavDirection::Jump);
        self.pages.len()
    }

    fn on_nav(&self, event: NavEvent) {
        self.preload_from(event.origin, event.direction);
    }

    fn preload_from(&self, origin: usize, direction: NavDirection) {
        if self.pages.is_empty() {
            return;
        }
        self.preload.start_preload(&self.pages, origin, direction);
    }
}

/// Collect and sort the pages under `inputs`.
pub fn scan(inputs: &[PathBuf], sort: SortStrategy) -> PageSet {
    let locators = collect_locators(inputs);
    PageSet::new(sort_locators(&locators, sort))
}

fn describe_inputs(inputs: &[PathBuf]) -> String {
    if inputs.is_empty() {
        return "(no inputs)".into();
    }
    inputs
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::PageLocator;
    use crate::source::SourceError;
    use image::DynamicImage;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves blank images of fixed sizes; unknown keys fail.
    struct SizedSource {
        sizes: HashMap<String, (u32, u32)>,
        decodes: AtomicUsize,
    }

    impl PageSource for SizedSource {
        fn decode(&self, locator: &PageLocator) -> Result<Page, SourceError> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            match self.sizes.get(locator.key()) {
                Some(&(w, h)) => Ok(Page::decoded(locator.key(), DynamicImage::new_rgb8(w, h))),
                None => Err(SourceError::NotFound(locator.path().to_path_buf())),
            }
        }
    }

    fn session(sizes: &[(u32, u32)], mode: PairMode) -> (Session, Arc<SizedSource>) {
        let source = Arc::new(SizedSource {
            sizes: sizes
                .iter()
                .enumerate()
                .map(|(i, s)| (format!("{i}.png"), *s))
                .collect(),
            decodes: AtomicUsize::new(0),
        });
        let pages: PageSet = (0..sizes.len())
            .map(|i| PageLocator::file(format!("{i}.png")))
            .collect();
        let config = SessionConfig {
            pair_mode: mode,
            preload: PreloadConfig {
                enabled: false,
                ..PreloadConfig::default()
            },
            placeholder: PlaceholderSpec {
                width: 10,
                height: 10,
            },
            ..SessionConfig::default()
        };
        (Session::new(pages, source.clone(), &config), source)
    }

    const PORTRAIT: (u32, u32) = (80, 120);
    const WIDE: (u32, u32) = (240, 120);

    #[test]
    fn page_at_caches_decodes() {
        let (s, src) = session(&[PORTRAIT, PORTRAIT], PairMode::Single);
        let a = s.page_at(1).unwrap();
        let b = s.page_at(1).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(src.decodes.load(Ordering::SeqCst), 1);
        assert!(s.page_at(2).is_none());
    }

    #[test]
    fn failure_is_cached_as_placeholder() {
        let (mut s, src) = session(&[PORTRAIT], PairMode::Single);
        // Extend the set with a page the source does not know.
        s.pages = Arc::new(
            ["0.png", "missing.png"]
                .into_iter()
                .map(PageLocator::file)
                .collect(),
        );
        s.nav.set_len(2);
        let page = s.page_at(1).unwrap();
        assert!(page.is_placeholder());
        assert_eq!(page.dimensions(), (10, 10));
        s.page_at(1);
        assert_eq!(src.decodes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn single_mode_spread() {
        let (mut s, _) = session(&[PORTRAIT, PORTRAIT, PORTRAIT], PairMode::Single);
        s.advance(Step::Next, false);
        let spread = s.current_spread();
        assert_eq!(spread.indices(), [1]);
        assert!(!spread.is_pair());
    }

    #[test]
    fn book_mode_pairs_compatible_pages() {
        let (mut s, _) = session(&[PORTRAIT; 5], PairMode::Book);
        assert_eq!(s.current_spread().indices(), [0, 1]);
        s.advance(Step::Next, false);
        assert_eq!(s.current_spread().indices(), [2, 3]);
        s.toggle_reading_direction();
        assert_eq!(s.current_spread().indices(), [3, 2]);
        s.advance(Step::Next, false);
        assert_eq!(s.current_spread().indices(), [4]);
    }

    #[test]
    fn book_mode_falls_back_for_incompatible_partner() {
        let (s, _) = session(&[PORTRAIT, WIDE, PORTRAIT], PairMode::Book);
        let spread = s.current_spread();
        assert_eq!(spread.indices(), [0]);
        let (current, partner) = s.current_pair().unwrap();
        assert_eq!(current.label(), "0.png");
        assert!(partner.is_none());
    }

    fn pair_labels(s: &Session) -> (String, Option<String>) {
        let (left, right) = s.current_pair().unwrap();
        (left.label().to_string(), right.map(|p| p.label().to_string()))
    }

    #[test]
    fn current_pair_follows_reading_direction() {
        let (mut s, _) = session(&[PORTRAIT; 3], PairMode::Book);
        assert_eq!(pair_labels(&s), ("0.png".into(), Some("1.png".into())));

        s.toggle_reading_direction();
        assert_eq!(pair_labels(&s), ("1.png".into(), Some("0.png".into())));

        s.jump_last().unwrap();
        assert_eq!(s.current_index(), 2);
        assert_eq!(pair_labels(&s), ("2.png".into(), None));
    }

    #[test]
    fn current_pair_in_rtl_drops_incompatible_partner() {
        let (mut s, _) = session(&[PORTRAIT, WIDE], PairMode::Book);
        s.toggle_reading_direction();
        assert_eq!(pair_labels(&s), ("0.png".into(), None));
    }

    #[test]
    fn toggles_keep_position() {
        let (mut s, _) = session(&[PORTRAIT; 6], PairMode::Single);
        s.jump_to(4).unwrap();
        assert_eq!(s.toggle_book_mode(), PairMode::Book);
        assert_eq!(s.current_index(), 3);
        assert_eq!(s.current_spread().indices(), [3, 4]);
    }

    #[test]
    fn jump_errors_leave_position() {
        let (mut s, _) = session(&[PORTRAIT; 3], PairMode::Single);
        s.jump_last().unwrap();
        assert_eq!(s.current_index(), 2);
        assert!(matches!(s.jump_to(4), Err(NavError::OutOfRange { .. })));
        assert_eq!(s.current_index(), 2);
        s.jump_first().unwrap();
        assert_eq!(s.current_index(), 0);
    }

    #[test]
    fn empty_session_is_inert() {
        let (mut s, _) = session(&[], PairMode::Book);
        assert!(s.current_page().is_none());
        assert!(matches!(s.current_spread(), Spread::Empty));
        assert!(s.advance(Step::Next, false).is_none());
        assert_eq!(s.rescan(), 0);
    }

    #[test]
    fn open_fails_without_pages() {
        let dir = tempfile::tempdir().unwrap();
        let err = Session::open(vec![dir.path().to_path_buf()], &SessionConfig::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("no pages found"), "{err}");
    }
}
