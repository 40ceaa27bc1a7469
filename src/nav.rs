//! Navigation state and book-pairing policy.
//!
//! Pure logic, no I/O: the current index, single/book mode, reading
//! direction, step sizes with wraparound, and the aspect-ratio predicate that
//! decides whether two neighbours may be shown side by side.

use log::debug;
use thiserror::Error;

use crate::page::aspect_ratio;

/// One page per frame, or two adjacent pages side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairMode {
    #[default]
    Single,
    Book,
}

/// Which slot the current page occupies in book mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadingDirection {
    /// Western: current page on the left.
    #[default]
    Ltr,
    /// Manga: current page on the right.
    Rtl,
}

/// User-facing step direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Next,
    Previous,
}

/// How the current index was last reached. Also selects the preload window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavDirection {
    Forward,
    Backward,
    Jump,
}

impl NavDirection {
    pub fn name(self) -> &'static str {
        match self {
            NavDirection::Forward => "forward",
            NavDirection::Backward => "backward",
            NavDirection::Jump => "jump",
        }
    }
}

/// Emitted on every page change; feeds the preload coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavEvent {
    pub origin: usize,
    pub direction: NavDirection,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NavError {
    #[error("page {target} out of range (1-{total})")]
    OutOfRange { target: usize, total: usize },
    #[error("no pages")]
    Empty,
}

/// Page indices for the left and right slots of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairSlots {
    pub left: Option<usize>,
    pub right: Option<usize>,
}

/// Thresholds for the side-by-side compatibility predicate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairingConfig {
    /// Pages narrower than this (width / height) are never paired.
    pub aspect_min: f64,
    /// Pages wider than this are never paired.
    pub aspect_max: f64,
    /// Largest allowed ratio between the two aspect ratios.
    pub ratio_threshold: f64,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            aspect_min: 0.4,
            aspect_max: 2.5,
            ratio_threshold: 1.5,
        }
    }
}

impl PairingConfig {
    /// Whether two images of the given aspect ratios may share a frame.
    pub fn compatible_aspects(&self, a: f64, b: f64) -> bool {
        let in_band = |r: f64| r > 0.0 && r >= self.aspect_min && r <= self.aspect_max;
        if !in_band(a) || !in_band(b) {
            return false;
        }
        a.max(b) / a.min(b) <= self.ratio_threshold
    }

    /// Same as [`compatible_aspects`](Self::compatible_aspects), from pixel sizes.
    pub fn compatible(&self, a: (u32, u32), b: (u32, u32)) -> bool {
        self.compatible_aspects(aspect_ratio(a), aspect_ratio(b))
    }
}

/// Navigation over a page set of `len` pages.
///
/// Owned by the control thread only; no synchronization.
#[derive(Debug, Clone)]
pub struct NavigationState {
    current: usize,
    len: usize,
    pair_mode: PairMode,
    reading_direction: ReadingDirection,
    pending_direction: NavDirection,
}

impl NavigationState {
    pub fn new(len: usize, pair_mode: PairMode, reading_direction: ReadingDirection) -> Self {
        Self {
            current: 0,
            len,
            pair_mode,
            reading_direction,
            pending_direction: NavDirection::Jump,
        }
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn pair_mode(&self) -> PairMode {
        self.pair_mode
    }

    pub fn reading_direction(&self) -> ReadingDirection {
        self.reading_direction
    }

    pub fn pending_direction(&self) -> NavDirection {
        self.pending_direction
    }

    /// Install a new page count (after a rescan), clamping the index.
    pub fn set_len(&mut self, len: usize) {
        self.len = len;
        self.current = if len == 0 { 0 } else { self.current.min(len - 1) };
    }

    /// Move to `index`, clamped to the set, without producing an event.
    pub fn set_index(&mut self, index: usize) {
        self.current = index.min(self.len.saturating_sub(1));
        self.pending_direction = NavDirection::Jump;
    }

    /// Flip single/book. The index stays put and anchors the next pair.
    pub fn toggle_book_mode(&mut self) -> PairMode {
        self.pair_mode = match self.pair_mode {
            PairMode::Single => PairMode::Book,
            PairMode::Book => PairMode::Single,
        };
        debug!("nav: pair mode {:?}", self.pair_mode);
        self.pair_mode
    }

    /// Flip left/right assignment. The index stays put.
    pub fn toggle_reading_direction(&mut self) -> ReadingDirection {
        self.reading_direction = match self.reading_direction {
            ReadingDirection::Ltr => ReadingDirection::Rtl,
            ReadingDirection::Rtl => ReadingDirection::Ltr,
        };
        debug!("nav: reading direction {:?}", self.reading_direction);
        self.reading_direction
    }

    /// Step size for a move: 2 in book mode unless `single_step`, else 1.
    pub fn step_size(&self, single_step: bool) -> usize {
        if self.pair_mode == PairMode::Book && !single_step {
            2
        } else {
            1
        }
    }

    /// Move to the next or previous page (or pair), wrapping around.
    ///
    /// Moving back a whole pair from index 0 lands on the last even-aligned
    /// index instead of plain modular wrap.
    pub fn advance(&mut self, step: Step, single_step: bool) -> Option<NavEvent> {
        if self.len == 0 {
            return None;
        }
        let size = self.step_size(single_step);
        let old = self.current;
        let (new, direction) = match step {
            Step::Next => ((old + size) % self.len, NavDirection::Forward),
            Step::Previous if size == 2 && old == 0 => {
                (last_even_index(self.len), NavDirection::Backward)
            }
            Step::Previous => {
                let back = size % self.len;
                ((old + self.len - back) % self.len, NavDirection::Backward)
            }
        };
        self.current = new;
        self.pending_direction = direction;
        debug!("nav: {:?} {old} -> {new} (step={size}, len={})", step, self.len);
        Some(NavEvent {
            origin: new,
            direction,
        })
    }

    /// Jump to a 1-based page number. Out-of-range targets leave state alone.
    pub fn jump_to(&mut self, page_number: usize) -> Result<NavEvent, NavError> {
        if self.len == 0 {
            return Err(NavError::Empty);
        }
        if page_number == 0 || page_number > self.len {
            return Err(NavError::OutOfRange {
                target: page_number,
                total: self.len,
            });
        }
        let old = self.current;
        self.current = page_number - 1;
        self.pending_direction = NavDirection::Jump;
        debug!("nav: jump {old} -> {}", self.current);
        Ok(NavEvent {
            origin: self.current,
            direction: NavDirection::Jump,
        })
    }

    pub fn jump_first(&mut self) -> Result<NavEvent, NavError> {
        self.jump_to(1)
    }

    pub fn jump_last(&mut self) -> Result<NavEvent, NavError> {
        self.jump_to(self.len)
    }

    /// Slots shown for the current index. Single mode fills only the slot
    /// the current page would take in LTR (left).
    pub fn pair_slots(&self) -> PairSlots {
        if self.len == 0 {
            return PairSlots {
                left: None,
                right: None,
            };
        }
        let i = self.current;
        if self.pair_mode == PairMode::Single {
            return PairSlots {
                left: Some(i),
                right: None,
            };
        }
        let partner = (i + 1 < self.len).then_some(i + 1);
        match self.reading_direction {
            ReadingDirection::Ltr => PairSlots {
                left: Some(i),
                right: partner,
            },
            ReadingDirection::Rtl => PairSlots {
                left: partner,
                right: Some(i),
            },
        }
    }

    /// Index of the page paired with the current one in book mode, if any.
    pub fn partner_index(&self) -> Option<usize> {
        if self.pair_mode != PairMode::Book {
            return None;
        }
        let partner = self.current + 1;
        (partner < self.len).then_some(partner)
    }
}

/// Highest index at or below `len - 1` with even parity.
fn last_even_index(len: usize) -> usize {
    let last = len.saturating_sub(1);
    if last.is_multiple_of(2) { last } else { last - 1 }
}
