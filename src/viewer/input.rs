//! Input processing layer: command mapping and numeric prefix accumulator.
//!
//! Pure logic, no I/O. All functions are deterministic and testable.

const MAX_COUNT: u32 = 999_999;
const ESC: char = '\x1b';

/// Accumulated numeric prefix for vim/less-style commands.
///
/// Users type digits then a command character: `12g` jumps to page 12,
/// `3n` moves forward three times.
pub(super) struct InputAccumulator {
    count: Option<u32>,
}

impl InputAccumulator {
    pub(super) fn new() -> Self {
        Self { count: None }
    }

    /// Feed a digit (0-9). Returns false if overflow would occur.
    fn push_digit(&mut self, d: u32) -> bool {
        let current = self.count.unwrap_or(0);
        let new = current.saturating_mul(10).saturating_add(d);
        if new > MAX_COUNT {
            return false; // ignore further digits
        }
        self.count = Some(new);
        true
    }

    /// Take the accumulated count, resetting to None.
    fn take(&mut self) -> Option<u32> {
        self.count.take()
    }

    /// Peek at the current accumulated count without consuming it.
    pub(super) fn peek(&self) -> Option<u32> {
        self.count
    }

    pub(super) fn reset(&mut self) {
        self.count = None;
    }

    pub(super) fn is_active(&self) -> bool {
        self.count.is_some()
    }
}

/// Actions produced by command input processing.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Action {
    Quit,
    Next(u32),
    Prev(u32),
    /// Move one page even in book mode.
    NextSingle(u32),
    PrevSingle(u32),
    JumpFirst,
    JumpLast,
    JumpToPage(u32),
    ToggleBook,
    ToggleDirection,
    TogglePreload,
    Stats,
    Rescan,
    CancelInput,
    /// A digit was accumulated; caller should refresh the status line.
    Digit,
}

/// Map one command character to an `Action`, consuming/updating the
/// accumulator as needed.
///
/// Returns `None` for unknown characters (caller should reset accumulator).
pub(super) fn map_char(c: char, acc: &mut InputAccumulator) -> Option<Action> {
    match c {
        // Quit (always immediate)
        'q' => Some(Action::Quit),

        // Esc: cancel pending input
        ESC => {
            acc.reset();
            Some(Action::CancelInput)
        }

        // Digits: accumulate
        '0'..='9' => {
            let d = c as u32 - '0' as u32;
            acc.push_digit(d);
            Some(Action::Digit)
        }

        'n' | 'l' | ' ' => Some(Action::Next(acc.take().unwrap_or(1))),
        'p' | 'h' => Some(Action::Prev(acc.take().unwrap_or(1))),
        'N' => Some(Action::NextSingle(acc.take().unwrap_or(1))),
        'P' => Some(Action::PrevSingle(acc.take().unwrap_or(1))),

        // First page / jump
        'g' => match acc.take() {
            None => Some(Action::JumpFirst),
            Some(n) => Some(Action::JumpToPage(n)),
        },
        // Last page / jump
        'G' => match acc.take() {
            None => Some(Action::JumpLast),
            Some(n) => Some(Action::JumpToPage(n)),
        },

        'b' => toggle(acc, Action::ToggleBook),
        'r' => toggle(acc, Action::ToggleDirection),
        'x' => toggle(acc, Action::TogglePreload),
        's' => toggle(acc, Action::Stats),
        'R' => toggle(acc, Action::Rescan),

        _ => None,
    }
}

/// Commands that take no count drop any pending prefix.
fn toggle(acc: &mut InputAccumulator, action: Action) -> Option<Action> {
    acc.reset();
    Some(action)
}
