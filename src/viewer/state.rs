//! Command application: turn actions into session calls and flash messages.

use log::debug;

use super::input::Action;
use crate::nav::{PairMode, ReadingDirection, Step};
use crate::session::Session;

/// Why the command loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Quit,
    Eof,
}

/// What the loop should do after an action.
pub(super) enum Outcome {
    Continue,
    Quit,
}

/// Apply one action to the session. Messages for the user land in `flash`.
pub(super) fn apply(session: &mut Session, action: Action, flash: &mut Option<String>) -> Outcome {
    debug!("viewer: {action:?}");
    match action {
        Action::Quit => return Outcome::Quit,
        Action::CancelInput | Action::Digit => {}

        Action::Next(count) => repeat(session, Step::Next, false, count),
        Action::Prev(count) => repeat(session, Step::Previous, false, count),
        Action::NextSingle(count) => repeat(session, Step::Next, true, count),
        Action::PrevSingle(count) => repeat(session, Step::Previous, true, count),

        Action::JumpFirst => report(session.jump_first(), flash),
        Action::JumpLast => report(session.jump_last(), flash),
        Action::JumpToPage(n) => report(session.jump_to(n as usize), flash),

        Action::ToggleBook => {
            let mode = session.toggle_book_mode();
            *flash = Some(match mode {
                PairMode::Single => "single page".into(),
                PairMode::Book => "book mode".into(),
            });
        }
        Action::ToggleDirection => {
            let dir = session.toggle_reading_direction();
            *flash = Some(match dir {
                ReadingDirection::Ltr => "left to right".into(),
                ReadingDirection::Rtl => "right to left".into(),
            });
        }
        Action::TogglePreload => {
            let enabled = !session.preload_enabled();
            session.set_preload_enabled(enabled);
            *flash = Some(format!("preload {}", on_off(session.preload_enabled())));
        }
        Action::Stats => *flash = Some(stats_line(session)),
        Action::Rescan => {
            let n = session.rescan();
            *flash = Some(format!("rescanned: {n} page(s)"));
        }
    }
    Outcome::Continue
}

fn repeat(session: &mut Session, step: Step, single_step: bool, count: u32) {
    for _ in 0..count.max(1) {
        if session.advance(step, single_step).is_none() {
            break;
        }
    }
}

fn report<E: std::fmt::Display>(result: Result<(), E>, flash: &mut Option<String>) {
    if let Err(e) = result {
        *flash = Some(e.to_string());
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

/// Cache and preload counters for the `s` command.
pub(super) fn stats_line(session: &Session) -> String {
    let cache = session.cache_stats();
    let preload = session.preload_stats();
    format!(
        "cache {}/{} hits={} misses={} evictions={} | preload {} queue={} loaded={} failed={} last={}",
        session.cache().len(),
        session.cache().capacity(),
        cache.hits,
        cache.misses,
        cache.evictions,
        on_off(session.preload_enabled()),
        preload.queue_depth,
        preload.loaded,
        preload.failed,
        preload.last_direction.map_or("-", |d| d.name()),
    )
}
