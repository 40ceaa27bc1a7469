//! One-line textual frame description printed after every command.

use crate::nav::{PairMode, ReadingDirection};
use crate::page::Page;
use crate::session::{Session, Spread};

/// `[3-4/10] book rtl | 004.png 800x1200 | 003.png 800x1200 | 3_ | msg`
pub(super) fn status_line(session: &Session, prefix: Option<u32>, flash: Option<&str>) -> String {
    let spread = session.current_spread();
    let mut parts = vec![format!(
        "{} {} {}",
        position(&spread, session.len()),
        match session.pair_mode() {
            PairMode::Single => "single",
            PairMode::Book => "book",
        },
        match session.reading_direction() {
            ReadingDirection::Ltr => "ltr",
            ReadingDirection::Rtl => "rtl",
        }
    )];
    parts.extend(spread.pages().into_iter().map(|p| describe(p)));
    if let Some(n) = prefix {
        parts.push(format!("{n}_"));
    }
    if let Some(msg) = flash {
        parts.push(msg.to_string());
    }
    parts.join(" | ")
}

fn position(spread: &Spread, len: usize) -> String {
    let shown = spread.indices();
    match (shown.iter().min(), shown.iter().max()) {
        (Some(lo), Some(hi)) if lo != hi => format!("[{}-{}/{len}]", lo + 1, hi + 1),
        (Some(i), _) => format!("[{}/{len}]", i + 1),
        _ => format!("[-/{len}]"),
    }
}

fn describe(page: &Page) -> String {
    match page.failure() {
        Some(reason) => format!("{} (unreadable: {reason})", page.label()),
        None => format!("{} {}x{}", page.label(), page.width(), page.height()),
    }
}
