//! Command-driven front end.
//!
//! Commands arrive as stdin lines from a reader thread. Each line is fed
//! through the key mapper one character at a time, so `3n` or `12g` behave
//! like typed keystrokes. After every line one status line describing the
//! current frame is written to the output.
//!
//! The loop also services the input watcher: while no command is pending it
//! wakes every `WATCH_POLL` to check for settled changes and rescans.

mod input;
mod state;
mod status;

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::Config;
use crate::input::{CommandLine, CommandReader};
use crate::session::Session;
use crate::watch::DirWatcher;

use input::{InputAccumulator, map_char};
use state::Outcome;

pub use state::ExitReason;

const WATCH_POLL: Duration = Duration::from_millis(50);
const IDLE_WAIT: Duration = Duration::from_secs(86400);

/// Run the viewer over `inputs`, reading commands from stdin.
pub fn run(inputs: Vec<PathBuf>, config: &Config) -> anyhow::Result<()> {
    let mut session = Session::open(inputs.clone(), &config.session)?;

    let mut watcher = if config.viewer.watch {
        match DirWatcher::new(&inputs, config.viewer.watch_debounce) {
            Ok(w) => Some(w),
            Err(e) => {
                warn!("watch: disabled: {e:#}");
                None
            }
        }
    } else {
        None
    };

    let reader = CommandReader::new();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let exit = drive(&mut session, &reader, watcher.as_mut(), &mut out)?;
    info!("viewer: exit ({exit:?})");
    Ok(())
}

/// The command loop. Returns when `q` is read or the input ends.
pub fn drive<W: Write>(
    session: &mut Session,
    reader: &CommandReader,
    mut watcher: Option<&mut DirWatcher>,
    out: &mut W,
) -> anyhow::Result<ExitReason> {
    let mut acc = InputAccumulator::new();
    writeln!(out, "{}", status::status_line(session, None, None))?;
    out.flush()?;

    loop {
        let timeout = if watcher.is_some() {
            WATCH_POLL
        } else {
            IDLE_WAIT
        };
        match reader.next_timeout(timeout) {
            Some(CommandLine::Line(line)) => {
                let mut flash: Option<String> = None;
                for c in line.chars() {
                    match map_char(c, &mut acc) {
                        Some(action) => {
                            if let Outcome::Quit = state::apply(session, action, &mut flash) {
                                return Ok(ExitReason::Quit);
                            }
                        }
                        None => {
                            // Unknown key: reset accumulator
                            if acc.is_active() {
                                debug!("viewer: {c:?} drops pending count {:?}", acc.peek());
                                acc.reset();
                            } else {
                                debug!("viewer: ignoring {c:?}");
                            }
                        }
                    }
                }
                writeln!(
                    out,
                    "{}",
                    status::status_line(session, acc.peek(), flash.as_deref())
                )?;
                out.flush()?;
            }
            Some(CommandLine::Eof) => return Ok(ExitReason::Eof),
            None => {}
        }

        if let Some(w) = watcher.as_mut()
            && w.poll()
        {
            info!("viewer: inputs changed, rescanning");
            let n = session.rescan();
            let flash = format!("inputs changed: {n} page(s)");
            writeln!(out, "{}", status::status_line(session, acc.peek(), Some(&flash)))?;
            out.flush()?;
        }
    }
}
