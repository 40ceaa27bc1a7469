//! Command input: stdin lines read on a background thread.
//!
//! `CommandReader` spawns a reader thread that sends whole lines via
//! `mpsc::channel`, avoiding platform-specific non-blocking I/O. The control
//! thread waits with a timeout so it can keep servicing the file watcher
//! while no command is pending.

use std::io::{self, BufRead, BufReader, Read};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A message from the reader thread.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandLine {
    Line(String),
    Eof,
}

/// Reads stdin in a background thread, sending lines over a channel.
pub struct CommandReader {
    rx: mpsc::Receiver<CommandLine>,
    _handle: JoinHandle<()>,
}

impl Default for CommandReader {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandReader {
    /// Spawn the reader thread over stdin.
    pub fn new() -> Self {
        Self::from_reader(io::stdin())
    }

    /// Spawn a reader thread from an arbitrary `Read` source.
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let mut reader = BufReader::new(reader);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => {
                        let _ = tx.send(CommandLine::Eof);
                        break;
                    }
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf);
                        let line = line.trim_end_matches(['\n', '\r']).to_string();
                        if tx.send(CommandLine::Line(line)).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => {
                        let _ = tx.send(CommandLine::Eof);
                        break;
                    }
                }
            }
        });

        Self {
            rx,
            _handle: handle,
        }
    }

    /// Wait up to `timeout` for the next line. `None` on timeout; a vanished
    /// reader thread is reported as EOF.
    pub fn next_timeout(&self, timeout: Duration) -> Option<CommandLine> {
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(CommandLine::Eof),
        }
    }
}
