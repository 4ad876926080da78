//! Operator commands for the running monitor.
//!
//! Lines are read from any async reader (stdin in the binary) and parsed
//! with [`Command::parse`]. Replies go to the log: accepted commands at
//! `info`, rejected ones at `warn`. `set <bpm>` only applies to the
//! synthetic source, so it is refused when beats come from the broker.

use std::sync::Arc;

use pulse_core::{BpmSetting, Command};
use pulse_types::MonitorSnapshot;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::MonitorError;
use crate::service::status_lines;

/// Result of handling one command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Command accepted; message for the operator.
    Said(String),
    /// Command refused; nothing changed.
    Rejected(String),
    /// Operator asked to stop.
    Quit,
    /// Blank line.
    Silent,
}

/// Why the command reader stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// Operator typed `quit` or `exit`; the monitor should shut down.
    Quit,
    /// Input reached end of file. Only the reader stops; the monitor keeps
    /// running until interrupted.
    InputClosed,
    /// The cancellation token fired.
    Cancelled,
}

impl ConsoleExit {
    /// Whether this exit asks the whole monitor to stop.
    pub const fn is_shutdown(self) -> bool {
        matches!(self, Self::Quit | Self::Cancelled)
    }
}

/// Command handler bound to the monitor's shared state.
#[derive(Debug)]
pub struct MonitorConsole {
    bpm: Option<Arc<BpmSetting>>,
    snapshot: watch::Receiver<MonitorSnapshot>,
}

impl MonitorConsole {
    /// Create a handler. Pass the synthetic rate in dry run, `None` when
    /// consuming from the broker.
    pub const fn new(
        bpm: Option<Arc<BpmSetting>>,
        snapshot: watch::Receiver<MonitorSnapshot>,
    ) -> Self {
        Self { bpm, snapshot }
    }

    /// Handle one input line.
    pub fn handle(&self, line: &str) -> Reply {
        match Command::parse(line) {
            Command::Empty => Reply::Silent,
            Command::Quit => Reply::Quit,
            Command::Status => {
                let snapshot = self.snapshot.borrow().clone();
                let mut lines = status_lines(&snapshot);
                if lines.is_empty() {
                    lines.push("no beats received yet".to_owned());
                }
                if let Some(bpm) = &self.bpm {
                    lines.push(format!("synthetic rate: {} BPM", bpm.get()));
                }
                Reply::Said(lines.join("\n"))
            }
            Command::SetBpm(requested) => match &self.bpm {
                None => Reply::Rejected(
                    "set is only available in dry run; the rate comes from the broker".to_owned(),
                ),
                Some(bpm) => match bpm.set(requested) {
                    Ok(bpm) => Reply::Said(format!("synthetic rate set to {bpm} BPM")),
                    Err(e) => Reply::Rejected(e.to_string()),
                },
            },
            Command::InvalidBpm(arg) => {
                Reply::Rejected(format!("invalid BPM '{arg}': usage is set <bpm>"))
            }
            Command::Unknown(line) => Reply::Rejected(format!(
                "unknown command '{line}': try set <bpm>, status or quit"
            )),
        }
    }

    /// Read commands until `quit`, end of input or cancellation.
    ///
    /// End of input is reported as [`ConsoleExit::InputClosed`] and does
    /// not by itself stop the monitor.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Console`] if reading input fails.
    pub async fn run<I>(
        &self,
        input: I,
        cancel: &CancellationToken,
    ) -> Result<ConsoleExit, MonitorError>
    where
        I: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            let line = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(ConsoleExit::Cancelled),
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                info!("command input closed, monitor keeps running");
                return Ok(ConsoleExit::InputClosed);
            };

            match self.handle(&line) {
                Reply::Said(msg) => info!("{msg}"),
                Reply::Rejected(msg) => warn!("{msg}"),
                Reply::Silent => {}
                Reply::Quit => {
                    info!("quit requested");
                    return Ok(ConsoleExit::Quit);
                }
            }
        }
    }
}
