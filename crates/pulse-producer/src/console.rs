//! Operator commands for the producer: `set <bpm>`, `status`, `quit`.

use std::sync::Arc;

use pulse_broker::BeatPublisher;
use pulse_core::Command;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ProducerError;
use crate::producer::BeatProducer;

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
    /// Operator asked to stop the producer.
    Quit,
    /// Input reached end of file; beats keep flowing.
    InputClosed,
    /// The cancellation token fired.
    Cancelled,
}

impl ConsoleExit {
    /// Whether this exit asks the producer to stop.
    pub const fn is_shutdown(self) -> bool {
        !matches!(self, Self::InputClosed)
    }
}

/// Handle one input line against `producer`.
pub fn handle<P: BeatPublisher>(producer: &BeatProducer<P>, line: &str) -> Reply {
    match Command::parse(line) {
        Command::Empty => Reply::Silent,
        Command::Quit => Reply::Quit,
        Command::Status => Reply::Said(producer.status()),
        Command::SetBpm(requested) => match producer.bpm().set(requested) {
            Ok(bpm) => Reply::Said(format!("rate set to {bpm} BPM")),
            Err(e) => Reply::Rejected(e.to_string()),
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
/// End of input yields [`ConsoleExit::InputClosed`]; it is up to the
/// caller to keep the producer running.
///
/// # Errors
///
/// Returns [`ProducerError::Console`] if reading input fails.
pub async fn run<P, I>(
    producer: Arc<BeatProducer<P>>,
    input: I,
    cancel: &CancellationToken,
) -> Result<ConsoleExit, ProducerError>
where
    P: BeatPublisher,
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
            info!("command input closed, producer keeps running");
            return Ok(ConsoleExit::InputClosed);
        };

        match handle(&producer, &line) {
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
