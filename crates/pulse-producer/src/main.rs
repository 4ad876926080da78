//! Heartbeat producer entry point.
//!
//! Publishes beats for one subject to the broker (or logs them in dry run)
//! and reads `set <bpm>`, `status` and `quit` from stdin. Closed stdin
//! leaves the producer running until Ctrl-C.

use std::sync::Arc;

use pulse_broker::JetStreamPublisher;
use pulse_core::{BpmSetting, PulseConfig};
use pulse_producer::console::{self, ConsoleExit};
use pulse_producer::{generate_subject_id, BeatProducer, ProducerHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the broker cannot be
/// reached at startup.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("pulse-producer starting");

    let config = PulseConfig::load()?;
    let subject_id = config
        .producer
        .subject_id
        .clone()
        .unwrap_or_else(generate_subject_id);
    let bpm = Arc::new(BpmSetting::new(config.producer.initial_bpm)?);

    let publisher = match config.broker.url.as_deref() {
        Some(url) if !config.is_dry_run() => {
            Some(JetStreamPublisher::connect(url, &config.broker.topic).await?)
        }
        _ => {
            info!("no broker configured, beats will only be logged (dry run)");
            None
        }
    };
    info!(
        subject_id = subject_id,
        bpm = bpm.get(),
        topic = config.broker.topic,
        "configuration loaded"
    );

    let cancel = CancellationToken::new();
    let producer = Arc::new(BeatProducer::new(subject_id, bpm, publisher));
    let handle = ProducerHandle::spawn(
        Arc::clone(&producer),
        config.monitor.shutdown_grace(),
        &cancel,
    );

    info!("producer running; commands: set <bpm>, status, quit");
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let exit = tokio::select! {
        result = console::run(Arc::clone(&producer), stdin, &cancel) => {
            result.unwrap_or_else(|e| {
                warn!(error = %e, "command input failed");
                ConsoleExit::InputClosed
            })
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received");
            ConsoleExit::Cancelled
        }
    };
    if !exit.is_shutdown() {
        info!("no command input, publishing until Ctrl-C");
        wait_for_interrupt(&cancel).await;
    }

    cancel.cancel();
    handle.stop().await;
    info!(beats = producer.beats_emitted(), "pulse-producer stopped");
    Ok(())
}

/// Block until Ctrl-C or `cancel` fires.
async fn wait_for_interrupt(cancel: &CancellationToken) {
    tokio::select! {
        () = cancel.cancelled() => {}
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("interrupt received"),
            Err(e) => {
                warn!(error = %e, "cannot listen for Ctrl-C, running until cancelled");
                cancel.cancelled().await;
            }
        },
    }
}
