//! Heartbeat monitor entry point.
//!
//! Loads configuration, picks the beat source (broker when `broker.url` is
//! set, synthetic otherwise), starts the ingestion and reporting loops and
//! reads operator commands from stdin. `quit` or Ctrl-C stops the monitor;
//! closed stdin only stops the command reader.

use std::sync::Arc;

use pulse_broker::JetStreamReceiver;
use pulse_core::{BpmSetting, PulseConfig};
use pulse_monitor::{
    AlertDispatcher, BeatSource, BrokerSource, ConsoleExit, Ingestor, MonitorConsole,
    MonitorService, SyntheticSource,
};
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

    info!("pulse-monitor starting");

    let config = PulseConfig::load()?;
    info!(
        window_size = config.monitor.window_size,
        escalation_threshold_secs = config.monitor.escalation_threshold_secs,
        topic = config.broker.topic,
        dry_run = config.is_dry_run(),
        "configuration loaded"
    );

    let cancel = CancellationToken::new();
    let dispatcher = AlertDispatcher::from_config(&config.alert, cancel.clone())?;
    if dispatcher.is_dry_run() {
        info!("no triage URL configured, incidents will only be logged");
    }

    let ingestor = Ingestor::new(
        config.monitor.window_size,
        config.monitor.escalation_threshold(),
        dispatcher,
    )
    .with_max_subjects(config.monitor.max_subjects);

    let (source, bpm): (BeatSource<JetStreamReceiver>, _) = match config.broker.url.as_deref() {
        Some(url) if !config.is_dry_run() => {
            let receiver =
                JetStreamReceiver::connect(url, &config.broker.topic, &config.broker.subscription)
                    .await?;
            (
                BeatSource::Broker(BrokerSource::from_config(receiver, &config.broker)),
                None,
            )
        }
        _ => {
            info!(
                subject_id = config.monitor.subject_id,
                bpm = config.monitor.initial_bpm,
                "no broker configured, generating beats locally (dry run)"
            );
            let bpm = Arc::new(BpmSetting::new(config.monitor.initial_bpm)?);
            (
                BeatSource::Synthetic(SyntheticSource::new(
                    config.monitor.subject_id.clone(),
                    Arc::clone(&bpm),
                )),
                Some(bpm),
            )
        }
    };

    let console = MonitorConsole::new(bpm, ingestor.subscribe());
    let service = MonitorService::start(
        source,
        ingestor,
        config.monitor.report_interval(),
        config.monitor.shutdown_grace(),
        cancel.clone(),
    );

    info!("monitor running; commands: set <bpm>, status, quit");
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let exit = tokio::select! {
        result = console.run(stdin, &cancel) => result.unwrap_or_else(|e| {
            warn!(error = %e, "command input failed");
            ConsoleExit::InputClosed
        }),
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received");
            ConsoleExit::Cancelled
        }
    };
    if !exit.is_shutdown() {
        info!("no command input, running until Ctrl-C");
        wait_for_interrupt(&cancel).await;
    }

    service.stop().await;
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
