// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley serve` command implementation.
//!
//! Wires the console transport, the conversation log store, the ticket
//! backend and (when compiled in and enabled) the Prometheus exporter into a
//! [`BridgeService`], then runs until a signal, `/quit`, or the end of
//! console input.

use std::sync::Arc;
use std::time::Duration;

use parley_bridge::{
    BridgeService, DEFAULT_DRAIN_TIMEOUT, MessageBridge, MonitorSettings, install_signal_handler,
};
use parley_config::ParleyConfig;
use parley_core::{ParleyError, TicketBackend};
use parley_helpdesk::HelpdeskBackend;
use parley_transcript::ConversationLogStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::console::{ConsoleCommand, LoopbackTransport, render_event};

/// How often queued events are printed.
const EVENT_FLUSH_INTERVAL: Duration = Duration::from_millis(200);

/// Runs the `parley serve` command.
pub async fn run_serve(config: ParleyConfig) -> Result<(), ParleyError> {
    init_tracing(&config.agent.log_level);

    let owner = crate::commands::owner_name(&config)?;
    let jid = config.account.jid.as_deref().unwrap_or(&owner);
    let bound = format!("{jid}/{}", config.account.resource);

    #[cfg(feature = "prometheus")]
    let _prometheus = start_prometheus(&config);

    let shutdown = CancellationToken::new();
    install_signal_handler(shutdown.clone());

    let transcript = Arc::new(ConversationLogStore::new(&config.transcript.dir));
    let (transport, commands) = LoopbackTransport::stdin(bound);
    let mut builder = MessageBridge::builder(owner, Arc::new(transport), transcript)
        .monitor_settings(MonitorSettings::from(&config.monitor))
        .shutdown_token(shutdown.clone());
    match build_backend(&config)? {
        Some(backend) => builder = builder.backend(backend),
        None => warn!("no backend configured, messages are only logged"),
    }
    let service = BridgeService::new(builder.build());

    service.connect().await?;
    info!(
        transcript_dir = %config.transcript.dir,
        poll_interval_secs = config.monitor.poll_interval_secs,
        "parley serving on the console"
    );

    console_loop(&service, commands, &shutdown).await;

    if !service.shutdown(DEFAULT_DRAIN_TIMEOUT).await {
        warn!("some bridge tasks did not stop in time");
    }
    flush_events(&service);
    info!("parley stopped");
    Ok(())
}

/// Builds the ticket backend client when a base URL is configured.
pub fn build_backend(config: &ParleyConfig) -> Result<Option<Arc<dyn TicketBackend>>, ParleyError> {
    if config.backend.base_url.is_none() {
        return Ok(None);
    }
    let backend = HelpdeskBackend::new(&config.backend)?;
    Ok(Some(Arc::new(backend)))
}

async fn console_loop(
    service: &BridgeService,
    mut commands: mpsc::UnboundedReceiver<ConsoleCommand>,
    shutdown: &CancellationToken,
) {
    let mut flush = tokio::time::interval(EVENT_FLUSH_INTERVAL);
    loop {
        tokio::select! {
            // Commands read before the input ended still run.
            biased;
            _ = shutdown.cancelled() => break,
            command = commands.recv() => match command {
                Some(ConsoleCommand::Quit) | None => break,
                Some(command) => run_command(service, command).await,
            },
            _ = flush.tick() => {
                flush_events(service);
                if !service.is_connected().await {
                    debug!("console session ended");
                    break;
                }
            }
        }
    }
}

async fn run_command(service: &BridgeService, command: ConsoleCommand) {
    let result = match command {
        ConsoleCommand::Send { to, body } => service.send_message(&to, &body).await.map(|_| ()),
        ConsoleCommand::Status { kind, message } => {
            service.set_presence_status(kind, message.as_deref()).await
        }
        ConsoleCommand::Contacts => {
            for contact in service.get_contacts().await {
                match contact.name {
                    Some(name) => println!("  {} ({name}) [{}]", contact.address, contact.source),
                    None => println!("  {} [{}]", contact.address, contact.source),
                }
            }
            Ok(())
        }
        ConsoleCommand::Quit => Ok(()),
    };
    if let Err(e) = result {
        warn!(error = %e, "console command failed");
        eprintln!("{}", render_event(&parley_core::ChatEvent::Error(e.to_string())));
    }
}

fn flush_events(service: &BridgeService) {
    for event in service.get_queued_events() {
        println!("{}", render_event(&event));
    }
}

#[cfg(feature = "prometheus")]
fn start_prometheus(config: &ParleyConfig) -> Option<parley_prometheus::PrometheusAdapter> {
    if !config.prometheus.enabled {
        debug!("prometheus metrics disabled by configuration");
        return None;
    }
    let listen = match config.prometheus.listen.parse() {
        Ok(listen) => listen,
        Err(e) => {
            warn!(listen = %config.prometheus.listen, error = %e, "invalid prometheus listen address");
            return None;
        }
    };
    match parley_prometheus::PrometheusAdapter::install(listen) {
        Ok(adapter) => {
            info!(listen = %adapter.listen_addr(), "prometheus metrics enabled");
            Some(adapter)
        }
        Err(e) => {
            warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            None
        }
    }
}

/// Initializes the tracing subscriber; `RUST_LOG` overrides `log_level`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("parley={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
