//! Command handlers for the BeamChat CLI

use std::time::Duration;

use beamchat_ble::BleCentral;
use beamchat_core::{ChatLog, MalformedReason, PeerEvent, SessionEvent, SessionRegistry};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::cli::{Cli, Commands};
use crate::config::{AppConfig, CliConfig};
use crate::display::{format_message, format_peer_table, PeerRow};
use crate::error::Result;
use crate::simulate::{chunk_preview, run_simulation, SimulationSettings};

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        match cli.command {
            Commands::Scan { timeout, json } => {
                Self::handle_scan_command(config, timeout, json).await
            }
            Commands::Chat { peer, name } => Self::handle_chat_command(config, peer, name).await,
            Commands::Simulate {
                discipline,
                chunk_size,
                capacity,
                messages,
            } => {
                let settings = SimulationSettings {
                    discipline,
                    chunk_size,
                    capacity,
                };
                Self::handle_simulate_command(config, settings, messages).await
            }
        }
    }

    /// List peers advertising the service
    async fn handle_scan_command(
        mut config: AppConfig,
        timeout: Option<u64>,
        json: bool,
    ) -> Result<()> {
        if let Some(secs) = timeout {
            config.ble.scan_timeout = Duration::from_secs(secs);
        }
        info!("Scanning for {:?}...", config.ble.scan_timeout);

        let mut central = BleCentral::new(config.ble).await?;
        let peers = central.scan().await?;
        let rows: Vec<PeerRow> = peers.iter().map(PeerRow::from).collect();

        if json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        } else {
            print!("{}", format_peer_table(&rows));
            if rows.is_empty() {
                println!();
            }
        }
        Ok(())
    }

    /// Connect to one peer and chat line by line
    async fn handle_chat_command(
        mut config: AppConfig,
        peer: String,
        name: Option<String>,
    ) -> Result<()> {
        if let Some(name) = name {
            config.protocol.local_name = name;
        }
        let (mut registry, mut events) = SessionRegistry::new(config.protocol.clone())?;
        let mut central = BleCentral::new(config.ble.clone()).await?;

        info!("Connecting to {}...", peer);
        let session = central.connect(&mut registry, &peer).await?;
        println!("Connected. Type a message and press enter; Ctrl-D quits.");

        let mut log = ChatLog::new(config.protocol.chat_log_capacity);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        if let Err(e) = session.send_message(line).await {
                            println!("Not sent: {}", e);
                            if !e.is_recoverable() {
                                break;
                            }
                        }
                    }
                    None => break,
                },
                event = events.recv() => match event {
                    Some(PeerEvent { event, .. }) => {
                        if !Self::show_event(event, &mut log, &config.cli) {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        if let Err(e) = central.disconnect(&mut registry, &peer).await {
            warn!("Disconnect failed: {}", e);
        }
        registry.close_all().await;
        Ok(())
    }

    /// Print one session event; false once the session has closed
    fn show_event(event: SessionEvent, log: &mut ChatLog, cli: &CliConfig) -> bool {
        match event {
            SessionEvent::Established => println!("Session established"),
            SessionEvent::PeerNamed(name) => println!("Peer is {}", name),
            SessionEvent::MessageSent(message) | SessionEvent::MessageReceived(message) => {
                println!("{}", format_message(&message, cli));
                log.push(message);
            }
            SessionEvent::SendFailed { error, .. } => println!("Message not delivered: {}", error),
            SessionEvent::MalformedMessage { reason, .. } => match reason {
                MalformedReason::InvalidUtf8 { len } => {
                    println!("Dropped a {} byte message that was not UTF-8", len)
                }
                MalformedReason::Oversized { limit } => {
                    println!("Dropped a message larger than {} bytes", limit)
                }
            },
            SessionEvent::Closed => {
                println!("Connection closed");
                log.clear();
                return false;
            }
        }
        true
    }

    /// Run two in-memory sessions and report the chunk flow
    async fn handle_simulate_command(
        config: AppConfig,
        settings: SimulationSettings,
        messages: Vec<String>,
    ) -> Result<()> {
        println!(
            "Simulating {} with chunk size {}",
            settings.discipline, settings.chunk_size
        );
        let reports = run_simulation(&config.protocol, &settings, &messages).await?;
        for report in reports {
            println!("{:?}", report.message);
            println!("  chunks:    {:?}", chunk_preview(&report.message, settings.chunk_size));
            println!("  emitted:   {}", report.chunks);
            println!("  busy:      {}", report.busy_signals);
            println!("  delivered: {:?}", report.delivered);
        }
        Ok(())
    }
}
