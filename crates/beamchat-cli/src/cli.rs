//! Command-line interface definitions and parsing

use beamchat_core::Discipline;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List nearby peers advertising the BeamChat service
    Scan {
        /// Seconds to listen for advertisements
        #[arg(short, long)]
        timeout: Option<u64>,
        /// Print the peer list as JSON
        #[arg(long)]
        json: bool,
    },
    /// Connect to a peer and chat; lines from stdin are sent as messages
    Chat {
        /// Peer id (hex) or advertised-name prefix
        #[arg(short, long)]
        peer: String,
        /// Display name sent to the peer
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Run two in-memory sessions and show how messages are chunked
    Simulate {
        /// Transmit discipline of the sending side: push or ack
        #[arg(short, long, default_value = "push")]
        discipline: Discipline,
        /// Maximum chunk size in bytes
        #[arg(long, default_value_t = 20)]
        chunk_size: usize,
        /// Chunks a push link holds before reporting busy
        #[arg(long, default_value_t = 2)]
        capacity: usize,
        /// Messages to send
        #[arg(required = true)]
        messages: Vec<String>,
    },
}
