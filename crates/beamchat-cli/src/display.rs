//! Terminal formatting for messages and scan results

use beamchat_ble::DiscoveredPeer;
use beamchat_core::{Direction, Message, Timestamp};
use serde::Serialize;

use crate::config::CliConfig;

/// One line of `beamchat scan` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerRow {
    pub peer_id: String,
    pub name: String,
    pub rssi: Option<i16>,
}

impl From<&DiscoveredPeer> for PeerRow {
    fn from(peer: &DiscoveredPeer) -> Self {
        Self {
            peer_id: peer.peer_id.to_string(),
            name: peer.display_name().to_string(),
            rssi: peer.rssi(),
        }
    }
}

/// Render scan results as an aligned table
pub fn format_peer_table(rows: &[PeerRow]) -> String {
    if rows.is_empty() {
        return "No BeamChat peers found".to_string();
    }
    let width = rows.iter().map(|row| row.name.len()).max().unwrap_or(0).max(4);
    let mut out = format!("{:<16}  {:<width$}  RSSI\n", "PEER", "NAME");
    for row in rows {
        let rssi = row
            .rssi
            .map(|rssi| format!("{} dBm", rssi))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!("{:<16}  {:<width$}  {}\n", row.peer_id, row.name, rssi));
    }
    out
}

/// Render a chat message as one terminal line
pub fn format_message(message: &Message, config: &CliConfig) -> String {
    let who = match message.direction() {
        Direction::Outgoing => config.self_label.as_str(),
        Direction::Incoming => message.sender_name().unwrap_or("peer"),
    };
    if config.show_timestamps {
        format!("[{}] <{}> {}", format_clock(message.timestamp()), who, message.text())
    } else {
        format!("<{}> {}", who, message.text())
    }
}

/// UTC wall-clock time of day
pub fn format_clock(timestamp: Timestamp) -> String {
    let secs = timestamp.as_millis() / 1000;
    format!(
        "{:02}:{:02}:{:02}",
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60
    )
}
