//! Central role entry point
//!
//! Bundles discovery and connection management behind one object: scan for
//! peers, then open a session with one of them by id or name.

use beamchat_core::{SessionHandle, SessionRegistry};

use crate::config::BleLinkConfig;
use crate::connection::BleConnector;
use crate::discovery::BleDiscovery;
use crate::error::BleLinkError;
use crate::peer::DiscoveredPeer;

/// BLE central acting as chat initiator
pub struct BleCentral {
    config: BleLinkConfig,
    discovery: BleDiscovery,
    connector: BleConnector,
}

impl BleCentral {
    /// Initialize the first adapter
    pub async fn new(config: BleLinkConfig) -> Result<Self, BleLinkError> {
        let mut discovery = BleDiscovery::new(config.clone());
        discovery.initialize_adapter().await?;
        let adapter = discovery
            .adapter()
            .cloned()
            .ok_or(BleLinkError::AdapterNotAvailable)?;
        let connector = BleConnector::new(config.clone(), adapter);
        Ok(Self {
            config,
            discovery,
            connector,
        })
    }

    pub fn config(&self) -> &BleLinkConfig {
        &self.config
    }

    /// Scan for the configured duration
    pub async fn scan(&mut self) -> Result<Vec<DiscoveredPeer>, BleLinkError> {
        self.discovery.scan(self.config.scan_timeout).await
    }

    /// Scan, then connect to the peer matching `query` and start a session
    pub async fn connect(
        &mut self,
        registry: &mut SessionRegistry,
        query: &str,
    ) -> Result<SessionHandle, BleLinkError> {
        if self.discovery.find(query).is_err() {
            self.scan().await?;
        }
        let peer_id = self.discovery.find(query)?.peer_id;
        let peer = self
            .discovery
            .get_mut(&peer_id)
            .ok_or_else(|| BleLinkError::PeerNotFound {
                query: query.to_string(),
            })?;
        self.connector.open_session(registry, peer).await
    }

    /// Close the session and drop the connection to `query`
    pub async fn disconnect(
        &mut self,
        registry: &mut SessionRegistry,
        query: &str,
    ) -> Result<(), BleLinkError> {
        let peer_id = self.discovery.find(query)?.peer_id;
        registry.close(peer_id).await;
        if let Some(peer) = self.discovery.get_mut(&peer_id) {
            self.connector.disconnect(peer).await?;
        }
        Ok(())
    }
}
