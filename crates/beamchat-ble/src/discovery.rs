//! BLE device discovery and scanning
//!
//! Scans for peripherals advertising the BeamChat service. Sightings are
//! keyed by peer id (derived from the platform peripheral id), so repeated
//! advertisements update one entry instead of piling up duplicates.

use std::collections::HashMap;
use std::time::Duration;

use beamchat_core::PeerId;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use futures::stream::StreamExt;
use tracing::{debug, info, trace};

use crate::config::BleLinkConfig;
use crate::error::BleLinkError;
use crate::peer::{Advertisement, DiscoveredPeer};
use crate::protocol::{matches_peer, peer_id_for, BEAMCHAT_SERVICE_UUID};

// ----------------------------------------------------------------------------
// Discovery Implementation
// ----------------------------------------------------------------------------

/// Handles BLE device discovery and scanning
pub struct BleDiscovery {
    config: BleLinkConfig,
    adapter: Option<Adapter>,
    peers: HashMap<PeerId, DiscoveredPeer>,
}

impl BleDiscovery {
    /// Create a new discovery manager
    pub fn new(config: BleLinkConfig) -> Self {
        Self {
            config,
            adapter: None,
            peers: HashMap::new(),
        }
    }

    /// Initialize the first BLE adapter
    pub async fn initialize_adapter(&mut self) -> Result<(), BleLinkError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(BleLinkError::AdapterNotAvailable)?;

        if let Ok(info) = adapter.adapter_info().await {
            info!("BLE adapter initialized: {}", info);
        }
        self.adapter = Some(adapter);
        Ok(())
    }

    /// Get adapter reference
    pub fn adapter(&self) -> Option<&Adapter> {
        self.adapter.as_ref()
    }

    fn require_adapter(&self) -> Result<Adapter, BleLinkError> {
        self.adapter.clone().ok_or(BleLinkError::AdapterNotAvailable)
    }

    /// Listen for advertisements for `duration` and return every known peer,
    /// strongest signal first
    pub async fn scan(&mut self, duration: Duration) -> Result<Vec<DiscoveredPeer>, BleLinkError> {
        let adapter = self.require_adapter()?;
        let mut events = adapter.events().await?;

        adapter
            .start_scan(ScanFilter {
                services: vec![BEAMCHAT_SERVICE_UUID],
            })
            .await?;
        info!("Scanning for BeamChat peers for {:?}", duration);

        let deadline = tokio::time::Instant::now() + duration;
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, events.next()).await {
            match event {
                CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                    self.record(&adapter, &id).await;
                }
                CentralEvent::DeviceDisconnected(id) => {
                    if let Some(peer) = self.peers.get_mut(&peer_id_of(&id)) {
                        peer.mark_disconnected();
                    }
                }
                _ => {}
            }
        }

        adapter.stop_scan().await?;
        Ok(self.snapshot())
    }

    async fn record(&mut self, adapter: &Adapter, id: &PeripheralId) {
        let Ok(peripheral) = adapter.peripheral(id).await else {
            return;
        };
        let Ok(Some(properties)) = peripheral.properties().await else {
            return;
        };

        // Some backends ignore the scan filter
        if !properties.services.is_empty() && !properties.services.contains(&BEAMCHAT_SERVICE_UUID)
        {
            trace!("Ignoring {:?}: no BeamChat service", id);
            return;
        }
        if !self.config.accepts_name(properties.local_name.as_deref()) {
            return;
        }

        let advertisement = Advertisement {
            name: properties.local_name,
            rssi: properties.rssi,
        };
        let peer_id = peer_id_of(id);
        match self.peers.get_mut(&peer_id) {
            Some(peer) => peer.observe(advertisement),
            None => {
                debug!(
                    "Discovered BeamChat peer {} ({:?})",
                    peer_id,
                    advertisement.name.as_deref().unwrap_or("unnamed")
                );
                self.peers
                    .insert(peer_id, DiscoveredPeer::new(peer_id, peripheral, advertisement));
            }
        }
    }

    /// Known peers, strongest signal first
    pub fn snapshot(&self) -> Vec<DiscoveredPeer> {
        let mut peers: Vec<DiscoveredPeer> = self.peers.values().cloned().collect();
        peers.sort_by_key(|peer| std::cmp::Reverse(peer.rssi().unwrap_or(i16::MIN)));
        peers
    }

    /// Look a peer up by hex id or advertised-name prefix
    pub fn find(&self, query: &str) -> Result<&DiscoveredPeer, BleLinkError> {
        self.peers
            .values()
            .find(|peer| matches_peer(query, &peer.peer_id, peer.advertisement.name.as_deref()))
            .ok_or_else(|| BleLinkError::PeerNotFound {
                query: query.to_string(),
            })
    }

    pub fn get_mut(&mut self, peer_id: &PeerId) -> Option<&mut DiscoveredPeer> {
        self.peers.get_mut(peer_id)
    }
}

/// Peer id for a platform peripheral id
pub fn peer_id_of(id: &PeripheralId) -> PeerId {
    peer_id_for(&format!("{:?}", id))
}
