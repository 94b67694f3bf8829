//! BLE connection management
//!
//! Connects to a discovered peripheral, locates the BeamChat characteristics,
//! subscribes to their notifications and starts an initiator session on top.
//! Two background tasks feed the session: a notification pump that delivers
//! inbound chunks, and a watcher that reports the disconnect.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use beamchat_core::{ChannelId, Role, SessionHandle, SessionRegistry};
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Peripheral as _, ValueNotification,
};
use btleplug::platform::{Adapter, Peripheral};
use futures::stream::{Stream, StreamExt};
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::config::BleLinkConfig;
use crate::error::BleLinkError;
use crate::link::CentralLink;
use crate::peer::DiscoveredPeer;
use crate::protocol::{
    channel_for, BEAMCHAT_NAME_CHARACTERISTIC_UUID, BEAMCHAT_TRANSFER_CHARACTERISTIC_UUID,
};

type NotificationStream = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;

// ----------------------------------------------------------------------------
// GATT Profile
// ----------------------------------------------------------------------------

/// The BeamChat characteristics found on a peripheral
#[derive(Debug, Clone)]
pub struct GattProfile {
    pub transfer: Characteristic,
    /// Older peripherals only expose the transfer characteristic
    pub name: Option<Characteristic>,
}

impl GattProfile {
    /// Pick our characteristics out of everything the peripheral exposes
    pub fn from_characteristics(
        characteristics: impl IntoIterator<Item = Characteristic>,
    ) -> Result<Self, BleLinkError> {
        let mut transfer = None;
        let mut name = None;
        for characteristic in characteristics {
            match characteristic.uuid {
                BEAMCHAT_TRANSFER_CHARACTERISTIC_UUID => transfer = Some(characteristic),
                BEAMCHAT_NAME_CHARACTERISTIC_UUID => name = Some(characteristic),
                _ => {}
            }
        }
        let transfer = transfer.ok_or_else(|| BleLinkError::CharacteristicNotFound {
            characteristic: BEAMCHAT_TRANSFER_CHARACTERISTIC_UUID.to_string(),
        })?;
        Ok(Self { transfer, name })
    }
}

// ----------------------------------------------------------------------------
// Connection Management
// ----------------------------------------------------------------------------

/// Opens initiator sessions to discovered peripherals
pub struct BleConnector {
    config: BleLinkConfig,
    adapter: Adapter,
}

impl BleConnector {
    pub fn new(config: BleLinkConfig, adapter: Adapter) -> Self {
        Self { config, adapter }
    }

    /// Connect and discover the BeamChat characteristics
    pub async fn connect(&self, peer: &mut DiscoveredPeer) -> Result<GattProfile, BleLinkError> {
        peer.mark_connecting();
        let result = self.connect_inner(&peer.peripheral).await;
        match &result {
            Ok(_) => {
                peer.mark_connected();
                info!("Connected to peer {} ({})", peer.peer_id, peer.display_name());
            }
            Err(e) => {
                peer.mark_failed();
                error!("Failed to connect to peer {}: {}", peer.peer_id, e);
            }
        }
        result
    }

    async fn connect_inner(&self, peripheral: &Peripheral) -> Result<GattProfile, BleLinkError> {
        timeout(self.config.connection_timeout, peripheral.connect())
            .await
            .map_err(|_| BleLinkError::ConnectionTimeout)?
            .map_err(|e| BleLinkError::ConnectionFailed(e.to_string()))?;

        timeout(self.config.connection_timeout, peripheral.discover_services())
            .await
            .map_err(|_| BleLinkError::ConnectionTimeout)?
            .map_err(|e| BleLinkError::ServiceDiscoveryFailed(e.to_string()))?;

        GattProfile::from_characteristics(peripheral.characteristics())
    }

    /// Connect to `peer` and run an initiator session over the connection
    ///
    /// Any previous session with the same peer is replaced. The peer's
    /// current display name is read once and delivered to the session,
    /// which answers with ours.
    pub async fn open_session(
        &self,
        registry: &mut SessionRegistry,
        peer: &mut DiscoveredPeer,
    ) -> Result<SessionHandle, BleLinkError> {
        let profile = self.connect(peer).await?;
        let peripheral = peer.peripheral.clone();

        let notifications = peripheral
            .notifications()
            .await
            .map_err(|e| BleLinkError::NotificationStreamFailed(e.to_string()))?;
        subscribe(&peripheral, &profile.transfer).await?;
        if let Some(name) = &profile.name {
            if name.properties.contains(CharPropFlags::NOTIFY) {
                subscribe(&peripheral, name).await?;
            }
        }

        let connected = Arc::new(AtomicBool::new(true));
        let max_write_len = self.config.max_write_len;
        let handle = registry
            .open(peer.peer_id, Role::Initiator, |handle| {
                CentralLink::new(
                    peripheral.clone(),
                    profile.clone(),
                    max_write_len,
                    connected.clone(),
                    handle,
                )
            })
            .await?;

        tokio::spawn(pump_notifications(notifications, handle.clone()));
        tokio::spawn(watch_disconnect(
            self.adapter.clone(),
            peripheral.clone(),
            handle.clone(),
            connected,
        ));

        if let Some(name) = &profile.name {
            if name.properties.contains(CharPropFlags::READ) {
                match peripheral.read(name).await {
                    Ok(value) if !value.is_empty() => handle.deliver(ChannelId::Name, value).await?,
                    Ok(_) => debug!("Peer {} has not published a name yet", peer.peer_id),
                    Err(e) => warn!("Failed to read name of peer {}: {}", peer.peer_id, e),
                }
            }
        }

        Ok(handle)
    }

    /// Disconnect from a peer
    pub async fn disconnect(&self, peer: &mut DiscoveredPeer) -> Result<(), BleLinkError> {
        if peer.is_connected() {
            if let Err(e) = peer.peripheral.disconnect().await {
                error!("Failed to disconnect from peer {}: {}", peer.peer_id, e);
            }
            peer.mark_disconnected();
            info!("Disconnected from peer: {}", peer.peer_id);
        }
        Ok(())
    }
}

async fn subscribe(peripheral: &Peripheral, characteristic: &Characteristic) -> Result<(), BleLinkError> {
    peripheral
        .subscribe(characteristic)
        .await
        .map_err(|e| BleLinkError::SubscriptionFailed(e.to_string()))
}

/// Forward notifications to the session until either side goes away
async fn pump_notifications(mut notifications: NotificationStream, handle: SessionHandle) {
    while let Some(notification) = notifications.next().await {
        let Some(channel) = channel_for(notification.uuid) else {
            trace!("Ignoring notification from {}", notification.uuid);
            continue;
        };
        trace!("{} chunk: {}", channel, hex::encode(&notification.value));
        if handle.deliver(channel, notification.value).await.is_err() {
            break;
        }
    }
    debug!("Notification pump for peer {} ended", handle.peer_id());
    let _ = handle.lose().await;
}

/// Report the peripheral's disconnect to the session
async fn watch_disconnect(
    adapter: Adapter,
    peripheral: Peripheral,
    handle: SessionHandle,
    connected: Arc<AtomicBool>,
) {
    let mut events = match adapter.events().await {
        Ok(events) => events,
        Err(e) => {
            warn!("Cannot watch for disconnects of {}: {}", handle.peer_id(), e);
            return;
        }
    };
    let id = peripheral.id();

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(CentralEvent::DeviceDisconnected(gone)) if gone == id => {
                    info!("Peer {} disconnected", handle.peer_id());
                    break;
                }
                Some(_) => {}
                None => break,
            },
            _ = handle.closed() => return,
        }
    }

    connected.store(false, Ordering::SeqCst);
    let _ = handle.lose().await;
}
