//! Central-side chunk link
//!
//! Chat chunks are written with response, one at a time; the write's
//! completion is posted back to the session as an ack. The display name goes
//! out once as a write without response.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use beamchat_core::{ChannelId, ChunkLink, Discipline, Emission, LinkError, SessionHandle};
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use tracing::{debug, trace, warn};

use crate::connection::GattProfile;
use crate::protocol::characteristic_for;

/// [`ChunkLink`] over a connected peripheral, acting as GATT client
pub struct CentralLink {
    peripheral: Peripheral,
    profile: GattProfile,
    max_write_len: usize,
    connected: Arc<AtomicBool>,
    session: SessionHandle,
}

impl CentralLink {
    pub fn new(
        peripheral: Peripheral,
        profile: GattProfile,
        max_write_len: usize,
        connected: Arc<AtomicBool>,
        session: SessionHandle,
    ) -> Self {
        Self {
            peripheral,
            profile,
            max_write_len,
            connected,
            session,
        }
    }

    fn characteristic(&self, channel: ChannelId) -> Option<&Characteristic> {
        match channel {
            ChannelId::Chat => Some(&self.profile.transfer),
            ChannelId::Name => self.profile.name.as_ref(),
        }
    }
}

impl ChunkLink for CentralLink {
    fn discipline(&self) -> Discipline {
        Discipline::AcknowledgedWrite
    }

    fn is_established(&self, channel: ChannelId) -> bool {
        self.connected.load(Ordering::SeqCst) && self.characteristic(channel).is_some()
    }

    fn max_chunk_size(&self, _channel: ChannelId) -> usize {
        self.max_write_len
    }

    fn emit(&mut self, channel: ChannelId, chunk: &[u8]) -> Result<Emission, LinkError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(LinkError::Disconnected);
        }
        let characteristic = self
            .characteristic(channel)
            .cloned()
            .ok_or_else(|| LinkError::Unavailable {
                reason: format!(
                    "peer has no {} characteristic ({})",
                    channel,
                    characteristic_for(channel)
                ),
            })?;

        let peripheral = self.peripheral.clone();
        let data = chunk.to_vec();

        match channel {
            ChannelId::Chat => {
                let session = self.session.clone();
                tokio::spawn(async move {
                    let result = peripheral
                        .write(&characteristic, &data, WriteType::WithResponse)
                        .await
                        .map_err(|e| LinkError::WriteFailed {
                            reason: e.to_string(),
                        });
                    trace!("Write of {} bytes finished: {:?}", data.len(), result);
                    if session.ack(ChannelId::Chat, result).await.is_err() {
                        debug!("Session {} closed before its write completed", session.peer_id());
                    }
                });
                Ok(Emission::AwaitingAck)
            }
            ChannelId::Name => {
                tokio::spawn(async move {
                    if let Err(e) = peripheral
                        .write(&characteristic, &data, WriteType::WithoutResponse)
                        .await
                    {
                        warn!("Failed to write display name: {}", e);
                    }
                });
                Ok(Emission::Accepted)
            }
        }
    }
}
