//! Bluetooth manager for the VeriSmart bridge
//! This module owns the single connection session: device selection,
//! GATT connect/disconnect, characteristic resolution and command writes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{error, info, warn};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::BluetoothConfig;
use crate::core::bluetooth::commands::Command;
use crate::core::bluetooth::constants::SESSION_EVENT_CAPACITY;
use crate::core::bluetooth::error::{BluetoothError, HostError, Result};
use crate::core::bluetooth::host::{
    BluetoothHost, DevicePicker, DisconnectCallback, GattCharacteristic, GattDevice, GattServer,
    GattService,
};
use crate::core::bluetooth::types::{BluetoothDeviceHandle, ConnectionSnapshot, SessionEvent};

/// Which GATT service/characteristic carries commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattProfile {
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
    /// Only accept a writable characteristic when falling back
    pub validate_fallback_writable: bool,
}

impl From<&BluetoothConfig> for GattProfile {
    fn from(config: &BluetoothConfig) -> Self {
        Self {
            service_uuid: config.service_uuid,
            characteristic_uuid: config.characteristic_uuid,
            validate_fallback_writable: config.validate_fallback_writable,
        }
    }
}

/// The live session. A session only exists once a channel was resolved.
struct ConnectionSession {
    generation: u64,
    device: BluetoothDeviceHandle,
    server: Arc<dyn GattServer>,
    channel: Arc<dyn GattCharacteristic>,
}

#[derive(Default)]
struct SessionSlot {
    next_generation: u64,
    session: Option<ConnectionSession>,
}

/// Manages Bluetooth operations
pub struct BluetoothManager {
    host: Arc<dyn BluetoothHost>,
    picker: Arc<dyn DevicePicker>,
    profile: GattProfile,
    /// Sampled once at construction
    supported: bool,
    /// Never held across an await
    slot: Arc<Mutex<SessionSlot>>,
    events: broadcast::Sender<SessionEvent>,
}

impl BluetoothManager {
    /// Creates a new BluetoothManager
    pub fn new(host: Arc<dyn BluetoothHost>, picker: Arc<dyn DevicePicker>, profile: GattProfile) -> Self {
        let supported = host.is_available();
        info!("Bluetooth supported: {}", supported);
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Self {
            host,
            picker,
            profile,
            supported,
            slot: Arc::new(Mutex::new(SessionSlot::default())),
            events,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// Receives out-of-band session changes
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Lets the user pick a nearby device. `Ok(None)` when the picker was
    /// dismissed.
    pub async fn scan_and_select(&self) -> Result<Option<BluetoothDeviceHandle>> {
        if !self.supported || !self.host.is_available() {
            return Err(BluetoothError::UnsupportedPlatform);
        }

        match self.host.request_device(self.picker.as_ref()).await {
            Ok(Some(device)) => {
                let handle = BluetoothDeviceHandle::new(device);
                info!("Device selected - ID: {}, Name: {}", handle.id, handle.display_name);
                Ok(Some(handle))
            }
            Ok(None) => Ok(None),
            Err(HostError::AdapterNotFound) => Err(BluetoothError::UnsupportedPlatform),
            Err(e) => {
                error!("Device scan failed: {}", e);
                Err(BluetoothError::ScanFailed(e.to_string()))
            }
        }
    }

    /// Opens a session with `handle`, replacing any existing one.
    pub async fn connect(&self, handle: &BluetoothDeviceHandle) -> Result<()> {
        if self.lock_slot().session.is_some() {
            info!("Tearing down the current session before connecting");
            self.disconnect().await;
        }

        info!("Connecting to {} ({})", handle.display_name, handle.id);
        let server = handle.native().connect_gatt().await.map_err(|e| {
            error!("GATT connect failed: {}", e);
            BluetoothError::ConnectFailed(e.to_string())
        })?;

        let channel = match self.resolve_channel(server.as_ref()).await {
            Ok(channel) => channel,
            Err(e) => {
                error!("No usable characteristic on {}: {}", handle.id, e);
                if let Err(e) = server.disconnect().await {
                    warn!("Disconnect after failed resolution: {}", e);
                }
                return Err(BluetoothError::ConnectFailed(e.to_string()));
            }
        };

        let (generation, replaced) = {
            let mut slot = self.lock_slot();
            slot.next_generation += 1;
            let generation = slot.next_generation;
            let replaced = slot.session.replace(ConnectionSession {
                generation,
                device: handle.clone(),
                server,
                channel,
            });
            (generation, replaced)
        };
        handle
            .native()
            .on_disconnected(self.disconnect_observer(generation, handle.id.clone()));

        // A concurrent connect finished first; the later one wins.
        if let Some(previous) = replaced {
            warn!("Replacing session with {} established concurrently", previous.device.id);
            Self::close_server(previous.server.as_ref()).await;
        }

        info!("Device successfully connected: {}", handle.display_name);
        Ok(())
    }

    /// Best-effort teardown. Always leaves the session empty.
    pub async fn disconnect(&self) {
        let session = self.lock_slot().session.take();
        match session {
            Some(session) => {
                Self::close_server(session.server.as_ref()).await;
                info!("Session with {} cleared", session.device.id);
            }
            None => info!("No device connected"),
        }
    }

    /// Writes one command, framed with a trailing newline.
    pub async fn write(&self, command: &Command) -> Result<()> {
        let channel = self
            .lock_slot()
            .session
            .as_ref()
            .map(|session| session.channel.clone())
            .ok_or(BluetoothError::NotConnected)?;

        info!("Sending command to board: {}", command);
        channel.write_value(&command.to_bytes()).await.map_err(|e| {
            error!("Write failed: {}", e);
            BluetoothError::WriteFailed(e.to_string())
        })
    }

    pub fn current_state(&self) -> ConnectionSnapshot {
        let slot = self.lock_slot();
        match slot.session.as_ref() {
            Some(session) => ConnectionSnapshot {
                device: Some(session.device.clone()),
                is_connected: session.server.is_connected(),
            },
            None => ConnectionSnapshot {
                device: None,
                is_connected: false,
            },
        }
    }

    /// Known service/characteristic first, then the first characteristic of
    /// the first primary service.
    async fn resolve_channel(
        &self,
        server: &dyn GattServer,
    ) -> std::result::Result<Arc<dyn GattCharacteristic>, HostError> {
        match self.resolve_known(server).await {
            Ok(channel) => {
                info!("Found write characteristic: {}", channel.uuid());
                return Ok(channel);
            }
            Err(e) => warn!("Known UART profile not found ({}), falling back", e),
        }

        let services = server.primary_services().await?;
        let service = services
            .first()
            .ok_or(HostError::ServiceNotFound(self.profile.service_uuid))?;
        let characteristics = service.characteristics().await?;

        if !self.profile.validate_fallback_writable {
            let channel = characteristics
                .into_iter()
                .next()
                .ok_or(HostError::CharacteristicNotFound(self.profile.characteristic_uuid))?;
            warn!("Using unverified fallback characteristic {}", channel.uuid());
            return Ok(channel);
        }

        for channel in characteristics {
            match channel.is_writable().await {
                Ok(true) => {
                    info!("Using fallback characteristic {} on service {}", channel.uuid(), service.uuid());
                    return Ok(channel);
                }
                Ok(false) => info!("Skipping read-only characteristic {}", channel.uuid()),
                Err(e) => warn!("Could not read properties of {}: {}", channel.uuid(), e),
            }
        }
        Err(HostError::CharacteristicNotFound(self.profile.characteristic_uuid))
    }

    async fn resolve_known(
        &self,
        server: &dyn GattServer,
    ) -> std::result::Result<Arc<dyn GattCharacteristic>, HostError> {
        let service = server.primary_service(self.profile.service_uuid).await?;
        service.characteristic(self.profile.characteristic_uuid).await
    }

    /// Clears the session if it is still the one identified by `generation`.
    fn disconnect_observer(&self, generation: u64, device_id: String) -> DisconnectCallback {
        let slot: Weak<Mutex<SessionSlot>> = Arc::downgrade(&self.slot);
        let events = self.events.clone();
        Box::new(move || {
            let Some(slot) = slot.upgrade() else {
                return;
            };
            let cleared = {
                let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
                let current = slot.session.as_ref().map(|session| session.generation);
                if current == Some(generation) {
                    slot.session.take()
                } else {
                    None
                }
            };
            if cleared.is_some() {
                warn!("Device {} lost connection", device_id);
                // No subscribers is fine.
                let _ = events.send(SessionEvent::Lost {
                    device_id: device_id.clone(),
                });
            }
        })
    }

    async fn close_server(server: &dyn GattServer) {
        if server.is_connected() {
            if let Err(e) = server.disconnect().await {
                warn!("Disconnect error: {}", e);
            }
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, SessionSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
