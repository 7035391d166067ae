//! Defines shared data structures for the Bluetooth module.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::core::bluetooth::constants::UNKNOWN_DEVICE_NAME;
use crate::core::bluetooth::host::GattDevice;

/// A discovered or selected peripheral.
///
/// The native device object is only reachable from inside the crate; the
/// manager owns it while a session is live.
#[derive(Clone)]
pub struct BluetoothDeviceHandle {
    /// Platform-specific identifier, stable for the OS-level session
    pub id: String,
    /// Human-readable name, or [`UNKNOWN_DEVICE_NAME`]
    pub display_name: String,
    native: Arc<dyn GattDevice>,
}

impl BluetoothDeviceHandle {
    /// Wraps a native device, falling back to the placeholder name when the
    /// peripheral reports none.
    pub fn new(native: Arc<dyn GattDevice>) -> Self {
        let display_name = native
            .name()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string());
        Self {
            id: native.id(),
            display_name,
            native,
        }
    }

    pub(crate) fn native(&self) -> &Arc<dyn GattDevice> {
        &self.native
    }
}

impl fmt::Debug for BluetoothDeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BluetoothDeviceHandle")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for BluetoothDeviceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BluetoothDeviceHandle {}

impl Serialize for BluetoothDeviceHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("BluetoothDevice", 2)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("name", &self.display_name)?;
        state.end()
    }
}

/// A peripheral seen during discovery, as offered to the device picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceCandidate {
    /// Platform-specific unique identifier
    pub id: String,
    /// The advertised name, if available
    pub name: Option<String>,
    /// The signal strength (RSSI) of the device
    pub rssi: Option<i16>,
    /// Whether the OS already holds a connection to it
    pub is_connected: bool,
}

impl DeviceCandidate {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(UNKNOWN_DEVICE_NAME)
    }
}

/// Synchronous view of the connection session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSnapshot {
    pub device: Option<BluetoothDeviceHandle>,
    pub is_connected: bool,
}

/// Published by the manager when the session changes without a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The peripheral dropped the link (powered off, out of range)
    Lost { device_id: String },
}
