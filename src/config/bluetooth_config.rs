use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    DEFAULT_ADAPTER_TIMEOUT_SECS, DEFAULT_SCAN_DURATION_SECS, UUID_UART_CHARACTERISTIC,
    UUID_UART_SERVICE,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// GATT service carrying the command characteristic.
    pub service_uuid: Uuid,

    /// Characteristic commands are written to.
    pub characteristic_uuid: Uuid,

    /// When the known UUIDs are missing, only fall back to a characteristic
    /// that advertises write support.
    pub validate_fallback_writable: bool,

    /// How long each discovery pass listens for advertisements.
    pub scan_window_secs: u64,

    /// How long to wait for the adapter to power up at start-up.
    pub adapter_timeout_secs: u64,

    /// Only offer devices whose name contains this text (case-insensitive).
    pub name_filter: Option<String>,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        BluetoothConfig {
            service_uuid: UUID_UART_SERVICE,
            characteristic_uuid: UUID_UART_CHARACTERISTIC,
            validate_fallback_writable: true,
            scan_window_secs: DEFAULT_SCAN_DURATION_SECS,
            adapter_timeout_secs: DEFAULT_ADAPTER_TIMEOUT_SECS,
            name_filter: None,
        }
    }
}
