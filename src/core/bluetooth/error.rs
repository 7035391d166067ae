//! Error types for the Bluetooth layer.

use thiserror::Error;

/// Failures raised by the host Bluetooth capability (platform stack or
/// device picker).
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Bluetooth error: {0}")]
    Bluest(#[from] bluest::Error),

    #[error("No Bluetooth adapter found")]
    AdapterNotFound,

    #[error("Device picker failed: {0}")]
    Picker(String),

    #[error("Service not found: {0}")]
    ServiceNotFound(uuid::Uuid),

    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(uuid::Uuid),

    #[error("Scan task failed: {0}")]
    ScanTask(String),

    #[error("GATT server disconnected")]
    Disconnected,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures surfaced by [`BluetoothManager`](super::BluetoothManager).
///
/// The `Display` text of each variant is what ends up in the controller's
/// `last_error`, so it is written for end users.
#[derive(Error, Debug)]
pub enum BluetoothError {
    #[error("Bluetooth is not available on this computer. Turn on the Bluetooth adapter and try again.")]
    UnsupportedPlatform,

    #[error("Device scan failed: {0}")]
    ScanFailed(String),

    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("No device connected. Please connect a Bluetooth device first.")]
    NotConnected,

    #[error("Failed to send command: {0}")]
    WriteFailed(String),
}

impl BluetoothError {
    /// Whether re-invoking the same operation may succeed without the user
    /// changing anything about the environment.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::ScanFailed(_) | Self::ConnectFailed(_) | Self::WriteFailed(_)
        )
    }
}

/// Convenience type alias for Results with `BluetoothError`.
pub type Result<T> = std::result::Result<T, BluetoothError>;
