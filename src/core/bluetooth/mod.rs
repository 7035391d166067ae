//! Bluetooth functionality for the VeriSmart bridge
//! This module handles all bluetooth operations including device
//! selection, connecting, and writing commands to the board.

mod commands;
pub mod constants;
mod error;
mod host;
mod manager;
mod platform;
mod scanner;
mod types;

#[cfg(test)]
pub(crate) mod mock;

// Re-export types that should be publicly accessible
pub use commands::{Command, InvalidCommand};
pub use error::{BluetoothError, HostError};
pub use host::{
    BluetoothHost, DevicePicker, DisconnectCallback, GattCharacteristic, GattDevice, GattServer,
    GattService,
};
pub use manager::{BluetoothManager, GattProfile};
pub use platform::BluestHost;
pub use scanner::BluetoothScanner;
pub use types::{BluetoothDeviceHandle, ConnectionSnapshot, DeviceCandidate, SessionEvent};
