//! Core functionality for the VeriSmart bridge
//! The Bluetooth transport and the connection controller built on it.

pub mod bluetooth;
pub mod controller;

// Re-export commonly used types
pub use bluetooth::BluetoothManager;
pub use controller::{ConnectionController, ControllerState};
