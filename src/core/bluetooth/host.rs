//! Host Bluetooth capability
//! The traits here mirror what the platform stack offers: a device picker,
//! GATT connect, primary service and characteristic lookup, value writes and
//! a disconnect notification. [`BluetoothManager`](super::BluetoothManager)
//! only talks to these traits.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::bluetooth::error::HostError;
use crate::core::bluetooth::types::DeviceCandidate;

/// Invoked once when the peripheral drops the link.
pub type DisconnectCallback = Box<dyn Fn() + Send + Sync>;

/// Entry point into the platform Bluetooth stack
#[async_trait]
pub trait BluetoothHost: Send + Sync {
    /// Whether a usable adapter exists. Must not fail.
    fn is_available(&self) -> bool;

    /// Discovers nearby peripherals and lets `picker` choose one.
    /// `Ok(None)` means the user dismissed the picker.
    async fn request_device(
        &self,
        picker: &dyn DevicePicker,
    ) -> Result<Option<Arc<dyn GattDevice>>, HostError>;
}

/// Lets the user choose among discovered devices
#[async_trait]
pub trait DevicePicker: Send + Sync {
    /// Returns the index of the chosen candidate, or `None` on cancel.
    async fn pick(&self, candidates: &[DeviceCandidate]) -> Result<Option<usize>, HostError>;
}

/// A selected peripheral
#[async_trait]
pub trait GattDevice: Send + Sync {
    fn id(&self) -> String;

    fn name(&self) -> Option<String>;

    /// Opens a GATT session with the peripheral
    async fn connect_gatt(&self) -> Result<Arc<dyn GattServer>, HostError>;

    /// Registers an observer for out-of-band disconnects
    fn on_disconnected(&self, callback: DisconnectCallback);
}

/// An open GATT session
#[async_trait]
pub trait GattServer: Send + Sync {
    fn is_connected(&self) -> bool;

    async fn primary_service(&self, uuid: Uuid) -> Result<Arc<dyn GattService>, HostError>;

    async fn primary_services(&self) -> Result<Vec<Arc<dyn GattService>>, HostError>;

    async fn disconnect(&self) -> Result<(), HostError>;
}

#[async_trait]
pub trait GattService: Send + Sync {
    fn uuid(&self) -> Uuid;

    async fn characteristic(&self, uuid: Uuid) -> Result<Arc<dyn GattCharacteristic>, HostError>;

    async fn characteristics(&self) -> Result<Vec<Arc<dyn GattCharacteristic>>, HostError>;
}

#[async_trait]
pub trait GattCharacteristic: Send + Sync {
    fn uuid(&self) -> Uuid;

    /// Whether the characteristic accepts writes (with or without response)
    async fn is_writable(&self) -> Result<bool, HostError>;

    async fn write_value(&self, data: &[u8]) -> Result<(), HostError>;
}
