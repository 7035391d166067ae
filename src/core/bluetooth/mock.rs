//! In-memory host used by the unit tests

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::core::bluetooth::constants::{UUID_UART_CHARACTERISTIC, UUID_UART_SERVICE};
use crate::core::bluetooth::error::HostError;
use crate::core::bluetooth::host::{
    BluetoothHost, DevicePicker, DisconnectCallback, GattCharacteristic, GattDevice, GattServer,
    GattService,
};
use crate::core::bluetooth::types::DeviceCandidate;

pub struct MockHost {
    available: bool,
    devices: Vec<MockDevice>,
    requests: AtomicUsize,
}

impl MockHost {
    pub fn with_devices(devices: Vec<MockDevice>) -> Self {
        Self {
            available: true,
            devices,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            devices: Vec::new(),
            requests: AtomicUsize::new(0),
        }
    }

    /// How many times the picker was opened
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BluetoothHost for MockHost {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn request_device(
        &self,
        picker: &dyn DevicePicker,
    ) -> Result<Option<Arc<dyn GattDevice>>, HostError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let candidates: Vec<_> = self
            .devices
            .iter()
            .map(|device| DeviceCandidate {
                id: device.inner.id.clone(),
                name: device.inner.name.clone(),
                rssi: Some(-50),
                is_connected: false,
            })
            .collect();
        match picker.pick(&candidates).await? {
            Some(index) => {
                let device = self
                    .devices
                    .get(index)
                    .cloned()
                    .ok_or_else(|| HostError::Picker(format!("no device at {}", index)))?;
                Ok(Some(Arc::new(device)))
            }
            None => Ok(None),
        }
    }
}

pub enum MockPicker {
    First,
    Cancel,
    Fail(String),
    Sequence(Mutex<VecDeque<usize>>),
    /// Waits for the notify before choosing the first device
    Gated(Arc<Notify>),
}

impl MockPicker {
    pub fn sequence(indices: impl IntoIterator<Item = usize>) -> Self {
        Self::Sequence(Mutex::new(indices.into_iter().collect()))
    }
}

#[async_trait]
impl DevicePicker for MockPicker {
    async fn pick(&self, candidates: &[DeviceCandidate]) -> Result<Option<usize>, HostError> {
        match self {
            Self::First => Ok((!candidates.is_empty()).then_some(0)),
            Self::Cancel => Ok(None),
            Self::Fail(msg) => Err(HostError::Picker(msg.clone())),
            Self::Sequence(indices) => Ok(indices.lock().unwrap().pop_front()),
            Self::Gated(gate) => {
                gate.notified().await;
                Ok(Some(0))
            }
        }
    }
}

#[derive(Clone)]
pub struct MockDevice {
    inner: Arc<DeviceInner>,
}

struct DeviceInner {
    id: String,
    name: Option<String>,
    services: Vec<MockService>,
    linked: AtomicBool,
    fail_connect: AtomicBool,
    fail_disconnect: AtomicBool,
    observers: Mutex<Vec<Arc<dyn Fn() + Send + Sync>>>,
}

impl MockDevice {
    pub fn new(id: &str, name: Option<&str>, services: Vec<MockService>) -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                id: id.to_string(),
                name: name.map(str::to_string),
                services,
                linked: AtomicBool::new(false),
                fail_connect: AtomicBool::new(false),
                fail_disconnect: AtomicBool::new(false),
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A board exposing the FFE0/FFE1 UART profile
    pub fn uart(id: &str, name: Option<&str>) -> Self {
        Self::new(
            id,
            name,
            vec![MockService::new(
                UUID_UART_SERVICE,
                vec![MockCharacteristic::new(UUID_UART_CHARACTERISTIC, true)],
            )],
        )
    }

    pub fn failing_connect(self) -> Self {
        self.inner.fail_connect.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_disconnect(self) -> Self {
        self.inner.fail_disconnect.store(true, Ordering::SeqCst);
        self
    }

    pub fn uart_channel(&self) -> MockCharacteristic {
        self.inner.services[0].characteristics[0].clone()
    }

    pub fn uart_writes(&self) -> Vec<Vec<u8>> {
        self.uart_channel().writes()
    }

    pub fn is_linked(&self) -> bool {
        self.inner.linked.load(Ordering::SeqCst)
    }

    /// Peripheral went away: link drops and every observer fires
    pub fn simulate_disconnect(&self) {
        self.inner.linked.store(false, Ordering::SeqCst);
        self.fire_observers();
    }

    /// Link drops without the platform reporting it
    pub fn drop_link_silently(&self) {
        self.inner.linked.store(false, Ordering::SeqCst);
    }

    fn fire_observers(&self) {
        let observers = self.inner.observers.lock().unwrap().clone();
        for observer in observers {
            (*observer)();
        }
    }
}

#[async_trait]
impl GattDevice for MockDevice {
    fn id(&self) -> String {
        self.inner.id.clone()
    }

    fn name(&self) -> Option<String> {
        self.inner.name.clone()
    }

    async fn connect_gatt(&self) -> Result<Arc<dyn GattServer>, HostError> {
        if self.inner.fail_connect.load(Ordering::SeqCst) {
            return Err(HostError::Io(io::Error::other("connection refused")));
        }
        self.inner.linked.store(true, Ordering::SeqCst);
        Ok(Arc::new(MockServer {
            device: self.clone(),
        }))
    }

    fn on_disconnected(&self, callback: DisconnectCallback) {
        self.inner.observers.lock().unwrap().push(Arc::from(callback));
    }
}

struct MockServer {
    device: MockDevice,
}

#[async_trait]
impl GattServer for MockServer {
    fn is_connected(&self) -> bool {
        self.device.is_linked()
    }

    async fn primary_service(&self, uuid: Uuid) -> Result<Arc<dyn GattService>, HostError> {
        self.device
            .inner
            .services
            .iter()
            .find(|service| service.uuid == uuid)
            .map(|service| Arc::new(service.clone()) as Arc<dyn GattService>)
            .ok_or(HostError::ServiceNotFound(uuid))
    }

    async fn primary_services(&self) -> Result<Vec<Arc<dyn GattService>>, HostError> {
        Ok(self
            .device
            .inner
            .services
            .iter()
            .map(|service| Arc::new(service.clone()) as Arc<dyn GattService>)
            .collect())
    }

    async fn disconnect(&self) -> Result<(), HostError> {
        if self.device.inner.fail_disconnect.load(Ordering::SeqCst) {
            return Err(HostError::Io(io::Error::other("disconnect rejected")));
        }
        // Like the platform, an explicit disconnect also notifies observers.
        self.device.simulate_disconnect();
        Ok(())
    }
}

#[derive(Clone)]
pub struct MockService {
    uuid: Uuid,
    characteristics: Vec<MockCharacteristic>,
}

impl MockService {
    pub fn new(uuid: Uuid, characteristics: Vec<MockCharacteristic>) -> Self {
        Self { uuid, characteristics }
    }
}

#[async_trait]
impl GattService for MockService {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    async fn characteristic(&self, uuid: Uuid) -> Result<Arc<dyn GattCharacteristic>, HostError> {
        self.characteristics
            .iter()
            .find(|characteristic| characteristic.inner.uuid == uuid)
            .map(|characteristic| Arc::new(characteristic.clone()) as Arc<dyn GattCharacteristic>)
            .ok_or(HostError::CharacteristicNotFound(uuid))
    }

    async fn characteristics(&self) -> Result<Vec<Arc<dyn GattCharacteristic>>, HostError> {
        Ok(self
            .characteristics
            .iter()
            .map(|characteristic| Arc::new(characteristic.clone()) as Arc<dyn GattCharacteristic>)
            .collect())
    }
}

#[derive(Clone)]
pub struct MockCharacteristic {
    inner: Arc<CharacteristicInner>,
}

struct CharacteristicInner {
    uuid: Uuid,
    writable: bool,
    fail_writes: AtomicBool,
    writes: Mutex<Vec<Vec<u8>>>,
}

impl MockCharacteristic {
    pub fn new(uuid: Uuid, writable: bool) -> Self {
        Self {
            inner: Arc::new(CharacteristicInner {
                uuid,
                writable,
                fail_writes: AtomicBool::new(false),
                writes: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn fail_writes(&self) {
        self.inner.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.inner.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl GattCharacteristic for MockCharacteristic {
    fn uuid(&self) -> Uuid {
        self.inner.uuid
    }

    async fn is_writable(&self) -> Result<bool, HostError> {
        Ok(self.inner.writable)
    }

    async fn write_value(&self, data: &[u8]) -> Result<(), HostError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(HostError::Io(io::Error::other("GATT write rejected")));
        }
        self.inner.writes.lock().unwrap().push(data.to_vec());
        Ok(())
    }
}
