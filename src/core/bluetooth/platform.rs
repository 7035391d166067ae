//! bluest-backed implementation of the host capability traits

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bluest::{Adapter, Characteristic, ConnectionEvent, Device, Service};
use futures_util::StreamExt;
use log::{error, info, warn};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::config::BluetoothConfig;
use crate::core::bluetooth::error::HostError;
use crate::core::bluetooth::host::{
    BluetoothHost, DevicePicker, DisconnectCallback, GattCharacteristic, GattDevice, GattServer,
    GattService,
};
use crate::core::bluetooth::scanner::BluetoothScanner;

/// The platform Bluetooth stack, or nothing when no adapter is usable
pub struct BluestHost {
    adapter: Option<Adapter>,
    scanner: Option<BluetoothScanner>,
}

impl BluestHost {
    /// Looks up the default adapter and waits briefly for it to power up.
    /// Never fails: a missing or unpowered adapter yields an unavailable host.
    pub async fn new(config: &BluetoothConfig) -> Self {
        let Some(adapter) = Adapter::default().await else {
            warn!("No Bluetooth adapter found");
            return Self::unavailable();
        };

        let timeout = Duration::from_secs(config.adapter_timeout_secs);
        match tokio::time::timeout(timeout, adapter.wait_available()).await {
            Ok(Ok(())) => info!("Bluetooth adapter is available."),
            Ok(Err(e)) => {
                warn!("Bluetooth adapter unavailable: {}", e);
                return Self::unavailable();
            }
            Err(_) => {
                warn!("Bluetooth adapter did not become available within {:?}", timeout);
                return Self::unavailable();
            }
        }

        let scanner = BluetoothScanner::new(
            adapter.clone(),
            Duration::from_secs(config.scan_window_secs),
            config.name_filter.clone(),
        );
        Self {
            adapter: Some(adapter),
            scanner: Some(scanner),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            adapter: None,
            scanner: None,
        }
    }
}

#[async_trait]
impl BluetoothHost for BluestHost {
    fn is_available(&self) -> bool {
        self.adapter.is_some()
    }

    async fn request_device(
        &self,
        picker: &dyn DevicePicker,
    ) -> Result<Option<Arc<dyn GattDevice>>, HostError> {
        let (Some(adapter), Some(scanner)) = (&self.adapter, &self.scanner) else {
            return Err(HostError::AdapterNotFound);
        };

        let (candidates, mut devices): (Vec<_>, Vec<_>) = scanner.discover().await?.into_iter().unzip();

        let Some(index) = picker.pick(&candidates).await? else {
            info!("Device selection cancelled");
            return Ok(None);
        };
        if index >= devices.len() {
            return Err(HostError::Picker(format!("selection {} out of range", index)));
        }

        let device = devices.swap_remove(index);
        info!("Selected device {} ({})", candidates[index].display_name(), candidates[index].id);
        Ok(Some(Arc::new(BluestDevice {
            adapter: adapter.clone(),
            device,
            link: Arc::new(LinkWatch::default()),
        })))
    }
}

#[derive(Default)]
struct LinkState {
    up: bool,
    /// Bumped on every connect so a watcher of an earlier link cannot drop this one
    epoch: u64,
    callbacks: Vec<DisconnectCallback>,
}

/// Link flag of one device plus the callbacks waiting for it to drop.
/// A callback registered after the drop runs at once.
#[derive(Default)]
struct LinkWatch {
    state: Mutex<LinkState>,
}

impl LinkWatch {
    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_up(&self) -> bool {
        self.lock().up
    }

    fn set_up(&self) -> u64 {
        let mut state = self.lock();
        state.up = true;
        state.epoch += 1;
        state.epoch
    }

    /// Marks the link down and runs every pending callback outside the lock.
    fn set_down(&self) {
        let epoch = self.lock().epoch;
        self.set_down_at(epoch);
    }

    /// Like [`set_down`](Self::set_down), but only if no newer link came up
    /// since `epoch`.
    fn set_down_at(&self, epoch: u64) {
        let callbacks = {
            let mut state = self.lock();
            if state.epoch != epoch {
                return;
            }
            state.up = false;
            std::mem::take(&mut state.callbacks)
        };
        for callback in callbacks {
            callback();
        }
    }

    fn register(&self, callback: DisconnectCallback) {
        {
            let mut state = self.lock();
            if state.up {
                state.callbacks.push(callback);
                return;
            }
        }
        callback();
    }
}

/// Follows connection events for `device` until it disconnects. `ready`
/// resolves once the subscription is live, so nothing after it is missed.
async fn watch_link(
    adapter: Adapter,
    device: Device,
    link: Arc<LinkWatch>,
    epoch: u64,
    ready: oneshot::Sender<Result<(), HostError>>,
) {
    let events = match adapter.device_connection_events(&device).await {
        Ok(events) => events,
        Err(e) => {
            error!("Failed to watch connection events for {}: {}", device.id(), e);
            let _ = ready.send(Err(e.into()));
            return;
        }
    };
    futures_util::pin_mut!(events);
    if ready.send(Ok(())).is_err() {
        return;
    }

    while let Some(event) = events.next().await {
        if matches!(event, ConnectionEvent::Disconnected) {
            info!("Device {} disconnected", device.id());
            link.set_down_at(epoch);
            return;
        }
    }
    warn!("Connection events for {} ended; treating the link as down", device.id());
    link.set_down_at(epoch);
}

struct BluestDevice {
    adapter: Adapter,
    device: Device,
    /// Link state shared with every server opened on this device
    link: Arc<LinkWatch>,
}

#[async_trait]
impl GattDevice for BluestDevice {
    fn id(&self) -> String {
        self.device.id().to_string()
    }

    fn name(&self) -> Option<String> {
        self.device.name().ok()
    }

    async fn connect_gatt(&self) -> Result<Arc<dyn GattServer>, HostError> {
        if !self.device.is_connected().await {
            info!("Initiating connection to {}...", self.device.id());
            self.adapter.connect_device(&self.device).await?;
        }
        let epoch = self.link.set_up();

        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(watch_link(
            self.adapter.clone(),
            self.device.clone(),
            self.link.clone(),
            epoch,
            ready_tx,
        ));
        let subscribed = ready_rx.await.unwrap_or(Err(HostError::Disconnected));
        if let Err(e) = subscribed {
            self.link.set_down_at(epoch);
            if let Err(release) = self.adapter.disconnect_device(&self.device).await {
                warn!("Failed to release {} after a failed subscription: {}", self.device.id(), release);
            }
            return Err(e);
        }
        // Covers a drop between connecting and subscribing.
        if !self.device.is_connected().await {
            self.link.set_down_at(epoch);
            return Err(HostError::Disconnected);
        }

        Ok(Arc::new(BluestServer {
            adapter: self.adapter.clone(),
            device: self.device.clone(),
            link: self.link.clone(),
        }))
    }

    fn on_disconnected(&self, callback: DisconnectCallback) {
        self.link.register(callback);
    }
}

struct BluestServer {
    adapter: Adapter,
    device: Device,
    link: Arc<LinkWatch>,
}

#[async_trait]
impl GattServer for BluestServer {
    fn is_connected(&self) -> bool {
        self.link.is_up()
    }

    async fn primary_service(&self, uuid: Uuid) -> Result<Arc<dyn GattService>, HostError> {
        let service = self
            .device
            .discover_services_with_uuid(uuid)
            .await?
            .into_iter()
            .next()
            .ok_or(HostError::ServiceNotFound(uuid))?;
        Ok(Arc::new(BluestService { service }))
    }

    async fn primary_services(&self) -> Result<Vec<Arc<dyn GattService>>, HostError> {
        let services = self.device.discover_services().await?;
        for service in &services {
            info!("Available service: {}", service.uuid());
        }
        Ok(services
            .into_iter()
            .map(|service| Arc::new(BluestService { service }) as Arc<dyn GattService>)
            .collect())
    }

    async fn disconnect(&self) -> Result<(), HostError> {
        info!("Disconnecting from device {}", self.device.id());
        self.link.set_down();
        self.adapter.disconnect_device(&self.device).await?;
        Ok(())
    }
}

struct BluestService {
    service: Service,
}

#[async_trait]
impl GattService for BluestService {
    fn uuid(&self) -> Uuid {
        self.service.uuid()
    }

    async fn characteristic(&self, uuid: Uuid) -> Result<Arc<dyn GattCharacteristic>, HostError> {
        let characteristic = self
            .service
            .discover_characteristics_with_uuid(uuid)
            .await?
            .into_iter()
            .next()
            .ok_or(HostError::CharacteristicNotFound(uuid))?;
        Ok(Arc::new(BluestCharacteristic { characteristic }))
    }

    async fn characteristics(&self) -> Result<Vec<Arc<dyn GattCharacteristic>>, HostError> {
        Ok(self
            .service
            .discover_characteristics()
            .await?
            .into_iter()
            .map(|characteristic| {
                Arc::new(BluestCharacteristic { characteristic }) as Arc<dyn GattCharacteristic>
            })
            .collect())
    }
}

struct BluestCharacteristic {
    characteristic: Characteristic,
}

#[async_trait]
impl GattCharacteristic for BluestCharacteristic {
    fn uuid(&self) -> Uuid {
        self.characteristic.uuid()
    }

    async fn is_writable(&self) -> Result<bool, HostError> {
        let properties = self.characteristic.properties().await?;
        Ok(properties.write || properties.write_without_response)
    }

    async fn write_value(&self, data: &[u8]) -> Result<(), HostError> {
        self.characteristic.write(data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, DisconnectCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let callback = {
            let count = count.clone();
            Box::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }) as DisconnectCallback
        };
        (count, callback)
    }

    #[test]
    fn drop_runs_registered_callbacks_once() {
        let link = LinkWatch::default();
        link.set_up();
        let (count, callback) = counter();
        link.register(callback);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        link.set_down();
        link.set_down();

        assert!(!link.is_up());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_registered_after_drop_runs_immediately() {
        let link = LinkWatch::default();
        link.set_up();
        link.set_down();

        let (count, callback) = counter();
        link.register(callback);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callbacks_do_not_carry_over_to_the_next_link() {
        let link = LinkWatch::default();
        link.set_up();
        let (first, callback) = counter();
        link.register(callback);
        link.set_down();

        link.set_up();
        let (second, callback) = counter();
        link.register(callback);
        link.set_down();

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_drop_of_an_earlier_link_is_ignored() {
        let link = LinkWatch::default();
        let earlier = link.set_up();
        link.set_down();
        link.set_up();
        let (count, callback) = counter();
        link.register(callback);

        link.set_down_at(earlier);

        assert!(link.is_up());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
