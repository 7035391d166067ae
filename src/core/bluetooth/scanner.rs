use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bluest::{Adapter, Device};
use futures_util::StreamExt;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::error::HostError;
use crate::core::bluetooth::types::DeviceCandidate;

type SeenDevices = Arc<Mutex<HashMap<String, (DeviceCandidate, Device)>>>;

/// Collects nearby peripherals for a fixed scan window
pub struct BluetoothScanner {
    adapter: Adapter,
    scan_window: Duration,
    name_filter: Option<String>,
}

impl BluetoothScanner {
    pub fn new(adapter: Adapter, scan_window: Duration, name_filter: Option<String>) -> Self {
        Self {
            adapter,
            scan_window,
            name_filter: name_filter.map(|filter| filter.to_lowercase()),
        }
    }

    /// Runs one discovery pass. Connected devices come first, then the rest
    /// by signal strength.
    pub async fn discover(&self) -> Result<Vec<(DeviceCandidate, Device)>, HostError> {
        let devices: SeenDevices = Arc::new(Mutex::new(HashMap::new()));

        // find connected devices first
        info!("Checking for connected devices");
        for device in self.adapter.connected_devices().await? {
            let name = device.name().ok();
            let candidate = DeviceCandidate {
                id: device.id().to_string(),
                name,
                rssi: None,
                is_connected: true,
            };
            Self::record(&devices, self.name_filter.as_deref(), candidate, device);
        }

        let cancel_token = CancellationToken::new();
        let mut handle = tokio::spawn(Self::internal_scan_task(
            self.adapter.clone(),
            devices.clone(),
            cancel_token.clone(),
            self.name_filter.clone(),
        ));

        info!("Scanning for {:?}", self.scan_window);
        let finished = tokio::select! {
            result = &mut handle => Some(result),
            _ = tokio::time::sleep(self.scan_window) => None,
        };
        let task_result = match finished {
            Some(result) => result,
            None => {
                cancel_token.cancel();
                handle.await
            }
        };

        match task_result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(e) => return Err(HostError::ScanTask(e.to_string())),
        }

        let mut found: Vec<_> = devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        found.sort_by(|(a, _), (b, _)| {
            b.is_connected
                .cmp(&a.is_connected)
                .then(b.rssi.unwrap_or(i16::MIN).cmp(&a.rssi.unwrap_or(i16::MIN)))
        });
        info!("Scan complete, {} device(s) found", found.len());
        Ok(found)
    }

    async fn internal_scan_task(
        adapter: Adapter,
        devices: SeenDevices,
        cancel_token: CancellationToken,
        name_filter: Option<String>,
    ) -> Result<(), HostError> {
        info!("Starting bluetooth scan");
        let scan_stream = adapter.scan(&[]).await?;
        futures_util::pin_mut!(scan_stream);

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered_device) => {
                            let device = discovered_device.device;
                            let name = discovered_device
                                .adv_data
                                .local_name
                                .or_else(|| device.name().ok());
                            debug!("Found device - Device: {:?}, Name: {:?}, RSSI: {:?}", device, name, discovered_device.rssi);
                            let candidate = DeviceCandidate {
                                id: device.id().to_string(),
                                name,
                                rssi: discovered_device.rssi,
                                is_connected: false,
                            };
                            Self::record(&devices, name_filter.as_deref(), candidate, device);
                        }
                        None => {
                            warn!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Keeps one entry per device id, preferring the strongest signal seen.
    fn record(devices: &SeenDevices, name_filter: Option<&str>, candidate: DeviceCandidate, device: Device) {
        if !matches_filter(&candidate, name_filter) {
            return;
        }
        let mut devices = devices.lock().unwrap_or_else(PoisonError::into_inner);
        match devices.get_mut(&candidate.id) {
            Some((existing, _)) => {
                if candidate.rssi > existing.rssi {
                    existing.rssi = candidate.rssi;
                }
                if existing.name.is_none() {
                    existing.name = candidate.name;
                }
            }
            None => {
                devices.insert(candidate.id.clone(), (candidate, device));
            }
        }
    }
}

/// Case-insensitive substring match on the advertised name. `filter` is
/// already lowercase.
fn matches_filter(candidate: &DeviceCandidate, filter: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(filter) => candidate
            .name
            .as_ref()
            .map(|name| name.to_lowercase().contains(filter))
            .unwrap_or(false),
    }
}
