//! Connection controller
//! Wraps [`BluetoothManager`] behind a published [`ControllerState`] so any
//! number of consumers can follow the connection without touching the
//! session. Failures never escape: they land in `last_error`.

use std::sync::Arc;

use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::core::bluetooth::{BluetoothDeviceHandle, BluetoothError, BluetoothManager, Command, SessionEvent};

/// Snapshot observed by consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerState {
    pub device: Option<BluetoothDeviceHandle>,
    pub is_connected: bool,
    pub is_scanning: bool,
    pub is_supported: bool,
    #[serde(rename = "error")]
    pub last_error: Option<String>,
}

impl ControllerState {
    fn initial(is_supported: bool) -> Self {
        Self {
            device: None,
            is_connected: false,
            is_scanning: false,
            is_supported,
            last_error: None,
        }
    }
}

/// Resets `is_scanning` on every exit path of a connect attempt.
struct ScanningGuard<'a> {
    state: &'a watch::Sender<ControllerState>,
}

impl<'a> ScanningGuard<'a> {
    fn acquire(state: &'a watch::Sender<ControllerState>) -> Self {
        state.send_modify(|s| {
            s.is_scanning = true;
            s.last_error = None;
        });
        Self { state }
    }
}

impl Drop for ScanningGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| s.is_scanning = false);
    }
}

pub struct ConnectionController {
    manager: Arc<BluetoothManager>,
    state: Arc<watch::Sender<ControllerState>>,
    connect_lock: Mutex<()>,
    send_lock: Mutex<()>,
    observer: JoinHandle<()>,
}

impl ConnectionController {
    /// Must be called from within a tokio runtime: the session observer is
    /// spawned here.
    pub fn new(manager: Arc<BluetoothManager>) -> Self {
        let (state, _) = watch::channel(ControllerState::initial(manager.is_supported()));
        let state = Arc::new(state);
        let observer = tokio::spawn(Self::observe_session(
            manager.subscribe(),
            manager.clone(),
            state.clone(),
        ));
        Self {
            manager,
            state,
            connect_lock: Mutex::new(()),
            send_lock: Mutex::new(()),
            observer,
        }
    }

    pub fn snapshot(&self) -> ControllerState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.state.subscribe()
    }

    /// Lets the user pick a device and connects to it. A call made while
    /// another attempt is in flight returns without doing anything.
    pub async fn scan_and_connect(&self) {
        let Ok(_attempt) = self.connect_lock.try_lock() else {
            info!("Connect attempt already in progress");
            return;
        };
        let _scanning = ScanningGuard::acquire(&self.state);

        let handle = match self.manager.scan_and_select().await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                debug!("Device picker dismissed");
                return;
            }
            Err(e) => {
                self.fail(&e);
                return;
            }
        };

        match self.manager.connect(&handle).await {
            Ok(()) => Self::sync_session(&self.manager, &self.state),
            Err(e) => self.fail(&e),
        }
    }

    /// Drops the connection. Local state is reset whatever the outcome.
    pub async fn disconnect(&self) {
        self.manager.disconnect().await;
        self.state.send_modify(|s| {
            s.device = None;
            s.is_connected = false;
            s.last_error = None;
        });
    }

    /// Sends one command; `false` means it failed and `last_error` says why.
    pub async fn send_command(&self, command: &Command) -> bool {
        let _send = self.send_lock.lock().await;
        self.state.send_if_modified(|s| s.last_error.take().is_some());

        match self.manager.write(command).await {
            Ok(()) => true,
            Err(e) => {
                self.state.send_modify(|s| s.last_error = Some(e.to_string()));
                false
            }
        }
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.last_error.take().is_some());
    }

    /// Publishes the error, then mirrors whatever session the manager holds
    /// now. A failed scan leaves a live session alone; a failed reconnect has
    /// already torn the previous one down.
    fn fail(&self, e: &BluetoothError) {
        if e.is_retriable() {
            warn!("{} (retry may succeed)", e);
        } else {
            error!("{}", e);
        }
        self.state.send_modify(|s| s.last_error = Some(e.to_string()));
        Self::sync_session(&self.manager, &self.state);
    }

    /// Copies the manager's session into the published state. The session is
    /// read inside the watch update so a concurrent publish from the observer
    /// cannot interleave with it.
    fn sync_session(manager: &BluetoothManager, state: &watch::Sender<ControllerState>) {
        state.send_if_modified(|s| {
            let current = manager.current_state();
            let changed = s.device != current.device || s.is_connected != current.is_connected;
            s.device = current.device;
            s.is_connected = current.is_connected;
            changed
        });
    }

    async fn observe_session(
        mut events: tokio::sync::broadcast::Receiver<SessionEvent>,
        manager: Arc<BluetoothManager>,
        state: Arc<watch::Sender<ControllerState>>,
    ) {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Lost { device_id }) => {
                    debug!("Session with {} lost", device_id);
                    Self::sync_session(&manager, &state);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Missed {} session events", skipped);
                    Self::sync_session(&manager, &state);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

impl Drop for ConnectionController {
    fn drop(&mut self) {
        self.observer.abort();
    }
}
