//! Application state management
//! Owns the single connection controller for the lifetime of the process.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::core::ConnectionController;
use crate::core::bluetooth::{BluestHost, BluetoothManager, GattProfile};
use crate::picker::{ConsoleInput, ConsolePicker};

/// Application state, created once at start-up and passed to every command
pub struct AppState {
    pub config: AppConfig,
    pub catalog: Catalog,
    pub controller: Arc<ConnectionController>,
    /// Stdin, shared by the device picker and the command prompts
    pub input: Arc<ConsoleInput>,
}

impl AppState {
    /// Creates a new AppState instance backed by the platform Bluetooth stack
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing BluetoothManager...");
        let input = Arc::new(ConsoleInput::stdin());
        let picker = Arc::new(ConsolePicker::new(input.clone()));
        let host = BluestHost::new(&config.bluetooth).await;
        let manager = BluetoothManager::new(Arc::new(host), picker, GattProfile::from(&config.bluetooth));
        let catalog = Catalog::builtin().context("loading the built-in project catalog")?;
        Ok(Self {
            config,
            catalog,
            controller: Arc::new(ConnectionController::new(Arc::new(manager))),
            input,
        })
    }
}
