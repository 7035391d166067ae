//! VeriSmart bridge library
//! Talks to a VeriSmart learning-kit board over Bluetooth LE: pick a device,
//! connect, and send the command code of a grade project.

// Module declarations
pub mod catalog;
pub mod commands;
pub mod config;
pub mod core;
pub mod logging;
pub mod picker;
pub mod state;
pub mod utils;
