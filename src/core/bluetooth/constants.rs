//! Constants used throughout the bridge
//! UUIDs of the UART-over-BLE profile the VeriSmart board exposes,
//! plus timing defaults for discovery.

use uuid::Uuid;

/// Service UUID of the UART-over-BLE profile (HM-10 style modules)
pub const UUID_UART_SERVICE: Uuid = Uuid::from_u128(0x0000ffe0_0000_1000_8000_00805f9b34fb);

/// Characteristic UUID used for outbound command writes
pub const UUID_UART_CHARACTERISTIC: Uuid = Uuid::from_u128(0x0000ffe1_0000_1000_8000_00805f9b34fb);

/// Name shown for peripherals that do not advertise one
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

/// Command that puts the board back to idle
pub const STOP_COMMAND: &str = "000";

/// Terminator appended to every command on the wire
pub const COMMAND_TERMINATOR: u8 = b'\n';

/// Scan duration in seconds
pub const DEFAULT_SCAN_DURATION_SECS: u64 = 5;

/// How long to wait for the host adapter to become available
pub const DEFAULT_ADAPTER_TIMEOUT_SECS: u64 = 3;

/// Capacity of the session event channel
pub const SESSION_EVENT_CAPACITY: usize = 16;
