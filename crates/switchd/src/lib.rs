//! switchd - management daemon for the MISL 100BaseTX switch layer.
//!
//! The daemon owns the board's two SPI devices through [`switch_hal`] and
//! exposes two command transports: an interactive CLI over the console UART
//! and a binary command protocol on the I²C slave endpoint. Long-lived tasks:
//!
//! - the CLI interpreter ([`cli`]), gated by console authentication
//! - the I²C dispatcher ([`i2c`])
//! - the port monitor ([`monitor`]), flushing stale MAC entries on link change
//! - the event logger ([`event_log`]), keeping the circular EEPROM log
//!
//! Configuration persistence (boot restore, `config save`, the VLAN table
//! mirror) lives in [`persist`].

pub mod cli;
pub mod config;
pub mod console;
pub mod devices;
pub mod error;
pub mod event_log;
pub mod handlers;
pub mod i2c;
pub mod monitor;
pub mod persist;
pub mod progress;
pub mod state;
pub mod status;
pub mod users;
pub mod vlan_table;

pub use config::DaemonConfig;
pub use devices::{Ctx, Devices};
pub use error::{SwitchdError, SwitchdResult};
pub use state::{SharedState, SystemState};

/// Cooperative delay tiers for long-running operations.
pub mod delays {
    use std::time::Duration;

    /// For looping or querying work.
    pub const VERY_SHORT: Duration = Duration::from_millis(5);
    /// For operations that take around ten milliseconds.
    pub const SHORT: Duration = Duration::from_millis(10);
    /// For operations that need forty milliseconds or more.
    pub const LONG: Duration = Duration::from_millis(40);
}
