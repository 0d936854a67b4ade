//! Hardware abstraction layer for the switch board's two SPI devices.
//!
//! The board carries a 128 KiB serial EEPROM on one SPI channel and the
//! Ethernet switch controller on another. Each device driver owns its channel
//! behind a mutex, held from the first opcode byte through any settle delay
//! and verify read, so concurrently running tasks can never interleave bytes
//! on the wire.
//!
//! Every data byte is stored inverted on the EEPROM (a zeroed cell reads back
//! as logical 0x00 through the inversion); the [`Eeprom`] driver hides this so
//! callers only ever see logical bytes.

mod bus;
mod controller;
mod eeprom;
mod error;

pub mod sim;

pub use bus::{EventSink, SpiBus};
pub use controller::SwitchController;
pub use eeprom::Eeprom;
pub use error::{HalError, HalResult};
