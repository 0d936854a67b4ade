//! Event-log record types.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Code of a record in the EEPROM event log.
///
/// The discriminant doubles as the record's bit position inside the 32-bit
/// log-status-flags word; a record type is only persisted while its bit is
/// set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventCode {
    /// System started or restarted.
    SystemRestarted = 0,
    /// Kernel stack overflow hook fired.
    StackOverflow = 1,
    /// EEPROM write operation.
    EepromWriteOp = 2,
    /// EEPROM read operation.
    EepromReadOp = 3,
    /// EEPROM write verify or bounds failure.
    EepromIoError = 4,
    /// Switch controller read operation.
    ControllerReadOp = 5,
    /// Switch controller write operation.
    ControllerWriteOp = 6,
    /// Switch controller access failure.
    ControllerIoError = 7,
    /// A user signed in over the console.
    UserLoggedIn = 8,
    /// A user signed out of the console.
    UserLoggedOut = 9,
}

impl EventCode {
    /// Every configurable event type, in flag-bit order.
    pub const ALL: [EventCode; 10] = [
        EventCode::SystemRestarted,
        EventCode::StackOverflow,
        EventCode::EepromWriteOp,
        EventCode::EepromReadOp,
        EventCode::EepromIoError,
        EventCode::ControllerReadOp,
        EventCode::ControllerWriteOp,
        EventCode::ControllerIoError,
        EventCode::UserLoggedIn,
        EventCode::UserLoggedOut,
    ];

    /// Bit of this event in the log-status-flags word.
    pub const fn flag_bit(&self) -> u32 {
        1 << (*self as u8)
    }

    /// Record byte as written to the EEPROM log.
    pub const fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Decodes a record byte read back from the log region.
    pub const fn from_u8(value: u8) -> Result<Self, ParseError> {
        match value {
            0 => Ok(EventCode::SystemRestarted),
            1 => Ok(EventCode::StackOverflow),
            2 => Ok(EventCode::EepromWriteOp),
            3 => Ok(EventCode::EepromReadOp),
            4 => Ok(EventCode::EepromIoError),
            5 => Ok(EventCode::ControllerReadOp),
            6 => Ok(EventCode::ControllerWriteOp),
            7 => Ok(EventCode::ControllerIoError),
            8 => Ok(EventCode::UserLoggedIn),
            9 => Ok(EventCode::UserLoggedOut),
            other => Err(ParseError::InvalidEventCode(other)),
        }
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventCode::SystemRestarted => "System Restarted",
            EventCode::StackOverflow => "Stack Overflow",
            EventCode::EepromWriteOp => "EEPROM Write Operations",
            EventCode::EepromReadOp => "EEPROM Read Operations",
            EventCode::EepromIoError => "EEPROM Read/Write Errors",
            EventCode::ControllerReadOp => "Ethernet Controller Read Operations",
            EventCode::ControllerWriteOp => "Ethernet Controller Write Operations",
            EventCode::ControllerIoError => "Ethernet Controller Read/Write Errors",
            EventCode::UserLoggedIn => "User Logged In",
            EventCode::UserLoggedOut => "User Logged Out",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bits_unique() {
        let mut seen = 0u32;
        for code in EventCode::ALL {
            assert_eq!(seen & code.flag_bit(), 0);
            seen |= code.flag_bit();
        }
    }

    #[test]
    fn test_byte_round_trip() {
        for code in EventCode::ALL {
            assert_eq!(EventCode::from_u8(code.as_u8()).unwrap(), code);
        }
        assert!(EventCode::from_u8(10).is_err());
    }
}
