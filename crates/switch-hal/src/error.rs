//! Error types for HAL operations.

use thiserror::Error;

/// Result type alias for HAL operations.
pub type HalResult<T> = Result<T, HalError>;

/// Errors that can occur while talking to a SPI device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HalError {
    /// Address or range beyond the device's capacity.
    #[error("address 0x{address:05X} (+{len}) outside device capacity 0x{capacity:05X}")]
    OutOfRange {
        address: u32,
        len: u32,
        capacity: u32,
    },

    /// A write's read-back did not match the byte written.
    #[error("EEPROM verify mismatch at 0x{address:05X}: wrote 0x{wrote:02X}, read 0x{read:02X}")]
    VerifyMismatch { address: u32, wrote: u8, read: u8 },

    /// A polled device bit did not settle within the retry budget.
    #[error("device bit poll timed out after {attempts} attempts")]
    BitPollTimeout { attempts: u32 },

    /// Transport-level failure reported by the bus implementation.
    #[error("SPI bus error: {0}")]
    Bus(String),
}

impl HalError {
    /// Creates a bus error from any displayable cause.
    pub fn bus(message: impl Into<String>) -> Self {
        HalError::Bus(message.into())
    }

    /// Returns true if retrying the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HalError::VerifyMismatch { .. } | HalError::BitPollTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = HalError::VerifyMismatch {
            address: 0x300,
            wrote: 0x5A,
            read: 0xFF,
        };
        assert!(err.to_string().contains("0x00300"));
        assert!(err.to_string().contains("0x5A"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(HalError::BitPollTimeout { attempts: 10 }.is_retryable());
        assert!(!HalError::bus("gone").is_retryable());
    }
}
