//! Driver for the 128 KiB serial EEPROM.

use crate::{EventSink, HalError, HalResult, SpiBus};
use std::time::Duration;
use switch_types::{layout, EventCode};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const OP_WRITE_ENABLE: u8 = 0x06;
const OP_WRITE: u8 = 0x02;
const OP_READ: u8 = 0x03;
const OP_READ_STATUS: u8 = 0x05;
const OP_PAGE_ERASE: u8 = 0x42;
const OP_CHIP_ERASE: u8 = 0xC7;

/// The device needs a fixed interval to commit a written cell before the
/// verify read is meaningful.
const WRITE_SETTLE: Duration = Duration::from_millis(8);
const ERASE_SETTLE: Duration = Duration::from_millis(10);
const WIP_POLL_INTERVAL: Duration = Duration::from_millis(1);
const WIP_POLL_LIMIT: u32 = 500;

/// Serialized access to the serial EEPROM.
///
/// Each public operation holds the channel mutex for the full transaction,
/// including the post-write settle and verify read. Data bytes are inverted
/// on the wire; callers see logical values only.
pub struct Eeprom<B: SpiBus> {
    bus: Mutex<B>,
    events: EventSink,
}

impl<B: SpiBus> Eeprom<B> {
    /// Creates the driver over a bus, reporting operations to `events`.
    pub fn new(bus: B, events: EventSink) -> Self {
        Eeprom {
            bus: Mutex::new(bus),
            events,
        }
    }

    /// Writes one byte and verifies it by reading the cell back.
    pub async fn write(&self, address: u32, byte: u8) -> HalResult<()> {
        self.events.record(EventCode::EepromWriteOp);
        let mut bus = self.bus.lock().await;
        match Self::write_locked(&mut bus, address, byte).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.events.record(EventCode::EepromIoError);
                Err(err)
            }
        }
    }

    /// Reads one byte.
    pub async fn read(&self, address: u32) -> HalResult<u8> {
        self.events.record(EventCode::EepromReadOp);
        let mut bus = self.bus.lock().await;
        Self::read_locked(&mut bus, address).await
    }

    /// Writes a run of bytes starting at `start`, verifying each cell.
    ///
    /// The whole run is rejected up front when it would pass the end of the
    /// device; the channel stays held until the last byte is verified.
    pub async fn bulk_write(&self, start: u32, data: &[u8]) -> HalResult<()> {
        self.events.record(EventCode::EepromWriteOp);
        self.check_range(start, data.len() as u32)?;

        let mut bus = self.bus.lock().await;
        for (offset, &byte) in data.iter().enumerate() {
            if let Err(err) = Self::write_locked(&mut bus, start + offset as u32, byte).await {
                warn!(address = start + offset as u32, "bulk write aborted: {err}");
                self.events.record(EventCode::EepromIoError);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Reads `out.len()` bytes starting at `start`.
    pub async fn bulk_read(&self, start: u32, out: &mut [u8]) -> HalResult<()> {
        self.events.record(EventCode::EepromReadOp);
        self.check_range(start, out.len() as u32)?;

        let mut bus = self.bus.lock().await;
        for (offset, slot) in out.iter_mut().enumerate() {
            *slot = Self::read_locked(&mut bus, start + offset as u32).await?;
        }
        Ok(())
    }

    /// Erases the 256-byte page containing `address`, polling the status
    /// register until the device finishes.
    pub async fn page_erase(&self, address: u32) -> HalResult<()> {
        self.events.record(EventCode::EepromWriteOp);
        let mut bus = self.bus.lock().await;

        bus.transfer(&[OP_WRITE_ENABLE]).await?;
        bus.transfer(&[OP_PAGE_ERASE, addr_byte(address, 2), addr_byte(address, 1), addr_byte(address, 0)])
            .await?;
        tokio::time::sleep(ERASE_SETTLE).await;

        for _ in 0..WIP_POLL_LIMIT {
            let status = bus.transfer(&[OP_READ_STATUS, 0x00]).await?;
            if status[1] & 0x01 == 0 {
                return Ok(());
            }
            tokio::time::sleep(WIP_POLL_INTERVAL).await;
        }
        self.events.record(EventCode::EepromIoError);
        Err(HalError::BitPollTimeout {
            attempts: WIP_POLL_LIMIT,
        })
    }

    /// Erases the entire device.
    pub async fn chip_erase(&self) -> HalResult<()> {
        self.events.record(EventCode::EepromWriteOp);
        let mut bus = self.bus.lock().await;

        bus.transfer(&[OP_WRITE_ENABLE]).await?;
        bus.transfer(&[OP_CHIP_ERASE]).await?;
        tokio::time::sleep(ERASE_SETTLE).await;
        debug!("chip erase issued");
        Ok(())
    }

    fn check_range(&self, start: u32, len: u32) -> HalResult<()> {
        if start >= layout::EEPROM_SIZE || start + len > layout::EEPROM_SIZE {
            self.events.record(EventCode::EepromIoError);
            return Err(HalError::OutOfRange {
                address: start,
                len,
                capacity: layout::EEPROM_SIZE,
            });
        }
        Ok(())
    }

    async fn write_locked(bus: &mut B, address: u32, byte: u8) -> HalResult<()> {
        bus.transfer(&[OP_WRITE_ENABLE]).await?;
        bus.transfer(&[
            OP_WRITE,
            addr_byte(address, 2),
            addr_byte(address, 1),
            addr_byte(address, 0),
            !byte,
        ])
        .await?;
        tokio::time::sleep(WRITE_SETTLE).await;

        let read = Self::read_locked(bus, address).await?;
        if read == byte {
            Ok(())
        } else {
            Err(HalError::VerifyMismatch {
                address,
                wrote: byte,
                read,
            })
        }
    }

    async fn read_locked(bus: &mut B, address: u32) -> HalResult<u8> {
        let rx = bus
            .transfer(&[
                OP_READ,
                addr_byte(address, 2),
                addr_byte(address, 1),
                addr_byte(address, 0),
                0x00,
            ])
            .await?;
        Ok(!rx[4])
    }
}

/// Byte `index` (0 = lowest) of a 24-bit address, high-to-low on the wire.
const fn addr_byte(address: u32, index: u32) -> u8 {
    ((address >> (8 * index)) & 0xFF) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimEepromBus;
    use pretty_assertions::assert_eq;

    fn device() -> Eeprom<SimEepromBus> {
        Eeprom::new(SimEepromBus::new(), EventSink::disabled())
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_read_round_trip() {
        let eeprom = device();
        eeprom.write(0x300, 0xAB).await.unwrap();
        assert_eq!(eeprom.read(0x300).await.unwrap(), 0xAB);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_device_reads_zero() {
        let eeprom = device();
        assert_eq!(eeprom.read(0x1234).await.unwrap(), 0x00);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_round_trip() {
        let eeprom = device();
        let data: Vec<u8> = (0..64).map(|i| i as u8 ^ 0x5A).collect();
        eeprom.bulk_write(0x2000, &data).await.unwrap();

        let mut out = vec![0u8; data.len()];
        eeprom.bulk_read(0x2000, &mut out).await.unwrap();
        assert_eq!(out, data);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_bounds_rejected() {
        let eeprom = device();
        let err = eeprom.bulk_write(layout::EEPROM_SIZE, &[1]).await.unwrap_err();
        assert!(matches!(err, HalError::OutOfRange { .. }));

        let err = eeprom
            .bulk_write(layout::EEPROM_SIZE - 1, &[1, 2])
            .await
            .unwrap_err();
        assert!(matches!(err, HalError::OutOfRange { .. }));

        let mut out = [0u8; 4];
        let err = eeprom
            .bulk_read(layout::EEPROM_SIZE - 2, &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, HalError::OutOfRange { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_erase_clears_page() {
        let eeprom = device();
        eeprom.write(0x205, 0x77).await.unwrap();
        eeprom.page_erase(0x200).await.unwrap();
        assert_eq!(eeprom.read(0x205).await.unwrap(), 0x00);
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_mismatch_reports_error() {
        let bus = SimEepromBus::new();
        bus.fail_next_write();
        let eeprom = Eeprom::new(bus, EventSink::disabled());
        let err = eeprom.write(0x10, 0x42).await.unwrap_err();
        assert!(matches!(err, HalError::VerifyMismatch { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inversion_on_the_wire() {
        let bus = SimEepromBus::new();
        let state = bus.handle();
        let eeprom = Eeprom::new(bus, EventSink::disabled());
        eeprom.write(0x00, 0xAB).await.unwrap();
        // Logical 0xAB is stored as 0x54 in the raw cell.
        assert_eq!(state.raw_byte(0x00), 0x54);
    }
}
