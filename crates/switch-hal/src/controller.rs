//! Driver for the Ethernet switch controller's SPI register interface.

use crate::{EventSink, HalError, HalResult, SpiBus};
use switch_types::EventCode;
use tokio::sync::Mutex;

const OP_READ: u8 = 0x03;
const OP_WRITE: u8 = 0x02;

/// Serialized access to the switch controller's 8-bit register file.
///
/// Writes are not read back for verification: several control bits are
/// self-clearing or reflect live status, so a verify loop is the caller's
/// responsibility when it applies.
pub struct SwitchController<B: SpiBus> {
    bus: Mutex<B>,
    events: EventSink,
}

impl<B: SpiBus> SwitchController<B> {
    /// Creates the driver over a bus, reporting operations to `events`.
    pub fn new(bus: B, events: EventSink) -> Self {
        SwitchController {
            bus: Mutex::new(bus),
            events,
        }
    }

    /// Reads one register.
    pub async fn read(&self, reg: u8) -> HalResult<u8> {
        self.events.record(EventCode::ControllerReadOp);
        let mut bus = self.bus.lock().await;
        let rx = bus.transfer(&[OP_READ, reg, 0x00]).await?;
        Ok(rx[2])
    }

    /// Reads `out.len()` consecutive registers starting at `start`.
    pub async fn bulk_read(&self, start: u8, out: &mut [u8]) -> HalResult<()> {
        self.events.record(EventCode::ControllerReadOp);
        if start as usize + out.len() > 256 {
            self.events.record(EventCode::ControllerIoError);
            return Err(HalError::OutOfRange {
                address: start as u32,
                len: out.len() as u32,
                capacity: 256,
            });
        }

        let mut bus = self.bus.lock().await;
        for (offset, slot) in out.iter_mut().enumerate() {
            let rx = bus.transfer(&[OP_READ, start + offset as u8, 0x00]).await?;
            *slot = rx[2];
        }
        Ok(())
    }

    /// Writes one register.
    pub async fn write(&self, reg: u8, byte: u8) -> HalResult<()> {
        self.events.record(EventCode::ControllerWriteOp);
        let mut bus = self.bus.lock().await;
        bus.transfer(&[OP_WRITE, reg, byte]).await?;
        Ok(())
    }

    /// Read-modify-write setting `bit` of `reg`.
    pub async fn set_bit(&self, reg: u8, bit: u8) -> HalResult<()> {
        let value = self.read(reg).await?;
        self.write(reg, value | (1 << bit)).await
    }

    /// Read-modify-write clearing `bit` of `reg`.
    pub async fn clear_bit(&self, reg: u8, bit: u8) -> HalResult<()> {
        let value = self.read(reg).await?;
        self.write(reg, value & !(1 << bit)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimControllerBus;
    use pretty_assertions::assert_eq;

    fn device() -> SwitchController<SimControllerBus> {
        SwitchController::new(SimControllerBus::new(), EventSink::disabled())
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let ctrl = device();
        ctrl.write(0x45, 0x5A).await.unwrap();
        assert_eq!(ctrl.read(0x45).await.unwrap(), 0x5A);
    }

    #[tokio::test]
    async fn test_bulk_read() {
        let ctrl = device();
        ctrl.write(0x10, 0x11).await.unwrap();
        ctrl.write(0x11, 0x22).await.unwrap();
        ctrl.write(0x12, 0x33).await.unwrap();

        let mut out = [0u8; 3];
        ctrl.bulk_read(0x10, &mut out).await.unwrap();
        assert_eq!(out, [0x11, 0x22, 0x33]);
    }

    #[tokio::test]
    async fn test_bulk_read_bounds() {
        let ctrl = device();
        let mut out = [0u8; 8];
        let err = ctrl.bulk_read(0xFC, &mut out).await.unwrap_err();
        assert!(matches!(err, HalError::OutOfRange { .. }));
    }

    #[tokio::test]
    async fn test_set_clear_bit() {
        let ctrl = device();
        ctrl.write(0x30, 0x00).await.unwrap();
        ctrl.set_bit(0x30, 3).await.unwrap();
        assert_eq!(ctrl.read(0x30).await.unwrap(), 0x08);
        ctrl.clear_bit(0x30, 3).await.unwrap();
        assert_eq!(ctrl.read(0x30).await.unwrap(), 0x00);
    }
}
