//! Simulated SPI devices.
//!
//! Host builds and tests run the daemon against software models of the two
//! board devices. Both models journal the traffic they see, generalizing the
//! capture-and-assert pattern the real drivers are tested with: a test can
//! replay exactly which registers an operation touched and in which order.

use crate::{HalResult, SpiBus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use switch_types::{layout, regs, PortId};

// ---------------------------------------------------------------------------
// EEPROM model
// ---------------------------------------------------------------------------

/// One decoded frame seen by the EEPROM model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EepromFrame {
    WriteEnable,
    Write { address: u32 },
    Read { address: u32 },
    PageErase { address: u32 },
    ChipErase,
    ReadStatus,
}

#[derive(Debug)]
struct EepromState {
    /// Raw cell contents; an erased cell holds 0xFF (logical 0x00).
    mem: Vec<u8>,
    write_enabled: bool,
    fail_next_write: bool,
    frames: Vec<EepromFrame>,
}

/// Model of a page-structured 128 KiB serial EEPROM.
#[derive(Clone)]
pub struct SimEepromBus {
    state: Arc<Mutex<EepromState>>,
}

/// Inspection handle into a [`SimEepromBus`], shared with the bus itself.
#[derive(Clone)]
pub struct SimEepromHandle {
    state: Arc<Mutex<EepromState>>,
}

impl SimEepromBus {
    pub fn new() -> Self {
        SimEepromBus {
            state: Arc::new(Mutex::new(EepromState {
                mem: vec![0xFF; layout::EEPROM_SIZE as usize],
                write_enabled: false,
                fail_next_write: false,
                frames: Vec::new(),
            })),
        }
    }

    /// Returns an inspection handle sharing this bus's state.
    pub fn handle(&self) -> SimEepromHandle {
        SimEepromHandle {
            state: self.state.clone(),
        }
    }

    /// Corrupts the next write so the driver's verify read fails.
    pub fn fail_next_write(&self) {
        self.state.lock().unwrap().fail_next_write = true;
    }
}

impl Default for SimEepromBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEepromHandle {
    /// Raw (inverted-on-disk) cell value, bypassing the driver.
    pub fn raw_byte(&self, address: u32) -> u8 {
        self.state.lock().unwrap().mem[address as usize]
    }

    /// Every frame decoded since the last [`clear_frames`](Self::clear_frames).
    pub fn frames(&self) -> Vec<EepromFrame> {
        self.state.lock().unwrap().frames.clone()
    }

    pub fn clear_frames(&self) {
        self.state.lock().unwrap().frames.clear();
    }
}

#[async_trait]
impl SpiBus for SimEepromBus {
    async fn transfer(&mut self, tx: &[u8]) -> HalResult<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        let mut rx = vec![0u8; tx.len()];
        let capacity = state.mem.len() as u32;

        match tx[0] {
            0x06 => {
                state.write_enabled = true;
                state.frames.push(EepromFrame::WriteEnable);
            }
            0x02 => {
                let address = frame_address(tx) % capacity;
                state.frames.push(EepromFrame::Write { address });
                if state.write_enabled {
                    for (i, &byte) in tx[4..].iter().enumerate() {
                        let stored = if state.fail_next_write { !byte } else { byte };
                        let idx = ((address + i as u32) % capacity) as usize;
                        state.mem[idx] = stored;
                    }
                    state.fail_next_write = false;
                    state.write_enabled = false;
                }
            }
            0x03 => {
                let address = frame_address(tx) % capacity;
                state.frames.push(EepromFrame::Read { address });
                for (i, slot) in rx.iter_mut().enumerate().skip(4) {
                    let idx = ((address + (i - 4) as u32) % capacity) as usize;
                    *slot = state.mem[idx];
                }
            }
            0x42 => {
                let address = frame_address(tx) % capacity;
                state.frames.push(EepromFrame::PageErase { address });
                if state.write_enabled {
                    let page = (address / layout::PAGE_SIZE) * layout::PAGE_SIZE;
                    for offset in 0..layout::PAGE_SIZE {
                        state.mem[(page + offset) as usize] = 0xFF;
                    }
                    state.write_enabled = false;
                }
            }
            0xC7 => {
                state.frames.push(EepromFrame::ChipErase);
                if state.write_enabled {
                    state.mem.fill(0xFF);
                    state.write_enabled = false;
                }
            }
            0x05 => {
                state.frames.push(EepromFrame::ReadStatus);
                // Erase completes within the driver's settle; WIP reads clear.
                rx[1] = 0x00;
            }
            _ => {}
        }
        Ok(rx)
    }
}

fn frame_address(tx: &[u8]) -> u32 {
    ((tx[1] as u32) << 16) | ((tx[2] as u32) << 8) | tx[3] as u32
}

// ---------------------------------------------------------------------------
// Switch controller model
// ---------------------------------------------------------------------------

/// One register operation seen by the controller model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtrlOp {
    Read { reg: u8, value: u8 },
    Write { reg: u8, value: u8 },
}

#[derive(Debug)]
struct ControllerState {
    regs: [u8; 256],
    vlan_groups: Vec<[u8; 7]>,
    static_mac: Vec<[u8; 8]>,
    dyn_mac: Vec<[u8; 9]>,
    /// LinkMD result per port base: (state bits for LinkMD0 6:5, raw distance).
    linkmd_results: HashMap<u8, (u8, u16)>,
    journal: Vec<CtrlOp>,
}

/// Model of the register-and-indirect-table switch controller.
///
/// Self-clearing control bits (dynamic-MAC flush, restart auto-negotiation,
/// LinkMD start) stay asserted for exactly one read, so polling code is
/// genuinely exercised. Writes to the indirect address-low register move a
/// row between the table storage and the data-register window, in whichever
/// direction the control register selects.
#[derive(Clone)]
pub struct SimControllerBus {
    state: Arc<Mutex<ControllerState>>,
}

/// Inspection handle into a [`SimControllerBus`].
#[derive(Clone)]
pub struct SimControllerHandle {
    state: Arc<Mutex<ControllerState>>,
}

impl SimControllerBus {
    pub fn new() -> Self {
        let mut dyn_mac = vec![[0u8; 9]; 1024];
        for row in &mut dyn_mac {
            // Bit 7 of the first byte flags an empty dynamic table.
            row[0] = 0x80;
        }
        SimControllerBus {
            state: Arc::new(Mutex::new(ControllerState {
                regs: [0u8; 256],
                vlan_groups: vec![[0u8; 7]; 1024],
                static_mac: vec![[0u8; 8]; 1024],
                dyn_mac,
                linkmd_results: HashMap::new(),
                journal: Vec::new(),
            })),
        }
    }

    pub fn handle(&self) -> SimControllerHandle {
        SimControllerHandle {
            state: self.state.clone(),
        }
    }
}

impl Default for SimControllerBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimControllerHandle {
    pub fn reg(&self, reg: u8) -> u8 {
        self.state.lock().unwrap().regs[reg as usize]
    }

    pub fn set_reg(&self, reg: u8, value: u8) {
        self.state.lock().unwrap().regs[reg as usize] = value;
    }

    pub fn vlan_group(&self, index: u16) -> [u8; 7] {
        self.state.lock().unwrap().vlan_groups[index as usize]
    }

    pub fn set_vlan_group(&self, index: u16, data: [u8; 7]) {
        self.state.lock().unwrap().vlan_groups[index as usize] = data;
    }

    pub fn set_static_mac_row(&self, index: u16, data: [u8; 8]) {
        self.state.lock().unwrap().static_mac[index as usize] = data;
    }

    pub fn set_dyn_mac_row(&self, index: u16, data: [u8; 9]) {
        self.state.lock().unwrap().dyn_mac[index as usize] = data;
    }

    /// Configures the diagnostics result the next LinkMD run will report.
    pub fn set_linkmd_result(&self, port: PortId, state_bits: u8, distance: u16) {
        self.state
            .lock()
            .unwrap()
            .linkmd_results
            .insert(port.hw_base(), (state_bits & 0x60, distance & 0x1FF));
    }

    pub fn journal(&self) -> Vec<CtrlOp> {
        self.state.lock().unwrap().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.state.lock().unwrap().journal.clear();
    }
}

#[async_trait]
impl SpiBus for SimControllerBus {
    async fn transfer(&mut self, tx: &[u8]) -> HalResult<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        let mut rx = vec![0u8; tx.len()];

        match tx[0] {
            0x03 => {
                let reg = tx[1];
                let value = state.regs[reg as usize];
                rx[2] = value;
                state.journal.push(CtrlOp::Read { reg, value });
                state.settle_after_read(reg, value);
            }
            0x02 => {
                let reg = tx[1];
                let value = tx[2];
                state.journal.push(CtrlOp::Write { reg, value });
                state.regs[reg as usize] = value;
                if reg == regs::INDIRECT_ACCESS_CONTROL_1 {
                    state.run_indirect_cycle(value);
                }
            }
            _ => {}
        }
        Ok(rx)
    }
}

impl ControllerState {
    /// Clears any self-clearing bit the caller just observed asserted.
    fn settle_after_read(&mut self, reg: u8, value: u8) {
        if reg == regs::GLOBAL_CONTROL_0 && value & (1 << regs::FLUSH_DYN_MAC_BIT) != 0 {
            self.regs[reg as usize] = value & !(1 << regs::FLUSH_DYN_MAC_BIT);
            return;
        }
        for port in PortId::SCAN_ORDER {
            if reg == port.reg(regs::PORT_CONTROL6_OFFSET) && value & (1 << 5) != 0 {
                self.regs[reg as usize] = value & !(1 << 5);
                return;
            }
            if reg == port.reg(regs::PORT_LINKMD0_OFFSET) && value & 0x10 != 0 {
                let (cable_state, distance) = self
                    .linkmd_results
                    .get(&port.hw_base())
                    .copied()
                    .unwrap_or((0x00, 26));
                let mut result = value & !0x71;
                result |= cable_state;
                result |= ((distance >> 8) & 0x01) as u8;
                self.regs[reg as usize] = result;
                self.regs[port.reg(regs::PORT_LINKMD1_OFFSET) as usize] = (distance & 0xFF) as u8;
                return;
            }
        }
    }

    /// A write to the indirect address-low register moves one table row.
    fn run_indirect_cycle(&mut self, addr_low: u8) {
        let ctrl0 = self.regs[regs::INDIRECT_ACCESS_CONTROL_0 as usize];
        let table = (ctrl0 >> regs::INDIRECT_TABLE_SELECT_SHIFT) & 0x03;
        let is_read = (ctrl0 >> regs::INDIRECT_READ_BIT) & 1 == 1;
        let row = ((((ctrl0 & 0x03) as u16) << 8) | addr_low as u16) as usize;

        match table {
            regs::TABLE_VLAN => {
                let base = regs::INDIRECT_DATA_6 as usize;
                if is_read {
                    let data = self.vlan_groups[row % 1024];
                    self.regs[base..base + 7].copy_from_slice(&data);
                } else {
                    let mut data = [0u8; 7];
                    data.copy_from_slice(&self.regs[base..base + 7]);
                    self.vlan_groups[row % 1024] = data;
                }
            }
            regs::TABLE_STATIC_MAC => {
                let base = regs::INDIRECT_DATA_7 as usize;
                if is_read {
                    let data = self.static_mac[row % 1024];
                    self.regs[base..base + 8].copy_from_slice(&data);
                } else {
                    let mut data = [0u8; 8];
                    data.copy_from_slice(&self.regs[base..base + 8]);
                    self.static_mac[row % 1024] = data;
                }
            }
            regs::TABLE_DYN_MAC => {
                if is_read {
                    let base = regs::INDIRECT_DATA_8 as usize;
                    let data = self.dyn_mac[row % 1024];
                    self.regs[base..base + 9].copy_from_slice(&data);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_eeprom_requires_write_enable() {
        let mut bus = SimEepromBus::new();
        bus.transfer(&[0x02, 0, 0, 0x10, 0x55]).await.unwrap();
        assert_eq!(bus.handle().raw_byte(0x10), 0xFF);

        bus.transfer(&[0x06]).await.unwrap();
        bus.transfer(&[0x02, 0, 0, 0x10, 0x55]).await.unwrap();
        assert_eq!(bus.handle().raw_byte(0x10), 0x55);
    }

    #[tokio::test]
    async fn test_controller_flush_bit_self_clears() {
        let mut bus = SimControllerBus::new();
        bus.transfer(&[0x02, regs::GLOBAL_CONTROL_0, 1 << regs::FLUSH_DYN_MAC_BIT])
            .await
            .unwrap();

        let first = bus.transfer(&[0x03, regs::GLOBAL_CONTROL_0, 0]).await.unwrap();
        assert_eq!(first[2] & (1 << regs::FLUSH_DYN_MAC_BIT), 1 << regs::FLUSH_DYN_MAC_BIT);

        let second = bus.transfer(&[0x03, regs::GLOBAL_CONTROL_0, 0]).await.unwrap();
        assert_eq!(second[2] & (1 << regs::FLUSH_DYN_MAC_BIT), 0);
    }

    #[tokio::test]
    async fn test_indirect_vlan_window_round_trip() {
        let mut bus = SimControllerBus::new();
        let handle = bus.handle();
        handle.set_vlan_group(5, [1, 2, 3, 4, 5, 6, 7]);

        // Read group 5 into the window.
        bus.transfer(&[0x02, regs::INDIRECT_ACCESS_CONTROL_0, (regs::TABLE_VLAN << 2) | 0x10])
            .await
            .unwrap();
        bus.transfer(&[0x02, regs::INDIRECT_ACCESS_CONTROL_1, 5]).await.unwrap();
        assert_eq!(handle.reg(regs::INDIRECT_DATA_6), 1);
        assert_eq!(handle.reg(regs::INDIRECT_DATA_0), 7);

        // Modify the window and write it back.
        bus.transfer(&[0x02, regs::INDIRECT_DATA_0, 0x77]).await.unwrap();
        bus.transfer(&[0x02, regs::INDIRECT_ACCESS_CONTROL_0, regs::TABLE_VLAN << 2])
            .await
            .unwrap();
        bus.transfer(&[0x02, regs::INDIRECT_ACCESS_CONTROL_1, 5]).await.unwrap();
        assert_eq!(handle.vlan_group(5), [1, 2, 3, 4, 5, 6, 0x77]);
    }
}
