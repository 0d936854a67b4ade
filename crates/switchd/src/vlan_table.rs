//! The controller's indirect VLAN table.
//!
//! The table is reached one four-entry group at a time through the indirect
//! access register pair and a seven-byte data window. Four 13-bit entries are
//! packed across the window; only the valid bit and the five membership bits
//! are of interest here, and a read-modify-write of one entry must leave its
//! three neighbors untouched.

use crate::devices::DynController;
use crate::SwitchdResult;
use switch_types::{regs, VlanId, VlanMembership};

/// Logical view of one VLAN table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VlanEntry {
    pub valid: bool,
    pub membership: VlanMembership,
}

impl VlanEntry {
    /// Encodes the entry as its one-byte EEPROM mirror record
    /// (bit 7 valid, bits 6-2 membership).
    pub fn to_mirror_byte(&self) -> u8 {
        ((self.valid as u8) << 7) | (self.membership.bits() << 2)
    }

    /// Decodes an EEPROM mirror record.
    pub fn from_mirror_byte(byte: u8) -> Self {
        VlanEntry {
            valid: byte & 0x80 != 0,
            membership: VlanMembership::new((byte & 0x7F) >> 2),
        }
    }
}

/// Extracts the entry at `position` (0-3) from a packed seven-byte group.
pub fn unpack(group: &[u8; 7], position: u8) -> VlanEntry {
    let (valid, bits) = match position {
        0 => (
            group[5] & 0x10 != 0,
            ((group[5] & 0x0F) << 1) | (group[6] >> 7),
        ),
        1 => (
            group[3] & 0x02 != 0,
            ((group[3] & 0x01) << 4) | (group[4] >> 4),
        ),
        2 => (group[2] & 0x40 != 0, (group[2] >> 1) & 0x1F),
        3 => (
            group[0] & 0x08 != 0,
            ((group[0] & 0x07) << 2) | (group[1] >> 6),
        ),
        _ => unreachable!("position is vlan_id % 4"),
    };
    VlanEntry {
        valid,
        membership: VlanMembership::new(bits),
    }
}

/// Writes `entry` into `position` of a packed group, leaving the other three
/// positions' bits untouched.
pub fn pack_into(group: &mut [u8; 7], position: u8, entry: VlanEntry) {
    let valid = entry.valid as u8;
    let bits = entry.membership.bits();
    match position {
        0 => {
            group[5] = (group[5] & !0x1F) | (valid << 4) | (bits >> 1);
            group[6] = (group[6] & !0x80) | ((bits & 0x01) << 7);
        }
        1 => {
            group[3] = (group[3] & !0x03) | (valid << 1) | (bits >> 4);
            group[4] = (group[4] & !0xF0) | ((bits & 0x0F) << 4);
        }
        2 => {
            group[2] = (group[2] & !0x7E) | (valid << 6) | (bits << 1);
        }
        3 => {
            group[0] = (group[0] & !0x0F) | (valid << 3) | (bits >> 2);
            group[1] = (group[1] & !0xC0) | ((bits & 0x03) << 6);
        }
        _ => unreachable!("position is vlan_id % 4"),
    }
}

/// Points the indirect access registers at `group` for a read and pulls the
/// seven-byte window.
pub async fn read_group(controller: &DynController, group: u16) -> SwitchdResult<[u8; 7]> {
    select_group(controller, group, true).await?;
    let mut window = [0u8; 7];
    controller
        .bulk_read(regs::INDIRECT_DATA_6, &mut window)
        .await?;
    Ok(window)
}

/// Pushes a seven-byte window into the data registers and commits it to
/// `group` with a write-direction cycle.
pub async fn write_group(
    controller: &DynController,
    group: u16,
    window: &[u8; 7],
) -> SwitchdResult<()> {
    for (offset, &byte) in window.iter().enumerate() {
        controller
            .write(regs::INDIRECT_DATA_6 + offset as u8, byte)
            .await?;
    }
    select_group(controller, group, false).await?;
    Ok(())
}

/// Reads the logical entry for one VLAN ID.
pub async fn read_entry(controller: &DynController, vlan: VlanId) -> SwitchdResult<VlanEntry> {
    let window = read_group(controller, vlan.group()).await?;
    Ok(unpack(&window, vlan.position()))
}

/// Read-modify-writes one VLAN ID's entry, preserving its group neighbors.
pub async fn write_entry(
    controller: &DynController,
    vlan: VlanId,
    entry: VlanEntry,
) -> SwitchdResult<()> {
    let mut window = read_group(controller, vlan.group()).await?;
    pack_into(&mut window, vlan.position(), entry);
    write_group(controller, vlan.group(), &window).await
}

/// Programs the indirect access register pair for the VLAN table.
///
/// The two high group bits are OR-ed into the control register; the address
/// register is overwritten with the low eight, replacing whatever it held.
async fn select_group(controller: &DynController, group: u16, read: bool) -> SwitchdResult<()> {
    let mut control = controller.read(regs::INDIRECT_ACCESS_CONTROL_0).await?;
    control &= !0x1F;
    control |= regs::TABLE_VLAN << regs::INDIRECT_TABLE_SELECT_SHIFT;
    if read {
        control |= 1 << regs::INDIRECT_READ_BIT;
    }
    control |= ((group >> 8) & 0xFF) as u8;
    controller
        .write(regs::INDIRECT_ACCESS_CONTROL_0, control)
        .await?;
    controller
        .write(regs::INDIRECT_ACCESS_CONTROL_1, (group & 0xFF) as u8)
        .await?;
    Ok(())
}
