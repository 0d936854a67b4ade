//! EEPROM memory map.
//!
//! All multi-byte integers in these regions are stored big-endian; every data
//! byte on the device is inverted by the HAL.

/// Total capacity of the serial EEPROM in bytes (17-bit address space).
pub const EEPROM_SIZE: u32 = 131_072;

/// Size of one erasable EEPROM page in bytes.
pub const PAGE_SIZE: u32 = 256;

/// System flags byte (see `SystemFlags`).
pub const FLAGS_ADDR: u32 = 0x1E;

/// 32-bit log-status-flags word, big-endian.
pub const LOG_FLAGS_ADDR: u32 = 0x1F;

/// 32-bit next-log-slot pointer, big-endian.
pub const NEXT_LOG_SLOT_ADDR: u32 = 0x23;

/// Mirror of the controller's 256 registers (0x100 + reg).
pub const SWITCH_CONFIG_BASE: u32 = 0x100;

/// One byte per VLAN ID, 4095 records (0x200 + (vlan_id - 1)).
pub const VLAN_TABLE_BASE: u32 = 0x200;

/// Number of VLAN records in the VLAN region.
pub const VLAN_TABLE_ENTRIES: u32 = 4095;

/// Number of 256-byte pages spanned by the VLAN region.
pub const VLAN_TABLE_PAGES: u32 = 16;

/// User table: 15 slots of 65 bytes each.
pub const USERS_BASE: u32 = 0x1200;

/// Byte stride of one user slot (four 16-byte fields plus the role byte).
pub const USER_SLOT_LEN: u32 = 65;

/// Length of each text field inside a user slot.
pub const USER_FIELD_LEN: usize = 16;

/// Circular event log region.
pub const LOG_BASE: u32 = 0x1600;

/// Maximum number of resident log records.
pub const LOG_ENTRIES: u32 = 400;

/// On-disk size of one log record (32-bit tick plus the code byte).
pub const LOG_RECORD_LEN: u32 = 5;

/// First byte past the log region; the next-log-slot pointer wraps here.
pub const LOG_END: u32 = LOG_BASE + LOG_ENTRIES * LOG_RECORD_LEN;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regions_do_not_overlap() {
        assert!(NEXT_LOG_SLOT_ADDR + 4 <= SWITCH_CONFIG_BASE);
        assert!(SWITCH_CONFIG_BASE + 256 <= VLAN_TABLE_BASE);
        assert!(VLAN_TABLE_BASE + VLAN_TABLE_ENTRIES <= USERS_BASE);
        assert!(USERS_BASE + 15 * USER_SLOT_LEN <= LOG_BASE);
        assert!(LOG_END <= EEPROM_SIZE);
    }

    #[test]
    fn test_vlan_region_page_count() {
        assert!(VLAN_TABLE_ENTRIES <= VLAN_TABLE_PAGES * PAGE_SIZE);
    }
}
