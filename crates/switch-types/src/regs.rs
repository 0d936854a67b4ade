//! Switch controller register map.
//!
//! Register offsets within a port's control block are added to the port's
//! base address (`PortId::hw_base`); global registers are absolute.

/// Chip ID / start bit register. Writing 0x01 starts the switch.
pub const CHIP_ID1: u8 = 0x01;

/// Global control 0: bit 5 is the self-clearing dynamic-MAC flush.
pub const GLOBAL_CONTROL_0: u8 = 0x02;

/// Global control 1: large-packet and flow-control gates.
pub const GLOBAL_CONTROL_1: u8 = 0x03;

/// Global control 2.
pub const GLOBAL_CONTROL_2: u8 = 0x04;

/// Global control 3: bit 7 enables 802.1Q VLAN filtering.
pub const GLOBAL_CONTROL_3: u8 = 0x05;

/// Global control 9: LED mode and PHY power saving.
pub const GLOBAL_CONTROL_9: u8 = 0x0B;

/// Bit of `GLOBAL_CONTROL_0` that flushes the dynamic MAC table.
pub const FLUSH_DYN_MAC_BIT: u8 = 5;

/// Bit of `GLOBAL_CONTROL_3` that enables 802.1Q VLANs.
pub const VLAN_ENABLE_BIT: u8 = 7;

/// Per-port interrupt status, one bit per PHY (bit 4 = expansion port).
pub const INTERRUPT_STATUS: u8 = 0x7C;

// Per-port register offsets.

/// Port control 0: broadcast storm protection, tag insertion.
pub const PORT_CONTROL0_OFFSET: u8 = 0x0;
/// Port control 1: sniffer configuration and VLAN membership mask.
pub const PORT_CONTROL1_OFFSET: u8 = 0x1;
/// Port control 2: TX/RX gating and learning disable.
pub const PORT_CONTROL2_OFFSET: u8 = 0x2;
/// Port control 3: default VID bits 11-8.
pub const PORT_CONTROL3_OFFSET: u8 = 0x3;
/// Port control 4: default VID bits 7-0.
pub const PORT_CONTROL4_OFFSET: u8 = 0x4;
/// Port status 0.
pub const PORT_STATUS0_OFFSET: u8 = 0x9;
/// LinkMD result/control register.
pub const PORT_LINKMD0_OFFSET: u8 = 0xA;
/// LinkMD distance register.
pub const PORT_LINKMD1_OFFSET: u8 = 0xB;
/// Port control 5: auto-negotiation, forced speed and duplex.
pub const PORT_CONTROL5_OFFSET: u8 = 0xC;
/// Port control 6: port disable, auto-MDIX, restart-AN.
pub const PORT_CONTROL6_OFFSET: u8 = 0xD;
/// Port status 1: bit 5 is link-up.
pub const PORT_STATUS1_OFFSET: u8 = 0xE;
/// Port status 2.
pub const PORT_STATUS2_OFFSET: u8 = 0xF;

/// Bit of port control 2 that disables MAC address learning.
pub const LEARNING_DISABLE_BIT: u8 = 0;

/// Bit of port status 1 indicating link-up.
pub const LINK_UP_BIT: u8 = 5;

// Indirect table access.

/// Indirect access control 0: read/write bit, table select, address high.
pub const INDIRECT_ACCESS_CONTROL_0: u8 = 0x6E;
/// Indirect access control 1: address low byte.
pub const INDIRECT_ACCESS_CONTROL_1: u8 = 0x6F;

/// Bit position of the read/write select inside control 0.
pub const INDIRECT_READ_BIT: u8 = 0x04;
/// Bit position of the two-bit table select inside control 0.
pub const INDIRECT_TABLE_SELECT_SHIFT: u8 = 0x02;

/// Table select value for the static MAC table.
pub const TABLE_STATIC_MAC: u8 = 0;
/// Table select value for the VLAN table.
pub const TABLE_VLAN: u8 = 1;
/// Table select value for the dynamic MAC table.
pub const TABLE_DYN_MAC: u8 = 2;

/// Indirect data registers, numbered 8 (lowest address) down to 0.
pub const INDIRECT_DATA_8: u8 = 0x70;
pub const INDIRECT_DATA_7: u8 = 0x71;
pub const INDIRECT_DATA_6: u8 = 0x72;
pub const INDIRECT_DATA_5: u8 = 0x73;
pub const INDIRECT_DATA_4: u8 = 0x74;
pub const INDIRECT_DATA_3: u8 = 0x75;
pub const INDIRECT_DATA_2: u8 = 0x76;
pub const INDIRECT_DATA_1: u8 = 0x77;
pub const INDIRECT_DATA_0: u8 = 0x78;
