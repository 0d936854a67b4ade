//! VLAN ID and membership types.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// IEEE 802.1Q VLAN identifier as held by the switch controller (1-4095).
///
/// The controller's indirect VLAN table carries 4095 usable entries; entry 0
/// is not addressable through the CLI.
///
/// # Examples
///
/// ```
/// use switch_types::VlanId;
///
/// let vlan = VlanId::new(100).unwrap();
/// assert_eq!(vlan.as_u16(), 100);
///
/// assert!(VlanId::new(0).is_err());
/// assert!(VlanId::new(4096).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct VlanId(u16);

impl VlanId {
    /// Minimum valid VLAN ID.
    pub const MIN: u16 = 1;

    /// Maximum valid VLAN ID.
    pub const MAX: u16 = 4095;

    /// Creates a new VLAN ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the VLAN ID is not in the valid range (1-4095).
    pub const fn new(id: u16) -> Result<Self, ParseError> {
        if id >= Self::MIN && id <= Self::MAX {
            Ok(VlanId(id))
        } else {
            Err(ParseError::InvalidVlanId(id as u32))
        }
    }

    /// Returns the VLAN ID as a u16.
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Index of the four-entry group holding this VLAN in the controller's
    /// indirect table.
    pub const fn group(&self) -> u16 {
        self.0 / 4
    }

    /// Position (0-3) of this VLAN within its indirect-table group.
    pub const fn position(&self) -> u8 {
        (self.0 % 4) as u8
    }

    /// Byte offset of this VLAN's record inside the EEPROM VLAN region.
    pub const fn eeprom_offset(&self) -> u32 {
        (self.0 - 1) as u32
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VlanId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u32 = parse_int(s).ok_or(ParseError::InvalidVlanId(0))?;
        if id > u16::MAX as u32 {
            return Err(ParseError::InvalidVlanId(id));
        }
        VlanId::new(id as u16)
    }
}

impl TryFrom<u16> for VlanId {
    type Error = ParseError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        VlanId::new(id)
    }
}

impl From<VlanId> for u16 {
    fn from(vlan: VlanId) -> u16 {
        vlan.0
    }
}

/// Parses a decimal or 0x-prefixed hexadecimal integer, the way every CLI
/// numeric argument is accepted.
pub fn parse_int(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

/// Five-bit port membership mask for a VLAN table entry.
///
/// Bit assignment follows the controller's port-VLAN membership field:
/// bit 0 = hardware port 1 .. bit 4 = hardware port 5 (the expansion port).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VlanMembership(u8);

impl VlanMembership {
    /// Creates a membership mask, keeping only the low five bits.
    pub const fn new(bits: u8) -> Self {
        VlanMembership(bits & 0x1F)
    }

    /// Returns the raw five-bit mask.
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Returns true if no port is a member.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Sets the membership bit at `index` (0-4).
    pub fn set(&mut self, index: u8) {
        self.0 = (self.0 | (1 << index)) & 0x1F;
    }

    /// Returns true if the membership bit at `index` is set.
    pub const fn contains(&self, index: u8) -> bool {
        (self.0 >> index) & 1 == 1
    }
}

impl From<u8> for VlanMembership {
    fn from(bits: u8) -> Self {
        VlanMembership::new(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_valid_vlan_ids() {
        assert!(VlanId::new(1).is_ok());
        assert!(VlanId::new(100).is_ok());
        assert!(VlanId::new(4095).is_ok());
    }

    #[test]
    fn test_invalid_vlan_ids() {
        assert!(VlanId::new(0).is_err());
        assert!(VlanId::new(4096).is_err());
        assert!(VlanId::new(65535).is_err());
    }

    #[test]
    fn test_group_and_position() {
        let vlan = VlanId::new(100).unwrap();
        assert_eq!(vlan.group(), 25);
        assert_eq!(vlan.position(), 0);

        let vlan = VlanId::new(7).unwrap();
        assert_eq!(vlan.group(), 1);
        assert_eq!(vlan.position(), 3);
    }

    #[test]
    fn test_eeprom_offset() {
        assert_eq!(VlanId::new(1).unwrap().eeprom_offset(), 0);
        assert_eq!(VlanId::new(4095).unwrap().eeprom_offset(), 4094);
    }

    #[test]
    fn test_parse_decimal_and_hex() {
        let vlan: VlanId = "100".parse().unwrap();
        assert_eq!(vlan.as_u16(), 100);

        let vlan: VlanId = "0x64".parse().unwrap();
        assert_eq!(vlan.as_u16(), 100);

        assert!("0".parse::<VlanId>().is_err());
        assert!("bogus".parse::<VlanId>().is_err());
        assert!("99999".parse::<VlanId>().is_err());
    }

    #[test]
    fn test_membership_mask() {
        let mut m = VlanMembership::default();
        assert!(m.is_empty());
        m.set(0);
        m.set(4);
        assert_eq!(m.bits(), 0x11);
        assert!(m.contains(4));
        assert!(!m.contains(2));

        // Out-of-range bits are discarded.
        assert_eq!(VlanMembership::new(0xFF).bits(), 0x1F);
    }
}
