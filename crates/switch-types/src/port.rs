//! Logical front-panel ports and their hardware register mapping.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A logical port of the switch layer.
///
/// The board routes the front-panel jacks in reverse order of the
/// controller's PHYs, so logical `f0` is controlled through the register
/// block of hardware port 4 and logical `f3` through hardware port 1. The
/// fifth PHY is the board-to-board expansion (uplink) port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortId {
    F0,
    F1,
    F2,
    F3,
    Expansion,
}

impl PortId {
    /// The four user-facing ports in CLI order.
    pub const USER_PORTS: [PortId; 4] = [PortId::F0, PortId::F1, PortId::F2, PortId::F3];

    /// All ports in the order the port monitor services interrupt bits:
    /// expansion first, then the user ports.
    pub const SCAN_ORDER: [PortId; 5] = [
        PortId::Expansion,
        PortId::F0,
        PortId::F1,
        PortId::F2,
        PortId::F3,
    ];

    /// Base register address of this port's block inside the controller.
    pub const fn hw_base(&self) -> u8 {
        match self {
            PortId::F0 => 0x40,
            PortId::F1 => 0x30,
            PortId::F2 => 0x20,
            PortId::F3 => 0x10,
            PortId::Expansion => 0x50,
        }
    }

    /// Hardware port number (1-5) as the controller documents it.
    pub const fn hw_number(&self) -> u8 {
        self.hw_base() >> 4
    }

    /// Resolves a port from its hardware register base.
    pub const fn from_hw_base(base: u8) -> Option<PortId> {
        match base {
            0x40 => Some(PortId::F0),
            0x30 => Some(PortId::F1),
            0x20 => Some(PortId::F2),
            0x10 => Some(PortId::F3),
            0x50 => Some(PortId::Expansion),
            _ => None,
        }
    }

    /// Bit of this port in the interrupt-status register 0x7C.
    pub const fn interrupt_bit(&self) -> u8 {
        1 << (self.hw_number() - 1)
    }

    /// Bit index of this port in a five-bit VLAN membership mask.
    pub const fn membership_bit(&self) -> u8 {
        self.hw_number() - 1
    }

    /// Register holding this port's status-1 byte (link state in bit 5).
    pub const fn status1_reg(&self) -> u8 {
        self.hw_base() + crate::regs::PORT_STATUS1_OFFSET
    }

    /// Register at `offset` within this port's control block.
    pub const fn reg(&self, offset: u8) -> u8 {
        self.hw_base() + offset
    }

    /// Returns true for one of the four user-facing ports.
    pub const fn is_user_port(&self) -> bool {
        !matches!(self, PortId::Expansion)
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PortId::F0 => "f0",
            PortId::F1 => "f1",
            PortId::F2 => "f2",
            PortId::F3 => "f3",
            PortId::Expansion => "exp-port",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for PortId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "f0" => Ok(PortId::F0),
            "f1" => Ok(PortId::F1),
            "f2" => Ok(PortId::F2),
            "f3" => Ok(PortId::F3),
            "exp-port" => Ok(PortId::Expansion),
            other => Err(ParseError::InvalidPort(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inverted_hardware_mapping() {
        assert_eq!(PortId::F0.hw_base(), 0x40);
        assert_eq!(PortId::F1.hw_base(), 0x30);
        assert_eq!(PortId::F2.hw_base(), 0x20);
        assert_eq!(PortId::F3.hw_base(), 0x10);
        assert_eq!(PortId::Expansion.hw_base(), 0x50);
    }

    #[test]
    fn test_interrupt_bits() {
        assert_eq!(PortId::Expansion.interrupt_bit(), 0x10);
        assert_eq!(PortId::F0.interrupt_bit(), 0x08);
        assert_eq!(PortId::F3.interrupt_bit(), 0x01);
    }

    #[test]
    fn test_status1_registers() {
        assert_eq!(PortId::Expansion.status1_reg(), 0x5E);
        assert_eq!(PortId::F0.status1_reg(), 0x4E);
        assert_eq!(PortId::F3.status1_reg(), 0x1E);
    }

    #[test]
    fn test_membership_bits() {
        assert_eq!(PortId::F3.membership_bit(), 0);
        assert_eq!(PortId::F0.membership_bit(), 3);
        assert_eq!(PortId::Expansion.membership_bit(), 4);
    }

    #[test]
    fn test_round_trip_hw_base() {
        for port in PortId::SCAN_ORDER {
            assert_eq!(PortId::from_hw_base(port.hw_base()), Some(port));
        }
        assert_eq!(PortId::from_hw_base(0x60), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("f2".parse::<PortId>().unwrap(), PortId::F2);
        assert!("f9".parse::<PortId>().is_err());
    }
}
