//! CLI permission levels.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Permission level of a switch user.
///
/// Levels form a total order; a command is authorized when the active user's
/// role is at least the command's required role.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// May inspect status and tables only.
    #[default]
    ReadOnly = 0,
    /// May change per-port settings.
    ModifyPorts = 1,
    /// May change port and system settings.
    ModifySystem = 2,
    /// Full administrative rights, including user management.
    Administrator = 3,
}

impl Role {
    /// Decodes the role byte persisted in a user slot.
    pub const fn from_u8(value: u8) -> Result<Self, ParseError> {
        match value {
            0 => Ok(Role::ReadOnly),
            1 => Ok(Role::ModifyPorts),
            2 => Ok(Role::ModifySystem),
            3 => Ok(Role::Administrator),
            other => Err(ParseError::InvalidRole(other)),
        }
    }

    /// Role byte as persisted in a user slot.
    pub const fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Returns true if this role may run a command requiring `required`.
    pub fn authorizes(&self, required: Role) -> bool {
        *self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::ReadOnly => "Read Only",
            Role::ModifyPorts => "Modify Ports",
            Role::ModifySystem => "Modify System",
            Role::Administrator => "Administrator",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_order() {
        assert!(Role::ReadOnly < Role::ModifyPorts);
        assert!(Role::ModifyPorts < Role::ModifySystem);
        assert!(Role::ModifySystem < Role::Administrator);
    }

    #[test]
    fn test_authorizes() {
        assert!(Role::Administrator.authorizes(Role::ReadOnly));
        assert!(Role::ModifyPorts.authorizes(Role::ModifyPorts));
        assert!(!Role::ReadOnly.authorizes(Role::ModifyPorts));
    }

    #[test]
    fn test_byte_round_trip() {
        for value in 0..4 {
            assert_eq!(Role::from_u8(value).unwrap().as_u8(), value);
        }
        assert!(Role::from_u8(4).is_err());
    }
}
