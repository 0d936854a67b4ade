//! The switch user table and its EEPROM representation.

use crate::{SwitchdError, SwitchdResult};
use switch_types::{layout, Role};

/// Number of configurable user slots persisted to the EEPROM.
pub const MAX_USERS: usize = 15;

/// Index of the built-in root account, outside the persisted range.
pub const ROOT_SLOT: usize = 15;

/// What the next configuration save should do with a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingAction {
    #[default]
    None,
    Add,
    Update,
    Delete,
}

/// One user account.
#[derive(Debug, Clone, Default)]
pub struct UserRecord {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: Role,
    pub marked: bool,
    pub pending: PendingAction,
}

impl UserRecord {
    /// A slot with an empty username is unused.
    pub fn is_empty(&self) -> bool {
        self.username.is_empty()
    }

    fn root() -> Self {
        UserRecord {
            username: "root".to_string(),
            first_name: "DEFAULT".to_string(),
            last_name: "ADMIN".to_string(),
            password: "root".to_string(),
            role: Role::Administrator,
            marked: false,
            pending: PendingAction::None,
        }
    }
}

/// Fifteen configurable slots plus the built-in root account.
#[derive(Debug, Clone)]
pub struct UserTable {
    slots: Vec<UserRecord>,
}

impl Default for UserTable {
    fn default() -> Self {
        let mut slots = vec![UserRecord::default(); MAX_USERS];
        slots.push(UserRecord::root());
        UserTable { slots }
    }
}

impl UserTable {
    /// All slots, root last.
    pub fn slots(&self) -> &[UserRecord] {
        &self.slots
    }

    /// Mutable access to one slot.
    pub fn slot_mut(&mut self, index: usize) -> &mut UserRecord {
        &mut self.slots[index]
    }

    /// Finds the account matching a login attempt.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<&UserRecord> {
        self.slots
            .iter()
            .filter(|slot| !slot.is_empty())
            .find(|slot| slot.username == username && slot.password == password)
    }

    /// Returns true if a non-empty slot already owns `username`.
    pub fn username_taken(&self, username: &str) -> bool {
        self.slots
            .iter()
            .any(|slot| !slot.is_empty() && slot.username == username)
    }

    /// Places a new account in the first free configurable slot.
    pub fn add(&mut self, mut record: UserRecord) -> SwitchdResult<usize> {
        if self.username_taken(&record.username) {
            return Err(SwitchdError::user_table(format!(
                "user '{}' already exists",
                record.username
            )));
        }
        let index = self.slots[..MAX_USERS]
            .iter()
            .position(UserRecord::is_empty)
            .ok_or_else(|| SwitchdError::user_table("maximum user limit exceeded (15)"))?;
        record.pending = PendingAction::Add;
        self.slots[index] = record;
        Ok(index)
    }

    /// Applies pending actions: deleted slots are dropped, survivors are
    /// compacted to the front, and every pending marker is cleared. The root
    /// slot is never deleted.
    pub fn apply_pending(&mut self) {
        let mut survivors: Vec<UserRecord> = self.slots[..MAX_USERS]
            .iter()
            .filter(|slot| !slot.is_empty() && slot.pending != PendingAction::Delete)
            .cloned()
            .collect();
        for slot in &mut survivors {
            slot.pending = PendingAction::None;
            slot.marked = false;
        }
        survivors.resize(MAX_USERS, UserRecord::default());
        survivors.push(self.slots[ROOT_SLOT].clone());
        survivors[ROOT_SLOT].pending = PendingAction::None;
        survivors[ROOT_SLOT].marked = false;
        self.slots = survivors;
    }
}

/// Encodes a text field into its fixed 16-byte slot form, truncated and
/// zero-padded.
pub fn encode_field(text: &str) -> [u8; layout::USER_FIELD_LEN] {
    let mut field = [0u8; layout::USER_FIELD_LEN];
    for (slot, byte) in field.iter_mut().zip(text.bytes()) {
        *slot = byte;
    }
    field
}

/// Decodes a fixed field back into text, stopping at the first NUL.
pub fn decode_field(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Serializes one record into its 65-byte slot image
/// (username, password, first name, last name, role).
pub fn slot_bytes(record: &UserRecord) -> [u8; layout::USER_SLOT_LEN as usize] {
    let mut bytes = [0u8; layout::USER_SLOT_LEN as usize];
    bytes[0..16].copy_from_slice(&encode_field(&record.username));
    bytes[16..32].copy_from_slice(&encode_field(&record.password));
    bytes[32..48].copy_from_slice(&encode_field(&record.first_name));
    bytes[48..64].copy_from_slice(&encode_field(&record.last_name));
    bytes[64] = record.role.as_u8();
    bytes
}

/// Deserializes a 65-byte slot image. An unrecognized role byte falls back
/// to read-only.
pub fn record_from_bytes(bytes: &[u8]) -> UserRecord {
    UserRecord {
        username: decode_field(&bytes[0..16]),
        password: decode_field(&bytes[16..32]),
        first_name: decode_field(&bytes[32..48]),
        last_name: decode_field(&bytes[48..64]),
        role: Role::from_u8(bytes[64]).unwrap_or(Role::ReadOnly),
        marked: false,
        pending: PendingAction::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn user(name: &str) -> UserRecord {
        UserRecord {
            username: name.to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            password: "pw".to_string(),
            role: Role::ModifyPorts,
            ..UserRecord::default()
        }
    }

    #[test]
    fn test_root_slot_present() {
        let table = UserTable::default();
        assert_eq!(table.slots()[ROOT_SLOT].username, "root");
        assert!(table.authenticate("root", "root").is_some());
        assert!(table.authenticate("root", "wrong").is_none());
    }

    #[test]
    fn test_add_rejects_duplicate_and_overflow() {
        let mut table = UserTable::default();
        table.add(user("alice")).unwrap();
        assert!(table.add(user("alice")).is_err());
        assert!(table.add(user("root")).is_err());

        for i in 1..MAX_USERS {
            table.add(user(&format!("user{i}"))).unwrap();
        }
        assert!(table.add(user("overflow")).is_err());
    }

    #[test]
    fn test_apply_pending_compacts() {
        let mut table = UserTable::default();
        table.add(user("alice")).unwrap();
        table.add(user("bob")).unwrap();
        table.add(user("carol")).unwrap();
        table.slot_mut(1).pending = PendingAction::Delete;

        table.apply_pending();
        assert_eq!(table.slots()[0].username, "alice");
        assert_eq!(table.slots()[1].username, "carol");
        assert!(table.slots()[2].is_empty());
        assert_eq!(table.slots()[ROOT_SLOT].username, "root");
        assert_eq!(table.slots()[0].pending, PendingAction::None);
    }

    #[test]
    fn test_slot_round_trip() {
        let record = user("alice");
        let decoded = record_from_bytes(&slot_bytes(&record));
        assert_eq!(decoded.username, "alice");
        assert_eq!(decoded.password, "pw");
        assert_eq!(decoded.first_name, "Test");
        assert_eq!(decoded.last_name, "User");
        assert_eq!(decoded.role, Role::ModifyPorts);
    }

    #[test]
    fn test_field_truncation() {
        let field = encode_field("averyveryverylongusername");
        assert_eq!(decode_field(&field), "averyveryverylon");
    }
}
