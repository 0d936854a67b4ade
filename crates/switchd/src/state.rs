//! Process-wide mutable state shared by the daemon's tasks.

use crate::config::DaemonConfig;
use crate::users::{UserRecord, UserTable};
use std::sync::Arc;
use switch_types::layout;
use tokio::sync::RwLock;

/// The daemon's shared mutable state.
///
/// The CLI interpreter is the only writer of the user table and the active
/// session; the logger task and the save handler are the only writers of the
/// log bookkeeping fields. Every access goes through the [`SharedState`]
/// lock, held only for the field copy, never across device I/O.
#[derive(Debug)]
pub struct SystemState {
    /// Hostname rendered in the CLI prompt.
    pub hostname: String,
    /// The user table, root slot last.
    pub users: UserTable,
    /// Account of the authenticated session, if any.
    pub active_user: Option<UserRecord>,
    /// Gate for the interpreter and the port monitor.
    pub authenticated: bool,
    /// Enable bits for the event-log record types.
    pub log_flags: u32,
    /// EEPROM address the next log record will occupy.
    pub next_log_slot: u32,
    /// Whether the attached terminal accepts VT100 sequences.
    pub console_mode: bool,
    /// Set once `system reset` has been issued and awaits confirmation.
    pub reset_armed: bool,
}

/// Handle to the daemon state shared across tasks.
pub type SharedState = Arc<RwLock<SystemState>>;

impl SystemState {
    /// Creates initial state from the daemon configuration.
    pub fn new(config: &DaemonConfig) -> Self {
        SystemState {
            hostname: config.hostname.clone(),
            users: UserTable::default(),
            active_user: None,
            authenticated: false,
            log_flags: 0,
            next_log_slot: layout::LOG_BASE,
            console_mode: config.console_mode,
            reset_armed: false,
        }
    }

    /// Creates the shared handle.
    pub fn shared(config: &DaemonConfig) -> SharedState {
        Arc::new(RwLock::new(SystemState::new(config)))
    }

    /// Role of the active session, read-only when nobody is signed in.
    pub fn active_role(&self) -> switch_types::Role {
        self.active_user
            .as_ref()
            .map(|user| user.role)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = SystemState::new(&DaemonConfig::default());
        assert!(!state.authenticated);
        assert_eq!(state.next_log_slot, layout::LOG_BASE);
        assert_eq!(state.active_role(), switch_types::Role::ReadOnly);
        assert_eq!(state.hostname, "EEE-Switch");
    }
}
