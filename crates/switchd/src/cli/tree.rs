//! The static command tree.
//!
//! Menus live in an arena and reference each other by index, so shared
//! sub-menus (the enable/disable pairs) appear once and the whole structure
//! stays an acyclic value with no pointer cycles. A node either descends
//! into a child menu or runs a typed handler; nodes whose text is a
//! `<placeholder>` accept any token and forward it as a parameter.

use crate::handlers::HandlerKind;
use once_cell::sync::Lazy;
use switch_types::Role;

/// Maximum menu depth the walker will descend.
pub const MAX_DEPTH: usize = 12;

/// Maximum number of tokens accepted on one line.
pub const MAX_TOKENS: usize = 127;

/// Capacity of a handler's accumulated parameter buffer.
pub const PARAM_CAPACITY: usize = 20;

/// Index of a menu inside the arena.
pub type MenuId = usize;

/// What a matched node does.
#[derive(Debug, Clone, Copy)]
pub enum NodeAction {
    /// Descend into the menu at this index.
    Menu(MenuId),
    /// Terminal: run this handler with the accumulated parameters.
    Run(HandlerKind),
}

/// One entry of a menu.
#[derive(Debug, Clone)]
pub struct CommandNode {
    /// Token that selects this entry, or a `<placeholder>` description.
    pub text: &'static str,
    /// Help line shown for `?`.
    pub help: &'static str,
    pub action: NodeAction,
    /// Static parameters collected when this entry matches.
    pub params: &'static [&'static str],
    /// When set, any token matches and is collected as a parameter.
    pub user_param: bool,
    /// Minimum role required to execute (terminal nodes) or flagged in help.
    pub permission: Role,
}

impl CommandNode {
    const fn menu(text: &'static str, help: &'static str, id: MenuId, permission: Role) -> Self {
        CommandNode {
            text,
            help,
            action: NodeAction::Menu(id),
            params: &[],
            user_param: false,
            permission,
        }
    }

    const fn menu_with(
        text: &'static str,
        help: &'static str,
        id: MenuId,
        params: &'static [&'static str],
        permission: Role,
    ) -> Self {
        CommandNode {
            text,
            help,
            action: NodeAction::Menu(id),
            params,
            user_param: false,
            permission,
        }
    }

    const fn run(
        text: &'static str,
        help: &'static str,
        handler: HandlerKind,
        params: &'static [&'static str],
        permission: Role,
    ) -> Self {
        CommandNode {
            text,
            help,
            action: NodeAction::Run(handler),
            params,
            user_param: false,
            permission,
        }
    }

    const fn user(
        text: &'static str,
        help: &'static str,
        handler: HandlerKind,
        permission: Role,
    ) -> Self {
        CommandNode {
            text,
            help,
            action: NodeAction::Run(handler),
            params: &[],
            user_param: true,
            permission,
        }
    }

    const fn user_menu(
        text: &'static str,
        help: &'static str,
        id: MenuId,
        permission: Role,
    ) -> Self {
        CommandNode {
            text,
            help,
            action: NodeAction::Menu(id),
            params: &[],
            user_param: true,
            permission,
        }
    }
}

/// The arena of menus.
pub struct CommandTree {
    menus: Vec<Vec<CommandNode>>,
    root: MenuId,
}

impl CommandTree {
    /// The top-level menu.
    pub fn root(&self) -> MenuId {
        self.root
    }

    /// The entries of one menu.
    pub fn menu(&self, id: MenuId) -> &[CommandNode] {
        &self.menus[id]
    }

    /// Checks structural invariants: every menu reference stays inside the
    /// arena and no static parameter list exceeds the buffer capacity.
    pub fn validate(&self) -> Result<(), String> {
        for (id, menu) in self.menus.iter().enumerate() {
            if menu.is_empty() {
                return Err(format!("menu {id} is empty"));
            }
            for node in menu {
                if node.params.len() > PARAM_CAPACITY {
                    return Err(format!("node '{}' exceeds parameter capacity", node.text));
                }
                if let NodeAction::Menu(child) = node.action {
                    if child >= self.menus.len() {
                        return Err(format!("node '{}' references missing menu {child}", node.text));
                    }
                }
            }
        }
        Ok(())
    }

    fn add(&mut self, menu: Vec<CommandNode>) -> MenuId {
        self.menus.push(menu);
        self.menus.len() - 1
    }
}

/// The daemon's command tree, built once.
pub static COMMAND_TREE: Lazy<CommandTree> = Lazy::new(build);

fn build() -> CommandTree {
    use HandlerKind::*;
    use Role::*;

    let mut tree = CommandTree {
        menus: Vec::new(),
        root: 0,
    };

    // Shared enable/disable pairs. The inverted pair drives options whose
    // hardware bit is active-low.
    let enable_disable = tree.add(vec![
        CommandNode::run("enable", "enable this option", SetBit, &["Enabling Feature..."], ModifyPorts),
        CommandNode::run("disable", "disable this option", ClearBit, &["Disabling Feature..."], ModifyPorts),
    ]);
    let inv_enable_disable = tree.add(vec![
        CommandNode::run("enable", "enable this option", ClearBit, &["Enabling Feature..."], ModifyPorts),
        CommandNode::run("disable", "disable this option", SetBit, &["Disabling Feature..."], ModifyPorts),
    ]);
    let led_options = tree.add(vec![
        CommandNode::run("mode-0", "set port LEDs to use mode 0", ClearBit, &["Setting LEDs To Mode 0"], ModifyPorts),
        CommandNode::run("mode-1", "set port LEDs to use mode 1", SetBit, &["Setting LEDs To Mode 1"], ModifyPorts),
    ]);

    // EEPROM register access.
    let write_eeprom_data = tree.add(vec![CommandNode::user(
        "<data [0x00 - 0xFF]>",
        "value to store at the selected address",
        WriteEeprom,
        ModifySystem,
    )]);
    let write_eeprom_addr = tree.add(vec![CommandNode::user_menu(
        "<register-addr [0x00000000 - 0x0001FFFF]>",
        "address on the EEPROM to write",
        write_eeprom_data,
        ModifySystem,
    )]);
    let read_eeprom_addr = tree.add(vec![CommandNode::user(
        "<register-addr [0x00000000 - 0x0001FFFF]>",
        "address on the EEPROM to read",
        ReadEeprom,
        ReadOnly,
    )]);
    let eeprom_options = tree.add(vec![
        CommandNode::menu("read-reg", "read a register from the EEPROM", read_eeprom_addr, ReadOnly),
        CommandNode::menu("write-reg", "write to a register on the EEPROM", write_eeprom_addr, ModifySystem),
        CommandNode::run(
            "reinitialize",
            "reset the EEPROM to factory settings [RESTART REQUIRED]",
            ReinitializeEeprom,
            &[],
            ModifySystem,
        ),
    ]);

    // Controller register access.
    let write_ctrl_data = tree.add(vec![CommandNode::user(
        "<data [0x00 - 0xFF]>",
        "value to store in the selected register",
        WriteController,
        ModifySystem,
    )]);
    let write_ctrl_addr = tree.add(vec![CommandNode::user_menu(
        "<register-addr [0x00 - 0xFF]>",
        "register on the controller to write",
        write_ctrl_data,
        ModifySystem,
    )]);
    let read_ctrl_addr = tree.add(vec![CommandNode::user(
        "<register-addr [0x00 - 0xFF]>",
        "register on the controller to read",
        ReadController,
        ReadOnly,
    )]);
    let controller_options = tree.add(vec![
        CommandNode::menu("read-reg", "read a setting from a register on the controller", read_ctrl_addr, ReadOnly),
        CommandNode::menu("write-reg", "write to a register on the controller", write_ctrl_addr, ModifySystem),
    ]);

    // Tables and the I2C loopback.
    let table_options = tree.add(vec![
        CommandNode::run("vlan-table", "shows the current VLAN table", ShowVlanTable, &[], ReadOnly),
        CommandNode::run("static-mac-table", "shows the static MAC table", ShowStaticMacTable, &[], ReadOnly),
        CommandNode::run("dyn-mac-table", "shows the dynamic MAC table", ShowDynMacTable, &[], ReadOnly),
    ]);
    let i2c_command_code = tree.add(vec![CommandNode::user(
        "<i2c-command [0x00 - 0xFF]>",
        "command to issue to loopback interface",
        I2cSend,
        ModifySystem,
    )]);
    let i2c_options = tree.add(vec![CommandNode::menu(
        "send-command",
        "send an I2C command over loopback",
        i2c_command_code,
        ModifySystem,
    )]);

    let system_commands = tree.add(vec![
        CommandNode::menu("eeprom", "change settings for the EEPROM", eeprom_options, ModifySystem),
        CommandNode::menu("i2c", "control other layers with I2C", i2c_options, ModifySystem),
        CommandNode::run("status", "show global system information", ShowRunningConfig, &[], ReadOnly),
        CommandNode::menu_with(
            "rapid-link-aging",
            "enable/disable fast device aging after link change",
            enable_disable,
            &["0x02", "0x0", "0x00"],
            ModifySystem,
        ),
        CommandNode::menu_with(
            "large-packets",
            "allow 2KB packets",
            enable_disable,
            &["0x03", "0x0", "0x06"],
            ModifySystem,
        ),
        CommandNode::menu_with(
            "power-saving",
            "enable/disable power saving on all PHYs",
            inv_enable_disable,
            &["0x0B", "0x0", "0x03"],
            ModifySystem,
        ),
        CommandNode::menu_with(
            "led-mode",
            "set LED mode 0 or mode 1",
            led_options,
            &["0x0B", "0x0", "0x01"],
            ModifySystem,
        ),
        CommandNode::menu("show", "access VLAN and MAC tables", table_options, ReadOnly),
        CommandNode::run("reset", "performs a soft reset of the system", Reset, &[], ModifySystem),
    ]);

    // Per-port options.
    let vlan_id_entry = tree.add(vec![CommandNode::user(
        "<vlan-id [1-4095]>",
        "add this VLAN to the table",
        SetVlanEntry,
        ModifyPorts,
    )]);
    let vlan_settings = tree.add(vec![
        CommandNode::run("enable", "globally enables the use of VLAN filtering", EnableVlans, &[], ModifyPorts),
        CommandNode::run("disable", "globally disables the use of VLAN filtering", DisableVlans, &[], ModifyPorts),
        CommandNode::menu("add", "add an entry to the VLAN table", vlan_id_entry, ModifyPorts),
        CommandNode::user("<vlan-id [1-4095]>", "set the VLAN for this port", SetPortVlan, ModifyPorts),
    ]);
    let duplex_settings = tree.add(vec![
        CommandNode::run(
            "half-duplex",
            "set this port to use flow control when managing packets",
            ClearBit,
            &["0xC", "0x05", "Setting port to HALF-DUPLEX..."],
            ModifyPorts,
        ),
        CommandNode::run(
            "full-duplex",
            "set this port to operate bi-directionally",
            SetBit,
            &["0xC", "0x05", "Setting port to FULL-DUPLEX..."],
            ModifyPorts,
        ),
        CommandNode::run(
            "100BT",
            "set this port to operate at 100BaseT",
            SetBit,
            &["0xC", "0x06", "Setting port to 100 Mbps..."],
            ModifyPorts,
        ),
        CommandNode::run(
            "10BT",
            "set this port to operate at 10BaseT",
            ClearBit,
            &["0xC", "0x06", "Setting port to 10 Mbps..."],
            ModifyPorts,
        ),
    ]);
    let sniffing_settings = tree.add(vec![
        CommandNode::run(
            "disable",
            "return this port to normal operation",
            ClearBit,
            &["0x1", "0x07", "Returning port to normal operational mode..."],
            ModifyPorts,
        ),
        CommandNode::run(
            "designate",
            "sets this port as the sniffer port",
            SetBit,
            &["0x1", "0x07", "Setting port as sniffer..."],
            ModifyPorts,
        ),
        CommandNode::menu_with("sniff-tx", "copy all TX packets to sniffer port", enable_disable, &["0x1", "0x05"], ModifyPorts),
        CommandNode::menu_with("sniff-rx", "copy all RX packets to sniffer port", enable_disable, &["0x1", "0x06"], ModifyPorts),
    ]);
    let port_options = tree.add(vec![
        CommandNode::run(
            "enable",
            "turn this port on",
            ClearBit,
            &["0xD", "0x03", "Enabling Selected Port..."],
            ModifyPorts,
        ),
        CommandNode::run(
            "disable",
            "turn this port off",
            SetBit,
            &["0xD", "0x03", "Disabling Selected Port..."],
            ModifyPorts,
        ),
        CommandNode::menu("vlan", "assign a vlan to this port", vlan_settings, ModifyPorts),
        CommandNode::menu("speed", "modify the rate at which this port operates", duplex_settings, ModifyPorts),
        CommandNode::run("status", "information regarding the current state of this port", ShowPortStatus, &[], ReadOnly),
        CommandNode::menu_with("broadcast-storm", "enable/disable broadcast storm protection", enable_disable, &["0x0", "0x07"], ModifyPorts),
        CommandNode::menu("sniff-state", "sniffing settings for this port", sniffing_settings, ModifyPorts),
        CommandNode::menu_with("toggle-tx", "enable/disable packet transmission", enable_disable, &["0x2", "0x02"], ModifyPorts),
        CommandNode::menu_with("toggle-rx", "enable/disable packet reception", enable_disable, &["0x2", "0x01"], ModifyPorts),
        CommandNode::run("run-diag", "run cable diagnostics", RunDiagnostics, &[], ReadOnly),
        CommandNode::menu_with("auto-neg", "enable/disable auto-negotiation", inv_enable_disable, &["0xC", "0x07"], ModifyPorts),
        CommandNode::run(
            "restart-auto-neg",
            "restart auto-negotiation",
            SetSelfClearingBit,
            &["0xD", "0x05", "Restarting Auto-MDI/MDIX"],
            ModifyPorts,
        ),
        CommandNode::menu_with("auto-mdix", "enable/disable auto MDI/MDI-X", inv_enable_disable, &["0xD", "0x02"], ModifyPorts),
        CommandNode::menu_with("force-mdi", "manually enable/disable MDI mode", enable_disable, &["0xD", "0x01"], ModifyPorts),
    ]);
    let port_commands = tree.add(vec![
        CommandNode::menu_with("f0", "settings for fast-ethernet0", port_options, &["0x40"], ReadOnly),
        CommandNode::menu_with("f1", "settings for fast-ethernet1", port_options, &["0x30"], ReadOnly),
        CommandNode::menu_with("f2", "settings for fast-ethernet2", port_options, &["0x20"], ReadOnly),
        CommandNode::menu_with("f3", "settings for fast-ethernet3", port_options, &["0x10"], ReadOnly),
    ]);

    // Administration.
    let event_options = tree.add(vec![
        CommandNode::run("status", "list currently enabled/disabled events", EventStatus, &[], ReadOnly),
        CommandNode::run("manage", "choose the events to log", ManageEvents, &[], Administrator),
        CommandNode::run("list", "show all logged events", ListEvents, &[], Administrator),
        CommandNode::run("clear", "clear all logged events", ClearEvents, &[], Administrator),
    ]);
    let user_options = tree.add(vec![
        CommandNode::run("list", "list all users allowed to access this switch", ListUsers, &[], ReadOnly),
        CommandNode::run("add", "add a user", AddUser, &[], Administrator),
        CommandNode::run("delete", "delete a user", DeleteUsersMenu, &[], Administrator),
    ]);
    let admin_commands = tree.add(vec![
        CommandNode::menu("users", "manage the users allowed to administrate this switch", user_options, ReadOnly),
        CommandNode::menu("events", "manage the events logged to EEPROM", event_options, ReadOnly),
    ]);

    // Configuration persistence.
    let config_commands = tree.add(vec![
        CommandNode::run("save", "move the current configuration to the EEPROM", SaveConfig, &[], ModifyPorts),
        CommandNode::run("delete", "remove the current configuration from the EEPROM", DeleteConfig, &[], ModifySystem),
    ]);

    tree.root = tree.add(vec![
        CommandNode::menu("admin", "commands for changing the settings of the switch layer", admin_commands, ReadOnly),
        CommandNode::menu("port", "modify a port on the switch board", port_commands, ReadOnly),
        CommandNode::menu("controller", "modify a setting on the ethernet controller", controller_options, ReadOnly),
        CommandNode::menu("system", "advanced settings for changing the operation of this device", system_commands, ReadOnly),
        CommandNode::menu("config", "save or delete this switch's running configuration", config_commands, ModifyPorts),
        CommandNode::run("logout", "exit this session. Does not automatically save configuration.", Logout, &[], ReadOnly),
    ]);

    tree
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_is_closed() {
        COMMAND_TREE.validate().unwrap();
    }

    #[test]
    fn test_root_entries() {
        let root: Vec<&str> = COMMAND_TREE
            .menu(COMMAND_TREE.root())
            .iter()
            .map(|node| node.text)
            .collect();
        assert_eq!(
            root,
            vec!["admin", "port", "controller", "system", "config", "logout"]
        );
    }

    #[test]
    fn test_port_bases_are_inverted() {
        let root = COMMAND_TREE.menu(COMMAND_TREE.root());
        let port = root.iter().find(|node| node.text == "port").unwrap();
        let NodeAction::Menu(id) = port.action else {
            panic!("port must be a menu");
        };
        let bases: Vec<&str> = COMMAND_TREE
            .menu(id)
            .iter()
            .map(|node| node.params[0])
            .collect();
        assert_eq!(bases, vec!["0x40", "0x30", "0x20", "0x10"]);
    }

    #[test]
    fn test_depth_within_bound() {
        fn depth_of(tree: &CommandTree, menu: MenuId, seen: usize) -> usize {
            assert!(seen <= MAX_DEPTH, "menu nesting exceeds walker depth");
            tree.menu(menu)
                .iter()
                .map(|node| match node.action {
                    NodeAction::Menu(child) => depth_of(tree, child, seen + 1),
                    NodeAction::Run(_) => seen,
                })
                .max()
                .unwrap_or(seen)
        }
        assert!(depth_of(&COMMAND_TREE, COMMAND_TREE.root(), 1) <= MAX_DEPTH);
    }

    #[test]
    fn test_terminal_nodes_have_real_handlers() {
        fn check(tree: &CommandTree, menu: MenuId) {
            for node in tree.menu(menu) {
                match node.action {
                    NodeAction::Menu(child) => check(tree, child),
                    NodeAction::Run(handler) => {
                        assert_ne!(
                            handler,
                            crate::handlers::HandlerKind::NotImplemented,
                            "terminal node '{}' is a stub",
                            node.text
                        );
                    }
                }
            }
        }
        check(&COMMAND_TREE, COMMAND_TREE.root());
    }
}
