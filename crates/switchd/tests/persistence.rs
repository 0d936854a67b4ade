//! Save/restore round trips over the simulated board.

mod common;

use common::{fixture, reboot, sign_in};
use switchd::cli::Interpreter;
use switchd::persist;
use switchd::users::{PendingAction, UserRecord};
use switchd::vlan_table::{self, VlanEntry};
use switch_types::{layout, regs, Role, SystemFlags, VlanId, VlanMembership};

#[tokio::test(start_paused = true)]
async fn eeprom_write_then_read_round_trips_through_the_cli() {
    let fx = fixture();
    sign_in(&fx.ctx, Role::Administrator).await;
    let interpreter = Interpreter::new(fx.ctx.clone());

    interpreter
        .execute_line("system eeprom write-reg 0x00000300 0x5A")
        .await;
    assert!(fx.capture.take().contains("Command Executed Successfully"));

    interpreter
        .execute_line("system eeprom read-reg 0x00000300")
        .await;
    let output = fx.capture.take();
    assert!(output.contains("Data Read @0x300: 0x5A"), "output: {output}");
}

#[tokio::test(start_paused = true)]
async fn save_then_restore_reproduces_the_device_image() {
    let fx = fixture();
    sign_in(&fx.ctx, Role::Administrator).await;

    // A recognizable controller image; register 0x05 non-zero also arms the
    // VLAN branch of the save path.
    for reg in 0..=0xFFu16 {
        fx.controller.set_reg(reg as u8, (reg as u8) ^ 0xA5);
    }

    // Two VLAN entries and one configured user.
    vlan_table::write_entry(
        fx.ctx.controller(),
        VlanId::new(100).unwrap(),
        VlanEntry { valid: true, membership: VlanMembership::new(0x0C) },
    )
    .await
    .unwrap();
    vlan_table::write_entry(
        fx.ctx.controller(),
        VlanId::new(101).unwrap(),
        VlanEntry { valid: true, membership: VlanMembership::new(0x11) },
    )
    .await
    .unwrap();
    fx.ctx
        .state
        .write()
        .await
        .users
        .add(UserRecord {
            username: "alice".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Ops".to_string(),
            password: "pw".to_string(),
            role: Role::ModifySystem,
            marked: false,
            pending: PendingAction::Add,
        })
        .unwrap();
    {
        let mut state = fx.ctx.state.write().await;
        state.log_flags = 0x0000_0310;
        state.next_log_slot = layout::LOG_BASE + 35;
    }

    persist::save_running_config(&fx.ctx).await.unwrap();

    let flags = SystemFlags::from_byte(fx.eeprom.raw_byte(layout::FLAGS_ADDR) ^ 0xFF);
    assert!(flags.config_saved());
    assert!(flags.vlan_saved());
    assert!(flags.users_saved());

    // Boot a fresh board on the same EEPROM.
    let (ctx2, controller2) = reboot(&fx);
    persist::restore_on_boot(&ctx2).await.unwrap();

    for reg in 0..=0xFFu16 {
        // The indirect access plumbing is scratch space for the VLAN sweep
        // on both the save and restore sides.
        if (0x6E..=0x78).contains(&reg) {
            continue;
        }
        assert_eq!(
            controller2.reg(reg as u8),
            (reg as u8) ^ 0xA5,
            "register 0x{reg:02X} differs after restore"
        );
    }

    let entry = vlan_table::read_entry(ctx2.controller(), VlanId::new(100).unwrap())
        .await
        .unwrap();
    assert!(entry.valid);
    assert_eq!(entry.membership.bits(), 0x0C);
    let entry = vlan_table::read_entry(ctx2.controller(), VlanId::new(101).unwrap())
        .await
        .unwrap();
    assert!(entry.valid);
    assert_eq!(entry.membership.bits(), 0x11);
    let entry = vlan_table::read_entry(ctx2.controller(), VlanId::new(102).unwrap())
        .await
        .unwrap();
    assert!(!entry.valid);

    let state = ctx2.state.read().await;
    assert_eq!(state.users.slots()[0].username, "alice");
    assert_eq!(state.users.slots()[0].role, Role::ModifySystem);
    assert!(state.users.slots()[1].is_empty());
    assert_eq!(state.log_flags, 0x0000_0310);
    assert_eq!(state.next_log_slot, layout::LOG_BASE + 35);
}

#[tokio::test(start_paused = true)]
async fn boot_restore_programs_saved_registers_and_vlans() {
    let fx = fixture();

    // Hand-build a saved image: flag bits 6/5/4, one register, one VLAN.
    fx.ctx.eeprom().write(layout::FLAGS_ADDR, 0x70).await.unwrap();
    fx.ctx
        .eeprom()
        .write(layout::SWITCH_CONFIG_BASE + 0x01, 0x42)
        .await
        .unwrap();
    let mirror = VlanEntry { valid: true, membership: VlanMembership::new(0x08) };
    fx.ctx
        .eeprom()
        .write(layout::VLAN_TABLE_BASE + 99, mirror.to_mirror_byte())
        .await
        .unwrap();

    let (ctx2, controller2) = reboot(&fx);
    persist::restore_on_boot(&ctx2).await.unwrap();

    assert_eq!(controller2.reg(0x01), 0x42);
    let entry = vlan_table::read_entry(ctx2.controller(), VlanId::new(100).unwrap())
        .await
        .unwrap();
    assert!(entry.valid);
    assert_eq!(entry.membership.bits(), 0x08);
}

#[tokio::test(start_paused = true)]
async fn reinit_request_erases_the_device() {
    let fx = fixture();
    fx.ctx.eeprom().write(0x3000, 0x77).await.unwrap();
    fx.ctx.eeprom().write(layout::FLAGS_ADDR, 0x80).await.unwrap();

    let (ctx2, _controller2) = reboot(&fx);
    persist::restore_on_boot(&ctx2).await.unwrap();

    assert_eq!(ctx2.eeprom().read(0x3000).await.unwrap(), 0x00);
    assert_eq!(ctx2.eeprom().read(layout::FLAGS_ADDR).await.unwrap(), 0x00);
}

#[tokio::test(start_paused = true)]
async fn vlan_branch_skipped_when_global_control_3_reads_zero() {
    let fx = fixture();
    sign_in(&fx.ctx, Role::Administrator).await;

    // Leave every register zero: global control 3 reads zero, so the save
    // must clear the VLAN-saved flag even though an entry exists.
    vlan_table::write_entry(
        fx.ctx.controller(),
        VlanId::new(7).unwrap(),
        VlanEntry { valid: true, membership: VlanMembership::new(0x01) },
    )
    .await
    .unwrap();
    // The indirect cycle left state in the access registers; zero them so
    // the register sweep reads a fully zeroed image.
    fx.controller.set_reg(regs::INDIRECT_ACCESS_CONTROL_0, 0);
    fx.controller.set_reg(regs::INDIRECT_ACCESS_CONTROL_1, 0);
    for window in 0..7u8 {
        fx.controller.set_reg(regs::INDIRECT_DATA_6 + window, 0);
    }

    persist::save_running_config(&fx.ctx).await.unwrap();
    let flags = SystemFlags::from_byte(fx.eeprom.raw_byte(layout::FLAGS_ADDR) ^ 0xFF);
    assert!(flags.config_saved());
    assert!(!flags.vlan_saved());
}
