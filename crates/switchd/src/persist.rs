//! Configuration persistence: boot-time restore and `config save`.

use crate::devices::Ctx;
use crate::progress::{ProgressAction, ProgressBar};
use crate::users::{self, MAX_USERS};
use crate::vlan_table::{self, VlanEntry};
use crate::SwitchdResult;
use switch_types::{layout, regs, SystemFlags, VlanId};
use tracing::{info, instrument, warn};

/// Restores persisted configuration before the daemon's tasks start.
///
/// The flag byte drives four independent steps: a requested chip erase, the
/// controller register image, the VLAN table, and the user table. Console
/// echo stays suppressed for the whole pass.
#[instrument(skip(ctx))]
pub async fn restore_on_boot(ctx: &Ctx) -> SwitchdResult<()> {
    ctx.console.set_echo(false);
    let result = restore_inner(ctx).await;
    ctx.console.set_echo(true);
    result
}

async fn restore_inner(ctx: &Ctx) -> SwitchdResult<()> {
    let console_mode = ctx.state.read().await.console_mode;
    let flags = SystemFlags::from_byte(ctx.eeprom().read(layout::FLAGS_ADDR).await?);

    if flags.reinit_requested() {
        ctx.console.write("[BOOTING]: Reinitializing EEPROM...");
        ctx.eeprom().chip_erase().await?;
        ctx.console.write("DONE!\n");
        info!("EEPROM reinitialized on request");
    }

    if flags.config_saved() {
        ctx.console
            .write("\n[BOOTING]: Loading configuration from memory...please wait\n");
        let mut bar = ProgressBar::create(ctx.console.clone(), console_mode);
        for reg in 0..=0xFFu16 {
            let value = ctx
                .eeprom()
                .read(layout::SWITCH_CONFIG_BASE + reg as u32)
                .await?;
            ctx.controller().write(reg as u8, value).await?;
            bar.update(ProgressAction::Increment, (100 * reg as i32) / 0xFF);
        }
        bar.finish();

        let log_flags = read_u32(ctx, layout::LOG_FLAGS_ADDR).await?;
        let mut next_log_slot = read_u32(ctx, layout::NEXT_LOG_SLOT_ADDR).await?;
        if next_log_slot < layout::LOG_BASE {
            next_log_slot = layout::LOG_BASE;
        }
        let mut state = ctx.state.write().await;
        state.log_flags = log_flags;
        state.next_log_slot = next_log_slot;
        info!(log_flags, next_log_slot, "controller image restored");
    }

    if flags.vlan_saved() {
        ctx.console
            .write("\n[BOOTING]: Reconfiguring VLANs from memory...please wait\n");
        let mut bar = ProgressBar::create(ctx.console.clone(), console_mode);
        for id in VlanId::MIN..=VlanId::MAX {
            let Ok(vlan) = VlanId::new(id) else { continue };
            let byte = ctx
                .eeprom()
                .read(layout::VLAN_TABLE_BASE + vlan.eeprom_offset())
                .await?;
            if byte & 0x80 != 0 {
                let entry = VlanEntry::from_mirror_byte(byte);
                vlan_table::write_entry(ctx.controller(), vlan, entry).await?;
            }
            bar.update(ProgressAction::Increment, (100 * id as i32) / 4095);
        }
        bar.finish();
        info!("VLAN table restored");
    }

    if flags.users_saved() {
        ctx.console
            .write("\n[BOOTING]: Loading User Database...please wait\n");
        let mut bar = ProgressBar::create(ctx.console.clone(), console_mode);
        let mut state = ctx.state.write().await;
        for slot in 0..MAX_USERS {
            let mut bytes = [0u8; layout::USER_SLOT_LEN as usize];
            ctx.eeprom()
                .bulk_read(
                    layout::USERS_BASE + slot as u32 * layout::USER_SLOT_LEN,
                    &mut bytes,
                )
                .await?;
            *state.users.slot_mut(slot) = users::record_from_bytes(&bytes);
            bar.update(ProgressAction::Increment, (100 * slot as i32) / MAX_USERS as i32);
        }
        bar.finish();
        info!("user table restored");
    }

    Ok(())
}

/// Saves the running configuration: the controller register image, the VLAN
/// table mirror, the user table, and the log bookkeeping, then marks the
/// image valid in the flag byte.
#[instrument(skip(ctx))]
pub async fn save_running_config(ctx: &Ctx) -> SwitchdResult<()> {
    ctx.console.set_echo(false);
    let result = save_inner(ctx).await;
    ctx.console.set_echo(true);
    result
}

async fn save_inner(ctx: &Ctx) -> SwitchdResult<()> {
    let console_mode = ctx.state.read().await.console_mode;
    let mut flags = SystemFlags::from_byte(ctx.eeprom().read(layout::FLAGS_ADDR).await?);
    let mut task = 1;

    ctx.console.write(&format!(
        "[{task}]: Saving Ethernet Controller Configuration To EEPROM ({}%)\n",
        task * 25
    ));
    let mut bar = ProgressBar::create(ctx.console.clone(), console_mode);
    for reg in 0..=0xFFu16 {
        let value = ctx.controller().read(reg as u8).await?;
        if let Err(err) = ctx
            .eeprom()
            .write(layout::SWITCH_CONFIG_BASE + reg as u32, value)
            .await
        {
            warn!(reg, "register save aborted: {err}");
            bar.fail();
            return Err(err.into());
        }
        bar.update(ProgressAction::Increment, (100 * reg as i32) / 0xFF);
    }
    bar.finish();
    flags.set(SystemFlags::CONFIG_SAVED);
    task += 1;

    // The VLAN branch keys off any non-zero read of global control 3, not
    // just the 802.1Q enable bit. Kept bit-compatible with shipped firmware.
    let global_control_3 = ctx.controller().read(regs::GLOBAL_CONTROL_3).await?;
    if global_control_3 != 0 {
        ctx.console
            .write(&format!("\n[{task}]: Saving VLANs To EEPROM ({}%)\n", task * 25));
        let mut bar = ProgressBar::create(ctx.console.clone(), console_mode);
        for page in 0..layout::VLAN_TABLE_PAGES {
            ctx.eeprom()
                .page_erase(layout::VLAN_TABLE_BASE + page * layout::PAGE_SIZE)
                .await?;
        }
        for group in 0..=1023u16 {
            let window = vlan_table::read_group(ctx.controller(), group).await?;
            for position in 0..4u8 {
                let id = group * 4 + position as u16;
                if !(VlanId::MIN..=VlanId::MAX).contains(&id) {
                    continue;
                }
                let entry = vlan_table::unpack(&window, position);
                ctx.eeprom()
                    .write(layout::VLAN_TABLE_BASE + (id - 1) as u32, entry.to_mirror_byte())
                    .await?;
            }
            bar.update(ProgressAction::Increment, (100 * group as i32) / 1023);
        }
        bar.finish();
        flags.set(SystemFlags::VLAN_SAVED);
        task += 1;
    } else {
        flags.clear(SystemFlags::VLAN_SAVED);
    }

    ctx.console.write(&format!(
        "\n[{task}]: Saving Updated User Database To EEPROM ({}%)\n",
        task * 25
    ));
    let mut bar = ProgressBar::create(ctx.console.clone(), console_mode);
    let slots = {
        let mut state = ctx.state.write().await;
        state.users.apply_pending();
        state.users.slots()[..MAX_USERS].to_vec()
    };
    for (index, record) in slots.iter().enumerate() {
        let bytes = if record.is_empty() {
            [0u8; layout::USER_SLOT_LEN as usize]
        } else {
            users::slot_bytes(record)
        };
        ctx.eeprom()
            .bulk_write(
                layout::USERS_BASE + index as u32 * layout::USER_SLOT_LEN,
                &bytes,
            )
            .await?;
        bar.update(ProgressAction::Increment, (100 * index as i32) / MAX_USERS as i32);
    }
    bar.finish();
    flags.set(SystemFlags::USERS_SAVED);

    let (log_flags, next_log_slot) = {
        let state = ctx.state.read().await;
        (state.log_flags, state.next_log_slot)
    };
    write_u32(ctx, layout::LOG_FLAGS_ADDR, log_flags).await?;
    write_u32(ctx, layout::NEXT_LOG_SLOT_ADDR, next_log_slot).await?;

    flags.set(0);
    ctx.eeprom().write(layout::FLAGS_ADDR, flags.as_byte()).await?;
    info!("running configuration saved");
    Ok(())
}

/// Reads a big-endian 32-bit field.
pub async fn read_u32(ctx: &Ctx, address: u32) -> SwitchdResult<u32> {
    let mut bytes = [0u8; 4];
    ctx.eeprom().bulk_read(address, &mut bytes).await?;
    Ok(u32::from_be_bytes(bytes))
}

/// Writes a big-endian 32-bit field.
pub async fn write_u32(ctx: &Ctx, address: u32, value: u32) -> SwitchdResult<()> {
    ctx.eeprom().bulk_write(address, &value.to_be_bytes()).await?;
    Ok(())
}
