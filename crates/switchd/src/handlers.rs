//! Command handlers shared by the CLI tree.
//!
//! Every handler follows the same contract: it receives the parameter buffer
//! accumulated during the tree walk (static node parameters first, then any
//! user-supplied tokens) and reports success or failure through its result.
//! The dispatcher owns the success/failure message; handlers print their own
//! payload output.

use crate::devices::Ctx;
use crate::persist;
use crate::progress::{ProgressAction, ProgressBar};
use crate::users::{PendingAction, UserRecord, MAX_USERS};
use crate::vlan_table::{self, VlanEntry};
use crate::{delays, SwitchdError, SwitchdResult};
use switch_types::{
    layout, parse_int, regs, EventCode, PortId, Role, SystemFlags, VlanId, VlanMembership,
};
use tracing::{info, warn};

/// Retry budget for bit poll-verify loops.
const BIT_POLL_RETRIES: u32 = 10;

/// Typed dispatch for the command tree's terminal nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    SetBit,
    ClearBit,
    SetSelfClearingBit,
    ReadController,
    WriteController,
    ReadEeprom,
    WriteEeprom,
    ReinitializeEeprom,
    SaveConfig,
    DeleteConfig,
    RunDiagnostics,
    ShowPortStatus,
    ShowRunningConfig,
    ShowVlanTable,
    ShowStaticMacTable,
    ShowDynMacTable,
    SetPortVlan,
    SetVlanEntry,
    EnableVlans,
    DisableVlans,
    ListUsers,
    AddUser,
    DeleteUsersMenu,
    EventStatus,
    ManageEvents,
    ListEvents,
    ClearEvents,
    I2cSend,
    Logout,
    Reset,
    NotImplemented,
}

/// Runs the handler selected by a terminal command node.
pub async fn dispatch(kind: HandlerKind, ctx: &Ctx, params: &[String]) -> SwitchdResult<()> {
    match kind {
        HandlerKind::SetBit => set_bit(ctx, params).await,
        HandlerKind::ClearBit => clear_bit(ctx, params).await,
        HandlerKind::SetSelfClearingBit => set_self_clearing_bit(ctx, params).await,
        HandlerKind::ReadController => read_controller(ctx, params).await,
        HandlerKind::WriteController => write_controller(ctx, params).await,
        HandlerKind::ReadEeprom => read_eeprom(ctx, params).await,
        HandlerKind::WriteEeprom => write_eeprom(ctx, params).await,
        HandlerKind::ReinitializeEeprom => reinitialize_eeprom(ctx).await,
        HandlerKind::SaveConfig => persist::save_running_config(ctx).await,
        HandlerKind::DeleteConfig => delete_config(ctx).await,
        HandlerKind::RunDiagnostics => run_cable_diagnostics(ctx, params).await,
        HandlerKind::ShowPortStatus => show_port_status(ctx, params).await,
        HandlerKind::ShowRunningConfig => show_running_config(ctx).await,
        HandlerKind::ShowVlanTable => show_vlan_table(ctx).await,
        HandlerKind::ShowStaticMacTable => show_static_mac_table(ctx).await,
        HandlerKind::ShowDynMacTable => show_dyn_mac_table(ctx).await,
        HandlerKind::SetPortVlan => set_port_vlan(ctx, params).await,
        HandlerKind::SetVlanEntry => set_vlan_entry(ctx, params).await,
        HandlerKind::EnableVlans => enable_vlans(ctx).await,
        HandlerKind::DisableVlans => disable_vlans(ctx).await,
        HandlerKind::ListUsers => list_users(ctx).await,
        HandlerKind::AddUser => add_user(ctx).await,
        HandlerKind::DeleteUsersMenu => delete_users_menu(ctx).await,
        HandlerKind::EventStatus => event_status(ctx).await,
        HandlerKind::ManageEvents => manage_events(ctx).await,
        HandlerKind::ListEvents => list_events(ctx).await,
        HandlerKind::ClearEvents => clear_events(ctx).await,
        HandlerKind::I2cSend => i2c_send(ctx, params).await,
        HandlerKind::Logout => logout(ctx).await,
        HandlerKind::Reset => reset(ctx).await,
        HandlerKind::NotImplemented => {
            ctx.console.write("Function Not Implemented!\n");
            Ok(())
        }
    }
}

fn arg<'a>(params: &'a [String], index: usize, what: &'static str) -> SwitchdResult<&'a str> {
    params
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| SwitchdError::invalid_argument(what, "<missing>"))
}

fn num(params: &[String], index: usize, what: &'static str) -> SwitchdResult<u32> {
    let text = arg(params, index, what)?;
    parse_int(text).ok_or_else(|| SwitchdError::invalid_argument(what, text))
}

/// Waits for a register to read back `expected`, bounded by the retry
/// budget.
pub(crate) async fn poll_verify(ctx: &Ctx, reg: u8, expected: u8) -> SwitchdResult<()> {
    let mut attempts = 0;
    while ctx.controller().read(reg).await? != expected {
        attempts += 1;
        if attempts > BIT_POLL_RETRIES {
            return Err(switch_hal::HalError::BitPollTimeout { attempts }.into());
        }
        tokio::time::sleep(delays::SHORT).await;
    }
    Ok(())
}

/// `[base, offset, bit, message?]` - sets a register bit active high and
/// poll-verifies the write.
pub async fn set_bit(ctx: &Ctx, params: &[String]) -> SwitchdResult<()> {
    let reg = (num(params, 0, "register-base")? + num(params, 1, "register-offset")?) as u8;
    let bit = num(params, 2, "bit")? as u8;
    if let Some(message) = params.get(3) {
        ctx.console.write(&format!("[RUNNING TASK]: {message} \n"));
    }

    let value = ctx.controller().read(reg).await? | (1 << bit);
    ctx.controller().write(reg, value).await?;
    poll_verify(ctx, reg, value).await
}

/// `[base, offset, bit, message?]` - clears a register bit and poll-verifies
/// the write.
pub async fn clear_bit(ctx: &Ctx, params: &[String]) -> SwitchdResult<()> {
    let reg = (num(params, 0, "register-base")? + num(params, 1, "register-offset")?) as u8;
    let bit = num(params, 2, "bit")? as u8;
    if let Some(message) = params.get(3) {
        ctx.console.write(&format!("[RUNNING TASK]: {message} \n"));
    }

    let value = ctx.controller().read(reg).await? & !(1 << bit);
    ctx.controller().write(reg, value).await?;
    poll_verify(ctx, reg, value).await
}

/// `[base, offset, bit, message?]` - sets a self-clearing control bit, then
/// polls until the device drops it again.
pub async fn set_self_clearing_bit(ctx: &Ctx, params: &[String]) -> SwitchdResult<()> {
    let reg = (num(params, 0, "register-base")? + num(params, 1, "register-offset")?) as u8;
    let bit = num(params, 2, "bit")? as u8;
    if let Some(message) = params.get(3) {
        ctx.console.write(&format!("[RUNNING TASK]: {message} \n"));
    }

    let value = ctx.controller().read(reg).await? | (1 << bit);
    ctx.controller().write(reg, value).await?;
    poll_verify(ctx, reg, value & !(1 << bit)).await
}

/// `[reg]` - reads a controller register to the console.
pub async fn read_controller(ctx: &Ctx, params: &[String]) -> SwitchdResult<()> {
    let reg = num(params, 0, "register-addr")? as u8;
    ctx.console.write(&format!("REG ADDR: 0x{reg:02X}\n"));
    let data = ctx.controller().read(reg).await?;
    ctx.console
        .write(&format!("\nData Read @ 0x{reg:02X}: 0x{data:02X}\n"));
    Ok(())
}

/// `[reg, data]` - writes a controller register and reads it back.
pub async fn write_controller(ctx: &Ctx, params: &[String]) -> SwitchdResult<()> {
    let reg = num(params, 0, "register-addr")? as u8;
    let data = num(params, 1, "register-data")? as u8;
    ctx.console.write(&format!("REG ADDR: 0x{reg:02X}\n"));
    ctx.console.write(&format!("REG DATA: 0x{data:02X}\n"));

    ctx.controller().write(reg, data).await?;
    let read_back = ctx.controller().read(reg).await?;
    if read_back != data {
        warn!(reg, data, read_back, "controller write verify failed");
        return Err(switch_hal::HalError::VerifyMismatch {
            address: reg as u32,
            wrote: data,
            read: read_back,
        }
        .into());
    }
    ctx.console
        .write(&format!("\nData Written To @ 0x{reg:02X}: 0x{read_back:02X}\n"));
    Ok(())
}

/// `[addr]` - reads an EEPROM byte to the console.
pub async fn read_eeprom(ctx: &Ctx, params: &[String]) -> SwitchdResult<()> {
    let addr = num(params, 0, "register-addr")?;
    ctx.console.write(&format!("REG ADDR: 0x{addr:08X}\n"));
    let data = ctx.eeprom().read(addr).await?;
    ctx.console
        .write(&format!("\n Data Read @0x{addr:02X}: 0x{data:02X}\n"));
    Ok(())
}

/// `[addr, data]` - writes an EEPROM byte (the driver verifies it).
pub async fn write_eeprom(ctx: &Ctx, params: &[String]) -> SwitchdResult<()> {
    let addr = num(params, 0, "register-addr")?;
    let data = num(params, 1, "register-data")? as u8;
    ctx.console.write(&format!("REG ADDR: 0x{addr:02X}\n"));
    ctx.console.write(&format!("REG DATA: 0x{data:02X}\n"));
    ctx.console
        .write("[RUNNING TASK]: Writing To EEPROM\n");
    ctx.eeprom().write(addr, data).await?;
    Ok(())
}

/// Requests a factory reset of the EEPROM on the next boot.
pub async fn reinitialize_eeprom(ctx: &Ctx) -> SwitchdResult<()> {
    ctx.eeprom().write(layout::FLAGS_ADDR, 0x80).await?;
    ctx.console
        .write("[IMPORTANT]: Reboot required for changes to take effect!\n");
    Ok(())
}

/// Drops the saved-configuration and saved-VLAN flags so the next boot comes
/// up clean.
pub async fn delete_config(ctx: &Ctx) -> SwitchdResult<()> {
    let mut flags = SystemFlags::from_byte(ctx.eeprom().read(layout::FLAGS_ADDR).await?);
    flags.clear(SystemFlags::CONFIG_SAVED);
    flags.clear(SystemFlags::VLAN_SAVED);
    ctx.eeprom().write(layout::FLAGS_ADDR, flags.as_byte()).await?;
    Ok(())
}

/// Outcome of a LinkMD pass, decoded from the result field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CableState {
    Normal,
    Open,
    Short,
    Fail,
}

/// Runs LinkMD on a port: `(state, fault distance in meters)`.
///
/// Auto-negotiation and auto-MDIX must be off for the reflectometry pulse,
/// and are restored afterwards regardless of outcome.
pub async fn link_md(ctx: &Ctx, base: u8) -> SwitchdResult<(CableState, i32)> {
    let control5 = base + regs::PORT_CONTROL5_OFFSET;
    let control6 = base + regs::PORT_CONTROL6_OFFSET;
    let linkmd0 = base + regs::PORT_LINKMD0_OFFSET;
    let linkmd1 = base + regs::PORT_LINKMD1_OFFSET;

    // Disable auto-negotiation, then auto-MDIX.
    let value = ctx.controller().read(control5).await? | (1 << 7);
    ctx.controller().write(control5, value).await?;
    let value = ctx.controller().read(control6).await? | (1 << 2);
    ctx.controller().write(control6, value).await?;

    // Start the pulse and wait for the start bit to self-clear; the result
    // bits land in the same register.
    let started = ctx.controller().read(linkmd0).await? | (1 << 4);
    ctx.controller().write(linkmd0, started).await?;
    let mut result = Ok(());
    let mut attempts = 0;
    let mut md0 = started;
    while md0 & (1 << 4) != 0 {
        attempts += 1;
        if attempts > BIT_POLL_RETRIES {
            result = Err(switch_hal::HalError::BitPollTimeout { attempts }.into());
            break;
        }
        tokio::time::sleep(delays::SHORT).await;
        md0 = ctx.controller().read(linkmd0).await?;
    }

    let outcome = match result {
        Ok(()) => {
            let state = match md0 & 0x60 {
                0x00 => CableState::Normal,
                0x20 => CableState::Open,
                0x40 => CableState::Short,
                _ => CableState::Fail,
            };
            let raw = (((md0 & 0x01) as u16) << 8) | ctx.controller().read(linkmd1).await? as u16;
            let distance = (0.4 * (raw as f32 - 26.0)).round().max(0.0) as i32;
            Ok((state, distance))
        }
        Err(err) => Err(err),
    };

    // Restore auto-negotiation and auto-MDIX.
    let value = ctx.controller().read(control5).await? & !(1 << 7);
    ctx.controller().write(control5, value).await?;
    let value = ctx.controller().read(control6).await? & !(1 << 2);
    ctx.controller().write(control6, value).await?;

    outcome
}

/// `[base]` - runs cable diagnostics and reports state and fault distance.
pub async fn run_cable_diagnostics(ctx: &Ctx, params: &[String]) -> SwitchdResult<()> {
    let base = num(params, 0, "port-base")? as u8;
    ctx.console
        .write("[RUNNING TASK]: Running Link MD for selected port, please wait... \n");

    let (state, distance) = link_md(ctx, base).await?;
    match state {
        CableState::Normal => {
            ctx.console.write("\n\tLINK CABLE: Normal\n");
            return Ok(());
        }
        CableState::Open => ctx.console.write("\n\tLINK CABLE: Open Detected In Cable\n"),
        CableState::Short => ctx.console.write("\n\tLINK CABLE: Short Detected In Cable\n"),
        CableState::Fail => ctx.console.write("\n\tLINK CABLE: Cable Diagnostics Failed\n"),
    }
    ctx.console
        .write(&format!("\tDISTANCE TO FAULT: {distance}\n"));
    Ok(())
}

/// `[base]` - renders one port's configuration.
pub async fn show_port_status(ctx: &Ctx, params: &[String]) -> SwitchdResult<()> {
    let base = num(params, 0, "port-base")? as u8;
    let port = PortId::from_hw_base(base)
        .ok_or_else(|| SwitchdError::invalid_argument("port-base", format!("0x{base:02X}")))?;
    let index = PortId::USER_PORTS
        .iter()
        .position(|candidate| *candidate == port)
        .unwrap_or(0);
    ctx.console
        .write(&format!("Configuration for <Fast Ethernet {index}>\n"));
    crate::status::render_port_status(ctx, port).await
}

/// Interactive global/port status pager (`G`, `0`-`3`, `E`).
pub async fn show_running_config(ctx: &Ctx) -> SwitchdResult<()> {
    ctx.console.write("\n========== GLOBAL SETTINGS ==========\n");
    crate::status::render_global_status(ctx).await?;

    loop {
        ctx.console.write(
            "\nOPTIONS: [G]: Global Settings  [0]: Port 0  [1]: Port 1  [2]: Port 2  [3]: Port 3  [E]: EXIT",
        );
        ctx.console.set_echo(false);
        let key = loop {
            match ctx.console.read_key().await {
                Some(key) => match key {
                    b'G' | b'g' | b'0'..=b'3' | b'E' | b'e' => break key,
                    _ => continue,
                },
                None => {
                    ctx.console.set_echo(true);
                    return Ok(());
                }
            }
        };
        ctx.console.set_echo(true);

        match key {
            b'G' | b'g' => {
                ctx.console.write("\n========== GLOBAL SETTINGS ==========\n");
                crate::status::render_global_status(ctx).await?;
            }
            b'E' | b'e' => return Ok(()),
            digit => {
                let port = PortId::USER_PORTS[(digit - b'0') as usize];
                ctx.console
                    .write(&format!("\n========== PORT {} SETTINGS ==========\n", digit as char));
                crate::status::render_port_status(ctx, port).await?;
            }
        }
    }
}

/// Renders the VLAN table mirror ten entries per page with an N/E prompt.
pub async fn show_vlan_table(ctx: &Ctx) -> SwitchdResult<()> {
    ctx.console.write("[Compiling VLAN Table]: Please wait...\n");

    let mut page: Vec<(u16, u8)> = Vec::with_capacity(10);
    let mut any = false;
    for id in VlanId::MIN..=VlanId::MAX {
        let byte = ctx
            .eeprom()
            .read(layout::VLAN_TABLE_BASE + (id - 1) as u32)
            .await?;
        if byte & 0x80 == 0 {
            continue;
        }
        any = true;
        page.push((id, byte));
        if page.len() == 10 {
            render_vlan_page(ctx, &page);
            page.clear();
            ctx.console
                .write("\n\nSelect An Option:: [N]: Next, [E]: Exit\n");
            ctx.console.set_echo(false);
            loop {
                match ctx.console.read_key().await {
                    Some(b'E') | Some(b'e') | None => {
                        ctx.console.set_echo(true);
                        return Ok(());
                    }
                    Some(b'N') | Some(b'n') => break,
                    _ => continue,
                }
            }
            ctx.console.set_echo(true);
        }
    }

    if !any {
        ctx.console.write("\nVLAN ID    STATUS     PORTS ASSIGNED\n");
        ctx.console.write("==== NO ENTRIES FOUND IN VLAN TABLE ====\n");
        return Ok(());
    }
    if !page.is_empty() {
        render_vlan_page(ctx, &page);
    }
    Ok(())
}

fn render_vlan_page(ctx: &Ctx, entries: &[(u16, u8)]) {
    ctx.console.write("\nVLAN ID    STATUS     PORTS ASSIGNED\n");
    for &(id, byte) in entries {
        let mut line = format!("{id:<7}    Active     ");
        if byte & 0x20 != 0 {
            line.push_str("fast-eth0 ");
        }
        if byte & 0x10 != 0 {
            line.push_str("fast-eth1 ");
        }
        if byte & 0x08 != 0 {
            line.push_str("fast-eth2 ");
        }
        if byte & 0x04 != 0 {
            line.push_str("fast-eth3 ");
        }
        line.push('\n');
        ctx.console.write(&line);
    }
}

/// Dumps valid rows of the controller's static MAC table.
pub async fn show_static_mac_table(ctx: &Ctx) -> SwitchdResult<()> {
    for entry in 0u16..0x400 {
        ctx.controller()
            .write(
                regs::INDIRECT_ACCESS_CONTROL_0,
                0x10 | ((entry >> 8) & 0x03) as u8,
            )
            .await?;
        ctx.controller()
            .write(regs::INDIRECT_ACCESS_CONTROL_1, (entry & 0xFF) as u8)
            .await?;
        let mut row = [0u8; 8];
        ctx.controller()
            .bulk_read(regs::INDIRECT_DATA_7, &mut row)
            .await?;

        if (row[1] >> 5) & 1 == 0 {
            if entry == 0 {
                ctx.console
                    .write("\n==== NO ENTRIES FOUND IN STATIC MAC TABLE ====\n");
                return Ok(());
            }
            continue;
        }

        if entry == 0 {
            ctx.console.write(
                "== FILTER ID ==\t == USE FID ==\t == OVERRIDE STP ==\t == FORWARDING PORTS ==\t == MAC ADDRESS ==\n",
            );
        }
        let mut line = format!("{}\t", row[0] >> 1);
        line.push_str(if row[0] & 1 != 0 { "TRUE\t" } else { "FALSE\t" });
        line.push_str(if (row[1] >> 7) & 1 != 0 { "YES\t" } else { "NO\t" });
        if (row[1] >> 4) & 1 != 0 {
            line.push_str(" f3 ");
        }
        if (row[1] >> 3) & 1 != 0 {
            line.push_str(" f2 ");
        }
        if (row[1] >> 2) & 1 != 0 {
            line.push_str(" f1 ");
        }
        if (row[1] >> 1) & 1 != 0 {
            line.push_str(" f0 ");
        }
        if row[1] & 1 != 0 {
            line.push_str(" exp-port");
        }
        line.push_str(&format!(
            "\t{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}\n",
            row[2], row[3], row[4], row[5], row[6], row[7]
        ));
        ctx.console.write(&line);
    }
    ctx.console.write("\n==== END OF STATIC MAC TABLE ====\n");
    Ok(())
}

/// Dumps the dynamic MAC table, exiting early when the table reports empty
/// or shrinks mid-walk.
pub async fn show_dyn_mac_table(ctx: &Ctx) -> SwitchdResult<()> {
    let mut total_entries: u16 = 0x400;
    for entry in 0u16..0x400 {
        if entry >= total_entries {
            break;
        }
        ctx.controller()
            .write(
                regs::INDIRECT_ACCESS_CONTROL_0,
                0x18 | ((entry >> 8) & 0x03) as u8,
            )
            .await?;
        ctx.controller()
            .write(regs::INDIRECT_ACCESS_CONTROL_1, (entry & 0xFF) as u8)
            .await?;
        let mut row = [0u8; 9];
        ctx.controller()
            .bulk_read(regs::INDIRECT_DATA_8, &mut row)
            .await?;

        if (row[0] >> 7) & 1 == 1 {
            ctx.console
                .write("\n==== NO ENTRIES FOUND IN DYNAMIC MAC TABLE ====\n");
            return Ok(());
        }

        // A port unplug can shrink the table while we walk it.
        total_entries = (((row[0] & 0x7F) as u16) << 3) | ((((row[1] & 0xE0) >> 5) + 1) as u16);
        if entry > total_entries {
            ctx.console.write("\n==== END OF TABLE ====\n");
            return Ok(());
        }

        // The row can still be settling; re-read it a bounded number of times.
        let mut settles = 0;
        while (row[2] >> 7) & 1 == 1 && settles < BIT_POLL_RETRIES {
            tokio::time::sleep(delays::VERY_SHORT).await;
            ctx.controller()
                .bulk_read(regs::INDIRECT_DATA_8, &mut row)
                .await?;
            settles += 1;
        }

        if entry == 0 {
            ctx.console
                .write("\n\t== MAC ADDRESS ==\t == SOURCE PORT ==\t == FILTER ID ==\n");
        }
        let source = match row[1] & 0x07 {
            0x00 => "f3",
            0x01 => "f2",
            0x02 => "f1",
            0x03 => "f0",
            _ => "exp-port",
        };
        ctx.console.write(&format!(
            "\t{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}\t\t{source}\t\t\t{}\n",
            row[3], row[4], row[5], row[6], row[7], row[8],
            row[2] & 0x7F
        ));
    }
    ctx.console.write("\n==== END OF DYNAMIC MAC TABLE ====\n");
    Ok(())
}

/// Scans the four user ports for a matching default VLAN and stamps each
/// match's membership mask; returns the accumulated mask.
async fn assert_vlans(ctx: &Ctx, vlan_id: u16, port_base: u8) -> SwitchdResult<u8> {
    let selected = PortId::from_hw_base(port_base)
        .ok_or_else(|| SwitchdError::invalid_argument("port-base", format!("0x{port_base:02X}")))?;
    let mut mask = 0u8;

    for other in [PortId::F3, PortId::F2, PortId::F1, PortId::F0] {
        let high = ctx.controller().read(other.reg(regs::PORT_CONTROL3_OFFSET)).await? & 0x0F;
        let low = ctx.controller().read(other.reg(regs::PORT_CONTROL4_OFFSET)).await?;
        let default_vid = ((high as u16) << 8) | low as u16;
        if default_vid != vlan_id {
            continue;
        }

        mask |= 1 << other.membership_bit();
        let control1 = other.reg(regs::PORT_CONTROL1_OFFSET);
        let value = ctx.controller().read(control1).await? | (1 << selected.membership_bit());
        ctx.controller().write(control1, value).await?;
    }
    Ok(mask)
}

/// `[base, vlan-id]` - sets a port's default VLAN: tag insertion on, the
/// 12-bit VID across port control 3/4, and the membership mask refreshed
/// from the matching ports.
pub async fn set_port_vlan(ctx: &Ctx, params: &[String]) -> SwitchdResult<()> {
    let base = num(params, 0, "port-base")? as u8;
    let vlan_id = num(params, 1, "vlan-id")? as u16;

    // Tag insertion for frames arriving untagged.
    let control0 = base + regs::PORT_CONTROL0_OFFSET;
    let value = ctx.controller().read(control0).await? | (1 << 2);
    ctx.controller().write(control0, value).await?;

    // VID bits 11-8 into control 3, bits 7-0 into control 4.
    let control3 = base + regs::PORT_CONTROL3_OFFSET;
    let value = (ctx.controller().read(control3).await? & 0xF0) | ((vlan_id >> 8) & 0x0F) as u8;
    ctx.controller().write(control3, value).await?;
    ctx.controller()
        .write(base + regs::PORT_CONTROL4_OFFSET, (vlan_id & 0xFF) as u8)
        .await?;

    // Tell every port on this VLAN about its peers.
    let mask = assert_vlans(ctx, vlan_id, base).await?;
    let control1 = base + regs::PORT_CONTROL1_OFFSET;
    let value = (ctx.controller().read(control1).await? & 0xE0) | (mask & 0x1F);
    ctx.controller().write(control1, value).await?;

    info!("default VLAN {vlan_id} set on port block 0x{base:02X}");
    Ok(())
}

/// `[base, vlan-id]` - adds a VLAN table entry through the indirect window
/// and mirrors it into the EEPROM VLAN region.
pub async fn set_vlan_entry(ctx: &Ctx, params: &[String]) -> SwitchdResult<()> {
    let base = num(params, 0, "port-base")? as u8;
    let id = num(params, 1, "vlan-id")?;
    let vlan = match u16::try_from(id).ok().and_then(|id| VlanId::new(id).ok()) {
        Some(vlan) => vlan,
        None => {
            ctx.console
                .write("VLAN entered is out of range. Valid options are 1 - 4095\n");
            return Err(SwitchdError::invalid_argument("vlan-id", id.to_string()));
        }
    };

    let current = vlan_table::read_entry(ctx.controller(), vlan).await?;
    let mask = assert_vlans(ctx, vlan.as_u16(), base).await?;
    let entry = VlanEntry {
        valid: true,
        membership: VlanMembership::new(current.membership.bits() | mask),
    };
    vlan_table::write_entry(ctx.controller(), vlan, entry).await?;

    ctx.eeprom()
        .write(
            layout::VLAN_TABLE_BASE + vlan.eeprom_offset(),
            entry.to_mirror_byte(),
        )
        .await?;
    info!(vlan = vlan.as_u16(), "VLAN table entry written");
    Ok(())
}

/// Enables 802.1Q filtering globally.
pub async fn enable_vlans(ctx: &Ctx) -> SwitchdResult<()> {
    ctx.controller()
        .set_bit(regs::GLOBAL_CONTROL_3, regs::VLAN_ENABLE_BIT)
        .await?;
    Ok(())
}

/// Disables 802.1Q filtering globally.
pub async fn disable_vlans(ctx: &Ctx) -> SwitchdResult<()> {
    ctx.controller()
        .clear_bit(regs::GLOBAL_CONTROL_3, regs::VLAN_ENABLE_BIT)
        .await?;
    Ok(())
}

/// Lists every configured user.
pub async fn list_users(ctx: &Ctx) -> SwitchdResult<()> {
    let state = ctx.state.read().await;
    if state.users.slots()[0].is_empty() {
        ctx.console.write("\n === NO USERS IN DATABASE === \n");
        return Err(SwitchdError::user_table("no users in database"));
    }
    for (index, user) in state.users.slots().iter().enumerate() {
        if user.is_empty() {
            continue;
        }
        ctx.console.write(&format!(
            "[{}] USER: {}\n\t{} {}\n\tROLE: {}\n",
            index + 1,
            user.username,
            user.first_name,
            user.last_name,
            user.role
        ));
        if user.pending == PendingAction::Delete {
            ctx.console.write("\t[USER MARKED FOR DELETION]\n");
        }
    }
    Ok(())
}

async fn prompt_field(ctx: &Ctx, label: &str, mask: bool) -> SwitchdResult<String> {
    loop {
        ctx.console
            .write(&format!("\n{label} (16 character max): "));
        ctx.console.set_password_mask(mask);
        let line = ctx.console.read_line().await;
        ctx.console.set_password_mask(false);
        match line {
            Some(text) if !text.is_empty() => {
                let mut text = text;
                text.truncate(layout::USER_FIELD_LEN);
                return Ok(text);
            }
            Some(_) => continue,
            None => return Err(SwitchdError::user_table("console closed")),
        }
    }
}

/// Interactive prompt sequence collecting a new user record.
pub async fn add_user(ctx: &Ctx) -> SwitchdResult<()> {
    {
        let state = ctx.state.read().await;
        if !state.users.slots()[MAX_USERS - 1].is_empty() {
            ctx.console.write(
                "\nMaximum user limit exceeded (15)! \nPlease delete an existing user before adding a new one.\n",
            );
            return Err(SwitchdError::user_table("maximum user limit exceeded"));
        }
    }

    let username = loop {
        let candidate = prompt_field(ctx, "Username", false).await?;
        if ctx.state.read().await.users.username_taken(&candidate) {
            ctx.console
                .write("\nUser already exists. Please enter a unique username.\n");
            continue;
        }
        break candidate;
    };
    let first_name = prompt_field(ctx, "First Name", false).await?;
    let last_name = prompt_field(ctx, "Last Name", false).await?;
    let password = prompt_field(ctx, "Password", true).await?;

    let role = loop {
        ctx.console.write(
            "\n\nENTER ONE OF THE FOLLOWING:\n0: User has read-only permissions\n1: User can change port settings\n2: User can change port and system settings\n3: User has full administrative rights\nPermission Level (0 | 1 | 2 | 3): ",
        );
        match ctx.console.read_line().await {
            Some(line) => match line.trim().parse::<u8>().ok().and_then(|v| Role::from_u8(v).ok()) {
                Some(role) => break role,
                None => ctx.console.write("\nInvalid entry!\n"),
            },
            None => return Err(SwitchdError::user_table("console closed")),
        }
    };

    let record = UserRecord {
        username: username.clone(),
        first_name: first_name.clone(),
        last_name: last_name.clone(),
        password,
        role,
        marked: false,
        pending: PendingAction::Add,
    };
    ctx.state.write().await.users.add(record)?;

    ctx.console.write(&format!(
        "\n\nUser added to table. Save switch configuration to make changes permanent!\n\tUsername: {username}\n\tFirst Name: {first_name}\n\tLast Name: {last_name}\n",
    ));
    Ok(())
}

/// ANSI checkbox menu marking users for deletion; `C` promotes the marks to
/// pending actions, applied by the next configuration save.
pub async fn delete_users_menu(ctx: &Ctx) -> SwitchdResult<()> {
    ctx.console.write(
        "\nCheck all users to DELETE by using the arrow keys\nUse <ENTER> to select, <C> to confirm, <E> to exit\n",
    );

    let occupied: Vec<usize> = {
        let state = ctx.state.read().await;
        if state.users.slots()[0].is_empty() {
            ctx.console.write("\n === NO USERS IN DATABASE === \n");
            return Err(SwitchdError::user_table("no users in database"));
        }
        let slots = state.users.slots();
        let indices: Vec<usize> = (0..slots.len()).filter(|&i| !slots[i].is_empty()).collect();
        for &index in &indices {
            let user = &slots[index];
            let check = if user.marked { '#' } else { ' ' };
            ctx.console.write(&format!(
                "[{check}] USER: {}\n\t{} {}\n\tROLE: {}\n",
                user.username, user.first_name, user.last_name, user.role
            ));
        }
        indices
    };

    // Park the cursor on the first checkbox.
    let total = occupied.len();
    let mut current = 0usize;
    for _ in 0..total {
        ctx.console.write("\x1b[3A");
    }
    ctx.console.write("\x1b[1C");
    ctx.console.set_echo(false);

    loop {
        let key = match ctx.console.read_key().await {
            Some(key) => key,
            None => {
                ctx.console.set_echo(true);
                return Ok(());
            }
        };
        match key {
            0x41 => {
                if current > 0 {
                    ctx.console.write("\x1b[3A");
                    current -= 1;
                }
            }
            0x42 => {
                if current + 1 < total {
                    ctx.console.write("\x1b[3B");
                    current += 1;
                }
            }
            b'\r' | b'\n' => {
                let mut state = ctx.state.write().await;
                let slot = state.users.slot_mut(occupied[current]);
                if slot.marked {
                    ctx.console.write(" \x1b[1D");
                    slot.marked = false;
                } else {
                    ctx.console.write("#\x1b[1D");
                    slot.marked = true;
                }
            }
            b'E' | b'e' => {
                for _ in current..total {
                    ctx.console.write("\x1b[3B");
                }
                ctx.console.write("\x1b[2B\x1b[1D");
                ctx.console.set_echo(true);
                return Ok(());
            }
            b'C' | b'c' => {
                for _ in current..total {
                    ctx.console.write("\x1b[3B");
                }
                ctx.console.write("\x1b[2B\x1b[1D");
                let mut state = ctx.state.write().await;
                for index in 0..MAX_USERS {
                    let slot = state.users.slot_mut(index);
                    if slot.is_empty() {
                        continue;
                    }
                    slot.pending = if slot.marked {
                        PendingAction::Delete
                    } else {
                        PendingAction::Update
                    };
                }
                ctx.console.set_echo(true);
                ctx.console
                    .write("\n[NOTICE]: Save switch configuration to update user database\n");
                return Ok(());
            }
            _ => {}
        }
    }
}

/// Lists each event type with its current enable state.
pub async fn event_status(ctx: &Ctx) -> SwitchdResult<()> {
    ctx.console
        .write("\n ====== Events currently logged to EEPROM ======\n");
    let flags = ctx.state.read().await.log_flags;
    let width = EventCode::ALL
        .iter()
        .map(|code| code.to_string().len())
        .max()
        .unwrap_or(0);

    for code in EventCode::ALL {
        let name = code.to_string();
        let pad = " ".repeat(width - name.len());
        let status = if flags & code.flag_bit() != 0 {
            "[ENABLED]"
        } else {
            "[DISABLED]"
        };
        ctx.console.write(&format!("\n {name}{pad} - {status}\n"));
    }
    Ok(())
}

/// ANSI checkbox menu toggling event-type enable bits.
pub async fn manage_events(ctx: &Ctx) -> SwitchdResult<()> {
    ctx.console.write(
        "\nCheck all events to ENABLE/DISABLE by using the arrow keys\nUse <ENTER> to select, <C> to confirm, <E> to exit\n",
    );

    {
        let flags = ctx.state.read().await.log_flags;
        for code in EventCode::ALL {
            let check = if flags & code.flag_bit() != 0 { '#' } else { ' ' };
            ctx.console.write(&format!("[{check}] EVENT: {code}\n"));
        }
    }

    let total = EventCode::ALL.len();
    let mut current = 0usize;
    for _ in 0..total {
        ctx.console.write("\x1b[1A");
    }
    ctx.console.write("\x1b[1C");
    ctx.console.set_echo(false);

    loop {
        let key = match ctx.console.read_key().await {
            Some(key) => key,
            None => {
                ctx.console.set_echo(true);
                return Ok(());
            }
        };
        match key {
            0x41 => {
                if current > 0 {
                    ctx.console.write("\x1b[1A");
                    current -= 1;
                }
            }
            0x42 => {
                if current + 1 < total {
                    ctx.console.write("\x1b[1B");
                    current += 1;
                }
            }
            b'\r' | b'\n' => {
                let bit = EventCode::ALL[current].flag_bit();
                let mut state = ctx.state.write().await;
                if state.log_flags & bit != 0 {
                    ctx.console.write(" \x1b[1D");
                    state.log_flags &= !bit;
                } else {
                    ctx.console.write("#\x1b[1D");
                    state.log_flags |= bit;
                }
            }
            b'E' | b'e' => {
                for _ in current..total {
                    ctx.console.write("\x1b[1B");
                }
                ctx.console.write("\x1b[2B\x1b[1D");
                ctx.console.set_echo(true);
                return Ok(());
            }
            b'C' | b'c' => {
                for _ in current..total {
                    ctx.console.write("\x1b[1B");
                }
                ctx.console.write("\x1b[2B\x1b[1D");
                ctx.console.set_echo(true);
                ctx.console
                    .write("\n[NOTICE]: Save switch configuration before turning off system!\n");
                return Ok(());
            }
            _ => {}
        }
    }
}

/// Dumps every resident log record with its tick timestamp.
pub async fn list_events(ctx: &Ctx) -> SwitchdResult<()> {
    let next_log_slot = ctx.state.read().await.next_log_slot;
    let mut address = layout::LOG_BASE;

    while address < layout::LOG_END {
        let mut stamp = [0u8; 4];
        ctx.eeprom().bulk_read(address, &mut stamp).await?;
        let timestamp = u32::from_be_bytes(stamp);

        if timestamp == 0 && address == layout::LOG_BASE {
            ctx.console.write("\n=== NO LOG ENTRIES FOUND ===\n");
            return Ok(());
        }
        if timestamp == 0 || address >= next_log_slot {
            ctx.console.write("\n=== END OF LOG ===\n");
            return Ok(());
        }

        let code = ctx.eeprom().read(address + 4).await?;
        match EventCode::from_u8(code) {
            Ok(event) => ctx
                .console
                .write(&format!("[System Time: {timestamp}] - {event}\n")),
            Err(_) => ctx
                .console
                .write(&format!("[System Time: {timestamp}] - <unknown 0x{code:02X}>\n")),
        }
        address += layout::LOG_RECORD_LEN;
    }
    Ok(())
}

/// Erases the log region and resets the next-slot pointer.
pub async fn clear_events(ctx: &Ctx) -> SwitchdResult<()> {
    let mut address = layout::LOG_BASE;
    while address < layout::LOG_END {
        ctx.eeprom().page_erase(address).await?;
        address += layout::PAGE_SIZE;
    }
    ctx.state.write().await.next_log_slot = layout::LOG_BASE;
    ctx.console
        .write("\n[NOTICE]: Save switch configuration before turning off system!\n");
    Ok(())
}

/// `[code, param...]` - feeds a command into the local I²C slave endpoint
/// over the loopback path.
pub async fn i2c_send(ctx: &Ctx, params: &[String]) -> SwitchdResult<()> {
    let tx = ctx
        .i2c_loopback
        .as_ref()
        .ok_or(SwitchdError::NotImplemented)?;

    let code = num(params, 0, "i2c-command")? as u8;
    let mut bytes = vec![code];
    for param in &params[1..] {
        bytes.push(
            parse_int(param).ok_or_else(|| SwitchdError::invalid_argument("i2c-param", param))?
                as u8,
        );
    }

    tx.send(crate::i2c::SlaveEvent::Start)
        .await
        .map_err(|_| SwitchdError::NotImplemented)?;
    for byte in bytes {
        tx.send(crate::i2c::SlaveEvent::Data(byte))
            .await
            .map_err(|_| SwitchdError::NotImplemented)?;
    }
    tx.send(crate::i2c::SlaveEvent::Stop)
        .await
        .map_err(|_| SwitchdError::NotImplemented)?;
    Ok(())
}

/// Ends the session and returns the console to the login prompt.
pub async fn logout(ctx: &Ctx) -> SwitchdResult<()> {
    ctx.console.write("\x1b[2J\x1b[0m\n");
    let mut state = ctx.state.write().await;
    state.authenticated = false;
    state.active_user = None;
    ctx.events.record(EventCode::UserLoggedOut);
    info!("user logged out");
    Ok(())
}

/// Soft reset with a second-entry confirmation.
pub async fn reset(ctx: &Ctx) -> SwitchdResult<()> {
    let mut state = ctx.state.write().await;
    if !state.reset_armed {
        ctx.console
            .write("\nAre you sure? Type 'system reset' again to confirm\n");
        state.reset_armed = true;
        return Err(SwitchdError::ConfirmationPending);
    }
    info!("soft reset requested; restarting");
    std::process::exit(0);
}
