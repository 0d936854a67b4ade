//! Shared fixture: a daemon context over simulated board devices.
#![allow(dead_code)]

use switch_hal::sim::{SimControllerBus, SimControllerHandle, SimEepromBus, SimEepromHandle};
use switch_hal::EventSink;
use switchd::config::DaemonConfig;
use switchd::console::{CaptureSink, Console};
use switchd::state::SystemState;
use switchd::users::{PendingAction, UserRecord};
use switchd::{Ctx, Devices};
use switch_types::Role;
use tokio::sync::mpsc;

pub struct Fixture {
    pub ctx: Ctx,
    pub eeprom: SimEepromHandle,
    pub controller: SimControllerHandle,
    pub capture: CaptureSink,
    pub input: mpsc::Sender<u8>,
    pub eeprom_bus: SimEepromBus,
    pub controller_bus: SimControllerBus,
}

pub fn fixture() -> Fixture {
    let eeprom_bus = SimEepromBus::new();
    let controller_bus = SimControllerBus::new();
    let eeprom = eeprom_bus.handle();
    let controller = controller_bus.handle();

    let devices = Devices::new(
        Box::new(eeprom_bus.clone()),
        Box::new(controller_bus.clone()),
        EventSink::disabled(),
    );
    let (console, input, capture) = Console::piped();
    let state = SystemState::shared(&DaemonConfig::default());

    Fixture {
        ctx: Ctx {
            devices,
            console,
            state,
            events: EventSink::disabled(),
            i2c_loopback: None,
        },
        eeprom,
        controller,
        capture,
        input,
        eeprom_bus,
        controller_bus,
    }
}

/// A second context over the same EEPROM but a factory-fresh controller,
/// with fresh daemon state, as if the board had rebooted.
pub fn reboot(fixture: &Fixture) -> (Ctx, SimControllerHandle) {
    let controller_bus = SimControllerBus::new();
    let controller = controller_bus.handle();
    let devices = Devices::new(
        Box::new(fixture.eeprom_bus.clone()),
        Box::new(controller_bus),
        EventSink::disabled(),
    );
    let (console, _input, _capture) = Console::piped();
    let ctx = Ctx {
        devices,
        console,
        state: SystemState::shared(&DaemonConfig::default()),
        events: EventSink::disabled(),
        i2c_loopback: None,
    };
    (ctx, controller)
}

/// Marks the session authenticated with the given role.
pub async fn sign_in(ctx: &Ctx, role: Role) {
    let mut state = ctx.state.write().await;
    state.active_user = Some(UserRecord {
        username: "tester".to_string(),
        first_name: "Test".to_string(),
        last_name: "Operator".to_string(),
        password: "secret".to_string(),
        role,
        marked: false,
        pending: PendingAction::None,
    });
    state.authenticated = true;
}
