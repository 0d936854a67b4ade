//! Device handles and the execution context handed to command handlers.

use crate::console::Console;
use crate::state::SharedState;
use std::sync::Arc;
use switch_hal::{Eeprom, EventSink, SpiBus, SwitchController};

/// EEPROM driver over any bus implementation.
pub type DynEeprom = Eeprom<Box<dyn SpiBus>>;

/// Controller driver over any bus implementation.
pub type DynController = SwitchController<Box<dyn SpiBus>>;

/// The two board devices, shared by every task.
#[derive(Clone)]
pub struct Devices {
    pub eeprom: Arc<DynEeprom>,
    pub controller: Arc<DynController>,
}

impl Devices {
    /// Wraps the two buses in their drivers, wiring both to the event log.
    pub fn new(
        eeprom_bus: Box<dyn SpiBus>,
        controller_bus: Box<dyn SpiBus>,
        events: EventSink,
    ) -> Self {
        Devices {
            eeprom: Arc::new(Eeprom::new(eeprom_bus, events.clone())),
            controller: Arc::new(SwitchController::new(controller_bus, events)),
        }
    }
}

/// Execution context for command handlers on both transports.
#[derive(Clone)]
pub struct Ctx {
    pub devices: Devices,
    pub console: Arc<Console>,
    pub state: SharedState,
    pub events: EventSink,
    /// Event feed into the local I²C slave, when the loopback path is wired.
    pub i2c_loopback: Option<tokio::sync::mpsc::Sender<crate::i2c::SlaveEvent>>,
}

impl Ctx {
    pub fn eeprom(&self) -> &DynEeprom {
        &self.devices.eeprom
    }

    pub fn controller(&self) -> &DynController {
        &self.devices.controller
    }
}
