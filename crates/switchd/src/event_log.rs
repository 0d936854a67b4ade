//! The append-only circular event log.
//!
//! Writers push event codes onto a bounded queue without blocking; this task
//! drains one code per tick, filters it against the enable flags, drops
//! repeats of the immediately previous code, and appends a five-byte record
//! (big-endian tick count plus the code) to the circular EEPROM region.

use crate::devices::Devices;
use crate::state::SharedState;
use std::time::Duration;
use switch_types::{layout, EventCode};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Queue depth for pending event codes.
pub const QUEUE_DEPTH: usize = 10;

/// Interval between drain ticks.
const DRAIN_INTERVAL: Duration = Duration::from_millis(200);

/// Creates the logger queue.
pub fn channel() -> (mpsc::Sender<EventCode>, mpsc::Receiver<EventCode>) {
    mpsc::channel(QUEUE_DEPTH)
}

/// The event logger task.
pub struct EventLogger {
    rx: mpsc::Receiver<EventCode>,
    devices: Devices,
    state: SharedState,
    boot: Instant,
    last_code: Option<EventCode>,
}

impl EventLogger {
    pub fn new(
        rx: mpsc::Receiver<EventCode>,
        devices: Devices,
        state: SharedState,
        boot: Instant,
    ) -> Self {
        EventLogger {
            rx,
            devices,
            state,
            boot,
            last_code: None,
        }
    }

    /// Runs forever, draining one queued code per tick.
    pub async fn run(mut self) {
        let mut tick = tokio::time::interval(DRAIN_INTERVAL);
        loop {
            tick.tick().await;
            if let Ok(code) = self.rx.try_recv() {
                self.handle(code).await;
            }
        }
    }

    /// Processes a single dequeued code. Exposed so tests can step the task.
    pub async fn handle(&mut self, code: EventCode) {
        let (flags, slot) = {
            let state = self.state.read().await;
            (state.log_flags, state.next_log_slot)
        };
        if flags & code.flag_bit() == 0 {
            return;
        }
        if self.last_code == Some(code) {
            return;
        }

        let ticks = self.boot.elapsed().as_millis() as u32;
        let record = [
            (ticks >> 24) as u8,
            (ticks >> 16) as u8,
            (ticks >> 8) as u8,
            ticks as u8,
            code.as_u8(),
        ];
        if let Err(err) = self.devices.eeprom.bulk_write(slot, &record).await {
            warn!("log record write failed at 0x{slot:05X}: {err}");
            return;
        }
        debug!(code = %code, slot, "event logged");

        let mut next = slot + layout::LOG_RECORD_LEN;
        if next >= layout::LOG_END {
            next = layout::LOG_BASE;
        }
        self.state.write().await.next_log_slot = next;
        self.last_code = Some(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DaemonConfig;
    use crate::state::SystemState;
    use switch_hal::sim::{SimControllerBus, SimEepromBus};
    use switch_hal::EventSink;

    fn fixture() -> (EventLogger, SharedState, Devices) {
        let devices = Devices::new(
            Box::new(SimEepromBus::new()),
            Box::new(SimControllerBus::new()),
            EventSink::disabled(),
        );
        let state = SystemState::shared(&DaemonConfig::default());
        let (_tx, rx) = channel();
        let logger = EventLogger::new(rx, devices.clone(), state.clone(), Instant::now());
        (logger, state, devices)
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_type_is_discarded() {
        let (mut logger, state, devices) = fixture();
        logger.handle(EventCode::UserLoggedIn).await;
        assert_eq!(state.read().await.next_log_slot, layout::LOG_BASE);
        assert_eq!(devices.eeprom.read(layout::LOG_BASE + 4).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_layout_and_advance() {
        let (mut logger, state, devices) = fixture();
        state.write().await.log_flags = u32::MAX;

        logger.handle(EventCode::UserLoggedIn).await;
        assert_eq!(
            state.read().await.next_log_slot,
            layout::LOG_BASE + layout::LOG_RECORD_LEN
        );
        let code = devices.eeprom.read(layout::LOG_BASE + 4).await.unwrap();
        assert_eq!(code, EventCode::UserLoggedIn.as_u8());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_as_previous_suppressed() {
        let (mut logger, state, _devices) = fixture();
        state.write().await.log_flags = u32::MAX;

        logger.handle(EventCode::UserLoggedIn).await;
        logger.handle(EventCode::UserLoggedIn).await;
        assert_eq!(
            state.read().await.next_log_slot,
            layout::LOG_BASE + layout::LOG_RECORD_LEN
        );

        logger.handle(EventCode::UserLoggedOut).await;
        assert_eq!(
            state.read().await.next_log_slot,
            layout::LOG_BASE + 2 * layout::LOG_RECORD_LEN
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ring_wraps_at_region_end() {
        let (mut logger, state, _devices) = fixture();
        state.write().await.log_flags = u32::MAX;
        state.write().await.next_log_slot =
            layout::LOG_BASE + (layout::LOG_ENTRIES - 1) * layout::LOG_RECORD_LEN;

        logger.handle(EventCode::UserLoggedIn).await;
        assert_eq!(state.read().await.next_log_slot, layout::LOG_BASE);
    }
}
