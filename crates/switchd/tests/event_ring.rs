//! The circular event-log region.

mod common;

use common::fixture;
use switchd::event_log::{self, EventLogger};
use switch_types::{layout, EventCode};
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn ring_holds_four_hundred_records_and_wraps() {
    let fx = fixture();
    fx.ctx.state.write().await.log_flags = u32::MAX;

    let (_tx, rx) = event_log::channel();
    let mut logger = EventLogger::new(
        rx,
        fx.ctx.devices.clone(),
        fx.ctx.state.clone(),
        Instant::now(),
    );
    tokio::time::advance(std::time::Duration::from_millis(10)).await;

    // Alternate codes so the same-as-previous suppression never fires.
    let codes = [EventCode::UserLoggedIn, EventCode::UserLoggedOut];
    for index in 0..400usize {
        logger.handle(codes[index % 2]).await;
    }

    // The region is exactly full; the pointer wrapped back to the base.
    assert_eq!(fx.ctx.state.read().await.next_log_slot, layout::LOG_BASE);

    // The 401st record lands on the base offset.
    logger.handle(EventCode::EepromIoError).await;
    assert_eq!(
        fx.ctx.state.read().await.next_log_slot,
        layout::LOG_BASE + layout::LOG_RECORD_LEN
    );
    assert_eq!(
        fx.ctx.eeprom().read(layout::LOG_BASE + 4).await.unwrap(),
        EventCode::EepromIoError.as_u8()
    );

    // Four more writes: exactly 400 records stay resident.
    for index in 0..4usize {
        logger.handle(codes[index % 2]).await;
    }
    assert_eq!(
        fx.ctx.state.read().await.next_log_slot,
        layout::LOG_BASE + 5 * layout::LOG_RECORD_LEN
    );

    // The last un-overwritten slot still holds an original record.
    let tail = layout::LOG_BASE + 399 * layout::LOG_RECORD_LEN;
    assert_eq!(
        fx.ctx.eeprom().read(tail + 4).await.unwrap(),
        EventCode::UserLoggedOut.as_u8()
    );
}
