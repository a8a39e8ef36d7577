use embassy_time::Timer;
use line_core::monitor::MonotonicClock;
use line_core::telemetry::EventId;

use super::{BoardMonitor, BoardTelemetry, STATE_CHANGED};
use crate::clock::{EmbassyClock, to_embassy};
use crate::{logging, status};

/// Samples the pair every interval and runs the conditioning sequence on pickup.
#[embassy_executor::task]
pub async fn run(mut monitor: BoardMonitor, mut telemetry: BoardTelemetry) -> ! {
    let clock = EmbassyClock;
    let interval = to_embassy(monitor.config().sample_interval);
    let mut logged: EventId = 0;

    monitor.warm_up(&mut telemetry, clock.now());
    flush(&telemetry, &mut logged);
    status::publish(&monitor.snapshot());

    loop {
        let report = monitor.cycle(&mut telemetry, clock.now());
        flush(&telemetry, &mut logged);
        status::publish(&monitor.snapshot());

        if report.changes_state() {
            STATE_CHANGED.signal(monitor.state());
        }

        Timer::after(interval).await;
    }
}

/// Mirrors records added since `logged` and advances it.
fn flush(telemetry: &BoardTelemetry, logged: &mut EventId) {
    for record in telemetry.since(*logged) {
        logging::log_record(record);
    }
    *logged = telemetry.next_event_id();
}
