use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Timer};

use super::STATE_CHANGED;
use crate::{logging, status};

/// Status is logged at least this often while the line is quiet.
const DIAGNOSTIC_PERIOD: Duration = Duration::from_secs(10);

/// Logs the published status on every state change and periodically.
#[embassy_executor::task]
pub async fn run() -> ! {
    loop {
        let woke = select(STATE_CHANGED.wait(), Timer::after(DIAGNOSTIC_PERIOD)).await;
        if let Either::First(state) = woke {
            defmt::debug!("diagnostics: woke on {}", defmt::Display2Format(&state));
        }
        logging::log_status(&status::snapshot());
    }
}
