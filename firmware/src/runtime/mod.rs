use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::gpio::{Output, Speed};
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::signal::Signal;
use line_core::classifier::LineState;
use line_core::conditioning::{ActuatorId, ConditioningStrategy, actuator_by_id};
use line_core::config::MonitorConfig;
use line_core::monitor::LineMonitor;
use line_core::telemetry::TelemetryRecorder;

use crate::clock::FirmwareInstant;
use crate::hw::{EmbassyDelay, LineAdc, RelayBank, hal_level};
use crate::logging;

mod diagnostics_task;
mod monitor_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

#[cfg(feature = "capacitor")]
const STRATEGY: ConditioningStrategy = ConditioningStrategy::ParallelCapacitor;
#[cfg(not(feature = "capacitor"))]
const STRATEGY: ConditioningStrategy = ConditioningStrategy::ShuntIsolate;

/// Build-time monitor configuration.
pub(super) const CONFIG: MonitorConfig = MonitorConfig::DEFAULT.with_strategy(STRATEGY);

/// Monitor bound to the board drivers.
pub(super) type BoardMonitor =
    LineMonitor<LineAdc<'static>, RelayBank<'static>, EmbassyDelay, FirmwareInstant>;

/// Telemetry ring owned by the monitor task.
pub(super) type BoardTelemetry = TelemetryRecorder<FirmwareInstant>;

/// Raised by the monitor task whenever the decided state changes.
pub(super) static STATE_CHANGED: Signal<ThreadModeRawMutex, LineState> = Signal::new();

fn idle_output<'d>(pin: hal::Peri<'d, impl hal::gpio::Pin>, line: ActuatorId) -> Output<'d> {
    let level = hal_level(actuator_by_id(line).idle_level());
    Output::new(pin, level, Speed::Low)
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        ADC1, PA0, PA1, PA5, PB4, PB5, ..
    } = hal::init(config);

    let adc = LineAdc::new(Adc::new(ADC1), PA0.degrade_adc(), PA1.degrade_adc());
    let relays = RelayBank::new(
        idle_output(PB4, ActuatorId::Conditioning),
        idle_output(PB5, ActuatorId::Isolation),
        idle_output(PA5, ActuatorId::Busy),
    );

    let monitor = match BoardMonitor::with_components(CONFIG, adc, relays, EmbassyDelay) {
        Ok(monitor) => monitor,
        Err(error) => {
            logging::log_config_error(&error);
            loop {
                core::future::pending::<()>().await;
            }
        }
    };

    spawner
        .spawn(monitor_task::run(monitor, BoardTelemetry::new()))
        .expect("failed to spawn monitor task");

    spawner
        .spawn(diagnostics_task::run())
        .expect("failed to spawn diagnostics task");

    core::future::pending::<()>().await;
}
