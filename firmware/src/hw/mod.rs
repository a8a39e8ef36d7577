//! Embassy STM32 drivers behind the `line-core` traits.
//!
//! Tip and ring are read from two ADC1 channels in one blocking call each, and
//! the three outputs are push-pull GPIOs whose levels come from the actuator
//! catalog.

use core::time::Duration;

use embassy_stm32::adc::{Adc, AnyAdcChannel, SampleTime};
use embassy_stm32::gpio::{Level, Output};
use embassy_stm32::peripherals::ADC1;
use line_core::conditioning::{ALL_ACTUATORS, ActuatorAction, ActuatorId, PinLevel, actuator_by_id};
use line_core::history::ConductorId;
use line_core::monitor::SampleSource;
use line_core::sequencer::{ActuatorDriver, BlockingDelay};

use crate::clock::to_embassy;

/// Converts a catalog level into the HAL representation.
pub const fn hal_level(level: PinLevel) -> Level {
    match level {
        PinLevel::High => Level::High,
        PinLevel::Low => Level::Low,
    }
}

/// ADC1 with the tip and ring channels attached.
pub struct LineAdc<'d> {
    adc: Adc<'d, ADC1>,
    tip: AnyAdcChannel<ADC1>,
    ring: AnyAdcChannel<ADC1>,
}

impl<'d> LineAdc<'d> {
    pub fn new(mut adc: Adc<'d, ADC1>, tip: AnyAdcChannel<ADC1>, ring: AnyAdcChannel<ADC1>) -> Self {
        adc.set_sample_time(SampleTime::CYCLES39_5);
        Self { adc, tip, ring }
    }
}

impl SampleSource for LineAdc<'_> {
    fn read(&mut self, conductor: ConductorId) -> u16 {
        match conductor {
            ConductorId::Tip => self.adc.blocking_read(&mut self.tip),
            ConductorId::Ring => self.adc.blocking_read(&mut self.ring),
        }
    }
}

/// Relay and LED outputs indexed by [`ActuatorId::as_index`].
pub struct RelayBank<'d> {
    outputs: [Output<'d>; ALL_ACTUATORS.len()],
}

impl<'d> RelayBank<'d> {
    /// Wraps outputs created at their idle levels, in catalog order.
    pub fn new(conditioning: Output<'d>, isolation: Output<'d>, busy: Output<'d>) -> Self {
        Self {
            outputs: [conditioning, isolation, busy],
        }
    }

    fn output(&mut self, line: ActuatorId) -> &mut Output<'d> {
        &mut self.outputs[line.as_index()]
    }
}

impl ActuatorDriver for RelayBank<'_> {
    fn apply(&mut self, line: ActuatorId, action: ActuatorAction) {
        let level = actuator_by_id(line).level_for(action);
        self.output(line).set_level(hal_level(level));
    }

    fn release_all(&mut self) {
        for line in ALL_ACTUATORS {
            self.output(line.id).set_level(hal_level(line.idle_level()));
        }
    }
}

/// Busy-waits on the Embassy time driver.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbassyDelay;

impl BlockingDelay for EmbassyDelay {
    fn delay(&mut self, duration: Duration) {
        embassy_time::block_for(to_embassy(duration));
    }
}
