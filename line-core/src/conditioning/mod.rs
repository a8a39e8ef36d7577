//! Conditioning-element wiring and strategy templates.
//!
//! The board carries three relay/indicator outputs. Which of them take part in
//! an actuation, and how long they hold, depends on the conditioning strategy
//! fitted to the line. Each strategy is an immutable
//! [`ConditioningTemplate`] so the sequencer can swap strategies without
//! knowing anything about the relays involved.

use core::fmt;
use core::time::Duration;

pub mod capacitor;
pub mod shunt;

pub use capacitor::{CAPACITOR_TEMPLATE, capacitor_template};
pub use shunt::{SHUNT_TEMPLATE, shunt_template};

/// Identifier for the binary outputs driven by the sequencer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActuatorId {
    /// Relay that places the shunt or capacitor across the pair.
    Conditioning,
    /// Relay that disconnects the line from the premises side.
    Isolation,
    /// "Actuation in progress" indicator LED.
    Busy,
}

impl ActuatorId {
    /// Deterministic index for lookups into [`ALL_ACTUATORS`].
    pub const fn as_index(self) -> usize {
        match self {
            ActuatorId::Conditioning => 0,
            ActuatorId::Isolation => 1,
            ActuatorId::Busy => 2,
        }
    }

    /// Attempts to construct an [`ActuatorId`] from a raw index.
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ActuatorId::Conditioning),
            1 => Some(ActuatorId::Isolation),
            2 => Some(ActuatorId::Busy),
            _ => None,
        }
    }
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(actuator_by_id(*self).name)
    }
}

/// Logic sense of a relay driver input.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActuatorPolarity {
    ActiveHigh,
    ActiveLow,
}

/// Electrical level on an MCU pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PinLevel {
    High,
    Low,
}

/// Logical action applied to an output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActuatorAction {
    Engage,
    Release,
}

/// Metadata describing how an output is wired on the board.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ActuatorLine {
    pub id: ActuatorId,
    pub name: &'static str,
    pub mcu_pin: &'static str,
    pub driver_output: &'static str,
    pub polarity: ActuatorPolarity,
}

impl ActuatorLine {
    pub const fn new(
        id: ActuatorId,
        name: &'static str,
        mcu_pin: &'static str,
        driver_output: &'static str,
        polarity: ActuatorPolarity,
    ) -> Self {
        Self {
            id,
            name,
            mcu_pin,
            driver_output,
            polarity,
        }
    }

    /// Pin level that realises `action` on this line.
    pub const fn level_for(&self, action: ActuatorAction) -> PinLevel {
        match (self.polarity, action) {
            (ActuatorPolarity::ActiveHigh, ActuatorAction::Engage)
            | (ActuatorPolarity::ActiveLow, ActuatorAction::Release) => PinLevel::High,
            (ActuatorPolarity::ActiveHigh, ActuatorAction::Release)
            | (ActuatorPolarity::ActiveLow, ActuatorAction::Engage) => PinLevel::Low,
        }
    }

    /// Pin level while the line is released.
    pub const fn idle_level(&self) -> PinLevel {
        self.level_for(ActuatorAction::Release)
    }
}

/// Compile-time catalog of every output.
///
/// The isolation relay driver is wired "disconnect when low": its input has a
/// pull-up so the line stays connected while the MCU is in reset.
pub const ALL_ACTUATORS: [ActuatorLine; 3] = [
    ActuatorLine::new(
        ActuatorId::Conditioning,
        "COND",
        "PB4",
        "ULN2003-1C",
        ActuatorPolarity::ActiveHigh,
    ),
    ActuatorLine::new(
        ActuatorId::Isolation,
        "LINE-DISC*",
        "PB5",
        "SN74LVC07-1Y",
        ActuatorPolarity::ActiveLow,
    ),
    ActuatorLine::new(
        ActuatorId::Busy,
        "BUSY",
        "PA5",
        "LED1",
        ActuatorPolarity::ActiveHigh,
    ),
];

/// Retrieve output metadata by identifier.
pub const fn actuator_by_id(id: ActuatorId) -> ActuatorLine {
    ALL_ACTUATORS[id.as_index()]
}

/// One output change applied while engaging or releasing the element.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ConditioningStep {
    pub line: ActuatorId,
    pub action: ActuatorAction,
}

impl ConditioningStep {
    pub const fn new(line: ActuatorId, action: ActuatorAction) -> Self {
        Self { line, action }
    }

    /// Returns the output metadata associated with this step.
    pub const fn actuator(&self) -> ActuatorLine {
        actuator_by_id(self.line)
    }
}

/// Range a configured dwell override must fall within.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DwellWindow {
    pub min: Duration,
    pub max: Duration,
}

impl DwellWindow {
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Validate that a dwell sits within the window, bounds included.
    pub fn allows(&self, dwell: Duration) -> bool {
        dwell >= self.min && dwell <= self.max
    }
}

/// Closed set of conditioning strategies.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConditioningStrategy {
    /// Disconnect the premises side and shunt the pair.
    ShuntIsolate,
    /// Parallel a capacitor across the pair.
    ParallelCapacitor,
}

impl fmt::Display for ConditioningStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConditioningStrategy::ShuntIsolate => "shunt",
            ConditioningStrategy::ParallelCapacitor => "capacitor",
        })
    }
}

impl ConditioningStrategy {
    /// Parses the labels produced by the `Display` impl.
    pub fn from_tag(tag: &str) -> Option<Self> {
        if tag.eq_ignore_ascii_case("shunt") {
            Some(ConditioningStrategy::ShuntIsolate)
        } else if tag.eq_ignore_ascii_case("capacitor") {
            Some(ConditioningStrategy::ParallelCapacitor)
        } else {
            None
        }
    }

    /// Template implementing this strategy.
    pub const fn template(self) -> ConditioningTemplate {
        match self {
            ConditioningStrategy::ShuntIsolate => SHUNT_TEMPLATE,
            ConditioningStrategy::ParallelCapacitor => CAPACITOR_TEMPLATE,
        }
    }
}

/// Immutable description of one conditioning strategy.
///
/// The dwell and the element are tuned together: changing one without the
/// other lets the injected signal through.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ConditioningTemplate {
    pub strategy: ConditioningStrategy,
    pub engage: &'static [ConditioningStep],
    pub release: &'static [ConditioningStep],
    pub dwell: Duration,
    pub dwell_window: DwellWindow,
}

impl ConditioningTemplate {
    pub const fn new(
        strategy: ConditioningStrategy,
        engage: &'static [ConditioningStep],
        release: &'static [ConditioningStep],
        dwell: Duration,
        dwell_window: DwellWindow,
    ) -> Self {
        Self {
            strategy,
            engage,
            release,
            dwell,
            dwell_window,
        }
    }

    /// Steps applied, in order, before the dwell.
    pub const fn engage_steps(&self) -> &'static [ConditioningStep] {
        self.engage
    }

    /// Steps applied, in order, after the dwell.
    pub const fn release_steps(&self) -> &'static [ConditioningStep] {
        self.release
    }

    /// Total number of output changes, excluding the busy indicator.
    pub fn step_count(&self) -> usize {
        self.engage.len() + self.release.len()
    }

    /// Default dwell for this strategy.
    pub fn dwell_duration(&self) -> Duration {
        self.dwell
    }

    /// Returns `true` when `line` takes part in this strategy.
    pub fn uses(&self, line: ActuatorId) -> bool {
        self.engage.iter().any(|step| step.line == line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actuator_lookup_returns_expected_metadata() {
        let isolation = actuator_by_id(ActuatorId::Isolation);
        assert_eq!(isolation.name, "LINE-DISC*");
        assert_eq!(isolation.mcu_pin, "PB5");
        assert_eq!(isolation.polarity, ActuatorPolarity::ActiveLow);
        assert_eq!(ActuatorId::from_index(2), Some(ActuatorId::Busy));
        assert_eq!(ActuatorId::from_index(3), None);
    }

    #[test]
    fn polarity_maps_actions_to_levels() {
        let conditioning = actuator_by_id(ActuatorId::Conditioning);
        assert_eq!(conditioning.level_for(ActuatorAction::Engage), PinLevel::High);
        assert_eq!(conditioning.idle_level(), PinLevel::Low);

        let isolation = actuator_by_id(ActuatorId::Isolation);
        assert_eq!(isolation.level_for(ActuatorAction::Engage), PinLevel::Low);
        assert_eq!(isolation.idle_level(), PinLevel::High);
    }

    #[test]
    fn dwell_window_bounds_are_inclusive() {
        let window = DwellWindow::new(Duration::from_millis(100), Duration::from_millis(250));
        assert!(window.allows(Duration::from_millis(100)));
        assert!(window.allows(Duration::from_millis(250)));
        assert!(!window.allows(Duration::from_millis(99)));
        assert!(!window.allows(Duration::from_millis(251)));
    }

    #[test]
    fn strategy_tags_select_templates() {
        let shunt = ConditioningStrategy::from_tag("SHUNT").expect("shunt tag");
        assert_eq!(shunt.template(), SHUNT_TEMPLATE);
        let capacitor = ConditioningStrategy::from_tag("capacitor").expect("capacitor tag");
        assert_eq!(capacitor.template(), CAPACITOR_TEMPLATE);
        assert_eq!(ConditioningStrategy::from_tag("resistor"), None);
    }

    #[test]
    fn no_template_drives_the_busy_indicator() {
        for template in [SHUNT_TEMPLATE, CAPACITOR_TEMPLATE] {
            assert!(!template.uses(ActuatorId::Busy));
            assert!(template.uses(ActuatorId::Conditioning));
        }
    }
}
