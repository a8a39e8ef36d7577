//! Shunt strategy: isolate the premises side, then shunt the pair.
//!
//! The isolation relay opens first so the shunt never loads a handset that is
//! still connected, and it closes last for the same reason. The 600 ms dwell
//! was tuned against the resistive shunt on the current line.

use core::time::Duration;

use super::{
    ActuatorAction, ActuatorId, ConditioningStep, ConditioningStrategy, ConditioningTemplate,
    DwellWindow,
};

/// Time the shunt stays across the pair.
pub const SHUNT_DWELL: Duration = Duration::from_millis(600);
/// Shortest dwell override accepted for the shunt.
pub const SHUNT_DWELL_MIN: Duration = Duration::from_millis(300);
/// Longest dwell override accepted for the shunt.
pub const SHUNT_DWELL_MAX: Duration = Duration::from_millis(1_000);

/// Output changes applied before the dwell.
pub const SHUNT_ENGAGE_STEPS: [ConditioningStep; 2] = [
    ConditioningStep::new(ActuatorId::Isolation, ActuatorAction::Engage),
    ConditioningStep::new(ActuatorId::Conditioning, ActuatorAction::Engage),
];

/// Output changes applied after the dwell.
pub const SHUNT_RELEASE_STEPS: [ConditioningStep; 2] = [
    ConditioningStep::new(ActuatorId::Conditioning, ActuatorAction::Release),
    ConditioningStep::new(ActuatorId::Isolation, ActuatorAction::Release),
];

/// Template describing the shunt strategy.
pub const SHUNT_TEMPLATE: ConditioningTemplate = ConditioningTemplate::new(
    ConditioningStrategy::ShuntIsolate,
    &SHUNT_ENGAGE_STEPS,
    &SHUNT_RELEASE_STEPS,
    SHUNT_DWELL,
    DwellWindow::new(SHUNT_DWELL_MIN, SHUNT_DWELL_MAX),
);

/// Returns the shunt template.
#[must_use]
pub const fn shunt_template() -> ConditioningTemplate {
    SHUNT_TEMPLATE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shunt_isolates_before_shunting_and_reconnects_last() {
        assert_eq!(SHUNT_TEMPLATE.strategy, ConditioningStrategy::ShuntIsolate);
        assert_eq!(SHUNT_TEMPLATE.step_count(), 4);

        let engage = SHUNT_TEMPLATE.engage_steps();
        assert_eq!(engage[0].line, ActuatorId::Isolation);
        assert_eq!(engage[0].action, ActuatorAction::Engage);
        assert_eq!(engage[1].line, ActuatorId::Conditioning);

        let release = SHUNT_TEMPLATE.release_steps();
        assert_eq!(release[0].line, ActuatorId::Conditioning);
        assert_eq!(release[0].action, ActuatorAction::Release);
        assert_eq!(release[1].line, ActuatorId::Isolation);

        assert_eq!(SHUNT_TEMPLATE.dwell_duration(), SHUNT_DWELL);
        assert!(SHUNT_TEMPLATE.dwell_window.allows(SHUNT_DWELL));
    }
}
