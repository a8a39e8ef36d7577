//! Capacitor strategy: parallel a capacitor across the pair.
//!
//! The premises side stays connected throughout. The capacitor needs a longer
//! hold than the shunt to soak up the injected signal, hence 750 ms.

use core::time::Duration;

use super::{
    ActuatorAction, ActuatorId, ConditioningStep, ConditioningStrategy, ConditioningTemplate,
    DwellWindow,
};

/// Time the capacitor stays across the pair.
pub const CAPACITOR_DWELL: Duration = Duration::from_millis(750);
/// Shortest dwell override accepted for the capacitor.
pub const CAPACITOR_DWELL_MIN: Duration = Duration::from_millis(400);
/// Longest dwell override accepted for the capacitor.
pub const CAPACITOR_DWELL_MAX: Duration = Duration::from_millis(1_500);

const CAPACITOR_ENGAGE_STEP: ConditioningStep =
    ConditioningStep::new(ActuatorId::Conditioning, ActuatorAction::Engage);

const CAPACITOR_RELEASE_STEP: ConditioningStep =
    ConditioningStep::new(ActuatorId::Conditioning, ActuatorAction::Release);

/// Output changes applied before the dwell.
pub const CAPACITOR_ENGAGE_STEPS: [ConditioningStep; 1] = [CAPACITOR_ENGAGE_STEP];

/// Output changes applied after the dwell.
pub const CAPACITOR_RELEASE_STEPS: [ConditioningStep; 1] = [CAPACITOR_RELEASE_STEP];

/// Template describing the capacitor strategy.
pub const CAPACITOR_TEMPLATE: ConditioningTemplate = ConditioningTemplate::new(
    ConditioningStrategy::ParallelCapacitor,
    &CAPACITOR_ENGAGE_STEPS,
    &CAPACITOR_RELEASE_STEPS,
    CAPACITOR_DWELL,
    DwellWindow::new(CAPACITOR_DWELL_MIN, CAPACITOR_DWELL_MAX),
);

/// Returns the capacitor template.
pub const fn capacitor_template() -> ConditioningTemplate {
    CAPACITOR_TEMPLATE
}
