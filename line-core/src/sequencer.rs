//! Transition detection and the timed actuation sequence.
//!
//! The sequencer reacts to exactly one edge, on-hook to off-hook. When it
//! fires it lights the busy indicator, applies the strategy's engage steps,
//! holds them for the dwell, applies the release steps and turns the indicator
//! back off. The hold either blocks through [`BlockingDelay`] or is tracked as
//! a deadline that later cycles poll.

use core::{fmt, time::Duration};

use crate::classifier::LineState;
use crate::conditioning::{
    ALL_ACTUATORS, ActuatorAction, ActuatorId, ConditioningStep, ConditioningStrategy,
    ConditioningTemplate,
};
use crate::telemetry::{MonotonicInstant, TelemetryRecorder};

/// Abstraction over the physical relay and indicator outputs.
pub trait ActuatorDriver {
    /// Applies the requested action to one output.
    fn apply(&mut self, line: ActuatorId, action: ActuatorAction);

    /// Returns every output to its released level.
    fn release_all(&mut self);
}

/// Actuator driver that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopActuatorDriver;

impl NoopActuatorDriver {
    /// Creates a new no-op driver.
    pub const fn new() -> Self {
        Self
    }
}

impl ActuatorDriver for NoopActuatorDriver {
    fn apply(&mut self, _: ActuatorId, _: ActuatorAction) {}

    fn release_all(&mut self) {}
}

/// Busy-wait used for the inter-sample sleep and the blocking dwell.
pub trait BlockingDelay {
    fn delay(&mut self, duration: Duration);
}

/// Delay that returns immediately. Useful with [`ActuationMode::Deadline`].
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopDelay;

impl BlockingDelay for NoopDelay {
    fn delay(&mut self, _: Duration) {}
}

/// Returns `true` only for the on-hook to off-hook edge.
pub const fn is_trigger_edge(previous: LineState, next: LineState) -> bool {
    matches!((previous, next), (LineState::OnHook, LineState::OffHook))
}

/// How the dwell between engage and release is spent.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum ActuationMode {
    /// The cycle blocks for the whole dwell.
    #[default]
    Blocking,
    /// The cycle records a deadline and returns; later cycles release.
    Deadline,
}

/// Sequencer lifecycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequencerState<I> {
    Idle,
    Engaged { started_at: I, deadline: I },
}

/// Summary of one finished actuation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ActuationReport<I> {
    pub strategy: ConditioningStrategy,
    pub started_at: I,
    pub released_at: I,
    pub dwell: Duration,
    pub steps: usize,
}

/// Reasons an actuation could not start.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActuationError<I> {
    /// An earlier actuation still holds the element until `deadline`.
    AlreadyEngaged { deadline: I },
}

impl<I> fmt::Display for ActuationError<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuationError::AlreadyEngaged { .. } => f.write_str("conditioning already engaged"),
        }
    }
}

/// Runs the configured conditioning template.
#[derive(Clone, Debug)]
pub struct Sequencer<I> {
    template: ConditioningTemplate,
    dwell: Duration,
    state: SequencerState<I>,
    completed: u32,
    levels: [ActuatorAction; ALL_ACTUATORS.len()],
}

impl<I> Sequencer<I>
where
    I: MonotonicInstant,
{
    /// Creates an idle sequencer holding every output released.
    pub const fn new(template: ConditioningTemplate, dwell: Duration) -> Self {
        Self {
            template,
            dwell,
            state: SequencerState::Idle,
            completed: 0,
            levels: [ActuatorAction::Release; ALL_ACTUATORS.len()],
        }
    }

    pub const fn template(&self) -> &ConditioningTemplate {
        &self.template
    }

    pub const fn dwell(&self) -> Duration {
        self.dwell
    }

    pub const fn state(&self) -> SequencerState<I> {
        self.state
    }

    /// Number of actuations that ran to release.
    pub const fn completed(&self) -> u32 {
        self.completed
    }

    pub const fn is_engaged(&self) -> bool {
        matches!(self.state, SequencerState::Engaged { .. })
    }

    /// Release deadline of the pending actuation.
    pub const fn deadline(&self) -> Option<I> {
        match self.state {
            SequencerState::Engaged { deadline, .. } => Some(deadline),
            SequencerState::Idle => None,
        }
    }

    /// Last action applied to `line`.
    pub const fn level(&self, line: ActuatorId) -> ActuatorAction {
        self.levels[line.as_index()]
    }

    /// Runs the whole sequence, blocking for the dwell.
    ///
    /// Release steps are stamped `now + dwell`, the instant the delay returns.
    pub fn run_blocking<D, B, const CAP: usize>(
        &mut self,
        driver: &mut D,
        delay: &mut B,
        telemetry: &mut TelemetryRecorder<I, CAP>,
        now: I,
    ) -> Result<ActuationReport<I>, ActuationError<I>>
    where
        D: ActuatorDriver,
        B: BlockingDelay,
    {
        self.begin(driver, telemetry, now)?;
        delay.delay(self.dwell);
        let released_at = now + self.dwell;
        Ok(self.release(driver, telemetry, now, released_at))
    }

    /// Engages the element and returns the release deadline.
    pub fn begin<D, const CAP: usize>(
        &mut self,
        driver: &mut D,
        telemetry: &mut TelemetryRecorder<I, CAP>,
        now: I,
    ) -> Result<I, ActuationError<I>>
    where
        D: ActuatorDriver,
    {
        if let SequencerState::Engaged { deadline, .. } = self.state {
            return Err(ActuationError::AlreadyEngaged { deadline });
        }

        telemetry.record_sequence_started(
            self.template.strategy,
            self.dwell,
            self.template.step_count(),
            now,
        );
        self.drive(driver, telemetry, ActuatorId::Busy, ActuatorAction::Engage, now);
        self.apply_steps(driver, telemetry, self.template.engage_steps(), now);

        let deadline = now + self.dwell;
        self.state = SequencerState::Engaged {
            started_at: now,
            deadline,
        };
        Ok(deadline)
    }

    /// Releases the element once `now` has reached the deadline.
    pub fn poll<D, const CAP: usize>(
        &mut self,
        driver: &mut D,
        telemetry: &mut TelemetryRecorder<I, CAP>,
        now: I,
    ) -> Option<ActuationReport<I>>
    where
        D: ActuatorDriver,
    {
        match self.state {
            SequencerState::Engaged {
                started_at,
                deadline,
            } if now >= deadline => Some(self.release(driver, telemetry, started_at, now)),
            _ => None,
        }
    }

    /// Applies a single output change outside of a sequence.
    pub fn drive<D, const CAP: usize>(
        &mut self,
        driver: &mut D,
        telemetry: &mut TelemetryRecorder<I, CAP>,
        line: ActuatorId,
        action: ActuatorAction,
        now: I,
    ) where
        D: ActuatorDriver,
    {
        driver.apply(line, action);
        self.levels[line.as_index()] = action;
        telemetry.record_actuator_drive(line, action, now);
    }

    /// Drops every output to its released level and forgets a pending release.
    pub fn abort<D>(&mut self, driver: &mut D)
    where
        D: ActuatorDriver,
    {
        driver.release_all();
        self.levels = [ActuatorAction::Release; ALL_ACTUATORS.len()];
        self.state = SequencerState::Idle;
    }

    fn release<D, const CAP: usize>(
        &mut self,
        driver: &mut D,
        telemetry: &mut TelemetryRecorder<I, CAP>,
        started_at: I,
        released_at: I,
    ) -> ActuationReport<I>
    where
        D: ActuatorDriver,
    {
        self.apply_steps(driver, telemetry, self.template.release_steps(), released_at);
        self.drive(
            driver,
            telemetry,
            ActuatorId::Busy,
            ActuatorAction::Release,
            released_at,
        );

        self.state = SequencerState::Idle;
        self.completed = self.completed.saturating_add(1);
        telemetry.record_sequence_completion(
            self.template.strategy,
            self.dwell,
            self.template.step_count(),
            started_at,
            released_at,
        );

        ActuationReport {
            strategy: self.template.strategy,
            started_at,
            released_at,
            dwell: self.dwell,
            steps: self.template.step_count(),
        }
    }

    fn apply_steps<D, const CAP: usize>(
        &mut self,
        driver: &mut D,
        telemetry: &mut TelemetryRecorder<I, CAP>,
        steps: &[ConditioningStep],
        now: I,
    ) where
        D: ActuatorDriver,
    {
        for step in steps {
            self.drive(driver, telemetry, step.line, step.action, now);
        }
    }
}
