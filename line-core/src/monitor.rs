//! The sampling loop context.
//!
//! [`LineMonitor`] owns everything one monitored line needs: the sample
//! source, the actuator driver, the blocking delay, both conductor histories,
//! the decided line state and the sequencer. Each [`cycle`](LineMonitor::cycle)
//! acquires one aligned tip/ring pair, classifies the newest window once the
//! histories are warm, and fires the conditioning sequence on the
//! on-hook to off-hook edge.

use crate::classifier::LineState;
use crate::conditioning::{ALL_ACTUATORS, ActuatorAction, ActuatorId};
use crate::config::{ConfigError, HISTORY_CAPACITY, MonitorConfig};
use crate::history::{ConductorId, LinePair, SamplePair};
use crate::sequencer::{
    ActuationError, ActuationMode, ActuationReport, ActuatorDriver, BlockingDelay, Sequencer,
    is_trigger_edge,
};
use crate::status::{ActuatorSample, StatusSnapshot};
use crate::telemetry::{MonotonicInstant, TelemetryRecorder};

/// Source of raw ADC codes.
pub trait SampleSource {
    /// Performs one conversion on the channel wired to `conductor`.
    fn read(&mut self, conductor: ConductorId) -> u16;
}

/// Monotonic time source used by the free-running loops.
pub trait MonotonicClock {
    type Instant: MonotonicInstant;

    fn now(&self) -> Self::Instant;
}

/// What one call to [`LineMonitor::cycle`] did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CycleReport<I> {
    /// A pair was recorded but the histories are not full yet.
    WarmingUp { filled: usize },
    /// The decided state did not change.
    Unchanged(LineState),
    /// The decided state changed without triggering an actuation.
    Changed { from: LineState, to: LineState },
    /// The pickup edge ran a blocking actuation to completion.
    Actuated(ActuationReport<I>),
    /// The pickup edge engaged the element until `deadline`.
    Engaged { deadline: I },
    /// Sampling skipped while the element is held.
    Dwelling { deadline: I },
    /// A deadline-mode actuation was released.
    Released(ActuationReport<I>),
}

impl<I> CycleReport<I> {
    /// Returns `true` when this cycle moved the decided state, including the
    /// pickup edge that also started an actuation.
    pub const fn changes_state(&self) -> bool {
        matches!(
            self,
            CycleReport::Changed { .. } | CycleReport::Actuated(_) | CycleReport::Engaged { .. }
        )
    }
}

/// Result of a manual engagement from the test console.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Engagement<I> {
    Completed(ActuationReport<I>),
    Pending { deadline: I },
}

/// Counters accumulated by [`LineMonitor::run_cycles`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RunSummary {
    pub cycles: u32,
    pub transitions: u32,
    pub actuations: u32,
}

impl RunSummary {
    fn absorb<I>(&mut self, report: &CycleReport<I>) {
        self.cycles += 1;
        match report {
            CycleReport::Changed { .. } => self.transitions += 1,
            CycleReport::Actuated(_) => {
                self.transitions += 1;
                self.actuations += 1;
            }
            CycleReport::Engaged { .. } => self.transitions += 1,
            CycleReport::Released(_) => self.actuations += 1,
            CycleReport::WarmingUp { .. }
            | CycleReport::Unchanged(_)
            | CycleReport::Dwelling { .. } => {}
        }
    }
}

/// Context object for one monitored line.
pub struct LineMonitor<S, D, B, I, const C: usize = HISTORY_CAPACITY> {
    config: MonitorConfig,
    source: S,
    driver: D,
    delay: B,
    pair: LinePair<C>,
    state: LineState,
    sequencer: Sequencer<I>,
    warm_reported: bool,
}

impl<S, D, B, I, const C: usize> LineMonitor<S, D, B, I, C>
where
    S: SampleSource,
    D: ActuatorDriver,
    B: BlockingDelay,
    I: MonotonicInstant,
{
    /// Validates `config` and releases every output.
    pub fn with_components(
        config: MonitorConfig,
        source: S,
        mut driver: D,
        delay: B,
    ) -> Result<Self, ConfigError> {
        config.validate(C)?;
        driver.release_all();

        Ok(Self {
            sequencer: Sequencer::new(config.template(), config.dwell()),
            config,
            source,
            driver,
            delay,
            pair: LinePair::new(),
            state: LineState::OnHook,
            warm_reported: false,
        })
    }

    /// Reads tip then ring back to back and records both.
    pub fn acquire(&mut self) -> SamplePair {
        let tip = self.source.read(ConductorId::Tip);
        let ring = self.source.read(ConductorId::Ring);
        self.pair.record(tip, ring, &self.config.scaling)
    }

    /// Fills both histories without classifying. Returns the pairs acquired.
    pub fn warm_up<const CAP: usize>(
        &mut self,
        telemetry: &mut TelemetryRecorder<I, CAP>,
        now: I,
    ) -> usize {
        let mut acquired = 0;
        while !self.pair.is_warm() {
            self.acquire();
            acquired += 1;
            if !self.pair.is_warm() {
                self.delay.delay(self.config.sample_interval);
            }
        }
        self.report_warm(telemetry, now);
        acquired
    }

    /// Runs one scheduler cycle.
    pub fn cycle<const CAP: usize>(
        &mut self,
        telemetry: &mut TelemetryRecorder<I, CAP>,
        now: I,
    ) -> CycleReport<I> {
        if let Some(deadline) = self.sequencer.deadline() {
            return match self.sequencer.poll(&mut self.driver, telemetry, now) {
                Some(report) => CycleReport::Released(report),
                None => CycleReport::Dwelling { deadline },
            };
        }

        let sample = self.acquire();
        if !self.pair.is_warm() {
            return CycleReport::WarmingUp {
                filled: self.pair.len(),
            };
        }
        self.report_warm(telemetry, now);

        let previous = self.state;
        let next = self
            .config
            .classifier
            .classify_history(&self.pair)
            .resolve(previous);
        if next == previous {
            return CycleReport::Unchanged(next);
        }

        telemetry.record_state_change(previous, next, sample, now);
        self.state = next;

        if !is_trigger_edge(previous, next) {
            return CycleReport::Changed {
                from: previous,
                to: next,
            };
        }

        match self.actuate(telemetry, now) {
            Ok(Engagement::Completed(report)) => CycleReport::Actuated(report),
            Ok(Engagement::Pending { deadline })
            | Err(ActuationError::AlreadyEngaged { deadline }) => {
                CycleReport::Engaged { deadline }
            }
        }
    }

    /// Runs `count` cycles, sleeping the sample interval after each one.
    pub fn run_cycles<K, const CAP: usize>(
        &mut self,
        count: u32,
        telemetry: &mut TelemetryRecorder<I, CAP>,
        clock: &K,
    ) -> RunSummary
    where
        K: MonotonicClock<Instant = I>,
    {
        let mut summary = RunSummary::default();
        for _ in 0..count {
            let report = self.cycle(telemetry, clock.now());
            summary.absorb(&report);
            self.delay.delay(self.config.sample_interval);
        }
        summary
    }

    /// Free-running loop for targets without an async executor.
    pub fn run<K, const CAP: usize>(
        &mut self,
        telemetry: &mut TelemetryRecorder<I, CAP>,
        clock: &K,
    ) -> !
    where
        K: MonotonicClock<Instant = I>,
    {
        loop {
            self.cycle(telemetry, clock.now());
            self.delay.delay(self.config.sample_interval);
        }
    }

    /// Runs the configured sequence without touching the decided state.
    pub fn engage_manual<const CAP: usize>(
        &mut self,
        telemetry: &mut TelemetryRecorder<I, CAP>,
        now: I,
    ) -> Result<Engagement<I>, ActuationError<I>> {
        self.actuate(telemetry, now)
    }

    /// Drives one output by hand. Refused while a sequence holds the element.
    pub fn drive_manual<const CAP: usize>(
        &mut self,
        telemetry: &mut TelemetryRecorder<I, CAP>,
        line: ActuatorId,
        action: ActuatorAction,
        now: I,
    ) -> Result<(), ActuationError<I>> {
        if let Some(deadline) = self.sequencer.deadline() {
            return Err(ActuationError::AlreadyEngaged { deadline });
        }
        self.sequencer
            .drive(&mut self.driver, telemetry, line, action, now);
        Ok(())
    }

    /// Releases every output and cancels a pending release.
    pub fn release_all(&mut self) {
        self.sequencer.abort(&mut self.driver);
    }

    fn actuate<const CAP: usize>(
        &mut self,
        telemetry: &mut TelemetryRecorder<I, CAP>,
        now: I,
    ) -> Result<Engagement<I>, ActuationError<I>> {
        match self.config.actuation {
            ActuationMode::Blocking => self
                .sequencer
                .run_blocking(&mut self.driver, &mut self.delay, telemetry, now)
                .map(Engagement::Completed),
            ActuationMode::Deadline => self
                .sequencer
                .begin(&mut self.driver, telemetry, now)
                .map(|deadline| Engagement::Pending { deadline }),
        }
    }

    fn report_warm<const CAP: usize>(&mut self, telemetry: &mut TelemetryRecorder<I, CAP>, now: I) {
        if !self.warm_reported {
            self.warm_reported = true;
            telemetry.record_warmup(self.pair.len(), now);
        }
    }
}

impl<S, D, B, I, const C: usize> LineMonitor<S, D, B, I, C>
where
    I: MonotonicInstant,
{
    /// Last decided line state.
    pub const fn state(&self) -> LineState {
        self.state
    }

    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Both conductor histories.
    pub const fn history(&self) -> &LinePair<C> {
        &self.pair
    }

    /// The newest `count` voltages recorded for one conductor, oldest first.
    pub fn latest(&self, conductor: ConductorId, count: usize) -> impl Iterator<Item = i16> + '_ {
        self.pair.conductor(conductor).history().latest(count)
    }

    /// The newest `count` aligned pairs, oldest first.
    pub fn latest_pairs(&self, count: usize) -> impl Iterator<Item = SamplePair> + '_ {
        self.pair.latest_pairs(count)
    }

    pub fn is_warm(&self) -> bool {
        self.pair.is_warm()
    }

    /// Returns `true` while the conditioning element is across the pair,
    /// whether a sequence or a manual drive put it there.
    pub const fn actuator_engaged(&self) -> bool {
        matches!(
            self.sequencer.level(ActuatorId::Conditioning),
            ActuatorAction::Engage
        )
    }

    /// Returns `true` while a deadline-mode sequence is waiting for release.
    pub const fn sequence_active(&self) -> bool {
        self.sequencer.is_engaged()
    }

    pub const fn sequencer(&self) -> &Sequencer<I> {
        &self.sequencer
    }

    pub const fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn delay_mut(&mut self) -> &mut B {
        &mut self.delay
    }

    /// Point-in-time view for status rendering.
    pub fn snapshot(&self) -> StatusSnapshot {
        let actuators = ALL_ACTUATORS.map(|line| {
            let action = self.sequencer.level(line.id);
            ActuatorSample::new(line.id, action, line.level_for(action))
        });

        StatusSnapshot {
            state: self.state,
            warm: self.pair.is_warm(),
            latest: self.pair.recent(),
            actuators,
            sequence_active: self.sequencer.is_engaged(),
            actuations: self.sequencer.completed(),
            strategy: self.config.strategy,
        }
    }
}

#[cfg(test)]
mod tests {
    use core::ops::Add;
    use core::time::Duration;

    use super::*;
    use crate::acquisition::DEFAULT_SCALING_NETWORK;
    use crate::sequencer::{NoopActuatorDriver, NoopDelay};
    use crate::telemetry::TelemetryInstant;

    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct MockInstant(u64);

    impl TelemetryInstant for MockInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    impl Add<Duration> for MockInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self {
            MockInstant(self.0 + u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX))
        }
    }

    /// Holds a steady pair voltage: ring at -48 V, tip at `-48 + delta`.
    struct SteadySource {
        delta: i16,
    }

    impl SteadySource {
        fn new(delta: i16) -> Self {
            Self { delta }
        }
    }

    impl SampleSource for SteadySource {
        fn read(&mut self, conductor: ConductorId) -> u16 {
            let volts = match conductor {
                ConductorId::Tip => -48 + self.delta,
                ConductorId::Ring => -48,
            };
            DEFAULT_SCALING_NETWORK.raw_for_volts(f32::from(volts))
        }
    }

    type TestMonitor = LineMonitor<SteadySource, NoopActuatorDriver, NoopDelay, MockInstant, 12>;

    fn monitor(config: MonitorConfig, delta: i16) -> TestMonitor {
        LineMonitor::with_components(config, SteadySource::new(delta), NoopActuatorDriver, NoopDelay)
            .expect("valid config")
    }

    #[test]
    fn oversized_window_is_rejected_at_construction() {
        let result = LineMonitor::<_, _, _, MockInstant, 8>::with_components(
            MonitorConfig::DEFAULT.with_classifier(crate::classifier::ClassifierConfig {
                window: 9,
                ..crate::classifier::DEFAULT_CLASSIFIER
            }),
            SteadySource::new(45),
            NoopActuatorDriver,
            NoopDelay,
        );
        assert!(matches!(result, Err(ConfigError::WindowTooLarge { window: 9, capacity: 8 })));
    }

    #[test]
    fn cycles_warm_up_before_classifying() {
        let mut monitor = monitor(MonitorConfig::DEFAULT, 5);
        let mut telemetry = TelemetryRecorder::<MockInstant, 32>::new();

        for filled in 1..12 {
            assert_eq!(
                monitor.cycle(&mut telemetry, MockInstant(0)),
                CycleReport::WarmingUp { filled }
            );
        }
        assert!(!monitor.is_warm());
        assert_eq!(monitor.state(), LineState::OnHook);

        let report = monitor.cycle(&mut telemetry, MockInstant(60));
        assert!(matches!(report, CycleReport::Actuated(_)));
        assert!(report.changes_state());
        assert_eq!(monitor.state(), LineState::OffHook);
    }

    #[test]
    fn unmatched_window_keeps_on_hook() {
        let mut monitor = monitor(MonitorConfig::DEFAULT, 28);
        let mut telemetry = TelemetryRecorder::<MockInstant, 32>::new();
        monitor.warm_up(&mut telemetry, MockInstant(0));

        let report = monitor.cycle(&mut telemetry, MockInstant(5));
        assert_eq!(report, CycleReport::Unchanged(LineState::OnHook));
        assert!(!report.changes_state());
    }

    #[test]
    fn zero_ringing_count_is_rejected_at_construction() {
        let result = LineMonitor::<_, _, _, MockInstant, 12>::with_components(
            MonitorConfig::DEFAULT.with_classifier(crate::classifier::ClassifierConfig {
                ringing_min_count: 0,
                ..crate::classifier::DEFAULT_CLASSIFIER
            }),
            SteadySource::new(28),
            NoopActuatorDriver,
            NoopDelay,
        );
        assert!(matches!(
            result,
            Err(ConfigError::RingingCountOutOfRange { count: 0, .. })
        ));
    }

    #[test]
    fn warm_up_fills_capacity_exactly_once() {
        let mut monitor = monitor(MonitorConfig::DEFAULT, 45);
        let mut telemetry = TelemetryRecorder::<MockInstant, 32>::new();

        assert_eq!(monitor.warm_up(&mut telemetry, MockInstant(0)), 12);
        assert_eq!(monitor.warm_up(&mut telemetry, MockInstant(0)), 0);
        assert_eq!(telemetry.len(), 1);
        assert_eq!(monitor.latest(ConductorId::Ring, 99).count(), 12);
        assert_eq!(
            monitor.cycle(&mut telemetry, MockInstant(5)),
            CycleReport::Unchanged(LineState::OnHook)
        );
    }

    #[test]
    fn deadline_mode_skips_sampling_until_release() {
        let config = MonitorConfig::DEFAULT.with_actuation(ActuationMode::Deadline);
        let mut monitor = monitor(config, 45);
        let mut telemetry = TelemetryRecorder::<MockInstant, 64>::new();
        monitor.warm_up(&mut telemetry, MockInstant(0));

        monitor.source_mut().delta = 5;
        let mut now = 0;
        let deadline = loop {
            now += 5;
            if let CycleReport::Engaged { deadline } =
                monitor.cycle(&mut telemetry, MockInstant(now))
            {
                break deadline;
            }
        };
        assert_eq!(deadline, MockInstant(now + 600));
        assert!(monitor.actuator_engaged());
        assert!(monitor.sequence_active());

        let before = monitor.history().conductor(ConductorId::Tip).history().cursor();
        let dwelling = monitor.cycle(&mut telemetry, MockInstant(now + 5));
        assert_eq!(dwelling, CycleReport::Dwelling { deadline });
        assert!(!dwelling.changes_state());
        assert_eq!(
            monitor.history().conductor(ConductorId::Tip).history().cursor(),
            before
        );

        let report = monitor.cycle(&mut telemetry, deadline);
        assert!(matches!(report, CycleReport::Released(_)));
        assert!(!report.changes_state());
        assert!(!monitor.actuator_engaged());
        assert!(!monitor.sequence_active());
        assert_eq!(monitor.snapshot().actuations, 1);
    }

    #[test]
    fn manual_drive_is_refused_while_engaged() {
        let config = MonitorConfig::DEFAULT.with_actuation(ActuationMode::Deadline);
        let mut monitor = monitor(config, 45);
        let mut telemetry = TelemetryRecorder::<MockInstant, 32>::new();

        let engagement = monitor
            .engage_manual(&mut telemetry, MockInstant(0))
            .expect("engaged");
        assert_eq!(engagement, Engagement::Pending { deadline: MockInstant(600) });
        assert_eq!(monitor.state(), LineState::OnHook);
        assert!(
            monitor
                .drive_manual(
                    &mut telemetry,
                    ActuatorId::Busy,
                    ActuatorAction::Release,
                    MockInstant(1)
                )
                .is_err()
        );

        monitor.release_all();
        assert!(!monitor.actuator_engaged());
        assert_eq!(
            monitor.drive_manual(
                &mut telemetry,
                ActuatorId::Conditioning,
                ActuatorAction::Engage,
                MockInstant(2)
            ),
            Ok(())
        );
        assert!(monitor.actuator_engaged());
        assert!(!monitor.sequence_active());
        let snapshot = monitor.snapshot();
        assert_eq!(
            snapshot.actuators[ActuatorId::Conditioning.as_index()].action,
            ActuatorAction::Engage
        );
        assert!(snapshot.element_engaged());
        assert!(!snapshot.sequence_active);
    }
}
