use core::ops::Add;
use core::time::Duration;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use line_core::acquisition::DEFAULT_SCALING_NETWORK;
use line_core::classifier::LineState;
use line_core::conditioning::{ActuatorAction, ActuatorId, ConditioningStrategy};
use line_core::config::MonitorConfig;
use line_core::history::ConductorId;
use line_core::monitor::{CycleReport, LineMonitor, MonotonicClock, SampleSource};
use line_core::sequencer::{ActuationMode, ActuatorDriver, BlockingDelay};
use line_core::telemetry::{TelemetryEventKind, TelemetryInstant, TelemetryRecorder};

const RING_VOLTS: i16 = -48;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Tick(u64);

impl TelemetryInstant for Tick {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Tick {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Tick(self.0 + u64::try_from(rhs.as_millis()).unwrap())
    }
}

/// Millisecond clock advanced only by [`VirtualDelay`].
#[derive(Clone, Default)]
struct VirtualClock(Rc<Cell<u64>>);

impl MonotonicClock for VirtualClock {
    type Instant = Tick;

    fn now(&self) -> Tick {
        Tick(self.0.get())
    }
}

struct VirtualDelay(VirtualClock);

impl BlockingDelay for VirtualDelay {
    fn delay(&mut self, duration: Duration) {
        let clock = &self.0.0;
        clock.set(clock.get() + u64::try_from(duration.as_millis()).unwrap());
    }
}

/// Repeats a pattern of pair voltages, one entry per acquisition cycle.
struct PatternSource {
    deltas: Rc<RefCell<Vec<i16>>>,
    index: usize,
}

impl SampleSource for PatternSource {
    fn read(&mut self, conductor: ConductorId) -> u16 {
        let volts = match conductor {
            ConductorId::Tip => {
                let deltas = self.deltas.borrow();
                RING_VOLTS + deltas[self.index % deltas.len()]
            }
            ConductorId::Ring => {
                self.index += 1;
                RING_VOLTS
            }
        };
        DEFAULT_SCALING_NETWORK.raw_for_volts(f32::from(volts))
    }
}

type DriveLog = Rc<RefCell<Vec<(u64, ActuatorId, ActuatorAction)>>>;

struct RecordingDriver {
    clock: VirtualClock,
    log: DriveLog,
    releases: Rc<Cell<u32>>,
}

impl ActuatorDriver for RecordingDriver {
    fn apply(&mut self, line: ActuatorId, action: ActuatorAction) {
        self.log.borrow_mut().push((self.clock.0.get(), line, action));
    }

    fn release_all(&mut self) {
        self.releases.set(self.releases.get() + 1);
    }
}

struct Bench {
    clock: VirtualClock,
    deltas: Rc<RefCell<Vec<i16>>>,
    log: DriveLog,
    releases: Rc<Cell<u32>>,
    monitor: LineMonitor<PatternSource, RecordingDriver, VirtualDelay, Tick>,
    telemetry: TelemetryRecorder<Tick, 256>,
}

impl Bench {
    fn new(config: MonitorConfig, initial: &[i16]) -> Self {
        let clock = VirtualClock::default();
        let deltas = Rc::new(RefCell::new(initial.to_vec()));
        let log = DriveLog::default();
        let releases = Rc::new(Cell::new(0));
        let monitor = LineMonitor::with_components(
            config,
            PatternSource {
                deltas: Rc::clone(&deltas),
                index: 0,
            },
            RecordingDriver {
                clock: clock.clone(),
                log: Rc::clone(&log),
                releases: Rc::clone(&releases),
            },
            VirtualDelay(clock.clone()),
        )
        .expect("valid config");

        let mut bench = Self {
            clock,
            deltas,
            log,
            releases,
            monitor,
            telemetry: TelemetryRecorder::new(),
        };
        let now = bench.clock.now();
        bench.monitor.warm_up(&mut bench.telemetry, now);
        bench
    }

    fn set_pattern(&self, deltas: &[i16]) {
        *self.deltas.borrow_mut() = deltas.to_vec();
    }

    fn run(&mut self, cycles: u32) -> line_core::monitor::RunSummary {
        self.monitor
            .run_cycles(cycles, &mut self.telemetry, &self.clock)
    }

    fn drives(&self) -> Vec<(u64, ActuatorId, ActuatorAction)> {
        self.log.borrow().clone()
    }
}

#[test]
fn pickup_fires_exactly_one_sequence_for_the_dwell() {
    let mut bench = Bench::new(MonitorConfig::DEFAULT, &[45]);
    assert_eq!(bench.releases.get(), 1);

    let idle = bench.run(40);
    assert_eq!(idle.actuations, 0);
    assert_eq!(bench.monitor.state(), LineState::OnHook);

    bench.set_pattern(&[5]);
    let summary = bench.run(60);
    assert_eq!(summary.actuations, 1);
    assert_eq!(summary.transitions, 1);
    assert_eq!(bench.monitor.state(), LineState::OffHook);

    let drives = bench.drives();
    assert_eq!(drives.len(), 6);
    let engaged_at = drives[0].0;
    let expected = [
        (engaged_at, ActuatorId::Busy, ActuatorAction::Engage),
        (engaged_at, ActuatorId::Isolation, ActuatorAction::Engage),
        (engaged_at, ActuatorId::Conditioning, ActuatorAction::Engage),
        (engaged_at + 600, ActuatorId::Conditioning, ActuatorAction::Release),
        (engaged_at + 600, ActuatorId::Isolation, ActuatorAction::Release),
        (engaged_at + 600, ActuatorId::Busy, ActuatorAction::Release),
    ];
    assert_eq!(drives.as_slice(), &expected);
}

#[test]
fn steady_off_hook_never_retriggers() {
    let mut bench = Bench::new(MonitorConfig::DEFAULT, &[45]);
    bench.set_pattern(&[5]);
    bench.run(30);
    let after_pickup = bench.drives().len();

    let summary = bench.run(200);
    assert_eq!(summary.actuations, 0);
    assert_eq!(bench.drives().len(), after_pickup);
}

#[test]
fn each_pickup_after_hang_up_actuates_again() {
    let mut bench = Bench::new(
        MonitorConfig::DEFAULT.with_strategy(ConditioningStrategy::ParallelCapacitor),
        &[45],
    );
    let mut total = 0;
    for _ in 0..3 {
        bench.set_pattern(&[5]);
        total += bench.run(30).actuations;
        bench.set_pattern(&[45]);
        bench.run(30);
        assert_eq!(bench.monitor.state(), LineState::OnHook);
    }
    assert_eq!(total, 3);
    assert!(
        bench
            .drives()
            .iter()
            .all(|(_, line, _)| *line != ActuatorId::Isolation)
    );
}

#[test]
fn ringing_is_decided_without_actuation() {
    let mut bench = Bench::new(MonitorConfig::DEFAULT, &[45]);
    bench.set_pattern(&[80, 0, -80, 0]);
    let summary = bench.run(40);

    assert_eq!(bench.monitor.state(), LineState::Ringing);
    assert_eq!(summary.actuations, 0);
    assert!(bench.drives().is_empty());
}

#[test]
fn answering_during_a_ring_burst_does_not_trigger() {
    let mut bench = Bench::new(MonitorConfig::DEFAULT, &[45]);
    bench.set_pattern(&[80, 0, -80, 0]);
    bench.run(40);
    bench.set_pattern(&[5]);
    let summary = bench.run(40);

    assert_eq!(bench.monitor.state(), LineState::OffHook);
    assert_eq!(summary.actuations, 0);
    let changes: Vec<_> = bench
        .telemetry
        .oldest_first()
        .filter_map(|record| match record.event {
            TelemetryEventKind::StateChanged { from, to } => Some((from, to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        changes,
        [
            (LineState::OnHook, LineState::Ringing),
            (LineState::Ringing, LineState::OffHook)
        ]
    );
}

#[test]
fn ambiguous_windows_hold_the_previous_state() {
    let mut bench = Bench::new(MonitorConfig::DEFAULT, &[45]);
    bench.set_pattern(&[45, 28]);
    let summary = bench.run(100);

    assert_eq!(summary.transitions, 0);
    assert_eq!(bench.monitor.state(), LineState::OnHook);
}

#[test]
fn deadline_mode_holds_the_element_without_sampling() {
    let mut bench = Bench::new(
        MonitorConfig::DEFAULT.with_actuation(ActuationMode::Deadline),
        &[45],
    );
    bench.set_pattern(&[5]);

    let mut engaged = None;
    for _ in 0..30 {
        let now = bench.clock.now();
        let report = bench.monitor.cycle(&mut bench.telemetry, now);
        bench.clock.0.set(bench.clock.0.get() + 5);
        if let CycleReport::Engaged { deadline } = report {
            engaged = Some((now, deadline));
            break;
        }
    }
    let (started, deadline) = engaged.expect("pickup detected");
    assert_eq!(deadline, started + Duration::from_millis(600));

    let cursor = bench
        .monitor
        .history()
        .conductor(ConductorId::Tip)
        .history()
        .cursor();
    let summary = bench.run(205);
    assert_eq!(summary.actuations, 1);
    assert!(!bench.monitor.actuator_engaged());

    let drives = bench.drives();
    let release = drives
        .iter()
        .find(|(_, line, action)| {
            *line == ActuatorId::Conditioning && *action == ActuatorAction::Release
        })
        .expect("released");
    assert_eq!(release.0, deadline.0);

    // 119 cycles dwell, the 120th releases, the rest sample again.
    let tip = bench.monitor.history().conductor(ConductorId::Tip).history();
    assert_eq!(tip.cursor(), (cursor + 205 - 120) % tip.capacity());
}
