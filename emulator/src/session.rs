use std::cell::Cell;
use std::f32::consts::TAU;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::ops::Add;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use line_core::acquisition::ScalingNetwork;
use line_core::classifier::LineState;
use line_core::conditioning::{
    ALL_ACTUATORS, ActuatorAction, ActuatorId, ConditioningStrategy, PinLevel, actuator_by_id,
};
use line_core::config::{HISTORY_CAPACITY, MonitorConfig};
use line_core::history::ConductorId;
use line_core::monitor::{LineMonitor, MonotonicClock, RunSummary, SampleSource};
use line_core::repl::commands::{CommandError, CommandExecutor, CommandOutcome};
use line_core::sequencer::{ActuationMode, ActuatorDriver, BlockingDelay};
use line_core::telemetry::{
    EventId, TelemetryEventKind, TelemetryInstant, TelemetryPayload, TelemetryRecord,
};

/// Commands only the emulator understands, appended to the shared help.
pub const EMULATOR_TOPICS: &[(&str, &str)] = &[
    (
        "line",
        "line <on-hook|off-hook|ringing> - change the simulated line condition",
    ),
    ("run", "run <ms> - advance virtual time, cycling the monitor"),
];

/// Resting voltage of the ring conductor on an idle line.
const RING_IDLE_VOLTS: f32 = -48.0;
/// Conductor voltages while the loop is closed.
const OFF_HOOK_TIP_VOLTS: f32 = -22.0;
const OFF_HOOK_RING_VOLTS: f32 = -30.0;
/// Ring signal superimposed on the ring conductor.
const RINGING_PEAK_VOLTS: f32 = 90.0;
const RINGING_HZ: f32 = 20.0;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Interactive,
    Pickup,
    Ringing,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "transcripts/emulator-interactive.log",
            TranscriptProfile::Pickup => "transcripts/emulator-pickup.log",
            TranscriptProfile::Ringing => "transcripts/emulator-ringing.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "Line Conditioner Emulator interactive transcript",
            TranscriptProfile::Pickup => "Line Conditioner Emulator pickup transcript",
            TranscriptProfile::Ringing => "Line Conditioner Emulator ringing transcript",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("interactive") {
            Ok(Self::Interactive)
        } else if tag.eq_ignore_ascii_case("pickup") {
            Ok(Self::Pickup)
        } else if tag.eq_ignore_ascii_case("ringing") {
            Ok(Self::Ringing)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }
}

/// Virtual time in microseconds since the session started.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct SimInstant(u64);

impl SimInstant {
    fn since_start(self) -> Duration {
        Duration::from_micros(self.0)
    }
}

impl TelemetryInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        SimInstant(self.0.saturating_add(duration_micros(rhs)))
    }
}

/// Shared virtual clock. Only [`VirtualDelay`] moves it forward.
#[derive(Clone, Default)]
pub struct VirtualClock(Rc<Cell<u64>>);

impl VirtualClock {
    fn advance(&self, duration: Duration) {
        self.0.set(self.0.get().saturating_add(duration_micros(duration)));
    }
}

impl MonotonicClock for VirtualClock {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(self.0.get())
    }
}

pub struct VirtualDelay {
    clock: VirtualClock,
}

impl BlockingDelay for VirtualDelay {
    fn delay(&mut self, duration: Duration) {
        self.clock.advance(duration);
    }
}

/// Synthesises ADC codes for a line in the requested condition.
pub struct SimulatedLine {
    clock: VirtualClock,
    condition: Rc<Cell<LineState>>,
    network: ScalingNetwork,
}

impl SimulatedLine {
    fn volts(&self, conductor: ConductorId) -> f32 {
        match (self.condition.get(), conductor) {
            (LineState::OnHook, ConductorId::Tip) => 0.0,
            (LineState::OnHook, ConductorId::Ring) => RING_IDLE_VOLTS,
            (LineState::OffHook, ConductorId::Tip) => OFF_HOOK_TIP_VOLTS,
            (LineState::OffHook, ConductorId::Ring) => OFF_HOOK_RING_VOLTS,
            (LineState::Ringing, ConductorId::Tip) => 0.0,
            (LineState::Ringing, ConductorId::Ring) => {
                #[allow(clippy::cast_precision_loss)]
                let seconds = self.clock.0.get() as f32 / 1_000_000.0;
                RING_IDLE_VOLTS + RINGING_PEAK_VOLTS * (TAU * RINGING_HZ * seconds).sin()
            }
        }
    }
}

impl SampleSource for SimulatedLine {
    fn read(&mut self, conductor: ConductorId) -> u16 {
        self.network.raw_for_volts(self.volts(conductor))
    }
}

/// Pin levels as the relay drivers would see them.
pub struct PinBank {
    levels: [PinLevel; ALL_ACTUATORS.len()],
}

impl PinBank {
    fn new() -> Self {
        Self {
            levels: ALL_ACTUATORS.map(|line| line.idle_level()),
        }
    }
}

impl ActuatorDriver for PinBank {
    fn apply(&mut self, line: ActuatorId, action: ActuatorAction) {
        self.levels[line.as_index()] = actuator_by_id(line).level_for(action);
    }

    fn release_all(&mut self) {
        self.levels = ALL_ACTUATORS.map(|line| line.idle_level());
    }
}

type Executor =
    CommandExecutor<SimulatedLine, PinBank, VirtualDelay, SimInstant, HISTORY_CAPACITY, 256>;

pub struct Session {
    executor: Executor,
    clock: VirtualClock,
    condition: Rc<Cell<LineState>>,
    transcript: TranscriptLogger,
    next_event: EventId,
}

impl Session {
    pub fn new(
        profile: TranscriptProfile,
        strategy: ConditioningStrategy,
        mode: ActuationMode,
    ) -> io::Result<Self> {
        let mut transcript = TranscriptLogger::new(profile)?;
        let clock = VirtualClock::default();
        let condition = Rc::new(Cell::new(LineState::OnHook));
        let config = MonitorConfig::DEFAULT
            .with_strategy(strategy)
            .with_actuation(mode);

        let source = SimulatedLine {
            clock: clock.clone(),
            condition: Rc::clone(&condition),
            network: config.scaling,
        };
        let delay = VirtualDelay {
            clock: clock.clone(),
        };
        let monitor = LineMonitor::with_components(config, source, PinBank::new(), delay)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;

        transcript.append_line(
            Duration::ZERO,
            TranscriptRole::Emulator,
            &format!(
                "strategy={strategy} dwell={}ms mode={mode:?}",
                config.dwell().as_millis()
            ),
        )?;

        let mut session = Self {
            executor: CommandExecutor::new(monitor),
            clock,
            condition,
            transcript,
            next_event: 0,
        };
        let now = session.clock.now();
        session.executor.warm_up(now);
        let lines = session.drain_events();
        let elapsed = session.elapsed();
        session.record_output(elapsed, &lines)?;
        Ok(session)
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.elapsed();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        let mut words = trimmed.split_whitespace();
        let keyword = words.next().unwrap_or_default();
        let argument = words.next();
        let extra = words.next();

        let mut lines = if keyword.eq_ignore_ascii_case("line") && extra.is_none() {
            self.handle_line(argument)
        } else if keyword.eq_ignore_ascii_case("run") && extra.is_none() {
            self.handle_run(argument)
        } else if keyword.eq_ignore_ascii_case("help") && extra.is_none() {
            self.handle_help(trimmed, argument)
        } else {
            self.execute(trimmed)
        };
        lines.extend(self.drain_events());

        let elapsed = self.elapsed();
        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    fn execute(&mut self, line: &str) -> Vec<String> {
        let now = self.clock.now();
        match self.executor.execute(line, now) {
            Ok(outcome) => self.render(&outcome),
            Err(err @ CommandError::Parse(_)) => vec![format!("ERR syntax: {err}")],
            Err(err) => vec![format!("ERR {err}")],
        }
    }

    fn render(&self, outcome: &CommandOutcome<'_, SimInstant>) -> Vec<String> {
        let mut text = String::new();
        if self.executor.render(outcome, &mut text).is_err() {
            return vec!["ERR render".to_string()];
        }
        text.lines().map(|line| format!("OK {line}")).collect()
    }

    fn handle_line(&mut self, argument: Option<&str>) -> Vec<String> {
        match argument.and_then(LineState::from_tag) {
            Some(state) => {
                self.condition.set(state);
                vec![format!("OK line {state}")]
            }
            None => vec!["ERR usage: line <on-hook|off-hook|ringing>".to_string()],
        }
    }

    fn handle_run(&mut self, argument: Option<&str>) -> Vec<String> {
        let Some(millis) = argument.and_then(|value| value.parse::<u64>().ok()) else {
            return vec!["ERR usage: run <ms>".to_string()];
        };

        let interval = self.executor.monitor().config().sample_interval;
        let cycles = Duration::from_millis(millis).as_micros() / interval.as_micros().max(1);
        let cycles = u32::try_from(cycles).unwrap_or(u32::MAX);
        let started = self.clock.now();
        let summary = self.executor.run_cycles(cycles, &self.clock);
        let took = self.clock.now().saturating_duration_since(started);
        vec![describe_run(
            &summary,
            took,
            self.executor.monitor().state(),
        )]
    }

    fn handle_help(&mut self, line: &str, topic: Option<&str>) -> Vec<String> {
        if let Some(topic) = topic
            && let Some((_, detail)) = EMULATOR_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(topic))
        {
            return vec![format!("OK {detail}")];
        }

        let mut lines = self.execute(line);
        if topic.is_none() {
            let names: Vec<&str> = EMULATOR_TOPICS.iter().map(|(name, _)| *name).collect();
            lines.push(format!("OK emulator: {}", names.join(" ")));
        }
        lines
    }

    fn drain_events(&mut self) -> Vec<String> {
        let telemetry = self.executor.telemetry();
        let lines = telemetry
            .since(self.next_event)
            .map(describe_record)
            .collect();
        self.next_event = telemetry.next_event_id();
        lines
    }

    fn elapsed(&self) -> Duration {
        self.clock.now().since_start()
    }

    fn record_output(&mut self, elapsed: Duration, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(self.writer, "# Timestamps are virtual milliseconds since power-up")?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

fn describe_run(summary: &RunSummary, took: Duration, state: LineState) -> String {
    format!(
        "OK ran cycles={} took={} transitions={} actuations={} state={state}",
        summary.cycles,
        format_duration_short(took),
        summary.transitions,
        summary.actuations,
    )
}

fn describe_record(record: &TelemetryRecord<SimInstant>) -> String {
    let at = record.timestamp.since_start().as_millis();
    let detail = match (record.event, record.details) {
        (
            TelemetryEventKind::ActuatorEngaged(line) | TelemetryEventKind::ActuatorReleased(line),
            TelemetryPayload::Actuator(drive),
        ) => {
            let wiring = actuator_by_id(line);
            let level = match wiring.level_for(drive.action) {
                PinLevel::High => "high",
                PinLevel::Low => "low",
            };
            format!("{} {}={level}", wiring.driver_output, wiring.mcu_pin)
        }
        (TelemetryEventKind::StateChanged { .. }, TelemetryPayload::Transition(sample)) => {
            format!(
                "tip={}V ring={}V delta={}V",
                sample.tip,
                sample.ring,
                sample.delta()
            )
        }
        (_, TelemetryPayload::Sequence(summary)) => match summary.duration {
            Some(took) => format!(
                "dwell={} took={} steps={}",
                format_duration_short(summary.dwell),
                format_duration_short(took),
                summary.steps
            ),
            None => format!(
                "dwell={} steps={}",
                format_duration_short(summary.dwell),
                summary.steps
            ),
        },
        (_, TelemetryPayload::Warmup(samples)) => format!("samples={samples}"),
        _ => String::new(),
    };

    if detail.is_empty() {
        format!("EVT +{at}ms {}", record.event)
    } else {
        format!("EVT +{at}ms {} {detail}", record.event)
    }
}

fn duration_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

fn format_duration_short(duration: Duration) -> String {
    if duration.as_secs() == 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}
