//! Console command dispatcher.
//!
//! Glues parsed console commands to a running [`LineMonitor`]. The executor
//! owns the monitor and its telemetry ring, so the front end only feeds lines
//! and clock readings and renders the outcomes it gets back.

use core::fmt;

use crate::conditioning::{ActuatorAction, ActuatorId};
use crate::monitor::{CycleReport, Engagement, LineMonitor, MonotonicClock, RunSummary, SampleSource};
use crate::sequencer::{ActuationError, ActuatorDriver, BlockingDelay};
use crate::status::{StatusFormatter, StatusSnapshot, write_sample};
use crate::telemetry::{MonotonicInstant, TELEMETRY_RING_CAPACITY, TelemetryRecorder};

use super::grammar::{self, Command};
use super::{HELP_TOPICS, help_for};

/// Pairs listed by `samples` without an explicit count.
pub const DEFAULT_SAMPLE_COUNT: usize = 10;

/// Command execution successes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandOutcome<'a, Instant> {
    Status(StatusSnapshot),
    Samples { count: usize },
    Engaged(Engagement<Instant>),
    Relay {
        line: ActuatorId,
        action: ActuatorAction,
    },
    Released,
    Help { topic: Option<&'a str> },
}

/// Errors surfaced while executing a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandError<'a, Instant> {
    Parse(grammar::ParseError),
    Busy(ActuationError<Instant>),
    UnknownTopic(&'a str),
}

impl<Instant> From<grammar::ParseError> for CommandError<'_, Instant> {
    fn from(error: grammar::ParseError) -> Self {
        Self::Parse(error)
    }
}

impl<Instant> From<ActuationError<Instant>> for CommandError<'_, Instant> {
    fn from(error: ActuationError<Instant>) -> Self {
        Self::Busy(error)
    }
}

impl<Instant> fmt::Display for CommandError<'_, Instant> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(error) => error.fmt(f),
            CommandError::Busy(error) => error.fmt(f),
            CommandError::UnknownTopic(topic) => write!(f, "no help for `{topic}`"),
        }
    }
}

type CommandResult<'a, Instant> = Result<CommandOutcome<'a, Instant>, CommandError<'a, Instant>>;

/// Dispatches console commands into a monitor.
pub struct CommandExecutor<S, D, B, I, const C: usize, const CAP: usize = TELEMETRY_RING_CAPACITY>
where
    I: MonotonicInstant,
{
    monitor: LineMonitor<S, D, B, I, C>,
    telemetry: TelemetryRecorder<I, CAP>,
}

impl<S, D, B, I, const C: usize, const CAP: usize> CommandExecutor<S, D, B, I, C, CAP>
where
    I: MonotonicInstant,
{
    /// Creates an executor around `monitor` with an empty telemetry ring.
    pub const fn new(monitor: LineMonitor<S, D, B, I, C>) -> Self {
        Self {
            monitor,
            telemetry: TelemetryRecorder::new(),
        }
    }

    pub const fn monitor(&self) -> &LineMonitor<S, D, B, I, C> {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut LineMonitor<S, D, B, I, C> {
        &mut self.monitor
    }

    pub const fn telemetry(&self) -> &TelemetryRecorder<I, CAP> {
        &self.telemetry
    }

    /// Consumes the executor and yields the monitor and its telemetry.
    pub fn into_inner(self) -> (LineMonitor<S, D, B, I, C>, TelemetryRecorder<I, CAP>) {
        (self.monitor, self.telemetry)
    }
}

impl<S, D, B, I, const C: usize, const CAP: usize> CommandExecutor<S, D, B, I, C, CAP>
where
    S: SampleSource,
    D: ActuatorDriver,
    B: BlockingDelay,
    I: MonotonicInstant,
{
    /// Fills the sample histories.
    pub fn warm_up(&mut self, now: I) -> usize {
        self.monitor.warm_up(&mut self.telemetry, now)
    }

    /// Runs one monitor cycle.
    pub fn step(&mut self, now: I) -> CycleReport<I> {
        self.monitor.cycle(&mut self.telemetry, now)
    }

    /// Runs `count` monitor cycles paced by the sample interval.
    pub fn run_cycles<K>(&mut self, count: u32, clock: &K) -> RunSummary
    where
        K: MonotonicClock<Instant = I>,
    {
        self.monitor.run_cycles(count, &mut self.telemetry, clock)
    }

    /// Parses and executes a console line.
    pub fn execute<'a>(&mut self, line: &'a str, now: I) -> CommandResult<'a, I> {
        let command = grammar::parse(line)?;
        self.dispatch(command, now)
    }

    fn dispatch<'a>(&mut self, command: Command<'a>, now: I) -> CommandResult<'a, I> {
        match command {
            Command::Status => Ok(CommandOutcome::Status(self.monitor.snapshot())),
            Command::Samples { count } => Ok(CommandOutcome::Samples {
                count: count.map_or(DEFAULT_SAMPLE_COUNT, usize::from),
            }),
            Command::Engage => {
                let engagement = self.monitor.engage_manual(&mut self.telemetry, now)?;
                Ok(CommandOutcome::Engaged(engagement))
            }
            Command::Relay { line, action } => {
                self.monitor
                    .drive_manual(&mut self.telemetry, line, action, now)?;
                Ok(CommandOutcome::Relay { line, action })
            }
            Command::Release => {
                self.monitor.release_all();
                Ok(CommandOutcome::Released)
            }
            Command::Help { topic: Some(topic) } if help_for(topic).is_none() => {
                Err(CommandError::UnknownTopic(topic))
            }
            Command::Help { topic } => Ok(CommandOutcome::Help { topic }),
        }
    }

    /// Renders an outcome as console text, one `\n`-terminated line per item.
    pub fn render<W: fmt::Write>(
        &self,
        outcome: &CommandOutcome<'_, I>,
        writer: &mut W,
    ) -> fmt::Result {
        match outcome {
            CommandOutcome::Status(snapshot) => StatusFormatter::new(snapshot).write_all(writer),
            CommandOutcome::Samples { count } => {
                let mut listed = 0;
                for sample in self.monitor.latest_pairs(*count) {
                    writer.write_str("sample")?;
                    write_sample(writer, sample)?;
                    writer.write_char('\n')?;
                    listed += 1;
                }
                if listed == 0 {
                    writer.write_str("no samples recorded\n")?;
                }
                Ok(())
            }
            CommandOutcome::Engaged(Engagement::Completed(report)) => writeln!(
                writer,
                "engaged {} for {} ms, released",
                report.strategy,
                report.dwell.as_millis()
            ),
            CommandOutcome::Engaged(Engagement::Pending { .. }) => writeln!(
                writer,
                "engaged {}, release in {} ms",
                self.monitor.config().strategy,
                self.monitor.config().dwell().as_millis()
            ),
            CommandOutcome::Relay { line, action } => {
                let verb = match action {
                    ActuatorAction::Engage => "engaged",
                    ActuatorAction::Release => "released",
                };
                writeln!(writer, "{line} {verb}")
            }
            CommandOutcome::Released => writer.write_str("all outputs released\n"),
            CommandOutcome::Help { topic: Some(topic) } => match help_for(topic) {
                Some(text) => writeln!(writer, "{text}"),
                None => writeln!(writer, "no help for `{topic}`"),
            },
            CommandOutcome::Help { topic: None } => {
                writer.write_str("commands:")?;
                for (name, _) in HELP_TOPICS {
                    write!(writer, " {name}")?;
                }
                writer.write_char('\n')
            }
        }
    }
}
