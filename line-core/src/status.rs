//! Shared status surface.
//!
//! [`StatusSnapshot`] is captured from a running
//! [`LineMonitor`](crate::monitor::LineMonitor) and rendered by
//! [`StatusFormatter`], so the firmware log and the emulator console print the
//! same lines.

use core::fmt;

use crate::classifier::LineState;
use crate::conditioning::{
    ActuatorAction, ActuatorId, ConditioningStrategy, PinLevel, actuator_by_id,
};
use crate::history::SamplePair;

/// Sampled state for a single output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActuatorSample {
    pub id: ActuatorId,
    pub action: ActuatorAction,
    pub level: PinLevel,
}

impl ActuatorSample {
    #[must_use]
    pub const fn new(id: ActuatorId, action: ActuatorAction, level: PinLevel) -> Self {
        Self { id, action, level }
    }

    /// Returns `true` when the output is currently engaged.
    #[must_use]
    pub const fn is_engaged(&self) -> bool {
        matches!(self.action, ActuatorAction::Engage)
    }
}

/// Point-in-time view of the monitor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub state: LineState,
    pub warm: bool,
    pub latest: Option<SamplePair>,
    pub actuators: [ActuatorSample; 3],
    /// A deadline-mode sequence is waiting for release.
    pub sequence_active: bool,
    pub actuations: u32,
    pub strategy: ConditioningStrategy,
}

impl StatusSnapshot {
    /// Returns `true` when the conditioning element is across the pair.
    #[must_use]
    pub fn element_engaged(&self) -> bool {
        self.actuators
            .iter()
            .any(|sample| sample.id == ActuatorId::Conditioning && sample.is_engaged())
    }
}

/// Helper that renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the line-state line (e.g. `line state=off-hook tip=-3V ring=-48V delta=45V`).
    pub fn write_line_state<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(writer, "line state={}", self.snapshot.state)?;
        if !self.snapshot.warm {
            writer.write_str(" (warming up)")?;
        }
        match self.snapshot.latest {
            Some(sample) => write_sample(writer, sample),
            None => writer.write_str(" tip=n/a ring=n/a"),
        }
    }

    /// Writes the output line (e.g. `relays COND=released LINE-DISC*=engaged ...`).
    pub fn write_actuators_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("relays")?;
        for sample in &self.snapshot.actuators {
            let line = actuator_by_id(sample.id);
            let state = if sample.is_engaged() {
                "engaged"
            } else {
                "released"
            };
            let level = match sample.level {
                PinLevel::High => "high",
                PinLevel::Low => "low",
            };
            write!(writer, " {}={}({} {})", line.name, state, line.mcu_pin, level)?;
        }
        Ok(())
    }

    /// Writes the sequencer line (e.g. `sequencer strategy=shunt busy=no actuations=2`).
    pub fn write_sequencer_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(
            writer,
            "sequencer strategy={} busy={} actuations={}",
            self.snapshot.strategy,
            if self.snapshot.sequence_active { "yes" } else { "no" },
            self.snapshot.actuations
        )
    }

    /// Writes every status line, each terminated by `\n`.
    pub fn write_all<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        self.write_line_state(writer)?;
        writer.write_char('\n')?;
        self.write_actuators_line(writer)?;
        writer.write_char('\n')?;
        self.write_sequencer_line(writer)?;
        writer.write_char('\n')
    }
}

/// Writes one aligned pair as ` tip=..V ring=..V delta=..V`.
pub fn write_sample<W: fmt::Write>(writer: &mut W, sample: SamplePair) -> fmt::Result {
    write!(
        writer,
        " tip={}V ring={}V delta={}V",
        sample.tip,
        sample.ring,
        sample.delta()
    )
}
