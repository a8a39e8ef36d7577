//! Telemetry event catalog and ring buffer shared by firmware and host targets.
//!
//! Events are strongly typed and can be folded into compact numeric codes for
//! transport over a diagnostics channel. The recorder keeps the most recent
//! records in a fixed-capacity ring so front ends can render recent history
//! without the core ever formatting text itself.

use core::{fmt, ops::Add, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::classifier::LineState;
use crate::conditioning::{ActuatorAction, ActuatorId, ConditioningStrategy};
use crate::history::SamplePair;

/// Identifier used when tracking emitted telemetry events.
pub type EventId = u32;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    ActuatorEngaged(ActuatorId),
    ActuatorReleased(ActuatorId),
    WarmupComplete,
    StateChanged { from: LineState, to: LineState },
    SequenceStarted(ConditioningStrategy),
    SequenceComplete(ConditioningStrategy),
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::ActuatorEngaged(line) => write!(f, "actuator-engaged {line}"),
            TelemetryEventKind::ActuatorReleased(line) => write!(f, "actuator-released {line}"),
            TelemetryEventKind::WarmupComplete => f.write_str("warmup-complete"),
            TelemetryEventKind::StateChanged { from, to } => {
                write!(f, "state-changed {from}->{to}")
            }
            TelemetryEventKind::SequenceStarted(strategy) => {
                write!(f, "sequence-started {strategy}")
            }
            TelemetryEventKind::SequenceComplete(strategy) => {
                write!(f, "sequence-complete {strategy}")
            }
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const ACTUATOR_ENGAGED_BASE: u16 = 0x0000;
    const ACTUATOR_RELEASED_BASE: u16 = 0x0004;
    const WARMUP_COMPLETE_CODE: u16 = 0x0008;
    const STATE_CHANGED_BASE: u16 = 0x0010;
    const SEQUENCE_STARTED_BASE: u16 = 0x0020;
    const SEQUENCE_COMPLETE_BASE: u16 = 0x0024;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::ActuatorEngaged(line) => {
                Self::ACTUATOR_ENGAGED_BASE + actuator_index(line)
            }
            TelemetryEventKind::ActuatorReleased(line) => {
                Self::ACTUATOR_RELEASED_BASE + actuator_index(line)
            }
            TelemetryEventKind::WarmupComplete => Self::WARMUP_COMPLETE_CODE,
            TelemetryEventKind::StateChanged { from, to } => {
                Self::STATE_CHANGED_BASE + state_index(from) * 3 + state_index(to)
            }
            TelemetryEventKind::SequenceStarted(strategy) => {
                Self::SEQUENCE_STARTED_BASE + strategy_index(strategy)
            }
            TelemetryEventKind::SequenceComplete(strategy) => {
                Self::SEQUENCE_COMPLETE_BASE + strategy_index(strategy)
            }
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant into a telemetry event, falling back to [`Custom`].
    ///
    /// [`Custom`]: TelemetryEventKind::Custom
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::WARMUP_COMPLETE_CODE => TelemetryEventKind::WarmupComplete,
            value if (Self::ACTUATOR_ENGAGED_BASE..Self::ACTUATOR_RELEASED_BASE).contains(&value) => {
                actuator_from_index(value - Self::ACTUATOR_ENGAGED_BASE)
                    .map_or(TelemetryEventKind::Custom(value), TelemetryEventKind::ActuatorEngaged)
            }
            value if (Self::ACTUATOR_RELEASED_BASE..Self::WARMUP_COMPLETE_CODE).contains(&value) => {
                actuator_from_index(value - Self::ACTUATOR_RELEASED_BASE)
                    .map_or(TelemetryEventKind::Custom(value), TelemetryEventKind::ActuatorReleased)
            }
            value if (Self::STATE_CHANGED_BASE..Self::STATE_CHANGED_BASE + 9).contains(&value) => {
                let offset = value - Self::STATE_CHANGED_BASE;
                match (state_from_index(offset / 3), state_from_index(offset % 3)) {
                    (Some(from), Some(to)) => TelemetryEventKind::StateChanged { from, to },
                    _ => TelemetryEventKind::Custom(value),
                }
            }
            value
                if (Self::SEQUENCE_STARTED_BASE..Self::SEQUENCE_COMPLETE_BASE).contains(&value) =>
            {
                strategy_from_index(value - Self::SEQUENCE_STARTED_BASE)
                    .map_or(TelemetryEventKind::Custom(value), TelemetryEventKind::SequenceStarted)
            }
            value
                if (Self::SEQUENCE_COMPLETE_BASE..Self::SEQUENCE_COMPLETE_BASE + 4)
                    .contains(&value) =>
            {
                strategy_from_index(value - Self::SEQUENCE_COMPLETE_BASE)
                    .map_or(TelemetryEventKind::Custom(value), TelemetryEventKind::SequenceComplete)
            }
            other => TelemetryEventKind::Custom(other),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    /// Details describing an output change.
    Actuator(ActuatorTelemetry),
    /// Sample that completed the window behind a state change.
    Transition(SamplePair),
    /// Summary of a conditioning sequence.
    Sequence(SequenceTelemetry),
    /// Number of sample pairs acquired before the first decision.
    Warmup(u16),
}

impl TelemetryPayload {
    /// Convenience constructor when no payload data is needed.
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

/// Output change payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ActuatorTelemetry {
    pub line: ActuatorId,
    pub action: ActuatorAction,
    pub elapsed_since_previous: Option<Duration>,
}

impl ActuatorTelemetry {
    #[must_use]
    pub const fn new(
        line: ActuatorId,
        action: ActuatorAction,
        elapsed_since_previous: Option<Duration>,
    ) -> Self {
        Self {
            line,
            action,
            elapsed_since_previous,
        }
    }
}

/// Conditioning sequence payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SequenceTelemetry {
    pub dwell: Duration,
    /// Wall time from engage to release; `None` when the sequence is starting.
    pub duration: Option<Duration>,
    pub steps: u8,
}

impl SequenceTelemetry {
    #[must_use]
    pub const fn new(dwell: Duration, duration: Option<Duration>, steps: u8) -> Self {
        Self {
            dwell,
            duration,
            steps,
        }
    }
}

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Instants the monitor can schedule deadlines with.
pub trait MonotonicInstant: TelemetryInstant + Ord + Add<Duration, Output = Self> {}

impl<T> MonotonicInstant for T where T: TelemetryInstant + Ord + Add<Duration, Output = T> {}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    last_drive_at: Option<TInstant>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_drive_at: None,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Records issued from `first` up to the newest, oldest first.
    ///
    /// Identifiers wrap, so membership is measured as a wrapping distance from
    /// `first` rather than by comparing identifiers directly.
    pub fn since(&self, first: EventId) -> impl Iterator<Item = &TelemetryRecord<TInstant>> + '_ {
        let issued = self.next_event_id.wrapping_sub(first);
        self.ring
            .oldest_ordered()
            .filter(move |record| record.id.wrapping_sub(first) < issued)
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Identifier the next record will receive.
    pub const fn next_event_id(&self) -> EventId {
        self.next_event_id
    }

    /// Records an output change and captures elapsed time since the previous change.
    pub fn record_actuator_drive(
        &mut self,
        line: ActuatorId,
        action: ActuatorAction,
        timestamp: TInstant,
    ) -> EventId {
        let elapsed = self
            .last_drive_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_drive_at = Some(timestamp);

        let payload = TelemetryPayload::Actuator(ActuatorTelemetry::new(line, action, elapsed));
        self.record(
            match action {
                ActuatorAction::Engage => TelemetryEventKind::ActuatorEngaged(line),
                ActuatorAction::Release => TelemetryEventKind::ActuatorReleased(line),
            },
            payload,
            timestamp,
        )
    }

    /// Records a decided-state change.
    pub fn record_state_change(
        &mut self,
        from: LineState,
        to: LineState,
        sample: SamplePair,
        timestamp: TInstant,
    ) -> EventId {
        self.record(
            TelemetryEventKind::StateChanged { from, to },
            TelemetryPayload::Transition(sample),
            timestamp,
        )
    }

    /// Records the end of warm-up.
    pub fn record_warmup(&mut self, samples: usize, timestamp: TInstant) -> EventId {
        let samples = u16::try_from(samples).unwrap_or(u16::MAX);
        self.record(
            TelemetryEventKind::WarmupComplete,
            TelemetryPayload::Warmup(samples),
            timestamp,
        )
    }

    /// Records the start of a conditioning sequence.
    pub fn record_sequence_started(
        &mut self,
        strategy: ConditioningStrategy,
        dwell: Duration,
        steps: usize,
        timestamp: TInstant,
    ) -> EventId {
        let payload =
            TelemetryPayload::Sequence(SequenceTelemetry::new(dwell, None, truncate_count(steps)));
        self.record(
            TelemetryEventKind::SequenceStarted(strategy),
            payload,
            timestamp,
        )
    }

    /// Records the completion of a conditioning sequence.
    pub fn record_sequence_completion(
        &mut self,
        strategy: ConditioningStrategy,
        dwell: Duration,
        steps: usize,
        started_at: TInstant,
        timestamp: TInstant,
    ) -> EventId {
        let duration = timestamp.saturating_duration_since(started_at);
        let payload = TelemetryPayload::Sequence(SequenceTelemetry::new(
            dwell,
            Some(duration),
            truncate_count(steps),
        ));
        self.record(
            TelemetryEventKind::SequenceComplete(strategy),
            payload,
            timestamp,
        )
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_count(count: usize) -> u8 {
    u8::try_from(count).unwrap_or(u8::MAX)
}

#[allow(clippy::cast_possible_truncation)]
const fn actuator_index(line: ActuatorId) -> u16 {
    line.as_index() as u16
}

fn actuator_from_index(index: u16) -> Option<ActuatorId> {
    ActuatorId::from_index(usize::from(index))
}

const fn state_index(state: LineState) -> u16 {
    match state {
        LineState::OnHook => 0,
        LineState::OffHook => 1,
        LineState::Ringing => 2,
    }
}

const fn state_from_index(index: u16) -> Option<LineState> {
    match index {
        0 => Some(LineState::OnHook),
        1 => Some(LineState::OffHook),
        2 => Some(LineState::Ringing),
        _ => None,
    }
}

const fn strategy_index(strategy: ConditioningStrategy) -> u16 {
    match strategy {
        ConditioningStrategy::ShuntIsolate => 0,
        ConditioningStrategy::ParallelCapacitor => 1,
    }
}

const fn strategy_from_index(index: u16) -> Option<ConditioningStrategy> {
    match index {
        0 => Some(ConditioningStrategy::ShuntIsolate),
        1 => Some(ConditioningStrategy::ParallelCapacitor),
        _ => None,
    }
}
