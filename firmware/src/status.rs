#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! The monitor task publishes every cycle into these atomics and the
//! diagnostics task rebuilds a `StatusSnapshot` from them without touching the
//! monitor itself.

use line_core::classifier::LineState;
use line_core::conditioning::{ALL_ACTUATORS, ActuatorAction, ActuatorId, ConditioningStrategy};
use line_core::history::SamplePair;
use line_core::status::{ActuatorSample, StatusSnapshot};
use portable_atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

/// Decided line state (see [`encode_state`]).
static LINE_STATE: AtomicU8 = AtomicU8::new(0);
/// Set once the sample histories are full.
static WARM: AtomicBool = AtomicBool::new(false);
/// Latest aligned sample: tip in the high half, ring in the low half.
static LATEST_SAMPLE: AtomicU32 = AtomicU32::new(0);
/// Set once [`LATEST_SAMPLE`] holds a reading.
static HAS_SAMPLE: AtomicBool = AtomicBool::new(false);
/// Bitmask of engaged outputs (1 == engaged).
static ACTUATOR_MASK: AtomicU8 = AtomicU8::new(0);
/// Set while a conditioning sequence holds the outputs.
static SEQUENCE_ACTIVE: AtomicBool = AtomicBool::new(false);
/// Completed conditioning sequences since boot.
static ACTUATIONS: AtomicU32 = AtomicU32::new(0);
/// Active strategy (0 == shunt, 1 == capacitor).
static STRATEGY: AtomicU8 = AtomicU8::new(0);

fn bit_for(id: ActuatorId) -> u8 {
    1 << id.as_index()
}

const fn encode_state(state: LineState) -> u8 {
    match state {
        LineState::OnHook => 0,
        LineState::OffHook => 1,
        LineState::Ringing => 2,
    }
}

const fn decode_state(raw: u8) -> LineState {
    match raw {
        1 => LineState::OffHook,
        2 => LineState::Ringing,
        _ => LineState::OnHook,
    }
}

#[allow(clippy::cast_sign_loss)]
fn pack_sample(pair: SamplePair) -> u32 {
    (u32::from(pair.tip as u16) << 16) | u32::from(pair.ring as u16)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn unpack_sample(raw: u32) -> SamplePair {
    SamplePair::new((raw >> 16) as u16 as i16, raw as u16 as i16)
}

/// Stores the monitor state captured at the end of a cycle.
pub fn publish(snapshot: &StatusSnapshot) {
    LINE_STATE.store(encode_state(snapshot.state), Ordering::Relaxed);
    WARM.store(snapshot.warm, Ordering::Relaxed);
    if let Some(pair) = snapshot.latest {
        LATEST_SAMPLE.store(pack_sample(pair), Ordering::Relaxed);
    }
    HAS_SAMPLE.store(snapshot.latest.is_some(), Ordering::Relaxed);

    let mask = snapshot
        .actuators
        .iter()
        .filter(|sample| sample.is_engaged())
        .fold(0, |mask, sample| mask | bit_for(sample.id));
    ACTUATOR_MASK.store(mask, Ordering::Relaxed);

    SEQUENCE_ACTIVE.store(snapshot.sequence_active, Ordering::Relaxed);
    ACTUATIONS.store(snapshot.actuations, Ordering::Relaxed);
    let strategy = match snapshot.strategy {
        ConditioningStrategy::ShuntIsolate => 0,
        ConditioningStrategy::ParallelCapacitor => 1,
    };
    STRATEGY.store(strategy, Ordering::Relaxed);
}

/// Returns the published line state.
pub fn line_state() -> LineState {
    decode_state(LINE_STATE.load(Ordering::Relaxed))
}

/// Builds a [`StatusSnapshot`] from the stored values.
pub fn snapshot() -> StatusSnapshot {
    let mask = ACTUATOR_MASK.load(Ordering::Relaxed);
    let actuators = ALL_ACTUATORS.map(|line| {
        let action = if mask & bit_for(line.id) == 0 {
            ActuatorAction::Release
        } else {
            ActuatorAction::Engage
        };
        ActuatorSample::new(line.id, action, line.level_for(action))
    });

    StatusSnapshot {
        state: line_state(),
        warm: WARM.load(Ordering::Relaxed),
        latest: HAS_SAMPLE
            .load(Ordering::Relaxed)
            .then(|| unpack_sample(LATEST_SAMPLE.load(Ordering::Relaxed))),
        actuators,
        sequence_active: SEQUENCE_ACTIVE.load(Ordering::Relaxed),
        actuations: ACTUATIONS.load(Ordering::Relaxed),
        strategy: match STRATEGY.load(Ordering::Relaxed) {
            1 => ConditioningStrategy::ParallelCapacitor,
            _ => ConditioningStrategy::ShuntIsolate,
        },
    }
}
