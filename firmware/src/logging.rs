#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! defmt / console mirrors of the monitor telemetry.
//!
//! Each helper comes in a target flavour (defmt over RTT) and a host flavour
//! (`println!`) with the same text, so bring-up logs and host runs read alike.

use core::fmt::Write;
use core::time::Duration;

use heapless::String;
use line_core::classifier::LineState;
use line_core::conditioning::{ActuatorAction, ActuatorId, ConditioningStrategy, actuator_by_id};
use line_core::config::ConfigError;
use line_core::history::SamplePair;
use line_core::status::{StatusFormatter, StatusSnapshot};
use line_core::telemetry::{TelemetryEventKind, TelemetryPayload, TelemetryRecord};

use crate::clock::FirmwareInstant;

/// Longest rendered status line.
pub const STATUS_LINE_LEN: usize = 128;

/// Status rendered as the three formatter lines.
pub type StatusLines = [String<STATUS_LINE_LEN>; 3];

/// Mirrors one telemetry record to the log.
pub fn log_record(record: &TelemetryRecord<FirmwareInstant>) {
    let timestamp = record.timestamp;
    match (record.event, record.details) {
        (TelemetryEventKind::WarmupComplete, TelemetryPayload::Warmup(samples)) => {
            log_warmup(samples, timestamp);
        }
        (TelemetryEventKind::StateChanged { from, to }, TelemetryPayload::Transition(sample)) => {
            log_state_change(from, to, sample, timestamp);
        }
        (
            TelemetryEventKind::ActuatorEngaged(line) | TelemetryEventKind::ActuatorReleased(line),
            TelemetryPayload::Actuator(drive),
        ) => log_actuator_drive(line, drive.action, timestamp, drive.elapsed_since_previous),
        (TelemetryEventKind::SequenceStarted(strategy), TelemetryPayload::Sequence(summary)) => {
            log_sequence_started(strategy, summary.dwell, summary.steps, timestamp);
        }
        (TelemetryEventKind::SequenceComplete(strategy), TelemetryPayload::Sequence(summary)) => {
            log_sequence_complete(
                strategy,
                summary.duration.unwrap_or(summary.dwell),
                timestamp,
            );
        }
        _ => {}
    }
}

/// Renders a snapshot into fixed-capacity lines.
///
/// [`STATUS_LINE_LEN`] holds every line the formatter can produce, extreme
/// readings included. Should a line outgrow it, the first write that does not
/// fit is dropped along with everything after it on that line.
pub fn status_lines(snapshot: &StatusSnapshot) -> StatusLines {
    let formatter = StatusFormatter::new(snapshot);
    let mut lines = StatusLines::default();
    let [state, relays, sequencer] = &mut lines;
    let _ = formatter.write_line_state(state);
    let _ = formatter.write_actuators_line(relays);
    let _ = formatter.write_sequencer_line(sequencer);
    lines
}

/// Renders a pair as tip, ring and delta volts.
fn sample_label(sample: SamplePair) -> String<48> {
    let mut label = String::new();
    let _ = write!(
        label,
        "tip={}V ring={}V delta={}V",
        sample.tip,
        sample.ring,
        sample.delta()
    );
    label
}

const fn action_label(action: ActuatorAction) -> &'static str {
    match action {
        ActuatorAction::Engage => "engage",
        ActuatorAction::Release => "release",
    }
}

const fn state_label(state: LineState) -> &'static str {
    match state {
        LineState::OnHook => "on-hook",
        LineState::OffHook => "off-hook",
        LineState::Ringing => "ringing",
    }
}

const fn strategy_label(strategy: ConditioningStrategy) -> &'static str {
    match strategy {
        ConditioningStrategy::ShuntIsolate => "shunt",
        ConditioningStrategy::ParallelCapacitor => "capacitor",
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(target_os = "none")]
fn log_warmup(samples: u16, timestamp: FirmwareInstant) {
    defmt::info!(
        "monitor: warm after {} samples t={}us",
        samples,
        timestamp.as_micros()
    );
}

#[cfg(not(target_os = "none"))]
fn log_warmup(samples: u16, timestamp: FirmwareInstant) {
    println!(
        "monitor: warm after {} samples t={}us",
        samples,
        timestamp.as_micros()
    );
}

#[cfg(target_os = "none")]
fn log_state_change(from: LineState, to: LineState, sample: SamplePair, timestamp: FirmwareInstant) {
    let label = sample_label(sample);
    defmt::info!(
        "monitor: {} -> {} {} t={}us",
        state_label(from),
        state_label(to),
        label.as_str(),
        timestamp.as_micros()
    );
}

#[cfg(not(target_os = "none"))]
fn log_state_change(from: LineState, to: LineState, sample: SamplePair, timestamp: FirmwareInstant) {
    let label = sample_label(sample);
    println!(
        "monitor: {} -> {} {} t={}us",
        state_label(from),
        state_label(to),
        label.as_str(),
        timestamp.as_micros()
    );
}

#[cfg(target_os = "none")]
fn log_actuator_drive(
    line: ActuatorId,
    action: ActuatorAction,
    timestamp: FirmwareInstant,
    elapsed: Option<Duration>,
) {
    let wiring = actuator_by_id(line);
    match elapsed {
        Some(delta) => defmt::info!(
            "relays:{} {} pin={} driver={} t={}us Δ={}ms",
            wiring.name,
            action_label(action),
            wiring.mcu_pin,
            wiring.driver_output,
            timestamp.as_micros(),
            millis(delta)
        ),
        None => defmt::info!(
            "relays:{} {} pin={} driver={} t={}us",
            wiring.name,
            action_label(action),
            wiring.mcu_pin,
            wiring.driver_output,
            timestamp.as_micros()
        ),
    }
}

#[cfg(not(target_os = "none"))]
fn log_actuator_drive(
    line: ActuatorId,
    action: ActuatorAction,
    timestamp: FirmwareInstant,
    elapsed: Option<Duration>,
) {
    let wiring = actuator_by_id(line);
    match elapsed {
        Some(delta) => println!(
            "relays:{} {} pin={} driver={} t={}us Δ={}ms",
            wiring.name,
            action_label(action),
            wiring.mcu_pin,
            wiring.driver_output,
            timestamp.as_micros(),
            millis(delta)
        ),
        None => println!(
            "relays:{} {} pin={} driver={} t={}us",
            wiring.name,
            action_label(action),
            wiring.mcu_pin,
            wiring.driver_output,
            timestamp.as_micros()
        ),
    }
}

#[cfg(target_os = "none")]
fn log_sequence_started(
    strategy: ConditioningStrategy,
    dwell: Duration,
    steps: u8,
    timestamp: FirmwareInstant,
) {
    defmt::info!(
        "sequencer: {} engaged dwell={}ms steps={} t={}us",
        strategy_label(strategy),
        millis(dwell),
        steps,
        timestamp.as_micros()
    );
}

#[cfg(not(target_os = "none"))]
fn log_sequence_started(
    strategy: ConditioningStrategy,
    dwell: Duration,
    steps: u8,
    timestamp: FirmwareInstant,
) {
    println!(
        "sequencer: {} engaged dwell={}ms steps={} t={}us",
        strategy_label(strategy),
        millis(dwell),
        steps,
        timestamp.as_micros()
    );
}

#[cfg(target_os = "none")]
fn log_sequence_complete(strategy: ConditioningStrategy, held: Duration, timestamp: FirmwareInstant) {
    defmt::info!(
        "sequencer: {} released after {}ms t={}us",
        strategy_label(strategy),
        millis(held),
        timestamp.as_micros()
    );
}

#[cfg(not(target_os = "none"))]
fn log_sequence_complete(strategy: ConditioningStrategy, held: Duration, timestamp: FirmwareInstant) {
    println!(
        "sequencer: {} released after {}ms t={}us",
        strategy_label(strategy),
        millis(held),
        timestamp.as_micros()
    );
}

#[cfg(target_os = "none")]
pub fn log_status(snapshot: &StatusSnapshot) {
    for line in &status_lines(snapshot) {
        defmt::info!("status: {}", line.as_str());
    }
}

#[cfg(not(target_os = "none"))]
pub fn log_status(snapshot: &StatusSnapshot) {
    for line in &status_lines(snapshot) {
        println!("status: {}", line.as_str());
    }
}

#[cfg(target_os = "none")]
pub fn log_config_error(error: &ConfigError) {
    defmt::error!(
        "monitor: configuration rejected: {}",
        defmt::Display2Format(error)
    );
}

#[cfg(not(target_os = "none"))]
pub fn log_config_error(error: &ConfigError) {
    println!("monitor: configuration rejected: {error}");
}
