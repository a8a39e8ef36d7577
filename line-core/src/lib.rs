#![no_std]

// Shared logic for the line conditioner.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Hardware is reached only through the `SampleSource`,
// `ActuatorDriver`, and `BlockingDelay` traits.

pub mod acquisition;
pub mod classifier;
pub mod conditioning;
pub mod config;
pub mod history;
pub mod monitor;
pub mod repl;
pub mod sequencer;
pub mod status;
pub mod telemetry;
