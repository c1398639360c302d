#![no_std]

// Quickshifter ignition-cut logic.
//
// The controller is polled from the ECU's periodic loop, reads a snapshot of
// the input registers, and drives the ignition-limit flags. Everything here
// avoids the Rust standard library so the same code runs on the ECU and in
// host tooling.

pub mod bench;
pub mod config;
pub mod controller;
pub mod repl;
pub mod signals;
pub mod telemetry;
