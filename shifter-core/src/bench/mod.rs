//! Simulated hardware for exercising the controller off-target.
//!
//! [`BenchHarness`] stands in for the ECU: it holds the input registers, the
//! shared ignition-limit flags byte, and the free-running counter, and calls
//! the controller the way a periodic control loop would. The emulator and the
//! integration tests both drive the controller through it.

use heapless::Vec;

use crate::config::{SensorThreshold, SpeedScale};
use crate::controller::{ShiftCutController, Transition, TransitionObserver};
use crate::repl::status::StatusSnapshot;
use crate::signals::{InputSnapshot, TickInstant};
use crate::telemetry::TelemetryRecorder;

/// Ticks between controller invocations while advancing time (100 µs at 10 MHz).
pub const DEFAULT_POLL_INTERVAL_TICKS: u32 = 1_000;

/// Transitions retained per report; later ones are only counted.
pub const MAX_REPORTED_TRANSITIONS: usize = 8;

/// Transitions produced by one bench operation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TickReport {
    /// Number of controller invocations performed.
    pub invocations: u32,
    pub transitions: Vec<Transition, MAX_REPORTED_TRANSITIONS>,
    /// Transitions that did not fit in `transitions`.
    pub dropped: u32,
}

impl TickReport {
    fn push(&mut self, transition: Transition) {
        if self.transitions.push(transition).is_err() {
            self.dropped = self.dropped.saturating_add(1);
        }
    }
}

struct BenchObserver<'a> {
    telemetry: &'a mut TelemetryRecorder,
    report: &'a mut TickReport,
}

impl TransitionObserver for BenchObserver<'_> {
    fn on_transition(&mut self, transition: Transition) {
        self.telemetry.record_transition(&transition);
        self.report.push(transition);
    }
}

/// Host-side stand-in for the ECU surrounding the controller.
pub struct BenchHarness {
    controller: ShiftCutController,
    inputs: InputSnapshot,
    flags: u8,
    telemetry: TelemetryRecorder,
    poll_interval: u32,
    speed_scale: SpeedScale,
    sensor_threshold: SensorThreshold,
}

impl BenchHarness {
    /// Wraps a controller with idle inputs and a cleared flags byte.
    #[must_use]
    pub fn new(controller: ShiftCutController) -> Self {
        Self {
            controller,
            inputs: InputSnapshot::idle(TickInstant::ZERO),
            flags: 0,
            telemetry: TelemetryRecorder::new(),
            poll_interval: DEFAULT_POLL_INTERVAL_TICKS,
            speed_scale: SpeedScale::STOCK,
            sensor_threshold: SensorThreshold::STOCK,
        }
    }

    /// Sets the spacing between invocations used by [`BenchHarness::advance`].
    ///
    /// Zero is treated as one tick.
    #[must_use]
    pub fn with_poll_interval(mut self, ticks: u32) -> Self {
        self.poll_interval = ticks.max(1);
        self
    }

    #[must_use]
    pub const fn controller(&self) -> &ShiftCutController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ShiftCutController {
        &mut self.controller
    }

    #[must_use]
    pub const fn inputs(&self) -> &InputSnapshot {
        &self.inputs
    }

    #[must_use]
    pub const fn flags(&self) -> u8 {
        self.flags
    }

    /// Overwrites the flags byte, as the ECU's own limiter logic might.
    pub fn set_flags(&mut self, flags: u8) {
        self.flags = flags;
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    #[must_use]
    pub const fn now(&self) -> TickInstant {
        self.inputs.tick_counter
    }

    #[must_use]
    pub const fn poll_interval(&self) -> u32 {
        self.poll_interval
    }

    #[must_use]
    pub const fn speed_scale(&self) -> SpeedScale {
        self.speed_scale
    }

    pub fn set_sensor(&mut self, triggered: bool) {
        self.inputs.sensor_triggered = triggered;
    }

    /// Applies a raw sensor voltage reading and returns whether it triggers.
    pub fn set_sensor_raw(&mut self, raw: u8) -> bool {
        let triggered = self.sensor_threshold.is_triggered(raw);
        self.inputs.sensor_triggered = triggered;
        triggered
    }

    pub fn set_engine_speed(&mut self, units: u16) {
        self.inputs.engine_speed = units;
    }

    /// Sets engine speed from rpm and returns the resulting ECU units.
    pub fn set_rpm(&mut self, rpm: u16) -> u16 {
        let units = self.speed_scale.rpm_to_units(rpm);
        self.inputs.engine_speed = units;
        units
    }

    pub fn set_throttle(&mut self, position: u8) {
        self.inputs.throttle_position = position;
    }

    pub fn set_gear(&mut self, gear: u8) {
        self.inputs.selected_gear = gear;
    }

    /// Jumps the counter without invoking the controller.
    pub fn set_counter(&mut self, counter: TickInstant) {
        self.inputs.tick_counter = counter;
    }

    /// Invokes the controller `count` times without moving the counter.
    pub fn tick(&mut self, count: u32) -> TickReport {
        let mut report = TickReport::default();
        for _ in 0..count {
            self.invoke(&mut report);
        }
        report
    }

    /// Invokes the controller once at the current counter value.
    pub fn tick_once(&mut self) -> TickReport {
        self.tick(1)
    }

    /// Moves the counter forward by `ticks`, invoking the controller after
    /// every poll interval and once more at the final value.
    pub fn advance(&mut self, ticks: u32) -> TickReport {
        let mut report = TickReport::default();
        let mut remaining = ticks;

        while remaining > 0 {
            let step = remaining.min(self.poll_interval);
            self.inputs.tick_counter = self.inputs.tick_counter.wrapping_add(step);
            remaining -= step;
            self.invoke(&mut report);
        }

        report
    }

    /// Restores power-on state: fresh controller with the current tunables,
    /// idle inputs at counter zero, cleared flags and telemetry.
    pub fn reset(&mut self) {
        self.controller.restart();
        self.inputs = InputSnapshot::idle(TickInstant::ZERO);
        self.flags = 0;
        self.telemetry = TelemetryRecorder::new();
    }

    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            controller: self.controller.snapshot(self.now()),
            inputs: self.inputs,
            flags: self.flags,
            counters: self.telemetry.counters(),
            ticks_per_ms: self.controller.config().ticks_per_ms,
        }
    }

    fn invoke(&mut self, report: &mut TickReport) {
        report.invocations = report.invocations.saturating_add(1);
        let mut observer = BenchObserver {
            telemetry: &mut self.telemetry,
            report,
        };
        self.controller
            .tick_observed(&self.inputs, &mut self.flags, &mut observer);
    }
}

impl Default for BenchHarness {
    fn default() -> Self {
        Self::new(ShiftCutController::with_defaults())
    }
}
