//! Shared status surface for the REPL.
//!
//! [`StatusSnapshot`] bundles the controller view with the inputs and flags
//! byte it last saw so the `status` command renders the same text on every
//! front-end.

use core::fmt;

use crate::controller::{ControllerSnapshot, ShiftState};
use crate::signals::{InputSnapshot, limit_asserted};
use crate::telemetry::ShiftCounters;

/// Snapshot of everything the `status` command reports.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusSnapshot {
    pub controller: ControllerSnapshot,
    pub inputs: InputSnapshot,
    pub flags: u8,
    pub counters: ShiftCounters,
    pub ticks_per_ms: u32,
}

impl StatusSnapshot {
    /// Returns `true` when the shared flags byte currently requests a cut.
    #[must_use]
    pub const fn limit_asserted(&self) -> bool {
        limit_asserted(self.flags)
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let controller = &self.controller;
        write!(f, "state={}", controller.state)?;
        match (controller.state, controller.remaining_ticks) {
            (ShiftState::Active, Some(remaining)) => write!(
                f,
                " kill-start={} target={} remaining={}",
                controller.kill_start.ticks(),
                controller.kill_target_duration,
                format_ticks(remaining, self.ticks_per_ms),
            )?,
            (ShiftState::Cooldown, Some(remaining)) => write!(
                f,
                " cooldown-start={} remaining={}",
                controller.cooldown_start.ticks(),
                format_ticks(remaining, self.ticks_per_ms),
            )?,
            _ => {}
        }
        writeln!(
            f,
            " limit={} flags=0x{:02X}",
            if self.limit_asserted() { "on" } else { "off" },
            self.flags
        )?;

        let inputs = &self.inputs;
        writeln!(
            f,
            "sensor={} speed=0x{:04X} throttle={} gear={} counter={}",
            if inputs.sensor_triggered { "on" } else { "off" },
            inputs.engine_speed,
            inputs.throttle_position,
            inputs.selected_gear,
            inputs.tick_counter.ticks(),
        )?;

        write!(
            f,
            "cuts={} rejections={}",
            self.counters.cuts, self.counters.rejections
        )
    }
}

/// Renders a tick count as milliseconds with one decimal place.
#[must_use]
pub fn format_ticks(ticks: u32, ticks_per_ms: u32) -> TicksAsMillis {
    TicksAsMillis {
        ticks,
        ticks_per_ms,
    }
}

/// Display adapter produced by [`format_ticks`].
pub struct TicksAsMillis {
    ticks: u32,
    ticks_per_ms: u32,
}

impl fmt::Display for TicksAsMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ticks_per_ms == 0 {
            return write!(f, "{}t", self.ticks);
        }
        let tenths = u64::from(self.ticks) * 10 / u64::from(self.ticks_per_ms);
        write!(f, "{}.{}ms", tenths / 10, tenths % 10)
    }
}
