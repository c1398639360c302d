//! Input snapshot and counter types consumed by the shift-cut controller.
//!
//! The hardware layer samples the shift sensor, engine speed, throttle,
//! selected gear, and the free-running timer once per control-loop iteration
//! and hands the result to the controller as an [`InputSnapshot`]. Nothing in
//! this module touches hardware; it only defines the shapes exchanged across
//! that boundary.

pub mod output;

pub use output::{AtomicIgnitionFlags, IgnitionLimitFlags, LIMIT_ENABLE_MASK, limit_asserted};

/// Sample of the free-running hardware tick counter.
///
/// The counter wraps silently at `u32::MAX`, so instants are compared only
/// through [`TickInstant::ticks_since`]. No `Ord`: ordering is undefined
/// across a wrap.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickInstant(u32);

impl TickInstant {
    /// Counter value at power-on.
    pub const ZERO: Self = Self(0);

    /// Wraps a raw counter reading.
    #[must_use]
    pub const fn from_ticks(ticks: u32) -> Self {
        Self(ticks)
    }

    /// Returns the raw counter reading.
    #[must_use]
    pub const fn ticks(self) -> u32 {
        self.0
    }

    /// Ticks elapsed from `earlier` to `self` using modular arithmetic.
    ///
    /// Correct across a single counter wrap, provided the true elapsed time
    /// is shorter than the full counter range.
    #[must_use]
    pub const fn ticks_since(self, earlier: Self) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Advances the instant by `ticks`, wrapping like the hardware counter.
    #[must_use]
    pub const fn wrapping_add(self, ticks: u32) -> Self {
        Self(self.0.wrapping_add(ticks))
    }
}

impl From<u32> for TickInstant {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// One reading of every external input, taken at the start of a tick.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputSnapshot {
    /// `true` while the shift sensor commands a cut.
    pub sensor_triggered: bool,
    /// Engine speed in ECU units (see [`crate::config::SpeedScale`]).
    pub engine_speed: u16,
    pub throttle_position: u8,
    /// Selected gear; `0` is the first indexed gear.
    pub selected_gear: u8,
    pub tick_counter: TickInstant,
}

impl InputSnapshot {
    #[must_use]
    pub const fn new(
        sensor_triggered: bool,
        engine_speed: u16,
        throttle_position: u8,
        selected_gear: u8,
        tick_counter: TickInstant,
    ) -> Self {
        Self {
            sensor_triggered,
            engine_speed,
            throttle_position,
            selected_gear,
            tick_counter,
        }
    }

    /// Snapshot with the sensor released and the engine stopped.
    #[must_use]
    pub const fn idle(tick_counter: TickInstant) -> Self {
        Self::new(false, 0, 0, 0, tick_counter)
    }

    /// Returns a copy taken at a different counter value.
    #[must_use]
    pub const fn at(mut self, tick_counter: TickInstant) -> Self {
        self.tick_counter = tick_counter;
        self
    }
}
