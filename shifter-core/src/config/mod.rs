//! Field-tunable thresholds for the shift-cut controller.
//!
//! Values mirror the calibration shipped on the stock ECU patch: a 70 ms cut,
//! a 300 ms rearm delay, a 3000 rpm floor, and a 10 MHz timer. Every value is
//! expected to be adjusted in the field, so none of them are baked into the
//! controller logic.

use core::fmt;

pub mod calibration;

pub use calibration::{SensorThreshold, SpeedScale};

/// Default ignition-cut length.
pub const DEFAULT_KILL_TIME_MS: u16 = 70;
/// Default rearm delay after any cut attempt.
pub const DEFAULT_COOLDOWN_TIME_MS: u16 = 300;
/// 3000 rpm expressed in ECU speed units.
pub const DEFAULT_MIN_SHIFT_SPEED: u16 = 0x1E00;
pub const DEFAULT_MIN_SHIFT_THROTTLE: u8 = 0;
/// First gear index for which cuts are refused.
pub const DEFAULT_NO_CUT_GEAR: u8 = 6;
/// Tick rate of the 10 MHz free-running timer.
pub const DEFAULT_TICKS_PER_MS: u32 = 10_000;

/// Longest cut or cooldown, in ticks, that the wrap-safe comparison accepts.
pub const MAX_TIMED_TICKS: u32 = u32::MAX / 2;

/// Tunables consumed by [`ShiftCutController`](crate::controller::ShiftCutController).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ShiftCutConfig {
    pub kill_time_ms: u16,
    pub cooldown_time_ms: u16,
    /// Engine speed must be strictly above this value.
    pub min_shift_speed: u16,
    /// Throttle must be at or above this value.
    pub min_shift_throttle: u8,
    /// Gears at or above this index never cut.
    pub no_cut_gear: u8,
    pub ticks_per_ms: u32,
}

impl ShiftCutConfig {
    pub const DEFAULT: Self = Self {
        kill_time_ms: DEFAULT_KILL_TIME_MS,
        cooldown_time_ms: DEFAULT_COOLDOWN_TIME_MS,
        min_shift_speed: DEFAULT_MIN_SHIFT_SPEED,
        min_shift_throttle: DEFAULT_MIN_SHIFT_THROTTLE,
        no_cut_gear: DEFAULT_NO_CUT_GEAR,
        ticks_per_ms: DEFAULT_TICKS_PER_MS,
    };

    /// Converts milliseconds to timer ticks, or `None` on overflow.
    #[must_use]
    pub fn ms_to_ticks(&self, ms: u16) -> Option<u32> {
        u32::from(ms).checked_mul(self.ticks_per_ms)
    }

    /// Cut length in ticks.
    #[must_use]
    pub fn kill_ticks(&self) -> u32 {
        u32::from(self.kill_time_ms).saturating_mul(self.ticks_per_ms)
    }

    /// Rearm delay in ticks.
    #[must_use]
    pub fn cooldown_ticks(&self) -> u32 {
        u32::from(self.cooldown_time_ms).saturating_mul(self.ticks_per_ms)
    }

    /// Checks that the timer scale is usable and both timed phases can end.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroTickRate`] when `ticks_per_ms` is zero, or a
    /// `*TooLong` variant when a duration exceeds [`MAX_TIMED_TICKS`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticks_per_ms == 0 {
            return Err(ConfigError::ZeroTickRate);
        }

        if !self.fits_timer(self.kill_time_ms) {
            return Err(ConfigError::KillTimeTooLong {
                ms: self.kill_time_ms,
            });
        }

        if !self.fits_timer(self.cooldown_time_ms) {
            return Err(ConfigError::CooldownTooLong {
                ms: self.cooldown_time_ms,
            });
        }

        Ok(())
    }

    fn fits_timer(&self, ms: u16) -> bool {
        self.ms_to_ticks(ms)
            .is_some_and(|ticks| ticks <= MAX_TIMED_TICKS)
    }
}

impl Default for ShiftCutConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Reasons a [`ShiftCutConfig`] is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Timer scale of zero would make every duration instantaneous.
    ZeroTickRate,
    KillTimeTooLong { ms: u16 },
    CooldownTooLong { ms: u16 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroTickRate => f.write_str("ticks-per-ms must be non-zero"),
            ConfigError::KillTimeTooLong { ms } => {
                write!(f, "kill time {ms}ms exceeds the timer range")
            }
            ConfigError::CooldownTooLong { ms } => {
                write!(f, "cooldown time {ms}ms exceeds the timer range")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_calibration() {
        let config = ShiftCutConfig::default();

        assert_eq!(config.kill_ticks(), 700_000);
        assert_eq!(config.cooldown_ticks(), 3_000_000);
        assert_eq!(config.min_shift_speed, 0x1E00);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn zero_tick_rate_is_rejected() {
        let config = ShiftCutConfig {
            ticks_per_ms: 0,
            ..ShiftCutConfig::DEFAULT
        };

        assert_eq!(config.validate(), Err(ConfigError::ZeroTickRate));
    }

    #[test]
    fn durations_beyond_half_counter_range_are_rejected() {
        // 65 535 ms at 100 MHz overflows half of the 32-bit range.
        let config = ShiftCutConfig {
            cooldown_time_ms: u16::MAX,
            ticks_per_ms: 100_000,
            ..ShiftCutConfig::DEFAULT
        };

        assert_eq!(
            config.validate(),
            Err(ConfigError::CooldownTooLong { ms: u16::MAX })
        );
    }

    #[test]
    fn kill_time_is_checked_before_cooldown() {
        let config = ShiftCutConfig {
            kill_time_ms: u16::MAX,
            cooldown_time_ms: u16::MAX,
            ticks_per_ms: u32::MAX,
            ..ShiftCutConfig::DEFAULT
        };

        assert_eq!(
            config.validate(),
            Err(ConfigError::KillTimeTooLong { ms: u16::MAX })
        );
        assert_eq!(config.kill_ticks(), u32::MAX);
    }

    #[test]
    fn longest_millisecond_value_fits_default_timer() {
        let config = ShiftCutConfig {
            kill_time_ms: u16::MAX,
            cooldown_time_ms: u16::MAX,
            ..ShiftCutConfig::DEFAULT
        };

        assert_eq!(config.ms_to_ticks(u16::MAX), Some(655_350_000));
        assert_eq!(config.validate(), Ok(()));
    }
}
