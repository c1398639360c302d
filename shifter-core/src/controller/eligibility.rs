//! Shift eligibility rules.

use core::fmt;

use crate::config::ShiftCutConfig;
use crate::signals::InputSnapshot;

/// Reason a sensor trigger did not start a cut.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ineligible {
    /// Engine speed at or below the configured floor.
    SpeedTooLow,
    /// Selected gear is at or above the no-cut gear.
    TopGear,
    ThrottleTooLow,
}

impl Ineligible {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Ineligible::SpeedTooLow => "speed-too-low",
            Ineligible::TopGear => "top-gear",
            Ineligible::ThrottleTooLow => "throttle-too-low",
        }
    }
}

impl fmt::Display for Ineligible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Decides whether the engine is in a state where a cut may start.
///
/// Rules are checked in order: speed, then gear, then throttle. The first
/// failing rule is reported.
///
/// # Errors
///
/// Returns the first [`Ineligible`] rule the inputs violate.
pub fn check_eligibility(
    config: &ShiftCutConfig,
    inputs: &InputSnapshot,
) -> Result<(), Ineligible> {
    if inputs.engine_speed <= config.min_shift_speed {
        return Err(Ineligible::SpeedTooLow);
    }
    if inputs.selected_gear >= config.no_cut_gear {
        return Err(Ineligible::TopGear);
    }
    if inputs.throttle_position < config.min_shift_throttle {
        return Err(Ineligible::ThrottleTooLow);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::TickInstant;

    fn inputs(speed: u16, gear: u8, throttle: u8) -> InputSnapshot {
        InputSnapshot::new(true, speed, throttle, gear, TickInstant::ZERO)
    }

    #[test]
    fn speed_must_exceed_floor() {
        let config = ShiftCutConfig::DEFAULT;

        assert_eq!(
            check_eligibility(&config, &inputs(config.min_shift_speed, 2, 0)),
            Err(Ineligible::SpeedTooLow)
        );
        assert_eq!(
            check_eligibility(&config, &inputs(config.min_shift_speed + 1, 2, 0)),
            Ok(())
        );
    }

    #[test]
    fn top_gear_never_cuts() {
        let config = ShiftCutConfig::DEFAULT;

        assert_eq!(check_eligibility(&config, &inputs(0x4000, 5, 0)), Ok(()));
        assert_eq!(
            check_eligibility(&config, &inputs(0x4000, 6, 0)),
            Err(Ineligible::TopGear)
        );
        assert_eq!(
            check_eligibility(&config, &inputs(0x4000, u8::MAX, 0)),
            Err(Ineligible::TopGear)
        );
    }

    #[test]
    fn throttle_floor_is_inclusive() {
        let config = ShiftCutConfig {
            min_shift_throttle: 40,
            ..ShiftCutConfig::DEFAULT
        };

        assert_eq!(
            check_eligibility(&config, &inputs(0x4000, 2, 39)),
            Err(Ineligible::ThrottleTooLow)
        );
        assert_eq!(check_eligibility(&config, &inputs(0x4000, 2, 40)), Ok(()));
    }

    #[test]
    fn speed_is_reported_before_gear_and_throttle() {
        let config = ShiftCutConfig {
            min_shift_throttle: 40,
            ..ShiftCutConfig::DEFAULT
        };

        assert_eq!(
            check_eligibility(&config, &inputs(0x100, 6, 0)),
            Err(Ineligible::SpeedTooLow)
        );
        assert_eq!(
            check_eligibility(&config, &inputs(0x4000, 6, 0)),
            Err(Ineligible::TopGear)
        );
    }
}
