//! Unit conversions for the raw ECU readings.

/// Engine-speed scale: ECU units per rpm, multiplied by 100.
///
/// The stock ECU reports speed scaled up by 2.56, so 3000 rpm reads `0x1E00`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpeedScale {
    pub units_per_rpm_x100: u16,
}

impl SpeedScale {
    pub const STOCK: Self = Self {
        units_per_rpm_x100: 256,
    };

    /// Converts rpm to ECU units, saturating at `u16::MAX`.
    #[must_use]
    pub fn rpm_to_units(self, rpm: u16) -> u16 {
        let scaled = u32::from(rpm) * u32::from(self.units_per_rpm_x100) / 100;
        u16::try_from(scaled).unwrap_or(u16::MAX)
    }

    /// Converts ECU units back to rpm; `None` for a zero scale.
    #[must_use]
    pub fn units_to_rpm(self, units: u16) -> Option<u16> {
        if self.units_per_rpm_x100 == 0 {
            return None;
        }
        let rpm = u32::from(units) * 100 / u32::from(self.units_per_rpm_x100);
        Some(u16::try_from(rpm).unwrap_or(u16::MAX))
    }
}

impl Default for SpeedScale {
    fn default() -> Self {
        Self::STOCK
    }
}

/// Shift-sensor input threshold.
///
/// The sensor pulls its analog input low when the rider pushes the lever, so
/// a reading below `active_below` counts as a trigger.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorThreshold {
    pub active_below: u8,
}

impl SensorThreshold {
    pub const STOCK: Self = Self { active_below: 0x10 };

    #[must_use]
    pub const fn is_triggered(self, raw: u8) -> bool {
        raw < self.active_below
    }
}

impl Default for SensorThreshold {
    fn default() -> Self {
        Self::STOCK
    }
}
