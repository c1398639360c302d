//! High-level REPL command dispatcher.
//!
//! This module glues parsed grammar commands to the [`BenchHarness`]: input
//! registers are written, the controller is polled, and tunables are pushed
//! through [`ShiftCutController::set_config`](crate::controller::ShiftCutController::set_config).
//! It stays `no_std` friendly so any front-end can share the same behaviour.

use core::fmt;
use core::time::Duration;

use crate::bench::{BenchHarness, TickReport};
use crate::config::{ConfigError, ShiftCutConfig};
use crate::signals::{InputSnapshot, TickInstant};

use super::grammar::{self, Command, SensorCommand, Tunable};
use super::status::StatusSnapshot;

/// Longest span a single `advance` may cover.
pub const MAX_ADVANCE: Duration = Duration::from_secs(60);

/// Largest repeat count accepted by `tick`.
pub const MAX_TICK_BATCH: u32 = 10_000;

/// Command execution successes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome<'a> {
    /// An input register changed; carries the resulting inputs.
    Inputs(InputSnapshot),
    SensorRaw { raw: u8, triggered: bool },
    Rpm { rpm: u16, units: u16 },
    Counter(TickInstant),
    Ticked(TickReport),
    Advanced { ticks: u32, report: TickReport },
    Configured(ShiftCutConfig),
    Status(StatusSnapshot),
    /// Telemetry should be rendered from [`CommandExecutor::harness`].
    Events,
    Reset,
    Help(Option<&'a str>),
}

/// Errors surfaced while executing a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError {
    Parse(grammar::ParseError),
    OutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },
    Config(ConfigError),
    AdvanceTooLong(Duration),
}

impl From<grammar::ParseError> for CommandError {
    fn from(error: grammar::ParseError) -> Self {
        Self::Parse(error)
    }
}

impl From<ConfigError> for CommandError {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(error) => write!(f, "parse error: {error}"),
            CommandError::OutOfRange { field, value, max } => {
                write!(f, "{field} {value} out of range (max {max})")
            }
            CommandError::Config(error) => write!(f, "rejected: {error}"),
            CommandError::AdvanceTooLong(duration) => write!(
                f,
                "advance of {}ms exceeds the {}s limit",
                duration.as_millis(),
                MAX_ADVANCE.as_secs()
            ),
        }
    }
}

/// Dispatches REPL commands into the bench harness.
pub struct CommandExecutor {
    harness: BenchHarness,
}

impl CommandExecutor {
    /// Creates a new executor around the provided harness.
    #[must_use]
    pub const fn new(harness: BenchHarness) -> Self {
        Self { harness }
    }

    #[must_use]
    pub const fn harness(&self) -> &BenchHarness {
        &self.harness
    }

    pub fn harness_mut(&mut self) -> &mut BenchHarness {
        &mut self.harness
    }

    /// Consumes the executor and yields the inner harness.
    #[must_use]
    pub fn into_inner(self) -> BenchHarness {
        self.harness
    }

    /// Parses and executes a REPL command.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when the line does not parse, a value does
    /// not fit its register, or the controller refuses a tunable.
    pub fn execute<'a>(&mut self, line: &'a str) -> Result<CommandOutcome<'a>, CommandError> {
        let command = grammar::parse(line)?;
        self.dispatch(command)
    }

    fn dispatch<'a>(&mut self, command: Command<'a>) -> Result<CommandOutcome<'a>, CommandError> {
        let harness = &mut self.harness;
        let outcome = match command {
            Command::Sensor(SensorCommand::On) => {
                harness.set_sensor(true);
                CommandOutcome::Inputs(*harness.inputs())
            }
            Command::Sensor(SensorCommand::Off) => {
                harness.set_sensor(false);
                CommandOutcome::Inputs(*harness.inputs())
            }
            Command::Sensor(SensorCommand::Raw(value)) => {
                let raw = narrow_u8("sensor", value)?;
                let triggered = harness.set_sensor_raw(raw);
                CommandOutcome::SensorRaw { raw, triggered }
            }
            Command::Speed(value) => {
                harness.set_engine_speed(narrow_u16("speed", value)?);
                CommandOutcome::Inputs(*harness.inputs())
            }
            Command::Rpm(value) => {
                let rpm = narrow_u16("rpm", value)?;
                let units = harness.set_rpm(rpm);
                CommandOutcome::Rpm { rpm, units }
            }
            Command::Throttle(value) => {
                harness.set_throttle(narrow_u8("throttle", value)?);
                CommandOutcome::Inputs(*harness.inputs())
            }
            Command::Gear(value) => {
                harness.set_gear(narrow_u8("gear", value)?);
                CommandOutcome::Inputs(*harness.inputs())
            }
            Command::Counter(value) => {
                let counter = TickInstant::from_ticks(value);
                harness.set_counter(counter);
                CommandOutcome::Counter(counter)
            }
            Command::Tick(count) => {
                let count = count.unwrap_or(1);
                if count > MAX_TICK_BATCH {
                    return Err(CommandError::OutOfRange {
                        field: "tick count",
                        value: count,
                        max: MAX_TICK_BATCH,
                    });
                }
                CommandOutcome::Ticked(harness.tick(count))
            }
            Command::Advance(duration) => {
                let ticks = advance_ticks(duration, harness.controller().config().ticks_per_ms)?;
                let report = harness.advance(ticks);
                CommandOutcome::Advanced { ticks, report }
            }
            Command::Set(tunable, value) => {
                let config = apply_tunable(*harness.controller().config(), tunable, value)?;
                harness.controller_mut().set_config(config)?;
                CommandOutcome::Configured(config)
            }
            Command::Status => CommandOutcome::Status(harness.status()),
            Command::Events => CommandOutcome::Events,
            Command::Reset => {
                harness.reset();
                CommandOutcome::Reset
            }
            Command::Help(topic) => CommandOutcome::Help(topic),
        };

        Ok(outcome)
    }
}

fn apply_tunable(
    mut config: ShiftCutConfig,
    tunable: Tunable,
    value: u32,
) -> Result<ShiftCutConfig, CommandError> {
    match tunable {
        Tunable::KillTime => config.kill_time_ms = narrow_u16(tunable.keyword(), value)?,
        Tunable::CooldownTime => config.cooldown_time_ms = narrow_u16(tunable.keyword(), value)?,
        Tunable::MinShiftSpeed => config.min_shift_speed = narrow_u16(tunable.keyword(), value)?,
        Tunable::MinShiftThrottle => {
            config.min_shift_throttle = narrow_u8(tunable.keyword(), value)?;
        }
    }
    Ok(config)
}

fn advance_ticks(duration: Duration, ticks_per_ms: u32) -> Result<u32, CommandError> {
    if duration > MAX_ADVANCE {
        return Err(CommandError::AdvanceTooLong(duration));
    }
    let ticks = duration.as_micros() * u128::from(ticks_per_ms) / 1_000;
    u32::try_from(ticks).map_err(|_| CommandError::AdvanceTooLong(duration))
}

fn narrow_u8(field: &'static str, value: u32) -> Result<u8, CommandError> {
    u8::try_from(value).map_err(|_| CommandError::OutOfRange {
        field,
        value,
        max: u32::from(u8::MAX),
    })
}

fn narrow_u16(field: &'static str, value: u32) -> Result<u16, CommandError> {
    u16::try_from(value).map_err(|_| CommandError::OutOfRange {
        field,
        value,
        max: u32::from(u16::MAX),
    })
}
