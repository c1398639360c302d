//! Parser for the bench REPL.
//!
//! Lines are parsed directly from `&str` with `winnow` combinators into
//! [`Command`] values. Keywords are case-insensitive, integers accept decimal
//! or `0x`-prefixed hex, and durations carry a `us`, `ms`, or `s` suffix.
//! Range checks against the controller's register widths happen in the
//! executor, not here.

use core::fmt;
use core::time::Duration;

use winnow::ascii::{Caseless, dec_uint, hex_uint, space0, space1};
use winnow::combinator::{alt, eof, opt, preceded, terminated};
use winnow::prelude::*;
use winnow::token::take_while;

/// Shift sensor operations.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SensorCommand {
    On,
    Off,
    /// Raw analog reading compared against the sensor threshold.
    Raw(u32),
}

/// Tunables adjustable with `set`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Tunable {
    KillTime,
    CooldownTime,
    MinShiftSpeed,
    MinShiftThrottle,
}

impl Tunable {
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Tunable::KillTime => "kill",
            Tunable::CooldownTime => "cooldown",
            Tunable::MinShiftSpeed => "min-speed",
            Tunable::MinShiftThrottle => "min-throttle",
        }
    }
}

/// Structured commands produced by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Sensor(SensorCommand),
    Speed(u32),
    Rpm(u32),
    Throttle(u32),
    Gear(u32),
    Counter(u32),
    /// Invoke the controller without moving the counter.
    Tick(Option<u32>),
    /// Move the counter forward, polling the controller along the way.
    Advance(Duration),
    Set(Tunable, u32),
    Status,
    Events,
    Reset,
    Help(Option<&'a str>),
}

/// Error returned when a line does not match the grammar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    /// Byte offset where parsing stopped.
    pub offset: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unexpected input at column {}", self.offset + 1)
    }
}

/// Parse a REPL command from the provided line.
///
/// # Errors
///
/// Returns the byte offset of the first unparseable input.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError> {
    terminated(preceded(space0, command), end)
        .parse(line)
        .map_err(|err| ParseError {
            offset: err.offset(),
        })
}

fn command<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    alt((
        sensor,
        preceded((Caseless("speed"), space1), integer).map(Command::Speed),
        preceded((Caseless("rpm"), space1), integer).map(Command::Rpm),
        preceded((Caseless("throttle"), space1), integer).map(Command::Throttle),
        preceded((Caseless("gear"), space1), integer).map(Command::Gear),
        preceded((Caseless("counter"), space1), integer).map(Command::Counter),
        preceded(Caseless("tick"), opt(preceded(space1, integer))).map(Command::Tick),
        preceded((Caseless("advance"), space1), duration).map(Command::Advance),
        set,
        Caseless("status").value(Command::Status),
        Caseless("events").value(Command::Events),
        Caseless("reset").value(Command::Reset),
        help,
    ))
    .parse_next(input)
}

fn sensor<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded(
        (Caseless("sensor"), space1),
        alt((
            Caseless("on").value(SensorCommand::On),
            Caseless("off").value(SensorCommand::Off),
            preceded((Caseless("raw"), space1), integer).map(SensorCommand::Raw),
        )),
    )
    .map(Command::Sensor)
    .parse_next(input)
}

fn set<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded(
        (Caseless("set"), space1),
        (tunable, preceded(space1, integer)),
    )
    .map(|(tunable, value)| Command::Set(tunable, value))
    .parse_next(input)
}

fn tunable(input: &mut &str) -> ModalResult<Tunable> {
    alt((
        Caseless("kill").value(Tunable::KillTime),
        Caseless("cooldown").value(Tunable::CooldownTime),
        Caseless("min-speed").value(Tunable::MinShiftSpeed),
        Caseless("min-throttle").value(Tunable::MinShiftThrottle),
    ))
    .parse_next(input)
}

fn help<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded(Caseless("help"), opt(preceded(space1, word)))
        .map(Command::Help)
        .parse_next(input)
}

fn word<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-').parse_next(input)
}

fn integer(input: &mut &str) -> ModalResult<u32> {
    alt((
        preceded(alt(("0x", "0X")), hex_uint::<_, u32, _>),
        dec_uint::<_, u32, _>,
    ))
    .parse_next(input)
}

fn duration(input: &mut &str) -> ModalResult<Duration> {
    (
        dec_uint::<_, u64, _>,
        alt((
            Caseless("us").value(DurationUnit::Micros),
            Caseless("ms").value(DurationUnit::Millis),
            Caseless("s").value(DurationUnit::Secs),
        )),
    )
        .map(|(value, unit)| unit.to_duration(value))
        .parse_next(input)
}

fn end(input: &mut &str) -> ModalResult<()> {
    (space0, eof).void().parse_next(input)
}

#[derive(Copy, Clone, Debug)]
enum DurationUnit {
    Micros,
    Millis,
    Secs,
}

impl DurationUnit {
    fn to_duration(self, value: u64) -> Duration {
        match self {
            DurationUnit::Micros => Duration::from_micros(value),
            DurationUnit::Millis => Duration::from_millis(value),
            DurationUnit::Secs => Duration::from_secs(value),
        }
    }
}
