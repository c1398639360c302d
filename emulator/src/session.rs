use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant as HostInstant};

use shifter_core::bench::{BenchHarness, TickReport};
use shifter_core::config::ShiftCutConfig;
use shifter_core::controller::Transition;
use shifter_core::repl::commands::{CommandError, CommandExecutor, CommandOutcome};
use shifter_core::repl::status::format_ticks;
use shifter_core::signals::InputSnapshot;
use shifter_core::telemetry::TelemetryRecord;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "sensor",
        "sensor on|off|raw <n>        - drive the shift sensor input",
    ),
    (
        "speed",
        "speed <n>                    - set engine speed in ECU units",
    ),
    (
        "rpm",
        "rpm <n>                      - set engine speed from rpm",
    ),
    (
        "throttle",
        "throttle <n>                 - set throttle position (0-255)",
    ),
    (
        "gear",
        "gear <n>                     - set the selected gear",
    ),
    (
        "counter",
        "counter <n>                  - jump the tick counter without polling",
    ),
    (
        "tick",
        "tick [n]                     - poll the controller n times in place",
    ),
    (
        "advance",
        "advance <n>us|ms|s           - move time forward, polling every 100us",
    ),
    (
        "set",
        "set kill|cooldown|min-speed|min-throttle <n> - adjust a tunable",
    ),
    (
        "status",
        "status                       - display controller and input state",
    ),
    (
        "events",
        "events                       - list recorded transitions",
    ),
    (
        "reset",
        "reset                        - return to power-on state",
    ),
    (
        "help",
        "help [topic]                 - show help for a command",
    ),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Shift,
    Reject,
    Wrap,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Shift => "transcripts/emulator-shift.log",
            TranscriptProfile::Reject => "transcripts/emulator-reject.log",
            TranscriptProfile::Wrap => "transcripts/emulator-wrap.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Shift => "Quickshifter emulator shift transcript",
            TranscriptProfile::Reject => "Quickshifter emulator rejection transcript",
            TranscriptProfile::Wrap => "Quickshifter emulator counter wrap transcript",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("shift") {
            Ok(Self::Shift)
        } else if tag.eq_ignore_ascii_case("reject") {
            Ok(Self::Reject)
        } else if tag.eq_ignore_ascii_case("wrap") {
            Ok(Self::Wrap)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }
}

pub struct Session {
    executor: CommandExecutor,
    transcript: TranscriptLogger,
    started_at: HostInstant,
}

impl Session {
    pub fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let transcript = TranscriptLogger::new(profile)?;
        let executor = CommandExecutor::new(BenchHarness::default());

        Ok(Self {
            executor,
            transcript,
            started_at: HostInstant::now(),
        })
    }

    /// Prompt prefix showing the controller state, e.g. `[active]`.
    pub fn prompt(&self) -> String {
        format!("[{}]", self.executor.harness().controller().state())
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        let lines = match self.executor.execute(trimmed) {
            Ok(outcome) => self.render_outcome(outcome),
            Err(error) => vec![describe_error(&error)],
        };

        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    fn render_outcome(&self, outcome: CommandOutcome<'_>) -> Vec<String> {
        let harness = self.executor.harness();
        let ticks_per_ms = harness.controller().config().ticks_per_ms;

        match outcome {
            CommandOutcome::Inputs(inputs) => vec![format!("OK {}", describe_inputs(&inputs))],
            CommandOutcome::SensorRaw { raw, triggered } => vec![format!(
                "OK sensor raw=0x{raw:02X} {}",
                if triggered { "triggered" } else { "idle" }
            )],
            CommandOutcome::Rpm { rpm, units } => {
                vec![format!("OK rpm={rpm} speed=0x{units:04X}")]
            }
            CommandOutcome::Counter(counter) => vec![format!("OK counter={}", counter.ticks())],
            CommandOutcome::Ticked(report) => {
                let head = format!(
                    "OK tick x{} counter={} state={}",
                    report.invocations,
                    harness.now().ticks(),
                    harness.controller().state()
                );
                narrate(head, &report, ticks_per_ms)
            }
            CommandOutcome::Advanced { ticks, report } => {
                let head = format!(
                    "OK advanced {} ({ticks} ticks, {} polls) counter={} state={}",
                    format_ticks(ticks, ticks_per_ms),
                    report.invocations,
                    harness.now().ticks(),
                    harness.controller().state()
                );
                narrate(head, &report, ticks_per_ms)
            }
            CommandOutcome::Configured(config) => vec![format!("OK {}", describe_config(&config))],
            CommandOutcome::Status(status) => status.to_string().lines().map(String::from).collect(),
            CommandOutcome::Events => describe_events(harness, ticks_per_ms),
            CommandOutcome::Reset => vec!["OK reset to power-on state".to_string()],
            CommandOutcome::Help(topic) => describe_help(topic),
        }
    }

    fn record_output(&mut self, elapsed: Duration, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn narrate(head: String, report: &TickReport, ticks_per_ms: u32) -> Vec<String> {
    let mut lines = vec![head];
    lines.extend(
        report
            .transitions
            .iter()
            .map(|transition| format!("  {}", describe_transition(transition, ticks_per_ms))),
    );
    if report.dropped > 0 {
        lines.push(format!("  (+{} more transitions)", report.dropped));
    }
    lines
}

fn describe_transition(transition: &Transition, ticks_per_ms: u32) -> String {
    match *transition {
        Transition::CutStarted { at, target_ticks } => format!(
            "@{} cut started, target {}",
            at.ticks(),
            format_ticks(target_ticks, ticks_per_ms)
        ),
        Transition::CutRejected { at, reason } => {
            format!("@{} trigger ignored: {reason}", at.ticks())
        }
        Transition::CutReleased { at, held_ticks } => format!(
            "@{} cut released after {}",
            at.ticks(),
            format_ticks(held_ticks, ticks_per_ms)
        ),
        Transition::Rearmed { at, waited_ticks } => format!(
            "@{} rearmed after {}",
            at.ticks(),
            format_ticks(waited_ticks, ticks_per_ms)
        ),
    }
}

fn describe_events(harness: &BenchHarness, ticks_per_ms: u32) -> Vec<String> {
    let telemetry = harness.telemetry();
    if telemetry.is_empty() {
        return vec!["no events recorded".to_string()];
    }

    let counters = telemetry.counters();
    let mut lines = vec![format!(
        "events ({}) cuts={} rejections={}",
        telemetry.len(),
        counters.cuts,
        counters.rejections
    )];
    lines.extend(
        telemetry
            .oldest_first()
            .map(|record| describe_record(record, ticks_per_ms)),
    );
    lines
}

fn describe_record(record: &TelemetryRecord, ticks_per_ms: u32) -> String {
    let gap = record.elapsed_since_previous.map_or_else(
        || "first".to_string(),
        |ticks| format!("+{}", format_ticks(ticks, ticks_per_ms)),
    );
    format!(
        "  #{} @{} {} code=0x{:04X} phase={} gap={gap}",
        record.id,
        record.timestamp.ticks(),
        record.event,
        record.event.to_raw(),
        format_ticks(record.phase_ticks, ticks_per_ms),
    )
}

fn describe_inputs(inputs: &InputSnapshot) -> String {
    format!(
        "sensor={} speed=0x{:04X} throttle={} gear={}",
        if inputs.sensor_triggered { "on" } else { "off" },
        inputs.engine_speed,
        inputs.throttle_position,
        inputs.selected_gear
    )
}

fn describe_config(config: &ShiftCutConfig) -> String {
    format!(
        "kill={}ms cooldown={}ms min-speed=0x{:04X} min-throttle={} no-cut-gear={}",
        config.kill_time_ms,
        config.cooldown_time_ms,
        config.min_shift_speed,
        config.min_shift_throttle,
        config.no_cut_gear
    )
}

fn describe_error(error: &CommandError) -> String {
    match error {
        CommandError::Parse(err) => format!("ERR syntax {err}"),
        CommandError::OutOfRange { .. } => format!("ERR range {error}"),
        CommandError::Config(err) => format!("ERR config {err}"),
        CommandError::AdvanceTooLong(_) => format!("ERR advance {error}"),
    }
}

fn describe_help(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are host milliseconds since session start; @N is the ECU tick counter"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

fn help_topic_list() -> String {
    let mut buffer = String::new();
    for (index, (name, _)) in HELP_TOPICS.iter().enumerate() {
        if index > 0 {
            buffer.push_str(", ");
        }
        buffer.push_str(name);
    }
    buffer
}
