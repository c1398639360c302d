mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use session::{Session, TranscriptProfile};

const USAGE: &str = "Usage: shifter-emulator [--profile <shift|reject|wrap>]";

fn main() -> io::Result<()> {
    let profile = parse_profile(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let mut session = Session::new(profile)?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    run(&mut session, stdin.lock(), stdout.lock())
}

fn run<R, W>(session: &mut Session, mut reader: R, mut writer: W) -> io::Result<()>
where
    R: BufRead,
    W: Write,
{
    writeln!(
        writer,
        "Quickshifter bench ready. Type `help` for commands or `exit` to quit."
    )?;

    let mut line = String::new();
    loop {
        line.clear();
        write!(writer, "{} > ", session.prompt())?;
        writer.flush()?;

        if reader.read_line(&mut line)? == 0 {
            writeln!(writer)?;
            return Ok(());
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if is_exit(trimmed) {
            writeln!(writer, "Session closed.")?;
            return Ok(());
        }

        for response in session.handle_command(trimmed)? {
            writeln!(writer, "{response}")?;
        }
    }
}

fn is_exit(input: &str) -> bool {
    ["exit", "quit"]
        .iter()
        .any(|word| input.eq_ignore_ascii_case(word))
}

fn parse_profile(mut args: impl Iterator<Item = String>) -> Result<TranscriptProfile, String> {
    let Some(arg) = args.next() else {
        return Ok(TranscriptProfile::Shift);
    };

    let tag = match arg.strip_prefix("--profile=") {
        Some(value) => value.to_string(),
        None if arg == "--profile" => args
            .next()
            .ok_or_else(|| "Expected value after --profile".to_string())?,
        None => arg,
    };

    if let Some(extra) = args.next() {
        return Err(format!("Unexpected argument `{extra}`"));
    }

    TranscriptProfile::from_tag(&tag)
}
