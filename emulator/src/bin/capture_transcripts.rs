use std::io;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Shift)?;
    record_profile(TranscriptProfile::Reject)?;
    record_profile(TranscriptProfile::Wrap)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::new(profile)?;
    let script: &[&str] = match profile {
        TranscriptProfile::Shift => SHIFT_SCRIPT,
        TranscriptProfile::Reject => REJECT_SCRIPT,
        TranscriptProfile::Wrap => WRAP_SCRIPT,
    };
    for line in script {
        let _ = session.handle_command(line)?;
    }
    Ok(())
}

const SHIFT_SCRIPT: &[&str] = &[
    "speed 0x4000",
    "gear 2",
    "throttle 20",
    "sensor on",
    "tick",
    "status",
    "sensor off",
    "advance 35ms",
    "status",
    "advance 40ms",
    "advance 300ms",
    "status",
    "events",
];

const REJECT_SCRIPT: &[&str] = &[
    "rpm 2000",
    "gear 2",
    "sensor on",
    "tick",
    "sensor off",
    "advance 301ms",
    "rpm 4000",
    "gear 6",
    "sensor on",
    "tick",
    "sensor off",
    "advance 301ms",
    "gear 3",
    "set min-throttle 10",
    "throttle 5",
    "sensor on",
    "tick",
    "sensor off",
    "advance 301ms",
    "throttle 15",
    "sensor on",
    "tick",
    "status",
    "set kill 70000",
    "help set",
    "events",
];

const WRAP_SCRIPT: &[&str] = &[
    "counter 0xFFFFFF9B",
    "speed 0x4000",
    "gear 2",
    "sensor on",
    "tick",
    "sensor off",
    "advance 69ms",
    "status",
    "advance 2ms",
    "status",
    "advance 301ms",
    "events",
];
