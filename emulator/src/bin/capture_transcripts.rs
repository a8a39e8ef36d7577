use std::io;

use line_core::conditioning::ConditioningStrategy;
use line_core::sequencer::ActuationMode;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Pickup)?;
    record_profile(TranscriptProfile::Ringing)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    match profile {
        TranscriptProfile::Pickup => {
            let mut session =
                Session::new(profile, ConditioningStrategy::ShuntIsolate, ActuationMode::Blocking)?;
            record_pickup(&mut session)
        }
        TranscriptProfile::Ringing => {
            let mut session = Session::new(
                profile,
                ConditioningStrategy::ParallelCapacitor,
                ActuationMode::Deadline,
            )?;
            record_ringing(&mut session)
        }
        TranscriptProfile::Interactive => Ok(()),
    }
}

fn run_script(session: &mut Session, script: &[&str]) -> io::Result<()> {
    for command in script {
        let _ = session.handle_command(command)?;
    }
    Ok(())
}

fn record_pickup(session: &mut Session) -> io::Result<()> {
    run_script(
        session,
        &[
            "status",
            "run 100",
            "line off-hook",
            "run 100",
            "status",
            "samples 5",
            "run 500",
            "line on-hook",
            "run 100",
            "line off-hook",
            "run 100",
            "relay conditioning on",
            "status",
            "release",
            "help",
            "help line",
        ],
    )
}

fn record_ringing(session: &mut Session) -> io::Result<()> {
    run_script(
        session,
        &[
            "line ringing",
            "run 200",
            "status",
            "samples 10",
            "line off-hook",
            "run 100",
            "status",
            "line on-hook",
            "run 100",
            "engage",
            "relay busy on",
            "run 800",
            "status",
        ],
    )
}
