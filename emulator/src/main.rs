mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use line_core::conditioning::ConditioningStrategy;
use line_core::sequencer::ActuationMode;
use session::{Session, TranscriptProfile};

const USAGE: &str = "Usage: line-emulator [--profile <interactive|pickup|ringing>] \
                     [--strategy <shunt|capacitor>] [--deadline]";

struct Options {
    profile: TranscriptProfile,
    strategy: ConditioningStrategy,
    mode: ActuationMode,
}

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(options.profile, options.strategy, options.mode)?;
    let mut line = String::new();

    writeln!(
        writer,
        "Line Conditioner Emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options {
        profile: TranscriptProfile::Interactive,
        strategy: ConditioningStrategy::ShuntIsolate,
        mode: ActuationMode::Blocking,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };

        match flag.as_str() {
            "--deadline" if inline.is_none() => options.mode = ActuationMode::Deadline,
            "--profile" => {
                let value = flag_value(&flag, inline, &mut args)?;
                options.profile = TranscriptProfile::from_tag(&value)?;
            }
            "--strategy" => {
                let value = flag_value(&flag, inline, &mut args)?;
                options.strategy = ConditioningStrategy::from_tag(&value)
                    .ok_or_else(|| format!("Unknown strategy `{value}`"))?;
            }
            other => return Err(format!("Unexpected argument `{other}`")),
        }
    }

    Ok(options)
}

fn flag_value(
    flag: &str,
    inline: Option<String>,
    args: &mut impl Iterator<Item = String>,
) -> Result<String, String> {
    inline
        .or_else(|| args.next())
        .ok_or_else(|| format!("Expected value after {flag}"))
}
