//! Test-mode console shared between firmware and emulator targets.
//!
//! The grammar lives in [`grammar`] and is implemented directly with `winnow`
//! combinators over the input line, so it stays `no_std` and allocation free.
//! [`commands`] applies parsed commands to a running monitor.

pub mod commands;
pub mod grammar;

/// One-line help for every console command, in display order.
pub const HELP_TOPICS: [(&str, &str); 6] = [
    ("status", "status - decided state, latest sample and relay levels"),
    ("samples", "samples [n] - newest n aligned tip/ring pairs (default 10)"),
    ("engage", "engage - run the conditioning sequence once by hand"),
    (
        "relay",
        "relay <conditioning|isolation|busy> <on|off> - drive one output",
    ),
    ("release", "release - drop every output and cancel a pending release"),
    ("help", "help [topic] - list commands or describe one"),
];

/// Looks up the help line for `topic`, ignoring ASCII case.
pub fn help_for(topic: &str) -> Option<&'static str> {
    HELP_TOPICS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(topic))
        .map(|(_, text)| *text)
}
