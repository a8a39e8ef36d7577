#![allow(clippy::module_name_repetitions)]

//! Parser for the test-mode console.
//!
//! Keywords are matched case-insensitively, arguments are separated by
//! spaces or tabs, and trailing whitespace (including the line terminator) is
//! ignored.

use core::fmt;

use winnow::ascii::{Caseless, dec_uint, multispace0, space0, space1};
use winnow::combinator::{alt, delimited, eof, opt, preceded, separated_pair, terminated};
use winnow::ModalResult;
use winnow::prelude::*;
use winnow::token::take_while;

use crate::conditioning::{ActuatorAction, ActuatorId};

/// Structured commands produced by the parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Status,
    Samples { count: Option<u16> },
    Engage,
    Relay {
        line: ActuatorId,
        action: ActuatorAction,
    },
    Release,
    Help { topic: Option<&'a str> },
}

/// Failure to parse a console line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    offset: usize,
}

impl ParseError {
    /// Byte offset of the first character the grammar could not accept.
    pub const fn offset(&self) -> usize {
        self.offset
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognised input at column {}", self.offset + 1)
    }
}

/// Parse a console command from the provided line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError> {
    terminated(delimited(space0, command, multispace0), eof)
        .parse(line)
        .map_err(|error| ParseError {
            offset: error.offset(),
        })
}

fn command<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    alt((
        Caseless("status").value(Command::Status),
        samples,
        Caseless("engage").value(Command::Engage),
        relay,
        Caseless("release").value(Command::Release),
        help,
    ))
    .parse_next(input)
}

fn samples<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded(Caseless("samples"), opt(preceded(space1, dec_uint)))
        .map(|count| Command::Samples { count })
        .parse_next(input)
}

fn relay<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded(
        (Caseless("relay"), space1),
        separated_pair(actuator, space1, action),
    )
    .map(|(line, action)| Command::Relay { line, action })
    .parse_next(input)
}

fn help<'a>(input: &mut &'a str) -> ModalResult<Command<'a>> {
    preceded(Caseless("help"), opt(preceded(space1, topic)))
        .map(|topic| Command::Help { topic })
        .parse_next(input)
}

fn actuator(input: &mut &str) -> ModalResult<ActuatorId> {
    alt((
        Caseless("conditioning").value(ActuatorId::Conditioning),
        Caseless("isolation").value(ActuatorId::Isolation),
        Caseless("busy").value(ActuatorId::Busy),
    ))
    .parse_next(input)
}

fn action(input: &mut &str) -> ModalResult<ActuatorAction> {
    alt((
        Caseless("on").value(ActuatorAction::Engage),
        Caseless("off").value(ActuatorAction::Release),
    ))
    .parse_next(input)
}

fn topic<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-').parse_next(input)
}
