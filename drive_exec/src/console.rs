//! # Operator Console
//!
//! Reads operator commands from stdin on a background thread. Accepted lines:
//!
//! - `<x> <y>` or `goto <x> <y>`: drive to the logical target `(x, y)`
//! - `stop`: stop where we are
//! - `status`: log the current state
//! - `clear`: empty the telemetry history
//! - `quit`: exit
//!
//! Blank lines are ignored.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    io::{self, BufRead},
    sync::mpsc::{channel, Receiver},
    thread,
};

use log::warn;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCmd {
    Goto { x: i32, y: i32 },
    Stop,
    Status,
    Clear,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("Invalid target {0:?}, expected two integers \"<x> <y>\"")]
    InvalidTarget(String),

    #[error("Unknown command {0:?}, expected \"<x> <y>\", stop, status, clear or quit")]
    UnknownCommand(String),
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse one console line. Returns `Ok(None)` for blank lines.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCmd>, ConsoleError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let cmd = match tokens.as_slice() {
        [] => return Ok(None),
        ["stop"] => ConsoleCmd::Stop,
        ["status"] => ConsoleCmd::Status,
        ["clear"] => ConsoleCmd::Clear,
        ["quit"] | ["exit"] => ConsoleCmd::Quit,
        ["goto", args @ ..] => parse_target(args, line)?,
        [first, ..] if first.starts_with(|c: char| c == '-' || c.is_ascii_digit()) => {
            parse_target(&tokens, line)?
        }
        _ => return Err(ConsoleError::UnknownCommand(line.trim().to_string())),
    };

    Ok(Some(cmd))
}

/// Spawn the stdin reader thread.
///
/// Parsed commands arrive on the returned channel, which disconnects when
/// stdin closes. Bad lines are reported here and never forwarded.
pub fn spawn_stdin_reader() -> Receiver<ConsoleCmd> {
    let (tx, rx) = channel();

    thread::spawn(move || {
        let stdin = io::stdin();

        for line in stdin.lock().lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!("Could not read from stdin: {}", e);
                    break;
                }
            };

            match parse_line(&line) {
                Ok(Some(cmd)) => {
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                Ok(None) => (),
                Err(e) => warn!("{}", e),
            }
        }
    });

    rx
}

fn parse_target(args: &[&str], line: &str) -> Result<ConsoleCmd, ConsoleError> {
    let invalid = || ConsoleError::InvalidTarget(line.trim().to_string());

    match args {
        [x, y] => Ok(ConsoleCmd::Goto {
            x: x.parse().map_err(|_| invalid())?,
            y: y.parse().map_err(|_| invalid())?,
        }),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_targets() {
        assert_eq!(parse_line("20 -15"), Ok(Some(ConsoleCmd::Goto { x: 20, y: -15 })));
        assert_eq!(parse_line("  goto -3 4 "), Ok(Some(ConsoleCmd::Goto { x: -3, y: 4 })));
    }

    #[test]
    fn test_keywords() {
        assert_eq!(parse_line("stop"), Ok(Some(ConsoleCmd::Stop)));
        assert_eq!(parse_line("status\n"), Ok(Some(ConsoleCmd::Status)));
        assert_eq!(parse_line("clear"), Ok(Some(ConsoleCmd::Clear)));
        assert_eq!(parse_line("quit"), Ok(Some(ConsoleCmd::Quit)));
        assert_eq!(parse_line("   "), Ok(None));
    }

    #[test]
    fn test_bad_lines() {
        assert_eq!(parse_line("1.5 2"), Err(ConsoleError::InvalidTarget("1.5 2".into())));
        assert_eq!(parse_line("3"), Err(ConsoleError::InvalidTarget("3".into())));
        assert_eq!(parse_line("goto a b"), Err(ConsoleError::InvalidTarget("goto a b".into())));
        assert_eq!(parse_line("1 2 3"), Err(ConsoleError::InvalidTarget("1 2 3".into())));
        assert_eq!(parse_line("fly"), Err(ConsoleError::UnknownCommand("fly".into())));
    }
}
