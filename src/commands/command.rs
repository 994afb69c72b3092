//! Typed commands decoded from a request frame.
//!
//! Each variant owns exactly the arguments its handler needs. A frame that
//! names an unknown command, or carries too few arguments, decodes to `None`.
//! Trailing arguments beyond what a command uses are ignored.

use crate::protocol::Frame;
use bytes::Bytes;
use std::time::Duration;

/// A parsed, validated command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `PING`
    Ping,
    /// `ECHO message`
    Echo { message: Bytes },
    /// `SET key value [PX milliseconds]`
    Set {
        key: Bytes,
        value: Bytes,
        ttl: Option<Duration>,
    },
    /// `GET key`
    Get { key: Bytes },
}

impl Command {
    /// Decodes a frame, matching the command name case-insensitively.
    pub fn from_frame(frame: &Frame) -> Option<Command> {
        let name = frame.name()?;
        let args = frame.args();

        if name.eq_ignore_ascii_case(b"PING") {
            Some(Command::Ping)
        } else if name.eq_ignore_ascii_case(b"ECHO") {
            let message = args.first()?.clone();
            Some(Command::Echo { message })
        } else if name.eq_ignore_ascii_case(b"SET") {
            let (key, value) = match args {
                [key, value, ..] => (key.clone(), value.clone()),
                _ => return None,
            };
            let ttl = parse_px(&args[2..]);
            Some(Command::Set { key, value, ttl })
        } else if name.eq_ignore_ascii_case(b"GET") {
            let key = args.first()?.clone();
            Some(Command::Get { key })
        } else {
            None
        }
    }

    /// Upper-case command name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::Echo { .. } => "ECHO",
            Command::Set { .. } => "SET",
            Command::Get { .. } => "GET",
        }
    }
}

/// Reads an optional `PX <milliseconds>` pair.
///
/// Anything that is not exactly `PX` followed by a non-negative integer
/// means "no TTL".
fn parse_px(options: &[Bytes]) -> Option<Duration> {
    match options {
        [opt, millis, ..] if opt.eq_ignore_ascii_case(b"PX") => {
            let millis = std::str::from_utf8(millis).ok()?.parse::<u64>().ok()?;
            Some(Duration::from_millis(millis))
        }
        _ => None,
    }
}
