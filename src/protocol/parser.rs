//! RESP Request Parser
//!
//! Decodes one command frame at a time from a byte buffer. A frame is an
//! array header `*<N>\r\n` followed by exactly N bulk strings
//! `$<len>\r\n<bytes>\r\n`. Nothing else is accepted where a new command
//! is expected.
//!
//! ## How the Parser Works
//!
//! The parser reads from a buffer and returns either:
//! - `Ok(Some((frame, consumed)))` - A complete frame, `consumed` bytes were used
//! - `Ok(None)` - The frame is incomplete, read more data and try again
//! - `Err(ProtocolError)` - The data can never become a valid frame
//!
//! Bulk payloads are taken by length, never by scanning for CRLF, so they may
//! contain `\r` and `\n` bytes. There is no resynchronisation after an error:
//! the caller is expected to drop the connection.

use crate::protocol::types::{prefix, Frame, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that make a request stream undecodable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A type prefix other than the one the frame grammar requires here
    #[error("expected prefix {expected:#04x}, got {found:#04x}")]
    UnexpectedPrefix { expected: u8, found: u8 },

    /// A count or length header is not a decimal integer
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Array count is negative
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Array count is larger than we are willing to buffer
    #[error("too many arguments: {count} (max: {max})")]
    TooManyArguments { count: usize, max: usize },

    /// Bulk length is negative
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// A single bulk string exceeds the maximum size
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The bytes after a bulk payload are not CRLF, so the length header lied
    #[error("bulk string missing trailing CRLF")]
    MissingCrlf,

    /// The peer closed the stream in the middle of a frame
    #[error("unexpected end of stream")]
    UnexpectedEof,
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ProtocolError>;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum number of arguments in one frame (same as Redis)
pub const MAX_ARGUMENTS: usize = 1024 * 1024;

/// Upper bound on the up-front allocation for the argument vector.
const PREALLOC_ARGUMENTS: usize = 16;

/// Longest integer a header line may carry: `-9223372036854775808`.
const MAX_HEADER_DIGITS: usize = 20;

/// A frame whose header and leading arguments have been decoded.
#[derive(Debug)]
struct PartialFrame {
    /// Number of arguments the array header announced
    count: usize,
    /// Arguments decoded so far
    args: Vec<Bytes>,
    /// Bytes of the buffer already accounted for
    consumed: usize,
}

/// A RESP command-frame parser.
///
/// When a frame is only partly buffered, the parser keeps the arguments it
/// has already decoded and resumes after them on the next call. Between an
/// `Ok(None)` and the next call the caller may only append to the buffer.
/// Once a frame is returned, the caller drops the `consumed` bytes and the
/// next call starts a fresh frame.
///
/// # Example
///
/// ```
/// use respkv::protocol::RespParser;
///
/// let mut parser = RespParser::new();
/// let buffer = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
///
/// assert!(parser.parse(&buffer[..12]).unwrap().is_none());
/// let (frame, consumed) = parser.parse(buffer).unwrap().unwrap();
/// assert_eq!(consumed, buffer.len());
/// assert_eq!(frame.name(), Some(&b"GET"[..]));
/// ```
#[derive(Debug, Default)]
pub struct RespParser {
    pending: Option<PartialFrame>,
}

impl RespParser {
    /// Creates a new parser instance.
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Attempts to decode one command frame from the start of `buf`.
    ///
    /// Any error discards the partial frame.
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(Frame, usize)>> {
        let mut partial = match self.pending.take() {
            Some(partial) if partial.consumed <= buf.len() => partial,
            _ => match start_frame(buf)? {
                Some(partial) => partial,
                None => return Ok(None),
            },
        };

        while partial.args.len() < partial.count {
            match parse_bulk_string(&buf[partial.consumed..])? {
                Some((arg, used)) => {
                    partial.args.push(arg);
                    partial.consumed += used;
                }
                None => {
                    self.pending = Some(partial);
                    return Ok(None);
                }
            }
        }

        Ok(Some((Frame::new(partial.args), partial.consumed)))
    }
}

/// Parses the array header that opens a frame.
fn start_frame(buf: &[u8]) -> ParseResult<Option<PartialFrame>> {
    let (count, consumed) = match read_header(buf, prefix::ARRAY)? {
        Some(header) => header,
        None => return Ok(None),
    };

    if count < 0 {
        return Err(ProtocolError::InvalidArrayLength(count));
    }

    let count = count as usize;
    if count > MAX_ARGUMENTS {
        return Err(ProtocolError::TooManyArguments {
            count,
            max: MAX_ARGUMENTS,
        });
    }

    Ok(Some(PartialFrame {
        count,
        args: Vec::with_capacity(count.min(PREALLOC_ARGUMENTS)),
        consumed,
    }))
}

/// Parses a bulk string: `$<length>\r\n<data>\r\n`
fn parse_bulk_string(buf: &[u8]) -> ParseResult<Option<(Bytes, usize)>> {
    let (length, data_start) = match read_header(buf, prefix::BULK_STRING)? {
        Some(header) => header,
        None => return Ok(None),
    };

    if length < 0 {
        return Err(ProtocolError::InvalidBulkLength(length));
    }

    let length = length as usize;
    if length > MAX_BULK_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: length,
            max: MAX_BULK_SIZE,
        });
    }

    let data_end = data_start + length;
    let total_needed = data_end + CRLF.len();

    // The terminator can be rejected as soon as its first byte is visible
    if buf.len() > data_end && buf[data_end] != CRLF[0] {
        return Err(ProtocolError::MissingCrlf);
    }
    if buf.len() < total_needed {
        return Ok(None);
    }
    if &buf[data_end..total_needed] != CRLF {
        return Err(ProtocolError::MissingCrlf);
    }

    let data = Bytes::copy_from_slice(&buf[data_start..data_end]);
    Ok(Some((data, total_needed)))
}

/// Reads a `<prefix><integer>\r\n` header line.
///
/// Returns the integer and the number of bytes the line occupies, or `None`
/// if the line is not complete yet. A byte that cannot belong to an integer
/// fails as soon as it is buffered, terminator or not.
fn read_header(buf: &[u8], expected: u8) -> ParseResult<Option<(i64, usize)>> {
    let found = match buf.first() {
        Some(&b) => b,
        None => return Ok(None),
    };
    if found != expected {
        return Err(ProtocolError::UnexpectedPrefix { expected, found });
    }

    let line = &buf[1..];
    for (i, &b) in line.iter().enumerate() {
        match b {
            b'\r' => {
                match line.get(i + 1) {
                    Some(b'\n') => {}
                    Some(_) => return Err(invalid_integer(&line[..i + 2])),
                    None => return Ok(None),
                }
                let digits = &line[..i];
                let n = std::str::from_utf8(digits)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or_else(|| invalid_integer(digits))?;
                return Ok(Some((n, 1 + i + CRLF.len())));
            }
            b'0'..=b'9' => {}
            b'-' if i == 0 => {}
            _ => return Err(invalid_integer(&line[..=i])),
        }
        if i >= MAX_HEADER_DIGITS {
            return Err(invalid_integer(&line[..=i]));
        }
    }

    Ok(None)
}

fn invalid_integer(raw: &[u8]) -> ProtocolError {
    ProtocolError::InvalidInteger(String::from_utf8_lossy(raw).into_owned())
}

/// Decodes a single frame from `buf` with a throwaway parser.
pub fn parse_frame(buf: &[u8]) -> ParseResult<Option<(Frame, usize)>> {
    RespParser::new().parse(buf)
}
