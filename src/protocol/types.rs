//! RESP Data Types
//!
//! The reply side of the protocol and the request frame shape.
//!
//! Only three reply shapes are ever written:
//!
//! Simple String: `+OK\r\n`
//! Bulk String: `$5\r\nhello\r\n`
//! Null Bulk String: `$-1\r\n`
//!
//! Requests are always arrays of bulk strings:
//! `*2\r\n$3\r\nGET\r\n$4\r\nname\r\n`

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A reply value sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Non-binary-safe status line.
    /// Format: `+<string>\r\n`
    SimpleString(String),

    /// Binary-safe, length-prefixed payload.
    /// Format: `$<length>\r\n<data>\r\n`
    BulkString(Bytes),

    /// Null bulk string: `$-1\r\n`
    Null,
}

impl RespValue {
    /// Creates a new simple string response.
    ///
    /// # Example
    /// ```
    /// use respkv::protocol::types::RespValue;
    /// let ok = RespValue::simple_string("OK");
    /// assert_eq!(ok.serialize(), b"+OK\r\n");
    /// ```
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Creates a new bulk string response.
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    /// Creates a null response.
    pub fn null() -> Self {
        RespValue::Null
    }

    /// Common response for successful operations
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    /// Common response for PONG
    pub fn pong() -> Self {
        RespValue::SimpleString("PONG".to_string())
    }

    /// Serializes the value to its wire format.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the value into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => {
                buf.push(prefix::SIMPLE_STRING);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::BulkString(data) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            RespValue::Null => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(b"-1");
                buf.extend_from_slice(CRLF);
            }
        }
    }

    /// Number of bytes `serialize` will produce.
    pub fn encoded_len(&self) -> usize {
        match self {
            RespValue::SimpleString(s) => 1 + s.len() + 2,
            RespValue::BulkString(data) => 1 + decimal_len(data.len()) + 2 + data.len() + 2,
            RespValue::Null => 5,
        }
    }
}

fn decimal_len(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "\"{}\"", s),
            RespValue::BulkString(data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "\"{}\"", s)
                } else {
                    write!(f, "(binary data, {} bytes)", data.len())
                }
            }
            RespValue::Null => write!(f, "(nil)"),
        }
    }
}

/// One decoded request: the command name followed by its arguments.
///
/// Frames are produced fresh for every request and consumed by dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    args: Vec<Bytes>,
}

impl Frame {
    pub fn new(args: Vec<Bytes>) -> Self {
        Self { args }
    }

    /// The command name, if the frame is not empty.
    pub fn name(&self) -> Option<&[u8]> {
        self.args.first().map(|b| b.as_ref())
    }

    /// All arguments after the command name.
    pub fn args(&self) -> &[Bytes] {
        self.args.get(1..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// Encodes a request frame as a RESP array of bulk strings.
///
/// ```
/// use respkv::protocol::encode_command;
/// assert_eq!(encode_command(&[b"PING"]), b"*1\r\n$4\r\nPING\r\n");
/// ```
pub fn encode_command<A: AsRef<[u8]>>(args: &[A]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(prefix::ARRAY);
    buf.extend_from_slice(args.len().to_string().as_bytes());
    buf.extend_from_slice(CRLF);
    for arg in args {
        let arg = arg.as_ref();
        buf.push(prefix::BULK_STRING);
        buf.extend_from_slice(arg.len().to_string().as_bytes());
        buf.extend_from_slice(CRLF);
        buf.extend_from_slice(arg);
        buf.extend_from_slice(CRLF);
    }
    buf
}
