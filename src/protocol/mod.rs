//! RESP Protocol Implementation
//!
//! The subset of the Redis Serialization Protocol this server speaks.
//!
//! ## Overview
//!
//! Requests are arrays of bulk strings. Replies are simple strings, bulk
//! strings, or the null bulk string. Everything else in RESP is out of scope
//! and rejected on the request side.
//!
//! ## Modules
//!
//! - `types`: the `RespValue` reply enum, the request `Frame`, and encoding
//! - `parser`: decoding of request frames from a byte buffer
//!
//! ## Example
//!
//! ```
//! use respkv::protocol::{parse_frame, RespValue};
//! use bytes::Bytes;
//!
//! let data = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let (frame, consumed) = parse_frame(data).unwrap().unwrap();
//! assert_eq!(consumed, data.len());
//! assert_eq!(frame.args(), &[Bytes::from("name")]);
//!
//! let response = RespValue::bulk_string(Bytes::from("Ariz"));
//! assert_eq!(response.serialize(), b"$4\r\nAriz\r\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{parse_frame, ParseResult, ProtocolError, RespParser, MAX_BULK_SIZE};
pub use types::{encode_command, Frame, RespValue};
