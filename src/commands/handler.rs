//! Command Handler
//!
//! Executes decoded frames against the storage engine.
//!
//! ## Supported Commands
//!
//! - `PING` - replies `+PONG`
//! - `ECHO message` - replies with `message` as a bulk string
//! - `SET key value [PX milliseconds]` - stores the value, replies `+OK`
//! - `GET key` - replies with the value, or the null bulk string
//!
//! Anything else (unknown names, too few arguments, empty frames) gets no
//! reply at all and the connection keeps reading.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌──────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ from_frame() │───>│  dispatch() │───>│  cmd_*()    │     │
//! │  └──────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      StorageEngine          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::commands::Command;
use crate::protocol::{Frame, RespValue};
use crate::storage::StorageEngine;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Dispatches frames to command implementations.
///
/// Cheap to clone; every connection gets its own copy sharing one engine.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// The engine this handler executes against.
    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// Executes a frame and returns the reply to send, if any.
    ///
    /// Returns `None` when the frame does not name a supported command with
    /// enough arguments.
    pub fn execute(&self, frame: Frame) -> Option<RespValue> {
        match Command::from_frame(&frame) {
            Some(command) => Some(self.dispatch(command)),
            None => {
                debug!(
                    command = %String::from_utf8_lossy(frame.name().unwrap_or_default()),
                    args = frame.args().len(),
                    "Ignoring unsupported command"
                );
                None
            }
        }
    }

    /// Runs an already-decoded command.
    pub fn dispatch(&self, command: Command) -> RespValue {
        trace!(command = command.name(), "Executing command");

        match command {
            Command::Ping => self.cmd_ping(),
            Command::Echo { message } => self.cmd_echo(message),
            Command::Set { key, value, ttl } => self.cmd_set(key, value, ttl),
            Command::Get { key } => self.cmd_get(&key),
        }
    }

    fn cmd_ping(&self) -> RespValue {
        RespValue::pong()
    }

    fn cmd_echo(&self, message: Bytes) -> RespValue {
        RespValue::bulk_string(message)
    }

    /// SET key value [PX milliseconds]
    fn cmd_set(&self, key: Bytes, value: Bytes, ttl: Option<Duration>) -> RespValue {
        self.storage.set(key, value, ttl);
        RespValue::ok()
    }

    /// GET key
    fn cmd_get(&self, key: &Bytes) -> RespValue {
        match self.storage.get(key) {
            Some(value) => RespValue::bulk_string(value),
            None => RespValue::null(),
        }
    }
}
