//! Command Module
//!
//! Turns decoded frames into replies.
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  RESP Parser    │  (protocol module)
//! └────────┬────────┘
//!          │ Frame
//!          ▼
//! ┌─────────────────┐
//! │ Command         │  (command.rs: name + arity + PX option)
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (handler.rs)
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```

pub mod command;
pub mod handler;

pub use command::Command;
pub use handler::CommandHandler;
