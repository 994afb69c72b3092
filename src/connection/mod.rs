//! Connection Handler Module
//!
//! Each accepted client runs in its own async task, so a slow or broken
//! client never holds up the others.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (main.rs)                                │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   spawn task per client│
//!           └────────────┬───────────┘
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│ Parse frame │───>│ Execute cmd │     │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘     │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Send reply  │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use respkv::connection::{handle_connection, ConnectionStats};
//! use respkv::commands::CommandHandler;
//! use respkv::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(StorageEngine::new());
//! let stats = Arc::new(ConnectionStats::new());
//!
//! let (stream, addr) = listener.accept().await?;
//! let handler = CommandHandler::new(Arc::clone(&storage));
//! tokio::spawn(handle_connection(stream, addr, handler, Arc::clone(&stats)));
//! ```

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
