//! # respkv
//!
//! A small in-memory key-value server speaking a subset of the Redis
//! Serialization Protocol (RESP). It serves `PING`, `ECHO`, `SET` (with an
//! optional `PX` millisecond TTL) and `GET` to any number of concurrent
//! clients.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              respkv                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                            ▼                  ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │   RESP      │    │              StorageEngine                   │   │
//! │  │   Parser    │    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │   │
//! │  │             │    │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ │   │
//! │  └─────────────┘    │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │ │   │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │   │
//! │                     └──────────────────────────────────────────────┘   │
//! │                                               ▲                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │           ExpirySweeper                         │ │
//! │                     │      (Background Tokio Task)                    │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use respkv::commands::CommandHandler;
//! use respkv::connection::{handle_connection, ConnectionStats};
//! use respkv::storage::{start_expiry_sweeper, StorageEngine};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = Arc::new(StorageEngine::new());
//!     let _sweeper = start_expiry_sweeper(Arc::clone(&storage));
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("0.0.0.0:6379").await?;
//!     loop {
//!         let (stream, addr) = listener.accept().await?;
//!         let handler = CommandHandler::new(Arc::clone(&storage));
//!         tokio::spawn(handle_connection(stream, addr, handler, Arc::clone(&stats)));
//!     }
//! }
//! ```
//!
//! ## Expiry
//!
//! Keys with a TTL are expired in two ways:
//! 1. **Lazy**: `GET` re-checks the deadline and removes the key if it has passed
//! 2. **Active**: a background task periodically removes expired keys
//!
//! Clients always see lazy-expiry semantics. The sweeper only reclaims memory.
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP frame parser and reply encoder
//! - [`storage`]: sharded store with TTL support and the expiry sweeper
//! - [`commands`]: command decoding and execution
//! - [`connection`]: per-client read/execute/reply loop
//! - [`config`]: server settings and command-line parsing

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod storage;

pub use commands::{Command, CommandHandler};
pub use config::{Config, Invocation};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{Frame, ProtocolError, RespParser, RespValue};
pub use storage::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper, StorageEngine};

/// Version of respkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
