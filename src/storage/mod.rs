//! Storage Engine Module
//!
//! The expiring key-value store and its background sweeper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! - **Lazy Expiry**: `get` treats an expired key as absent and removes it
//! - **Active Expiry**: the sweeper removes expired keys nobody reads
//!
//! ## Example
//!
//! ```
//! use respkv::storage::StorageEngine;
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! let engine = StorageEngine::new();
//!
//! engine.set(Bytes::from("name"), Bytes::from("Ariz"), None);
//! assert_eq!(engine.get(&Bytes::from("name")), Some(Bytes::from("Ariz")));
//!
//! engine.set(
//!     Bytes::from("session"),
//!     Bytes::from("token123"),
//!     Some(Duration::from_secs(3600)),
//! );
//! ```

pub mod engine;
pub mod expiry;

pub use engine::{Entry, StorageEngine, StorageStats};
pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper, DEFAULT_SWEEP_INTERVAL};
