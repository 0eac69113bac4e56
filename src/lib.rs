//! LETHE - In-Memory Key-Value Store with TTLs
//!
//! A concurrent key-value store whose entries can carry a time-to-live,
//! reachable from a local prompt and from TCP clients, with JSON snapshots.
//!
//! ## Features
//! - **Dataset**: one `RwLock`-guarded map shared by every client
//! - **Expiration**: timer-driven removal from a single background worker,
//!   backed by a lazy check on every read
//! - **Snapshots**: `SAVE`/`LOAD` to JSON files, TTLs reconciled against wall-clock time
//! - **Metrics**: lock-free atomic counters
//! - **Protocol**: `SET key value [EX seconds]`, `GET`, `DEL`, `TTL`, `SAVE`, `LOAD`, ...
//!
//! ## Example
//! ```no_run
//! use std::time::Duration;
//! use lethe::{config::Config, engine::Lethe};
//!
//! let store = Lethe::open(Config::default()).unwrap();
//!
//! store.set("session", "abc", Duration::from_secs(30)).unwrap();
//! assert_eq!(store.get("session"), Some("abc".to_string()));
//! store.save_to_file("snap.json").unwrap();
//! ```

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod repl;
pub mod server;
pub mod types;
