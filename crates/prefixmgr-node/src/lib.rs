//! Runtime for the prefix manager.
//!
//! Wraps the synchronous [`prefixmgr_engine::PrefixEngine`] in a single-writer
//! tokio executor, publishes its records to a flooding store and exposes a
//! query/command handle plus configuration and logging setup.

pub mod config;
pub mod error;
pub mod flooding;
pub mod handle;
pub mod logging;
pub mod node;
pub mod tower_service;

pub use config::NodeConfig;
pub use error::NodeError;
pub use flooding::{FloodingStore, MemoryFloodingStore, StoreError, StoreEvent};
pub use handle::PrefixManagerHandle;
pub use node::{PrefixManagerNode, ShutdownHandle};
