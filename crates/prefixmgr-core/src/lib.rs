//! Core data model for the prefix advertisement control plane.
//!
//! This crate defines the source-type ordering, prefix entries, the keys and
//! records exchanged with the flooding store, and the RIB update shapes
//! consumed from the route decision engine. It performs no I/O.

pub mod entry;
pub mod error;
pub mod key;
pub mod record;
pub mod rib;
pub mod types;

pub use entry::{ForwardingAlgorithm, ForwardingType, Metrics, NextHop, PrefixEntry};
pub use error::CoreError;
pub use key::{KeyFormat, PrefixKey};
pub use record::PrefixRecord;
pub use rib::{RibUpdate, StaticRoute, StaticRouteUpdate, SyncMode, UnicastRoute};
pub use types::{AreaId, Label, SourceType, TypeOrder};
