//! Prefix advertisement engine.
//!
//! Everything in this crate is synchronous and free of I/O. The components
//! return what they changed (dirty prefixes, area deltas, origination actions,
//! records to publish) and the caller decides how to deliver it.

pub mod debounce;
pub mod dirty;
pub mod engine;
pub mod event;
pub mod gate;
pub mod ledger;
pub mod origination;
pub mod query;
pub mod redistribute;
pub mod selector;
pub mod store;

pub use debounce::Debounce;
pub use dirty::DirtySet;
pub use engine::{EngineConfig, PrefixEngine, Publication};
pub use event::{PrefixEvent, PrefixEventKind};
pub use gate::FibAckGate;
pub use ledger::PublicationLedger;
pub use origination::{OriginatedPrefix, OriginationAction, OriginationTracker};
pub use query::{AdvertisedRouteDetail, AdvertisedRouteFilter, OriginatedRouteView, RouteStage};
pub use redistribute::{AreaDelta, AreaRedistributor};
pub use selector::{Selection, select_best};
pub use store::PrefixStore;
