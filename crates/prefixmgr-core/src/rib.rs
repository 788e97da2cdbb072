//! Route updates exchanged with the route decision engine.

use std::collections::BTreeSet;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::entry::{NextHop, PrefixEntry};
use crate::types::{AreaId, Label};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// The update is a complete snapshot; anything not in it is gone.
    FullSync,
    Incremental,
}

/// A computed unicast route with its ECMP nexthop group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnicastRoute {
    pub destination: IpNet,
    pub nexthops: BTreeSet<NextHop>,
    /// Entry the route was computed from.
    pub best_entry: PrefixEntry,
    pub best_area: AreaId,
    pub install_to_fib: bool,
}

impl UnicastRoute {
    pub fn new(best_entry: PrefixEntry, best_area: AreaId) -> Self {
        Self {
            destination: best_entry.prefix,
            nexthops: BTreeSet::new(),
            best_entry,
            best_area,
            install_to_fib: true,
        }
    }

    pub fn with_nexthops(mut self, nexthops: impl IntoIterator<Item = NextHop>) -> Self {
        self.nexthops = nexthops.into_iter().collect();
        self
    }

    /// Areas represented in the ECMP group, plus the best area.
    #[must_use]
    pub fn winning_areas(&self) -> BTreeSet<AreaId> {
        self.nexthops
            .iter()
            .filter_map(|nh| nh.area.clone())
            .chain(std::iter::once(self.best_area.clone()))
            .collect()
    }
}

/// Batch of RIB changes delivered by the route decision engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RibUpdate {
    pub mode: SyncMode,
    pub unicast_upserts: Vec<UnicastRoute>,
    pub unicast_deletes: Vec<IpNet>,
    pub label_upserts: Vec<Label>,
    pub label_deletes: Vec<Label>,
}

impl RibUpdate {
    pub fn incremental() -> Self {
        Self {
            mode: SyncMode::Incremental,
            unicast_upserts: Vec::new(),
            unicast_deletes: Vec::new(),
            label_upserts: Vec::new(),
            label_deletes: Vec::new(),
        }
    }

    pub fn full_sync() -> Self {
        Self {
            mode: SyncMode::FullSync,
            ..Self::incremental()
        }
    }

    #[must_use]
    pub fn is_full_sync(&self) -> bool {
        self.mode == SyncMode::FullSync
    }

    #[must_use]
    pub fn has_label_changes(&self) -> bool {
        !self.label_upserts.is_empty() || !self.label_deletes.is_empty()
    }
}

/// Locally originated route handed to the decision engine for programming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRoute {
    pub destination: IpNet,
    pub nexthop: NextHop,
    pub entry: PrefixEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRouteUpdate {
    pub upserts: Vec<StaticRoute>,
    pub deletes: Vec<IpNet>,
}

impl StaticRouteUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}
