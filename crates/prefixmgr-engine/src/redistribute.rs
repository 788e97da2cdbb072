//! Cross-area redistribution of RIB best routes.
//!
//! A route learned in some areas is re-advertised into every other
//! configured area. The copy records the area it came from, costs one more
//! unit of distance and loses the attributes that only make sense inside the
//! originating area.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use ipnet::IpNet;
use prefixmgr_core::{
    AreaId, ForwardingAlgorithm, ForwardingType, PrefixEntry, RibUpdate, SourceType, UnicastRoute,
};

/// Change to what is advertised for one prefix in one area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AreaDelta {
    Advertise { area: AreaId, entry: PrefixEntry },
    Withdraw { area: AreaId, prefix: IpNet },
}

impl AreaDelta {
    #[must_use]
    pub fn area(&self) -> &AreaId {
        match self {
            AreaDelta::Advertise { area, .. } | AreaDelta::Withdraw { area, .. } => area,
        }
    }

    #[must_use]
    pub fn prefix(&self) -> IpNet {
        match self {
            AreaDelta::Advertise { entry, .. } => entry.prefix,
            AreaDelta::Withdraw { prefix, .. } => *prefix,
        }
    }
}

/// Build the entry advertised into other areas for `route`.
#[must_use]
pub fn redistributed_entry(route: &UnicastRoute) -> PrefixEntry {
    let mut entry = route.best_entry.clone();
    entry.area_stack.push(route.best_area.clone());
    entry.metrics.distance = entry.metrics.distance.saturating_add(1);
    entry.source_type = SourceType::Rib;
    entry.forwarding_algorithm = ForwardingAlgorithm::default();
    entry.forwarding_type = ForwardingType::default();
    entry.min_nexthop = None;
    entry.prepend_label = None;
    entry
}

/// Owns the per-(prefix, area) redistributed state.
#[derive(Debug, Default)]
pub struct AreaRedistributor {
    areas: BTreeSet<AreaId>,
    routes: HashMap<IpNet, UnicastRoute>,
    advertised: HashMap<IpNet, BTreeMap<AreaId, PrefixEntry>>,
}

impl AreaRedistributor {
    pub fn new(areas: impl IntoIterator<Item = AreaId>) -> Self {
        Self {
            areas: areas.into_iter().collect(),
            routes: HashMap::new(),
            advertised: HashMap::new(),
        }
    }

    /// Apply the unicast part of a RIB update and return the per-area deltas.
    ///
    /// Deletes are applied before upserts. A full sync also deletes every
    /// known route missing from the snapshot. Each (prefix, area) gets at most
    /// one delta per call.
    pub fn apply(&mut self, update: &RibUpdate) -> Vec<AreaDelta> {
        let mut affected: BTreeSet<IpNet> = BTreeSet::new();

        if update.is_full_sync() {
            let keep: BTreeSet<IpNet> = update.unicast_upserts.iter().map(|r| r.destination).collect();
            let gone: Vec<IpNet> = self
                .routes
                .keys()
                .filter(|p| !keep.contains(p))
                .copied()
                .collect();
            for prefix in gone {
                self.routes.remove(&prefix);
                affected.insert(prefix);
            }
        }

        for prefix in &update.unicast_deletes {
            if self.routes.remove(prefix).is_some() {
                affected.insert(*prefix);
            }
        }

        for route in &update.unicast_upserts {
            if route.best_entry.prefix != route.destination {
                tracing::warn!(
                    destination = %route.destination,
                    payload = %route.best_entry.prefix,
                    "discarding RIB route with mismatched payload prefix"
                );
                continue;
            }
            if self.routes.get(&route.destination) != Some(route) {
                self.routes.insert(route.destination, route.clone());
                affected.insert(route.destination);
            }
        }

        let mut deltas = Vec::new();
        for prefix in affected {
            self.diff_prefix(prefix, &mut deltas);
        }
        deltas
    }

    fn desired(&self, prefix: &IpNet) -> BTreeMap<AreaId, PrefixEntry> {
        let Some(route) = self.routes.get(prefix) else {
            return BTreeMap::new();
        };
        let winning = route.winning_areas();
        let entry = redistributed_entry(route);
        self.areas
            .iter()
            .filter(|area| !winning.contains(*area))
            .filter(|area| !route.best_entry.area_stack.contains(*area))
            .map(|area| (area.clone(), entry.clone()))
            .collect()
    }

    fn diff_prefix(&mut self, prefix: IpNet, deltas: &mut Vec<AreaDelta>) {
        let desired = self.desired(&prefix);
        let previous = self.advertised.remove(&prefix).unwrap_or_default();

        for (area, entry) in &desired {
            if previous.get(area) != Some(entry) {
                tracing::debug!(%area, %prefix, "redistribute advertise");
                deltas.push(AreaDelta::Advertise {
                    area: area.clone(),
                    entry: entry.clone(),
                });
            }
        }
        for area in previous.keys() {
            if !desired.contains_key(area) {
                tracing::debug!(%area, %prefix, "redistribute withdraw");
                deltas.push(AreaDelta::Withdraw {
                    area: area.clone(),
                    prefix,
                });
            }
        }

        if !desired.is_empty() {
            self.advertised.insert(prefix, desired);
        }
    }

    /// Entry currently redistributed into `area` for `prefix`.
    #[must_use]
    pub fn advertised(&self, prefix: &IpNet, area: &AreaId) -> Option<&PrefixEntry> {
        self.advertised.get(prefix)?.get(area)
    }

    /// Areas currently holding a redistributed entry for `prefix`.
    #[must_use]
    pub fn advertised_areas(&self, prefix: &IpNet) -> BTreeSet<AreaId> {
        self.advertised
            .get(prefix)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Prefixes redistributed into `area`.
    pub fn prefixes_in_area<'a>(&'a self, area: &'a AreaId) -> impl Iterator<Item = &'a IpNet> + 'a {
        self.advertised
            .iter()
            .filter(move |(_, m)| m.contains_key(area))
            .map(|(prefix, _)| prefix)
    }

    #[must_use]
    pub fn route(&self, prefix: &IpNet) -> Option<&UnicastRoute> {
        self.routes.get(prefix)
    }

    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}
