//! Conditional origination of aggregate prefixes.
//!
//! An aggregate is installed once enough strictly more specific RIB routes
//! ("supporting routes") exist, and uninstalled when the count falls back
//! below the threshold. Installing advertises a CONFIG entry and, when
//! configured, asks the decision engine to program a local route.

use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use prefixmgr_core::entry::{DEFAULT_PATH_PREFERENCE, DEFAULT_SOURCE_PREFERENCE};
use prefixmgr_core::{Metrics, NextHop, PrefixEntry, RibUpdate, SourceType, StaticRoute};

pub const LOCAL_NEXTHOP_V4: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
pub const LOCAL_NEXTHOP_V6: IpAddr = IpAddr::V6(Ipv6Addr::UNSPECIFIED);

/// Configuration of one originated aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginatedPrefix {
    pub prefix: IpNet,
    #[serde(default)]
    pub minimum_supporting_routes: usize,
    #[serde(default)]
    pub install_to_fib: bool,
    #[serde(default = "default_path_preference")]
    pub path_preference: i32,
    #[serde(default = "default_source_preference")]
    pub source_preference: i32,
}

fn default_path_preference() -> i32 {
    DEFAULT_PATH_PREFERENCE
}

fn default_source_preference() -> i32 {
    DEFAULT_SOURCE_PREFERENCE
}

impl OriginatedPrefix {
    pub fn new(prefix: IpNet, minimum_supporting_routes: usize) -> Self {
        Self {
            prefix,
            minimum_supporting_routes,
            install_to_fib: false,
            path_preference: default_path_preference(),
            source_preference: default_source_preference(),
        }
    }

    pub fn with_install_to_fib(mut self, install: bool) -> Self {
        self.install_to_fib = install;
        self
    }

    /// Whether `candidate` is a strictly more specific route inside the aggregate.
    #[must_use]
    pub fn is_supported_by(&self, candidate: &IpNet) -> bool {
        candidate.prefix_len() > self.prefix.prefix_len() && self.prefix.contains(candidate)
    }

    /// The CONFIG entry advertised while installed.
    #[must_use]
    pub fn entry(&self) -> PrefixEntry {
        PrefixEntry::new(self.prefix, SourceType::Config).with_metrics(Metrics::new(
            self.path_preference,
            self.source_preference,
            0,
        ))
    }
}

/// What an install or uninstall transition asks the caller to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginationAction {
    Advertise(PrefixEntry),
    Withdraw(IpNet),
    ProgramRoute(StaticRoute),
    UnprogramRoute(IpNet),
}

#[derive(Debug, Clone)]
struct OriginatedRoute {
    config: OriginatedPrefix,
    supporting: BTreeSet<IpNet>,
    installed: bool,
}

impl OriginatedRoute {
    fn should_install(&self) -> bool {
        self.supporting.len() >= self.config.minimum_supporting_routes
    }
}

#[derive(Debug, Default)]
pub struct OriginationTracker {
    routes: BTreeMap<IpNet, OriginatedRoute>,
    v4_over_v6_nexthop: bool,
}

impl OriginationTracker {
    pub fn new(configs: impl IntoIterator<Item = OriginatedPrefix>, v4_over_v6_nexthop: bool) -> Self {
        let routes = configs
            .into_iter()
            .map(|config| {
                (
                    config.prefix,
                    OriginatedRoute {
                        config,
                        supporting: BTreeSet::new(),
                        installed: false,
                    },
                )
            })
            .collect();
        Self {
            routes,
            v4_over_v6_nexthop,
        }
    }

    /// Install every aggregate whose threshold is already met (threshold 0).
    pub fn initialize(&mut self) -> Vec<OriginationAction> {
        self.evaluate()
    }

    /// Update supporting routes from a RIB batch and return any transitions.
    ///
    /// A full sync rebuilds every supporting set from the snapshot; an
    /// incremental batch applies deletes, then upserts.
    pub fn apply(&mut self, update: &RibUpdate) -> Vec<OriginationAction> {
        if self.routes.is_empty() {
            return Vec::new();
        }

        if update.is_full_sync() {
            for route in self.routes.values_mut() {
                route.supporting.clear();
            }
        } else {
            for deleted in &update.unicast_deletes {
                for route in self.routes.values_mut() {
                    route.supporting.remove(deleted);
                }
            }
        }

        for upsert in &update.unicast_upserts {
            for route in self.routes.values_mut() {
                if route.config.is_supported_by(&upsert.destination) {
                    route.supporting.insert(upsert.destination);
                }
            }
        }

        self.evaluate()
    }

    fn evaluate(&mut self) -> Vec<OriginationAction> {
        let mut actions = Vec::new();
        for route in self.routes.values_mut() {
            let should = route.should_install();
            if should == route.installed {
                continue;
            }
            route.installed = should;

            let config = &route.config;
            if should {
                tracing::info!(
                    prefix = %config.prefix,
                    supporting = route.supporting.len(),
                    "installing originated prefix"
                );
                let entry = config.entry();
                if config.install_to_fib {
                    actions.push(OriginationAction::ProgramRoute(StaticRoute {
                        destination: config.prefix,
                        nexthop: NextHop::new(local_nexthop(&config.prefix, self.v4_over_v6_nexthop)),
                        entry: entry.clone(),
                    }));
                }
                actions.push(OriginationAction::Advertise(entry));
            } else {
                tracing::info!(
                    prefix = %config.prefix,
                    supporting = route.supporting.len(),
                    "uninstalling originated prefix"
                );
                if config.install_to_fib {
                    actions.push(OriginationAction::UnprogramRoute(config.prefix));
                }
                actions.push(OriginationAction::Withdraw(config.prefix));
            }
        }
        actions
    }

    #[must_use]
    pub fn is_installed(&self, prefix: &IpNet) -> bool {
        self.routes.get(prefix).is_some_and(|r| r.installed)
    }

    #[must_use]
    pub fn supporting_count(&self, prefix: &IpNet) -> usize {
        self.routes.get(prefix).map_or(0, |r| r.supporting.len())
    }

    /// Snapshot of (config, supporting routes, installed) per aggregate.
    pub fn views(&self) -> impl Iterator<Item = (&OriginatedPrefix, &BTreeSet<IpNet>, bool)> {
        self.routes
            .values()
            .map(|r| (&r.config, &r.supporting, r.installed))
    }
}

/// Nexthop for a locally programmed aggregate.
#[must_use]
pub fn local_nexthop(prefix: &IpNet, v4_over_v6_nexthop: bool) -> IpAddr {
    match prefix {
        IpNet::V4(_) if !v4_over_v6_nexthop => LOCAL_NEXTHOP_V4,
        _ => LOCAL_NEXTHOP_V6,
    }
}
