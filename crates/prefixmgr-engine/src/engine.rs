//! The prefix engine: one owner for the store, gate, redistribution,
//! origination and publication state.
//!
//! Every mutating call marks the affected prefixes dirty. [`PrefixEngine::flush`]
//! recomputes each dirty prefix from the authoritative state and returns the
//! records that must be put into the flooding store. Nothing here blocks or
//! performs I/O, so the caller is free to drive it from any executor.

use std::collections::{BTreeMap, BTreeSet};

use ipnet::IpNet;
use prefixmgr_core::{
    AreaId, CoreError, KeyFormat, PrefixEntry, PrefixKey, PrefixRecord, RibUpdate, SourceType,
    StaticRouteUpdate, TypeOrder,
};

use crate::dirty::DirtySet;
use crate::event::{PrefixEvent, PrefixEventKind};
use crate::gate::FibAckGate;
use crate::ledger::PublicationLedger;
use crate::origination::{OriginatedPrefix, OriginationAction, OriginationTracker};
use crate::query::{AdvertisedRouteDetail, AdvertisedRouteFilter, OriginatedRouteView, RouteStage};
use crate::redistribute::AreaRedistributor;
use crate::selector::select_best;
use crate::store::PrefixStore;

/// Default record TTL in milliseconds.
pub const DEFAULT_RECORD_TTL_MS: u64 = 300_000;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub node_name: String,
    pub areas: Vec<AreaId>,
    pub key_format: KeyFormat,
    pub record_ttl_ms: u64,
    pub enable_fib_ack: bool,
    pub type_order: TypeOrder,
    pub v4_over_v6_nexthop: bool,
    /// Hold all publication until the first full RIB sync and the store's
    /// initial sync have both been seen.
    pub wait_for_initial_sync: bool,
    pub originated_prefixes: Vec<OriginatedPrefix>,
}

impl EngineConfig {
    pub fn new(node_name: impl Into<String>, areas: impl IntoIterator<Item = AreaId>) -> Self {
        Self {
            node_name: node_name.into(),
            areas: areas.into_iter().collect(),
            key_format: KeyFormat::default(),
            record_ttl_ms: DEFAULT_RECORD_TTL_MS,
            enable_fib_ack: false,
            type_order: TypeOrder::default(),
            v4_over_v6_nexthop: false,
            wait_for_initial_sync: false,
            originated_prefixes: Vec::new(),
        }
    }
}

/// A record to put into the flooding store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub area: AreaId,
    pub key: String,
    pub record: PrefixRecord,
}

pub struct PrefixEngine {
    config: EngineConfig,
    store: PrefixStore,
    gate: FibAckGate,
    redistributor: AreaRedistributor,
    origination: OriginationTracker,
    ledger: PublicationLedger,
    dirty: DirtySet,
    /// Live records of this node stored under a key in the other encoding,
    /// by (area, raw key). Each is tombstoned on the next flush.
    stray_keys: BTreeMap<(AreaId, String), PrefixRecord>,
    fib_synced: bool,
    store_synced: bool,
}

impl PrefixEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            store: PrefixStore::new(),
            gate: FibAckGate::new(config.enable_fib_ack),
            redistributor: AreaRedistributor::new(config.areas.iter().cloned()),
            origination: OriginationTracker::new(
                config.originated_prefixes.iter().cloned(),
                config.v4_over_v6_nexthop,
            ),
            ledger: PublicationLedger::new(config.node_name.clone(), config.record_ttl_ms),
            dirty: DirtySet::new(),
            stray_keys: BTreeMap::new(),
            fib_synced: false,
            store_synced: false,
            config,
        }
    }

    /// Install aggregates that need no supporting routes. Returns the routes
    /// to hand to the decision engine.
    pub fn start(&mut self) -> StaticRouteUpdate {
        let mut routes = StaticRouteUpdate::default();
        for action in self.origination.initialize() {
            self.apply_origination(action, &mut routes);
        }
        routes
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -- Prefix updates --

    /// Apply one prefix event. Returns whether the store changed.
    ///
    /// An event carrying an entry of a different source type is rejected as
    /// a whole and nothing is applied.
    pub fn handle_prefix_event(&mut self, event: &PrefixEvent) -> Result<bool, CoreError> {
        event.validate()?;
        let t = event.source_type;
        let changed = match event.kind {
            PrefixEventKind::AddPrefixes => self.store.advertise(event.entries.iter().cloned()),
            PrefixEventKind::WithdrawPrefixes => {
                self.store.withdraw(t, event.entries.iter().map(|e| e.prefix))
            }
            PrefixEventKind::WithdrawPrefixesByType => self.store.withdraw_by_type(t),
            PrefixEventKind::SyncPrefixesByType => {
                self.store.sync_by_type(t, event.entries.iter().cloned())
            }
        };
        Ok(self.mark_changed(changed))
    }

    pub fn advertise(&mut self, source_type: SourceType, entries: Vec<PrefixEntry>) -> Result<bool, CoreError> {
        self.handle_prefix_event(&PrefixEvent::add(source_type, entries))
    }

    pub fn withdraw(&mut self, source_type: SourceType, entries: Vec<PrefixEntry>) -> Result<bool, CoreError> {
        self.handle_prefix_event(&PrefixEvent::withdraw(source_type, entries))
    }

    pub fn withdraw_by_type(&mut self, source_type: SourceType) -> bool {
        let changed = self.store.withdraw_by_type(source_type);
        self.mark_changed(changed)
    }

    pub fn sync_by_type(&mut self, source_type: SourceType, entries: Vec<PrefixEntry>) -> Result<bool, CoreError> {
        self.handle_prefix_event(&PrefixEvent::sync_by_type(source_type, entries))
    }

    fn mark_changed(&mut self, changed: BTreeSet<IpNet>) -> bool {
        let any = !changed.is_empty();
        self.dirty.mark_all(changed);
        any
    }

    // -- RIB updates --

    /// Feed a RIB batch through the gate, the redistributor and origination.
    /// Returns static routes to program or remove.
    pub fn handle_rib_update(&mut self, update: &RibUpdate) -> StaticRouteUpdate {
        if update.is_full_sync() && !self.fib_synced {
            tracing::info!("initial RIB sync received");
            self.fib_synced = true;
        }

        let labels = self.gate.apply(update);
        if !labels.is_empty() {
            tracing::debug!(count = labels.len(), "programmed label set changed");
            self.dirty.mark_all(self.store.prefixes_with_labels(&labels));
            self.dirty.mark_all(self.ledger.prefixes_with_labels(&labels));
        }

        for delta in self.redistributor.apply(update) {
            self.dirty.mark(delta.prefix());
        }

        let mut routes = StaticRouteUpdate::default();
        for action in self.origination.apply(update) {
            self.apply_origination(action, &mut routes);
        }
        routes
    }

    fn apply_origination(&mut self, action: OriginationAction, routes: &mut StaticRouteUpdate) {
        match action {
            OriginationAction::Advertise(entry) => {
                let changed = self.store.advertise([entry]);
                self.mark_changed(changed);
            }
            OriginationAction::Withdraw(prefix) => {
                let changed = self.store.withdraw(SourceType::Config, [prefix]);
                self.mark_changed(changed);
            }
            OriginationAction::ProgramRoute(route) => routes.upserts.push(route),
            OriginationAction::UnprogramRoute(prefix) => routes.deletes.push(prefix),
        }
    }

    // -- Flooding store feedback --

    /// Fold a store change notification into the publication state.
    ///
    /// `raw_key` is the key exactly as read from `area`. Keys of other nodes
    /// or unknown areas are ignored. A key of this node written in the
    /// encoding not configured here is never advertised by this node; if it
    /// holds a live record, that record is tombstoned under the same key.
    /// Returns whether something needs publishing.
    pub fn handle_store_change(
        &mut self,
        area: &AreaId,
        raw_key: &str,
        record: Option<&PrefixRecord>,
    ) -> Result<bool, CoreError> {
        let key = PrefixKey::parse(raw_key, area)?;
        if key.node != self.config.node_name || !self.config.areas.contains(&key.area) {
            return Ok(false);
        }

        if raw_key != key.encode(self.config.key_format) {
            return Ok(self.observe_stray(area, raw_key, record));
        }

        let republish = self.ledger.observe(&key.area, key.prefix, record);
        if republish {
            tracing::info!(
                area = %key.area,
                prefix = %key.prefix,
                observed_version = record.map(|r| r.version),
                "store diverged from published state, reasserting"
            );
            self.dirty.mark(key.prefix);
        }
        Ok(republish)
    }

    fn observe_stray(&mut self, area: &AreaId, raw_key: &str, record: Option<&PrefixRecord>) -> bool {
        let slot = (area.clone(), raw_key.to_string());
        match record {
            Some(record) if !record.tombstoned => {
                tracing::info!(
                    %area,
                    key = raw_key,
                    version = record.version,
                    "withdrawing record under unused key encoding"
                );
                self.stray_keys.insert(slot, record.clone());
                true
            }
            _ => {
                self.stray_keys.remove(&slot);
                false
            }
        }
    }

    /// The flooding store finished its initial sync.
    pub fn mark_store_synced(&mut self) {
        if !self.store_synced {
            tracing::info!("flooding store synced");
            self.store_synced = true;
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        !self.config.wait_for_initial_sync || (self.fib_synced && self.store_synced)
    }

    /// Whether a flush would have anything to do.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.is_ready() && (!self.dirty.is_empty() || !self.stray_keys.is_empty())
    }

    #[must_use]
    pub fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    // -- Publication --

    fn candidates<'a>(&'a self, area: &'a AreaId, prefix: &'a IpNet) -> impl Iterator<Item = &'a PrefixEntry> + 'a {
        self.store
            .entries_for(prefix)
            .chain(self.redistributor.advertised(prefix, area))
    }

    /// Entry to publish for `prefix` in `area`, or `None` for a tombstone.
    fn desired_for(&self, area: &AreaId, prefix: &IpNet) -> Option<PrefixEntry> {
        let order = &self.config.type_order;
        let candidates: Vec<&PrefixEntry> = self.candidates(area, prefix).collect();
        let best = select_best(candidates.iter().copied(), order)?;

        // The preferred entry waits for its label: keep announcing what is
        // already out there as long as that is still valid.
        if !self.gate.is_eligible(&best.best_entry) {
            let held = self
                .ledger
                .live_entry(area, prefix)
                .filter(|live| self.gate.is_eligible(live));
            if let Some(live) = held {
                return Some(live.clone());
            }
        }

        select_best(
            candidates.into_iter().filter(|e| self.gate.is_eligible(e)),
            order,
        )
        .map(|s| s.best_entry)
    }

    fn publication(&self, area: &AreaId, prefix: IpNet, record: PrefixRecord) -> Publication {
        let key = PrefixKey::new(self.config.node_name.clone(), area.clone(), prefix);
        Publication {
            area: area.clone(),
            key: key.encode(self.config.key_format),
            record,
        }
    }

    /// Recompute every dirty prefix and return the records that changed.
    /// Returns nothing while the initial-sync hold is in effect.
    pub fn flush(&mut self) -> Vec<Publication> {
        if !self.is_ready() {
            return Vec::new();
        }

        let mut publications: Vec<Publication> = std::mem::take(&mut self.stray_keys)
            .into_iter()
            .map(|((area, key), observed)| Publication {
                area,
                key,
                record: PrefixRecord::tombstone(
                    self.config.node_name.clone(),
                    observed.entry,
                    observed.version + 1,
                    self.config.record_ttl_ms,
                ),
            })
            .collect();
        for prefix in self.dirty.take() {
            for area in &self.config.areas {
                let desired = self.desired_for(area, &prefix);
                if let Some(record) = self.ledger.publish(area, prefix, desired.as_ref()) {
                    tracing::trace!(
                        %area,
                        %prefix,
                        version = record.version,
                        tombstoned = record.tombstoned,
                        "publishing"
                    );
                    publications.push(self.publication(area, prefix, record));
                }
            }
        }
        if !publications.is_empty() {
            tracing::debug!(count = publications.len(), "flushed prefix updates");
        }
        publications
    }

    /// Live records to re-put at their current version so they do not expire.
    #[must_use]
    pub fn refresh(&self) -> Vec<Publication> {
        self.ledger
            .live_records()
            .into_iter()
            .map(|(area, prefix, record)| self.publication(&area, prefix, record))
            .collect()
    }

    /// Last record published for a key.
    #[must_use]
    pub fn published(&self, area: &AreaId, prefix: &IpNet) -> Option<PrefixRecord> {
        self.ledger.current(area, prefix)
    }

    // -- Queries --

    #[must_use]
    pub fn get_prefixes(&self) -> Vec<PrefixEntry> {
        self.store.get_all()
    }

    #[must_use]
    pub fn get_prefixes_by_type(&self, source_type: SourceType) -> Vec<PrefixEntry> {
        self.store.get_by_type(source_type)
    }

    /// Stored routes per prefix with the overall winner, narrowed by `filter`.
    /// Prefixes with no entry of the filtered type are left out.
    #[must_use]
    pub fn get_advertised_routes_filtered(&self, filter: &AdvertisedRouteFilter) -> Vec<AdvertisedRouteDetail> {
        self.store
            .prefixes()
            .filter(|p| filter.matches_prefix(p))
            .filter_map(|prefix| {
                let entries: Vec<&PrefixEntry> = self.store.entries_for(prefix).collect();
                let selection = select_best(entries.iter().copied(), &self.config.type_order)?;
                let routes: Vec<PrefixEntry> = entries
                    .into_iter()
                    .filter(|e| filter.matches_type(e.source_type))
                    .cloned()
                    .collect();
                if routes.is_empty() {
                    return None;
                }
                Some(AdvertisedRouteDetail {
                    prefix: *prefix,
                    best_type: selection.best_type,
                    best_types: selection.tied_types,
                    routes,
                })
            })
            .collect()
    }

    /// Routes for one area, either before gating or as published.
    #[must_use]
    pub fn get_area_advertised_routes(
        &self,
        area: &AreaId,
        stage: RouteStage,
        filter: &AdvertisedRouteFilter,
    ) -> Vec<PrefixEntry> {
        if !self.config.areas.contains(area) {
            return Vec::new();
        }

        let entries: Vec<PrefixEntry> = match stage {
            RouteStage::PreFilterAdvertised => {
                let prefixes: BTreeSet<IpNet> = self
                    .store
                    .prefixes()
                    .copied()
                    .chain(self.redistributor.prefixes_in_area(area).copied())
                    .collect();
                prefixes
                    .iter()
                    .filter_map(|p| {
                        select_best(self.candidates(area, p), &self.config.type_order)
                            .map(|s| s.best_entry)
                    })
                    .collect()
            }
            RouteStage::PostFilterAdvertised => {
                let prefixes: BTreeSet<IpNet> = self.ledger.prefixes_in_area(area).collect();
                prefixes
                    .iter()
                    .filter_map(|p| self.ledger.live_entry(area, p).cloned())
                    .collect()
            }
        };

        entries
            .into_iter()
            .filter(|e| filter.matches_prefix(&e.prefix) && filter.matches_type(e.source_type))
            .collect()
    }

    #[must_use]
    pub fn get_originated_prefixes(&self) -> Vec<OriginatedRouteView> {
        self.origination
            .views()
            .map(|(config, supporting, installed)| OriginatedRouteView {
                config: config.clone(),
                supporting_prefixes: supporting.iter().copied().collect(),
                installed,
            })
            .collect()
    }
}
