//! What this node last published per (area, prefix), and at which version.
//!
//! The ledger decides whether a flush result is a new record at all, assigns
//! versions, and reconciles change notifications coming back from the
//! flooding store. Versions never go backwards.

use std::collections::{BTreeSet, HashMap};

use ipnet::IpNet;
use prefixmgr_core::{AreaId, Label, PrefixEntry, PrefixRecord};

#[derive(Debug, Clone)]
struct LedgerEntry {
    version: u64,
    last_entry: Option<PrefixEntry>,
    tombstoned: bool,
    /// False once the store is known to hold something else for this key.
    in_sync: bool,
}

#[derive(Debug)]
pub struct PublicationLedger {
    node_name: String,
    ttl_ms: u64,
    entries: HashMap<(AreaId, IpNet), LedgerEntry>,
}

impl PublicationLedger {
    pub fn new(node_name: impl Into<String>, ttl_ms: u64) -> Self {
        Self {
            node_name: node_name.into(),
            ttl_ms,
            entries: HashMap::new(),
        }
    }

    fn record(&self, entry: &LedgerEntry) -> PrefixRecord {
        if entry.tombstoned {
            PrefixRecord::tombstone(
                self.node_name.clone(),
                entry.last_entry.clone(),
                entry.version,
                self.ttl_ms,
            )
        } else {
            PrefixRecord {
                node_name: self.node_name.clone(),
                entry: entry.last_entry.clone(),
                tombstoned: false,
                version: entry.version,
                ttl_ms: self.ttl_ms,
            }
        }
    }

    /// Reconcile the desired advertisement for a key with what was last
    /// published. Returns the record to put, or `None` if nothing changed.
    ///
    /// `None` for `desired` means nothing survives for the key: a live record
    /// becomes a tombstone that keeps the last entry.
    pub fn publish(
        &mut self,
        area: &AreaId,
        prefix: IpNet,
        desired: Option<&PrefixEntry>,
    ) -> Option<PrefixRecord> {
        let key = (area.clone(), prefix);
        let next = match (self.entries.get(&key), desired) {
            (None, None) => return None,
            (None, Some(desired)) => LedgerEntry {
                version: 1,
                last_entry: Some(desired.clone()),
                tombstoned: false,
                in_sync: true,
            },
            (Some(current), Some(desired)) => {
                if current.in_sync
                    && !current.tombstoned
                    && current.last_entry.as_ref() == Some(desired)
                {
                    return None;
                }
                LedgerEntry {
                    version: current.version + 1,
                    last_entry: Some(desired.clone()),
                    tombstoned: false,
                    in_sync: true,
                }
            }
            (Some(current), None) => {
                if current.in_sync && current.tombstoned {
                    return None;
                }
                LedgerEntry {
                    version: current.version + 1,
                    last_entry: current.last_entry.clone(),
                    tombstoned: true,
                    in_sync: true,
                }
            }
        };
        let record = self.record(&next);
        self.entries.insert(key, next);
        Some(record)
    }

    /// Fold a change notification for one of this node's keys into the
    /// ledger. `None` means the key expired or was removed.
    ///
    /// Returns true when the key must be republished on the next flush.
    pub fn observe(&mut self, area: &AreaId, prefix: IpNet, observed: Option<&PrefixRecord>) -> bool {
        let key = (area.clone(), prefix);
        if !self.entries.contains_key(&key) {
            // Key we have no memory of, e.g. left over from a previous run.
            let Some(record) = observed else {
                return false;
            };
            self.entries.insert(
                key,
                LedgerEntry {
                    version: record.version,
                    last_entry: record.entry.clone(),
                    tombstoned: record.tombstoned,
                    in_sync: record.tombstoned,
                },
            );
            return !record.tombstoned;
        }

        let node_name = &self.node_name;
        let Some(current) = self.entries.get_mut(&key) else {
            return false;
        };

        let Some(record) = observed else {
            if current.tombstoned {
                self.entries.remove(&key);
                return false;
            }
            current.in_sync = false;
            return true;
        };

        if record.version < current.version {
            // stale echo of an older put
            return false;
        }

        let same = record.node_name == *node_name
            && record.tombstoned == current.tombstoned
            && record.entry == current.last_entry;
        current.version = current.version.max(record.version);
        if same {
            current.in_sync = true;
            false
        } else {
            current.in_sync = false;
            true
        }
    }

    /// Last published record for a key, live or tombstone.
    #[must_use]
    pub fn current(&self, area: &AreaId, prefix: &IpNet) -> Option<PrefixRecord> {
        self.entries
            .get(&(area.clone(), *prefix))
            .map(|e| self.record(e))
    }

    /// Entry currently advertised for a key, if the key is live and in sync.
    #[must_use]
    pub fn live_entry(&self, area: &AreaId, prefix: &IpNet) -> Option<&PrefixEntry> {
        self.entries
            .get(&(area.clone(), *prefix))
            .filter(|e| e.in_sync && !e.tombstoned)
            .and_then(|e| e.last_entry.as_ref())
    }

    /// Every live, in-sync record, for TTL refresh.
    #[must_use]
    pub fn live_records(&self) -> Vec<(AreaId, IpNet, PrefixRecord)> {
        let mut records: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, e)| e.in_sync && !e.tombstoned)
            .map(|((area, prefix), e)| (area.clone(), *prefix, self.record(e)))
            .collect();
        records.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));
        records
    }

    /// Prefixes whose live published entry carries one of `labels`.
    #[must_use]
    pub fn prefixes_with_labels(&self, labels: &BTreeSet<Label>) -> BTreeSet<IpNet> {
        self.entries
            .iter()
            .filter(|(_, e)| !e.tombstoned)
            .filter(|(_, e)| {
                e.last_entry
                    .as_ref()
                    .and_then(PrefixEntry::label)
                    .is_some_and(|l| labels.contains(&l))
            })
            .map(|((_, prefix), _)| *prefix)
            .collect()
    }

    /// Prefixes with any ledger state in `area`.
    pub fn prefixes_in_area<'a>(&'a self, area: &'a AreaId) -> impl Iterator<Item = IpNet> + 'a {
        self.entries
            .keys()
            .filter(move |(a, _)| a == area)
            .map(|(_, prefix)| *prefix)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prefixmgr_core::SourceType;

    const NODE: &str = "node-1";
    const TTL: u64 = 300_000;

    fn area() -> AreaId {
        AreaId::from("0")
    }

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    fn make_entry(label: Option<u32>) -> PrefixEntry {
        let entry = PrefixEntry::new(net("10.1.1.1/32"), SourceType::Default);
        match label {
            Some(l) => entry.with_label(l),
            None => entry,
        }
    }

    fn publish(ledger: &mut PublicationLedger, desired: Option<&PrefixEntry>) -> Option<PrefixRecord> {
        ledger.publish(&area(), net("10.1.1.1/32"), desired)
    }

    #[test]
    fn first_publish_is_version_one() {
        let mut ledger = PublicationLedger::new(NODE, TTL);
        let record = publish(&mut ledger, Some(&make_entry(None))).unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.node_name, NODE);
        assert_eq!(record.ttl_ms, TTL);
        assert!(!record.tombstoned);
    }

    #[test]
    fn identical_publish_does_not_bump() {
        let mut ledger = PublicationLedger::new(NODE, TTL);
        let e = make_entry(None);
        assert!(publish(&mut ledger, Some(&e)).is_some());
        assert!(publish(&mut ledger, Some(&e)).is_none());
        assert_eq!(ledger.current(&area(), &net("10.1.1.1/32")).unwrap().version, 1);
    }

    #[test]
    fn changed_content_bumps() {
        let mut ledger = PublicationLedger::new(NODE, TTL);
        publish(&mut ledger, Some(&make_entry(None)));
        let record = publish(&mut ledger, Some(&make_entry(Some(65001)))).unwrap();
        assert_eq!(record.version, 2);
        assert_eq!(record.entry.unwrap().prepend_label, Some(65001));
    }

    #[test]
    fn tombstone_keeps_last_entry_and_is_not_repeated() {
        let mut ledger = PublicationLedger::new(NODE, TTL);
        let e = make_entry(None);
        publish(&mut ledger, Some(&e));
        let record = publish(&mut ledger, None).unwrap();
        assert!(record.tombstoned);
        assert_eq!(record.version, 2);
        assert_eq!(record.entry, Some(e.clone()));
        assert!(publish(&mut ledger, None).is_none());

        // revive
        let record = publish(&mut ledger, Some(&e)).unwrap();
        assert_eq!(record.version, 3);
        assert!(!record.tombstoned);
    }

    #[test]
    fn nothing_to_withdraw_for_unknown_key() {
        let mut ledger = PublicationLedger::new(NODE, TTL);
        assert!(publish(&mut ledger, None).is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn echo_of_own_publication_is_ignored() {
        let mut ledger = PublicationLedger::new(NODE, TTL);
        let record = publish(&mut ledger, Some(&make_entry(None))).unwrap();
        assert!(!ledger.observe(&area(), net("10.1.1.1/32"), Some(&record)));

        let newer = publish(&mut ledger, Some(&make_entry(Some(7)))).unwrap();
        // stale echo of version 1 after version 2 was published
        assert!(!ledger.observe(&area(), net("10.1.1.1/32"), Some(&record)));
        assert!(!ledger.observe(&area(), net("10.1.1.1/32"), Some(&newer)));
    }

    #[test]
    fn overwrite_at_higher_version_republishes_above_it() {
        let mut ledger = PublicationLedger::new(NODE, TTL);
        let e = make_entry(None);
        let ours = publish(&mut ledger, Some(&e)).unwrap();

        let foreign = PrefixRecord {
            node_name: NODE.into(),
            entry: None,
            tombstoned: false,
            version: ours.version + 1,
            ttl_ms: TTL,
        };
        assert!(ledger.observe(&area(), net("10.1.1.1/32"), Some(&foreign)));
        assert!(ledger.live_entry(&area(), &net("10.1.1.1/32")).is_none());

        let republished = publish(&mut ledger, Some(&e)).unwrap();
        assert_eq!(republished.version, ours.version + 2);
        assert_eq!(republished.entry, Some(e));
    }

    #[test]
    fn overwrite_at_same_version_republishes() {
        let mut ledger = PublicationLedger::new(NODE, TTL);
        let e = make_entry(None);
        let ours = publish(&mut ledger, Some(&e)).unwrap();
        let mut foreign = ours.clone();
        foreign.entry = Some(make_entry(Some(99)));
        assert!(ledger.observe(&area(), net("10.1.1.1/32"), Some(&foreign)));
        assert_eq!(publish(&mut ledger, Some(&e)).unwrap().version, 2);
    }

    #[test]
    fn same_content_at_higher_version_is_adopted() {
        let mut ledger = PublicationLedger::new(NODE, TTL);
        let e = make_entry(None);
        let mut ours = publish(&mut ledger, Some(&e)).unwrap();
        ours.version = 5;
        assert!(!ledger.observe(&area(), net("10.1.1.1/32"), Some(&ours)));
        assert_eq!(ledger.current(&area(), &net("10.1.1.1/32")).unwrap().version, 5);
        assert_eq!(publish(&mut ledger, None).unwrap().version, 6);
    }

    #[test]
    fn expiry_of_live_key_republishes() {
        let mut ledger = PublicationLedger::new(NODE, TTL);
        let e = make_entry(None);
        publish(&mut ledger, Some(&e));
        assert!(ledger.observe(&area(), net("10.1.1.1/32"), None));
        assert_eq!(publish(&mut ledger, Some(&e)).unwrap().version, 2);
    }

    #[test]
    fn expiry_of_tombstone_is_forgotten() {
        let mut ledger = PublicationLedger::new(NODE, TTL);
        publish(&mut ledger, Some(&make_entry(None)));
        publish(&mut ledger, None);
        assert!(!ledger.observe(&area(), net("10.1.1.1/32"), None));
        assert!(ledger.is_empty());
        // a fresh advertisement starts over
        assert_eq!(publish(&mut ledger, Some(&make_entry(None))).unwrap().version, 1);
    }

    #[test]
    fn leftover_live_key_is_tombstoned_above_observed() {
        let mut ledger = PublicationLedger::new(NODE, TTL);
        let leftover = PrefixRecord::live(NODE, make_entry(None), 4, TTL);
        assert!(ledger.observe(&area(), net("10.1.1.1/32"), Some(&leftover)));
        let record = publish(&mut ledger, None).unwrap();
        assert!(record.tombstoned);
        assert_eq!(record.version, 5);
    }

    #[test]
    fn leftover_tombstone_needs_nothing() {
        let mut ledger = PublicationLedger::new(NODE, TTL);
        let leftover = PrefixRecord::tombstone(NODE, Some(make_entry(None)), 4, TTL);
        assert!(!ledger.observe(&area(), net("10.1.1.1/32"), Some(&leftover)));
        assert!(publish(&mut ledger, None).is_none());
        assert_eq!(publish(&mut ledger, Some(&make_entry(None))).unwrap().version, 5);
    }

    #[test]
    fn live_records_and_labels() {
        let mut ledger = PublicationLedger::new(NODE, TTL);
        ledger.publish(&area(), net("10.0.0.1/32"), Some(&make_entry(Some(65001))));
        ledger.publish(&area(), net("10.0.0.2/32"), Some(&make_entry(None)));
        ledger.publish(&area(), net("10.0.0.2/32"), None);

        let live = ledger.live_records();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].1, net("10.0.0.1/32"));

        let hit = ledger.prefixes_with_labels(&BTreeSet::from([Label(65001)]));
        assert_eq!(hit, BTreeSet::from([net("10.0.0.1/32")]));
        assert_eq!(ledger.prefixes_in_area(&area()).count(), 2);
    }
}
