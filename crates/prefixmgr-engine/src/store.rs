//! Authoritative prefix store: prefix -> source type -> entry.

use std::collections::{BTreeMap, BTreeSet};

use ipnet::IpNet;
use prefixmgr_core::{Label, PrefixEntry, SourceType};

/// Holds at most one entry per (prefix, source type).
///
/// Mutators return the set of prefixes whose stored state actually changed,
/// so an empty set means the call was a no-op.
#[derive(Debug, Default)]
#[must_use]
pub struct PrefixStore {
    entries: BTreeMap<IpNet, BTreeMap<SourceType, PrefixEntry>>,
}

impl PrefixStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite entries. Identical entries are left untouched.
    pub fn advertise(&mut self, entries: impl IntoIterator<Item = PrefixEntry>) -> BTreeSet<IpNet> {
        let mut changed = BTreeSet::new();
        for entry in entries {
            let prefix = entry.prefix;
            let by_type = self.entries.entry(prefix).or_default();
            if by_type.get(&entry.source_type) != Some(&entry) {
                by_type.insert(entry.source_type, entry);
                changed.insert(prefix);
            }
        }
        changed
    }

    /// Remove the `source_type` entry for each prefix.
    pub fn withdraw(
        &mut self,
        source_type: SourceType,
        prefixes: impl IntoIterator<Item = IpNet>,
    ) -> BTreeSet<IpNet> {
        let mut changed = BTreeSet::new();
        for prefix in prefixes {
            if self.remove(&prefix, source_type).is_some() {
                changed.insert(prefix);
            }
        }
        changed
    }

    /// Remove every entry of `source_type`.
    pub fn withdraw_by_type(&mut self, source_type: SourceType) -> BTreeSet<IpNet> {
        let prefixes: Vec<IpNet> = self
            .entries
            .iter()
            .filter(|(_, by_type)| by_type.contains_key(&source_type))
            .map(|(prefix, _)| *prefix)
            .collect();
        self.withdraw(source_type, prefixes)
    }

    /// Make the `source_type` entries exactly `entries`: stale ones are
    /// withdrawn, new or changed ones upserted, identical ones kept.
    pub fn sync_by_type(
        &mut self,
        source_type: SourceType,
        entries: impl IntoIterator<Item = PrefixEntry>,
    ) -> BTreeSet<IpNet> {
        let wanted: BTreeMap<IpNet, PrefixEntry> =
            entries.into_iter().map(|e| (e.prefix, e)).collect();

        let stale: Vec<IpNet> = self
            .entries
            .iter()
            .filter(|(prefix, by_type)| {
                by_type.contains_key(&source_type) && !wanted.contains_key(prefix)
            })
            .map(|(prefix, _)| *prefix)
            .collect();

        let mut changed = self.withdraw(source_type, stale);
        changed.extend(self.advertise(wanted.into_values()));
        changed
    }

    fn remove(&mut self, prefix: &IpNet, source_type: SourceType) -> Option<PrefixEntry> {
        let by_type = self.entries.get_mut(prefix)?;
        let removed = by_type.remove(&source_type);
        if by_type.is_empty() {
            self.entries.remove(prefix);
        }
        removed
    }

    /// Entries for one prefix, in source-type order.
    pub fn entries_for(&self, prefix: &IpNet) -> impl Iterator<Item = &PrefixEntry> {
        self.entries.get(prefix).into_iter().flat_map(|m| m.values())
    }

    #[must_use]
    pub fn get(&self, prefix: &IpNet, source_type: SourceType) -> Option<&PrefixEntry> {
        self.entries.get(prefix)?.get(&source_type)
    }

    #[must_use]
    pub fn contains_prefix(&self, prefix: &IpNet) -> bool {
        self.entries.contains_key(prefix)
    }

    /// Snapshot of every stored entry.
    #[must_use]
    pub fn get_all(&self) -> Vec<PrefixEntry> {
        self.entries.values().flat_map(|m| m.values().cloned()).collect()
    }

    /// Snapshot of the entries of one source type.
    #[must_use]
    pub fn get_by_type(&self, source_type: SourceType) -> Vec<PrefixEntry> {
        self.entries
            .values()
            .filter_map(|m| m.get(&source_type).cloned())
            .collect()
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &IpNet> {
        self.entries.keys()
    }

    /// Prefixes with at least one entry carrying one of `labels`.
    #[must_use]
    pub fn prefixes_with_labels(&self, labels: &BTreeSet<Label>) -> BTreeSet<IpNet> {
        if labels.is_empty() {
            return BTreeSet::new();
        }
        self.entries
            .iter()
            .filter(|(_, m)| {
                m.values()
                    .any(|e| e.label().is_some_and(|l| labels.contains(&l)))
            })
            .map(|(prefix, _)| *prefix)
            .collect()
    }

    /// Number of stored (prefix, type) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prefixmgr_core::Metrics;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    fn make_entry(prefix: &str, t: SourceType) -> PrefixEntry {
        PrefixEntry::new(net(prefix), t)
    }

    #[test]
    fn advertise_is_idempotent() {
        let mut store = PrefixStore::new();
        let x = make_entry("10.1.1.1/32", SourceType::Default);
        assert!(!store.advertise([x.clone()]).is_empty());
        assert!(store.advertise([x]).is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn advertise_overwrites_same_type() {
        let mut store = PrefixStore::new();
        store.advertise([make_entry("10.1.1.1/32", SourceType::Bgp)]);
        let updated = make_entry("10.1.1.1/32", SourceType::Bgp).with_metrics(Metrics::new(1, 2, 3));
        let changed = store.advertise([updated.clone()]);
        assert_eq!(changed.len(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&net("10.1.1.1/32"), SourceType::Bgp), Some(&updated));
    }

    #[test]
    fn different_types_coexist() {
        let mut store = PrefixStore::new();
        store.advertise([
            make_entry("10.1.1.1/32", SourceType::Bgp),
            make_entry("10.1.1.1/32", SourceType::Default),
        ]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.entries_for(&net("10.1.1.1/32")).count(), 2);
    }

    #[test]
    fn withdraw_round_trip() {
        let mut store = PrefixStore::new();
        let x = make_entry("10.1.1.1/32", SourceType::Default);
        store.advertise([x.clone()]);
        assert_eq!(store.withdraw(SourceType::Default, [x.prefix]).len(), 1);
        assert!(store.is_empty());
        assert!(!store.contains_prefix(&x.prefix));
        assert!(store.get_all().is_empty());
    }

    #[test]
    fn withdraw_absent_is_not_a_change() {
        let mut store = PrefixStore::new();
        store.advertise([make_entry("10.1.1.1/32", SourceType::Default)]);
        assert!(store.withdraw(SourceType::Bgp, [net("10.1.1.1/32")]).is_empty());
        assert!(store.withdraw(SourceType::Default, [net("10.9.9.9/32")]).is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn withdraw_by_type_twice() {
        let mut store = PrefixStore::new();
        store.advertise([
            make_entry("10.1.1.1/32", SourceType::Default),
            make_entry("10.2.2.2/32", SourceType::Default),
            make_entry("10.2.2.2/32", SourceType::Bgp),
        ]);
        assert_eq!(store.withdraw_by_type(SourceType::Default).len(), 2);
        assert!(store.withdraw_by_type(SourceType::Default).is_empty());
        assert_eq!(store.get_all().len(), 1);
    }

    #[test]
    fn sync_by_type_reconciles() {
        let mut store = PrefixStore::new();
        let a = make_entry("10.0.0.1/32", SourceType::Bgp);
        let b = make_entry("10.0.0.2/32", SourceType::Bgp);
        let c = make_entry("10.0.0.3/32", SourceType::Bgp);
        let other = make_entry("10.0.0.1/32", SourceType::Vip);
        store.advertise([a.clone(), b.clone(), other.clone()]);

        let changed = store.sync_by_type(SourceType::Bgp, [b.clone(), c.clone()]);
        assert_eq!(changed, BTreeSet::from([a.prefix, c.prefix]));
        assert_eq!(store.get_by_type(SourceType::Bgp), vec![b.clone(), c.clone()]);
        // other types untouched
        assert_eq!(store.get_by_type(SourceType::Vip), vec![other]);

        // same set again is a no-op
        assert!(store.sync_by_type(SourceType::Bgp, [b, c]).is_empty());
    }

    #[test]
    fn sync_by_type_empty_withdraws_all_of_type() {
        let mut store = PrefixStore::new();
        store.advertise([make_entry("10.0.0.1/32", SourceType::Bgp)]);
        assert_eq!(store.sync_by_type(SourceType::Bgp, []).len(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn snapshots_are_copies() {
        let mut store = PrefixStore::new();
        store.advertise([make_entry("10.1.1.1/32", SourceType::Default)]);
        let snapshot = store.get_all();
        store.withdraw_by_type(SourceType::Default);
        assert_eq!(snapshot.len(), 1);
        assert!(store.get_all().is_empty());
    }

    #[test]
    fn prefixes_with_labels() {
        let mut store = PrefixStore::new();
        store.advertise([
            make_entry("10.0.0.1/32", SourceType::Bgp).with_label(65001),
            make_entry("10.0.0.2/32", SourceType::Bgp).with_label(65002),
            make_entry("10.0.0.3/32", SourceType::Bgp),
        ]);
        let hit = store.prefixes_with_labels(&BTreeSet::from([Label(65001)]));
        assert_eq!(hit, BTreeSet::from([net("10.0.0.1/32")]));
        assert!(store.prefixes_with_labels(&BTreeSet::new()).is_empty());
    }
}
