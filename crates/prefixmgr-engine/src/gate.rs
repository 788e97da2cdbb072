//! FIB-ack gate: label-carrying entries wait until their label is programmed.

use std::collections::BTreeSet;

use prefixmgr_core::{Label, PrefixEntry, RibUpdate};

/// Tracks which labels the forwarding plane has confirmed.
///
/// There is no timeout. An entry whose label never gets programmed is never
/// eligible.
#[derive(Debug, Default)]
pub struct FibAckGate {
    enabled: bool,
    programmed: BTreeSet<Label>,
}

impl FibAckGate {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            programmed: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn is_programmed(&self, label: Label) -> bool {
        self.programmed.contains(&label)
    }

    /// Whether an entry may be offered to best-path selection.
    #[must_use]
    pub fn is_eligible(&self, entry: &PrefixEntry) -> bool {
        if !self.enabled {
            return true;
        }
        entry.label().is_none_or(|l| self.programmed.contains(&l))
    }

    /// Replace the programmed set. Returns labels that were gained or lost.
    pub fn full_sync(&mut self, labels: impl IntoIterator<Item = Label>) -> BTreeSet<Label> {
        let next: BTreeSet<Label> = labels.into_iter().collect();
        let changed = self
            .programmed
            .symmetric_difference(&next)
            .copied()
            .collect();
        self.programmed = next;
        changed
    }

    /// Mark labels programmed. Returns the ones that were not already.
    pub fn add(&mut self, labels: impl IntoIterator<Item = Label>) -> BTreeSet<Label> {
        labels
            .into_iter()
            .filter(|l| self.programmed.insert(*l))
            .collect()
    }

    /// Mark labels withdrawn. Returns the ones that were programmed.
    pub fn remove(&mut self, labels: impl IntoIterator<Item = Label>) -> BTreeSet<Label> {
        labels
            .into_iter()
            .filter(|l| self.programmed.remove(l))
            .collect()
    }

    /// Apply the label part of a RIB update.
    ///
    /// A full sync replaces the set with `label_upserts`; otherwise deletes
    /// are applied before upserts. Returns labels whose state changed, or an
    /// empty set when gating is disabled.
    pub fn apply(&mut self, update: &RibUpdate) -> BTreeSet<Label> {
        let changed = if update.is_full_sync() {
            self.full_sync(update.label_upserts.iter().copied())
        } else {
            let mut changed = self.remove(update.label_deletes.iter().copied());
            for label in self.add(update.label_upserts.iter().copied()) {
                // removed then re-added in one batch: net no change
                if !changed.remove(&label) {
                    changed.insert(label);
                }
            }
            changed
        };

        if self.enabled {
            changed
        } else {
            BTreeSet::new()
        }
    }

    pub fn programmed(&self) -> impl Iterator<Item = &Label> {
        self.programmed.iter()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use prefixmgr_core::SourceType;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn never_admits_unprogrammed_label(
            ops in prop::collection::vec((any::<bool>(), 1..6u32), 0..32),
            probe in 1..6u32,
        ) {
            let mut gate = FibAckGate::new(true);
            for (add, label) in ops {
                if add {
                    gate.add([Label(label)]);
                } else {
                    gate.remove([Label(label)]);
                }
            }
            let entry = PrefixEntry::new("10.0.0.0/8".parse().unwrap(), SourceType::Bgp)
                .with_label(probe);
            prop_assert_eq!(gate.is_eligible(&entry), gate.is_programmed(Label(probe)));
        }
    }
}
