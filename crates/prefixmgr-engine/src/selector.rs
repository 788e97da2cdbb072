//! Best-path selection among competing entries for one prefix.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use prefixmgr_core::{PrefixEntry, SourceType, TypeOrder};

/// Result of selecting among the candidates for one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub best_type: SourceType,
    pub best_entry: PrefixEntry,
    /// Every source type present among the candidates, winner included.
    /// Introspection only; exactly one entry is ever published.
    pub tied_types: BTreeSet<SourceType>,
}

/// Order two entries; `Ordering::Less` means `a` is preferred.
///
/// Higher path preference, then higher source preference, then lower
/// distance, then lower source-type rank.
#[must_use]
pub fn compare(a: &PrefixEntry, b: &PrefixEntry, order: &TypeOrder) -> Ordering {
    b.metrics
        .path_preference
        .cmp(&a.metrics.path_preference)
        .then_with(|| b.metrics.source_preference.cmp(&a.metrics.source_preference))
        .then_with(|| a.metrics.distance.cmp(&b.metrics.distance))
        .then_with(|| order.rank(a.source_type).cmp(&order.rank(b.source_type)))
}

/// Pick the best entry. Returns `None` when there are no candidates.
///
/// Among fully equal candidates the first one wins, so callers iterating a
/// stable collection always get the same answer.
pub fn select_best<'a>(
    candidates: impl IntoIterator<Item = &'a PrefixEntry>,
    order: &TypeOrder,
) -> Option<Selection> {
    let mut best: Option<&PrefixEntry> = None;
    let mut tied_types = BTreeSet::new();

    for candidate in candidates {
        tied_types.insert(candidate.source_type);
        best = match best {
            Some(current) if compare(candidate, current, order) != Ordering::Less => Some(current),
            _ => Some(candidate),
        };
    }

    best.map(|entry| Selection {
        best_type: entry.source_type,
        best_entry: entry.clone(),
        tied_types,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use prefixmgr_core::Metrics;

    fn make_entry(t: SourceType, pp: i32, sp: i32, d: i32) -> PrefixEntry {
        PrefixEntry::new("10.1.1.1/32".parse().unwrap(), t).with_metrics(Metrics::new(pp, sp, d))
    }

    #[test]
    fn no_candidates() {
        assert!(select_best([], &TypeOrder::new()).is_none());
    }

    #[test]
    fn path_preference_wins_first() {
        let bgp = make_entry(SourceType::Bgp, 200, 0, 10);
        let def = make_entry(SourceType::Default, 100, 500, 0);
        let sel = select_best([&def, &bgp], &TypeOrder::new()).unwrap();
        assert_eq!(sel.best_type, SourceType::Bgp);
        assert_eq!(sel.tied_types, BTreeSet::from([SourceType::Bgp, SourceType::Default]));
    }

    #[test]
    fn source_preference_breaks_path_tie() {
        let a = make_entry(SourceType::Vip, 100, 200, 10);
        let b = make_entry(SourceType::Loopback, 100, 100, 0);
        let sel = select_best([&b, &a], &TypeOrder::new()).unwrap();
        assert_eq!(sel.best_type, SourceType::Vip);
    }

    #[test]
    fn lower_distance_breaks_source_tie() {
        let a = make_entry(SourceType::Vip, 100, 100, 1);
        let b = make_entry(SourceType::Loopback, 100, 100, 2);
        let sel = select_best([&b, &a], &TypeOrder::new()).unwrap();
        assert_eq!(sel.best_type, SourceType::Vip);
    }

    #[test]
    fn type_rank_is_last_resort() {
        let bgp = make_entry(SourceType::Bgp, 200, 100, 0);
        let lo = make_entry(SourceType::Loopback, 200, 100, 0);
        let def = make_entry(SourceType::Default, 100, 100, 0);

        let sel = select_best([&bgp, &def], &TypeOrder::new()).unwrap();
        assert_eq!(sel.best_type, SourceType::Bgp);

        let sel = select_best([&bgp, &def, &lo], &TypeOrder::new()).unwrap();
        assert_eq!(sel.best_type, SourceType::Loopback);

        // withdraw loopback: back to BGP
        let sel = select_best([&bgp, &def], &TypeOrder::new()).unwrap();
        assert_eq!(sel.best_type, SourceType::Bgp);
    }

    #[test]
    fn swap_knob_prefers_config_over_bgp() {
        let bgp = make_entry(SourceType::Bgp, 100, 100, 0);
        let cfg = make_entry(SourceType::Config, 100, 100, 0);

        let sel = select_best([&cfg, &bgp], &TypeOrder::new()).unwrap();
        assert_eq!(sel.best_type, SourceType::Bgp);

        let sel = select_best([&bgp, &cfg], &TypeOrder::prefer_originated(true)).unwrap();
        assert_eq!(sel.best_type, SourceType::Config);
    }

    #[test]
    fn identical_candidates_keep_first() {
        let a = make_entry(SourceType::Rib, 100, 100, 0);
        let mut b = a.clone();
        b.area_stack.push("x".into());
        let sel = select_best([&a, &b], &TypeOrder::new()).unwrap();
        assert_eq!(sel.best_entry, a);
        let sel = select_best([&b, &a], &TypeOrder::new()).unwrap();
        assert_eq!(sel.best_entry, b);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use prefixmgr_core::Metrics;
    use proptest::prelude::*;

    fn arb_entry() -> impl Strategy<Value = PrefixEntry> {
        (1..=9u8, 0..4i32, 0..4i32, 0..4i32).prop_map(|(t, pp, sp, d)| {
            let t = SourceType::from_u8(t).unwrap();
            PrefixEntry::new("10.0.0.0/8".parse().unwrap(), t).with_metrics(Metrics::new(pp, sp, d))
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn selection_is_deterministic_and_minimal(
            entries in prop::collection::vec(arb_entry(), 1..8),
            swap in any::<bool>(),
        ) {
            let order = TypeOrder::prefer_originated(swap);
            let first = select_best(&entries, &order).unwrap();
            let second = select_best(&entries, &order).unwrap();
            prop_assert_eq!(&first, &second);

            for e in &entries {
                prop_assert_ne!(compare(e, &first.best_entry, &order), Ordering::Less);
            }
        }
    }
}
