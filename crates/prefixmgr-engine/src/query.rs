//! Read-only views returned by the query API.

use std::collections::BTreeSet;

use ipnet::IpNet;
use prefixmgr_core::{PrefixEntry, SourceType};

use crate::origination::OriginatedPrefix;

/// Narrow a route query by prefix and/or source type.
///
/// `prefixes: Some(vec![])` matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvertisedRouteFilter {
    pub prefixes: Option<Vec<IpNet>>,
    pub source_type: Option<SourceType>,
}

impl AdvertisedRouteFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_prefixes(prefixes: impl IntoIterator<Item = IpNet>) -> Self {
        Self {
            prefixes: Some(prefixes.into_iter().collect()),
            source_type: None,
        }
    }

    pub fn with_type(mut self, source_type: SourceType) -> Self {
        self.source_type = Some(source_type);
        self
    }

    #[must_use]
    pub fn matches_prefix(&self, prefix: &IpNet) -> bool {
        self.prefixes.as_ref().is_none_or(|p| p.contains(prefix))
    }

    #[must_use]
    pub fn matches_type(&self, source_type: SourceType) -> bool {
        self.source_type.is_none_or(|t| t == source_type)
    }
}

/// Per-prefix view of every stored source and the winner among them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedRouteDetail {
    pub prefix: IpNet,
    pub best_type: SourceType,
    pub best_types: BTreeSet<SourceType>,
    /// Stored entries, narrowed by the filter's source type.
    pub routes: Vec<PrefixEntry>,
}

/// Which side of the FIB-ack gate an area query looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteStage {
    /// Best candidate before gating.
    PreFilterAdvertised,
    /// What is currently published in the area.
    PostFilterAdvertised,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginatedRouteView {
    pub config: OriginatedPrefix,
    pub supporting_prefixes: Vec<IpNet>,
    pub installed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    #[test]
    fn default_filter_matches_everything() {
        let f = AdvertisedRouteFilter::all();
        assert!(f.matches_prefix(&net("10.0.0.0/8")));
        assert!(f.matches_type(SourceType::Vip));
    }

    #[test]
    fn empty_prefix_list_matches_nothing() {
        let f = AdvertisedRouteFilter::for_prefixes([]);
        assert!(!f.matches_prefix(&net("10.0.0.0/8")));
    }

    #[test]
    fn type_filter() {
        let f = AdvertisedRouteFilter::for_prefixes([net("10.0.0.0/8")]).with_type(SourceType::Bgp);
        assert!(f.matches_prefix(&net("10.0.0.0/8")));
        assert!(f.matches_type(SourceType::Bgp));
        assert!(!f.matches_type(SourceType::Default));
    }
}
