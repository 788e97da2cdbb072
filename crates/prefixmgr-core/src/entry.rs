//! Prefix entries as advertised by a single source.

use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{AreaId, Label, SourceType};

pub const DEFAULT_PATH_PREFERENCE: i32 = 1000;
pub const DEFAULT_SOURCE_PREFERENCE: i32 = 100;

/// Metrics compared by best-path selection, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Metrics {
    /// Higher wins.
    pub path_preference: i32,
    /// Higher wins.
    pub source_preference: i32,
    /// Lower wins.
    pub distance: i32,
}

impl Metrics {
    pub fn new(path_preference: i32, source_preference: i32, distance: i32) -> Self {
        Self {
            path_preference,
            source_preference,
            distance,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new(DEFAULT_PATH_PREFERENCE, DEFAULT_SOURCE_PREFERENCE, 0)
    }
}

/// A nexthop, optionally tagged with the area it was learned in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NextHop {
    pub address: IpAddr,
    pub ifname: Option<String>,
    pub area: Option<AreaId>,
}

impl NextHop {
    pub fn new(address: IpAddr) -> Self {
        Self {
            address,
            ifname: None,
            area: None,
        }
    }

    pub fn in_area(address: IpAddr, area: AreaId) -> Self {
        Self {
            address,
            ifname: None,
            area: Some(area),
        }
    }

    pub fn with_ifname(mut self, ifname: impl Into<String>) -> Self {
        self.ifname = Some(ifname.into());
        self
    }
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)?;
        if let Some(ifname) = &self.ifname {
            write!(f, "@{ifname}")?;
        }
        if let Some(area) = &self.area {
            write!(f, " [{area}]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ForwardingAlgorithm {
    #[default]
    SpEcmp,
    Ksp2EdEcmp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ForwardingType {
    #[default]
    Ip,
    SrMpls,
}

/// One source's view of how a prefix should be advertised.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrefixEntry {
    pub prefix: IpNet,
    pub source_type: SourceType,
    pub metrics: Metrics,
    pub nexthops: BTreeSet<NextHop>,
    pub forwarding_algorithm: ForwardingAlgorithm,
    pub forwarding_type: ForwardingType,
    pub min_nexthop: Option<u64>,
    pub prepend_label: Option<u32>,
    /// Areas this entry has been redistributed through, oldest first.
    pub area_stack: Vec<AreaId>,
}

impl PrefixEntry {
    /// Entry with default metrics and no nexthops, label or area history.
    pub fn new(prefix: IpNet, source_type: SourceType) -> Self {
        Self {
            prefix,
            source_type,
            metrics: Metrics::default(),
            nexthops: BTreeSet::new(),
            forwarding_algorithm: ForwardingAlgorithm::default(),
            forwarding_type: ForwardingType::default(),
            min_nexthop: None,
            prepend_label: None,
            area_stack: Vec::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_label(mut self, label: u32) -> Self {
        self.prepend_label = Some(label);
        self
    }

    pub fn with_nexthops(mut self, nexthops: impl IntoIterator<Item = NextHop>) -> Self {
        self.nexthops = nexthops.into_iter().collect();
        self
    }

    pub fn with_area_stack(mut self, areas: impl IntoIterator<Item = AreaId>) -> Self {
        self.area_stack = areas.into_iter().collect();
        self
    }

    /// The label this entry must wait for, if any. A zero label counts as none.
    #[must_use]
    pub fn label(&self) -> Option<Label> {
        self.prepend_label.filter(|l| *l != 0).map(Label)
    }

    /// Check that the entry belongs to the source type it is submitted under.
    pub fn validate_for(&self, expected: SourceType) -> Result<(), CoreError> {
        if self.source_type != expected {
            return Err(CoreError::SourceTypeMismatch {
                prefix: self.prefix.to_string(),
                expected,
                actual: self.source_type,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    #[test]
    fn new_entry_defaults() {
        let entry = PrefixEntry::new(net("10.1.1.1/32"), SourceType::Default);
        assert_eq!(entry.metrics.path_preference, DEFAULT_PATH_PREFERENCE);
        assert_eq!(entry.metrics.source_preference, DEFAULT_SOURCE_PREFERENCE);
        assert_eq!(entry.metrics.distance, 0);
        assert!(entry.nexthops.is_empty());
        assert!(entry.area_stack.is_empty());
        assert_eq!(entry.label(), None);
    }

    #[test]
    fn zero_label_is_no_label() {
        let entry = PrefixEntry::new(net("10.1.1.1/32"), SourceType::Bgp).with_label(0);
        assert_eq!(entry.label(), None);

        let entry = entry.with_label(65001);
        assert_eq!(entry.label(), Some(Label(65001)));
    }

    #[test]
    fn validate_for_rejects_other_type() {
        let entry = PrefixEntry::new(net("10.1.1.1/32"), SourceType::Bgp);
        assert!(entry.validate_for(SourceType::Bgp).is_ok());
        assert!(matches!(
            entry.validate_for(SourceType::Vip),
            Err(CoreError::SourceTypeMismatch { .. })
        ));
    }

    #[test]
    fn nexthop_display() {
        let nh = NextHop::in_area("fe80::1".parse().unwrap(), AreaId::from("a"))
            .with_ifname("eth0");
        assert_eq!(nh.to_string(), "fe80::1@eth0 [a]");
        assert_eq!(NextHop::new("10.0.0.1".parse().unwrap()).to_string(), "10.0.0.1");
    }

    #[test]
    fn nexthop_set_deduplicates() {
        let nh = NextHop::new("10.0.0.1".parse().unwrap());
        let entry = PrefixEntry::new(net("10.0.0.0/24"), SourceType::Rib)
            .with_nexthops([nh.clone(), nh]);
        assert_eq!(entry.nexthops.len(), 1);
    }
}
