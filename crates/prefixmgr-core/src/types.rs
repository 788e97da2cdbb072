//! Identifiers and the source-type ordering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Routing area identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AreaId(pub String);

impl AreaId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AreaId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// MPLS label a prefix may be published with. Zero means "no label".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Origin of a prefix entry. The discriminant is the default tie-break rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum SourceType {
    Loopback = 1,
    Default = 2,
    Bgp = 3,
    PrefixAllocator = 4,
    Breeze = 5,
    Rib = 6,
    SloPrefixAllocator = 7,
    Config = 8,
    Vip = 9,
}

/// Canonical source type names.
pub mod type_str {
    pub const LOOPBACK: &str = "LOOPBACK";
    pub const DEFAULT: &str = "DEFAULT";
    pub const BGP: &str = "BGP";
    pub const PREFIX_ALLOCATOR: &str = "PREFIX_ALLOCATOR";
    pub const BREEZE: &str = "BREEZE";
    pub const RIB: &str = "RIB";
    pub const SLO_PREFIX_ALLOCATOR: &str = "SLO_PREFIX_ALLOCATOR";
    pub const CONFIG: &str = "CONFIG";
    pub const VIP: &str = "VIP";
}

impl SourceType {
    pub const ALL: [SourceType; 9] = [
        SourceType::Loopback,
        SourceType::Default,
        SourceType::Bgp,
        SourceType::PrefixAllocator,
        SourceType::Breeze,
        SourceType::Rib,
        SourceType::SloPrefixAllocator,
        SourceType::Config,
        SourceType::Vip,
    ];

    /// Convert from raw ordinal value.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(SourceType::Loopback),
            2 => Some(SourceType::Default),
            3 => Some(SourceType::Bgp),
            4 => Some(SourceType::PrefixAllocator),
            5 => Some(SourceType::Breeze),
            6 => Some(SourceType::Rib),
            7 => Some(SourceType::SloPrefixAllocator),
            8 => Some(SourceType::Config),
            9 => Some(SourceType::Vip),
            _ => None,
        }
    }

    #[must_use]
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Loopback => type_str::LOOPBACK,
            SourceType::Default => type_str::DEFAULT,
            SourceType::Bgp => type_str::BGP,
            SourceType::PrefixAllocator => type_str::PREFIX_ALLOCATOR,
            SourceType::Breeze => type_str::BREEZE,
            SourceType::Rib => type_str::RIB,
            SourceType::SloPrefixAllocator => type_str::SLO_PREFIX_ALLOCATOR,
            SourceType::Config => type_str::CONFIG,
            SourceType::Vip => type_str::VIP,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        SourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| CoreError::UnknownSourceType(s.to_string()))
    }
}

/// Total order over source types used as the last tie-breaker.
///
/// The default rank is the enum ordinal. One pair of types may be swapped,
/// which is how locally originated (CONFIG) routes are preferred over BGP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeOrder {
    swap: Option<(SourceType, SourceType)>,
}

impl TypeOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Order with the ranks of `a` and `b` exchanged.
    pub fn with_swap(a: SourceType, b: SourceType) -> Self {
        Self { swap: Some((a, b)) }
    }

    /// Order used when originated routes should beat BGP routes.
    pub fn prefer_originated(enabled: bool) -> Self {
        if enabled {
            Self::with_swap(SourceType::Bgp, SourceType::Config)
        } else {
            Self::default()
        }
    }

    /// Rank of a source type; smaller wins.
    #[must_use]
    pub fn rank(&self, t: SourceType) -> u8 {
        match self.swap {
            Some((a, b)) if t == a => b.ordinal(),
            Some((a, b)) if t == b => a.ordinal(),
            _ => t.ordinal(),
        }
    }
}
