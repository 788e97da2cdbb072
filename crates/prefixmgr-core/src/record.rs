//! The unit stored in the flooding store under a prefix key.

use serde::{Deserialize, Serialize};

use crate::entry::PrefixEntry;
use crate::error::CoreError;

/// A published advertisement (or tombstone) for one prefix in one area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixRecord {
    pub node_name: String,
    /// Advertised entry. Tombstones keep the last advertised entry here.
    pub entry: Option<PrefixEntry>,
    pub tombstoned: bool,
    pub version: u64,
    pub ttl_ms: u64,
}

impl PrefixRecord {
    pub fn live(node_name: impl Into<String>, entry: PrefixEntry, version: u64, ttl_ms: u64) -> Self {
        Self {
            node_name: node_name.into(),
            entry: Some(entry),
            tombstoned: false,
            version,
            ttl_ms,
        }
    }

    pub fn tombstone(
        node_name: impl Into<String>,
        last_entry: Option<PrefixEntry>,
        version: u64,
        ttl_ms: u64,
    ) -> Self {
        Self {
            node_name: node_name.into(),
            entry: last_entry,
            tombstoned: true,
            version,
            ttl_ms,
        }
    }

    /// The advertised entry, if this record is live.
    #[must_use]
    pub fn live_entry(&self) -> Option<&PrefixEntry> {
        if self.tombstoned {
            None
        } else {
            self.entry.as_ref()
        }
    }

    /// Compare advertised content, ignoring version and ttl.
    #[must_use]
    pub fn same_content(&self, other: &PrefixRecord) -> bool {
        self.node_name == other.node_name
            && self.tombstoned == other.tombstoned
            && self.entry == other.entry
    }

    /// Serialize to the binary payload stored in the flooding store.
    pub fn encode(&self) -> Result<Vec<u8>, CoreError> {
        postcard::to_allocvec(self).map_err(|e| CoreError::Encode(e.to_string()))
    }

    /// Deserialize a payload read from the flooding store.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        postcard::from_bytes(bytes).map_err(|e| CoreError::Decode(e.to_string()))
    }
}
