//! Flooding-store keys for advertised prefixes.
//!
//! Two textual encodings exist and must both be decodable:
//!
//! - legacy: `prefix:<node>:<area>:[<cidr>]`
//! - v2: `prefix:<node>:[<cidr>]`, where the area is the one the key is stored in
//!
//! Which encoding is written is a configuration choice, never inferred from
//! what is already in the store.

use std::fmt;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::AreaId;

/// Leading marker shared by every prefix key.
pub const PREFIX_KEY_MARKER: &str = "prefix:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFormat {
    Legacy,
    #[default]
    V2,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrefixKey {
    pub node: String,
    pub area: AreaId,
    pub prefix: IpNet,
}

impl PrefixKey {
    pub fn new(node: impl Into<String>, area: AreaId, prefix: IpNet) -> Self {
        Self {
            node: node.into(),
            area,
            prefix,
        }
    }

    /// Render the key in the requested format.
    #[must_use]
    pub fn encode(&self, format: KeyFormat) -> String {
        match format {
            KeyFormat::Legacy => format!(
                "{PREFIX_KEY_MARKER}{}:{}:[{}]",
                self.node, self.area, self.prefix
            ),
            KeyFormat::V2 => format!("{PREFIX_KEY_MARKER}{}:[{}]", self.node, self.prefix),
        }
    }

    /// Decode a key in either format. `store_area` is the area the key was
    /// read from and supplies the area for v2 keys.
    pub fn parse(key: &str, store_area: &AreaId) -> Result<Self, CoreError> {
        let invalid = || CoreError::InvalidKey(key.to_string());

        let rest = key.strip_prefix(PREFIX_KEY_MARKER).ok_or_else(invalid)?;
        let open = rest.find(":[").ok_or_else(invalid)?;
        let head = &rest[..open];
        let cidr = rest[open + 2..].strip_suffix(']').ok_or_else(invalid)?;

        let prefix: IpNet = cidr
            .parse()
            .map_err(|_| CoreError::InvalidPrefix(cidr.to_string()))?;

        let (node, area) = match head.split_once(':') {
            Some((node, area)) => (node, AreaId::from(area)),
            None => (head, store_area.clone()),
        };
        if node.is_empty() || area.as_str().is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(node, area, prefix))
    }

    /// Whether a raw key looks like a prefix key at all.
    #[must_use]
    pub fn is_prefix_key(key: &str) -> bool {
        key.starts_with(PREFIX_KEY_MARKER)
    }
}

impl fmt::Display for PrefixKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode(KeyFormat::Legacy))
    }
}
