//! TOML-based configuration for the prefix manager.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use prefixmgr_core::{AreaId, KeyFormat, TypeOrder};
use prefixmgr_engine::{EngineConfig, OriginatedPrefix};

use crate::error::NodeError;

/// Top-level node configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub logging: LoggingSection,
    /// `[[originated_prefixes]]` aggregates.
    #[serde(default)]
    pub originated_prefixes: Vec<OriginatedPrefix>,
}

impl NodeConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, NodeError> {
        let config: Self =
            toml::from_str(s).map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), NodeError> {
        if self.node.node_name.is_empty() {
            return Err(NodeError::Config("node_name must not be empty".into()));
        }
        if self.node.areas.is_empty() {
            return Err(NodeError::Config("at least one area is required".into()));
        }
        let mut areas = BTreeSet::new();
        for area in &self.node.areas {
            if !areas.insert(area) {
                return Err(NodeError::Config(format!("duplicate area '{area}'")));
            }
        }
        if self.node.record_ttl_ms == 0 {
            return Err(NodeError::Config("record_ttl_ms must be positive".into()));
        }
        if self.node.ttl_refresh_ms == Some(0) {
            return Err(NodeError::Config("ttl_refresh_ms must be positive".into()));
        }
        let mut aggregates = BTreeSet::new();
        for originated in &self.originated_prefixes {
            if !aggregates.insert(originated.prefix) {
                return Err(NodeError::Config(format!(
                    "duplicate originated prefix {}",
                    originated.prefix
                )));
            }
        }
        Ok(())
    }

    /// Engine settings derived from this config.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new(
            self.node.node_name.clone(),
            self.node.areas.iter().map(|a| AreaId::new(a.as_str())),
        );
        config.key_format = self.node.key_format;
        config.record_ttl_ms = self.node.record_ttl_ms;
        config.enable_fib_ack = self.node.enable_fib_ack;
        config.type_order = TypeOrder::prefer_originated(self.node.prefer_originated_routes);
        config.v4_over_v6_nexthop = self.node.v4_over_v6_nexthop;
        config.wait_for_initial_sync = self.node.wait_for_initial_sync;
        config.originated_prefixes = self.originated_prefixes.clone();
        config
    }

    /// Debounce window for coalescing changes into one flush.
    #[must_use]
    pub fn sync_throttle(&self) -> Duration {
        Duration::from_millis(self.node.sync_throttle_ms)
    }

    /// Interval between TTL refreshes of live records. Defaults to a quarter
    /// of the record TTL.
    #[must_use]
    pub fn ttl_refresh(&self) -> Duration {
        let ms = self
            .node
            .ttl_refresh_ms
            .unwrap_or(self.node.record_ttl_ms / 4)
            .max(1);
        Duration::from_millis(ms)
    }
}

/// The `[node]` section.
#[derive(Debug, Deserialize)]
pub struct NodeSection {
    #[serde(default = "default_node_name")]
    pub node_name: String,
    #[serde(default = "default_areas")]
    pub areas: Vec<String>,
    #[serde(default)]
    pub key_format: KeyFormat,
    /// TTL stamped on every published record. Default: 300000.
    #[serde(default = "default_record_ttl_ms")]
    pub record_ttl_ms: u64,
    /// Unset means a quarter of `record_ttl_ms`.
    pub ttl_refresh_ms: Option<u64>,
    #[serde(default = "default_sync_throttle_ms")]
    pub sync_throttle_ms: u64,
    #[serde(default)]
    pub enable_fib_ack: bool,
    /// Let CONFIG outrank BGP on a full metric tie.
    #[serde(default)]
    pub prefer_originated_routes: bool,
    #[serde(default)]
    pub v4_over_v6_nexthop: bool,
    #[serde(default)]
    pub wait_for_initial_sync: bool,
}

fn default_node_name() -> String {
    "localhost".to_string()
}

fn default_areas() -> Vec<String> {
    vec!["0".to_string()]
}

fn default_record_ttl_ms() -> u64 {
    prefixmgr_engine::engine::DEFAULT_RECORD_TTL_MS
}

fn default_sync_throttle_ms() -> u64 {
    250
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            areas: default_areas(),
            key_format: KeyFormat::default(),
            record_ttl_ms: default_record_ttl_ms(),
            ttl_refresh_ms: None,
            sync_throttle_ms: default_sync_throttle_ms(),
            enable_fib_ack: false,
            prefer_originated_routes: false,
            v4_over_v6_nexthop: false,
            wait_for_initial_sync: false,
        }
    }
}

/// The `[logging]` section.
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prefixmgr_core::SourceType;

    #[test]
    fn parse_minimal_config() {
        let config = NodeConfig::parse("").unwrap();
        assert_eq!(config.node.node_name, "localhost");
        assert_eq!(config.node.areas, vec!["0"]);
        assert_eq!(config.node.key_format, KeyFormat::V2);
        assert_eq!(config.node.record_ttl_ms, 300_000);
        assert_eq!(config.logging.level, "info");
        assert!(config.originated_prefixes.is_empty());
        assert_eq!(config.sync_throttle(), Duration::from_millis(250));
        assert_eq!(config.ttl_refresh(), Duration::from_millis(75_000));
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[node]
node_name = "rsw001"
areas = ["spine", "plane"]
key_format = "legacy"
record_ttl_ms = 60000
ttl_refresh_ms = 5000
sync_throttle_ms = 100
enable_fib_ack = true
prefer_originated_routes = true
v4_over_v6_nexthop = true
wait_for_initial_sync = true

[logging]
level = "debug"

[[originated_prefixes]]
prefix = "10.0.0.0/8"
minimum_supporting_routes = 2
install_to_fib = true

[[originated_prefixes]]
prefix = "fc00::/7"
path_preference = 500
source_preference = 50
"#;
        let config = NodeConfig::parse(toml).unwrap();
        assert_eq!(config.node.node_name, "rsw001");
        assert_eq!(config.node.areas.len(), 2);
        assert_eq!(config.node.key_format, KeyFormat::Legacy);
        assert_eq!(config.ttl_refresh(), Duration::from_millis(5000));
        assert_eq!(config.sync_throttle(), Duration::from_millis(100));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.originated_prefixes.len(), 2);
        assert_eq!(config.originated_prefixes[0].minimum_supporting_routes, 2);
        assert!(config.originated_prefixes[0].install_to_fib);
        assert_eq!(config.originated_prefixes[0].path_preference, 1000);
        assert_eq!(config.originated_prefixes[1].path_preference, 500);
        assert!(!config.originated_prefixes[1].install_to_fib);

        let engine = config.engine_config();
        assert_eq!(engine.node_name, "rsw001");
        assert_eq!(engine.areas, vec![AreaId::from("spine"), AreaId::from("plane")]);
        assert!(engine.enable_fib_ack);
        assert!(engine.wait_for_initial_sync);
        assert!(engine.type_order.rank(SourceType::Config) < engine.type_order.rank(SourceType::Bgp));
    }

    #[test]
    fn parse_malformed_toml() {
        let result = NodeConfig::parse("[node\nnode_name = ");
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[test]
    fn reject_empty_areas() {
        let result = NodeConfig::parse("[node]\nareas = []\n");
        assert!(matches!(result, Err(NodeError::Config(msg)) if msg.contains("area")));
    }

    #[test]
    fn reject_bad_cidr() {
        let result = NodeConfig::parse("[[originated_prefixes]]\nprefix = \"10.0.0.0/33\"\n");
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[test]
    fn reject_duplicate_aggregate() {
        let toml = r#"
[[originated_prefixes]]
prefix = "10.0.0.0/8"

[[originated_prefixes]]
prefix = "10.0.0.0/8"
minimum_supporting_routes = 3
"#;
        let result = NodeConfig::parse(toml);
        assert!(matches!(result, Err(NodeError::Config(msg)) if msg.contains("duplicate")));
    }

    #[test]
    fn reject_zero_ttl() {
        let result = NodeConfig::parse("[node]\nrecord_ttl_ms = 0\n");
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[test]
    fn reject_unknown_key_format() {
        let result = NodeConfig::parse("[node]\nkey_format = \"v3\"\n");
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[test]
    fn load_missing_file() {
        let result = NodeConfig::load(Path::new("/nonexistent/prefixmgr.toml"));
        assert!(matches!(result, Err(NodeError::Io(ref e)) if e.kind() == std::io::ErrorKind::NotFound));
    }
}
