//! Process configuration: TOML file, `RINGKV_`-prefixed environment
//! variables, and CLI flags, layered file < env < CLI. `clap`'s own
//! `env` attribute already resolves CLI-vs-env precedence for scalar
//! fields; loading the file first and overlaying the parsed CLI/env
//! values on top gets the full three-way order.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use ringkv_store::Strategy;

#[derive(Debug, Parser)]
#[command(name = "ringkv-node", about = "RingKV cluster node")]
pub struct Cli {
    /// Path to a TOML config file. Its values are the lowest-precedence
    /// source; CLI flags and environment variables override it.
    #[arg(long, env = "RINGKV_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "RINGKV_NODE_NAME")]
    pub node_name: Option<String>,
    #[arg(long, env = "RINGKV_NODE_ADDR")]
    pub node_addr: Option<String>,
    #[arg(long, env = "RINGKV_NODE_WEIGHT")]
    pub node_weight: Option<u32>,

    #[arg(long, env = "RINGKV_COORDINATION_ENDPOINTS", value_delimiter = ',')]
    pub coordination_endpoints: Option<Vec<String>>,
    #[arg(long, env = "RINGKV_SERVICE_PREFIX")]
    pub service_prefix: Option<String>,
    #[arg(long, env = "RINGKV_LEASE_TTL_SECS")]
    pub lease_ttl_secs: Option<i64>,

    #[arg(long, env = "RINGKV_RING_REPLICAS")]
    pub ring_replicas: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    node: Option<FileNode>,
    coordination: Option<FileCoordination>,
    ring: Option<FileRing>,
    #[serde(default)]
    groups: Vec<FileGroup>,
}

#[derive(Debug, Default, Deserialize)]
struct FileNode {
    name: Option<String>,
    addr: Option<String>,
    weight: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct FileCoordination {
    endpoints: Option<Vec<String>>,
    service_prefix: Option<String>,
    lease_ttl_secs: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileRing {
    replicas: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct FileGroup {
    name: String,
    #[serde(default)]
    strategy: StrategyConfig,
    #[serde(default = "default_main_cache_max_bytes")]
    main_cache_max_bytes: u64,
    #[serde(default = "default_true")]
    hot_cache_enabled: bool,
    #[serde(default = "default_hot_cache_probability")]
    hot_cache_probability: f64,
    default_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StrategyConfig {
    #[default]
    Lru,
    Lfu,
}

impl From<StrategyConfig> for Strategy {
    fn from(value: StrategyConfig) -> Self {
        match value {
            StrategyConfig::Lru => Strategy::Lru,
            StrategyConfig::Lfu => Strategy::Lfu,
        }
    }
}

fn default_main_cache_max_bytes() -> u64 {
    64 * 1024 * 1024
}

fn default_hot_cache_probability() -> f64 {
    0.1
}

fn default_true() -> bool {
    true
}

/// One cache group's fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct GroupDef {
    pub name: String,
    pub strategy: Strategy,
    pub main_cache_max_bytes: u64,
    pub hot_cache_enabled: bool,
    pub hot_cache_probability: f64,
    pub default_ttl_secs: Option<u64>,
}

/// Fully resolved node configuration after layering file < env < CLI.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub node_name: String,
    pub node_addr: String,
    pub node_weight: u32,
    pub coordination_endpoints: Vec<String>,
    pub service_prefix: String,
    pub lease_ttl_secs: i64,
    pub ring_replicas: usize,
    pub groups: Vec<GroupDef>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("required field missing: {0} (set it in the config file, an env var, or a CLI flag)")]
    Missing(&'static str),
}

impl NodeConfig {
    pub fn load(cli: Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                toml::from_str(&text).map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })?
            }
            None => FileConfig::default(),
        };

        let node = file.node.unwrap_or_default();
        let coordination = file.coordination.unwrap_or_default();
        let ring = file.ring.unwrap_or_default();

        let node_name = cli
            .node_name
            .or(node.name)
            .ok_or(ConfigError::Missing("node.name"))?;
        let node_addr = cli
            .node_addr
            .or(node.addr)
            .ok_or(ConfigError::Missing("node.addr"))?;
        let node_weight = cli.node_weight.or(node.weight).unwrap_or(1);

        let coordination_endpoints = cli
            .coordination_endpoints
            .or(coordination.endpoints)
            .ok_or(ConfigError::Missing("coordination.endpoints"))?;
        let service_prefix = cli
            .service_prefix
            .or(coordination.service_prefix)
            .unwrap_or_else(|| "ringkv/nodes/".to_string());
        let lease_ttl_secs = cli.lease_ttl_secs.or(coordination.lease_ttl_secs).unwrap_or(10);

        let ring_replicas = cli
            .ring_replicas
            .or(ring.replicas)
            .unwrap_or(ringkv_ring::DEFAULT_REPLICAS);

        let groups = file
            .groups
            .into_iter()
            .map(|g| GroupDef {
                name: g.name,
                strategy: g.strategy.into(),
                main_cache_max_bytes: g.main_cache_max_bytes,
                hot_cache_enabled: g.hot_cache_enabled,
                hot_cache_probability: g.hot_cache_probability,
                default_ttl_secs: g.default_ttl_secs,
            })
            .collect();

        Ok(NodeConfig {
            node_name,
            node_addr,
            node_weight,
            coordination_endpoints,
            service_prefix,
            lease_ttl_secs,
            ring_replicas,
            groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_cli() -> Cli {
        Cli {
            config: None,
            node_name: None,
            node_addr: None,
            node_weight: None,
            coordination_endpoints: None,
            service_prefix: None,
            lease_ttl_secs: None,
            ring_replicas: None,
        }
    }

    #[test]
    fn cli_flags_override_file_values() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("ringkv-test-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
            [node]
            name = "from-file"
            addr = "127.0.0.1:1"

            [coordination]
            endpoints = ["http://127.0.0.1:2379"]
            "#,
        )
        .unwrap();

        let mut cli = bare_cli();
        cli.config = Some(path.clone());
        cli.node_name = Some("from-cli".to_string());

        let config = NodeConfig::load(cli).unwrap();
        assert_eq!(config.node_name, "from-cli");
        assert_eq!(config.node_addr, "127.0.0.1:1");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let cli = bare_cli();
        let err = NodeConfig::load(cli).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("node.name")));
    }
}
