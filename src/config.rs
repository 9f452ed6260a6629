use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardingConfig {
    pub enabled: bool,
    /// Orderable bindings above which a graph is split into shards
    pub keys_per_shard: usize,
    /// Shards smaller than this are merged into a neighbour
    pub rebalance_target: usize,
}

impl Default for ShardingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keys_per_shard: 2000,
            rebalance_target: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub report_unused: bool,
    pub warnings_as_errors: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            report_unused: true,
            warnings_as_errors: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Resolve independent sibling graphs on worker threads
    pub parallel: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub sharding: ShardingConfig,
    pub diagnostics: DiagnosticsConfig,
    pub resolution: ResolutionConfig,
}

impl ResolverConfig {
    pub fn from_toml(text: &str) -> crate::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn with_shard_size(mut self, keys_per_shard: usize, rebalance_target: usize) -> Self {
        self.sharding.keys_per_shard = keys_per_shard;
        self.sharding.rebalance_target = rebalance_target;
        self
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("graphwire.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<ResolverConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    Ok(Some(ResolverConfig::from_toml(&contents)?))
}

pub fn write_config(path: &Path, config: &ResolverConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}
