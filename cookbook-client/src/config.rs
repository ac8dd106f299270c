use std::{collections::HashMap, fs, path::Path, time::Duration};

use cookbook_common::{
    amm::{AmmError, DialectRegistry, PoolDialect, PoolIdentity},
    fees::{FeeConfig, FeeError, NetworkFees},
    models::NetworkName,
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Fees(#[from] FeeError),
    #[error(transparent)]
    Registry(#[from] AmmError),
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RetryConfiguration {
    Constant(ConstantRetryConfiguration),
}

impl RetryConfiguration {
    pub fn constant(max_attempts: u64, cooldown: Duration) -> Self {
        RetryConfiguration::Constant(ConstantRetryConfiguration { max_attempts, cooldown })
    }
}

impl Default for RetryConfiguration {
    fn default() -> Self {
        RetryConfiguration::constant(3, Duration::from_millis(500))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ConstantRetryConfiguration {
    max_attempts: u64,
    #[serde(with = "duration_millis", rename = "cooldown_ms")]
    cooldown: Duration,
}

impl ConstantRetryConfiguration {
    pub fn max_attempts(&self) -> u64 {
        self.max_attempts
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// One indexed subgraph serving the pairs of a dialect on a network.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SubgraphSource {
    pub dialect: PoolDialect,
    pub network: NetworkName,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
struct RegistryOverride {
    dialect: PoolDialect,
    network: NetworkName,
    #[serde(flatten)]
    identity: PoolIdentity,
}

/// Planner settings as read from YAML.
#[derive(Clone, Debug, Deserialize)]
pub struct PlannerConfig {
    fees: HashMap<NetworkName, NetworkFees>,
    pub rpc_url: String,
    #[serde(default)]
    pub subgraphs: Vec<SubgraphSource>,
    #[serde(default)]
    pub retry: RetryConfiguration,
    #[serde(default)]
    registry_overrides: Vec<RegistryOverride>,
}

impl PlannerConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn fee_config(&self) -> Result<FeeConfig, ConfigError> {
        Ok(FeeConfig::new(self.fees.clone())?)
    }

    /// The built-in deployments with any configured overrides applied.
    pub fn registry(&self) -> Result<DialectRegistry, ConfigError> {
        let overrides = self
            .registry_overrides
            .iter()
            .map(|o| ((o.dialect, o.network), o.identity));
        Ok(DialectRegistry::default().with_overrides(overrides)?)
    }

    /// Subgraph urls configured for `dialect` on `network`, in file order.
    pub fn subgraph_urls(&self, dialect: PoolDialect, network: NetworkName) -> Vec<String> {
        self.subgraphs
            .iter()
            .filter(|s| s.dialect == dialect && s.network == network)
            .map(|s| s.url.clone())
            .collect()
    }
}
