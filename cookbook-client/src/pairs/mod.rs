//! Pair discovery: bundled snapshots first, live subgraph queries on a miss.
pub mod snapshot;
pub mod subgraph;

use std::collections::HashMap;

use async_trait::async_trait;
use cookbook_common::{
    amm::{PairData, PoolDialect},
    models::NetworkName,
    traits::PairDiscovery,
    Address,
};
use reqwest::Client;
use thiserror::Error;
use tracing::{instrument, warn};

use crate::{
    cache::ClientCache,
    config::{PlannerConfig, RetryConfiguration},
    pairs::subgraph::SubgraphClient,
};

#[derive(Error, Debug)]
pub enum PairDiscoveryError {
    #[error("No bundled pairs for {dialect} on {network}")]
    NoSnapshot { dialect: PoolDialect, network: NetworkName },
    #[error("No subgraph configured for {dialect} on {network}")]
    NoSources { dialect: PoolDialect, network: NetworkName },
    #[error("Invalid subgraph url {0}: {1}")]
    InvalidUrl(String, String),
    #[error("Request to {url} failed after {attempts} attempts: {msg}")]
    Transport { url: String, attempts: u64, msg: String },
    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },
    #[error("{url} rejected the query: {msg}")]
    Query { url: String, msg: String },
    #[error("Failed to parse pairs: {0}")]
    Parse(String),
}

/// Keeps pairs whose two tokens are both in `tokens`, or whose own (LP token) address is.
pub fn filter_pairs(pairs: impl IntoIterator<Item = PairData>, tokens: &[Address]) -> Vec<PairData> {
    pairs
        .into_iter()
        .filter(|p| {
            tokens.contains(&p.pair_address) ||
                (tokens.contains(&p.token_a.address) && tokens.contains(&p.token_b.address))
        })
        .collect()
}

/// [`PairDiscovery`] backed by the bundled snapshots, falling back to the configured subgraphs
/// when a snapshot is missing or has no match.
pub struct PairDiscoveryClient {
    http: Client,
    sources: HashMap<(PoolDialect, NetworkName), Vec<String>>,
    retry: RetryConfiguration,
    clients: ClientCache<(PoolDialect, NetworkName), SubgraphClient>,
}

impl PairDiscoveryClient {
    pub fn new(
        sources: HashMap<(PoolDialect, NetworkName), Vec<String>>,
        retry: RetryConfiguration,
    ) -> Self {
        Self { http: Client::new(), sources, retry, clients: ClientCache::new("subgraph") }
    }

    pub fn from_config(config: &PlannerConfig) -> Self {
        let mut sources: HashMap<_, Vec<String>> = HashMap::new();
        for source in config.subgraphs.iter() {
            sources
                .entry((source.dialect, source.network))
                .or_default()
                .push(source.url.clone());
        }
        Self::new(sources, config.retry.clone())
    }

    async fn live_lookup(
        &self,
        dialect: PoolDialect,
        network: NetworkName,
        tokens: &[Address],
    ) -> Result<Vec<PairData>, PairDiscoveryError> {
        let client = self
            .clients
            .get_or_try_init((dialect, network), |key| async move {
                let urls = self
                    .sources
                    .get(&key)
                    .filter(|urls| !urls.is_empty())
                    .ok_or(PairDiscoveryError::NoSources { dialect, network })?;
                SubgraphClient::new(self.http.clone(), urls, self.retry.clone())
            })
            .await?;
        client.lookup(tokens).await
    }
}

#[async_trait]
impl PairDiscovery for PairDiscoveryClient {
    type Error = PairDiscoveryError;

    #[instrument(skip(self, tokens), fields(tokens = tokens.len()))]
    async fn lookup(
        &self,
        dialect: PoolDialect,
        network: NetworkName,
        tokens: &[Address],
    ) -> Result<Vec<PairData>, Self::Error> {
        match snapshot::lookup(dialect, network, tokens) {
            Ok(pairs) if !pairs.is_empty() => return Ok(pairs),
            Ok(_) => warn!(%dialect, %network, "No snapshot match, querying subgraph"),
            Err(e) => warn!(%dialect, %network, error = %e, "Snapshot unavailable, querying subgraph"),
        }
        self.live_lookup(dialect, network, tokens)
            .await
    }
}
