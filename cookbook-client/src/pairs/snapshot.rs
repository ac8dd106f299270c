//! Pairs bundled with the binary, one JSON file per dialect and network.
use std::sync::OnceLock;

use cookbook_common::{amm::PairData, amm::PoolDialect, models::NetworkName, Address};
use tracing::debug;

use crate::pairs::{filter_pairs, PairDiscoveryError};

type Parsed = OnceLock<Result<Vec<PairData>, String>>;

static UNISWAP_V2_ETHEREUM: Parsed = OnceLock::new();
static QUICKSWAP_POLYGON: Parsed = OnceLock::new();
static PANCAKESWAP_V2_BSC: Parsed = OnceLock::new();

fn snapshot(dialect: PoolDialect, network: NetworkName) -> Option<(&'static str, &'static Parsed)> {
    match (dialect, network) {
        (PoolDialect::UniswapV2, NetworkName::Ethereum) => {
            Some((include_str!("data/uniswap-v2_ethereum.json"), &UNISWAP_V2_ETHEREUM))
        }
        (PoolDialect::QuickSwap, NetworkName::Polygon) => {
            Some((include_str!("data/quickswap_polygon.json"), &QUICKSWAP_POLYGON))
        }
        (PoolDialect::PancakeSwapV2, NetworkName::Bsc) => {
            Some((include_str!("data/pancakeswap-v2_bsc.json"), &PANCAKESWAP_V2_BSC))
        }
        _ => None,
    }
}

/// Every bundled pair of `dialect` on `network`, parsed once per process.
pub fn load(
    dialect: PoolDialect,
    network: NetworkName,
) -> Result<&'static [PairData], PairDiscoveryError> {
    let (raw, parsed) =
        snapshot(dialect, network).ok_or(PairDiscoveryError::NoSnapshot { dialect, network })?;
    parsed
        .get_or_init(|| {
            debug!(%dialect, %network, "Parsing bundled snapshot");
            serde_json::from_str(raw).map_err(|e| e.to_string())
        })
        .as_deref()
        .map_err(|e| {
            PairDiscoveryError::Parse(format!("snapshot {dialect} on {network} is malformed: {e}"))
        })
}

/// Bundled pairs of `dialect` on `network` that match `tokens`.
pub fn lookup(
    dialect: PoolDialect,
    network: NetworkName,
    tokens: &[Address],
) -> Result<Vec<PairData>, PairDiscoveryError> {
    let pairs = load(dialect, network)?;
    let found = filter_pairs(pairs.iter().cloned(), tokens);
    debug!(%dialect, %network, found = found.len(), "Snapshot lookup");
    Ok(found)
}

#[cfg(test)]
mod tests {
    use cookbook_common::amm::{derive_pair_address, sort_tokens, DialectRegistry};
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::uniswap(PoolDialect::UniswapV2, NetworkName::Ethereum)]
    #[case::quickswap(PoolDialect::QuickSwap, NetworkName::Polygon)]
    #[case::pancakeswap(PoolDialect::PancakeSwapV2, NetworkName::Bsc)]
    fn test_snapshot_pairs_are_derivable(#[case] dialect: PoolDialect, #[case] network: NetworkName) {
        let registry = DialectRegistry::default();
        let identity = registry
            .get(dialect, network)
            .unwrap();

        let pairs = load(dialect, network).unwrap();

        assert!(!pairs.is_empty());
        for pair in pairs.iter() {
            assert_eq!(
                derive_pair_address(identity, pair.token_a.address, pair.token_b.address).unwrap(),
                pair.pair_address
            );
            // token_a is the pair's token0
            assert_eq!(sort_tokens(pair.token_a.address, pair.token_b.address).0, pair.token_a.address);
        }
    }

    #[test]
    fn test_missing_snapshot() {
        assert!(matches!(
            load(PoolDialect::UniswapV2, NetworkName::Arbitrum),
            Err(PairDiscoveryError::NoSnapshot { .. })
        ));
    }

    #[test]
    fn test_snapshot_is_parsed_once() {
        let first = load(PoolDialect::QuickSwap, NetworkName::Polygon).unwrap();
        let second = load(PoolDialect::QuickSwap, NetworkName::Polygon).unwrap();

        assert!(std::ptr::eq(first, second));
    }
}
