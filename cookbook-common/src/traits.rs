use core::fmt::Debug;

use alloy_primitives::Address;
use async_trait::async_trait;
use num_bigint::BigUint;
use thiserror::Error;

use crate::{
    amm::{PairData, PoolDialect},
    models::NetworkName,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PairReadError {
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Refusing to call invalid address {0}")]
    InvalidAddress(String),
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// On-chain reads of a UniswapV2 style pair and its factory.
///
/// Implementations must validate addresses before issuing any call.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait PairStateReader: Send + Sync {
    /// Reserves in the pair's own `(token0, token1)` order.
    async fn get_reserves(&self, pair: Address) -> Result<(BigUint, BigUint), PairReadError>;

    async fn total_supply(&self, pair: Address) -> Result<BigUint, PairReadError>;

    /// Product of the reserves as of the last liquidity event. Zero while the protocol fee is
    /// off.
    async fn k_last(&self, pair: Address) -> Result<BigUint, PairReadError>;

    /// Protocol fee recipient of the factory, the zero address when the fee is disabled.
    async fn fee_to(&self, factory: Address) -> Result<Address, PairReadError>;
}

/// Resolves tokens to the pools of a dialect on a network.
///
/// A pool is returned when both its tokens are among `tokens`, or when its own (LP token) address
/// is.
#[async_trait]
pub trait PairDiscovery: Send + Sync {
    type Error: Debug + Send + Sync;

    async fn lookup(
        &self,
        dialect: PoolDialect,
        network: NetworkName,
        tokens: &[Address],
    ) -> Result<Vec<PairData>, Self::Error>;
}
