//! Constant-product AMM settlement math.
//!
//! Pair addresses are derived, never stored: a pool is identified by its dialect (a deployment
//! family sharing the UniswapV2 math) and network, which resolve to a [`PoolIdentity`] through the
//! [`DialectRegistry`]. Unsupported combinations fail before any on-chain read is attempted.
mod pair;
mod quote;
mod registry;

use num_bigint::BigUint;
pub use pair::{derive_pair_address, sort_tokens, PairData, PairState, PairToken};
pub use quote::{
    get_add_liquidity_quote, get_amount_out, get_remove_liquidity_quote, get_swap_quote,
    read_pair_state, rate, AddLiquidityQuote, RemoveLiquidityQuote, SwapQuote,
};
pub use registry::{DialectRegistry, PoolIdentity};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

use crate::{abi::AbiError, models::NetworkName, traits::PairReadError};

/// A UniswapV2-style deployment family.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PoolDialect {
    UniswapV2,
    #[serde(rename = "quickswap")]
    #[strum(serialize = "quickswap")]
    QuickSwap,
    #[serde(rename = "pancakeswap-v2")]
    #[strum(serialize = "pancakeswap-v2")]
    PancakeSwapV2,
}

impl PoolDialect {
    pub fn display_name(&self) -> &'static str {
        match self {
            PoolDialect::UniswapV2 => "Uniswap V2",
            PoolDialect::QuickSwap => "QuickSwap",
            PoolDialect::PancakeSwapV2 => "PancakeSwap V2",
        }
    }
}

/// Every UniswapV2 style LP token has 18 decimals.
pub const LP_DECIMALS: u8 = 18;

#[derive(Error, Debug, PartialEq)]
pub enum AmmError {
    #[error("Unsupported dialect {dialect} on network {network}")]
    UnsupportedDialect { dialect: PoolDialect, network: NetworkName },
    #[error("Invalid pool identity for {dialect} on {network}: {msg}")]
    InvalidIdentity { dialect: PoolDialect, network: NetworkName, msg: String },
    #[error("Cannot build a pair out of identical tokens {0}")]
    IdenticalTokens(String),
    #[error("Slippage of {0} bps exceeds 10000")]
    InvalidSlippage(u32),
    #[error("Pair {0} has no reserves")]
    EmptyReserves(String),
    #[error("LP amount {lp_amount} is smaller than the pending protocol fee {fee_lp_amount}")]
    InsufficientLiquidity { lp_amount: BigUint, fee_lp_amount: BigUint },
    #[error("Failed to read pair state: {0}")]
    PairRead(#[from] PairReadError),
    #[error(transparent)]
    Abi(#[from] AbiError),
}

fn check_slippage(slippage_bps: u32) -> Result<(), AmmError> {
    if slippage_bps > crate::math::BPS_DENOMINATOR {
        return Err(AmmError::InvalidSlippage(slippage_bps));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::uniswap("uniswap-v2", PoolDialect::UniswapV2)]
    #[case::quickswap("quickswap", PoolDialect::QuickSwap)]
    #[case::pancake("pancakeswap-v2", PoolDialect::PancakeSwapV2)]
    fn test_dialect_names(#[case] raw: &str, #[case] dialect: PoolDialect) {
        assert_eq!(PoolDialect::from_str(raw).unwrap(), dialect);
        assert_eq!(dialect.to_string(), raw);
        assert_eq!(serde_json::to_string(&dialect).unwrap(), format!("\"{raw}\""));
    }
}
