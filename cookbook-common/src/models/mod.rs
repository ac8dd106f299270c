pub mod nft;
pub mod token;
pub mod transaction;

use std::str::FromStr;

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

use crate::models::token::TokenAmount;

#[derive(Error, Debug, PartialEq)]
pub enum ModelError {
    #[error("Invalid address {0}: {1}")]
    InvalidAddress(String, String),
}

/// Parses a hex address in any letter case.
///
/// Addresses are compared as bytes after parsing, which is what makes token lookups case
/// insensitive throughout the crate.
pub fn parse_address(value: &str) -> Result<Address, ModelError> {
    Address::from_str(value.trim())
        .map_err(|e| ModelError::InvalidAddress(value.to_string(), e.to_string()))
}

/// Lowercase `0x`-prefixed rendering used in messages and labels.
pub fn format_address(address: &Address) -> String {
    format!("{address:#x}")
}

/// Networks a plan can be assembled for.
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
    Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NetworkName {
    #[default]
    Ethereum,
    Polygon,
    Bsc,
    Arbitrum,
}

impl NetworkName {
    pub fn chain_id(&self) -> u64 {
        match self {
            NetworkName::Ethereum => 1,
            NetworkName::Polygon => 137,
            NetworkName::Bsc => 56,
            NetworkName::Arbitrum => 42161,
        }
    }

    /// The native token of the network. It has no contract, so it is addressed by the zero
    /// address and flagged with `is_base_token` wherever it appears in a ledger.
    pub fn base_token(&self, amount: num_bigint::BigUint) -> TokenAmount {
        TokenAmount::new(Address::ZERO, 18, amount)
    }

    pub fn base_token_symbol(&self) -> &'static str {
        match self {
            NetworkName::Ethereum | NetworkName::Arbitrum => "ETH",
            NetworkName::Polygon => "MATIC",
            NetworkName::Bsc => "BNB",
        }
    }

    /// Returns the ERC20 wrapper contract of the native token.
    pub fn wrapped_base_token(&self) -> Address {
        match self {
            NetworkName::Ethereum => address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            NetworkName::Polygon => address!("0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270"),
            NetworkName::Bsc => address!("bb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c"),
            NetworkName::Arbitrum => address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1"),
        }
    }
}
