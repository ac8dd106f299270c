use alloy_primitives::{keccak256, Address};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::{
    amm::{registry::PoolIdentity, AmmError},
    models::format_address,
    serde_primitives::biguint_string,
};

/// Orders two tokens the way the factory does, lowest address first.
pub fn sort_tokens(a: Address, b: Address) -> (Address, Address) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// CREATE2 address of the pair of `token_a` and `token_b`. Argument order does not matter.
pub fn derive_pair_address(
    identity: &PoolIdentity,
    token_a: Address,
    token_b: Address,
) -> Result<Address, AmmError> {
    if token_a == token_b {
        return Err(AmmError::IdenticalTokens(format_address(&token_a)));
    }
    let (token0, token1) = sort_tokens(token_a, token_b);
    let salt = keccak256([token0.as_slice(), token1.as_slice()].concat());
    Ok(identity
        .factory_address
        .create2(salt, identity.init_code_hash))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairToken {
    pub address: Address,
    pub decimals: u8,
    pub symbol: String,
}

/// A discovered pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairData {
    pub pair_address: Address,
    pub token_a: PairToken,
    pub token_b: PairToken,
    /// Units of `token_a` per unit of `token_b`, 18 decimals.
    #[serde(with = "biguint_string")]
    pub rate: BigUint,
}

/// One joined read of a pair's reserves, supply and fee state, oriented to the caller's
/// `(token_a, token_b)` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairState {
    pub reserve_a: BigUint,
    pub reserve_b: BigUint,
    pub total_supply: BigUint,
    pub k_last: BigUint,
    pub fee_on: bool,
}
