use alloy_primitives::Address;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::serde_primitives::biguint_string;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum NFTTokenType {
    #[serde(rename = "erc721")]
    #[strum(serialize = "erc721")]
    ERC721,
    #[serde(rename = "erc1155")]
    #[strum(serialize = "erc1155")]
    ERC1155,
}

/// A non-fungible holding. ERC1155 positions carry a quantity, ERC721 ones always hold one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NFTAmount {
    pub nft_address: Address,
    #[serde(with = "biguint_string")]
    pub token_sub_id: BigUint,
    #[serde(with = "biguint_string")]
    pub amount: BigUint,
    pub nft_token_type: NFTTokenType,
}

impl NFTAmount {
    pub fn new(
        nft_address: Address,
        token_sub_id: BigUint,
        amount: BigUint,
        nft_token_type: NFTTokenType,
    ) -> Self {
        Self { nft_address, token_sub_id, amount, nft_token_type }
    }

    /// Whether `other` refers to the same asset, whatever its quantity.
    pub fn same_asset(&self, other: &NFTAmount) -> bool {
        self.nft_address == other.nft_address && self.token_sub_id == other.token_sub_id
    }
}

/// NFTs are carried through the ledger untouched unless a step explicitly spends them.
pub type StepNFT = NFTAmount;
