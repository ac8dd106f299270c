use std::fmt;

use alloy_primitives::Address;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::{models::format_address, serde_primitives::biguint_string};

/// An exact quantity of a fungible token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenAmount {
    pub token_address: Address,
    pub decimals: u8,
    #[serde(with = "biguint_string")]
    pub amount: BigUint,
}

impl TokenAmount {
    pub fn new(token_address: Address, decimals: u8, amount: BigUint) -> Self {
        Self { token_address, decimals, amount }
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.amount, format_address(&self.token_address))
    }
}

/// A token amount handed to a recipe as its starting (still shielded) balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeERC20Amount {
    pub token_address: Address,
    pub decimals: u8,
    #[serde(with = "biguint_string")]
    pub amount: BigUint,
    #[serde(default)]
    pub is_base_token: bool,
}

impl RecipeERC20Amount {
    pub fn new(token_address: Address, decimals: u8, amount: BigUint) -> Self {
        Self { token_address, decimals, amount, is_base_token: false }
    }

    pub fn base_token(decimals: u8, amount: BigUint) -> Self {
        Self { token_address: Address::ZERO, decimals, amount, is_base_token: true }
    }
}

/// A ledger entry flowing between steps.
///
/// `expected_balance` is the no-slippage projection, `min_balance` the worst case after every
/// slippage tolerance applied so far. `min_balance <= expected_balance` must always hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepERC20Balance {
    pub token_address: Address,
    pub decimals: u8,
    #[serde(with = "biguint_string")]
    pub expected_balance: BigUint,
    #[serde(with = "biguint_string")]
    pub min_balance: BigUint,
    /// The contract currently allowed to pull this token, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_spender: Option<Address>,
    #[serde(default)]
    pub is_base_token: bool,
}

impl StepERC20Balance {
    /// Creates an entry with no slippage applied yet.
    pub fn new(token_address: Address, decimals: u8, amount: BigUint) -> Self {
        Self {
            token_address,
            decimals,
            expected_balance: amount.clone(),
            min_balance: amount,
            approved_spender: None,
            is_base_token: false,
        }
    }

    pub fn with_min_balance(mut self, min_balance: BigUint) -> Self {
        self.min_balance = min_balance;
        self
    }

    pub fn with_approved_spender(mut self, spender: Option<Address>) -> Self {
        self.approved_spender = spender;
        self
    }

    pub fn with_base_token(mut self, is_base_token: bool) -> Self {
        self.is_base_token = is_base_token;
        self
    }

    pub fn has_valid_bounds(&self) -> bool {
        self.min_balance <= self.expected_balance
    }

    /// True when both balance projections match, regardless of approvals.
    pub fn same_balances(&self, other: &Self) -> bool {
        self.token_address == other.token_address &&
            self.expected_balance == other.expected_balance &&
            self.min_balance == other.min_balance
    }

    pub fn to_token_amount(&self) -> TokenAmount {
        TokenAmount::new(self.token_address, self.decimals, self.expected_balance.clone())
    }
}

impl From<RecipeERC20Amount> for StepERC20Balance {
    fn from(value: RecipeERC20Amount) -> Self {
        StepERC20Balance::new(value.token_address, value.decimals, value.amount)
            .with_base_token(value.is_base_token)
    }
}

/// An amount consumed by a step's on-chain calls, attributed to whoever pulls it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpentERC20Amount {
    pub token_address: Address,
    pub decimals: u8,
    #[serde(with = "biguint_string")]
    pub amount: BigUint,
    pub recipient: String,
}

impl SpentERC20Amount {
    pub fn new(
        token_address: Address,
        decimals: u8,
        amount: BigUint,
        recipient: impl Into<String>,
    ) -> Self {
        Self { token_address, decimals, amount, recipient: recipient.into() }
    }
}

/// A fee charged at a specific point of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRecipientAmount {
    pub token_address: Address,
    pub decimals: u8,
    #[serde(with = "biguint_string")]
    pub amount: BigUint,
    /// Human readable label, e.g. `Unshield Fee`.
    pub recipient: String,
}

impl FeeRecipientAmount {
    pub fn new(
        token_address: Address,
        decimals: u8,
        amount: BigUint,
        recipient: impl Into<String>,
    ) -> Self {
        Self { token_address, decimals, amount, recipient: recipient.into() }
    }
}
