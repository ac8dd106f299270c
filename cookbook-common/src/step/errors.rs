//! Error types for steps.

use num_bigint::BigUint;
use thiserror::Error;

use crate::{abi::AbiError, amm::AmmError, fees::FeeError, models::NetworkName};

/// Errors a step can fail with. A failing step never produces a partial ledger.
#[derive(Error, Debug, PartialEq)]
pub enum StepError {
    /// A token the step needs is not in its input.
    #[error("first input for this recipe must contain token amount: {0}")]
    MissingToken(String),

    #[error("Insufficient balance of {token}: requested {requested}, available {available}")]
    InsufficientBalance { token: String, requested: BigUint, available: BigUint },

    #[error("Token {token} is not approved for spender {spender}")]
    NotApproved { token: String, spender: String },

    #[error("Step {step} does not support network {network}")]
    UnsupportedNetwork { step: String, network: NetworkName },

    #[error("Invalid step parameter: {0}")]
    InvalidParameter(String),

    /// The step emitted an output that breaks the ledger rules. Always a bug in the step.
    #[error("Invariant violation in step {step}: {msg}")]
    InvariantViolation { step: String, msg: String },

    #[error(transparent)]
    Fee(#[from] FeeError),

    #[error(transparent)]
    Amm(#[from] AmmError),

    #[error(transparent)]
    Abi(#[from] AbiError),
}
