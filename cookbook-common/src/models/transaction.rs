use alloy_primitives::{Address, Bytes};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::serde_primitives::biguint_string;

/// A contract call a step needs executed, ready for an external signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulatedTransaction {
    pub to: Address,
    pub data: Bytes,
    /// Native token value attached to the call.
    #[serde(with = "biguint_string")]
    pub value: BigUint,
}

impl PopulatedTransaction {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self { to, data: data.into(), value: BigUint::zero() }
    }

    pub fn with_value(mut self, value: BigUint) -> Self {
        self.value = value;
        self
    }
}
