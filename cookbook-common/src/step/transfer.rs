use alloy_primitives::{address, Address};
use async_trait::async_trait;
use num_bigint::BigUint;

use crate::{
    abi::encode_transfer,
    models::{format_address, token::SpentERC20Amount, transaction::PopulatedTransaction},
    step::{Step, StepConfig, StepError, StepInput, UnvalidatedStepOutput},
};

pub const DEAD_ADDRESS: Address = address!("000000000000000000000000000000000000dEaD");

/// Sends part or all of an ERC20 balance to an external address.
#[derive(Debug, Clone)]
pub struct TransferERC20Step {
    config: StepConfig,
    to: Address,
    token: Address,
    amount: Option<BigUint>,
}

impl TransferERC20Step {
    pub fn new(to: Address, token: Address, amount: Option<BigUint>) -> Self {
        Self {
            config: StepConfig::new(
                "Transfer ERC20",
                format!("Transfers {} to {}.", format_address(&token), format_address(&to)),
            ),
            to,
            token,
            amount,
        }
    }
}

#[async_trait]
impl Step for TransferERC20Step {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    async fn get_step_output(&self, input: &StepInput) -> Result<UnvalidatedStepOutput, StepError> {
        let (sent, unused) = input.take_erc20(&self.token, self.amount.as_ref())?;
        if sent.is_base_token {
            return Err(StepError::InvalidParameter(
                "use a base token transfer to send the base token".to_string(),
            ));
        }

        let mut output = UnvalidatedStepOutput::with_nfts_from(input);
        output
            .populated_transactions
            .push(PopulatedTransaction::new(
                self.token,
                encode_transfer(self.to, &sent.expected_balance)?,
            ));
        output
            .spent_erc20_amounts
            .push(SpentERC20Amount::new(
                sent.token_address,
                sent.decimals,
                sent.expected_balance,
                format_address(&self.to),
            ));
        output.output_erc20_amounts = unused;
        Ok(output)
    }
}

/// Sends zero of the base token to the dead address. Every balance passes through untouched;
/// used to give a plan at least one call.
#[derive(Debug, Clone)]
pub struct EmptyTransferBaseTokenStep {
    config: StepConfig,
}

impl Default for EmptyTransferBaseTokenStep {
    fn default() -> Self {
        Self {
            config: StepConfig::new(
                "Empty Transfer Base Token",
                "Sends a zero value base token transfer to the dead address.",
            ),
        }
    }
}

#[async_trait]
impl Step for EmptyTransferBaseTokenStep {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    async fn get_step_output(&self, input: &StepInput) -> Result<UnvalidatedStepOutput, StepError> {
        let mut output = UnvalidatedStepOutput::with_nfts_from(input);
        output
            .populated_transactions
            .push(PopulatedTransaction::new(DEAD_ADDRESS, Vec::new()));
        output.output_erc20_amounts = input.erc20_amounts.clone();
        Ok(output)
    }
}
