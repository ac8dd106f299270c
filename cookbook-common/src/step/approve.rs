use alloy_primitives::Address;
use async_trait::async_trait;
use num_bigint::BigUint;

use crate::{
    abi::encode_approve,
    math::max_uint256,
    models::{format_address, transaction::PopulatedTransaction},
    step::{Step, StepConfig, StepError, StepInput, UnvalidatedStepOutput},
};

/// Approves `spender` to pull `token`. Spends nothing; every entry of the token is re-emitted with
/// its `approved_spender` set, after the untouched entries.
#[derive(Debug, Clone)]
pub struct ApproveERC20SpenderStep {
    config: StepConfig,
    spender: Address,
    token: Address,
    /// Allowance to grant; unlimited when `None`.
    amount: Option<BigUint>,
}

impl ApproveERC20SpenderStep {
    pub fn new(spender: Address, spender_label: &str, token: Address, amount: Option<BigUint>) -> Self {
        Self {
            config: StepConfig::new(
                "Approve ERC20 Spender",
                format!("Approves {} for spender {spender_label}.", format_address(&token)),
            ),
            spender,
            token,
            amount,
        }
    }
}

#[async_trait]
impl Step for ApproveERC20SpenderStep {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    async fn get_step_output(&self, input: &StepInput) -> Result<UnvalidatedStepOutput, StepError> {
        let (approved, mut unused): (Vec<_>, Vec<_>) = input
            .erc20_amounts
            .iter()
            .cloned()
            .partition(|b| b.token_address == self.token);
        if approved.is_empty() {
            return Err(StepError::MissingToken(format_address(&self.token)));
        }
        if approved.iter().any(|b| b.is_base_token) {
            return Err(StepError::InvalidParameter(
                "the base token cannot be approved".to_string(),
            ));
        }
        let total: BigUint = approved
            .iter()
            .map(|b| &b.expected_balance)
            .sum();
        let allowance = self
            .amount
            .clone()
            .unwrap_or_else(max_uint256);
        if allowance < total {
            return Err(StepError::InvalidParameter(format!(
                "allowance {allowance} does not cover balance {total} of {}",
                format_address(&self.token)
            )));
        }

        let mut output = UnvalidatedStepOutput::with_nfts_from(input);
        output
            .populated_transactions
            .push(PopulatedTransaction::new(self.token, encode_approve(self.spender, &allowance)?));
        unused.extend(
            approved
                .into_iter()
                .map(|b| b.with_approved_spender(Some(self.spender))),
        );
        output.output_erc20_amounts = unused;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        models::{token::StepERC20Balance, NetworkName},
        step::run_step,
    };

    #[tokio::test]
    async fn test_approve_sets_spender() {
        let token = Address::repeat_byte(0xaa);
        let other = StepERC20Balance::new(Address::repeat_byte(0xbb), 6, BigUint::from(3u8));
        let spender = Address::repeat_byte(0x01);
        let input = StepInput::new(
            NetworkName::Ethereum,
            vec![StepERC20Balance::new(token, 18, BigUint::from(10u8)), other.clone()],
        );

        let output = run_step(&ApproveERC20SpenderStep::new(spender, "router", token, None), &input)
            .await
            .unwrap();

        assert_eq!(output.spent_erc20_amounts, vec![]);
        assert_eq!(
            output.output_erc20_amounts,
            vec![
                other,
                StepERC20Balance::new(token, 18, BigUint::from(10u8))
                    .with_approved_spender(Some(spender))
            ]
        );
        assert_eq!(output.populated_transactions.len(), 1);
        assert_eq!(output.populated_transactions[0].to, token);
    }

    #[tokio::test]
    async fn test_allowance_too_small() {
        let token = Address::repeat_byte(0xaa);
        let input = StepInput::new(
            NetworkName::Ethereum,
            vec![StepERC20Balance::new(token, 18, BigUint::from(10u8))],
        );
        let step =
            ApproveERC20SpenderStep::new(Address::repeat_byte(1), "router", token, Some(BigUint::from(9u8)));

        assert!(matches!(run_step(&step, &input).await, Err(StepError::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn test_approve_covers_every_entry_of_the_token() {
        let token = Address::repeat_byte(0xaa);
        let other = StepERC20Balance::new(Address::repeat_byte(0xbb), 6, BigUint::from(3u8));
        let spender = Address::repeat_byte(0x01);
        let input = StepInput::new(
            NetworkName::Ethereum,
            vec![
                StepERC20Balance::new(token, 18, BigUint::from(10u8)),
                other.clone(),
                StepERC20Balance::new(token, 18, BigUint::from(4u8)),
            ],
        );

        let output = run_step(&ApproveERC20SpenderStep::new(spender, "router", token, None), &input)
            .await
            .unwrap();

        assert_eq!(
            output.output_erc20_amounts,
            vec![
                other,
                StepERC20Balance::new(token, 18, BigUint::from(10u8)).with_approved_spender(Some(spender)),
                StepERC20Balance::new(token, 18, BigUint::from(4u8)).with_approved_spender(Some(spender)),
            ]
        );
        let (merged, _) = StepInput::new(NetworkName::Ethereum, output.output_erc20_amounts)
            .take_erc20(&token, Some(&BigUint::from(14u8)))
            .unwrap();
        assert_eq!(merged.approved_spender, Some(spender));
    }

    #[tokio::test]
    async fn test_allowance_must_cover_every_entry() {
        let token = Address::repeat_byte(0xaa);
        let input = StepInput::new(
            NetworkName::Ethereum,
            vec![
                StepERC20Balance::new(token, 18, BigUint::from(6u8)),
                StepERC20Balance::new(token, 18, BigUint::from(6u8)),
            ],
        );
        let step =
            ApproveERC20SpenderStep::new(Address::repeat_byte(1), "router", token, Some(BigUint::from(10u8)));

        assert!(matches!(run_step(&step, &input).await, Err(StepError::InvalidParameter(_))));
    }
}
