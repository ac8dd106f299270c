use alloy_primitives::Address;
use async_trait::async_trait;
use num_bigint::BigUint;

use crate::{
    abi::{encode_unwrap, encode_wrap},
    models::{
        token::{SpentERC20Amount, StepERC20Balance},
        transaction::PopulatedTransaction,
    },
    step::{Step, StepConfig, StepError, StepInput, UnvalidatedStepOutput},
};

const BASE_TOKEN_DECIMALS: u8 = 18;

/// Wraps the base token 1:1 into its ERC20 wrapper.
#[derive(Debug, Clone)]
pub struct WrapBaseTokenStep {
    config: StepConfig,
    amount: Option<BigUint>,
}

impl WrapBaseTokenStep {
    pub fn new(amount: Option<BigUint>) -> Self {
        Self {
            config: StepConfig::new("Wrap Base Token", "Wraps base token into wrapped token."),
            amount,
        }
    }
}

#[async_trait]
impl Step for WrapBaseTokenStep {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    async fn get_step_output(&self, input: &StepInput) -> Result<UnvalidatedStepOutput, StepError> {
        let (base, mut unused) = input.take_erc20(&Address::ZERO, self.amount.as_ref())?;
        if !base.is_base_token {
            return Err(StepError::MissingToken(format!(
                "{} base token",
                input.network.base_token_symbol()
            )));
        }
        let wrapped = input.network.wrapped_base_token();

        let mut output = UnvalidatedStepOutput::with_nfts_from(input);
        output
            .populated_transactions
            .push(PopulatedTransaction::new(wrapped, encode_wrap()).with_value(base.expected_balance.clone()));
        output
            .spent_erc20_amounts
            .push(SpentERC20Amount::new(
                base.token_address,
                base.decimals,
                base.expected_balance.clone(),
                format!("Wrapped {}", input.network.base_token_symbol()),
            ));
        unused.push(
            StepERC20Balance::new(wrapped, BASE_TOKEN_DECIMALS, base.expected_balance)
                .with_min_balance(base.min_balance),
        );
        output.output_erc20_amounts = unused;
        Ok(output)
    }
}

/// Unwraps the wrapped base token 1:1 into the base token.
#[derive(Debug, Clone)]
pub struct UnwrapBaseTokenStep {
    config: StepConfig,
    amount: Option<BigUint>,
}

impl UnwrapBaseTokenStep {
    pub fn new(amount: Option<BigUint>) -> Self {
        Self {
            config: StepConfig::new("Unwrap Base Token", "Unwraps wrapped token into base token."),
            amount,
        }
    }
}

#[async_trait]
impl Step for UnwrapBaseTokenStep {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    async fn get_step_output(&self, input: &StepInput) -> Result<UnvalidatedStepOutput, StepError> {
        let wrapped = input.network.wrapped_base_token();
        let (unwrapped, mut unused) = input.take_erc20(&wrapped, self.amount.as_ref())?;

        let mut output = UnvalidatedStepOutput::with_nfts_from(input);
        output
            .populated_transactions
            .push(PopulatedTransaction::new(wrapped, encode_unwrap(&unwrapped.expected_balance)?));
        output
            .spent_erc20_amounts
            .push(SpentERC20Amount::new(
                wrapped,
                unwrapped.decimals,
                unwrapped.expected_balance.clone(),
                format!("Wrapped {}", input.network.base_token_symbol()),
            ));
        unused.push(
            StepERC20Balance::new(Address::ZERO, BASE_TOKEN_DECIMALS, unwrapped.expected_balance)
                .with_min_balance(unwrapped.min_balance)
                .with_base_token(true),
        );
        output.output_erc20_amounts = unused;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{models::NetworkName, step::run_step};

    #[tokio::test]
    async fn test_wrap_then_unwrap() {
        let input = StepInput::new(
            NetworkName::Polygon,
            vec![StepERC20Balance::new(Address::ZERO, 18, BigUint::from(1_000u32))
                .with_base_token(true)],
        );

        let wrapped = run_step(&WrapBaseTokenStep::new(None), &input)
            .await
            .unwrap();

        assert_eq!(wrapped.populated_transactions[0].value, BigUint::from(1_000u32));
        assert_eq!(
            wrapped.output_erc20_amounts,
            vec![StepERC20Balance::new(
                NetworkName::Polygon.wrapped_base_token(),
                18,
                BigUint::from(1_000u32)
            )]
        );

        let unwrapped = run_step(
            &UnwrapBaseTokenStep::new(Some(BigUint::from(400u32))),
            &wrapped.next_input(NetworkName::Polygon),
        )
        .await
        .unwrap();

        assert_eq!(unwrapped.output_erc20_amounts.len(), 2);
        assert_eq!(unwrapped.output_erc20_amounts[0].expected_balance, BigUint::from(600u32));
        assert!(unwrapped.output_erc20_amounts[1].is_base_token);
        assert_eq!(unwrapped.output_erc20_amounts[1].expected_balance, BigUint::from(400u32));
    }

    #[tokio::test]
    async fn test_wrap_without_base_token() {
        let input = StepInput::new(NetworkName::Ethereum, vec![]);

        let res = run_step(&WrapBaseTokenStep::new(None), &input).await;

        assert!(matches!(res, Err(StepError::MissingToken(_))));
    }
}
