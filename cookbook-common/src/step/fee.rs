use async_trait::async_trait;

use crate::{
    fees::{split_fee, FeeConfig},
    models::token::{FeeRecipientAmount, StepERC20Balance},
    step::{Step, StepConfig, StepError, StepInput, UnvalidatedStepOutput},
};

pub const UNSHIELD_FEE_LABEL: &str = "Unshield Fee";
pub const SHIELD_FEE_LABEL: &str = "Shield Fee";

/// Charges `bps` on every ledger entry, on the expected and min balance separately.
fn charge_fee_on_all(input: &StepInput, bps: u32, label: &str) -> UnvalidatedStepOutput {
    let mut output = UnvalidatedStepOutput::with_nfts_from(input);
    for balance in input.erc20_amounts.iter() {
        let (fee, expected_balance) = split_fee(&balance.expected_balance, bps);
        let (_, min_balance) = split_fee(&balance.min_balance, bps);

        output
            .fee_erc20_amount_recipients
            .push(FeeRecipientAmount::new(balance.token_address, balance.decimals, fee, label));
        output
            .output_erc20_amounts
            .push(StepERC20Balance { expected_balance, min_balance, ..balance.clone() });
    }
    output
}

/// First step of every recipe: moves the private balances out, minus the unshield fee.
#[derive(Debug, Clone)]
pub struct UnshieldDefaultStep {
    config: StepConfig,
    fee_config: FeeConfig,
}

impl UnshieldDefaultStep {
    pub fn new(fee_config: FeeConfig) -> Self {
        Self {
            config: StepConfig::new("Unshield", "Unshield ERC20s and NFTs from private balance."),
            fee_config,
        }
    }
}

#[async_trait]
impl Step for UnshieldDefaultStep {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    async fn get_step_output(&self, input: &StepInput) -> Result<UnvalidatedStepOutput, StepError> {
        let bps = self
            .fee_config
            .unshield_bps(input.network)?;
        Ok(charge_fee_on_all(input, bps, UNSHIELD_FEE_LABEL))
    }
}

/// Last step of every recipe: moves everything left back into the private balance, minus the
/// shield fee.
#[derive(Debug, Clone)]
pub struct ShieldDefaultStep {
    config: StepConfig,
    fee_config: FeeConfig,
}

impl ShieldDefaultStep {
    pub fn new(fee_config: FeeConfig) -> Self {
        Self {
            config: StepConfig::new("Shield", "Shield ERC20s and NFTs into private balance."),
            fee_config,
        }
    }
}

#[async_trait]
impl Step for ShieldDefaultStep {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    async fn get_step_output(&self, input: &StepInput) -> Result<UnvalidatedStepOutput, StepError> {
        let bps = self
            .fee_config
            .shield_bps(input.network)?;
        Ok(charge_fee_on_all(input, bps, SHIELD_FEE_LABEL))
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;
    use num_bigint::BigUint;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        fees::{FeeError, NetworkFees},
        models::NetworkName,
        step::run_step,
    };

    fn fee_config() -> FeeConfig {
        FeeConfig::uniform([NetworkName::Ethereum], NetworkFees::new(25, 25)).unwrap()
    }

    #[tokio::test]
    async fn test_unshield_charges_expected_and_min_separately() {
        let token = Address::repeat_byte(0xaa);
        let input = StepInput::new(
            NetworkName::Ethereum,
            vec![StepERC20Balance::new(token, 18, BigUint::from(12_000u32))
                .with_min_balance(BigUint::from(10_000u32))],
        );

        let output = run_step(&UnshieldDefaultStep::new(fee_config()), &input)
            .await
            .unwrap();

        assert_eq!(output.name, "Unshield");
        assert_eq!(output.output_erc20_amounts[0].expected_balance, BigUint::from(11_970u32));
        assert_eq!(output.output_erc20_amounts[0].min_balance, BigUint::from(9_975u32));
        assert_eq!(
            output.fee_erc20_amount_recipients,
            vec![FeeRecipientAmount::new(token, 18, BigUint::from(30u32), "Unshield Fee")]
        );
        assert!(output.populated_transactions.is_empty());
        assert!(output.spent_erc20_amounts.is_empty());
    }

    #[tokio::test]
    async fn test_shield_on_unconfigured_network() {
        let input = StepInput::new(NetworkName::Polygon, vec![]);

        let res = run_step(&ShieldDefaultStep::new(fee_config()), &input).await;

        assert_eq!(res, Err(StepError::Fee(FeeError::UnsupportedNetwork(NetworkName::Polygon))));
    }
}
