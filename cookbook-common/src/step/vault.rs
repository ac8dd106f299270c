use alloy_primitives::Address;
use async_trait::async_trait;
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::{
    abi::{encode_vault_deposit, encode_vault_redeem},
    fees::split_fee,
    math::pow10,
    models::token::{FeeRecipientAmount, SpentERC20Amount, StepERC20Balance},
    models::transaction::PopulatedTransaction,
    serde_primitives::biguint_string,
    step::{require_approval, Step, StepConfig, StepError, StepInput, UnvalidatedStepOutput},
};

/// An ERC4626 style yield vault, as reported by the vault's own API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultInfo {
    pub name: String,
    /// Vault contract, also the share token.
    pub vault_address: Address,
    pub share_decimals: u8,
    pub deposit_token: Address,
    pub deposit_decimals: u8,
    /// Deposit tokens per whole share, in deposit token units.
    #[serde(with = "biguint_string")]
    pub price_per_share: BigUint,
    #[serde(default)]
    pub deposit_fee_bps: u32,
    #[serde(default)]
    pub withdraw_fee_bps: u32,
}

impl VaultInfo {
    fn check(&self) -> Result<(), StepError> {
        if self.price_per_share.is_zero() {
            return Err(StepError::InvalidParameter(format!(
                "vault {} has a zero price per share",
                self.name
            )));
        }
        Ok(())
    }

    fn assets_to_shares(&self, assets: &BigUint) -> BigUint {
        assets * pow10(self.share_decimals.into()) / &self.price_per_share
    }

    fn shares_to_assets(&self, shares: &BigUint) -> BigUint {
        shares * &self.price_per_share / pow10(self.share_decimals.into())
    }
}

/// Deposits a token into a vault in exchange for shares, paying the vault's deposit fee.
#[derive(Debug, Clone)]
pub struct VaultDepositStep {
    config: StepConfig,
    vault: VaultInfo,
    amount: Option<BigUint>,
    recipient: Address,
}

impl VaultDepositStep {
    pub fn new(vault: VaultInfo, amount: Option<BigUint>, recipient: Address) -> Self {
        Self {
            config: StepConfig::new(
                format!("{} Vault Deposit", vault.name),
                format!("Deposits into the {} yield vault.", vault.name),
            ),
            vault,
            amount,
            recipient,
        }
    }
}

#[async_trait]
impl Step for VaultDepositStep {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    async fn get_step_output(&self, input: &StepInput) -> Result<UnvalidatedStepOutput, StepError> {
        self.vault.check()?;
        let vault = &self.vault;
        let (deposit, mut unused) = input.take_erc20(&vault.deposit_token, self.amount.as_ref())?;
        require_approval(&deposit, &vault.vault_address)?;

        let (fee, net) = split_fee(&deposit.expected_balance, vault.deposit_fee_bps);
        let (_, net_min) = split_fee(&deposit.min_balance, vault.deposit_fee_bps);

        let mut output = UnvalidatedStepOutput::with_nfts_from(input);
        output
            .populated_transactions
            .push(PopulatedTransaction::new(
                vault.vault_address,
                encode_vault_deposit(&deposit.expected_balance, self.recipient)?,
            ));
        output
            .spent_erc20_amounts
            .push(SpentERC20Amount::new(
                deposit.token_address,
                deposit.decimals,
                net.clone(),
                format!("{} Vault", vault.name),
            ));
        output
            .fee_erc20_amount_recipients
            .push(FeeRecipientAmount::new(
                deposit.token_address,
                deposit.decimals,
                fee,
                format!("{} Deposit Fee", vault.name),
            ));
        unused.push(
            StepERC20Balance::new(
                vault.vault_address,
                vault.share_decimals,
                vault.assets_to_shares(&net),
            )
            .with_min_balance(vault.assets_to_shares(&net_min)),
        );
        output.output_erc20_amounts = unused;
        Ok(output)
    }
}

/// Redeems vault shares for the deposit token, paying the vault's withdraw fee.
#[derive(Debug, Clone)]
pub struct VaultRedeemStep {
    config: StepConfig,
    vault: VaultInfo,
    shares: Option<BigUint>,
    recipient: Address,
}

impl VaultRedeemStep {
    pub fn new(vault: VaultInfo, shares: Option<BigUint>, recipient: Address) -> Self {
        Self {
            config: StepConfig::new(
                format!("{} Vault Redeem", vault.name),
                format!("Redeems shares of the {} yield vault.", vault.name),
            ),
            vault,
            shares,
            recipient,
        }
    }
}

#[async_trait]
impl Step for VaultRedeemStep {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    async fn get_step_output(&self, input: &StepInput) -> Result<UnvalidatedStepOutput, StepError> {
        self.vault.check()?;
        let vault = &self.vault;
        let (shares, mut unused) = input.take_erc20(&vault.vault_address, self.shares.as_ref())?;

        let (fee, assets) =
            split_fee(&vault.shares_to_assets(&shares.expected_balance), vault.withdraw_fee_bps);
        let (_, assets_min) =
            split_fee(&vault.shares_to_assets(&shares.min_balance), vault.withdraw_fee_bps);

        let mut output = UnvalidatedStepOutput::with_nfts_from(input);
        output
            .populated_transactions
            .push(PopulatedTransaction::new(
                vault.vault_address,
                encode_vault_redeem(&shares.expected_balance, self.recipient, self.recipient)?,
            ));
        output
            .spent_erc20_amounts
            .push(SpentERC20Amount::new(
                shares.token_address,
                shares.decimals,
                shares.expected_balance.clone(),
                format!("{} Vault", vault.name),
            ));
        output
            .fee_erc20_amount_recipients
            .push(FeeRecipientAmount::new(
                vault.deposit_token,
                vault.deposit_decimals,
                fee,
                format!("{} Withdraw Fee", vault.name),
            ));
        unused.push(
            StepERC20Balance::new(vault.deposit_token, vault.deposit_decimals, assets)
                .with_min_balance(assets_min),
        );
        output.output_erc20_amounts = unused;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{models::NetworkName, step::run_step};

    fn vault() -> VaultInfo {
        VaultInfo {
            name: "Beefy".to_string(),
            vault_address: Address::repeat_byte(0x77),
            share_decimals: 18,
            deposit_token: Address::repeat_byte(0xaa),
            deposit_decimals: 18,
            // 1.25 deposit tokens per share
            price_per_share: BigUint::from_str("1250000000000000000").unwrap(),
            deposit_fee_bps: 10,
            withdraw_fee_bps: 0,
        }
    }

    #[tokio::test]
    async fn test_deposit() {
        let input = StepInput::new(
            NetworkName::Polygon,
            vec![StepERC20Balance::new(Address::repeat_byte(0xaa), 18, BigUint::from(10_000u32))
                .with_approved_spender(Some(Address::repeat_byte(0x77)))],
        );

        let output = run_step(&VaultDepositStep::new(vault(), None, Address::repeat_byte(1)), &input)
            .await
            .unwrap();

        assert_eq!(
            output.fee_erc20_amount_recipients,
            vec![FeeRecipientAmount::new(
                Address::repeat_byte(0xaa),
                18,
                BigUint::from(10u32),
                "Beefy Deposit Fee"
            )]
        );
        assert_eq!(output.spent_erc20_amounts[0].amount, BigUint::from(9_990u32));
        // 9990 / 1.25
        assert_eq!(
            output.output_erc20_amounts,
            vec![StepERC20Balance::new(Address::repeat_byte(0x77), 18, BigUint::from(7_992u32))]
        );
    }

    #[tokio::test]
    async fn test_redeem_into_existing_balance() {
        let vault = VaultInfo { withdraw_fee_bps: 100, ..vault() };
        let input = StepInput::new(
            NetworkName::Polygon,
            vec![
                StepERC20Balance::new(Address::repeat_byte(0xaa), 18, BigUint::from(5u32)),
                StepERC20Balance::new(Address::repeat_byte(0x77), 18, BigUint::from(8_000u32)),
            ],
        );

        let output = run_step(&VaultRedeemStep::new(vault, None, Address::repeat_byte(1)), &input)
            .await
            .unwrap();

        assert_eq!(output.fee_erc20_amount_recipients[0].amount, BigUint::from(100u32));
        assert_eq!(output.fee_erc20_amount_recipients[0].recipient, "Beefy Withdraw Fee");
        assert_eq!(
            output.output_erc20_amounts,
            vec![
                StepERC20Balance::new(Address::repeat_byte(0xaa), 18, BigUint::from(5u32)),
                StepERC20Balance::new(Address::repeat_byte(0xaa), 18, BigUint::from(9_900u32)),
            ]
        );
    }

    #[tokio::test]
    async fn test_deposit_requires_vault_approval() {
        let input = StepInput::new(
            NetworkName::Polygon,
            vec![StepERC20Balance::new(Address::repeat_byte(0xaa), 18, BigUint::from(1u32))],
        );

        let res = run_step(&VaultDepositStep::new(vault(), None, Address::repeat_byte(1)), &input).await;

        assert!(matches!(res, Err(StepError::NotApproved { .. })));
    }
}
