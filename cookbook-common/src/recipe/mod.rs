//! Recipes: ordered step lists run by one generic executor.
mod combo_meal;
mod executor;
mod library;

use alloy_primitives::Address;
pub use combo_meal::ComboMeal;
pub use executor::RecipeExecutor;
pub use library::{PlanContext, PreparedRecipe};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    amm::AmmError,
    fees::FeeError,
    models::{
        nft::NFTAmount,
        token::{FeeRecipientAmount, RecipeERC20Amount, StepERC20Balance},
        transaction::PopulatedTransaction,
        NetworkName,
    },
    step::{Step, StepError, StepOutput},
};

#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("Recipe {recipe} does not support network {network}")]
    UnsupportedNetwork { recipe: String, network: NetworkName },
    #[error("Step {index} ({name}) failed: {source}")]
    StepFailed {
        index: usize,
        name: String,
        #[source]
        source: StepError,
    },
    #[error("Recipe {recipe} broke an invariant: {msg}")]
    InvariantViolation { recipe: String, msg: String },
    #[error("Invalid recipe parameter: {0}")]
    InvalidParameter(String),
    #[error(transparent)]
    Fee(#[from] FeeError),
    #[error(transparent)]
    Amm(#[from] AmmError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeConfig {
    pub name: String,
    pub description: String,
}

impl RecipeConfig {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into() }
    }
}

/// An ordered list of steps plus metadata. Running it is the executor's job.
#[derive(Debug)]
pub struct Recipe {
    pub config: RecipeConfig,
    pub supported_networks: Vec<NetworkName>,
    pub steps: Vec<Box<dyn Step>>,
}

impl Recipe {
    pub fn new(
        config: RecipeConfig,
        supported_networks: Vec<NetworkName>,
        steps: Vec<Box<dyn Step>>,
    ) -> Self {
        Self { config, supported_networks, steps }
    }

    pub fn supports_network(&self, network: NetworkName) -> bool {
        self.supported_networks
            .contains(&network)
    }
}

/// The still-shielded balances a recipe starts from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeInput {
    pub network: NetworkName,
    pub erc20_amounts: Vec<RecipeERC20Amount>,
    #[serde(default)]
    pub nfts: Vec<NFTAmount>,
}

impl RecipeInput {
    pub fn new(network: NetworkName, erc20_amounts: Vec<RecipeERC20Amount>) -> Self {
        Self { network, erc20_amounts, nfts: Vec::new() }
    }
}

/// The complete plan: the only artifact handed to a caller's signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeOutput {
    pub name: String,
    pub step_outputs: Vec<StepOutput>,
    /// Ledger after the final shield.
    pub erc20_amounts: Vec<StepERC20Balance>,
    pub nfts: Vec<NFTAmount>,
    /// Every token that appeared anywhere in the plan, in order of first appearance.
    pub tokens_seen: Vec<Address>,
    pub nfts_seen: Vec<NFTAmount>,
    pub populated_transactions: Vec<PopulatedTransaction>,
    pub fee_erc20_amount_recipients: Vec<FeeRecipientAmount>,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use alloy_primitives::address;
    use num_bigint::BigUint;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        amm::{DialectRegistry, PairToken, PoolDialect},
        fees::{FeeConfig, NetworkFees},
        step::{VaultInfo, DEAD_ADDRESS, SHIELD_FEE_LABEL, UNSHIELD_FEE_LABEL},
        traits::MockPairStateReader,
    };

    const DAI: Address = address!("6B175474E89094C44Da98b954EedeAC495271d0F");
    const USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
    const DAI_USDC: Address = address!("AE461cA67B15dc8dc81CE7615e0320dA1A9aB8D5");

    fn executor() -> RecipeExecutor {
        RecipeExecutor::new(
            FeeConfig::uniform([NetworkName::Ethereum], NetworkFees::new(25, 25)).unwrap(),
        )
    }

    fn big(v: &str) -> BigUint {
        BigUint::from_str(v).unwrap()
    }

    #[test_log::test(tokio::test)]
    async fn test_ledger_is_conserved_across_unshield_and_shield() {
        let input = RecipeInput::new(
            NetworkName::Ethereum,
            vec![RecipeERC20Amount::new(DAI, 18, BigUint::from(12_000u32))],
        );

        let output = executor()
            .execute(&Recipe::empty_transfer_base_token(), input)
            .await
            .unwrap();

        let names: Vec<&str> = output
            .step_outputs
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["Unshield", "Empty Transfer Base Token", "Shield"]);
        assert_eq!(
            output.step_outputs[0].output_erc20_amounts,
            vec![StepERC20Balance::new(DAI, 18, BigUint::from(11_970u32))]
        );
        assert_eq!(
            output.fee_erc20_amount_recipients,
            vec![
                FeeRecipientAmount::new(DAI, 18, BigUint::from(30u32), UNSHIELD_FEE_LABEL),
                FeeRecipientAmount::new(DAI, 18, BigUint::from(29u32), SHIELD_FEE_LABEL),
            ]
        );
        assert_eq!(
            output.erc20_amounts,
            vec![StepERC20Balance::new(DAI, 18, BigUint::from(11_941u32))]
        );
        assert_eq!(output.tokens_seen, vec![DAI]);
        assert_eq!(
            output.populated_transactions,
            vec![PopulatedTransaction::new(DEAD_ADDRESS, Vec::new())]
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_untouched_balances_pass_through_every_step() {
        let input = RecipeInput::new(
            NetworkName::Ethereum,
            vec![
                RecipeERC20Amount::new(DAI, 18, BigUint::from(10_000u32)),
                RecipeERC20Amount::base_token(18, BigUint::from(40_000u32)),
            ],
        );

        let output = executor()
            .execute(&Recipe::empty_transfer_base_token(), input)
            .await
            .unwrap();

        assert_eq!(
            output.erc20_amounts,
            vec![
                StepERC20Balance::new(DAI, 18, BigUint::from(9_951u32)),
                StepERC20Balance::new(Address::ZERO, 18, BigUint::from(39_801u32))
                    .with_base_token(true),
            ]
        );
        assert_eq!(output.fee_erc20_amount_recipients.len(), 4);
    }

    fn dai_usdc_reader() -> MockPairStateReader {
        let mut reader = MockPairStateReader::new();
        // DAI sorts before USDC, so reserve0 is DAI
        reader
            .expect_get_reserves()
            .returning(|_| Ok((big("20000000000000000000000000"), big("20000000000000"))));
        reader
            .expect_total_supply()
            .returning(|_| Ok(big("20000000000000000000")));
        reader
            .expect_k_last()
            .returning(|_| Ok(BigUint::from(0u8)));
        reader
            .expect_fee_to()
            .returning(|_| Ok(Address::ZERO));
        reader
    }

    #[test_log::test(tokio::test)]
    async fn test_combo_meal_plan() {
        let registry = DialectRegistry::default();
        let reader = dai_usdc_reader();
        let executor = executor();
        let ctx = PlanContext {
            network: NetworkName::Ethereum,
            registry: &registry,
            reader: &reader,
            fee_config: executor.fee_config(),
            recipient: Address::repeat_byte(0x42),
            deadline: 1_700_000_000,
            slippage_bps: 50,
        };
        let vault_address = Address::repeat_byte(0x77);
        let vault = VaultInfo {
            name: "Beefy".to_string(),
            vault_address,
            share_decimals: 18,
            deposit_token: DAI_USDC,
            deposit_decimals: 18,
            price_per_share: big("1000000000000000000"),
            deposit_fee_bps: 0,
            withdraw_fee_bps: 0,
        };
        let dai = PairToken { address: DAI, decimals: 18, symbol: "DAI".to_string() };
        let usdc = PairToken { address: USDC, decimals: 6, symbol: "USDC".to_string() };

        let prepared = ComboMeal::add_liquidity_and_deposit(
            &ctx,
            PoolDialect::UniswapV2,
            &dai,
            &big("1000000000000000000000"),
            &usdc,
            vault,
        )
        .await
        .unwrap();
        let output = executor
            .execute(&prepared.recipe, prepared.input)
            .await
            .unwrap();

        // approve DAI, approve USDC, add liquidity, approve LP, deposit
        assert_eq!(output.populated_transactions.len(), 5);
        assert_eq!(output.step_outputs.len(), 7);
        assert_eq!(output.tokens_seen, vec![DAI, USDC, DAI_USDC, vault_address]);
        let shares = output
            .erc20_amounts
            .iter()
            .find(|b| b.token_address == vault_address)
            .unwrap();
        // 997.5 of 20M DAI buys the same share of the 20 LP supply, minus the shield fee
        assert_eq!(shares.expected_balance, big("995006250000000"));
        assert!(output
            .erc20_amounts
            .iter()
            .all(|b| b.token_address != DAI_USDC));
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_approval_fails_the_whole_recipe() {
        let registry = DialectRegistry::default();
        let reader = dai_usdc_reader();
        let executor = executor();
        let ctx = PlanContext {
            network: NetworkName::Ethereum,
            registry: &registry,
            reader: &reader,
            fee_config: executor.fee_config(),
            recipient: Address::repeat_byte(0x42),
            deadline: 1_700_000_000,
            slippage_bps: 50,
        };
        let dai = PairToken { address: DAI, decimals: 18, symbol: "DAI".to_string() };
        let usdc = PairToken { address: USDC, decimals: 6, symbol: "USDC".to_string() };
        let mut prepared = Recipe::uni_v2_like_swap(
            &ctx,
            PoolDialect::UniswapV2,
            &dai,
            &big("1000000000000000000000"),
            &usdc,
        )
        .await
        .unwrap();
        // drop the router approval
        prepared.recipe.steps.remove(0);

        let err = executor
            .execute(&prepared.recipe, prepared.input)
            .await
            .unwrap_err();

        match err {
            RecipeError::StepFailed { index, name, source } => {
                assert_eq!(index, 1);
                assert_eq!(name, "Uniswap V2 Swap");
                assert!(matches!(source, StepError::NotApproved { .. }));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
