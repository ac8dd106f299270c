//! Steps: the atomic, self-validating units a recipe is built from.
//!
//! A step receives a ledger snapshot ([`StepInput`]) and declares what it spends, what it outputs,
//! which fees it charges and which transactions it needs executed. Raw step output is only
//! accepted into the ledger through [`run_step`], which validates it first.

mod approve;
mod errors;
mod fee;
mod liquidity;
mod swap;
mod transfer;
mod validate;
mod vault;
mod wrap;

use std::fmt::Debug;

use alloy_primitives::Address;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub use self::{
    approve::ApproveERC20SpenderStep,
    errors::StepError,
    fee::{ShieldDefaultStep, UnshieldDefaultStep, SHIELD_FEE_LABEL, UNSHIELD_FEE_LABEL},
    liquidity::{UniV2LikeAddLiquidityStep, UniV2LikeRemoveLiquidityStep},
    swap::UniV2LikeSwapStep,
    transfer::{EmptyTransferBaseTokenStep, TransferERC20Step, DEAD_ADDRESS},
    vault::{VaultDepositStep, VaultInfo, VaultRedeemStep},
    wrap::{UnwrapBaseTokenStep, WrapBaseTokenStep},
};
use crate::models::{
    format_address,
    nft::NFTAmount,
    token::{FeeRecipientAmount, SpentERC20Amount, StepERC20Balance},
    transaction::PopulatedTransaction,
    NetworkName,
};

/// Static description of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepConfig {
    pub name: String,
    pub description: String,
}

impl StepConfig {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into() }
    }
}

/// The ledger snapshot a step runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInput {
    pub network: NetworkName,
    pub erc20_amounts: Vec<StepERC20Balance>,
    pub nfts: Vec<NFTAmount>,
}

impl StepInput {
    pub fn new(network: NetworkName, erc20_amounts: Vec<StepERC20Balance>) -> Self {
        Self { network, erc20_amounts, nfts: Vec::new() }
    }

    pub fn with_nfts(mut self, nfts: Vec<NFTAmount>) -> Self {
        self.nfts = nfts;
        self
    }

    /// Separates the balance of `token` from everything else in the ledger.
    ///
    /// All entries of `token` are merged into one; the merged entry keeps an approved spender
    /// only if every entry had that same spender. `amount` selects part of the balance; `None`
    /// takes all of it. The returned remainders keep ledger order, with the leftover of `token`,
    /// if any, at the position of its first entry.
    pub fn take_erc20(
        &self,
        token: &Address,
        amount: Option<&BigUint>,
    ) -> Result<(StepERC20Balance, Vec<StepERC20Balance>), StepError> {
        let position = self
            .erc20_amounts
            .iter()
            .position(|b| b.token_address == *token)
            .ok_or_else(|| StepError::MissingToken(format_address(token)))?;

        let mut entry = self.erc20_amounts[position].clone();
        for other in self.erc20_amounts[position + 1..]
            .iter()
            .filter(|b| b.token_address == *token)
        {
            entry.expected_balance += &other.expected_balance;
            entry.min_balance += &other.min_balance;
            if entry.approved_spender != other.approved_spender {
                entry.approved_spender = None;
            }
        }
        let entry = &entry;
        let mut unused = Vec::with_capacity(self.erc20_amounts.len());
        unused.extend_from_slice(&self.erc20_amounts[..position]);

        let used = match amount {
            None => entry.clone(),
            Some(amount) => {
                if *amount > entry.expected_balance {
                    return Err(StepError::InsufficientBalance {
                        token: format_address(token),
                        requested: amount.clone(),
                        available: entry.expected_balance.clone(),
                    });
                }
                let used_min = std::cmp::min(amount, &entry.min_balance).clone();
                let leftover = StepERC20Balance {
                    expected_balance: &entry.expected_balance - amount,
                    min_balance: &entry.min_balance - &used_min,
                    // allowance does not carry over to what is left
                    approved_spender: None,
                    ..entry.clone()
                };
                if !leftover.expected_balance.is_zero() {
                    unused.push(leftover);
                }
                StepERC20Balance {
                    expected_balance: amount.clone(),
                    min_balance: used_min,
                    ..entry.clone()
                }
            }
        };
        unused.extend(
            self.erc20_amounts[position + 1..]
                .iter()
                .filter(|b| b.token_address != *token)
                .cloned(),
        );
        Ok((used, unused))
    }
}

/// Ensures `balance` can be pulled by `spender`.
pub fn require_approval(balance: &StepERC20Balance, spender: &Address) -> Result<(), StepError> {
    if balance.approved_spender.as_ref() != Some(spender) {
        return Err(StepError::NotApproved {
            token: format_address(&balance.token_address),
            spender: format_address(spender),
        });
    }
    Ok(())
}

/// Carries upstream slippage into a derived minimum: `out_min * used.min / used.expected`.
pub fn scale_min_output(out_min: &BigUint, used: &StepERC20Balance) -> BigUint {
    if used.expected_balance.is_zero() {
        return out_min.clone();
    }
    out_min * &used.min_balance / &used.expected_balance
}

/// Unix timestamp `minutes` from now, for router deadlines.
pub fn deadline_in(minutes: i64) -> Result<u64, StepError> {
    let out_of_range =
        || StepError::InvalidParameter(format!("deadline {minutes} minutes from now is out of range"));
    let deadline = Duration::try_minutes(minutes)
        .and_then(|d| Utc::now().checked_add_signed(d))
        .ok_or_else(out_of_range)?;
    u64::try_from(deadline.timestamp()).map_err(|_| out_of_range())
}

/// What a step declares before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnvalidatedStepOutput {
    pub populated_transactions: Vec<PopulatedTransaction>,
    pub spent_erc20_amounts: Vec<SpentERC20Amount>,
    pub output_erc20_amounts: Vec<StepERC20Balance>,
    pub spent_nfts: Vec<NFTAmount>,
    pub output_nfts: Vec<NFTAmount>,
    pub fee_erc20_amount_recipients: Vec<FeeRecipientAmount>,
}

impl UnvalidatedStepOutput {
    /// Output that passes all NFTs through untouched.
    pub fn with_nfts_from(input: &StepInput) -> Self {
        Self { output_nfts: input.nfts.clone(), ..Default::default() }
    }
}

/// A step's validated output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutput {
    pub name: String,
    pub description: String,
    pub populated_transactions: Vec<PopulatedTransaction>,
    pub spent_erc20_amounts: Vec<SpentERC20Amount>,
    pub output_erc20_amounts: Vec<StepERC20Balance>,
    pub spent_nfts: Vec<NFTAmount>,
    pub output_nfts: Vec<NFTAmount>,
    pub fee_erc20_amount_recipients: Vec<FeeRecipientAmount>,
}

impl StepOutput {
    fn new(config: &StepConfig, output: UnvalidatedStepOutput) -> Self {
        Self {
            name: config.name.clone(),
            description: config.description.clone(),
            populated_transactions: output.populated_transactions,
            spent_erc20_amounts: output.spent_erc20_amounts,
            output_erc20_amounts: output.output_erc20_amounts,
            spent_nfts: output.spent_nfts,
            output_nfts: output.output_nfts,
            fee_erc20_amount_recipients: output.fee_erc20_amount_recipients,
        }
    }

    /// The ledger snapshot handed to the next step.
    pub fn next_input(&self, network: NetworkName) -> StepInput {
        StepInput {
            network,
            erc20_amounts: self.output_erc20_amounts.clone(),
            nfts: self.output_nfts.clone(),
        }
    }
}

/// A unit of plan construction.
///
/// Implementations must list every token they consume in `spent_erc20_amounts` and re-emit every
/// other input balance unchanged.
#[async_trait]
pub trait Step: Send + Sync + Debug {
    fn config(&self) -> &StepConfig;

    async fn get_step_output(&self, input: &StepInput) -> Result<UnvalidatedStepOutput, StepError>;
}

/// Runs `step` against `input` and validates what it declares.
#[instrument(skip_all, fields(step = %step.config().name, network = %input.network))]
pub async fn run_step(step: &dyn Step, input: &StepInput) -> Result<StepOutput, StepError> {
    let config = step.config();
    let raw = step.get_step_output(input).await?;
    validate::validate_step_output(&config.name, input, &raw)?;
    debug!(
        spent = raw.spent_erc20_amounts.len(),
        outputs = raw.output_erc20_amounts.len(),
        transactions = raw.populated_transactions.len(),
        "Step output accepted"
    );
    Ok(StepOutput::new(config, raw))
}
