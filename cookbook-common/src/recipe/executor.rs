use std::{collections::HashSet, iter};

use alloy_primitives::Address;
use tracing::{debug, info, instrument};

use crate::{
    fees::FeeConfig,
    models::{format_address, nft::NFTAmount},
    recipe::{Recipe, RecipeError, RecipeInput, RecipeOutput},
    step::{run_step, ShieldDefaultStep, Step, StepInput, StepOutput, UnshieldDefaultStep},
};

/// Runs recipes: unshields the input, threads the ledger through every step in order, shields what
/// is left and flattens the result into one plan.
#[derive(Debug, Clone)]
pub struct RecipeExecutor {
    fee_config: FeeConfig,
}

impl RecipeExecutor {
    pub fn new(fee_config: FeeConfig) -> Self {
        Self { fee_config }
    }

    pub fn fee_config(&self) -> &FeeConfig {
        &self.fee_config
    }

    /// Runs `recipe` against `input`. Any failing step fails the whole recipe; no partial plan
    /// is ever returned.
    #[instrument(skip_all, fields(recipe = %recipe.config.name, network = %input.network))]
    pub async fn execute(
        &self,
        recipe: &Recipe,
        input: RecipeInput,
    ) -> Result<RecipeOutput, RecipeError> {
        let network = input.network;
        if !recipe.supports_network(network) {
            return Err(RecipeError::UnsupportedNetwork {
                recipe: recipe.config.name.clone(),
                network,
            });
        }
        self.fee_config
            .network_fees(network)?;

        let unshield = UnshieldDefaultStep::new(self.fee_config.clone());
        let shield = ShieldDefaultStep::new(self.fee_config.clone());
        let steps = iter::once(&unshield as &dyn Step)
            .chain(recipe.steps.iter().map(|s| s.as_ref()))
            .chain(iter::once(&shield as &dyn Step));

        let initial = StepInput {
            network,
            erc20_amounts: input
                .erc20_amounts
                .into_iter()
                .map(Into::into)
                .collect(),
            nfts: input.nfts,
        };
        let mut current = initial.clone();
        let mut step_outputs: Vec<StepOutput> = Vec::with_capacity(recipe.steps.len() + 2);
        for (index, step) in steps.enumerate() {
            debug!(index, step = %step.config().name, "Running step");
            let output = run_step(step, &current)
                .await
                .map_err(|source| RecipeError::StepFailed {
                    index,
                    name: step.config().name.clone(),
                    source,
                })?;
            current = output.next_input(network);
            step_outputs.push(output);
        }

        // the closing shield only re-emits; whatever it returns must have come from earlier
        let before_shield = step_outputs.len().saturating_sub(1);
        let known = tokens_seen(&initial, &step_outputs[..before_shield]);
        check_token_conservation(&recipe.config.name, &known, &current)?;
        let tokens_seen = tokens_seen(&initial, &step_outputs);
        let populated_transactions = step_outputs
            .iter()
            .flat_map(|o| o.populated_transactions.iter().cloned())
            .collect::<Vec<_>>();
        let fee_erc20_amount_recipients = step_outputs
            .iter()
            .flat_map(|o| o.fee_erc20_amount_recipients.iter().cloned())
            .collect();
        info!(
            steps = step_outputs.len(),
            transactions = populated_transactions.len(),
            "Recipe plan assembled"
        );

        Ok(RecipeOutput {
            name: recipe.config.name.clone(),
            nfts_seen: nfts_seen(&initial, &step_outputs),
            step_outputs,
            erc20_amounts: current.erc20_amounts,
            nfts: current.nfts,
            tokens_seen,
            populated_transactions,
            fee_erc20_amount_recipients,
        })
    }
}

/// Initial tokens followed by every token any step output, first appearance first.
fn tokens_seen(initial: &StepInput, outputs: &[StepOutput]) -> Vec<Address> {
    let mut seen = HashSet::new();
    initial
        .erc20_amounts
        .iter()
        .chain(
            outputs
                .iter()
                .flat_map(|o| o.output_erc20_amounts.iter()),
        )
        .map(|b| b.token_address)
        .filter(|t| seen.insert(*t))
        .collect()
}

fn nfts_seen(initial: &StepInput, outputs: &[StepOutput]) -> Vec<NFTAmount> {
    let mut seen: Vec<NFTAmount> = Vec::new();
    let all = initial
        .nfts
        .iter()
        .chain(
            outputs
                .iter()
                .flat_map(|o| o.output_nfts.iter()),
        );
    for nft in all {
        if !seen.iter().any(|s| s.same_asset(nft)) {
            seen.push(nft.clone());
        }
    }
    seen
}

/// Every token in the final ledger was either present at the start or produced by a step.
fn check_token_conservation(
    recipe: &str,
    known: &[Address],
    last: &StepInput,
) -> Result<(), RecipeError> {
    match last
        .erc20_amounts
        .iter()
        .find(|b| !known.contains(&b.token_address))
    {
        Some(b) => Err(RecipeError::InvariantViolation {
            recipe: recipe.to_string(),
            msg: format!("token {} appeared from nowhere", format_address(&b.token_address)),
        }),
        None => Ok(()),
    }
}
