use alloy_primitives::Address;
use async_trait::async_trait;

use crate::{
    abi::{encode_add_liquidity, encode_remove_liquidity, AddLiquidityCall},
    amm::{AddLiquidityQuote, PoolDialect, RemoveLiquidityQuote},
    models::{
        token::{SpentERC20Amount, StepERC20Balance},
        transaction::PopulatedTransaction,
    },
    step::{
        require_approval, scale_min_output, Step, StepConfig, StepError, StepInput,
        UnvalidatedStepOutput,
    },
};

/// Adds both sides of a quoted position to a UniswapV2 style pool.
#[derive(Debug, Clone)]
pub struct UniV2LikeAddLiquidityStep {
    config: StepConfig,
    dialect: PoolDialect,
    quote: AddLiquidityQuote,
    recipient: Address,
    deadline: u64,
}

impl UniV2LikeAddLiquidityStep {
    pub fn new(
        dialect: PoolDialect,
        quote: AddLiquidityQuote,
        recipient: Address,
        deadline: u64,
    ) -> Self {
        Self {
            config: StepConfig::new(
                format!("{} Add Liquidity", dialect.display_name()),
                format!("Adds liquidity to a {} pool.", dialect.display_name()),
            ),
            dialect,
            quote,
            recipient,
            deadline,
        }
    }
}

#[async_trait]
impl Step for UniV2LikeAddLiquidityStep {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    async fn get_step_output(&self, input: &StepInput) -> Result<UnvalidatedStepOutput, StepError> {
        let quote = &self.quote;
        let (used_a, rest) =
            input.take_erc20(&quote.token_a.token_address, Some(&quote.token_a.amount))?;
        let (used_b, mut unused) = StepInput::new(input.network, rest)
            .take_erc20(&quote.token_b.token_address, Some(&quote.token_b.amount))?;
        require_approval(&used_a, &quote.router_address)?;
        require_approval(&used_b, &quote.router_address)?;

        let lp_min = std::cmp::min(
            scale_min_output(&quote.lp_min, &used_a),
            scale_min_output(&quote.lp_min, &used_b),
        );
        let data = encode_add_liquidity(AddLiquidityCall {
            token_a: quote.token_a.token_address,
            token_b: quote.token_b.token_address,
            amount_a: (&quote.token_a.amount, &quote.token_a_min),
            amount_b: (&quote.token_b.amount, &quote.token_b_min),
            to: self.recipient,
            deadline: self.deadline,
        })?;

        let pool = format!("{} Pool", self.dialect.display_name());
        let mut output = UnvalidatedStepOutput::with_nfts_from(input);
        output
            .populated_transactions
            .push(PopulatedTransaction::new(quote.router_address, data));
        output.spent_erc20_amounts = [&quote.token_a, &quote.token_b]
            .into_iter()
            .map(|t| SpentERC20Amount::new(t.token_address, t.decimals, t.amount.clone(), &pool))
            .collect();
        unused.push(
            StepERC20Balance::new(quote.lp.token_address, quote.lp.decimals, quote.lp.amount.clone())
                .with_min_balance(lp_min),
        );
        output.output_erc20_amounts = unused;
        Ok(output)
    }
}

/// Redeems a quoted amount of LP token for both underlying tokens.
#[derive(Debug, Clone)]
pub struct UniV2LikeRemoveLiquidityStep {
    config: StepConfig,
    dialect: PoolDialect,
    quote: RemoveLiquidityQuote,
    recipient: Address,
    deadline: u64,
}

impl UniV2LikeRemoveLiquidityStep {
    pub fn new(
        dialect: PoolDialect,
        quote: RemoveLiquidityQuote,
        recipient: Address,
        deadline: u64,
    ) -> Self {
        Self {
            config: StepConfig::new(
                format!("{} Remove Liquidity", dialect.display_name()),
                format!("Removes liquidity from a {} pool.", dialect.display_name()),
            ),
            dialect,
            quote,
            recipient,
            deadline,
        }
    }
}

#[async_trait]
impl Step for UniV2LikeRemoveLiquidityStep {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    async fn get_step_output(&self, input: &StepInput) -> Result<UnvalidatedStepOutput, StepError> {
        let quote = &self.quote;
        let (lp, mut unused) = input.take_erc20(&quote.pair_address, Some(&quote.lp.amount))?;
        require_approval(&lp, &quote.router_address)?;

        let min_a = scale_min_output(&quote.token_a_min, &lp);
        let min_b = scale_min_output(&quote.token_b_min, &lp);
        let data = encode_remove_liquidity(
            quote.token_a.token_address,
            quote.token_b.token_address,
            &quote.lp.amount,
            (&min_a, &min_b),
            self.recipient,
            self.deadline,
        )?;

        let mut output = UnvalidatedStepOutput::with_nfts_from(input);
        output
            .populated_transactions
            .push(PopulatedTransaction::new(quote.router_address, data));
        output
            .spent_erc20_amounts
            .push(SpentERC20Amount::new(
                lp.token_address,
                lp.decimals,
                quote.lp.amount.clone(),
                format!("{} Pool", self.dialect.display_name()),
            ));
        for (token, min) in [(&quote.token_a, min_a), (&quote.token_b, min_b)] {
            unused.push(
                StepERC20Balance::new(token.token_address, token.decimals, token.amount.clone())
                    .with_min_balance(min),
            );
        }
        output.output_erc20_amounts = unused;
        Ok(output)
    }
}
