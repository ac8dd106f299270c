use alloy_primitives::Address;
use async_trait::async_trait;

use crate::{
    abi::encode_swap_exact_tokens_for_tokens,
    amm::{PoolDialect, SwapQuote},
    models::{
        token::{SpentERC20Amount, StepERC20Balance},
        transaction::PopulatedTransaction,
    },
    step::{
        require_approval, scale_min_output, Step, StepConfig, StepError, StepInput,
        UnvalidatedStepOutput,
    },
};

/// Direct swap through a UniswapV2 style router, sized by a prior [`SwapQuote`].
#[derive(Debug, Clone)]
pub struct UniV2LikeSwapStep {
    config: StepConfig,
    dialect: PoolDialect,
    quote: SwapQuote,
    recipient: Address,
    deadline: u64,
}

impl UniV2LikeSwapStep {
    pub fn new(dialect: PoolDialect, quote: SwapQuote, recipient: Address, deadline: u64) -> Self {
        Self {
            config: StepConfig::new(
                format!("{} Swap", dialect.display_name()),
                format!("Swaps an ERC20 token through a {} pool.", dialect.display_name()),
            ),
            dialect,
            quote,
            recipient,
            deadline,
        }
    }
}

#[async_trait]
impl Step for UniV2LikeSwapStep {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    async fn get_step_output(&self, input: &StepInput) -> Result<UnvalidatedStepOutput, StepError> {
        let sell = &self.quote.sell;
        let (sold, mut unused) = input.take_erc20(&sell.token_address, Some(&sell.amount))?;
        require_approval(&sold, &self.quote.router_address)?;

        let buy_min = scale_min_output(&self.quote.buy_min, &sold);
        let data = encode_swap_exact_tokens_for_tokens(
            &sell.amount,
            &buy_min,
            vec![sell.token_address, self.quote.buy.token_address],
            self.recipient,
            self.deadline,
        )?;

        let mut output = UnvalidatedStepOutput::with_nfts_from(input);
        output
            .populated_transactions
            .push(PopulatedTransaction::new(self.quote.router_address, data));
        output
            .spent_erc20_amounts
            .push(SpentERC20Amount::new(
                sell.token_address,
                sell.decimals,
                sell.amount.clone(),
                format!("{} Router", self.dialect.display_name()),
            ));
        unused.push(
            StepERC20Balance::new(
                self.quote.buy.token_address,
                self.quote.buy.decimals,
                self.quote.buy.amount.clone(),
            )
            .with_min_balance(buy_min),
        );
        output.output_erc20_amounts = unused;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;

    use super::*;
    use crate::{
        amm::get_amount_out,
        math::reduce_by_bps,
        models::{token::TokenAmount, NetworkName},
        step::run_step,
    };

    fn quote(router: Address) -> SwapQuote {
        let buy = get_amount_out(
            &BigUint::from(1_000u32),
            &BigUint::from(100_000u32),
            &BigUint::from(50_000u32),
        )
        .unwrap();
        SwapQuote {
            pair_address: Address::repeat_byte(0x99),
            router_address: router,
            sell: TokenAmount::new(Address::repeat_byte(0xaa), 18, BigUint::from(1_000u32)),
            buy_min: reduce_by_bps(&buy, 100),
            buy: TokenAmount::new(Address::repeat_byte(0xbb), 6, buy),
        }
    }

    #[tokio::test]
    async fn test_swap_requires_router_approval() {
        let router = Address::repeat_byte(0x01);
        let step = UniV2LikeSwapStep::new(PoolDialect::UniswapV2, quote(router), Address::repeat_byte(2), 1);
        let input = StepInput::new(
            NetworkName::Ethereum,
            vec![StepERC20Balance::new(Address::repeat_byte(0xaa), 18, BigUint::from(1_500u32))],
        );

        assert!(matches!(run_step(&step, &input).await, Err(StepError::NotApproved { .. })));
    }

    #[tokio::test]
    async fn test_swap_outputs_buy_token_and_remainder() {
        let router = Address::repeat_byte(0x01);
        let step = UniV2LikeSwapStep::new(PoolDialect::UniswapV2, quote(router), Address::repeat_byte(2), 1);
        let input = StepInput::new(
            NetworkName::Ethereum,
            vec![StepERC20Balance::new(Address::repeat_byte(0xaa), 18, BigUint::from(1_500u32))
                .with_approved_spender(Some(router))],
        );

        let output = run_step(&step, &input)
            .await
            .unwrap();

        assert_eq!(output.name, "Uniswap V2 Swap");
        assert_eq!(output.output_erc20_amounts.len(), 2);
        assert_eq!(output.output_erc20_amounts[0].expected_balance, BigUint::from(500u32));
        // 1000 * 997 * 50000 / (100000 * 1000 + 997000)
        assert_eq!(output.output_erc20_amounts[1].expected_balance, BigUint::from(493u32));
        assert_eq!(output.output_erc20_amounts[1].min_balance, BigUint::from(488u32));
        assert_eq!(output.populated_transactions[0].to, router);
    }
}
