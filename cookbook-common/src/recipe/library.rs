use alloy_primitives::Address;
use num_bigint::BigUint;
use strum::IntoEnumIterator;
use tracing::instrument;

use crate::{
    amm::{
        derive_pair_address, get_add_liquidity_quote, get_remove_liquidity_quote, get_swap_quote,
        DialectRegistry, PairToken, PoolDialect, LP_DECIMALS,
    },
    fees::{amount_after_fee, gross_for_net, FeeConfig},
    models::{format_address, token::RecipeERC20Amount, NetworkName},
    recipe::{ComboMeal, Recipe, RecipeConfig, RecipeError, RecipeInput},
    step::{
        ApproveERC20SpenderStep, EmptyTransferBaseTokenStep, Step, UniV2LikeAddLiquidityStep,
        UniV2LikeRemoveLiquidityStep, UniV2LikeSwapStep, VaultDepositStep, VaultInfo,
        VaultRedeemStep,
    },
    traits::PairStateReader,
};

/// Everything a recipe constructor needs to size its steps against live pool state.
pub struct PlanContext<'a, R: ?Sized> {
    pub network: NetworkName,
    pub registry: &'a DialectRegistry,
    pub reader: &'a R,
    pub fee_config: &'a FeeConfig,
    /// Receives swap outputs, LP tokens and vault shares.
    pub recipient: Address,
    /// Router deadline as a unix timestamp.
    pub deadline: u64,
    pub slippage_bps: u32,
}

impl<'a, R: ?Sized> PlanContext<'a, R> {
    /// What is left of `gross` once the unshield fee is taken.
    fn unshielded(&self, gross: &BigUint) -> Result<BigUint, RecipeError> {
        Ok(amount_after_fee(gross, self.fee_config.unshield_bps(self.network)?))
    }

    /// How much has to be unshielded for `net` to remain after the fee.
    fn to_unshield(&self, net: &BigUint) -> Result<BigUint, RecipeError> {
        Ok(gross_for_net(net, self.fee_config.unshield_bps(self.network)?))
    }
}

/// A recipe together with the private balances it has been sized for.
#[derive(Debug)]
pub struct PreparedRecipe {
    pub recipe: Recipe,
    pub input: RecipeInput,
}

fn approve_router(
    dialect: PoolDialect,
    router: Address,
    token: Address,
) -> Box<dyn Step> {
    Box::new(ApproveERC20SpenderStep::new(
        router,
        &format!("{} Router", dialect.display_name()),
        token,
        None,
    ))
}

impl Recipe {
    /// A plan that does nothing but unshield and shield again, with one zero value call between.
    pub fn empty_transfer_base_token() -> Self {
        Recipe::new(
            RecipeConfig::new(
                "Empty Transfer Base Token",
                "Unshields, sends a zero value base token transfer and shields again.",
            ),
            NetworkName::iter().collect(),
            vec![Box::new(EmptyTransferBaseTokenStep::default())],
        )
    }

    /// Sells `amount` of `sell` for `buy` in a single pool. The swap is sized on what remains
    /// after the unshield fee.
    #[instrument(skip_all, fields(%dialect, network = %ctx.network, %amount))]
    pub async fn uni_v2_like_swap<R: PairStateReader + ?Sized>(
        ctx: &PlanContext<'_, R>,
        dialect: PoolDialect,
        sell: &PairToken,
        amount: &BigUint,
        buy: &PairToken,
    ) -> Result<PreparedRecipe, RecipeError> {
        let sell_amount = ctx.unshielded(amount)?;
        let quote = get_swap_quote(
            ctx.registry,
            ctx.reader,
            dialect,
            ctx.network,
            sell,
            &sell_amount,
            buy,
            ctx.slippage_bps,
        )
        .await?;

        let recipe = Recipe::new(
            RecipeConfig::new(
                format!("{} Swap", dialect.display_name()),
                format!("Swaps {} for {} on {}.", sell.symbol, buy.symbol, dialect.display_name()),
            ),
            ctx.registry.networks(dialect),
            vec![
                approve_router(dialect, quote.router_address, sell.address),
                Box::new(UniV2LikeSwapStep::new(dialect, quote, ctx.recipient, ctx.deadline)),
            ],
        );
        let input = RecipeInput::new(
            ctx.network,
            vec![RecipeERC20Amount::new(sell.address, sell.decimals, amount.clone())],
        );
        Ok(PreparedRecipe { recipe, input })
    }

    /// Adds `amount_a` of `token_a` plus the matching amount of `token_b` to their pool.
    ///
    /// Token B's input is grossed up so the post-unshield amount covers the quote exactly.
    #[instrument(skip_all, fields(%dialect, network = %ctx.network, %amount_a))]
    pub async fn uni_v2_like_add_liquidity<R: PairStateReader + ?Sized>(
        ctx: &PlanContext<'_, R>,
        dialect: PoolDialect,
        token_a: &PairToken,
        amount_a: &BigUint,
        token_b: &PairToken,
    ) -> Result<PreparedRecipe, RecipeError> {
        let net_a = ctx.unshielded(amount_a)?;
        let quote = get_add_liquidity_quote(
            ctx.registry,
            ctx.reader,
            dialect,
            ctx.network,
            token_a,
            &net_a,
            token_b,
            ctx.slippage_bps,
        )
        .await?;
        let amount_b = ctx.to_unshield(&quote.token_b.amount)?;

        let recipe = Recipe::new(
            RecipeConfig::new(
                format!("{} Add Liquidity", dialect.display_name()),
                format!(
                    "Adds liquidity to the {}-{} pool on {}.",
                    token_a.symbol,
                    token_b.symbol,
                    dialect.display_name()
                ),
            ),
            ctx.registry.networks(dialect),
            vec![
                approve_router(dialect, quote.router_address, token_a.address),
                approve_router(dialect, quote.router_address, token_b.address),
                Box::new(UniV2LikeAddLiquidityStep::new(
                    dialect,
                    quote,
                    ctx.recipient,
                    ctx.deadline,
                )),
            ],
        );
        let input = RecipeInput::new(
            ctx.network,
            vec![
                RecipeERC20Amount::new(token_a.address, token_a.decimals, amount_a.clone()),
                RecipeERC20Amount::new(token_b.address, token_b.decimals, amount_b),
            ],
        );
        Ok(PreparedRecipe { recipe, input })
    }

    /// Redeems `lp_amount` of the `token_a`/`token_b` LP token for both underlying tokens.
    #[instrument(skip_all, fields(%dialect, network = %ctx.network, %lp_amount))]
    pub async fn uni_v2_like_remove_liquidity<R: PairStateReader + ?Sized>(
        ctx: &PlanContext<'_, R>,
        dialect: PoolDialect,
        lp_amount: &BigUint,
        token_a: &PairToken,
        token_b: &PairToken,
    ) -> Result<PreparedRecipe, RecipeError> {
        let net_lp = ctx.unshielded(lp_amount)?;
        let quote = get_remove_liquidity_quote(
            ctx.registry,
            ctx.reader,
            dialect,
            ctx.network,
            &net_lp,
            token_a,
            token_b,
            ctx.slippage_bps,
        )
        .await?;
        let pair_address = quote.pair_address;

        let recipe = Recipe::new(
            RecipeConfig::new(
                format!("{} Remove Liquidity", dialect.display_name()),
                format!(
                    "Removes liquidity from the {}-{} pool on {}.",
                    token_a.symbol,
                    token_b.symbol,
                    dialect.display_name()
                ),
            ),
            ctx.registry.networks(dialect),
            vec![
                approve_router(dialect, quote.router_address, pair_address),
                Box::new(UniV2LikeRemoveLiquidityStep::new(
                    dialect,
                    quote,
                    ctx.recipient,
                    ctx.deadline,
                )),
            ],
        );
        let input = RecipeInput::new(
            ctx.network,
            vec![RecipeERC20Amount::new(pair_address, LP_DECIMALS, lp_amount.clone())],
        );
        Ok(PreparedRecipe { recipe, input })
    }

    /// Deposits everything held of the vault's deposit token.
    pub fn vault_deposit(network: NetworkName, vault: VaultInfo, recipient: Address) -> Self {
        Recipe::new(
            RecipeConfig::new(
                format!("{} Vault Deposit", vault.name),
                format!("Approves and deposits into the {} vault.", vault.name),
            ),
            vec![network],
            vec![
                Box::new(ApproveERC20SpenderStep::new(
                    vault.vault_address,
                    &format!("{} Vault", vault.name),
                    vault.deposit_token,
                    None,
                )),
                Box::new(VaultDepositStep::new(vault, None, recipient)),
            ],
        )
    }

    /// Redeems every share held of the vault.
    pub fn vault_redeem(network: NetworkName, vault: VaultInfo, recipient: Address) -> Self {
        Recipe::new(
            RecipeConfig::new(
                format!("{} Vault Redeem", vault.name),
                format!("Redeems shares of the {} vault.", vault.name),
            ),
            vec![network],
            vec![Box::new(VaultRedeemStep::new(vault, None, recipient))],
        )
    }
}

impl ComboMeal {
    /// Adds liquidity and deposits the resulting LP token into a vault that accepts it.
    #[instrument(skip_all, fields(%dialect, network = %ctx.network, vault = %vault.name))]
    pub async fn add_liquidity_and_deposit<R: PairStateReader + ?Sized>(
        ctx: &PlanContext<'_, R>,
        dialect: PoolDialect,
        token_a: &PairToken,
        amount_a: &BigUint,
        token_b: &PairToken,
        vault: VaultInfo,
    ) -> Result<PreparedRecipe, RecipeError> {
        let identity = ctx
            .registry
            .get(dialect, ctx.network)?;
        let pair_address = derive_pair_address(identity, token_a.address, token_b.address)?;
        if vault.deposit_token != pair_address {
            return Err(RecipeError::InvalidParameter(format!(
                "vault {} takes {}, not the {} LP token {}",
                vault.name,
                format_address(&vault.deposit_token),
                dialect.display_name(),
                format_address(&pair_address)
            )));
        }

        let add = Recipe::uni_v2_like_add_liquidity(ctx, dialect, token_a, amount_a, token_b).await?;
        let meal = ComboMeal::new(
            RecipeConfig::new(
                format!("{} Add Liquidity + {} Vault Deposit", dialect.display_name(), vault.name),
                format!(
                    "Adds liquidity to the {}-{} pool and deposits the LP token into the {} vault.",
                    token_a.symbol, token_b.symbol, vault.name
                ),
            ),
            vec![add.recipe, Recipe::vault_deposit(ctx.network, vault, ctx.recipient)],
        );
        Ok(PreparedRecipe { recipe: meal.into_recipe(), input: add.input })
    }
}
