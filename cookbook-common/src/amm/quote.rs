use alloy_primitives::Address;
use futures03::try_join;
use num_bigint::BigUint;
use num_traits::Zero;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::{
    amm::{
        check_slippage, derive_pair_address, sort_tokens, AmmError, DialectRegistry, PairState,
        PairToken, PoolDialect, PoolIdentity, LP_DECIMALS,
    },
    fees::{diluting_fee_lp_amount, ProtocolFeeInputs},
    math::{pow10, reduce_by_bps},
    models::{format_address, token::TokenAmount, NetworkName},
    serde_primitives::biguint_string,
    traits::PairStateReader,
};

/// How many units of token A one unit of token B is worth, scaled to 18 decimals.
///
/// All multiplications happen before any division. Returns `None` when `reserve_b` is zero.
pub fn rate(
    reserve_a: &BigUint,
    decimals_a: u8,
    reserve_b: &BigUint,
    decimals_b: u8,
) -> Option<BigUint> {
    if reserve_b.is_zero() {
        return None;
    }
    let scaled = reserve_a * pow10(18) * pow10(decimals_b.into());
    Some(scaled / reserve_b / pow10(decimals_a.into()))
}

/// Reads reserves, total supply, `kLast` and the factory's fee recipient concurrently.
///
/// Reserves are returned in `(token_a, token_b)` order. If any read fails the whole state does.
pub async fn read_pair_state<R: PairStateReader + ?Sized>(
    reader: &R,
    identity: &PoolIdentity,
    pair_address: Address,
    token_a: Address,
    token_b: Address,
) -> Result<PairState, AmmError> {
    let ((reserve0, reserve1), total_supply, k_last, fee_to) = try_join!(
        reader.get_reserves(pair_address),
        reader.total_supply(pair_address),
        reader.k_last(pair_address),
        reader.fee_to(identity.factory_address),
    )?;
    let (reserve_a, reserve_b) = orient(token_a, token_b, reserve0, reserve1);

    Ok(PairState { reserve_a, reserve_b, total_supply, k_last, fee_on: !fee_to.is_zero() })
}

fn orient(
    token_a: Address,
    token_b: Address,
    reserve0: BigUint,
    reserve1: BigUint,
) -> (BigUint, BigUint) {
    if sort_tokens(token_a, token_b).0 == token_a {
        (reserve0, reserve1)
    } else {
        (reserve1, reserve0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddLiquidityQuote {
    pub pair_address: Address,
    pub router_address: Address,
    pub token_a: TokenAmount,
    #[serde(with = "biguint_string")]
    pub token_a_min: BigUint,
    /// Amount of token B matching `token_a` at the current reserve ratio.
    pub token_b: TokenAmount,
    #[serde(with = "biguint_string")]
    pub token_b_min: BigUint,
    /// Expected LP token output. The LP token lives at the pair address.
    pub lp: TokenAmount,
    #[serde(with = "biguint_string")]
    pub lp_min: BigUint,
    #[serde(with = "biguint_string")]
    pub fee_lp_amount: BigUint,
}

/// Quotes adding `amount_a` of `token_a` to the `token_a`/`token_b` pool.
///
/// The pending protocol fee is added to the total supply before sizing the LP output.
#[instrument(skip_all, fields(%dialect, %network, token_a = %format_address(&token_a.address), %amount_a))]
#[allow(clippy::too_many_arguments)]
pub async fn get_add_liquidity_quote<R: PairStateReader + ?Sized>(
    registry: &DialectRegistry,
    reader: &R,
    dialect: PoolDialect,
    network: NetworkName,
    token_a: &PairToken,
    amount_a: &BigUint,
    token_b: &PairToken,
    slippage_bps: u32,
) -> Result<AddLiquidityQuote, AmmError> {
    let identity = registry.get(dialect, network)?;
    check_slippage(slippage_bps)?;
    let pair_address = derive_pair_address(identity, token_a.address, token_b.address)?;

    let state =
        read_pair_state(reader, identity, pair_address, token_a.address, token_b.address).await?;
    if state.reserve_a.is_zero() || state.reserve_b.is_zero() || state.total_supply.is_zero() {
        return Err(AmmError::EmptyReserves(format_address(&pair_address)));
    }

    let fee_lp_amount = diluting_fee_lp_amount(
        &ProtocolFeeInputs {
            reserve_a: &state.reserve_a,
            reserve_b: &state.reserve_b,
            total_supply: &state.total_supply,
            k_last: &state.k_last,
            fee_on: state.fee_on,
        },
        identity.protocol_fee_share,
    );
    let new_total_supply = &state.total_supply + &fee_lp_amount;
    let expected_lp = amount_a * &new_total_supply / &state.reserve_a;
    let amount_b = &expected_lp * &state.reserve_b / &new_total_supply;
    debug!(%expected_lp, %amount_b, %fee_lp_amount, "Add liquidity quote");

    Ok(AddLiquidityQuote {
        pair_address,
        router_address: identity.router_address,
        token_a_min: reduce_by_bps(amount_a, slippage_bps),
        token_a: TokenAmount::new(token_a.address, token_a.decimals, amount_a.clone()),
        token_b_min: reduce_by_bps(&amount_b, slippage_bps),
        token_b: TokenAmount::new(token_b.address, token_b.decimals, amount_b),
        lp_min: reduce_by_bps(&expected_lp, slippage_bps),
        lp: TokenAmount::new(pair_address, LP_DECIMALS, expected_lp),
        fee_lp_amount,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoveLiquidityQuote {
    pub pair_address: Address,
    pub router_address: Address,
    pub lp: TokenAmount,
    pub token_a: TokenAmount,
    #[serde(with = "biguint_string")]
    pub token_a_min: BigUint,
    pub token_b: TokenAmount,
    #[serde(with = "biguint_string")]
    pub token_b_min: BigUint,
    #[serde(with = "biguint_string")]
    pub fee_lp_amount: BigUint,
}

/// Quotes redeeming `lp_amount` of the `token_a`/`token_b` LP token.
///
/// The pending protocol fee is taken out of the redeemed LP amount rather than added to the total
/// supply, so this is not the exact inverse of [`get_add_liquidity_quote`] when a fee is pending.
#[instrument(skip_all, fields(%dialect, %network, %lp_amount))]
#[allow(clippy::too_many_arguments)]
pub async fn get_remove_liquidity_quote<R: PairStateReader + ?Sized>(
    registry: &DialectRegistry,
    reader: &R,
    dialect: PoolDialect,
    network: NetworkName,
    lp_amount: &BigUint,
    token_a: &PairToken,
    token_b: &PairToken,
    slippage_bps: u32,
) -> Result<RemoveLiquidityQuote, AmmError> {
    let identity = registry.get(dialect, network)?;
    check_slippage(slippage_bps)?;
    let pair_address = derive_pair_address(identity, token_a.address, token_b.address)?;

    let state =
        read_pair_state(reader, identity, pair_address, token_a.address, token_b.address).await?;
    if state.total_supply.is_zero() {
        return Err(AmmError::EmptyReserves(format_address(&pair_address)));
    }

    let fee_lp_amount = diluting_fee_lp_amount(
        &ProtocolFeeInputs {
            reserve_a: &state.reserve_a,
            reserve_b: &state.reserve_b,
            total_supply: &state.total_supply,
            k_last: &state.k_last,
            fee_on: state.fee_on,
        },
        identity.protocol_fee_share,
    );
    if fee_lp_amount > *lp_amount {
        return Err(AmmError::InsufficientLiquidity {
            lp_amount: lp_amount.clone(),
            fee_lp_amount,
        });
    }
    let new_liquidity = lp_amount - &fee_lp_amount;
    let amount_a = &new_liquidity * &state.reserve_a / &state.total_supply;
    let amount_b = &new_liquidity * &state.reserve_b / &state.total_supply;
    debug!(%amount_a, %amount_b, %fee_lp_amount, "Remove liquidity quote");

    Ok(RemoveLiquidityQuote {
        pair_address,
        router_address: identity.router_address,
        lp: TokenAmount::new(pair_address, LP_DECIMALS, lp_amount.clone()),
        token_a_min: reduce_by_bps(&amount_a, slippage_bps),
        token_a: TokenAmount::new(token_a.address, token_a.decimals, amount_a),
        token_b_min: reduce_by_bps(&amount_b, slippage_bps),
        token_b: TokenAmount::new(token_b.address, token_b.decimals, amount_b),
        fee_lp_amount,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapQuote {
    pub pair_address: Address,
    pub router_address: Address,
    pub sell: TokenAmount,
    pub buy: TokenAmount,
    #[serde(with = "biguint_string")]
    pub buy_min: BigUint,
}

/// Output of selling `amount_in` into a pool, after the 0.3% LP fee.
pub fn get_amount_out(
    amount_in: &BigUint,
    reserve_in: &BigUint,
    reserve_out: &BigUint,
) -> Option<BigUint> {
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return None;
    }
    let amount_in_with_fee = amount_in * BigUint::from(997u32);
    let numerator = &amount_in_with_fee * reserve_out;
    let denominator = reserve_in * BigUint::from(1000u32) + amount_in_with_fee;
    Some(numerator / denominator)
}

/// Quotes a direct single-pool swap of `sell_amount` of `sell` into `buy`.
#[instrument(skip_all, fields(%dialect, %network, %sell_amount))]
#[allow(clippy::too_many_arguments)]
pub async fn get_swap_quote<R: PairStateReader + ?Sized>(
    registry: &DialectRegistry,
    reader: &R,
    dialect: PoolDialect,
    network: NetworkName,
    sell: &PairToken,
    sell_amount: &BigUint,
    buy: &PairToken,
    slippage_bps: u32,
) -> Result<SwapQuote, AmmError> {
    let identity = registry.get(dialect, network)?;
    check_slippage(slippage_bps)?;
    let pair_address = derive_pair_address(identity, sell.address, buy.address)?;

    let (reserve0, reserve1) = reader
        .get_reserves(pair_address)
        .await?;
    let (reserve_in, reserve_out) = orient(sell.address, buy.address, reserve0, reserve1);
    let buy_amount = get_amount_out(sell_amount, &reserve_in, &reserve_out)
        .ok_or_else(|| AmmError::EmptyReserves(format_address(&pair_address)))?;

    Ok(SwapQuote {
        pair_address,
        router_address: identity.router_address,
        sell: TokenAmount::new(sell.address, sell.decimals, sell_amount.clone()),
        buy_min: reduce_by_bps(&buy_amount, slippage_bps),
        buy: TokenAmount::new(buy.address, buy.decimals, buy_amount),
    })
}
