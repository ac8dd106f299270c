//! Calldata encoding for the contracts the built-in steps talk to.
use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolCall};
use num_bigint::BigUint;
use thiserror::Error;

// Subsets of the ERC20, WETH9, UniswapV2 and ERC4626 interfaces.
sol! {
    interface IERC20 {
        function totalSupply() external view returns (uint256);
        function transfer(address to, uint256 value) external returns (bool);
        function approve(address spender, uint256 value) external returns (bool);
    }

    interface IWrappedBaseToken {
        function deposit() external payable;
        function withdraw(uint256 wad) external;
    }

    interface IUniswapV2Pair {
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
        function totalSupply() external view returns (uint256);
        function kLast() external view returns (uint256);
    }

    interface IUniswapV2Factory {
        function feeTo() external view returns (address);
    }

    interface IUniswapV2Router02 {
        function swapExactTokensForTokens(
            uint256 amountIn,
            uint256 amountOutMin,
            address[] calldata path,
            address to,
            uint256 deadline
        ) external returns (uint256[] memory amounts);

        function addLiquidity(
            address tokenA,
            address tokenB,
            uint256 amountADesired,
            uint256 amountBDesired,
            uint256 amountAMin,
            uint256 amountBMin,
            address to,
            uint256 deadline
        ) external returns (uint256 amountA, uint256 amountB, uint256 liquidity);

        function removeLiquidity(
            address tokenA,
            address tokenB,
            uint256 liquidity,
            uint256 amountAMin,
            uint256 amountBMin,
            address to,
            uint256 deadline
        ) external returns (uint256 amountA, uint256 amountB);
    }

    interface IERC4626 {
        function deposit(uint256 assets, address receiver) external returns (uint256 shares);
        function redeem(uint256 shares, address receiver, address owner) external returns (uint256 assets);
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum AbiError {
    #[error("Amount {0} does not fit in uint256")]
    Overflow(BigUint),
    #[error("Failed to decode {call} result: {msg}")]
    Decode { call: &'static str, msg: String },
}

pub fn to_u256(amount: &BigUint) -> Result<U256, AbiError> {
    if amount.bits() > 256 {
        return Err(AbiError::Overflow(amount.clone()));
    }
    Ok(U256::from_be_slice(&amount.to_bytes_be()))
}

pub fn from_u256(value: U256) -> BigUint {
    BigUint::from_bytes_be(&value.to_be_bytes::<32>())
}

pub fn encode_approve(spender: Address, amount: &BigUint) -> Result<Vec<u8>, AbiError> {
    Ok(IERC20::approveCall { spender, value: to_u256(amount)? }.abi_encode())
}

pub fn encode_transfer(to: Address, amount: &BigUint) -> Result<Vec<u8>, AbiError> {
    Ok(IERC20::transferCall { to, value: to_u256(amount)? }.abi_encode())
}

pub fn encode_wrap() -> Vec<u8> {
    IWrappedBaseToken::depositCall {}.abi_encode()
}

pub fn encode_unwrap(amount: &BigUint) -> Result<Vec<u8>, AbiError> {
    Ok(IWrappedBaseToken::withdrawCall { wad: to_u256(amount)? }.abi_encode())
}

pub fn encode_swap_exact_tokens_for_tokens(
    amount_in: &BigUint,
    amount_out_min: &BigUint,
    path: Vec<Address>,
    to: Address,
    deadline: u64,
) -> Result<Vec<u8>, AbiError> {
    Ok(IUniswapV2Router02::swapExactTokensForTokensCall {
        amountIn: to_u256(amount_in)?,
        amountOutMin: to_u256(amount_out_min)?,
        path,
        to,
        deadline: U256::from(deadline),
    }
    .abi_encode())
}

/// Router `addLiquidity` arguments. Amounts are `(desired, min)` per side.
pub struct AddLiquidityCall<'a> {
    pub token_a: Address,
    pub token_b: Address,
    pub amount_a: (&'a BigUint, &'a BigUint),
    pub amount_b: (&'a BigUint, &'a BigUint),
    pub to: Address,
    pub deadline: u64,
}

pub fn encode_add_liquidity(call: AddLiquidityCall<'_>) -> Result<Vec<u8>, AbiError> {
    Ok(IUniswapV2Router02::addLiquidityCall {
        tokenA: call.token_a,
        tokenB: call.token_b,
        amountADesired: to_u256(call.amount_a.0)?,
        amountBDesired: to_u256(call.amount_b.0)?,
        amountAMin: to_u256(call.amount_a.1)?,
        amountBMin: to_u256(call.amount_b.1)?,
        to: call.to,
        deadline: U256::from(call.deadline),
    }
    .abi_encode())
}

pub fn encode_remove_liquidity(
    token_a: Address,
    token_b: Address,
    liquidity: &BigUint,
    mins: (&BigUint, &BigUint),
    to: Address,
    deadline: u64,
) -> Result<Vec<u8>, AbiError> {
    Ok(IUniswapV2Router02::removeLiquidityCall {
        tokenA: token_a,
        tokenB: token_b,
        liquidity: to_u256(liquidity)?,
        amountAMin: to_u256(mins.0)?,
        amountBMin: to_u256(mins.1)?,
        to,
        deadline: U256::from(deadline),
    }
    .abi_encode())
}

pub fn encode_vault_deposit(assets: &BigUint, receiver: Address) -> Result<Vec<u8>, AbiError> {
    Ok(IERC4626::depositCall { assets: to_u256(assets)?, receiver }.abi_encode())
}

pub fn encode_vault_redeem(
    shares: &BigUint,
    receiver: Address,
    owner: Address,
) -> Result<Vec<u8>, AbiError> {
    Ok(IERC4626::redeemCall { shares: to_u256(shares)?, receiver, owner }.abi_encode())
}

pub fn encode_get_reserves() -> Vec<u8> {
    IUniswapV2Pair::getReservesCall {}.abi_encode()
}

pub fn encode_total_supply() -> Vec<u8> {
    IUniswapV2Pair::totalSupplyCall {}.abi_encode()
}

pub fn encode_k_last() -> Vec<u8> {
    IUniswapV2Pair::kLastCall {}.abi_encode()
}

pub fn encode_fee_to() -> Vec<u8> {
    IUniswapV2Factory::feeToCall {}.abi_encode()
}

/// Decodes `getReserves()` into `(reserve0, reserve1)`.
pub fn decode_get_reserves(data: &[u8]) -> Result<(BigUint, BigUint), AbiError> {
    let ret = IUniswapV2Pair::getReservesCall::abi_decode_returns(data)
        .map_err(|e| AbiError::Decode { call: "getReserves", msg: e.to_string() })?;
    Ok((
        BigUint::from_bytes_be(&ret.reserve0.to_be_bytes_vec()),
        BigUint::from_bytes_be(&ret.reserve1.to_be_bytes_vec()),
    ))
}

pub fn decode_uint256(call: &'static str, data: &[u8]) -> Result<BigUint, AbiError> {
    let value = IUniswapV2Pair::totalSupplyCall::abi_decode_returns(data)
        .map_err(|e| AbiError::Decode { call, msg: e.to_string() })?;
    Ok(from_u256(value))
}

pub fn decode_address(call: &'static str, data: &[u8]) -> Result<Address, AbiError> {
    IUniswapV2Factory::feeToCall::abi_decode_returns(data)
        .map_err(|e| AbiError::Decode { call, msg: format!("{e} ({})", hex::encode(data)) })
}
