//! Exact integer helpers. Nothing in here ever goes through floating point.
mod sqrt;

use num_bigint::BigUint;
pub use sqrt::isqrt;

/// Basis points in one whole.
pub const BPS_DENOMINATOR: u32 = 10_000;

pub fn pow10(exponent: u32) -> BigUint {
    BigUint::from(10u8).pow(exponent)
}

/// `2^256 - 1`, used for unlimited approvals.
pub fn max_uint256() -> BigUint {
    (BigUint::from(1u8) << 256usize) - BigUint::from(1u8)
}

/// Lowers `amount` by a slippage tolerance given in basis points, rounding down.
///
/// Callers must ensure `slippage_bps <= 10_000`.
pub fn reduce_by_bps(amount: &BigUint, slippage_bps: u32) -> BigUint {
    amount * BigUint::from(BPS_DENOMINATOR.saturating_sub(slippage_bps)) /
        BigUint::from(BPS_DENOMINATOR)
}
