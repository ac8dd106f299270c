use num_bigint::BigUint;
use num_traits::{One, Zero};

/// Exact integer square root, `floor(sqrt(y))`.
///
/// Newton iteration on integers only; starting from `x = y / 2 + 1` the sequence is strictly
/// decreasing until it reaches the floor root, which ends the loop.
pub fn isqrt(y: &BigUint) -> BigUint {
    if y.is_zero() {
        return BigUint::zero();
    }
    if *y <= BigUint::from(3u8) {
        return BigUint::one();
    }

    let two = BigUint::from(2u8);
    let mut z = y.clone();
    let mut x = y / &two + BigUint::one();
    while x < z {
        z = x.clone();
        x = (y / &x + &x) / &two;
    }
    z
}
