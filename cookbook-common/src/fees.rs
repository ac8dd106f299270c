//! Shield/unshield fee accounting and constant-product protocol-fee dilution.
use std::collections::HashMap;

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::{
    math::{isqrt, BPS_DENOMINATOR},
    models::NetworkName,
};

#[derive(Error, Debug, PartialEq)]
pub enum FeeError {
    #[error("No fee configuration for network {0}")]
    UnsupportedNetwork(NetworkName),
    #[error("Invalid fee of {bps} bps for network {network}: must be below 10000")]
    InvalidBasisPoints { network: NetworkName, bps: u32 },
}

/// Shield and unshield fees of one network, in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkFees {
    pub shield_bps: u32,
    pub unshield_bps: u32,
}

impl NetworkFees {
    pub fn new(shield_bps: u32, unshield_bps: u32) -> Self {
        Self { shield_bps, unshield_bps }
    }
}

/// Immutable per-network fee table.
///
/// Built once and handed to everything that charges fees. A network without an entry is an error
/// on lookup, never a zero fee.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "HashMap<NetworkName, NetworkFees>", into = "HashMap<NetworkName, NetworkFees>")]
pub struct FeeConfig {
    fees: HashMap<NetworkName, NetworkFees>,
}

impl FeeConfig {
    pub fn new(fees: HashMap<NetworkName, NetworkFees>) -> Result<Self, FeeError> {
        for (network, fee) in fees.iter() {
            for bps in [fee.shield_bps, fee.unshield_bps] {
                if bps >= BPS_DENOMINATOR {
                    return Err(FeeError::InvalidBasisPoints { network: *network, bps });
                }
            }
        }
        Ok(Self { fees })
    }

    /// Same fees on every listed network.
    pub fn uniform(
        networks: impl IntoIterator<Item = NetworkName>,
        fees: NetworkFees,
    ) -> Result<Self, FeeError> {
        Self::new(
            networks
                .into_iter()
                .map(|n| (n, fees))
                .collect(),
        )
    }

    pub fn network_fees(&self, network: NetworkName) -> Result<NetworkFees, FeeError> {
        self.fees
            .get(&network)
            .copied()
            .ok_or(FeeError::UnsupportedNetwork(network))
    }

    pub fn shield_bps(&self, network: NetworkName) -> Result<u32, FeeError> {
        Ok(self.network_fees(network)?.shield_bps)
    }

    pub fn unshield_bps(&self, network: NetworkName) -> Result<u32, FeeError> {
        Ok(self.network_fees(network)?.unshield_bps)
    }
}

impl TryFrom<HashMap<NetworkName, NetworkFees>> for FeeConfig {
    type Error = FeeError;

    fn try_from(value: HashMap<NetworkName, NetworkFees>) -> Result<Self, Self::Error> {
        FeeConfig::new(value)
    }
}

impl From<FeeConfig> for HashMap<NetworkName, NetworkFees> {
    fn from(value: FeeConfig) -> Self {
        value.fees
    }
}

/// `amount * bps / 10000`, rounded down.
pub fn fee_amount(amount: &BigUint, bps: u32) -> BigUint {
    amount * BigUint::from(bps) / BigUint::from(BPS_DENOMINATOR)
}

/// What is left of `amount` once the fee has been taken.
pub fn amount_after_fee(amount: &BigUint, bps: u32) -> BigUint {
    amount - fee_amount(amount, bps)
}

/// Gross amount to submit so that `amount_after_fee(gross, bps) == net`.
///
/// `bps` must be below 10000, which [`FeeConfig`] guarantees for configured values.
pub fn gross_for_net(net: &BigUint, bps: u32) -> BigUint {
    net * BigUint::from(BPS_DENOMINATOR) / BigUint::from(BPS_DENOMINATOR - bps)
}

/// Splits `amount` into `(fee, remainder)`.
pub fn split_fee(amount: &BigUint, bps: u32) -> (BigUint, BigUint) {
    let fee = fee_amount(amount, bps);
    let rest = amount - &fee;
    (fee, rest)
}

/// Pair state needed to compute the protocol fee minted on the next liquidity event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolFeeInputs<'a> {
    pub reserve_a: &'a BigUint,
    pub reserve_b: &'a BigUint,
    pub total_supply: &'a BigUint,
    pub k_last: &'a BigUint,
    /// Whether the factory has a protocol fee recipient configured.
    pub fee_on: bool,
}

/// Fraction of the minted protocol-fee liquidity applied to user quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolFeeShare {
    pub numerator: u32,
    pub denominator: u32,
}

impl Default for ProtocolFeeShare {
    fn default() -> Self {
        Self { numerator: 1, denominator: 1 }
    }
}

/// LP amount by which the protocol fee dilutes the pool at the next mint or burn.
///
/// Zero when no fee recipient is set, when `k_last` is zero or when the pool has not grown since
/// the last liquidity event.
pub fn diluting_fee_lp_amount(inputs: &ProtocolFeeInputs<'_>, share: ProtocolFeeShare) -> BigUint {
    if !inputs.fee_on || inputs.k_last.is_zero() || share.denominator == 0 {
        return BigUint::zero();
    }

    let root_k = isqrt(&(inputs.reserve_a * inputs.reserve_b));
    let root_k_last = isqrt(inputs.k_last);
    if root_k <= root_k_last {
        return BigUint::zero();
    }

    let numerator = inputs.total_supply * (&root_k - &root_k_last);
    let denominator = BigUint::from(5u8) * &root_k + BigUint::from(4u8) * &root_k_last;
    let liquidity = numerator / denominator;
    trace!(%root_k, %root_k_last, %liquidity, "Computed protocol fee liquidity");

    liquidity * BigUint::from(share.numerator) / BigUint::from(share.denominator)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    fn big(v: &str) -> BigUint {
        BigUint::from_str(v).unwrap()
    }

    #[test]
    fn test_fee_round_trip_example() {
        let gross = gross_for_net(&big("19949999999999999"), 25);

        assert_eq!(gross, big("19999999999999998"));
        assert_eq!(amount_after_fee(&gross, 25), big("19949999999999999"));
    }

    #[rstest]
    #[case::zero_bps(0)]
    #[case::quarter_percent(25)]
    #[case::half_percent(50)]
    #[case::one_percent(100)]
    #[case::heavy(3_333)]
    #[case::max(9_999)]
    fn test_fee_round_trip(#[case] bps: u32) {
        for net in [0u64, 1, 2, 3, 7, 99, 10_000, 12_345_678, 19_949_999_999_999_999] {
            let net = BigUint::from(net);
            let gross = gross_for_net(&net, bps);

            assert_eq!(amount_after_fee(&gross, bps), net, "bps {bps}, net {net}");
        }
    }

    #[test]
    fn test_split_fee() {
        let (fee, rest) = split_fee(&big("12000"), 25);

        assert_eq!(fee, big("30"));
        assert_eq!(rest, big("11970"));
    }

    #[test]
    fn test_fee_config_rejects_whole_fee() {
        let res = FeeConfig::uniform([NetworkName::Polygon], NetworkFees::new(10_000, 25));

        assert_eq!(
            res,
            Err(FeeError::InvalidBasisPoints { network: NetworkName::Polygon, bps: 10_000 })
        );
    }

    #[test]
    fn test_fee_config_lookup_miss() {
        let config =
            FeeConfig::uniform([NetworkName::Ethereum], NetworkFees::new(25, 25)).unwrap();

        assert_eq!(config.unshield_bps(NetworkName::Ethereum), Ok(25));
        assert_eq!(
            config.shield_bps(NetworkName::Bsc),
            Err(FeeError::UnsupportedNetwork(NetworkName::Bsc))
        );
    }

    #[test]
    fn test_fee_config_from_yaml_shaped_json() {
        let config: FeeConfig = serde_json::from_str(
            r#"{"ethereum": {"shield_bps": 25, "unshield_bps": 25}, "bsc": {"shield_bps": 10, "unshield_bps": 20}}"#,
        )
        .unwrap();

        assert_eq!(config.network_fees(NetworkName::Bsc), Ok(NetworkFees::new(10, 20)));

        let invalid = serde_json::from_str::<FeeConfig>(
            r#"{"ethereum": {"shield_bps": 25, "unshield_bps": 12000}}"#,
        );
        assert!(invalid.is_err());
    }

    #[test]
    fn test_no_dilution_when_fee_off() {
        let (ra, rb, ts, kl) = (big("1000"), big("1000"), big("1000"), big("1"));
        let inputs = ProtocolFeeInputs {
            reserve_a: &ra,
            reserve_b: &rb,
            total_supply: &ts,
            k_last: &kl,
            fee_on: false,
        };

        assert_eq!(diluting_fee_lp_amount(&inputs, ProtocolFeeShare::default()), BigUint::zero());
    }

    #[test]
    fn test_no_dilution_when_k_last_zero_or_pool_shrunk() {
        let (ra, rb, ts) = (big("1000"), big("1000"), big("1000"));
        let zero = BigUint::zero();
        let bigger = big("4000000");

        for k_last in [&zero, &bigger] {
            let inputs = ProtocolFeeInputs {
                reserve_a: &ra,
                reserve_b: &rb,
                total_supply: &ts,
                k_last,
                fee_on: true,
            };
            assert_eq!(
                diluting_fee_lp_amount(&inputs, ProtocolFeeShare::default()),
                BigUint::zero()
            );
        }
    }

    #[test]
    fn test_dilution_after_growth() {
        // rootK = 2000, rootKLast = 1000: 1000 * 1000 / (10000 + 4000) = 71
        let (ra, rb, ts, kl) = (big("2000"), big("2000"), big("1000"), big("1000000"));
        let inputs = ProtocolFeeInputs {
            reserve_a: &ra,
            reserve_b: &rb,
            total_supply: &ts,
            k_last: &kl,
            fee_on: true,
        };

        assert_eq!(diluting_fee_lp_amount(&inputs, ProtocolFeeShare::default()), big("71"));
        assert_eq!(
            diluting_fee_lp_amount(&inputs, ProtocolFeeShare { numerator: 1, denominator: 2 }),
            big("35")
        );
    }
}
