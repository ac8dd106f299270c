use std::collections::HashMap;

use alloy_primitives::{address, b256, Address, B256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    amm::{AmmError, PoolDialect},
    fees::ProtocolFeeShare,
    models::{format_address, NetworkName},
};

/// Everything needed to locate and trade against the pools of one dialect on one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolIdentity {
    pub factory_address: Address,
    pub init_code_hash: B256,
    pub router_address: Address,
    #[serde(default)]
    pub protocol_fee_share: ProtocolFeeShare,
}

impl PoolIdentity {
    pub fn new(factory_address: Address, init_code_hash: B256, router_address: Address) -> Self {
        Self {
            factory_address,
            init_code_hash,
            router_address,
            protocol_fee_share: ProtocolFeeShare::default(),
        }
    }

    fn validate(&self, dialect: PoolDialect, network: NetworkName) -> Result<(), AmmError> {
        let invalid = |msg: String| AmmError::InvalidIdentity { dialect, network, msg };
        if self.factory_address.is_zero() {
            return Err(invalid("factory address is zero".to_string()));
        }
        if self.router_address.is_zero() {
            return Err(invalid("router address is zero".to_string()));
        }
        if self.init_code_hash.is_zero() {
            return Err(invalid("init code hash is zero".to_string()));
        }
        if self.protocol_fee_share.denominator == 0 ||
            self.protocol_fee_share.numerator > self.protocol_fee_share.denominator
        {
            return Err(invalid(format!(
                "protocol fee share {}/{} is not a fraction",
                self.protocol_fee_share.numerator, self.protocol_fee_share.denominator
            )));
        }
        Ok(())
    }
}

/// Immutable `(dialect, network) -> PoolIdentity` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectRegistry {
    entries: HashMap<(PoolDialect, NetworkName), PoolIdentity>,
}

impl DialectRegistry {
    /// Builds a registry from arbitrary entries, rejecting any that are obviously broken.
    pub fn new(
        entries: impl IntoIterator<Item = ((PoolDialect, NetworkName), PoolIdentity)>,
    ) -> Result<Self, AmmError> {
        let entries = entries
            .into_iter()
            .map(|((dialect, network), identity)| {
                identity.validate(dialect, network)?;
                Ok(((dialect, network), identity))
            })
            .collect::<Result<HashMap<_, _>, AmmError>>()?;
        Ok(Self { entries })
    }

    /// Returns a copy of this registry with `overrides` replacing or extending its entries.
    pub fn with_overrides(
        &self,
        overrides: impl IntoIterator<Item = ((PoolDialect, NetworkName), PoolIdentity)>,
    ) -> Result<Self, AmmError> {
        let mut entries = self.entries.clone();
        for ((dialect, network), identity) in overrides {
            identity.validate(dialect, network)?;
            debug!(%dialect, %network, factory = %format_address(&identity.factory_address), "Overriding pool identity");
            entries.insert((dialect, network), identity);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, dialect: PoolDialect, network: NetworkName) -> Result<&PoolIdentity, AmmError> {
        self.entries
            .get(&(dialect, network))
            .ok_or(AmmError::UnsupportedDialect { dialect, network })
    }

    pub fn supports(&self, dialect: PoolDialect, network: NetworkName) -> bool {
        self.entries
            .contains_key(&(dialect, network))
    }

    /// Networks on which `dialect` has a known deployment.
    pub fn networks(&self, dialect: PoolDialect) -> Vec<NetworkName> {
        let mut networks: Vec<_> = self
            .entries
            .keys()
            .filter(|(d, _)| *d == dialect)
            .map(|(_, n)| *n)
            .collect();
        networks.sort();
        networks
    }
}

const UNISWAP_V2_INIT_CODE_HASH: B256 =
    b256!("96e8ac4277198ff8b6f785478aa9a39f403cb768dd02cbee326c3e7da348845f");

impl Default for DialectRegistry {
    /// Known mainnet deployments.
    fn default() -> Self {
        let entries = [
            (
                (PoolDialect::UniswapV2, NetworkName::Ethereum),
                PoolIdentity::new(
                    address!("5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f"),
                    UNISWAP_V2_INIT_CODE_HASH,
                    address!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D"),
                ),
            ),
            (
                (PoolDialect::QuickSwap, NetworkName::Polygon),
                PoolIdentity::new(
                    address!("5757371414417b8C6CAad45bAeF941aBc7d3Ab32"),
                    UNISWAP_V2_INIT_CODE_HASH,
                    address!("a5E0829CaCEd8fFDD4De3c43696c57F7D7A678ff"),
                ),
            ),
            (
                (PoolDialect::PancakeSwapV2, NetworkName::Bsc),
                PoolIdentity::new(
                    address!("cA143Ce32Fe78f1f7019d7d551a6402fC5350c73"),
                    b256!("00fb7f630766e6a796048ea87d01acd3068e8ff67d078148a3fa3f4a84f69bd5"),
                    address!("10ED43C718714eb63d5aA57B78B54704E256024E"),
                ),
            ),
        ];
        Self { entries: entries.into_iter().collect() }
    }
}
