pub mod cache;
pub mod cli;
pub mod config;
pub mod onchain;
pub mod pairs;

pub use config::PlannerConfig;
pub use onchain::RpcPairStateReader;
pub use pairs::{PairDiscoveryClient, PairDiscoveryError};
