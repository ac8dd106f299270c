//! Shared models, settlement math and the Step/Recipe engine used to assemble multi-protocol
//! transaction plans.
//!
//! A [`recipe::Recipe`] is an ordered list of [`step::Step`]s. The executor threads a ledger of
//! [`models::token::StepERC20Balance`] entries through every step, validates each step's output and
//! aggregates the populated transactions and fees into a single [`recipe::RecipeOutput`]. Nothing
//! in this crate signs or broadcasts transactions.
pub mod abi;
pub mod amm;
pub mod fees;
pub mod math;
pub mod models;
pub mod recipe;
pub mod serde_primitives;
pub mod step;
pub mod traits;

pub use alloy_primitives::Address;
