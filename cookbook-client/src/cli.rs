use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use cookbook_common::{
    amm::{PairData, PairToken, PoolDialect},
    models::NetworkName,
    recipe::{ComboMeal, PlanContext, PreparedRecipe, Recipe, RecipeExecutor},
    step::{deadline_in, VaultInfo},
    traits::PairDiscovery,
    Address,
};
use num_bigint::BigUint;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::{config::PlannerConfig, onchain::RpcPairStateReader, pairs::PairDiscoveryClient};

/// Cookbook CLI - plans private DeFi interactions as unshield, act, shield transaction batches.
///
/// Plans are printed to stdout as JSON; logs go to stderr.
#[derive(Parser, Debug, Clone, PartialEq)]
#[clap(version = env!("CARGO_PKG_VERSION"))]
struct CliArgs {
    /// Planner configuration: fees, RPC and subgraph endpoints.
    #[clap(long, default_value = "./planner.yaml", env = "COOKBOOK_CONFIG")]
    config: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Looks up the pools of a dialect that match the given tokens.
    Pairs {
        #[clap(flatten)]
        pool: PoolArgs,
        /// Token or LP token address; repeat for several.
        #[clap(short = 't', long = "token", required = true)]
        tokens: Vec<Address>,
    },
    /// Plans adding liquidity, optionally depositing the LP token into a vault.
    PlanAddLiquidity {
        #[clap(flatten)]
        pool: PoolArgs,
        #[clap(flatten)]
        plan: PlanArgs,
        #[clap(long)]
        token_a: Address,
        #[clap(long)]
        token_b: Address,
        /// Private balance of token A to commit, in base units.
        #[clap(long)]
        amount_a: BigUint,
        /// YAML description of a vault accepting the LP token.
        #[clap(long)]
        vault: Option<PathBuf>,
    },
    /// Plans redeeming LP tokens for both underlying tokens.
    PlanRemoveLiquidity {
        #[clap(flatten)]
        pool: PoolArgs,
        #[clap(flatten)]
        plan: PlanArgs,
        #[clap(long)]
        token_a: Address,
        #[clap(long)]
        token_b: Address,
        /// Private LP token balance to redeem, in base units.
        #[clap(long)]
        lp_amount: BigUint,
    },
}

#[derive(Args, Debug, Clone, PartialEq)]
struct PoolArgs {
    /// One of uniswap-v2, quickswap, pancakeswap-v2.
    #[clap(short = 'd', long)]
    dialect: PoolDialect,

    #[clap(short = 'n', long, default_value = "ethereum")]
    network: NetworkName,
}

#[derive(Args, Debug, Clone, PartialEq)]
struct PlanArgs {
    /// Receives LP tokens, vault shares and withdrawn tokens.
    #[clap(long)]
    recipient: Address,

    /// Maximum tolerated slippage in basis points.
    #[clap(long, default_value = "50")]
    slippage_bps: u32,

    /// Minutes from now until the router call expires.
    #[clap(long, default_value = "20")]
    deadline_in: i64,
}

pub async fn run_cli() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    create_tracing_subscriber();

    let config = PlannerConfig::from_yaml(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    debug!(command = ?args.command, "Running command");
    run(config, args.command).await
}

fn create_tracing_subscriber() {
    let format = tracing_subscriber::fmt::format()
        .with_level(true)
        .with_target(false)
        .compact();
    tracing_subscriber::fmt()
        .event_format(format)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

async fn run(config: PlannerConfig, command: Command) -> anyhow::Result<()> {
    let discovery = PairDiscoveryClient::from_config(&config);
    match command {
        Command::Pairs { pool, tokens } => {
            let pairs = discovery
                .lookup(pool.dialect, pool.network, &tokens)
                .await?;
            info!(found = pairs.len(), "Pair lookup done");
            println!("{}", serde_json::to_string_pretty(&pairs)?);
        }
        Command::PlanAddLiquidity { pool, plan, token_a, token_b, amount_a, vault } => {
            let (token_a, token_b) = find_pair_tokens(&discovery, &pool, token_a, token_b).await?;
            let vault = vault.map(read_vault).transpose()?;

            let reader = RpcPairStateReader::new(&config.rpc_url)?;
            let registry = config.registry()?;
            let fee_config = config.fee_config()?;
            let ctx = PlanContext {
                network: pool.network,
                registry: &registry,
                reader: &reader,
                fee_config: &fee_config,
                recipient: plan.recipient,
                deadline: deadline_in(plan.deadline_in)?,
                slippage_bps: plan.slippage_bps,
            };
            let prepared = match vault {
                Some(vault) => {
                    ComboMeal::add_liquidity_and_deposit(
                        &ctx,
                        pool.dialect,
                        &token_a,
                        &amount_a,
                        &token_b,
                        vault,
                    )
                    .await?
                }
                None => {
                    Recipe::uni_v2_like_add_liquidity(&ctx, pool.dialect, &token_a, &amount_a, &token_b)
                        .await?
                }
            };
            print_plan(RecipeExecutor::new(fee_config.clone()), prepared).await?;
        }
        Command::PlanRemoveLiquidity { pool, plan, token_a, token_b, lp_amount } => {
            let (token_a, token_b) = find_pair_tokens(&discovery, &pool, token_a, token_b).await?;

            let reader = RpcPairStateReader::new(&config.rpc_url)?;
            let registry = config.registry()?;
            let fee_config = config.fee_config()?;
            let ctx = PlanContext {
                network: pool.network,
                registry: &registry,
                reader: &reader,
                fee_config: &fee_config,
                recipient: plan.recipient,
                deadline: deadline_in(plan.deadline_in)?,
                slippage_bps: plan.slippage_bps,
            };
            let prepared = Recipe::uni_v2_like_remove_liquidity(
                &ctx,
                pool.dialect,
                &lp_amount,
                &token_a,
                &token_b,
            )
            .await?;
            print_plan(RecipeExecutor::new(fee_config.clone()), prepared).await?;
        }
    }
    Ok(())
}

/// Resolves both tokens through pair discovery, returned in the caller's order.
async fn find_pair_tokens(
    discovery: &PairDiscoveryClient,
    pool: &PoolArgs,
    token_a: Address,
    token_b: Address,
) -> anyhow::Result<(PairToken, PairToken)> {
    let pairs = discovery
        .lookup(pool.dialect, pool.network, &[token_a, token_b])
        .await?;
    pair_tokens(&pairs, token_a, token_b).ok_or_else(|| {
        anyhow!(
            "No {} pool for {token_a} and {token_b} on {}",
            pool.dialect.display_name(),
            pool.network
        )
    })
}

fn pair_tokens(
    pairs: &[PairData],
    token_a: Address,
    token_b: Address,
) -> Option<(PairToken, PairToken)> {
    pairs.iter().find_map(|p| {
        if p.token_a.address == token_a && p.token_b.address == token_b {
            Some((p.token_a.clone(), p.token_b.clone()))
        } else if p.token_a.address == token_b && p.token_b.address == token_a {
            Some((p.token_b.clone(), p.token_a.clone()))
        } else {
            None
        }
    })
}

fn read_vault(path: PathBuf) -> anyhow::Result<VaultInfo> {
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read vault file {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("Invalid vault file {}", path.display()))
}

async fn print_plan(executor: RecipeExecutor, prepared: PreparedRecipe) -> anyhow::Result<()> {
    let output = executor
        .execute(&prepared.recipe, prepared.input)
        .await?;
    info!(
        recipe = %output.name,
        transactions = output.populated_transactions.len(),
        "Plan ready"
    );
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
