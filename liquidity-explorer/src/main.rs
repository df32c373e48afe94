//! DLMM Liquidity Explorer
//!
//! Command line front end for the liquidity core:
//! - render a pool's bin window for any liquidity shape
//! - summarize positions held across bins
//! - drive add/remove liquidity through scripted intents
//! - poll spot prices with last-known-good fallback

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use dlmm_liquidity_core::{
    chart, distribution, reference, CoinGeckoSource, ManageOutcome, Pool, PoolContext,
    PortfolioSummary, PositionManager, PriceSnapshot, PriceSource, Radius, SpotPriceFeed,
    StaticPriceSource, UserBinPosition,
};
use log::{error, info, warn};
use rust_decimal::Decimal;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::signal;

mod intents;
mod settings;

use intents::Intent;
use settings::{load_config, ExplorerConfig};

/// DLMM Liquidity Explorer CLI
#[derive(Parser)]
#[command(
    name = "liquidity-explorer",
    about = "Explore bin liquidity, shapes and positions of DLMM pools",
    version
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "explorer.toml")]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the liquidity window of a pool
    Bins {
        #[command(flatten)]
        pool: PoolArgs,
        #[command(flatten)]
        shape: ShapeArgs,
        /// Bar width of the text chart
        #[arg(long, default_value = "40")]
        width: usize,
    },
    /// Summarize positions: value, composition, range status
    Positions {
        #[command(flatten)]
        pool: PoolArgs,
    },
    /// Apply intents (e.g. `exit percent:100 confirm`) to the positions
    Manage {
        #[command(flatten)]
        pool: PoolArgs,
        /// Intents applied in order
        #[arg(required = true)]
        intents: Vec<String>,
    },
    /// Fetch spot prices
    Prices {
        /// Keep polling until interrupted
        #[arg(long)]
        watch: bool,
        /// Use the built-in fallback quotes instead of the network
        #[arg(long)]
        offline: bool,
    },
    /// List catalog pools
    Pools,
    /// Initialize a new pool for a token pair
    CreatePool {
        /// Base token symbol (token X)
        #[arg(long)]
        token_x: String,
        /// Quote token symbol (token Y)
        #[arg(long)]
        token_y: String,
        /// Bin step / fee tier in basis points (1, 10, 20 or 100)
        #[arg(long, default_value = "20")]
        bin_step: u16,
        /// Start price: 1 token X in token Y
        #[arg(long)]
        price: String,
        /// Shape used to preview the first liquidity window
        #[arg(long, default_value = "spot")]
        shape: String,
    },
    /// Configuration management
    Config(ConfigCommands),
}

#[derive(Args)]
struct PoolArgs {
    /// Pool id, e.g. ETH-USDC (defaults to the configured pool)
    #[arg(long)]
    pool: Option<String>,
    /// Current price of token X in token Y (defaults to fallback quotes)
    #[arg(long)]
    price: Option<String>,
    /// JSON file with position records (defaults to sample positions)
    #[arg(long)]
    positions: Option<PathBuf>,
}

#[derive(Args)]
struct ShapeArgs {
    /// Liquidity shape (spot/curve/bid-ask/wide)
    #[arg(long)]
    shape: Option<String>,
    /// Concentration radius (1-30)
    #[arg(long)]
    radius: Option<u32>,
    /// Add cosmetic noise seeded with this value
    #[arg(long)]
    noise_seed: Option<u64>,
}

#[derive(Args)]
struct ConfigCommands {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Initialize configuration file
    Init {
        /// Default pool id
        #[arg(long, default_value = "ETH-USDC")]
        pool: String,
    },
    /// Validate configuration
    Validate,
}

/// Pool, price and positions resolved from CLI arguments
struct Scenario {
    pool: &'static Pool,
    ctx: PoolContext,
    positions: Vec<UserBinPosition>,
}

impl Scenario {
    fn resolve(args: &PoolArgs, config: &ExplorerConfig) -> Result<Self> {
        let pool_id = args.pool.as_deref().unwrap_or(&config.pool.default_pool);
        let pool = reference::pool_by_id(pool_id)?;

        let current_price = match &args.price {
            Some(price) => {
                let price = Decimal::from_str(price)
                    .with_context(|| format!("invalid price: {}", price))?;
                if price.is_sign_negative() {
                    return Err(anyhow!("Price must not be negative"));
                }
                price
            }
            None => reference::pair_price(pool, reference::fallback_prices()),
        };
        let ctx = pool.context(current_price);

        let positions = match &args.positions {
            Some(path) => load_positions(path)?,
            None => reference::demo_positions(&ctx),
        };

        Ok(Self {
            pool,
            ctx,
            positions,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .init();

    if let Err(e) = dotenvy::dotenv() {
        log::debug!("No .env file loaded: {}", e);
    }

    match cli.command {
        Commands::Config(config_cmd) => handle_config_command(config_cmd, &cli.config)?,
        command => {
            let config = load_config(&cli.config)?;
            match command {
                Commands::Bins { pool, shape, width } => {
                    handle_bins_command(&pool, &shape, width, &config, cli.json)?
                }
                Commands::Positions { pool } => {
                    handle_positions_command(&pool, &config, cli.json)?
                }
                Commands::Manage { pool, intents } => {
                    handle_manage_command(&pool, &intents, &config, cli.json)?
                }
                Commands::Prices { watch, offline } => {
                    handle_prices_command(watch, offline, &config, cli.json).await?
                }
                Commands::Pools => handle_pools_command(cli.json)?,
                Commands::CreatePool {
                    token_x,
                    token_y,
                    bin_step,
                    price,
                    shape,
                } => handle_create_pool_command(
                    &token_x, &token_y, bin_step, &price, &shape, cli.json,
                )?,
                Commands::Config(_) => unreachable!(), // Already handled above
            }
        }
    }

    Ok(())
}

/// Handle configuration commands
fn handle_config_command(cmd: ConfigCommands, config_path: &Path) -> Result<()> {
    match cmd.action {
        ConfigAction::Show => {
            let config = load_config(config_path).unwrap_or_else(|e| {
                warn!("Falling back to default configuration: {}", e);
                ExplorerConfig::default()
            });
            println!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Init { pool } => {
            reference::pool_by_id(&pool)?;
            let mut config = ExplorerConfig::default();
            config.pool.default_pool = pool;
            std::fs::write(config_path, toml::to_string_pretty(&config)?)?;
            println!("Configuration file created at: {}", config_path.display());
        }
        ConfigAction::Validate => match load_config(config_path) {
            Ok(config) => {
                reference::pool_by_id(&config.pool.default_pool)?;
                println!("Configuration is valid");
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        },
    }
    Ok(())
}

/// Handle the bin window command
fn handle_bins_command(
    args: &PoolArgs,
    shape: &ShapeArgs,
    width: usize,
    config: &ExplorerConfig,
    json: bool,
) -> Result<()> {
    let scenario = Scenario::resolve(args, config)?;

    let mut dist = config.distribution.to_config()?;
    if let Some(name) = &shape.shape {
        dist.shape = name.parse()?;
    }
    if let Some(radius) = shape.radius {
        dist.radius = Radius::new(radius)?;
    }
    if let Some(seed) = shape.noise_seed {
        let amplitude = dist.noise.as_ref().map(|n| n.amplitude).unwrap_or(Decimal::TEN);
        dist.noise = Some(distribution::NoiseConfig { amplitude, seed });
    }

    let bins = distribution::generate_bins(&scenario.ctx, &dist);
    let series = chart::project(&bins, &scenario.positions, &scenario.ctx);
    info!(
        "{}: {} bins, {} shape, radius {}",
        scenario.pool.pair_label(),
        bins.len(),
        dist.shape,
        dist.radius.get()
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&series)?);
        return Ok(());
    }

    println!(
        "{} | bin step {} bps | price {} | active bin {}",
        scenario.pool.pair_label(),
        scenario.pool.bin_step,
        scenario.ctx.current_price,
        scenario.ctx.active_bin_id
    );
    print!("{}", chart::render_ascii(&series, width));
    if let Some(active) = series.active_point() {
        println!(
            "> active bin {} [{:.2} - {:.2})",
            active.bin_id, active.price_start, active.price_end
        );
    }
    Ok(())
}

/// Handle the positions summary command
fn handle_positions_command(args: &PoolArgs, config: &ExplorerConfig, json: bool) -> Result<()> {
    let scenario = Scenario::resolve(args, config)?;
    let manager = PositionManager::with_positions(scenario.ctx, scenario.positions);
    print_summary(scenario.pool, &manager.summary(), json)
}

/// Handle scripted position management
fn handle_manage_command(
    args: &PoolArgs,
    raw_intents: &[String],
    config: &ExplorerConfig,
    json: bool,
) -> Result<()> {
    let scenario = Scenario::resolve(args, config)?;
    let script = raw_intents
        .iter()
        .map(|raw| raw.parse::<Intent>())
        .collect::<Result<Vec<_>>>()?;

    let mut manager = PositionManager::with_positions(scenario.ctx, scenario.positions);
    let outcomes = intents::run(&mut manager, &script).map_err(|e| {
        error!("{:#}", e);
        e
    })?;

    if json {
        let report = intents::report(&manager, &outcomes);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for outcome in &outcomes {
        print_outcome(scenario.pool, outcome);
    }
    println!("State: {:?}", manager.state());
    print_summary(scenario.pool, &manager.summary(), json)
}

/// Handle price commands
async fn handle_prices_command(
    watch: bool,
    offline: bool,
    config: &ExplorerConfig,
    json: bool,
) -> Result<()> {
    if offline {
        let source = StaticPriceSource::new(reference::fallback_prices().clone());
        return run_feed(source, watch, config, json).await;
    }

    let mut source =
        CoinGeckoSource::new(config.feed.api_url.clone()).with_timeout(config.feed.timeout())?;
    for (symbol, id) in &config.feed.coingecko_ids {
        source = source.with_id(symbol, id);
    }
    run_feed(source, watch, config, json).await
}

async fn run_feed<S: PriceSource>(
    source: S,
    watch: bool,
    config: &ExplorerConfig,
    json: bool,
) -> Result<()> {
    let feed = SpotPriceFeed::new(source, config.feed.symbols.clone())
        .with_interval(config.feed.poll_interval());

    if !watch {
        if !feed.refresh().await {
            warn!("Showing fallback prices");
        }
        return print_prices(&feed.snapshot().await, json);
    }

    let handle = feed.spawn_polling();
    let mut ticker = tokio::time::interval(feed.interval());
    // Let the first poll land before printing
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    loop {
        tokio::select! {
            _ = ticker.tick() => print_prices(&feed.snapshot().await, json)?,
            _ = signal::ctrl_c() => {
                info!("Stopping price feed");
                handle.abort();
                return Ok(());
            }
        }
    }
}

fn handle_pools_command(json: bool) -> Result<()> {
    let pools = reference::pools();
    if json {
        println!("{}", serde_json::to_string_pretty(pools)?);
        return Ok(());
    }

    println!(
        "{:<12} {:<12} {:<10} {:<14} {:<14} {:<8}",
        "Pool", "Pair", "Bin step", "TVL", "Volume 24h", "APR"
    );
    println!("{}", "-".repeat(74));
    for pool in pools {
        println!(
            "{:<12} {:<12} {:<10} {:<14} {:<14} {:<8}",
            pool.id,
            pool.pair_label(),
            pool.bin_step,
            pool.tvl,
            pool.volume_24h,
            format!("{}%", pool.apr)
        );
    }
    Ok(())
}

/// Handle pool initialization
fn handle_create_pool_command(
    token_x: &str,
    token_y: &str,
    bin_step: u16,
    price: &str,
    shape: &str,
    json: bool,
) -> Result<()> {
    let lookup = |symbol: &str| {
        reference::token_by_symbol(symbol).ok_or_else(|| anyhow!("Unknown token: {}", symbol))
    };
    let start_price =
        Decimal::from_str(price).with_context(|| format!("invalid start price: {}", price))?;

    let (pool, ctx) = Pool::create(lookup(token_x)?, lookup(token_y)?, bin_step, start_price)?;
    if reference::pool_by_id(&pool.id).is_ok() {
        warn!("Catalog already lists a {} pool", pool.id);
    }

    let preview = distribution::DistributionConfig {
        shape: shape.parse()?,
        ..Default::default()
    };
    let bins = distribution::generate_bins(&ctx, &preview);

    if json {
        let report = json!({ "pool": pool, "context": ctx, "bins": bins });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let (low, high) = ctx.bin_price_range(ctx.active_bin_id);
    println!("Pool created: {} ({})", pool.id, pool.pair_label());
    println!(
        "Bin step: {} bps ({}% fee tier)",
        pool.bin_step,
        Decimal::from(pool.bin_step) / Decimal::ONE_HUNDRED
    );
    println!("Active bin: {} [{} - {})", ctx.active_bin_id, low, high);
    println!(
        "Start price: 1 {} = {} {}",
        pool.token_x.symbol, start_price, pool.token_y.symbol
    );
    print!("{}", chart::render_ascii(&chart::project(&bins, std::iter::empty(), &ctx), 30));
    Ok(())
}

fn load_positions(path: &Path) -> Result<Vec<UserBinPosition>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read positions file {}", path.display()))?;
    let positions: Vec<UserBinPosition> = serde_json::from_str(&raw)?;
    if let Some(bad) = positions
        .iter()
        .find(|p| p.amount_x.is_sign_negative() || p.amount_y.is_sign_negative())
    {
        return Err(anyhow!("Negative amounts in bin {}", bad.bin_id));
    }
    Ok(positions)
}

fn print_outcome(pool: &Pool, outcome: &ManageOutcome) {
    let (x, y) = (&pool.token_x.symbol, &pool.token_y.symbol);
    match outcome {
        ManageOutcome::Withdrawn {
            bin_id,
            amount_x,
            amount_y,
            closed,
        } => {
            println!(
                "Withdrew {:.4} {} + {:.2} {} from bin {}",
                amount_x, x, amount_y, y, bin_id
            );
            if *closed {
                println!("  Position closed");
            }
        }
        ManageOutcome::Deposited {
            bin_id,
            amount_x,
            amount_y,
            created,
        } => {
            println!(
                "Deposited {:.4} {} + {:.2} {} into bin {}",
                amount_x, x, amount_y, y, bin_id
            );
            if *created {
                println!("  New position opened");
            }
        }
    }
}

fn print_summary(pool: &Pool, summary: &PortfolioSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    if summary.is_empty() {
        println!("No positions");
        return Ok(());
    }

    let (x, y) = (&pool.token_x.symbol, &pool.token_y.symbol);
    println!("Positions ({}):", pool.pair_label());
    println!(
        "{:<10} {:<22} {:<12} {:<12} {:<8} {:<8} {:<12}",
        "Bin", "Range", x, y, "X %", "Y %", "Status"
    );
    println!("{}", "-".repeat(90));
    for bin in &summary.bins {
        println!(
            "{:<10} {:<22} {:<12} {:<12} {:<8} {:<8} {:<12}",
            bin.bin_id,
            format!("{:.2} - {:.2}", bin.price_min, bin.price_max),
            format!("{:.4}", bin.amount_x),
            format!("{:.2}", bin.amount_y),
            format!("{:.0}", bin.pct_x),
            format!("{:.0}", bin.pct_y),
            bin.status.to_string(),
        );
    }
    println!();
    println!("Total value: {:.2} {}", summary.total_value, y);
    println!("Total {}: {:.4}", x, summary.total_amount_x);
    println!("Total {}: {:.2}", y, summary.total_amount_y);
    println!(
        "Bins: {} active, {} out of range",
        summary.active_bins, summary.out_of_range_bins
    );
    Ok(())
}

fn print_prices(snapshot: &PriceSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
        return Ok(());
    }

    for (symbol, price) in &snapshot.prices {
        println!("{:<8} ${}", symbol, price);
    }
    match (&snapshot.updated_at, &snapshot.last_error) {
        (_, Some(err)) => println!("(stale: {})", err),
        (Some(at), None) => println!("(updated {})", at.to_rfc3339()),
        (None, None) => println!("(fallback quotes)"),
    }
    Ok(())
}
