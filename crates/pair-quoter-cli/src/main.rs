use std::str::FromStr;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ethers::types::{Address, U256};
use rust_decimal::Decimal;

use pair_quoter::config::{AppConfig, CliConfig};
use pair_quoter::engine::PriceEngine;
use pair_quoter::types::QuoteSource;

#[derive(Parser)]
#[command(name = "pair-quoter", about = "Quote HyperSwap pools from the command line")]
struct Cli {
    #[command(flatten)]
    config: CliConfig,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pair price through the candidate-pool preference chain
    Price {
        base: String,
        quote: String,
        /// Skip the quote cache and force an on-chain read
        #[arg(long)]
        fresh: bool,
    },
    /// Raw single-pool quote, e.g. to estimate a manual swap before confirming it
    Quote {
        #[arg(long)]
        token_in: String,
        #[arg(long)]
        token_out: String,
        /// Raw integer input amount, in token_in decimals
        #[arg(long)]
        amount_in: String,
        #[arg(long, default_value_t = 3000)]
        fee_bps: u32,
        #[arg(long)]
        fresh: bool,
    },
    /// List configured candidate pools for a pair and check them against the factory
    Pools { base: String, quote: String },
}

// Format a raw integer amount with the token's decimals for display.
fn format_token_amount(raw: U256, decimals: u8) -> String {
    let divisor = Decimal::from(10u64.pow(decimals as u32));
    match Decimal::from_str(&raw.to_string()) {
        Ok(d) => (d / divisor).round_dp(6).to_string(),
        Err(_) => raw.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli.config)?;
    let engine = PriceEngine::from_config(&config)?;

    match cli.command {
        Command::Price { base, quote, fresh } => match engine.price_of(&base, &quote, fresh).await? {
            Some(price) => {
                println!(
                    "{} {} per {}  (source: {:?}, fee tier {} bps)",
                    price.price,
                    quote.to_uppercase(),
                    base.to_uppercase(),
                    price.source,
                    price.fee_bps
                );
                if price.source == QuoteSource::FallbackEstimate {
                    eprintln!("warning: synthetic fallback value, do not size trades on it");
                }
            }
            None => println!("no route for {}/{}", base, quote),
        },
        Command::Quote {
            token_in,
            token_out,
            amount_in,
            fee_bps,
            fresh,
        } => {
            let amount = U256::from_dec_str(&amount_in)?;
            let result = engine
                .resolver
                .resolve(&token_in, &token_out, amount, fee_bps, fresh)
                .await?;
            if let Some(out_token) = Address::from_str(token_out.trim())
                .ok()
                .and_then(|addr| engine.tokens.by_address(&addr))
            {
                println!(
                    "amount out: {} {}",
                    format_token_amount(result.amount_out, out_token.decimals),
                    out_token.symbol
                );
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Pools { base, quote } => {
            let candidates = engine.pools.candidate_pools(&base, &quote);
            if candidates.is_empty() {
                println!("no pools configured for {}/{}", base, quote);
            }
            for pool in candidates {
                let on_chain = engine.verify_pool(&base, &quote, pool.fee_bps).await?;
                println!(
                    "fee {:>5} bps  {:?}  ~${:.0} liquidity  factory: {}",
                    pool.fee_bps,
                    pool.address,
                    pool.approx_liquidity_usd,
                    match on_chain {
                        Some(addr) => format!("{:?}", addr),
                        None => "missing".to_string(),
                    }
                );
            }
        }
    }
    Ok(())
}
