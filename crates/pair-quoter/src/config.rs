//! Configuration loading: env vars, optional TOML files, CLI flags.
//!
//! Registries are described by a typed config validated once at load;
//! invalid entries reject at startup, not at first use.

use std::env;
use std::str::FromStr;

use ethers::types::{Address, U256};
use serde::Deserialize;
use tracing::info;

use crate::registry::{PoolDescriptor, PoolRegistry, TokenDescriptor, TokenRegistry};
use crate::types::{QuoterError, Result};

#[cfg(feature = "cli")]
use clap::Parser;

pub const DEFAULT_CACHE_TTL_MS: u64 = 30_000;
pub const DEFAULT_FALLBACK_RATE: f64 = 1.0;

// HyperSwap V3 deployment on HyperEVM mainnet.
const DEFAULT_QUOTER_ADDRESS: &str = "0x03A918028f22D9E1473B7959C927AD7425A45C7C";
const DEFAULT_FACTORY_ADDRESS: &str = "0xB1c0fa0B789320044A6F623cFe5eBda9562602E3";

#[derive(Clone)]
pub struct AppConfig {
    pub rpc_url: Option<String>,
    pub quoter_address: Address,
    pub factory_address: Address,
    pub cache_ttl_ms: u64,
    pub fallback_rate: f64,
    pub registry_file: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub rpc_url: Option<String>,
    pub quoter_address: Option<String>,
    pub factory_address: Option<String>,
    pub cache_ttl_ms: Option<u64>,
    pub fallback_rate: Option<f64>,
    pub registry_file: Option<String>,
}

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliConfig {
    #[arg(long)]
    pub config: Option<String>,
    #[arg(long)]
    pub rpc_url: Option<String>,
    #[arg(long)]
    pub quoter_address: Option<String>,
    #[arg(long)]
    pub factory_address: Option<String>,
    #[arg(long)]
    pub cache_ttl_ms: Option<u64>,
    #[arg(long)]
    pub fallback_rate: Option<f64>,
    #[arg(long)]
    pub registry_file: Option<String>,
}

fn parse_address(field: &str, value: &str) -> Result<Address> {
    Address::from_str(value.trim())
        .map_err(|e| QuoterError::ConfigError(format!("{}: bad address {}: {}", field, value, e)))
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let rpc_url = env::var("RPC_URL").ok();
        if rpc_url.is_none() {
            info!("RPC_URL not set; on-chain quoting will be unavailable until bound");
        }
        let quoter_address = match env::var("QUOTER_ADDRESS") {
            Ok(s) => parse_address("QUOTER_ADDRESS", &s)?,
            Err(_) => default_quoter_address(),
        };
        let factory_address = match env::var("FACTORY_ADDRESS") {
            Ok(s) => parse_address("FACTORY_ADDRESS", &s)?,
            Err(_) => default_factory_address(),
        };
        let cache_ttl_ms = env::var("CACHE_TTL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CACHE_TTL_MS);
        let fallback_rate = env::var("FALLBACK_RATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_FALLBACK_RATE);
        let registry_file = env::var("REGISTRY_FILE").ok();

        let config = Self {
            rpc_url,
            quoter_address,
            factory_address,
            cache_ttl_ms,
            fallback_rate,
            registry_file,
        };
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "cli")]
    pub fn load_with_cli() -> Result<Self> {
        let cli = CliConfig::parse();
        Self::from_cli(cli)
    }

    #[cfg(feature = "cli")]
    pub fn from_cli(cli: CliConfig) -> Result<Self> {
        let mut file_config = FileConfig::default();
        if let Some(ref path) = cli.config {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                QuoterError::ConfigError(format!("unable to read config {}: {}", path, e))
            })?;
            file_config = toml::from_str(&contents).map_err(|e| {
                QuoterError::ConfigError(format!("config {} is not valid TOML: {}", path, e))
            })?;
        }

        let rpc_url = cli
            .rpc_url
            .or(file_config.rpc_url)
            .or(env::var("RPC_URL").ok());
        let quoter_address = match cli
            .quoter_address
            .or(file_config.quoter_address)
            .or(env::var("QUOTER_ADDRESS").ok())
        {
            Some(s) => parse_address("quoter_address", &s)?,
            None => default_quoter_address(),
        };
        let factory_address = match cli
            .factory_address
            .or(file_config.factory_address)
            .or(env::var("FACTORY_ADDRESS").ok())
        {
            Some(s) => parse_address("factory_address", &s)?,
            None => default_factory_address(),
        };
        let cache_ttl_ms = cli
            .cache_ttl_ms
            .or(file_config.cache_ttl_ms)
            .or(env::var("CACHE_TTL_MS").ok().and_then(|s| s.parse().ok()))
            .unwrap_or(DEFAULT_CACHE_TTL_MS);
        let fallback_rate = cli
            .fallback_rate
            .or(file_config.fallback_rate)
            .or(env::var("FALLBACK_RATE").ok().and_then(|s| s.parse().ok()))
            .unwrap_or(DEFAULT_FALLBACK_RATE);
        let registry_file = cli
            .registry_file
            .or(file_config.registry_file)
            .or(env::var("REGISTRY_FILE").ok());

        let config = Self {
            rpc_url,
            quoter_address,
            factory_address,
            cache_ttl_ms,
            fallback_rate,
            registry_file,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.cache_ttl_ms == 0 {
            return Err(QuoterError::ConfigError("cache_ttl_ms must be positive".into()));
        }
        if !self.fallback_rate.is_finite() || self.fallback_rate <= 0.0 {
            return Err(QuoterError::ConfigError(
                "fallback_rate must be a positive finite number".into(),
            ));
        }
        Ok(())
    }

    /// Build the token and pool registries: from the configured TOML file
    /// when one is set, otherwise the compiled-in HyperEVM defaults.
    pub fn build_registries(&self) -> Result<(TokenRegistry, PoolRegistry)> {
        let registry = match &self.registry_file {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    QuoterError::ConfigError(format!("unable to read registry {}: {}", path, e))
                })?;
                // JSON first, then TOML; the file format follows whichever
                // tool exported it.
                match serde_json::from_str::<RegistryConfig>(&contents) {
                    Ok(registry) => registry,
                    Err(_) => toml::from_str::<RegistryConfig>(&contents).map_err(|e| {
                        QuoterError::ConfigError(format!(
                            "registry {} is not valid JSON nor TOML: {}",
                            path, e
                        ))
                    })?,
                }
            }
            None => default_registry(),
        };
        registry.into_registries()
    }
}

/// Registry file schema (`[[tokens]]` / `[[pools]]`). Pool order within a
/// pair is the pair's hand-assigned preference order.
#[derive(Debug, Deserialize)]
pub struct RegistryConfig {
    pub wrapped_native: String,
    pub tokens: Vec<TokenEntry>,
    pub pools: Vec<PoolEntry>,
}

#[derive(Debug, Deserialize)]
pub struct TokenEntry {
    pub symbol: String,
    pub address: String,
    pub decimals: u8,
    #[serde(default)]
    pub native: bool,
    /// Raw integer amount overriding the default probe notional.
    pub reference_amount: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PoolEntry {
    pub token_a: String,
    pub token_b: String,
    pub fee_bps: u32,
    pub address: String,
    #[serde(default)]
    pub approx_liquidity_usd: f64,
    #[serde(default)]
    pub approx_daily_volume_usd: f64,
}

impl RegistryConfig {
    pub fn into_registries(self) -> Result<(TokenRegistry, PoolRegistry)> {
        let mut tokens = Vec::with_capacity(self.tokens.len());
        for entry in self.tokens {
            let reference_override = entry
                .reference_amount
                .as_deref()
                .map(|raw| {
                    U256::from_dec_str(raw).map_err(|e| {
                        QuoterError::ConfigError(format!(
                            "token {}: bad reference_amount {}: {}",
                            entry.symbol, raw, e
                        ))
                    })
                })
                .transpose()?;
            tokens.push(TokenDescriptor {
                symbol: entry.symbol.to_uppercase(),
                address: parse_address(&entry.symbol, &entry.address)?,
                decimals: entry.decimals,
                is_native: entry.native,
                reference_override,
            });
        }
        let token_registry = TokenRegistry::new(tokens, &self.wrapped_native.to_uppercase())?;

        let mut pools = Vec::with_capacity(self.pools.len());
        for entry in self.pools {
            pools.push(PoolDescriptor {
                token_a: entry.token_a.to_uppercase(),
                token_b: entry.token_b.to_uppercase(),
                fee_bps: entry.fee_bps,
                address: parse_address("pool", &entry.address)?,
                approx_liquidity_usd: entry.approx_liquidity_usd,
                approx_daily_volume_usd: entry.approx_daily_volume_usd,
            });
        }
        let pool_registry = PoolRegistry::new(pools, &token_registry)?;
        Ok((token_registry, pool_registry))
    }
}

fn default_quoter_address() -> Address {
    Address::from_str(DEFAULT_QUOTER_ADDRESS).expect("bad default quoter address")
}

fn default_factory_address() -> Address {
    Address::from_str(DEFAULT_FACTORY_ADDRESS).expect("bad default factory address")
}

/// Compiled-in registry for the HyperEVM deployment the bot trades on.
/// Pool order per pair is the historically chosen preference, best first.
pub fn default_registry() -> RegistryConfig {
    let token = |symbol: &str, address: &str, decimals: u8, native: bool| TokenEntry {
        symbol: symbol.into(),
        address: address.into(),
        decimals,
        native,
        reference_amount: None,
    };
    let pool = |a: &str, b: &str, fee: u32, address: &str, liq: f64, vol: f64| PoolEntry {
        token_a: a.into(),
        token_b: b.into(),
        fee_bps: fee,
        address: address.into(),
        approx_liquidity_usd: liq,
        approx_daily_volume_usd: vol,
    };
    RegistryConfig {
        wrapped_native: "WHYPE".into(),
        tokens: vec![
            token("HYPE", "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE", 18, true),
            token("WHYPE", "0x5555555555555555555555555555555555555555", 18, false),
            token("UBTC", "0x9FDBdA0A5e284c32744D2f17Ee5c74B284993463", 8, false),
            token("USDT0", "0xB8CE59FC3717ada4C02eaDF9682A9e934F625ebb", 6, false),
            token("UETH", "0xBe6727B535545C67d5cAa73dEa54865B92CF7907", 18, false),
        ],
        pools: vec![
            pool(
                "WHYPE",
                "USDT0",
                3000,
                "0x337B56d87A6185cD46AF3Ac2cDF03CBC37070C30",
                9_500_000.0,
                3_200_000.0,
            ),
            pool(
                "WHYPE",
                "USDT0",
                500,
                "0x56aBfaf40F5B7464e9cC8cFF1af13863D6914508",
                1_800_000.0,
                900_000.0,
            ),
            pool(
                "WHYPE",
                "USDT0",
                10000,
                "0x0Bf4cF725CdeAE3AE1Bae9A78BB72D01F73E5068",
                120_000.0,
                15_000.0,
            ),
            pool(
                "WHYPE",
                "UBTC",
                3000,
                "0x3A36B04bcC1d5E2e303981eF643D2668E00b43E7",
                2_400_000.0,
                410_000.0,
            ),
            pool(
                "UBTC",
                "USDT0",
                3000,
                "0xbBcF8523811060e1c112a8459284a48A4B17661f",
                1_100_000.0,
                270_000.0,
            ),
            pool(
                "WHYPE",
                "UETH",
                3000,
                "0x719D7F4388CB0efB6A48f3c3266E443edce6588A",
                860_000.0,
                190_000.0,
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_validates() {
        let (tokens, pools) = default_registry().into_registries().unwrap();
        assert_eq!(tokens.native().symbol, "HYPE");
        assert_eq!(tokens.wrapped_native().symbol, "WHYPE");
        assert_eq!(pools.candidate_pools("USDT0", "WHYPE").len(), 3);
        // Preferred fee tier first, fallbacks after.
        assert_eq!(pools.candidate_pools("WHYPE", "USDT0")[0].fee_bps, 3000);
    }

    #[test]
    fn registry_toml_round_trip() {
        let toml_src = r#"
            wrapped_native = "WHYPE"

            [[tokens]]
            symbol = "HYPE"
            address = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE"
            decimals = 18
            native = true

            [[tokens]]
            symbol = "whype"
            address = "0x5555555555555555555555555555555555555555"
            decimals = 18

            [[tokens]]
            symbol = "UBTC"
            address = "0x9FDBdA0A5e284c32744D2f17Ee5c74B284993463"
            decimals = 8
            reference_amount = "250000"

            [[pools]]
            token_a = "WHYPE"
            token_b = "UBTC"
            fee_bps = 3000
            address = "0x3A36B04bcC1d5E2e303981eF643D2668E00b43E7"
            approx_liquidity_usd = 2400000.0
        "#;
        let config: RegistryConfig = toml::from_str(toml_src).unwrap();
        let (tokens, pools) = config.into_registries().unwrap();
        assert_eq!(tokens.resolve("WHYPE").unwrap().decimals, 18);
        assert_eq!(
            tokens.resolve("UBTC").unwrap().reference_amount(),
            U256::from(250_000u64)
        );
        assert_eq!(pools.candidate_pools("ubtc", "whype").len(), 1);
    }

    #[test]
    fn bad_registry_rejected_at_load() {
        let mut config = default_registry();
        config.tokens[1].address = "not-an-address".into();
        assert!(matches!(
            config.into_registries(),
            Err(QuoterError::ConfigError(_))
        ));
    }
}
