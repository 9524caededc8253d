//! Pair pricing over the candidate-pool preference chain.

use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use ethers::types::{Address, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::cache::{CacheMetrics, QuoteCache};
use crate::config::AppConfig;
use crate::registry::{PoolRegistry, TokenDescriptor, TokenRegistry};
use crate::resolver::QuoteResolver;
use crate::simulator::{QuoterV2Simulator, SwapSimulator};
use crate::types::{PairPrice, QuoteResult, QuoteSource, QuoterError, Result};

// Hand-tuned fee-tier orderings for the two pairs the grid trades most.
// These bypass the generic registry walk; a pragmatic override kept from
// observed depth, not a general mechanism.
const WRAPPED_NATIVE_STABLE_FEES: [u32; 2] = [3000, 500];
const WRAPPED_NATIVE_BTC_FEES: [u32; 1] = [3000];

const STABLE_SYMBOL: &str = "USDT0";
const BTC_SYMBOL: &str = "UBTC";

/// The engine context: registries, cache, resolver, all built once at
/// startup and shared by reference. No ambient globals.
pub struct PriceEngine {
    pub tokens: Arc<TokenRegistry>,
    pub pools: Arc<PoolRegistry>,
    pub resolver: QuoteResolver,
    cache: Arc<RwLock<QuoteCache>>,
    simulator: Option<Arc<dyn SwapSimulator>>,
}

impl PriceEngine {
    pub fn new(
        tokens: Arc<TokenRegistry>,
        pools: Arc<PoolRegistry>,
        cache: Arc<RwLock<QuoteCache>>,
        simulator: Option<Arc<dyn SwapSimulator>>,
        fallback_rate: f64,
    ) -> Self {
        let resolver = QuoteResolver::new(
            tokens.clone(),
            cache.clone(),
            simulator.clone(),
            fallback_rate,
        );
        Self {
            tokens,
            pools,
            resolver,
            cache,
            simulator,
        }
    }

    /// Build the whole engine from configuration. Registries validate
    /// here; a simulator is bound only when an RPC URL is configured.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let (tokens, pools) = config.build_registries()?;
        info!(
            pairs = pools.pair_count(),
            native = %tokens.native().symbol,
            ttl_ms = config.cache_ttl_ms,
            "price engine initialized"
        );
        let cache = Arc::new(RwLock::new(QuoteCache::new(Duration::from_millis(
            config.cache_ttl_ms,
        ))));
        let simulator: Option<Arc<dyn SwapSimulator>> = match &config.rpc_url {
            Some(url) => Some(Arc::new(
                QuoterV2Simulator::new(url, config.quoter_address, config.factory_address)
                    .map_err(|e| QuoterError::ConfigError(e.to_string()))?,
            )),
            None => None,
        };
        Ok(Self::new(
            Arc::new(tokens),
            Arc::new(pools),
            cache,
            simulator,
            config.fallback_rate,
        ))
    }

    /// Price one reference unit of `base` in `quote` units.
    ///
    /// `Ok(None)` is the defined no-route outcome (unknown symbol or no
    /// configured pool); it is never an error. Candidate pools are tried
    /// in preference order, stopping at the first value that did not come
    /// from the synthetic fallback; when every candidate fails the last
    /// fallback value is accepted and tagged as such.
    pub async fn price_of(
        &self,
        base_symbol: &str,
        quote_symbol: &str,
        force_fresh: bool,
    ) -> Result<Option<PairPrice>> {
        let Some(base) = self.tokens.resolve(base_symbol) else {
            return Ok(None);
        };
        let Some(quote) = self.tokens.resolve(quote_symbol) else {
            return Ok(None);
        };
        // The native asset has no pools of its own; it prices through its
        // wrapped counterpart on both sides of the pair.
        let wrapped = self.tokens.wrapped_native();
        let base = if base.is_native { wrapped.clone() } else { base.clone() };
        let quote = if quote.is_native { wrapped.clone() } else { quote.clone() };

        // Dedicated routines for the hot pairs; everything else walks the
        // registry.
        if base.symbol == wrapped.symbol {
            if quote.symbol == STABLE_SYMBOL {
                return self.price_wrapped_native_stable(force_fresh).await;
            }
            if quote.symbol == BTC_SYMBOL {
                return self.price_wrapped_native_btc(force_fresh).await;
            }
        }
        let fees: Vec<u32> = self
            .pools
            .candidate_pools(&base.symbol, &quote.symbol)
            .iter()
            .map(|p| p.fee_bps)
            .collect();
        if fees.is_empty() {
            return Ok(None);
        }
        self.quote_fee_chain(&base, &quote, &fees, force_fresh).await
    }

    /// WHYPE priced in the primary stablecoin, hard-coded pool ordering.
    async fn price_wrapped_native_stable(&self, force_fresh: bool) -> Result<Option<PairPrice>> {
        let base = self.tokens.wrapped_native().clone();
        let Some(quote) = self.tokens.resolve(STABLE_SYMBOL).cloned() else {
            return Ok(None);
        };
        self.quote_fee_chain(&base, &quote, &WRAPPED_NATIVE_STABLE_FEES, force_fresh)
            .await
    }

    /// WHYPE priced in the BTC-pegged asset, hard-coded pool ordering.
    async fn price_wrapped_native_btc(&self, force_fresh: bool) -> Result<Option<PairPrice>> {
        let base = self.tokens.wrapped_native().clone();
        let Some(quote) = self.tokens.resolve(BTC_SYMBOL).cloned() else {
            return Ok(None);
        };
        self.quote_fee_chain(&base, &quote, &WRAPPED_NATIVE_BTC_FEES, force_fresh)
            .await
    }

    /// The multi-tier fallback chain shared by the generic and dedicated
    /// paths.
    async fn quote_fee_chain(
        &self,
        base: &TokenDescriptor,
        quote: &TokenDescriptor,
        fees: &[u32],
        force_fresh: bool,
    ) -> Result<Option<PairPrice>> {
        let amount_in = base.reference_amount();
        let mut last: Option<(QuoteResult, u32)> = None;

        for &fee_bps in fees {
            let result = self
                .resolver
                .resolve_addresses(base.address, quote.address, amount_in, fee_bps, force_fresh)
                .await?;
            let degraded = result.source == QuoteSource::FallbackEstimate;
            last = Some((result, fee_bps));
            if !degraded {
                break;
            }
            warn!(
                base = %base.symbol,
                quote = %quote.symbol,
                fee_bps,
                "candidate pool quote degraded, trying next candidate"
            );
        }

        Ok(last.map(|(result, fee_bps)| PairPrice {
            price: amount_to_price(result.amount_out, quote.decimals),
            source: result.source,
            fee_bps,
            observed_at_epoch_ms: result.observed_at_epoch_ms,
        }))
    }

    /// Factory existence check for a candidate pool; diagnostics only.
    pub async fn verify_pool(
        &self,
        base_symbol: &str,
        quote_symbol: &str,
        fee_bps: u32,
    ) -> anyhow::Result<Option<Address>> {
        let base = self
            .tokens
            .resolve(base_symbol)
            .ok_or_else(|| QuoterError::UnknownSymbol(base_symbol.to_string()))?;
        let quote = self
            .tokens
            .resolve(quote_symbol)
            .ok_or_else(|| QuoterError::UnknownSymbol(quote_symbol.to_string()))?;
        let simulator = self
            .simulator
            .as_ref()
            .ok_or(QuoterError::Uninitialized("no swap simulator bound"))?;
        simulator
            .pool_address(
                self.tokens.pool_address_for(base.address),
                self.tokens.pool_address_for(quote.address),
                fee_bps,
            )
            .await
    }

    pub fn cache_metrics(&self) -> CacheMetrics {
        self.cache.read().unwrap().metrics()
    }

    /// Diagnostics/testing hook; steady-state operation never clears.
    pub fn clear_cache(&self) {
        self.cache.write().unwrap().clear();
    }
}

/// Convert a raw integer output amount to a human-readable price using the
/// quote token's decimals.
pub fn amount_to_price(amount_out: U256, decimals: u8) -> f64 {
    match Decimal::from_str(&amount_out.to_string()) {
        Ok(d) => (d / Decimal::from(10u64.pow(decimals as u32)))
            .to_f64()
            .unwrap_or(0.0),
        // Values past Decimal's 96-bit mantissa degrade to f64 math.
        Err(_) => {
            amount_out.to_string().parse::<f64>().unwrap_or(f64::MAX)
                / 10f64.powi(decimals as i32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_conversion_round_trips() {
        assert_eq!(amount_to_price(U256::from(100_000_000u64), 8), 1.0);
        assert_eq!(amount_to_price(U256::from(1_500_000u64), 6), 1.5);
        assert_eq!(amount_to_price(U256::from(847u64), 8), 0.00000847);
        assert_eq!(amount_to_price(U256::exp10(18), 18), 1.0);
        assert_eq!(amount_to_price(U256::zero(), 6), 0.0);
    }
}
