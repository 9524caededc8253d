//! Quote resolution: cache first, QuoterV2 simulation on a miss, synthetic
//! estimate when the chain cannot be reached.

use std::str::FromStr;
use std::sync::{Arc, RwLock};

use ethers::types::{Address, U256};
use tracing::{debug, warn};

use crate::cache::{CachedQuote, QuoteCache};
use crate::registry::TokenRegistry;
use crate::simulator::SwapSimulator;
use crate::types::{epoch_ms_now, QuoteRequest, QuoteResult, QuoteSource, QuoterError, Result};

// Precision of the fallback conversion factor when applied in integer space.
const RATE_SCALE: u128 = 1_000_000_000;

pub struct QuoteResolver {
    tokens: Arc<TokenRegistry>,
    cache: Arc<RwLock<QuoteCache>>,
    simulator: Option<Arc<dyn SwapSimulator>>,
    fallback_rate: f64,
}

impl QuoteResolver {
    pub fn new(
        tokens: Arc<TokenRegistry>,
        cache: Arc<RwLock<QuoteCache>>,
        simulator: Option<Arc<dyn SwapSimulator>>,
        fallback_rate: f64,
    ) -> Self {
        Self {
            tokens,
            cache,
            simulator,
            fallback_rate,
        }
    }

    /// String-address entry point used by the CLI swap tool. Malformed
    /// input fails with `InvalidAddress`, never a fallback.
    pub async fn resolve(
        &self,
        token_in: &str,
        token_out: &str,
        amount_in: U256,
        fee_bps: u32,
        force_fresh: bool,
    ) -> Result<QuoteResult> {
        let token_in = Address::from_str(token_in.trim())
            .map_err(|_| QuoterError::InvalidAddress(token_in.to_string()))?;
        let token_out = Address::from_str(token_out.trim())
            .map_err(|_| QuoterError::InvalidAddress(token_out.to_string()))?;
        self.resolve_addresses(token_in, token_out, amount_in, fee_bps, force_fresh)
            .await
    }

    /// Resolve one (token_in, token_out, amount, fee tier) request.
    ///
    /// Native-asset addresses are rewritten to the wrapped counterpart
    /// before anything else; the substitution never changes the `source`
    /// tag. On-chain failures are absorbed into a `FallbackEstimate`
    /// result, they never propagate to the caller from this path.
    pub async fn resolve_addresses(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        fee_bps: u32,
        force_fresh: bool,
    ) -> Result<QuoteResult> {
        let token_in = self.tokens.pool_address_for(token_in);
        let token_out = self.tokens.pool_address_for(token_out);

        if token_in.is_zero() || token_out.is_zero() {
            return Err(QuoterError::InvalidAddress("zero address".into()));
        }
        if token_in == token_out {
            return Err(QuoterError::InvalidAddress(format!(
                "token_in and token_out are both {:?}",
                token_in
            )));
        }

        let key = QuoteRequest {
            token_in,
            token_out,
            amount_in,
            fee_bps,
        };

        if !force_fresh {
            if let Some(hit) = self.cache.write().unwrap().get(&key) {
                return Ok(QuoteResult {
                    amount_out: hit.amount_out,
                    source: QuoteSource::Cache,
                    gas_estimate: hit.gas_estimate,
                    observed_at_epoch_ms: hit.observed_at_epoch_ms,
                });
            }
        }

        let simulator = self
            .simulator
            .as_ref()
            .ok_or(QuoterError::Uninitialized("no swap simulator bound"))?;

        match simulator
            .quote_exact_input_single(token_in, token_out, amount_in, fee_bps)
            .await
        {
            Ok(sim) => {
                let observed_at_epoch_ms = epoch_ms_now();
                self.cache.write().unwrap().put(
                    key,
                    CachedQuote {
                        amount_out: sim.amount_out,
                        gas_estimate: Some(sim.gas_estimate),
                        observed_at_epoch_ms,
                    },
                );
                Ok(QuoteResult {
                    amount_out: sim.amount_out,
                    source: QuoteSource::OnChain,
                    gas_estimate: Some(sim.gas_estimate),
                    observed_at_epoch_ms,
                })
            }
            Err(err) => {
                warn!(
                    ?token_in,
                    ?token_out,
                    fee_bps,
                    error = %err,
                    "on-chain quote failed, returning synthetic fallback estimate"
                );
                let amount_out = self.fallback_estimate(token_in, token_out, amount_in);
                let observed_at_epoch_ms = epoch_ms_now();
                self.cache.write().unwrap().put(
                    key,
                    CachedQuote {
                        amount_out,
                        gas_estimate: None,
                        observed_at_epoch_ms,
                    },
                );
                Ok(QuoteResult {
                    amount_out,
                    source: QuoteSource::FallbackEstimate,
                    gas_estimate: None,
                    observed_at_epoch_ms,
                })
            }
        }
    }

    /// Deterministic synthetic estimate: the fixed linear conversion rate
    /// applied in integer space, adjusted for the decimal spread between
    /// the two tokens. Tokens missing from the registry assume 18 decimals.
    fn fallback_estimate(&self, token_in: Address, token_out: Address, amount_in: U256) -> U256 {
        let dec_in = self
            .tokens
            .by_address(&token_in)
            .map(|t| t.decimals)
            .unwrap_or(18) as u32;
        let dec_out = self
            .tokens
            .by_address(&token_out)
            .map(|t| t.decimals)
            .unwrap_or(18) as u32;

        let rate_scaled = U256::from((self.fallback_rate * RATE_SCALE as f64) as u128);
        let scaled = amount_in
            .checked_mul(rate_scaled)
            .unwrap_or(U256::MAX);

        let estimate = if dec_out >= dec_in {
            scaled
                .checked_mul(U256::exp10((dec_out - dec_in) as usize))
                .unwrap_or(U256::MAX)
                / U256::from(RATE_SCALE)
        } else {
            scaled / U256::from(RATE_SCALE) / U256::exp10((dec_in - dec_out) as usize)
        };
        debug!(?token_in, ?token_out, %amount_in, %estimate, "synthetic fallback estimate");
        estimate
    }
}
