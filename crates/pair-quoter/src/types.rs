//! Common types, enums, error handling, data models.

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Common error type for the pair-quoter engine.
///
/// Only validation and initialization failures surface here; transient
/// on-chain failures never do, they are absorbed into the fallback path
/// and signaled via [`QuoteSource::FallbackEstimate`].
#[derive(Debug, Error)]
pub enum QuoterError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),
    #[error("quoting contract not bound: {0}")]
    Uninitialized(&'static str),
    #[error("config error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, QuoterError>;

/// Where a quote's value came from. Consumers MUST inspect this before
/// sizing a trade: `FallbackEstimate` means the value is synthetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteSource {
    OnChain,
    Cache,
    FallbackEstimate,
}

/// Identity of a single-pool quote. The exact 4-tuple is the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuoteRequest {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub fee_bps: u32,
}

/// Outcome of a quote resolution, immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteResult {
    pub amount_out: U256,
    pub source: QuoteSource,
    pub gas_estimate: Option<u64>,
    pub observed_at_epoch_ms: i64,
}

/// A human-readable pair price produced by the aggregator.
#[derive(Debug, Clone, Serialize)]
pub struct PairPrice {
    /// Units of the quote token per one reference unit of the base token.
    pub price: f64,
    pub source: QuoteSource,
    /// Fee tier of the pool the accepted value came from.
    pub fee_bps: u32,
    pub observed_at_epoch_ms: i64,
}

pub fn epoch_ms_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
