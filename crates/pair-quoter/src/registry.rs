//! Static token and pool registries, built once at startup and read-only
//! for the process lifetime.

use std::collections::HashMap;

use ethers::types::{Address, U256};
use indexmap::IndexMap;

use crate::types::{QuoterError, Result};

/// Immutable token metadata. One entry has `is_native = true`; its wrapped
/// counterpart is the only form that appears in pools, at a fixed 1:1 rate.
#[derive(Debug, Clone)]
pub struct TokenDescriptor {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
    pub is_native: bool,
    /// Optional per-token override for the standard probe notional.
    pub reference_override: Option<U256>,
}

impl TokenDescriptor {
    /// Standard reference input amount used when pricing a pair: 1 whole
    /// unit for most assets, 0.001 unit for 8-decimal BTC-pegged assets.
    /// Chosen to stay below typical pool-depth slippage thresholds.
    pub fn reference_amount(&self) -> U256 {
        if let Some(amount) = self.reference_override {
            return amount;
        }
        match self.decimals {
            8 => U256::exp10(5),
            d => U256::exp10(d as usize),
        }
    }
}

/// Symbol -> descriptor mapping with native/wrapped alias handling.
pub struct TokenRegistry {
    by_symbol: IndexMap<String, TokenDescriptor>,
    by_address: HashMap<Address, String>,
    native_symbol: String,
    wrapped_symbol: String,
}

impl TokenRegistry {
    pub fn new(tokens: Vec<TokenDescriptor>, wrapped_symbol: &str) -> Result<Self> {
        let mut by_symbol = IndexMap::new();
        let mut by_address = HashMap::new();
        let mut native_symbol: Option<String> = None;

        for token in tokens {
            if token.decimals > 18 {
                return Err(QuoterError::ConfigError(format!(
                    "token {} has {} decimals, max is 18",
                    token.symbol, token.decimals
                )));
            }
            if token.is_native {
                if let Some(prev) = &native_symbol {
                    return Err(QuoterError::ConfigError(format!(
                        "both {} and {} are marked native",
                        prev, token.symbol
                    )));
                }
                native_symbol = Some(token.symbol.clone());
            }
            if by_address.insert(token.address, token.symbol.clone()).is_some() {
                return Err(QuoterError::ConfigError(format!(
                    "duplicate token address {:?}",
                    token.address
                )));
            }
            if by_symbol.insert(token.symbol.clone(), token).is_some() {
                return Err(QuoterError::ConfigError("duplicate token symbol".into()));
            }
        }

        let native_symbol = native_symbol
            .ok_or_else(|| QuoterError::ConfigError("no token marked native".into()))?;
        let wrapped = by_symbol
            .get(wrapped_symbol)
            .ok_or_else(|| {
                QuoterError::ConfigError(format!("wrapped token {} not in registry", wrapped_symbol))
            })?;
        if wrapped.is_native {
            return Err(QuoterError::ConfigError(
                "wrapped counterpart cannot itself be the native token".into(),
            ));
        }

        Ok(Self {
            by_symbol,
            by_address,
            native_symbol,
            wrapped_symbol: wrapped_symbol.to_string(),
        })
    }

    /// Look a token up by symbol (case-insensitive).
    pub fn resolve(&self, symbol: &str) -> Option<&TokenDescriptor> {
        self.by_symbol.get(&symbol.to_uppercase())
    }

    pub fn decimals_of(&self, symbol: &str) -> Option<u8> {
        self.resolve(symbol).map(|t| t.decimals)
    }

    pub fn by_address(&self, address: &Address) -> Option<&TokenDescriptor> {
        self.by_address
            .get(address)
            .and_then(|sym| self.by_symbol.get(sym))
    }

    pub fn native(&self) -> &TokenDescriptor {
        &self.by_symbol[&self.native_symbol]
    }

    pub fn wrapped_native(&self) -> &TokenDescriptor {
        &self.by_symbol[&self.wrapped_symbol]
    }

    pub fn is_native_address(&self, address: &Address) -> bool {
        *address == self.native().address
    }

    /// Address used in actual pool interactions: the native asset is
    /// rewritten to its wrapped counterpart, everything else is unchanged.
    /// Address substitution only, the pair trades 1:1 by construction.
    pub fn pool_address_for(&self, address: Address) -> Address {
        if self.is_native_address(&address) {
            self.wrapped_native().address
        } else {
            address
        }
    }
}

/// Unordered pair key, normalized so (A,B) and (B,A) collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey(String, String);

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        let a = a.to_uppercase();
        let b = b.to_uppercase();
        if a <= b {
            PairKey(a, b)
        } else {
            PairKey(b, a)
        }
    }
}

/// A known liquidity pool for one pair at one fee tier.
#[derive(Debug, Clone)]
pub struct PoolDescriptor {
    pub token_a: String,
    pub token_b: String,
    pub fee_bps: u32,
    pub address: Address,
    pub approx_liquidity_usd: f64,
    pub approx_daily_volume_usd: f64,
}

/// Pair -> preference-ordered pool list. The order is the hand-assigned
/// per-pair preference from configuration, not a liquidity sort.
pub struct PoolRegistry {
    by_pair: IndexMap<PairKey, Vec<PoolDescriptor>>,
}

impl PoolRegistry {
    pub fn new(pools: Vec<PoolDescriptor>, tokens: &TokenRegistry) -> Result<Self> {
        let mut by_pair: IndexMap<PairKey, Vec<PoolDescriptor>> = IndexMap::new();
        for pool in pools {
            for sym in [&pool.token_a, &pool.token_b] {
                if tokens.resolve(sym).is_none() {
                    return Err(QuoterError::ConfigError(format!(
                        "pool {}/{} references unknown token {}",
                        pool.token_a, pool.token_b, sym
                    )));
                }
            }
            let key = PairKey::new(&pool.token_a, &pool.token_b);
            let entry = by_pair.entry(key).or_default();
            if entry.iter().any(|p| p.fee_bps == pool.fee_bps) {
                return Err(QuoterError::ConfigError(format!(
                    "duplicate pool for {}/{} at fee tier {}",
                    pool.token_a, pool.token_b, pool.fee_bps
                )));
            }
            entry.push(pool);
        }
        Ok(Self { by_pair })
    }

    /// Ordered candidate pools for a pair. Symmetric in its arguments; an
    /// unknown pair yields an empty slice, the defined "no route" condition.
    pub fn candidate_pools(&self, symbol_a: &str, symbol_b: &str) -> &[PoolDescriptor] {
        self.by_pair
            .get(&PairKey::new(symbol_a, symbol_b))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn pair_count(&self) -> usize {
        self.by_pair.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn addr(n: u64) -> Address {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Address::from(bytes)
    }

    fn token(symbol: &str, decimals: u8, is_native: bool, n: u64) -> TokenDescriptor {
        TokenDescriptor {
            symbol: symbol.to_string(),
            address: addr(n),
            decimals,
            is_native,
            reference_override: None,
        }
    }

    fn test_tokens() -> TokenRegistry {
        TokenRegistry::new(
            vec![
                token("HYPE", 18, true, 1),
                token("WHYPE", 18, false, 2),
                token("UBTC", 8, false, 3),
                token("USDT0", 6, false, 4),
            ],
            "WHYPE",
        )
        .unwrap()
    }

    #[test]
    fn pair_lookup_is_symmetric() {
        let tokens = test_tokens();
        let pools = PoolRegistry::new(
            vec![
                PoolDescriptor {
                    token_a: "WHYPE".into(),
                    token_b: "UBTC".into(),
                    fee_bps: 3000,
                    address: addr(10),
                    approx_liquidity_usd: 2_000_000.0,
                    approx_daily_volume_usd: 400_000.0,
                },
                PoolDescriptor {
                    token_a: "WHYPE".into(),
                    token_b: "UBTC".into(),
                    fee_bps: 500,
                    address: addr(11),
                    approx_liquidity_usd: 300_000.0,
                    approx_daily_volume_usd: 25_000.0,
                },
            ],
            &tokens,
        )
        .unwrap();

        let forward: Vec<u32> = pools
            .candidate_pools("WHYPE", "UBTC")
            .iter()
            .map(|p| p.fee_bps)
            .collect();
        let reverse: Vec<u32> = pools
            .candidate_pools("UBTC", "WHYPE")
            .iter()
            .map(|p| p.fee_bps)
            .collect();
        assert_eq!(forward, vec![3000, 500]);
        assert_eq!(forward, reverse);
    }

    #[test]
    fn unknown_pair_is_no_route_not_error() {
        let tokens = test_tokens();
        let pools = PoolRegistry::new(vec![], &tokens).unwrap();
        assert!(pools.candidate_pools("WHYPE", "ZZZ").is_empty());
    }

    #[test]
    fn duplicate_fee_tier_rejected_at_load() {
        let tokens = test_tokens();
        let dup = |fee| PoolDescriptor {
            token_a: "WHYPE".into(),
            token_b: "USDT0".into(),
            fee_bps: fee,
            address: addr(20),
            approx_liquidity_usd: 0.0,
            approx_daily_volume_usd: 0.0,
        };
        let err = PoolRegistry::new(vec![dup(3000), dup(3000)], &tokens);
        assert!(matches!(err, Err(QuoterError::ConfigError(_))));
    }

    #[test]
    fn exactly_one_native_enforced() {
        let err = TokenRegistry::new(
            vec![token("HYPE", 18, true, 1), token("ALSO", 18, true, 2)],
            "ALSO",
        );
        assert!(matches!(err, Err(QuoterError::ConfigError(_))));

        let err = TokenRegistry::new(vec![token("WHYPE", 18, false, 2)], "WHYPE");
        assert!(matches!(err, Err(QuoterError::ConfigError(_))));
    }

    #[test]
    fn native_rewrites_to_wrapped_for_pool_use() {
        let tokens = test_tokens();
        let native = tokens.native().address;
        let wrapped = tokens.wrapped_native().address;
        assert_eq!(tokens.pool_address_for(native), wrapped);
        assert_eq!(tokens.pool_address_for(wrapped), wrapped);
        assert_eq!(
            tokens.pool_address_for(Address::from_str("0x9fdbda0a5e284c32744d2f17ee5c74b284993463").unwrap()),
            Address::from_str("0x9FDBdA0A5e284c32744D2f17Ee5c74B284993463").unwrap()
        );
    }

    #[test]
    fn reference_amounts_follow_decimals() {
        let tokens = test_tokens();
        assert_eq!(tokens.decimals_of("UBTC"), Some(8));
        assert_eq!(tokens.decimals_of("usdt0"), Some(6));
        assert_eq!(tokens.decimals_of("ZZZ"), None);
        assert_eq!(
            tokens.resolve("whype").unwrap().reference_amount(),
            U256::exp10(18)
        );
        // 0.001 BTC-sized probe for the 8-decimal asset
        assert_eq!(
            tokens.resolve("UBTC").unwrap().reference_amount(),
            U256::from(100_000u64)
        );
        assert_eq!(
            tokens.resolve("USDT0").unwrap().reference_amount(),
            U256::exp10(6)
        );
    }
}
