//! On-chain simulation boundary: the only module that talks to the RPC.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::providers::{Http, Provider};
use ethers::types::{Address, U256};
use tracing::debug;

use crate::bindings::{QuoteExactInputSingleParams, QuoterV2, V3Factory};

/// Raw result of a read-only `quoteExactInputSingle` simulation.
#[derive(Debug, Clone)]
pub struct SimulatedSwap {
    pub amount_out: U256,
    pub sqrt_price_x96_after: U256,
    pub initialized_ticks_crossed: u32,
    pub gas_estimate: u64,
}

/// Seam between the resolver and the chain. The production implementation
/// wraps the QuoterV2/factory contracts; tests substitute their own.
#[async_trait]
pub trait SwapSimulator: Send + Sync {
    /// Simulate a single-pool exact-input swap. Must be issued as a
    /// state-non-mutating call, never a transaction broadcast.
    async fn quote_exact_input_single(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        fee_bps: u32,
    ) -> anyhow::Result<SimulatedSwap>;

    /// Factory `getPool` lookup; `None` when the zero address comes back.
    /// Peripheral diagnostics path, not part of hot pricing.
    async fn pool_address(
        &self,
        token_a: Address,
        token_b: Address,
        fee_bps: u32,
    ) -> anyhow::Result<Option<Address>>;
}

/// QuoterV2-backed simulator over a plain HTTP JSON-RPC provider.
pub struct QuoterV2Simulator {
    quoter: Address,
    factory: Address,
    client: Arc<Provider<Http>>,
}

impl QuoterV2Simulator {
    pub fn new(rpc_url: &str, quoter: Address, factory: Address) -> anyhow::Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)?;
        Ok(Self {
            quoter,
            factory,
            client: Arc::new(provider),
        })
    }
}

#[async_trait]
impl SwapSimulator for QuoterV2Simulator {
    async fn quote_exact_input_single(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        fee_bps: u32,
    ) -> anyhow::Result<SimulatedSwap> {
        let quoter = QuoterV2::new(self.quoter, self.client.clone());
        let params = QuoteExactInputSingleParams {
            token_in,
            token_out,
            amount_in,
            fee: fee_bps,
            sqrt_price_limit_x96: U256::zero(),
        };
        let (amount_out, sqrt_price_x96_after, initialized_ticks_crossed, gas_estimate) =
            quoter.quote_exact_input_single(params).call().await?;
        debug!(
            ?token_in,
            ?token_out,
            %amount_in,
            fee_bps,
            %amount_out,
            "quoteExactInputSingle simulated"
        );
        let gas_estimate = if gas_estimate > U256::from(u64::MAX) {
            u64::MAX
        } else {
            gas_estimate.as_u64()
        };
        Ok(SimulatedSwap {
            amount_out,
            sqrt_price_x96_after,
            initialized_ticks_crossed,
            gas_estimate,
        })
    }

    async fn pool_address(
        &self,
        token_a: Address,
        token_b: Address,
        fee_bps: u32,
    ) -> anyhow::Result<Option<Address>> {
        let factory = V3Factory::new(self.factory, self.client.clone());
        let pool = factory.get_pool(token_a, token_b, fee_bps).call().await?;
        Ok((!pool.is_zero()).then_some(pool))
    }
}
