//! Block clock backed by the liquidity provider.

use async_trait::async_trait;
use risk_liquidity::LiquiditySourceInterface;
use risk_types::{BlockNumber, Timestamp};
use risk_volatility::{BlockClockInterface, VolatilityError};
use std::sync::Arc;

/// Reads block timestamps from the provider that also serves prices.
#[derive(Clone)]
pub struct SourceClock {
	source: Arc<dyn LiquiditySourceInterface>,
}

impl SourceClock {
	pub fn new(source: Arc<dyn LiquiditySourceInterface>) -> Self {
		Self { source }
	}
}

#[async_trait]
impl BlockClockInterface for SourceClock {
	async fn timestamp(&self, block: BlockNumber) -> Result<Option<Timestamp>, VolatilityError> {
		self.source
			.block_timestamp(block)
			.await
			.map_err(|e| VolatilityError::Clock(e.to_string()))
	}
}
