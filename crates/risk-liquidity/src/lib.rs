//! Liquidity aggregation for the risk engine.
//!
//! This crate turns raw pool state into slippage curves and combines those
//! curves across venues and through pivot assets. It provides:
//!
//! - the tick liquidity scanner for concentrated-liquidity pools
//! - slippage map algebra (sum, average, difference)
//! - the pivot route aggregator with its used-pools accumulator
//! - the provider abstraction through which pool state and prices are read
//!
//! Everything here is read-only with respect to the provider: a resolution
//! never writes back into the source it reads from.

use async_trait::async_trait;
use risk_types::{
	BlockNumber, ConfigSchema, PoolSeries, PricePoint, Timestamp, TypesError, ALL_PLATFORMS,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub mod aggregator;
pub mod algebra;
pub mod combination;
pub mod scanner;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

pub use aggregator::{UnifiedSeries, UsedPools};
pub use combination::{EqualSlippageSplit, RouteCombination};
pub use scanner::{scan_tick_liquidity, PercentCurve, TickScan};

/// Errors that can occur while reading or aggregating liquidity.
#[derive(Debug, Error)]
pub enum LiquidityError {
	/// The requested platform is neither configured nor "all".
	#[error("Unknown platform: {0}")]
	UnknownPlatform(String),
	/// The provider failed to deliver data.
	#[error("Source error: {0}")]
	Source(String),
	/// A value left the range representable by the tick math.
	#[error("Numeric overflow in {0}")]
	Overflow(String),
	/// Raw pool state could not be turned into a value type.
	#[error("Invalid pool state: {0}")]
	InvalidState(#[from] TypesError),
}

/// Trait defining the interface for price and pool-state providers.
///
/// A provider answers per-venue questions only. The cross-venue "all"
/// union, pool exclusion and pivot combination are done by
/// [`LiquidityService`] on top of it.
#[async_trait]
pub trait LiquiditySourceInterface: Send + Sync {
	/// Returns the configuration schema for this provider.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Every pool of `platform` trading `from → to`, with all known snapshots.
	///
	/// An unknown pair yields an empty list, not an error.
	async fn pool_series(
		&self,
		platform: &str,
		from: &str,
		to: &str,
	) -> Result<Vec<PoolSeries>, LiquidityError>;

	/// Observed prices of `from` in `to` units within `[from_block, to_block]`.
	///
	/// The last observation before `from_block`, if any, is included so
	/// callers can carry it forward.
	async fn price_history(
		&self,
		platform: &str,
		from: &str,
		to: &str,
		from_block: BlockNumber,
		to_block: BlockNumber,
	) -> Result<Vec<PricePoint>, LiquidityError>;

	/// Latest price of `from` in `to` units at or before `block`.
	async fn price_at_block(
		&self,
		platform: &str,
		from: &str,
		to: &str,
		block: BlockNumber,
	) -> Result<Option<f64>, LiquidityError>;

	/// Unix timestamp of `block`, when known.
	async fn block_timestamp(&self, block: BlockNumber) -> Result<Option<Timestamp>, LiquidityError>;

	/// Most recent block the provider holds data for.
	async fn latest_block(&self) -> Result<Option<BlockNumber>, LiquidityError>;
}

/// Service that reads liquidity through a provider on the engine's bucket grid.
///
/// The service knows the configured venues, so it is where the "all"
/// pseudo-platform is expanded and where provider curves are conformed to
/// the engine's step and maximum bucket.
pub struct LiquidityService {
	/// The underlying provider.
	source: Arc<dyn LiquiditySourceInterface>,
	/// Configured venues, in priority order.
	platforms: Vec<String>,
	/// Bucket step in bps.
	step: u32,
	/// Largest bucket in bps.
	max_bucket: u32,
	/// Asset whose price is one USD.
	usd_quote: String,
	/// Rule for the per-bucket volume of a two-hop route.
	combination: Arc<dyn RouteCombination>,
}

impl LiquidityService {
	/// Creates a new LiquidityService using the default route combination.
	pub fn new(
		source: Arc<dyn LiquiditySourceInterface>,
		platforms: Vec<String>,
		step: u32,
		max_bucket: u32,
		usd_quote: impl Into<String>,
	) -> Self {
		Self {
			source,
			platforms,
			step,
			max_bucket,
			usd_quote: usd_quote.into(),
			combination: Arc::new(EqualSlippageSplit),
		}
	}

	/// Replaces the route-combination rule.
	pub fn with_combination(mut self, combination: Arc<dyn RouteCombination>) -> Self {
		self.combination = combination;
		self
	}

	pub fn source(&self) -> &Arc<dyn LiquiditySourceInterface> {
		&self.source
	}

	pub fn platforms(&self) -> &[String] {
		&self.platforms
	}

	pub fn step(&self) -> u32 {
		self.step
	}

	pub fn max_bucket(&self) -> u32 {
		self.max_bucket
	}

	pub fn usd_quote(&self) -> &str {
		&self.usd_quote
	}

	pub fn combination(&self) -> &Arc<dyn RouteCombination> {
		&self.combination
	}

	/// Expands `platform` into the venues it covers.
	pub fn venues(&self, platform: &str) -> Result<Vec<String>, LiquidityError> {
		if platform == ALL_PLATFORMS {
			return Ok(self.platforms.clone());
		}
		if self.platforms.iter().any(|p| p == platform) {
			Ok(vec![platform.to_string()])
		} else {
			Err(LiquidityError::UnknownPlatform(platform.to_string()))
		}
	}

	/// Price of `from` in `to` at `block`; the first venue quoting a positive
	/// price wins.
	pub async fn price_at_block(
		&self,
		platform: &str,
		from: &str,
		to: &str,
		block: BlockNumber,
	) -> Result<Option<f64>, LiquidityError> {
		for venue in self.venues(platform)? {
			if let Some(price) = self.source.price_at_block(&venue, from, to, block).await? {
				if price > 0.0 {
					return Ok(Some(price));
				}
			}
		}
		Ok(None)
	}

	/// USD price of `asset` at `block`, read against the USD quote asset
	/// across every venue. The inverse pair is used when only that one is
	/// quoted.
	pub async fn usd_price(
		&self,
		asset: &str,
		block: BlockNumber,
	) -> Result<Option<f64>, LiquidityError> {
		if asset == self.usd_quote {
			return Ok(Some(1.0));
		}
		if let Some(price) = self
			.price_at_block(ALL_PLATFORMS, asset, &self.usd_quote, block)
			.await?
		{
			return Ok(Some(price));
		}
		let inverse = self
			.price_at_block(ALL_PLATFORMS, &self.usd_quote, asset, block)
			.await?;
		if inverse.is_none() {
			debug!(%asset, block, "no USD price");
		}
		Ok(inverse.map(|p| 1.0 / p))
	}

	/// Price history of the first venue that has one.
	pub async fn price_history(
		&self,
		platform: &str,
		from: &str,
		to: &str,
		from_block: BlockNumber,
		to_block: BlockNumber,
	) -> Result<Vec<PricePoint>, LiquidityError> {
		for venue in self.venues(platform)? {
			let history = self
				.source
				.price_history(&venue, from, to, from_block, to_block)
				.await?;
			if !history.is_empty() {
				return Ok(history);
			}
		}
		Ok(Vec::new())
	}
}

#[cfg(test)]
mod tests {
	use super::implementations::memory::MemorySource;
	use super::*;

	fn service(source: MemorySource) -> LiquidityService {
		LiquidityService::new(
			Arc::new(source),
			vec!["univ3".to_string(), "curve".to_string()],
			50,
			2000,
			"USDC",
		)
	}

	#[test]
	fn test_venues() {
		let service = service(MemorySource::new());
		assert_eq!(service.venues("all").unwrap(), vec!["univ3", "curve"]);
		assert_eq!(service.venues("curve").unwrap(), vec!["curve"]);
		assert!(matches!(
			service.venues("sushi"),
			Err(LiquidityError::UnknownPlatform(p)) if p == "sushi"
		));
	}

	#[tokio::test]
	async fn test_first_available_price() {
		let source = MemorySource::new();
		source.insert_price("curve", "WETH", "USDC", PricePoint::new(100, 2010.0));
		source.insert_price("univ3", "WETH", "USDC", PricePoint::new(100, 2000.0));
		source.insert_price("univ3", "WETH", "USDC", PricePoint::new(200, 0.0));
		let service = service(source);

		// univ3 is listed first
		assert_eq!(
			service.price_at_block("all", "WETH", "USDC", 150).await.unwrap(),
			Some(2000.0)
		);
		// a zero quote defers to the next venue
		assert_eq!(
			service.price_at_block("all", "WETH", "USDC", 250).await.unwrap(),
			Some(2010.0)
		);
		assert_eq!(
			service.price_at_block("all", "WETH", "USDC", 50).await.unwrap(),
			None
		);
	}

	#[tokio::test]
	async fn test_usd_price() {
		let source = MemorySource::new();
		source.insert_price("univ3", "USDC", "DAI", PricePoint::new(10, 0.5));
		source.insert_price("univ3", "WETH", "USDC", PricePoint::new(10, 2000.0));
		let service = service(source);

		assert_eq!(service.usd_price("USDC", 10).await.unwrap(), Some(1.0));
		assert_eq!(service.usd_price("WETH", 10).await.unwrap(), Some(2000.0));
		// only the inverse pair is quoted
		assert_eq!(service.usd_price("DAI", 10).await.unwrap(), Some(2.0));
		assert_eq!(service.usd_price("WBTC", 10).await.unwrap(), None);
	}
}
