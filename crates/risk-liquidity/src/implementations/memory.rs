//! In-memory price and pool-state provider.
//!
//! Holds pre-built snapshots, explicit price points and block timestamps in
//! concurrent maps. Raw tick state can be ingested too: it is scanned into
//! slippage maps for both directions of the pool.

use async_trait::async_trait;
use dashmap::DashMap;
use risk_types::{
	BlockNumber, ConfigSchema, LiquiditySnapshot, PoolSeries, PricePoint, Schema, SnapshotSeries,
	TickLiquidityState, Timestamp, DEFAULT_STEP_BPS, MAX_SLIPPAGE_BPS,
};
use std::collections::BTreeMap;

use crate::scanner::scan_tick_liquidity;
use crate::{LiquidityError, LiquiditySourceInterface};

/// `(platform, from, to)`
type PairKey = (String, String, String);

fn pair_key(platform: &str, from: &str, to: &str) -> PairKey {
	(platform.to_string(), from.to_string(), to.to_string())
}

/// How raw tick state is turned into slippage maps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSettings {
	/// Largest price impact recorded, in percent.
	pub max_percent: u32,
	pub step: u32,
	pub max_bucket: u32,
}

impl Default for ScanSettings {
	fn default() -> Self {
		Self {
			max_percent: 20,
			step: DEFAULT_STEP_BPS,
			max_bucket: MAX_SLIPPAGE_BPS,
		}
	}
}

/// A concentrated-liquidity pool as listed by an indexer.
#[derive(Debug, Clone, PartialEq)]
pub struct TickPool {
	pub platform: String,
	pub pool_id: String,
	pub token0: String,
	pub token1: String,
	pub decimals0: u8,
	pub decimals1: u8,
}

/// In-memory provider.
#[derive(Default)]
pub struct MemorySource {
	/// Pools per pair, ordered by pool id.
	pools: DashMap<PairKey, BTreeMap<String, SnapshotSeries>>,
	/// Explicit price observations per pair.
	prices: DashMap<PairKey, BTreeMap<BlockNumber, f64>>,
	timestamps: DashMap<BlockNumber, Timestamp>,
}

impl MemorySource {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds one snapshot of `pool_id` for `from → to`.
	pub fn insert_snapshot(
		&self,
		platform: &str,
		pool_id: &str,
		from: &str,
		to: &str,
		snapshot: LiquiditySnapshot,
	) {
		self.pools
			.entry(pair_key(platform, from, to))
			.or_default()
			.entry(pool_id.to_string())
			.or_default()
			.insert(snapshot);
	}

	/// Records an observed price of `from` in `to`.
	pub fn insert_price(&self, platform: &str, from: &str, to: &str, point: PricePoint) {
		self.prices
			.entry(pair_key(platform, from, to))
			.or_default()
			.insert(point.block, point.price);
	}

	pub fn set_block_timestamp(&self, block: BlockNumber, timestamp: Timestamp) {
		self.timestamps.insert(block, timestamp);
	}

	/// Scans `state` and stores a snapshot for both swap directions.
	///
	/// Nothing is stored when the scan fails.
	pub fn insert_tick_state(
		&self,
		pool: &TickPool,
		block: BlockNumber,
		state: &TickLiquidityState,
		settings: &ScanSettings,
	) -> Result<(), LiquidityError> {
		let scan = scan_tick_liquidity(state, pool.decimals0, pool.decimals1, settings.max_percent)?;
		let price = scan.price;
		let (forward, backward) = scan.into_pair_maps(settings.step, settings.max_bucket)?;

		self.insert_snapshot(
			&pool.platform,
			&pool.pool_id,
			&pool.token0,
			&pool.token1,
			LiquiditySnapshot {
				block_number: block,
				price,
				slippage_map: forward,
			},
		);
		self.insert_snapshot(
			&pool.platform,
			&pool.pool_id,
			&pool.token1,
			&pool.token0,
			LiquiditySnapshot {
				block_number: block,
				price: if price > 0.0 { 1.0 / price } else { 0.0 },
				slippage_map: backward,
			},
		);
		Ok(())
	}

	/// Price observations of a pair, explicit ones first, otherwise the
	/// snapshot prices of its first pool.
	fn observations(&self, platform: &str, from: &str, to: &str) -> BTreeMap<BlockNumber, f64> {
		let key = pair_key(platform, from, to);
		if let Some(prices) = self.prices.get(&key) {
			return prices.clone();
		}
		self.pools
			.get(&key)
			.and_then(|pools| {
				pools
					.values()
					.find(|series| !series.is_empty())
					.map(|series| series.iter().map(|s| (s.block_number, s.price)).collect())
			})
			.unwrap_or_default()
	}
}

/// Configuration schema for MemorySource.
pub struct MemorySourceSchema;

impl ConfigSchema for MemorySourceSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), risk_types::ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

#[async_trait]
impl LiquiditySourceInterface for MemorySource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemorySourceSchema)
	}

	async fn pool_series(
		&self,
		platform: &str,
		from: &str,
		to: &str,
	) -> Result<Vec<PoolSeries>, LiquidityError> {
		Ok(self
			.pools
			.get(&pair_key(platform, from, to))
			.map(|pools| {
				pools
					.iter()
					.map(|(pool_id, series)| PoolSeries {
						pool_id: pool_id.clone(),
						series: series.clone(),
					})
					.collect()
			})
			.unwrap_or_default())
	}

	async fn price_history(
		&self,
		platform: &str,
		from: &str,
		to: &str,
		from_block: BlockNumber,
		to_block: BlockNumber,
	) -> Result<Vec<PricePoint>, LiquidityError> {
		let observations = self.observations(platform, from, to);
		let carried = observations
			.range(..from_block)
			.next_back()
			.map(|(block, price)| PricePoint::new(*block, *price));
		Ok(carried
			.into_iter()
			.chain(
				observations
					.range(from_block..=to_block)
					.map(|(block, price)| PricePoint::new(*block, *price)),
			)
			.collect())
	}

	async fn price_at_block(
		&self,
		platform: &str,
		from: &str,
		to: &str,
		block: BlockNumber,
	) -> Result<Option<f64>, LiquidityError> {
		Ok(self
			.observations(platform, from, to)
			.range(..=block)
			.next_back()
			.map(|(_, price)| *price))
	}

	/// Known timestamps are returned as is; blocks between two known ones
	/// are interpolated linearly.
	async fn block_timestamp(&self, block: BlockNumber) -> Result<Option<Timestamp>, LiquidityError> {
		if let Some(timestamp) = self.timestamps.get(&block) {
			return Ok(Some(*timestamp));
		}
		let mut below: Option<(BlockNumber, Timestamp)> = None;
		let mut above: Option<(BlockNumber, Timestamp)> = None;
		for entry in self.timestamps.iter() {
			let (b, t) = (*entry.key(), *entry.value());
			if b < block && below.map_or(true, |(prev, _)| b > prev) {
				below = Some((b, t));
			}
			if b > block && above.map_or(true, |(next, _)| b < next) {
				above = Some((b, t));
			}
		}
		Ok(match (below, above) {
			(Some((b0, t0)), Some((b1, t1))) => {
				let fraction = (block - b0) as f64 / (b1 - b0) as f64;
				Some(t0 + ((t1 - t0) as f64 * fraction).round() as Timestamp)
			}
			_ => None,
		})
	}

	async fn latest_block(&self) -> Result<Option<BlockNumber>, LiquidityError> {
		let from_pools = self.pools.iter().flat_map(|entry| {
			entry
				.value()
				.values()
				.filter_map(|series| series.last().map(|s| s.block_number))
				.collect::<Vec<_>>()
		});
		let from_prices = self
			.prices
			.iter()
			.filter_map(|entry| entry.value().keys().next_back().copied());
		let from_clock = self.timestamps.iter().map(|entry| *entry.key());
		Ok(from_pools.chain(from_prices).chain(from_clock).max())
	}
}

/// Factory function to create an empty in-memory provider.
///
/// The provider takes no configuration; data is inserted programmatically.
pub fn create_source(_config: &toml::Value) -> Box<dyn LiquiditySourceInterface> {
	Box::new(MemorySource::new())
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::U256;
	use risk_types::{SlippageBps, SlippageMap};

	fn snapshot(block: BlockNumber, price: f64) -> LiquiditySnapshot {
		LiquiditySnapshot {
			block_number: block,
			price,
			slippage_map: SlippageMap::zeroed(50, 100),
		}
	}

	#[tokio::test]
	async fn test_pools_are_ordered_by_id() {
		let source = MemorySource::new();
		source.insert_snapshot("univ3", "0xbb", "WETH", "USDC", snapshot(1, 2.0));
		source.insert_snapshot("univ3", "0xaa", "WETH", "USDC", snapshot(1, 1.0));
		source.insert_snapshot("univ3", "0xaa", "WETH", "USDC", snapshot(2, 1.5));

		let pools = source.pool_series("univ3", "WETH", "USDC").await.unwrap();
		assert_eq!(pools.len(), 2);
		assert_eq!(pools[0].pool_id, "0xaa");
		assert_eq!(pools[0].series.len(), 2);
		assert!(source.pool_series("univ3", "USDC", "WETH").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_price_history_carries_previous_point() {
		let source = MemorySource::new();
		for (block, price) in [(90, 1.0), (100, 2.0), (110, 3.0), (130, 4.0)] {
			source.insert_price("univ3", "WETH", "USDC", PricePoint::new(block, price));
		}
		let history = source
			.price_history("univ3", "WETH", "USDC", 95, 120)
			.await
			.unwrap();
		assert_eq!(
			history,
			vec![
				PricePoint::new(90, 1.0),
				PricePoint::new(100, 2.0),
				PricePoint::new(110, 3.0)
			]
		);
		assert_eq!(
			source.price_at_block("univ3", "WETH", "USDC", 129).await.unwrap(),
			Some(3.0)
		);
	}

	#[tokio::test]
	async fn test_prices_fall_back_to_snapshots() {
		let source = MemorySource::new();
		source.insert_snapshot("univ3", "p", "WETH", "USDC", snapshot(10, 2000.0));
		assert_eq!(
			source.price_at_block("univ3", "WETH", "USDC", 12).await.unwrap(),
			Some(2000.0)
		);
		assert_eq!(source.latest_block().await.unwrap(), Some(10));
	}

	#[tokio::test]
	async fn test_block_timestamp_interpolation() {
		let source = MemorySource::new();
		source.set_block_timestamp(100, 1_000);
		source.set_block_timestamp(200, 2_200);
		assert_eq!(source.block_timestamp(100).await.unwrap(), Some(1_000));
		assert_eq!(source.block_timestamp(150).await.unwrap(), Some(1_600));
		assert_eq!(source.block_timestamp(250).await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_tick_state_ingestion() {
		let source = MemorySource::new();
		let pool = TickPool {
			platform: "univ3".into(),
			pool_id: "0xpool".into(),
			token0: "DAI".into(),
			token1: "USDC".into(),
			decimals0: 18,
			decimals1: 18,
		};
		let mut liquidity_by_tick = BTreeMap::new();
		for tick in (-2500..2500).step_by(10) {
			liquidity_by_tick.insert(tick, 1_000_000_000_000_000_000_000u128);
		}
		let state = TickLiquidityState {
			current_tick: 0,
			tick_spacing: 10,
			sqrt_price_x96: U256::from(1u128 << 96),
			liquidity_by_tick,
		};
		source
			.insert_tick_state(&pool, 500, &state, &ScanSettings::default())
			.unwrap();

		let forward = source.pool_series("univ3", "DAI", "USDC").await.unwrap();
		let backward = source.pool_series("univ3", "USDC", "DAI").await.unwrap();
		let forward = forward[0].series.get(500).unwrap();
		let backward = backward[0].series.get(500).unwrap();
		assert!((forward.price - 1.0).abs() < 1e-12);
		assert!((backward.price - 1.0).abs() < 1e-12);
		assert_eq!(forward.slippage_map.len(), 40);
		// half-percent buckets carry the previous whole percent
		assert_eq!(forward.slippage_map.get(SlippageBps(50)).base, 0.0);
		assert_eq!(
			forward.slippage_map.get(SlippageBps(150)),
			forward.slippage_map.get(SlippageBps(100))
		);
		assert!(forward.slippage_map.get(SlippageBps(2000)).base > 0.0);
	}
}
