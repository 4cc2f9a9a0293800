//! Caller-facing operations.

use risk_config::EngineConfig;
use risk_liquidity::algebra::average_series;
use risk_liquidity::{LiquidityService, LiquiditySourceInterface, RouteCombination, UsedPools};
use risk_solver::{LpSolverInterface, OptimizedLiquidity, OptimizerInput, PairData, RouteOptimizer};
use risk_types::{Asset, BlockNumber, BlockWindow, PricePoint, SnapshotSeries, VolatilitySeries};
use risk_volatility::{median_prices_over_blocks, parkinson_volatility, rolling_biggest_daily_change};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::clock::SourceClock;
use crate::routes::all_pairs;
use crate::EngineError;

/// The risk engine: liquidity, routing and volatility queries over one provider.
pub struct RiskEngine {
	config: EngineConfig,
	liquidity: LiquidityService,
	optimizer: RouteOptimizer,
	clock: SourceClock,
}

impl RiskEngine {
	pub fn new(
		config: EngineConfig,
		source: Arc<dyn LiquiditySourceInterface>,
		solver: Arc<dyn LpSolverInterface>,
	) -> Self {
		let liquidity = LiquidityService::new(
			source.clone(),
			config.platforms.clone(),
			config.engine.step_bps,
			config.engine.max_slippage_bps,
			config.engine.usd_quote.clone(),
		);
		Self {
			config,
			liquidity,
			optimizer: RouteOptimizer::new(solver),
			clock: SourceClock::new(source),
		}
	}

	pub fn with_combination(mut self, combination: Arc<dyn RouteCombination>) -> Self {
		self.liquidity = self.liquidity.with_combination(combination);
		self
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	pub fn liquidity(&self) -> &LiquidityService {
		&self.liquidity
	}

	pub fn optimizer(&self) -> &RouteOptimizer {
		&self.optimizer
	}

	/// Summed slippage curve of `from → to` over a block range.
	///
	/// With `with_jumps` the configured pivots are tried after the direct
	/// route; without it only direct pools count. `step_block` defaults to
	/// the configured stride.
	#[allow(clippy::too_many_arguments)]
	#[instrument(skip(self))]
	pub async fn aggregated_slippage_curve(
		&self,
		platform: &str,
		from: &str,
		to: &str,
		from_block: BlockNumber,
		to_block: BlockNumber,
		with_jumps: bool,
		step_block: Option<u64>,
	) -> Result<Option<SnapshotSeries>, EngineError> {
		check_range(from_block, to_block)?;
		let (from, to) = self.config.routing.resolve_pair(from, to);
		let window = BlockWindow::new(
			from_block,
			to_block,
			step_block.unwrap_or(self.config.engine.step_block),
		);

		if with_jumps {
			let pivots = self.config.routing.pivots_for(&from, &to);
			let mut used = UsedPools::new();
			let series = self
				.liquidity
				.series_with_jumps(platform, &from, &to, &window, &pivots, &mut used)
				.await?;
			debug!(pools = used.len(), "aggregated curve resolved");
			Ok(series)
		} else {
			let direct = self
				.liquidity
				.unified_series(platform, &from, &to, &window, &UsedPools::new())
				.await?;
			Ok(direct.map(|unified| unified.series))
		}
	}

	/// Optimized multi-hop liquidity at a single block.
	pub async fn optimized_liquidity_at_block(
		&self,
		platform: &str,
		from: &str,
		to: &str,
		block: BlockNumber,
	) -> Result<Option<OptimizedLiquidity>, EngineError> {
		self.average_optimized_liquidity(platform, from, to, block, block)
			.await
	}

	/// Optimized multi-hop liquidity over block-weighted average curves.
	///
	/// The direct route claims its pools first. Each pairwise curve of the
	/// pivot network is then read in [`all_pairs`] order, skipping pools an
	/// earlier pair already used, and averaged over the range.
	#[instrument(skip(self))]
	pub async fn average_optimized_liquidity(
		&self,
		platform: &str,
		from: &str,
		to: &str,
		from_block: BlockNumber,
		to_block: BlockNumber,
	) -> Result<Option<OptimizedLiquidity>, EngineError> {
		check_range(from_block, to_block)?;
		let (from, to) = self.config.routing.resolve_pair(from, to);
		let pivots = self.config.routing.pivots_for(&from, &to);
		let window = BlockWindow::new(from_block, to_block, self.config.engine.step_block);
		let mut used = UsedPools::new();

		let direct = match self
			.liquidity
			.unified_series(platform, &from, &to, &window, &used)
			.await?
		{
			Some(unified) => {
				used.extend(unified.pools);
				average_series(&unified.series, from_block, to_block).map(|s| s.slippage_map)
			}
			None => None,
		};

		let mut pairs = PairData::new();
		for (pair_from, pair_to) in all_pairs(&from, &to, &pivots) {
			let Some(unified) = self
				.liquidity
				.unified_series(platform, &pair_from, &pair_to, &window, &used)
				.await?
			else {
				continue;
			};
			used.extend(unified.pools);
			if let Some(average) = average_series(&unified.series, from_block, to_block) {
				pairs
					.entry(pair_from)
					.or_default()
					.insert(pair_to, average.slippage_map);
			}
		}

		let prices = self.usd_prices(&from, &pairs, to_block).await?;
		debug!(
			pairs = pairs.values().map(BTreeMap::len).sum::<usize>(),
			pools = used.len(),
			"pair data collected"
		);

		let input = OptimizerInput {
			origin: from,
			target: to,
			pairs,
			prices,
			direct,
			step: self.liquidity.step(),
			max_bucket: self.liquidity.max_bucket(),
		};
		Ok(self.optimizer.optimize(&input).await?)
	}

	/// Decayed biggest daily change of the `from/to` price.
	///
	/// Prices are smoothed with a running median first. The history runs up
	/// to the latest block the provider knows. `lambda` defaults to the
	/// configured decay.
	#[instrument(skip(self))]
	pub async fn rolling_volatility(
		&self,
		platform: &str,
		from: &str,
		to: &str,
		lambda: Option<f64>,
	) -> Result<Option<VolatilitySeries>, EngineError> {
		let lambda = lambda.unwrap_or(self.config.volatility.lambda);
		let Some((to_block, medians)) = self.median_history(platform, from, to).await? else {
			return Ok(None);
		};
		let series = rolling_biggest_daily_change(&medians, to_block, lambda, &self.clock).await?;
		if let Some(series) = &series {
			info!(
				current = series.latest.current,
				days = series.history.len(),
				"rolling volatility computed"
			);
		}
		Ok(series)
	}

	/// Parkinson volatility of the `from/to` price over the last `days` days.
	#[instrument(skip(self))]
	pub async fn parkinson_volatility(
		&self,
		platform: &str,
		from: &str,
		to: &str,
		days: Option<u32>,
	) -> Result<Option<f64>, EngineError> {
		let days = days.unwrap_or(self.config.volatility.parkinson_days) as usize;
		let Some((to_block, medians)) = self.median_history(platform, from, to).await? else {
			return Ok(None);
		};
		Ok(parkinson_volatility(&medians, to_block, days, &self.clock).await?)
	}

	/// Median-smoothed price history up to the provider's latest block.
	async fn median_history(
		&self,
		platform: &str,
		from: &str,
		to: &str,
	) -> Result<Option<(BlockNumber, Vec<PricePoint>)>, EngineError> {
		let (from, to) = self.config.routing.resolve_pair(from, to);
		let Some(latest) = self.liquidity.source().latest_block().await? else {
			debug!("provider holds no blocks");
			return Ok(None);
		};
		let raw = self
			.liquidity
			.price_history(platform, &from, &to, 0, latest)
			.await?;
		let medians =
			median_prices_over_blocks(&raw, self.config.volatility.median_window_blocks, None)?;
		if medians.is_empty() {
			debug!(observations = raw.len(), "not enough prices for one median window");
			return Ok(None);
		}
		Ok(Some((latest, medians)))
	}

	/// USD prices of the origin and of every asset a pairwise curve leaves.
	///
	/// Assets without a price are left out; the optimizer rejects the
	/// request only if such an asset actually carries liquidity.
	async fn usd_prices(
		&self,
		origin: &str,
		pairs: &PairData,
		block: BlockNumber,
	) -> Result<BTreeMap<Asset, f64>, EngineError> {
		let mut prices = BTreeMap::new();
		let assets = std::iter::once(origin).chain(pairs.keys().map(String::as_str));
		for asset in assets {
			if prices.contains_key(asset) {
				continue;
			}
			match self.liquidity.usd_price(asset, block).await? {
				Some(price) => {
					prices.insert(asset.to_string(), price);
				}
				None => debug!(%asset, block, "asset has no USD price"),
			}
		}
		Ok(prices)
	}
}

fn check_range(from_block: BlockNumber, to_block: BlockNumber) -> Result<(), EngineError> {
	if to_block < from_block {
		return Err(EngineError::Configuration(format!(
			"Block range is empty: {} > {}",
			from_block, to_block
		)));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use risk_config::RoutingConfig;
	use risk_liquidity::implementations::memory::MemorySource;
	use risk_solver::implementations::simplex::SimplexSolver;
	use risk_types::{LiquiditySnapshot, SlippageBps, SlippageMap, VolumePair};

	fn snapshot(block: u64, price: f64, volumes: &[(u32, f64)]) -> LiquiditySnapshot {
		LiquiditySnapshot {
			block_number: block,
			price,
			slippage_map: SlippageMap::from_sparse(
				volumes
					.iter()
					.map(|(b, v)| (SlippageBps(*b), VolumePair::new(*v, *v * price))),
				50,
				2000,
			)
			.unwrap(),
		}
	}

	fn engine(source: MemorySource, pivots: &[&str]) -> RiskEngine {
		let mut config = EngineConfig::default();
		config.routing = RoutingConfig::with_default_pivots(pivots.iter().copied());
		config.engine.step_block = 10;
		config.volatility.median_window_blocks = 1;
		config.volatility.lambda = 0.8;
		RiskEngine::new(config, Arc::new(source), Arc::new(SimplexSolver::default()))
	}

	fn base_at(series: &SnapshotSeries, block: u64, bucket: u32) -> f64 {
		series
			.get(block)
			.map(|s| s.slippage_map.get(SlippageBps(bucket)).base)
			.unwrap_or(0.0)
	}

	#[tokio::test]
	async fn test_direct_pool_only() {
		let source = MemorySource::new();
		let pool = snapshot(100, 1.0, &[(50, 100.0), (100, 180.0)]);
		source.insert_snapshot("univ3", "0xab", "A", "B", pool.clone());
		let engine = engine(source, &[]);

		let series = engine
			.aggregated_slippage_curve("all", "A", "B", 100, 100, true, None)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(series.len(), 1);
		assert_eq!(series.get(100).unwrap().slippage_map, pool.slippage_map);
	}

	#[tokio::test]
	async fn test_pivot_route_only() {
		let source = MemorySource::new();
		source.insert_snapshot("univ3", "0xac", "A", "C", snapshot(100, 1.0, &[(50, 50.0)]));
		source.insert_snapshot("univ3", "0xcb", "C", "B", snapshot(100, 1.0, &[(50, 40.0)]));
		let engine = engine(source, &["C"]);

		let direct = engine
			.aggregated_slippage_curve("all", "A", "B", 100, 100, false, None)
			.await
			.unwrap();
		assert!(direct.is_none());

		let routed = engine
			.aggregated_slippage_curve("all", "A", "B", 100, 100, true, None)
			.await
			.unwrap()
			.unwrap();
		let volume = base_at(&routed, 100, 50);
		assert!(volume > 0.0);
		assert!(volume <= 40.0 + 1e-9);
	}

	#[tokio::test]
	async fn test_zero_pivots_match_direct_route() {
		let source = MemorySource::new();
		source.insert_snapshot("univ3", "0x1", "A", "B", snapshot(100, 2.0, &[(50, 10.0), (500, 70.0)]));
		source.insert_snapshot("univ3", "0x2", "A", "B", snapshot(120, 2.0, &[(100, 5.0)]));
		let engine = engine(source, &[]);

		let with_jumps = engine
			.aggregated_slippage_curve("univ3", "A", "B", 100, 150, true, None)
			.await
			.unwrap();
		let direct = engine
			.aggregated_slippage_curve("univ3", "A", "B", 100, 150, false, None)
			.await
			.unwrap();
		assert!(with_jumps.is_some());
		assert_eq!(with_jumps, direct);
	}

	#[tokio::test]
	async fn test_query_errors() {
		let engine = engine(MemorySource::new(), &[]);
		assert!(matches!(
			engine
				.aggregated_slippage_curve("sushi", "A", "B", 1, 2, true, None)
				.await,
			Err(EngineError::Configuration(_))
		));
		assert!(matches!(
			engine
				.aggregated_slippage_curve("all", "A", "B", 5, 2, true, None)
				.await,
			Err(EngineError::Configuration(_))
		));
		assert!(engine
			.aggregated_slippage_curve("all", "A", "B", 1, 2, true, None)
			.await
			.unwrap()
			.is_none());
	}

	#[tokio::test]
	async fn test_optimized_direct_only() {
		let source = MemorySource::new();
		source.insert_snapshot("univ3", "0xab", "A", "B", snapshot(100, 1.0, &[(50, 100.0), (100, 180.0)]));
		source.insert_price("univ3", "A", "USDC", PricePoint::new(1, 1.0));
		let engine = engine(source, &[]);

		let liquidity = engine
			.optimized_liquidity_at_block("all", "A", "B", 100)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(liquidity.get(SlippageBps(50)), 100.0);
		assert_eq!(liquidity.get(SlippageBps(100)), 180.0);
		assert_eq!(liquidity.get(SlippageBps(2000)), 180.0);
	}

	#[tokio::test]
	async fn test_optimized_two_hop() {
		let source = MemorySource::new();
		source.insert_snapshot("univ3", "0xac", "A", "C", snapshot(100, 1.0, &[(50, 50.0)]));
		source.insert_snapshot("univ3", "0xcb", "C", "B", snapshot(100, 1.0, &[(50, 40.0)]));
		source.insert_price("univ3", "A", "USDC", PricePoint::new(1, 1.0));
		source.insert_price("univ3", "C", "USDC", PricePoint::new(1, 1.0));
		let engine = engine(source, &["C"]);

		let liquidity = engine
			.optimized_liquidity_at_block("all", "A", "B", 100)
			.await
			.unwrap()
			.unwrap();
		// at 50 bps the hop into C already costs the whole budget
		assert_eq!(liquidity.get(SlippageBps(50)), 0.0);
		let routed = liquidity.get(SlippageBps(100));
		assert!((routed - 40.0 / 0.995).abs() < 1e-6, "got {}", routed);
	}

	#[tokio::test]
	async fn test_optimized_missing_price() {
		let source = MemorySource::new();
		source.insert_snapshot("univ3", "0xac", "A", "C", snapshot(100, 1.0, &[(50, 50.0)]));
		source.insert_snapshot("univ3", "0xcb", "C", "B", snapshot(100, 1.0, &[(50, 40.0)]));
		source.insert_price("univ3", "A", "USDC", PricePoint::new(1, 1.0));
		let engine = engine(source, &["C"]);

		assert!(matches!(
			engine.optimized_liquidity_at_block("all", "A", "B", 100).await,
			Err(EngineError::Configuration(msg)) if msg.contains("for C")
		));
	}

	#[tokio::test]
	async fn test_optimized_no_data() {
		let engine = engine(MemorySource::new(), &["C"]);
		assert!(engine
			.optimized_liquidity_at_block("all", "A", "B", 100)
			.await
			.unwrap()
			.is_none());
	}

	#[tokio::test]
	async fn test_rolling_volatility() {
		let source = MemorySource::new();
		// 100 blocks per day
		source.set_block_timestamp(0, 1_600_000_000);
		source.set_block_timestamp(500, 1_600_000_000 + 5 * 86_400);
		for (block, price) in [(0, 1.0), (100, 1.0), (200, 1.5), (300, 1.0), (400, 1.0)] {
			source.insert_price("univ3", "A", "B", PricePoint::new(block, price));
		}
		let engine = engine(source, &[]);

		let series = engine
			.rolling_volatility("univ3", "A", "B", None)
			.await
			.unwrap()
			.unwrap();
		let current: Vec<f64> = series.history.iter().map(|p| p.current).collect();
		let expected = [0.0, 0.0, 0.5, 0.4, 0.32];
		assert_eq!(current.len(), expected.len());
		for (actual, expected) in current.iter().zip(expected) {
			assert!((actual - expected).abs() < 1e-12);
		}

		assert!(matches!(
			engine.rolling_volatility("univ3", "A", "B", Some(1.0)).await,
			Err(EngineError::Configuration(_))
		));
		assert!(engine
			.rolling_volatility("univ3", "X", "Y", None)
			.await
			.unwrap()
			.is_none());
	}

	#[tokio::test]
	async fn test_parkinson_volatility() {
		let source = MemorySource::new();
		source.set_block_timestamp(0, 1_600_000_000);
		source.set_block_timestamp(200, 1_600_000_000 + 2 * 86_400);
		for (block, price) in [(0, 1.0), (10, 1.0), (120, 2.0), (150, 1.0), (199, 1.0)] {
			source.insert_price("univ3", "A", "B", PricePoint::new(block, price));
		}
		let engine = engine(source, &[]);

		// one flat day, then a day trading between 1 and 2
		let sigma = engine
			.parkinson_volatility("univ3", "A", "B", Some(2))
			.await
			.unwrap()
			.unwrap();
		let expected = (std::f64::consts::LN_2 / 8.0).sqrt();
		assert!((sigma - expected).abs() < 1e-12, "got {}", sigma);

		assert!(matches!(
			engine.parkinson_volatility("univ3", "A", "B", Some(0)).await,
			Err(EngineError::Configuration(_))
		));
	}
}
