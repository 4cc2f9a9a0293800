//! Pivot route aggregation.
//!
//! A pair's liquidity is the direct route plus every resolving two-hop route
//! through a pivot asset. Pools consumed by one route are recorded in a
//! [`UsedPools`] accumulator so that no later route counts them again.

use futures::future::try_join_all;
use risk_types::{BlockWindow, LiquiditySnapshot, SlippageMap, SnapshotSeries};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

use crate::algebra::{conform, sum_series};
use crate::{LiquidityError, LiquidityService};

/// Pools already counted by the current resolution.
///
/// Ids are qualified with their venue, so equal pool ids on two venues
/// never collide.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsedPools(BTreeSet<String>);

impl UsedPools {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn contains(&self, pool: &str) -> bool {
		self.0.contains(pool)
	}

	pub fn insert(&mut self, pool: impl Into<String>) -> bool {
		self.0.insert(pool.into())
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &String> {
		self.0.iter()
	}
}

impl Extend<String> for UsedPools {
	fn extend<T: IntoIterator<Item = String>>(&mut self, iter: T) {
		self.0.extend(iter);
	}
}

/// Summed series of every eligible pool, with the pools it used.
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedSeries {
	pub series: SnapshotSeries,
	pub pools: BTreeSet<String>,
}

/// Venue-qualified pool id.
pub fn pool_key(venue: &str, pool_id: &str) -> String {
	format!("{}:{}", venue, pool_id)
}

impl LiquidityService {
	/// Sum of every pool of `platform` trading `from → to` that is not in
	/// `used`, sampled on `window`.
	///
	/// `platform = "all"` takes the pools of every configured venue. The
	/// price of each block is the first positive one in venue order.
	/// Returns `None` when no eligible pool has a snapshot in the window.
	pub async fn unified_series(
		&self,
		platform: &str,
		from: &str,
		to: &str,
		window: &BlockWindow,
		used: &UsedPools,
	) -> Result<Option<UnifiedSeries>, LiquidityError> {
		let venues = self.venues(platform)?;
		let fetched = try_join_all(
			venues
				.iter()
				.map(|venue| self.source().pool_series(venue, from, to)),
		)
		.await?;

		let mut total: Option<SnapshotSeries> = None;
		let mut pools = BTreeSet::new();
		for (venue, venue_pools) in venues.iter().zip(fetched) {
			for pool in venue_pools {
				let key = pool_key(venue, &pool.pool_id);
				if used.contains(&key) {
					debug!(pool = %key, "skipping pool already used");
					continue;
				}
				let sampled = self.sample(&pool.series, window)?;
				if sampled.is_empty() {
					continue;
				}
				total = Some(match total {
					Some(acc) => sum_series(&acc, &sampled),
					None => sampled,
				});
				pools.insert(key);
			}
		}

		Ok(total.map(|series| UnifiedSeries { series, pools }))
	}

	/// Cross-venue union of the direct route.
	pub async fn sum_across_venues(
		&self,
		from: &str,
		to: &str,
		window: &BlockWindow,
		used: &UsedPools,
	) -> Result<Option<UnifiedSeries>, LiquidityError> {
		self.unified_series(risk_types::ALL_PLATFORMS, from, to, window, used)
			.await
	}

	/// Direct route plus every resolving pivot route.
	///
	/// Leg 2 of a pivot never reuses a pool of leg 1. Both legs' pools are
	/// recorded in `used` only when the pivot resolves. Without a direct
	/// route, the first resolving pivot starts from a zero curve priced at
	/// `leg1.price * leg2.price`. Returns `None` when nothing resolves.
	#[instrument(skip(self, window, pivots, used), fields(window = %window))]
	pub async fn series_with_jumps(
		&self,
		platform: &str,
		from: &str,
		to: &str,
		window: &BlockWindow,
		pivots: &[String],
		used: &mut UsedPools,
	) -> Result<Option<SnapshotSeries>, LiquidityError> {
		let mut result = match self.unified_series(platform, from, to, window, used).await? {
			Some(direct) => {
				used.extend(direct.pools);
				Some(direct.series)
			}
			None => None,
		};

		for pivot in pivots {
			if pivot == from || pivot == to {
				continue;
			}
			let Some(leg1) = self.unified_series(platform, from, pivot, window, used).await? else {
				debug!(%pivot, "no first leg");
				continue;
			};
			let mut excluded = used.clone();
			excluded.extend(leg1.pools.iter().cloned());
			let Some(leg2) = self
				.unified_series(platform, pivot, to, window, &excluded)
				.await?
			else {
				debug!(%pivot, "no second leg");
				continue;
			};

			debug!(%pivot, pools = leg1.pools.len() + leg2.pools.len(), "pivot resolved");
			used.extend(leg1.pools);
			used.extend(leg2.pools);
			let base = result.get_or_insert_with(SnapshotSeries::new);
			self.add_pivot_route(base, &leg1.series, &leg2.series, window);
		}

		Ok(result)
	}

	/// Adds the two-hop volume at every block both legs cover.
	fn add_pivot_route(
		&self,
		base: &mut SnapshotSeries,
		leg1: &SnapshotSeries,
		leg2: &SnapshotSeries,
		window: &BlockWindow,
	) {
		for block in window.blocks() {
			let (Some(first), Some(second)) = (leg1.get(block), leg2.get(block)) else {
				continue;
			};
			let mut snapshot = base.get(block).cloned().unwrap_or_else(|| LiquiditySnapshot {
				block_number: block,
				price: 0.0,
				slippage_map: SlippageMap::zeroed(self.step(), self.max_bucket()),
			});
			if snapshot.price <= 0.0 {
				snapshot.price = first.price * second.price;
			}
			let buckets: Vec<_> = snapshot.slippage_map.buckets().collect();
			for bucket in buckets {
				let extra = self.combination().combine(first, second, bucket);
				let current = snapshot.slippage_map.get(bucket);
				snapshot.slippage_map.insert(bucket, current + extra);
			}
			base.insert(snapshot);
		}
	}

	/// Resamples a pool onto `window` and the engine's bucket grid.
	fn sample(
		&self,
		series: &SnapshotSeries,
		window: &BlockWindow,
	) -> Result<SnapshotSeries, LiquidityError> {
		series
			.locf(window)
			.iter()
			.map(|snapshot| -> Result<LiquiditySnapshot, LiquidityError> {
				Ok(LiquiditySnapshot {
					slippage_map: conform(&snapshot.slippage_map, self.step(), self.max_bucket())?,
					..snapshot.clone()
				})
			})
			.collect()
	}
}
