//! Volume of a two-hop route at one slippage bucket.

use risk_types::{LiquiditySnapshot, SlippageBps, SlippageMap, VolumePair};

/// Rule turning two leg curves into the volume of the composed route.
///
/// `leg1` trades origin into the pivot, `leg2` the pivot into the target.
/// The result is expressed like a direct curve: `base` in origin units,
/// `quote` in target units. Implementations must be non-decreasing in
/// `bucket` and never exceed either leg at the same bucket.
pub trait RouteCombination: Send + Sync {
	fn combine(
		&self,
		leg1: &LiquiditySnapshot,
		leg2: &LiquiditySnapshot,
		bucket: SlippageBps,
	) -> VolumePair;
}

/// Gives each leg half of the slippage budget.
///
/// Leg 2's capacity at its half budget is converted back into origin units
/// with leg 1's price and caps leg 1's volume. The target-side amount
/// follows from both prices and is capped by what leg 2 can deliver.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualSlippageSplit;

impl RouteCombination for EqualSlippageSplit {
	fn combine(
		&self,
		leg1: &LiquiditySnapshot,
		leg2: &LiquiditySnapshot,
		bucket: SlippageBps,
	) -> VolumePair {
		if leg1.price <= 0.0 || leg2.price <= 0.0 {
			return VolumePair::ZERO;
		}
		let half = bucket.bps() as f64 / 2.0;
		let first = interpolate(&leg1.slippage_map, half);
		let second = interpolate(&leg2.slippage_map, half);

		let base = first.base.min(second.base / leg1.price);
		let quote = (base * leg1.price * leg2.price).min(second.quote);
		VolumePair::new(base, quote)
	}
}

/// Reads a cumulative curve between grid buckets, bucket 0 being zero.
///
/// Budgets past the last bucket read the last bucket.
pub fn interpolate(map: &SlippageMap, bps: f64) -> VolumePair {
	if bps <= 0.0 || map.is_empty() {
		return VolumePair::ZERO;
	}
	let max = map.max_bucket().bps() as f64;
	if bps >= max {
		return map.get(map.max_bucket());
	}
	let step = map.step() as f64;
	let lower = (bps / step).floor() * step;
	let low = map.get(SlippageBps(lower as u32));
	let high = map.get(SlippageBps((lower + step) as u32));
	let fraction = (bps - lower) / step;
	low + (high - low).scale(fraction)
}
