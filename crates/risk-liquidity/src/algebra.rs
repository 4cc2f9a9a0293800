//! Arithmetic on slippage maps and snapshot series.

use risk_types::{
	BlockNumber, LiquiditySnapshot, MarginalSlippageMap, SlippageBps, SlippageMap, SnapshotSeries,
	TypesError, VolumePair,
};
use std::collections::{BTreeMap, BTreeSet};

/// Component-wise sum; a bucket missing on one side counts as zero.
pub fn sum(a: &SlippageMap, b: &SlippageMap) -> SlippageMap {
	let mut out = a.clone();
	for (bucket, value) in b.iter() {
		out.insert(bucket, a.get(bucket) + value);
	}
	out
}

/// Sum of any number of maps on the `step..=max` grid.
pub fn sum_all<'a, I>(maps: I, step: u32, max: u32) -> SlippageMap
where
	I: IntoIterator<Item = &'a SlippageMap>,
{
	maps.into_iter()
		.fold(SlippageMap::zeroed(step, max), |acc, map| sum(&acc, map))
}

/// Per-bucket volume: `value[b] - value[b - step]`.
pub fn difference(map: &SlippageMap) -> MarginalSlippageMap {
	let mut previous = VolumePair::ZERO;
	let mut marginal = BTreeMap::new();
	for (bucket, value) in map.iter() {
		marginal.insert(bucket, value - previous);
		previous = value;
	}
	MarginalSlippageMap::new(marginal)
}

/// Running sum of a marginal curve; inverse of [`difference`].
pub fn cumulative(marginal: &MarginalSlippageMap, step: u32, max: u32) -> SlippageMap {
	let mut out = SlippageMap::zeroed(step, max);
	let mut running = VolumePair::ZERO;
	for (bucket, value) in marginal.iter() {
		running += value;
		out.insert(bucket, running);
	}
	out
}

/// Scales base volumes by the USD price of the base asset.
pub fn to_usd(map: &SlippageMap, price: f64) -> SlippageMap {
	map.map_values(|v| VolumePair::new(v.base * price, v.quote))
}

/// Re-grids `map` onto `step..=max`, carrying values forward into new buckets.
pub fn conform(map: &SlippageMap, step: u32, max: u32) -> Result<SlippageMap, TypesError> {
	if map.step() == step && map.max_bucket() == SlippageBps(max) && map.len() as u32 == max / step
	{
		return Ok(map.clone());
	}
	SlippageMap::from_sparse(map.iter(), step, max)
}

/// Block-count weighted mean over `[from_block, to_block]`.
///
/// Every block in the window takes the latest snapshot at or before it.
/// Blocks before the first snapshot carry no weight. Returns `None` when no
/// block of the window is covered.
pub fn average_series(
	series: &SnapshotSeries,
	from_block: BlockNumber,
	to_block: BlockNumber,
) -> Option<LiquiditySnapshot> {
	if to_block < from_block {
		return None;
	}

	// segment starts: the carried-in snapshot, then every snapshot inside the window
	let mut starts: Vec<(BlockNumber, &LiquiditySnapshot)> = Vec::new();
	if let Some(carried) = series.at_or_before(from_block) {
		starts.push((from_block, carried));
	}
	for snapshot in series.iter() {
		if snapshot.block_number > from_block && snapshot.block_number <= to_block {
			starts.push((snapshot.block_number, snapshot));
		}
	}
	let (first_block, first) = *starts.first()?;

	let mut price = 0.0;
	let mut total = SlippageMap::zeroed(
		first.slippage_map.step(),
		first.slippage_map.max_bucket().bps(),
	);
	let mut weight_sum = 0.0;
	for (i, (start, snapshot)) in starts.iter().enumerate() {
		let end = starts.get(i + 1).map(|(b, _)| *b).unwrap_or(to_block + 1);
		let weight = (end - start) as f64;
		price += snapshot.price * weight;
		total = sum(&total, &snapshot.slippage_map.map_values(|v| v.scale(weight)));
		weight_sum += weight;
	}

	Some(LiquiditySnapshot {
		block_number: first_block,
		price: price / weight_sum,
		slippage_map: total
			.map_values(|v| VolumePair::new(v.base / weight_sum, v.quote / weight_sum)),
	})
}

/// Sums two series block by block.
///
/// The result has a snapshot at every block either side has one, each side
/// contributing its latest snapshot at or before that block. The price is
/// the first positive one, `a` before `b`.
pub fn sum_series(a: &SnapshotSeries, b: &SnapshotSeries) -> SnapshotSeries {
	let blocks: BTreeSet<BlockNumber> = a.blocks().chain(b.blocks()).collect();
	blocks
		.into_iter()
		.filter_map(|block| {
			let left = a.at_or_before(block);
			let right = b.at_or_before(block);
			let (slippage_map, price) = match (left, right) {
				(Some(l), Some(r)) => {
					let price = if l.price > 0.0 { l.price } else { r.price };
					(sum(&l.slippage_map, &r.slippage_map), price)
				}
				(Some(only), None) | (None, Some(only)) => (only.slippage_map.clone(), only.price),
				(None, None) => return None,
			};
			Some(LiquiditySnapshot {
				block_number: block,
				price,
				slippage_map,
			})
		})
		.collect()
}
