//! Rolling biggest daily change with exponential decay.

use risk_types::{BlockNumber, PricePoint, VolatilityPoint, VolatilitySeries};
use tracing::debug;

use crate::days::{blocks_per_day, partition_days, Day};
use crate::{check_lambda, BlockClockInterface, VolatilityError};

/// Decayed biggest daily range from the first price up to `to_block`.
///
/// Day length comes from `clock`. Each day's range is measured against
/// its opening price, the last price seen before the day starts, and
/// `current = max(λ · yesterday, range)`. Returns `None` without prices.
pub async fn rolling_biggest_daily_change(
	prices: &[PricePoint],
	to_block: BlockNumber,
	lambda: f64,
	clock: &dyn BlockClockInterface,
) -> Result<Option<VolatilitySeries>, VolatilityError> {
	check_lambda(lambda)?;
	let mut sorted = prices.to_vec();
	sorted.sort_by_key(|p| p.block);
	let Some(from_block) = sorted.first().map(|p| p.block) else {
		return Ok(None);
	};
	if to_block < from_block {
		return Ok(None);
	}

	let per_day = if to_block > from_block {
		blocks_per_day(clock, from_block, to_block).await?
	} else {
		0.0
	};
	let days = partition_days(from_block, to_block, per_day);
	debug!(
		from_block,
		to_block,
		days = days.len(),
		"computing rolling daily change"
	);
	let history = rolling_over_days(&sorted, &days, lambda)?;
	Ok(VolatilitySeries::from_history(history))
}

/// The decay recursion over pre-computed days. `prices` must be sorted by block.
pub fn rolling_over_days(
	prices: &[PricePoint],
	days: &[Day],
	lambda: f64,
) -> Result<Vec<VolatilityPoint>, VolatilityError> {
	check_lambda(lambda)?;
	let mut current = 0.0;
	let mut history = Vec::with_capacity(days.len());
	for day in days {
		let yesterday = current;
		current = (lambda * yesterday).max(daily_range(prices, day));
		history.push(VolatilityPoint {
			block_start: day.block_start(),
			block_end: day.block_end(),
			yesterday,
			current,
		});
	}
	Ok(history)
}

/// `(max - min) / opening` over the day's prices and its opening price.
fn daily_range(prices: &[PricePoint], day: &Day) -> f64 {
	let observed: Vec<f64> = prices
		.iter()
		.filter(|p| day.contains(p.block))
		.map(|p| p.price)
		.collect();
	let Some(first) = observed.first().copied() else {
		return 0.0;
	};
	let opening = prices
		.iter()
		.rev()
		.find(|p| (p.block as f64) < day.start)
		.map(|p| p.price)
		.unwrap_or(first);
	if opening <= 0.0 {
		return 0.0;
	}

	let (min, max) = observed
		.iter()
		.fold((opening, opening), |(lo, hi), price| (lo.min(*price), hi.max(*price)));
	(max - min) / opening
}
