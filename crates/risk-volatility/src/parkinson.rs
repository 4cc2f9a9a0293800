//! Parkinson high/low volatility estimator.

use risk_types::{BlockNumber, PricePoint};
use std::f64::consts::LN_2;

use crate::days::{blocks_per_day, trailing_days, Day};
use crate::{BlockClockInterface, VolatilityError};

/// Parkinson volatility over the `days_to_avg` days ending at `to_block`.
///
/// Returns `None` when there is no price at or before `to_block`.
pub async fn parkinson_volatility(
	prices: &[PricePoint],
	to_block: BlockNumber,
	days_to_avg: usize,
	clock: &dyn BlockClockInterface,
) -> Result<Option<f64>, VolatilityError> {
	if days_to_avg == 0 {
		return Err(VolatilityError::InvalidDays);
	}
	let mut sorted = prices.to_vec();
	sorted.sort_by_key(|p| p.block);
	let Some(from_block) = sorted.first().map(|p| p.block) else {
		return Ok(None);
	};
	if to_block < from_block {
		return Ok(None);
	}
	if to_block == from_block {
		return Ok(Some(0.0));
	}

	let per_day = blocks_per_day(clock, from_block, to_block).await?;
	let days = trailing_days(to_block, days_to_avg, per_day);
	Ok(Some(parkinson_over_days(&sorted, &days)))
}

/// `sqrt(Σ ln(high / low)² / (4 · N · ln 2))` over `days`.
///
/// A day without prices reuses the previous day's high and low; the first
/// day falls back to the last price before it. Days with a zero low are
/// left out of both the sum and `N`. `prices` must be sorted by block.
pub fn parkinson_over_days(prices: &[PricePoint], days: &[Day]) -> f64 {
	let seed = days
		.first()
		.and_then(|day| prices.iter().rev().find(|p| (p.block as f64) < day.start))
		.or_else(|| prices.first())
		.map(|p| p.price);
	let mut last = seed.map(|price| (price, price));

	let mut sum = 0.0;
	let mut counted = 0usize;
	for day in days {
		let observed = prices
			.iter()
			.filter(|p| day.contains(p.block))
			.fold(None, |range: Option<(f64, f64)>, p| match range {
				None => Some((p.price, p.price)),
				Some((high, low)) => Some((high.max(p.price), low.min(p.price))),
			});
		if observed.is_some() {
			last = observed;
		}
		let Some((high, low)) = last else {
			continue;
		};
		if low <= 0.0 {
			continue;
		}
		let ln = (high / low).ln();
		sum += ln * ln;
		counted += 1;
	}

	if counted == 0 {
		return 0.0;
	}
	(sum / (4.0 * counted as f64 * LN_2)).sqrt()
}
