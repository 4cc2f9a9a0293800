//! Running median smoothing of raw prices.

use risk_types::{BlockNumber, PricePoint};

use crate::VolatilityError;

/// One median per full window of `window` blocks.
///
/// Windows start at `base_block`, or at the first observation, and are
/// keyed by their first block. A trailing window that would reach past the
/// last observation is dropped, as are windows with no observation or a
/// non-positive median.
pub fn median_prices_over_blocks(
	prices: &[PricePoint],
	window: u64,
	base_block: Option<BlockNumber>,
) -> Result<Vec<PricePoint>, VolatilityError> {
	if window == 0 {
		return Err(VolatilityError::InvalidWindow);
	}
	let mut sorted = prices.to_vec();
	sorted.sort_by_key(|p| p.block);
	let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
		return Ok(Vec::new());
	};
	let last_block = last.block;

	let mut medians = Vec::new();
	let mut start = base_block.unwrap_or(first.block);
	while start.saturating_add(window) <= last_block {
		let end = start + window;
		let mut values: Vec<f64> = sorted
			.iter()
			.filter(|p| p.block >= start && p.block < end)
			.map(|p| p.price)
			.collect();
		if let Some(median) = median(&mut values) {
			if median > 0.0 {
				medians.push(PricePoint::new(start, median));
			}
		}
		start = end;
	}
	Ok(medians)
}

/// Middle value; the mean of the two middle values for an even count.
fn median(values: &mut [f64]) -> Option<f64> {
	if values.is_empty() {
		return None;
	}
	values.sort_by(f64::total_cmp);
	let mid = values.len() / 2;
	if values.len() % 2 == 0 {
		Some((values[mid - 1] + values[mid]) / 2.0)
	} else {
		Some(values[mid])
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn points(values: &[(u64, f64)]) -> Vec<PricePoint> {
		values.iter().map(|(b, p)| PricePoint::new(*b, *p)).collect()
	}

	#[test]
	fn test_full_windows_only() {
		let prices = points(&[
			(100, 1.0),
			(110, 9.0),
			(120, 2.0),
			(150, 4.0),
			(160, 6.0),
			(210, 100.0),
		]);
		let medians = median_prices_over_blocks(&prices, 50, None).unwrap();
		// [100, 150) and [150, 200); [200, 250) would pass the last block
		assert_eq!(medians, points(&[(100, 2.0), (150, 5.0)]));
	}

	#[test]
	fn test_base_block_and_gaps() {
		let prices = points(&[(10, 3.0), (12, 0.0), (40, 5.0), (41, 7.0), (60, 1.0)]);
		let medians = median_prices_over_blocks(&prices, 10, Some(0)).unwrap();
		// [10, 20) has median 1.5; [20, 30) and [30, 40) are empty
		assert_eq!(medians, points(&[(10, 1.5), (40, 6.0)]));
	}

	#[test]
	fn test_non_positive_median_dropped() {
		let prices = points(&[(0, 0.0), (1, 0.0), (2, 3.0), (10, 1.0)]);
		assert!(median_prices_over_blocks(&prices, 5, None).unwrap().is_empty());
	}

	#[test]
	fn test_invalid_window() {
		assert!(matches!(
			median_prices_over_blocks(&[], 0, None),
			Err(VolatilityError::InvalidWindow)
		));
		assert!(median_prices_over_blocks(&[], 5, None).unwrap().is_empty());
	}
}
