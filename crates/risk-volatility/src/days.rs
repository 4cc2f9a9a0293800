//! Splitting a block range into days.

use chrono::{DateTime, TimeDelta};
use risk_types::BlockNumber;
use tracing::debug;

use crate::{BlockClockInterface, VolatilityError};

/// A day of blocks, `[start, end)` on a fractional block axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Day {
	pub start: f64,
	pub end: f64,
}

impl Day {
	pub fn contains(&self, block: BlockNumber) -> bool {
		let block = block as f64;
		block >= self.start && block < self.end
	}

	/// First whole block of the day.
	pub fn block_start(&self) -> BlockNumber {
		self.start.max(0.0).ceil() as BlockNumber
	}

	/// Last whole block of the day.
	pub fn block_end(&self) -> BlockNumber {
		(self.end - 1.0).max(0.0).floor() as BlockNumber
	}
}

/// Average number of blocks per day between `from_block` and `to_block`.
pub async fn blocks_per_day(
	clock: &dyn BlockClockInterface,
	from_block: BlockNumber,
	to_block: BlockNumber,
) -> Result<f64, VolatilityError> {
	if to_block <= from_block {
		return Err(VolatilityError::Clock(format!(
			"cannot measure day length over [{}, {}]",
			from_block, to_block
		)));
	}
	let start = clock
		.timestamp(from_block)
		.await?
		.ok_or(VolatilityError::MissingTimestamp(from_block))?;
	let end = clock
		.timestamp(to_block)
		.await?
		.ok_or(VolatilityError::MissingTimestamp(to_block))?;
	if end <= start {
		return Err(VolatilityError::Clock(format!(
			"block {} is not later than block {}",
			to_block, from_block
		)));
	}

	let days = (end - start) as f64 / TimeDelta::days(1).num_seconds() as f64;
	let per_day = (to_block - from_block) as f64 / days;
	debug!(
		from = ?DateTime::from_timestamp(start, 0),
		to = ?DateTime::from_timestamp(end, 0),
		blocks_per_day = per_day,
		"measured day length"
	);
	Ok(per_day)
}

/// Near-equal days covering `[from_block, to_block]`.
///
/// A day that would leave less than a full day before `to_block` absorbs
/// the remainder, so the last day is between one and two days long. A
/// degenerate day length gives a single day.
pub fn partition_days(from_block: BlockNumber, to_block: BlockNumber, blocks_per_day: f64) -> Vec<Day> {
	let end = to_block as f64;
	let mut current = from_block as f64;
	if !(blocks_per_day.is_finite() && blocks_per_day > 0.0) {
		return vec![Day {
			start: current,
			end: end + 1.0,
		}];
	}

	let mut days = Vec::new();
	while current <= end {
		let mut next = current + blocks_per_day;
		if next + blocks_per_day > end {
			next = end + 1.0;
		}
		days.push(Day {
			start: current,
			end: next,
		});
		current = next;
	}
	days
}

/// The last `count` days of `round(blocks_per_day)` blocks ending at `to_block`.
pub fn trailing_days(to_block: BlockNumber, count: usize, blocks_per_day: f64) -> Vec<Day> {
	let length = blocks_per_day.round().max(1.0);
	let end = to_block as f64 + 1.0;
	let start = end - length * count as f64;
	(0..count)
		.map(|t| {
			let day_start = start + length * t as f64;
			Day {
				start: day_start,
				end: (day_start + length).min(end),
			}
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::FixedRateClock;

	#[test]
	fn test_last_partial_day_is_merged() {
		let days = partition_days(0, 1050, 100.0);
		assert_eq!(days.len(), 10);
		assert_eq!(days[0], Day { start: 0.0, end: 100.0 });
		assert_eq!(days[9], Day { start: 900.0, end: 1051.0 });
		assert_eq!(days[9].block_end(), 1050);
		// contiguous
		for pair in days.windows(2) {
			assert_eq!(pair[0].end, pair[1].start);
		}
	}

	#[test]
	fn test_fractional_days() {
		let days = partition_days(10, 40, 7.5);
		assert_eq!(days.len(), 4);
		assert_eq!(days[1].block_start(), 18);
		assert_eq!(days[1].block_end(), 24);
		assert!(days[1].contains(24));
		assert!(!days[1].contains(25));
		assert_eq!(days[3], Day { start: 32.5, end: 41.0 });
	}

	#[test]
	fn test_degenerate_length() {
		assert_eq!(partition_days(5, 9, 0.0), vec![Day { start: 5.0, end: 10.0 }]);
		assert_eq!(partition_days(5, 9, f64::NAN).len(), 1);
	}

	#[test]
	fn test_trailing_days() {
		let days = trailing_days(1000, 3, 99.6);
		assert_eq!(
			days,
			vec![
				Day { start: 701.0, end: 801.0 },
				Day { start: 801.0, end: 901.0 },
				Day { start: 901.0, end: 1001.0 },
			]
		);
	}

	#[tokio::test]
	async fn test_blocks_per_day() {
		// 12 second blocks
		let clock = FixedRateClock::new(0, 1_700_000_000, 12.0);
		let per_day = blocks_per_day(&clock, 0, 72_000).await.unwrap();
		assert!((per_day - 7200.0).abs() < 1e-9);

		assert!(matches!(
			blocks_per_day(&clock, 10, 10).await,
			Err(VolatilityError::Clock(_))
		));
	}
}
