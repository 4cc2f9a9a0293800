//! Volatility estimators for the risk engine.
//!
//! Prices are first smoothed with a running median, then split into "days"
//! whose length in blocks is measured from block timestamps. Two estimators
//! share that partitioning:
//!
//! - the rolling biggest daily change, which reacts to a spike immediately
//!   and lets it decay by `λ` per day
//! - the Parkinson high/low estimator averaged over the last N days

use async_trait::async_trait;
use risk_types::{BlockNumber, Timestamp};
use thiserror::Error;

pub mod days;
pub mod median;
pub mod parkinson;
pub mod rolling;

pub use days::{blocks_per_day, partition_days, trailing_days, Day};
pub use median::median_prices_over_blocks;
pub use parkinson::{parkinson_over_days, parkinson_volatility};
pub use rolling::{rolling_biggest_daily_change, rolling_over_days};

/// Errors that can occur while estimating volatility.
#[derive(Debug, Error)]
pub enum VolatilityError {
	/// The decay factor is outside `(0, 1)`.
	#[error("Decay factor must be in (0, 1), got {0}")]
	InvalidLambda(f64),
	/// The median window is empty.
	#[error("Median window must span at least one block")]
	InvalidWindow,
	/// Parkinson needs at least one day.
	#[error("Number of days to average must be positive")]
	InvalidDays,
	/// A block needed for the day length has no timestamp.
	#[error("No timestamp for block {0}")]
	MissingTimestamp(BlockNumber),
	/// Timestamps do not describe a forward-moving chain.
	#[error("Clock error: {0}")]
	Clock(String),
}

/// Source of block timestamps.
#[async_trait]
pub trait BlockClockInterface: Send + Sync {
	/// Unix timestamp of `block`, when known.
	async fn timestamp(&self, block: BlockNumber) -> Result<Option<Timestamp>, VolatilityError>;
}

/// Clock for a chain producing blocks at a fixed rate.
#[derive(Debug, Clone, Copy)]
pub struct FixedRateClock {
	pub genesis_block: BlockNumber,
	pub genesis_timestamp: Timestamp,
	pub seconds_per_block: f64,
}

impl FixedRateClock {
	pub fn new(genesis_block: BlockNumber, genesis_timestamp: Timestamp, seconds_per_block: f64) -> Self {
		Self {
			genesis_block,
			genesis_timestamp,
			seconds_per_block,
		}
	}
}

#[async_trait]
impl BlockClockInterface for FixedRateClock {
	async fn timestamp(&self, block: BlockNumber) -> Result<Option<Timestamp>, VolatilityError> {
		let offset = (block as f64 - self.genesis_block as f64) * self.seconds_per_block;
		Ok(Some(self.genesis_timestamp + offset.round() as Timestamp))
	}
}

fn check_lambda(lambda: f64) -> Result<(), VolatilityError> {
	if lambda > 0.0 && lambda < 1.0 {
		Ok(())
	} else {
		Err(VolatilityError::InvalidLambda(lambda))
	}
}
