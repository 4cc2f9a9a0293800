//! Price history and volatility output types.

use serde::{Deserialize, Serialize};

use crate::BlockNumber;

/// A price observed at a block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
	pub block: BlockNumber,
	pub price: f64,
}

impl PricePoint {
	pub fn new(block: BlockNumber, price: f64) -> Self {
		Self { block, price }
	}
}

/// Decayed volatility for one day of blocks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityPoint {
	pub block_start: BlockNumber,
	pub block_end: BlockNumber,
	/// Value carried from the previous day, before decay.
	pub yesterday: f64,
	pub current: f64,
}

/// Volatility history with a pointer to its most recent point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilitySeries {
	pub latest: VolatilityPoint,
	pub history: Vec<VolatilityPoint>,
}

impl VolatilitySeries {
	/// Wraps a non-empty history. Returns `None` for an empty one.
	pub fn from_history(history: Vec<VolatilityPoint>) -> Option<Self> {
		let latest = *history.last()?;
		Some(Self { latest, history })
	}
}
