//! Common types used throughout the risk engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Block number
pub type BlockNumber = u64;

/// Timestamp (Unix seconds)
pub type Timestamp = i64;

/// Asset symbol as configured (e.g. "WETH", "USDC").
pub type Asset = String;

/// Platform name that selects the cross-venue union instead of one venue.
pub const ALL_PLATFORMS: &str = "all";

/// Inclusive block interval sampled every `step_block` blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWindow {
	pub from_block: BlockNumber,
	pub to_block: BlockNumber,
	pub step_block: u64,
}

impl BlockWindow {
	pub fn new(from_block: BlockNumber, to_block: BlockNumber, step_block: u64) -> Self {
		Self {
			from_block,
			to_block,
			step_block: step_block.max(1),
		}
	}

	/// A window covering a single block.
	pub fn at(block: BlockNumber) -> Self {
		Self::new(block, block, 1)
	}

	/// Number of blocks in the window, bounds included.
	pub fn len(&self) -> u64 {
		self.to_block.saturating_sub(self.from_block) + 1
	}

	pub fn is_empty(&self) -> bool {
		self.to_block < self.from_block
	}

	/// Sampled block numbers in ascending order.
	pub fn blocks(&self) -> impl Iterator<Item = BlockNumber> {
		(self.from_block..=self.to_block).step_by(self.step_block as usize)
	}
}

impl fmt::Display for BlockWindow {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"[{}..={}] step {}",
			self.from_block, self.to_block, self.step_block
		)
	}
}
