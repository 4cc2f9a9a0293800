//! Time-indexed liquidity snapshots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{BlockNumber, BlockWindow, SlippageMap};

/// One venue's (or an aggregate's) state at a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquiditySnapshot {
	pub block_number: BlockNumber,
	pub price: f64,
	pub slippage_map: SlippageMap,
}

/// Snapshots keyed by block, consumed in ascending block order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotSeries {
	snapshots: BTreeMap<BlockNumber, LiquiditySnapshot>,
}

impl SnapshotSeries {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, snapshot: LiquiditySnapshot) {
		self.snapshots.insert(snapshot.block_number, snapshot);
	}

	pub fn len(&self) -> usize {
		self.snapshots.len()
	}

	pub fn is_empty(&self) -> bool {
		self.snapshots.is_empty()
	}

	pub fn first(&self) -> Option<&LiquiditySnapshot> {
		self.snapshots.values().next()
	}

	pub fn last(&self) -> Option<&LiquiditySnapshot> {
		self.snapshots.values().next_back()
	}

	pub fn get(&self, block: BlockNumber) -> Option<&LiquiditySnapshot> {
		self.snapshots.get(&block)
	}

	/// Latest snapshot at or before `block`.
	pub fn at_or_before(&self, block: BlockNumber) -> Option<&LiquiditySnapshot> {
		self.snapshots.range(..=block).next_back().map(|(_, s)| s)
	}

	pub fn iter(&self) -> impl Iterator<Item = &LiquiditySnapshot> {
		self.snapshots.values()
	}

	pub fn blocks(&self) -> impl Iterator<Item = BlockNumber> + '_ {
		self.snapshots.keys().copied()
	}

	/// Resamples the series onto `window` with last-observation-carried-forward.
	///
	/// Sampled blocks before the first known snapshot are left out. Every
	/// emitted snapshot is re-stamped with the sampled block number.
	pub fn locf(&self, window: &BlockWindow) -> SnapshotSeries {
		let mut out = SnapshotSeries::new();
		for block in window.blocks() {
			if let Some(snapshot) = self.at_or_before(block) {
				out.insert(LiquiditySnapshot {
					block_number: block,
					..snapshot.clone()
				});
			}
		}
		out
	}

	/// True when no snapshot carries any volume.
	pub fn has_no_liquidity(&self) -> bool {
		self.snapshots
			.values()
			.all(|s| s.slippage_map.has_no_liquidity())
	}
}

impl FromIterator<LiquiditySnapshot> for SnapshotSeries {
	fn from_iter<T: IntoIterator<Item = LiquiditySnapshot>>(iter: T) -> Self {
		let mut series = SnapshotSeries::new();
		for snapshot in iter {
			series.insert(snapshot);
		}
		series
	}
}

/// Snapshots of a single pool, identified for double-counting checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSeries {
	pub pool_id: String,
	pub series: SnapshotSeries,
}
