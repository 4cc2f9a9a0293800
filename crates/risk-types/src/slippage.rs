//! Discretized slippage curves.
//!
//! A [`SlippageMap`] maps a slippage bucket (in basis points) to the
//! cumulative volume tradable before price impact exceeds that bucket.
//! Buckets are addressed by the integer [`SlippageBps`] type; string keys only
//! appear at the serde boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use crate::TypesError;

/// Default distance between two buckets, in basis points.
pub const DEFAULT_STEP_BPS: u32 = 50;

/// Largest bucket of every curve, in basis points (20%).
pub const MAX_SLIPPAGE_BPS: u32 = 2000;

/// Denominator used to turn basis points into a ratio.
pub const BPS_DENOMINATOR: f64 = 10_000.0;

/// A slippage bucket in basis points.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SlippageBps(pub u32);

impl SlippageBps {
	pub const ZERO: SlippageBps = SlippageBps(0);

	pub fn bps(self) -> u32 {
		self.0
	}

	/// Fraction of value kept when crossing an edge at this slippage.
	pub fn retention(self) -> f64 {
		(BPS_DENOMINATOR - self.0 as f64) / BPS_DENOMINATOR
	}

	/// Rounds down onto the `step` grid.
	pub fn floor_to(self, step: u32) -> SlippageBps {
		if step == 0 {
			return self;
		}
		SlippageBps(self.0 - self.0 % step)
	}
}

impl fmt::Display for SlippageBps {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}bps", self.0)
	}
}

impl From<u32> for SlippageBps {
	fn from(value: u32) -> Self {
		SlippageBps(value)
	}
}

/// Volume tradable for one bucket, expressed in each asset's own units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VolumePair {
	pub base: f64,
	pub quote: f64,
}

impl VolumePair {
	pub const ZERO: VolumePair = VolumePair {
		base: 0.0,
		quote: 0.0,
	};

	pub fn new(base: f64, quote: f64) -> Self {
		Self { base, quote }
	}

	pub fn scale(self, factor: f64) -> Self {
		Self {
			base: self.base * factor,
			quote: self.quote * factor,
		}
	}

	pub fn is_zero(&self) -> bool {
		self.base == 0.0 && self.quote == 0.0
	}
}

impl Add for VolumePair {
	type Output = VolumePair;

	fn add(self, rhs: VolumePair) -> VolumePair {
		VolumePair {
			base: self.base + rhs.base,
			quote: self.quote + rhs.quote,
		}
	}
}

impl AddAssign for VolumePair {
	fn add_assign(&mut self, rhs: VolumePair) {
		self.base += rhs.base;
		self.quote += rhs.quote;
	}
}

impl Sub for VolumePair {
	type Output = VolumePair;

	fn sub(self, rhs: VolumePair) -> VolumePair {
		VolumePair {
			base: self.base - rhs.base,
			quote: self.quote - rhs.quote,
		}
	}
}

/// Cumulative slippage curve.
///
/// Invariant: for a fixed component, the value at bucket `b` is never lower
/// than the value at `b - step`. Bucket 0 is implicit and always zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
	from = "BTreeMap<SlippageBps, VolumePair>",
	into = "BTreeMap<SlippageBps, VolumePair>"
)]
pub struct SlippageMap {
	step: u32,
	buckets: BTreeMap<SlippageBps, VolumePair>,
}

impl Default for SlippageMap {
	fn default() -> Self {
		Self::zeroed(DEFAULT_STEP_BPS, MAX_SLIPPAGE_BPS)
	}
}

impl SlippageMap {
	/// A curve with every bucket `step..=max` set to zero.
	pub fn zeroed(step: u32, max: u32) -> Self {
		let step = step.max(1);
		let buckets = (1..=max / step)
			.map(|i| (SlippageBps(i * step), VolumePair::ZERO))
			.collect();
		Self { step, buckets }
	}

	/// Builds a curve on the `step..=max` grid from sparse entries.
	///
	/// Buckets without an entry carry the previous bucket's value forward.
	/// Entries off the grid are ignored.
	pub fn from_sparse<I>(entries: I, step: u32, max: u32) -> Result<Self, TypesError>
	where
		I: IntoIterator<Item = (SlippageBps, VolumePair)>,
	{
		if step == 0 || max < step {
			return Err(TypesError::InvalidStep { step, max });
		}
		let sparse: BTreeMap<SlippageBps, VolumePair> = entries.into_iter().collect();
		let mut buckets = BTreeMap::new();
		let mut last = VolumePair::ZERO;
		for i in 1..=max / step {
			let bucket = SlippageBps(i * step);
			if let Some(value) = sparse.get(&bucket) {
				last = *value;
			}
			buckets.insert(bucket, last);
		}
		Ok(Self { step, buckets })
	}

	pub fn step(&self) -> u32 {
		self.step
	}

	/// Largest bucket present, or zero for an empty curve.
	pub fn max_bucket(&self) -> SlippageBps {
		self.buckets
			.keys()
			.next_back()
			.copied()
			.unwrap_or(SlippageBps::ZERO)
	}

	/// Value at `bucket`; bucket 0 and absent buckets read as zero.
	pub fn get(&self, bucket: SlippageBps) -> VolumePair {
		self.buckets.get(&bucket).copied().unwrap_or(VolumePair::ZERO)
	}

	/// Value at the largest bucket not above `bucket`.
	pub fn floor_value(&self, bucket: SlippageBps) -> VolumePair {
		self.buckets
			.range(..=bucket)
			.next_back()
			.map(|(_, v)| *v)
			.unwrap_or(VolumePair::ZERO)
	}

	pub fn insert(&mut self, bucket: SlippageBps, value: VolumePair) {
		if bucket != SlippageBps::ZERO {
			self.buckets.insert(bucket, value);
		}
	}

	pub fn iter(&self) -> impl Iterator<Item = (SlippageBps, VolumePair)> + '_ {
		self.buckets.iter().map(|(k, v)| (*k, *v))
	}

	pub fn buckets(&self) -> impl Iterator<Item = SlippageBps> + '_ {
		self.buckets.keys().copied()
	}

	pub fn len(&self) -> usize {
		self.buckets.len()
	}

	pub fn is_empty(&self) -> bool {
		self.buckets.is_empty()
	}

	/// True when no bucket carries any volume.
	pub fn has_no_liquidity(&self) -> bool {
		self.buckets.values().all(VolumePair::is_zero)
	}

	/// Checks the cumulative invariant on both components.
	pub fn is_monotonic(&self) -> bool {
		let mut previous = VolumePair::ZERO;
		for value in self.buckets.values() {
			if value.base < previous.base || value.quote < previous.quote {
				return false;
			}
			previous = *value;
		}
		true
	}

	/// Applies `f` to every bucket value.
	pub fn map_values<F>(&self, f: F) -> SlippageMap
	where
		F: Fn(VolumePair) -> VolumePair,
	{
		SlippageMap {
			step: self.step,
			buckets: self.buckets.iter().map(|(k, v)| (*k, f(*v))).collect(),
		}
	}
}

impl From<BTreeMap<SlippageBps, VolumePair>> for SlippageMap {
	fn from(buckets: BTreeMap<SlippageBps, VolumePair>) -> Self {
		let mut buckets = buckets;
		buckets.remove(&SlippageBps::ZERO);
		let step = buckets
			.keys()
			.next()
			.map(|b| b.0)
			.unwrap_or(DEFAULT_STEP_BPS);
		Self { step, buckets }
	}
}

impl From<SlippageMap> for BTreeMap<SlippageBps, VolumePair> {
	fn from(map: SlippageMap) -> Self {
		map.buckets
	}
}

/// Non-cumulative (per bucket) curve produced by differencing.
///
/// Kept as a separate type so a marginal curve can never be differenced a
/// second time.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct MarginalSlippageMap(BTreeMap<SlippageBps, VolumePair>);

impl MarginalSlippageMap {
	pub fn new(buckets: BTreeMap<SlippageBps, VolumePair>) -> Self {
		Self(buckets)
	}

	pub fn get(&self, bucket: SlippageBps) -> VolumePair {
		self.0.get(&bucket).copied().unwrap_or(VolumePair::ZERO)
	}

	pub fn iter(&self) -> impl Iterator<Item = (SlippageBps, VolumePair)> + '_ {
		self.0.iter().map(|(k, v)| (*k, *v))
	}

	pub fn into_inner(self) -> BTreeMap<SlippageBps, VolumePair> {
		self.0
	}
}
