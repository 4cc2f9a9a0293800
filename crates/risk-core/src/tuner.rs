//! Offline search for the best pivot ordering of a pair.
//!
//! Pivots are tried in order and a pool claimed by an earlier pivot is not
//! available to a later one, so the ordering changes the aggregated volume
//! whenever pools are shared between routes. The tuner scores every
//! ordering of a candidate set and reports the best one as a routing
//! override. It never touches the engine's own configuration.

use risk_config::{PairPattern, RoutingConfig};
use risk_liquidity::UsedPools;
use risk_types::{Asset, BlockNumber, BlockWindow, SlippageBps};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::{EngineError, RiskEngine};

/// Largest candidate set accepted; the search visits `n!` orderings.
pub const MAX_TUNING_PIVOTS: usize = 8;

/// Bucket whose volume scores an ordering unless the caller picks one.
pub const DEFAULT_REFERENCE_BUCKET: SlippageBps = SlippageBps(500);

/// Every ordering of a list, generated iteratively with Heap's algorithm.
///
/// The input order comes first. Each later ordering differs from the
/// previous one by a single swap.
pub struct Permutations<T> {
	items: Vec<T>,
	counters: Vec<usize>,
	index: usize,
	started: bool,
}

impl<T: Clone> Permutations<T> {
	pub fn new(items: Vec<T>) -> Self {
		let counters = vec![0; items.len()];
		Self {
			items,
			counters,
			index: 1,
			started: false,
		}
	}
}

impl<T: Clone> Iterator for Permutations<T> {
	type Item = Vec<T>;

	fn next(&mut self) -> Option<Self::Item> {
		if !self.started {
			self.started = true;
			return Some(self.items.clone());
		}
		while self.index < self.items.len() {
			let i = self.index;
			if self.counters[i] < i {
				if i % 2 == 0 {
					self.items.swap(0, i);
				} else {
					self.items.swap(self.counters[i], i);
				}
				self.counters[i] += 1;
				self.index = 1;
				return Some(self.items.clone());
			}
			self.counters[i] = 0;
			self.index += 1;
		}
		None
	}
}

/// Outcome of a pivot ordering search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTuning {
	pub from: Asset,
	pub to: Asset,
	pub reference: SlippageBps,
	/// Candidates in the order they were given.
	pub candidates: Vec<String>,
	/// Best ordering found; empty when no ordering routes any volume.
	pub pivots: Vec<String>,
	/// Volume of the best ordering at the reference bucket.
	pub value: f64,
	pub evaluated: usize,
}

impl PivotTuning {
	pub fn pattern(&self) -> PairPattern {
		PairPattern::exact(&self.from, &self.to)
	}

	/// The override worth recording.
	///
	/// `None` when nothing routed or when the candidates' own order already
	/// scored best.
	pub fn override_entry(&self) -> Option<(PairPattern, Vec<String>)> {
		if self.pivots.is_empty() || self.pivots == self.candidates {
			return None;
		}
		Some((self.pattern(), self.pivots.clone()))
	}

	/// A copy of `routing` with this result applied.
	pub fn apply(&self, routing: &RoutingConfig) -> RoutingConfig {
		match self.override_entry() {
			Some((pattern, pivots)) => routing.clone().with_override(pattern, pivots),
			None => routing.clone(),
		}
	}
}

impl RiskEngine {
	/// Scores every ordering of `candidates` by the aggregated volume of
	/// `from → to` at `block` and returns the best.
	///
	/// The first ordering reaching the highest volume wins ties. Candidates
	/// equal to either side of the pair, and repeated ones, are dropped.
	#[instrument(skip(self, candidates))]
	pub async fn tune_pivots(
		&self,
		platform: &str,
		from: &str,
		to: &str,
		block: BlockNumber,
		candidates: &[String],
		reference: Option<SlippageBps>,
	) -> Result<PivotTuning, EngineError> {
		let (from, to) = self.config().routing.resolve_pair(from, to);
		let mut unique: Vec<String> = Vec::with_capacity(candidates.len());
		for candidate in candidates {
			if *candidate != from && *candidate != to && !unique.contains(candidate) {
				unique.push(candidate.clone());
			}
		}
		if unique.len() > MAX_TUNING_PIVOTS {
			return Err(EngineError::Configuration(format!(
				"At most {} candidate pivots can be tuned, got {}",
				MAX_TUNING_PIVOTS,
				unique.len()
			)));
		}
		let reference = reference
			.unwrap_or(DEFAULT_REFERENCE_BUCKET)
			.floor_to(self.liquidity().step());
		let window = BlockWindow::at(block);

		let mut best = Vec::new();
		let mut best_value = 0.0;
		let mut evaluated = 0;
		for ordering in Permutations::new(unique.clone()) {
			let mut used = UsedPools::new();
			let value = self
				.liquidity()
				.series_with_jumps(platform, &from, &to, &window, &ordering, &mut used)
				.await?
				.and_then(|series| {
					series
						.get(block)
						.map(|snapshot| snapshot.slippage_map.get(reference).base)
				})
				.unwrap_or(0.0);
			evaluated += 1;
			debug!(pivots = ?ordering, value, "ordering evaluated");
			if value > best_value {
				info!(pivots = ?ordering, value, "new best ordering");
				best_value = value;
				best = ordering;
			}
		}

		Ok(PivotTuning {
			from,
			to,
			reference,
			candidates: unique,
			pivots: best,
			value: best_value,
			evaluated,
		})
	}
}
