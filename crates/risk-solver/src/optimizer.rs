//! Multi-hop route optimizer.
//!
//! For a target bucket `B` the pairwise curves of every asset in the pivot
//! set form a flow network. Each edge offers its marginal liquidity per
//! bucket `b <= B`, valued in USD. Flow entering an intermediate asset
//! through a bucket-`b` edge keeps `(10000 - b) / 10000` of its value and
//! must leave again, and the objective rewards value reaching the target
//! while charging what leaves the origin at the same discount the budget
//! allows. The optimal flow out of the origin, converted back into origin
//! units and added to the direct route, is the bucket's liquidity.
//!
//! The origin-to-target edge itself is not part of the network: direct
//! liquidity is supplied separately and added on top of the routed volume.

use risk_liquidity::algebra::{conform, difference, to_usd};
use risk_types::{Asset, MarginalSlippageMap, SlippageBps, SlippageMap, TypesError};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::model::{LpModel, LpVariable, Relation};
use crate::{LpSolverInterface, SolverError};

/// Cumulative curves per directed pair: `pairs[from][to]`.
pub type PairData = BTreeMap<Asset, BTreeMap<Asset, SlippageMap>>;

/// Errors that make an optimization request unanswerable.
#[derive(Debug, Error)]
pub enum OptimizerError {
	/// An asset carrying liquidity in the network has no usable USD price.
	#[error("No USD price for {0}")]
	MissingPrice(Asset),
	/// The bucket grid is malformed.
	#[error("Invalid bucket grid: {0}")]
	InvalidGrid(#[from] TypesError),
}

/// Everything one optimization needs.
#[derive(Debug, Clone)]
pub struct OptimizerInput {
	pub origin: Asset,
	pub target: Asset,
	pub pairs: PairData,
	/// USD price per asset.
	pub prices: BTreeMap<Asset, f64>,
	/// Cumulative direct-route curve, base in origin units.
	pub direct: Option<SlippageMap>,
	pub step: u32,
	pub max_bucket: u32,
}

impl OptimizerInput {
	fn buckets(&self) -> Vec<SlippageBps> {
		(self.step..=self.max_bucket)
			.step_by(self.step.max(1) as usize)
			.map(SlippageBps)
			.collect()
	}
}

/// Liquidity per bucket, in origin units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizedLiquidity {
	pub origin: Asset,
	pub target: Asset,
	pub slippage_map: BTreeMap<SlippageBps, f64>,
}

impl OptimizedLiquidity {
	pub fn get(&self, bucket: SlippageBps) -> f64 {
		self.slippage_map.get(&bucket).copied().unwrap_or(0.0)
	}
}

/// Solves one model per bucket through a shared solver.
pub struct RouteOptimizer {
	solver: Arc<dyn LpSolverInterface>,
}

impl RouteOptimizer {
	pub fn new(solver: Arc<dyn LpSolverInterface>) -> Self {
		Self { solver }
	}

	pub fn solver(&self) -> &Arc<dyn LpSolverInterface> {
		&self.solver
	}

	/// Computes the full curve, one concurrently solved model per bucket.
	///
	/// Returns `None` when neither the pair data nor the direct route has
	/// any liquidity leaving the origin. A bucket whose solve fails keeps
	/// the direct route's value.
	#[instrument(skip_all, fields(origin = %input.origin, target = %input.target))]
	pub async fn optimize(
		&self,
		input: &OptimizerInput,
	) -> Result<Option<OptimizedLiquidity>, OptimizerError> {
		let Some(graph) = RouteGraph::prepare(input)? else {
			return Ok(None);
		};
		let graph = Arc::new(graph);
		let buckets = input.buckets();

		let mut slippage_map: BTreeMap<SlippageBps, f64> = buckets
			.iter()
			.map(|bucket| (*bucket, graph.direct_value(*bucket)))
			.collect();
		let mut tasks = JoinSet::new();
		for bucket in buckets {
			let solver = Arc::clone(&self.solver);
			let graph = Arc::clone(&graph);
			tasks.spawn(async move { (bucket, graph.solve_bucket(solver.as_ref(), bucket).await) });
		}
		while let Some(joined) = tasks.join_next().await {
			match joined {
				Ok((bucket, Ok(value))) => {
					slippage_map.insert(bucket, value);
				}
				Ok((bucket, Err(e))) => {
					warn!(%bucket, "LP solve failed, routed volume counted as 0: {}", e);
				}
				Err(e) => {
					warn!("LP task did not complete, its routed volume is counted as 0: {}", e);
				}
			}
		}

		Ok(Some(OptimizedLiquidity {
			origin: input.origin.clone(),
			target: input.target.clone(),
			slippage_map,
		}))
	}

	/// Liquidity at a single bucket, computed exactly as within [`Self::optimize`].
	pub async fn bucket_value(
		&self,
		input: &OptimizerInput,
		bucket: SlippageBps,
	) -> Result<Option<f64>, OptimizerError> {
		let Some(graph) = RouteGraph::prepare(input)? else {
			return Ok(None);
		};
		match graph.solve_bucket(self.solver.as_ref(), bucket).await {
			Ok(value) => Ok(Some(value)),
			Err(e) => {
				warn!(%bucket, "LP solve failed, routed volume counted as 0: {}", e);
				Ok(Some(graph.direct_value(bucket)))
			}
		}
	}
}

/// Marginal USD liquidity per edge, differenced once for all buckets.
struct RouteGraph {
	origin: Asset,
	target: Asset,
	edges: BTreeMap<(Asset, Asset), MarginalSlippageMap>,
	direct: Option<SlippageMap>,
	origin_price: Option<f64>,
}

impl RouteGraph {
	fn prepare(input: &OptimizerInput) -> Result<Option<Self>, OptimizerError> {
		let (step, max) = (input.step, input.max_bucket);
		if step == 0 || max < step {
			return Err(TypesError::InvalidStep { step, max }.into());
		}

		let from_origin = input.pairs.get(&input.origin).is_some_and(|targets| {
			targets
				.iter()
				.any(|(asset_out, map)| *asset_out != input.target && !map.has_no_liquidity())
		});
		let direct = input
			.direct
			.as_ref()
			.filter(|map| !map.has_no_liquidity())
			.map(|map| conform(map, step, max))
			.transpose()?;
		if !from_origin && direct.is_none() {
			return Ok(None);
		}

		let mut edges = BTreeMap::new();
		for (asset_in, targets) in &input.pairs {
			for (asset_out, map) in targets {
				let skipped = asset_in == asset_out
					|| *asset_out == input.origin
					|| *asset_in == input.target
					|| (*asset_in == input.origin && *asset_out == input.target)
					|| map.has_no_liquidity();
				if skipped {
					continue;
				}
				let price = usd_price(&input.prices, asset_in)?;
				let usd = to_usd(&conform(map, step, max)?, price);
				edges.insert((asset_in.clone(), asset_out.clone()), difference(&usd));
			}
		}

		let origin_price = if edges.keys().any(|(asset_in, _)| *asset_in == input.origin) {
			Some(usd_price(&input.prices, &input.origin)?)
		} else {
			None
		};

		Ok(Some(Self {
			origin: input.origin.clone(),
			target: input.target.clone(),
			edges,
			direct,
			origin_price,
		}))
	}

	fn direct_value(&self, bucket: SlippageBps) -> f64 {
		self.direct.as_ref().map_or(0.0, |map| map.get(bucket).base)
	}

	async fn solve_bucket(
		&self,
		solver: &dyn LpSolverInterface,
		bucket: SlippageBps,
	) -> Result<f64, SolverError> {
		let direct = self.direct_value(bucket);
		let (Some(model), Some(origin_price)) = (self.model(bucket), self.origin_price) else {
			debug!(%bucket, "target unreachable through pivots, using the direct route");
			return Ok(direct);
		};

		let activations = solver.solve(&model).await?;
		let mut routed = 0.0;
		for activation in &activations {
			if activation.variable()?.asset_in == self.origin {
				routed += activation.value;
			}
		}
		Ok(direct + routed / origin_price)
	}

	/// The LP for target bucket `bucket`, or `None` when no flow can reach
	/// the target.
	fn model(&self, bucket: SlippageBps) -> Option<LpModel> {
		let mut model = LpModel::new();
		for ((asset_in, asset_out), marginal) in &self.edges {
			for (b, value) in marginal.iter() {
				if b > bucket {
					break;
				}
				if value.base <= 0.0 {
					continue;
				}
				let index = model.add_variable(LpVariable::new(asset_in.clone(), b, asset_out.clone()));
				model.add_constraint(vec![(index, 1.0)], Relation::Le, value.base);
			}
		}
		if !self.reaches_target(model.variables()) {
			return None;
		}

		let budget = bucket.retention();
		let mut objective = Vec::new();
		let mut balance: BTreeMap<&str, Vec<(usize, f64)>> = BTreeMap::new();
		for (index, variable) in model.variables().iter().enumerate() {
			if variable.asset_out == self.target {
				objective.push((index, 1.0));
			} else {
				balance
					.entry(variable.asset_out.as_str())
					.or_default()
					.push((index, -variable.bucket.retention()));
			}
			if variable.asset_in == self.origin {
				objective.push((index, -budget));
			} else {
				balance
					.entry(variable.asset_in.as_str())
					.or_default()
					.push((index, 1.0));
			}
		}
		let balance: Vec<Vec<(usize, f64)>> = balance.into_values().collect();

		for (index, coefficient) in objective {
			model.add_objective_term(index, coefficient);
		}
		for terms in balance {
			model.add_constraint(terms.clone(), Relation::Le, 0.0);
			model.add_constraint(terms, Relation::Ge, 0.0);
		}
		Some(model)
	}

	fn reaches_target(&self, variables: &[LpVariable]) -> bool {
		let mut adjacency: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
		for variable in variables {
			adjacency
				.entry(variable.asset_in.as_str())
				.or_default()
				.insert(variable.asset_out.as_str());
		}

		let mut seen = BTreeSet::from([self.origin.as_str()]);
		let mut queue = VecDeque::from([self.origin.as_str()]);
		while let Some(asset) = queue.pop_front() {
			for next in adjacency.get(asset).into_iter().flatten() {
				if *next == self.target {
					return true;
				}
				if seen.insert(*next) {
					queue.push_back(*next);
				}
			}
		}
		false
	}
}

fn usd_price(prices: &BTreeMap<Asset, f64>, asset: &str) -> Result<f64, OptimizerError> {
	prices
		.get(asset)
		.copied()
		.filter(|price| price.is_finite() && *price > 0.0)
		.ok_or_else(|| OptimizerError::MissingPrice(asset.to_string()))
}
