//! Multi-hop route optimization for the risk engine.
//!
//! For every slippage bucket a linear program is built from the pairwise
//! marginal liquidity of all assets in the pivot set, solved through an
//! [`LpSolverInterface`], and the optimal flow leaving the origin is read
//! back. Buckets are independent problems and are solved concurrently.

use async_trait::async_trait;
use risk_types::ConfigSchema;
use thiserror::Error;

pub mod gmpl;
pub mod model;
pub mod optimizer;

/// Re-export implementations
pub mod implementations {
	pub mod glpsol;
	pub mod simplex;
}

pub use model::{Activation, Constraint, LpModel, LpVariable, Relation};
pub use optimizer::{OptimizedLiquidity, OptimizerError, OptimizerInput, PairData, RouteOptimizer};

/// Errors that can occur while solving a single model.
#[derive(Debug, Error)]
pub enum SolverError {
	/// The model cannot be handed to this solver.
	#[error("Invalid model: {0}")]
	InvalidModel(String),
	/// The objective can grow without limit.
	#[error("Model is unbounded")]
	Unbounded,
	/// The solver reported that no feasible point exists.
	#[error("Model is infeasible")]
	Infeasible,
	/// The pivot budget ran out before an optimum was proven.
	#[error("Iteration limit reached after {0} pivots")]
	IterationLimit(usize),
	/// Solver output could not be read back.
	#[error("Failed to parse solver output: {0}")]
	Parse(String),
	/// The external solver process failed or timed out.
	#[error("Solver process failed: {0}")]
	Process(String),
}

/// Trait defining the interface for linear program solvers.
///
/// Every model handed over is a maximization with non-negative variables.
/// Solvers report one [`Activation`] per variable, in model order; zero
/// activations may be omitted.
#[async_trait]
pub trait LpSolverInterface: Send + Sync {
	/// Returns the configuration schema for this solver.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Solves `model` to optimality.
	async fn solve(&self, model: &LpModel) -> Result<Vec<Activation>, SolverError>;
}
