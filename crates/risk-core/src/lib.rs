//! Risk engine facade.
//!
//! Wires a liquidity provider, an LP solver and the volatility estimators
//! into a [`RiskEngine`] that answers the caller-facing queries. Engines are
//! assembled by [`RiskEngineBuilder`] from an [`EngineConfig`] and a set of
//! named implementation factories.

use risk_config::EngineConfig;
use risk_liquidity::{LiquidityError, LiquiditySourceInterface, RouteCombination};
use risk_solver::{LpSolverInterface, OptimizerError};
use risk_volatility::VolatilityError;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub mod clock;
pub mod engine;
pub mod routes;
pub mod tuner;

pub use clock::SourceClock;
pub use engine::RiskEngine;
pub use routes::all_pairs;
pub use tuner::{Permutations, PivotTuning, DEFAULT_REFERENCE_BUCKET, MAX_TUNING_PIVOTS};

/// Errors returned by the engine operations.
///
/// Missing data is never an error: the operations return `Ok(None)`.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Configuration(String),
	#[error("Source error: {0}")]
	Source(LiquidityError),
	#[error("Volatility error: {0}")]
	Volatility(VolatilityError),
}

impl From<LiquidityError> for EngineError {
	fn from(err: LiquidityError) -> Self {
		match err {
			LiquidityError::UnknownPlatform(_) => EngineError::Configuration(err.to_string()),
			other => EngineError::Source(other),
		}
	}
}

impl From<OptimizerError> for EngineError {
	fn from(err: OptimizerError) -> Self {
		EngineError::Configuration(err.to_string())
	}
}

impl From<VolatilityError> for EngineError {
	fn from(err: VolatilityError) -> Self {
		match err {
			VolatilityError::InvalidLambda(_)
			| VolatilityError::InvalidWindow
			| VolatilityError::InvalidDays => EngineError::Configuration(err.to_string()),
			other => EngineError::Volatility(other),
		}
	}
}

type SourceFactory = Box<dyn Fn(&toml::Value) -> Box<dyn LiquiditySourceInterface> + Send>;
type SolverFactory = Box<dyn Fn(&toml::Value) -> Box<dyn LpSolverInterface> + Send>;

/// Assembles a [`RiskEngine`] from configuration and registered factories.
pub struct RiskEngineBuilder {
	config: EngineConfig,
	source_factories: HashMap<String, SourceFactory>,
	solver_factories: HashMap<String, SolverFactory>,
	combination: Option<Arc<dyn RouteCombination>>,
}

impl RiskEngineBuilder {
	pub fn new(config: EngineConfig) -> Self {
		Self {
			config,
			source_factories: HashMap::new(),
			solver_factories: HashMap::new(),
			combination: None,
		}
	}

	pub fn with_source_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Box<dyn LiquiditySourceInterface> + Send + 'static,
	{
		self.source_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	pub fn with_solver_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Box<dyn LpSolverInterface> + Send + 'static,
	{
		self.solver_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	/// Overrides the two-hop combination rule.
	pub fn with_combination(mut self, combination: Arc<dyn RouteCombination>) -> Self {
		self.combination = Some(combination);
		self
	}

	pub fn build(self) -> Result<RiskEngine, EngineError> {
		// Create liquidity source
		let source_config = &self.config.source;
		let source_factory = self
			.source_factories
			.get(&source_config.implementation)
			.ok_or_else(|| {
				EngineError::Configuration(format!(
					"Source factory '{}' not provided",
					source_config.implementation
				))
			})?;
		let source: Arc<dyn LiquiditySourceInterface> =
			Arc::from(source_factory(&source_config.config));
		source
			.config_schema()
			.validate(&source_config.config)
			.map_err(|e| {
				EngineError::Configuration(format!(
					"Invalid source config for '{}': {}",
					source_config.implementation, e
				))
			})?;

		// Create LP solver
		let solver_config = &self.config.solver;
		let solver_factory = self
			.solver_factories
			.get(&solver_config.implementation)
			.ok_or_else(|| {
				EngineError::Configuration(format!(
					"Solver factory '{}' not provided",
					solver_config.implementation
				))
			})?;
		let solver: Arc<dyn LpSolverInterface> = Arc::from(solver_factory(&solver_config.config));
		solver
			.config_schema()
			.validate(&solver_config.config)
			.map_err(|e| {
				EngineError::Configuration(format!(
					"Invalid solver config for '{}': {}",
					solver_config.implementation, e
				))
			})?;

		info!(
			engine = %self.config.engine.name,
			source = %source_config.implementation,
			solver = %solver_config.implementation,
			"risk engine assembled"
		);

		let engine = RiskEngine::new(self.config, source, solver);
		Ok(match self.combination {
			Some(combination) => engine.with_combination(combination),
			None => engine,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use risk_liquidity::implementations::memory;
	use risk_solver::implementations::simplex;

	fn builder(config: EngineConfig) -> RiskEngineBuilder {
		RiskEngineBuilder::new(config)
			.with_source_factory("memory", memory::create_source)
			.with_solver_factory("simplex", simplex::create_solver)
	}

	#[test]
	fn test_build_from_default_config() {
		let engine = builder(EngineConfig::default()).build().unwrap();
		assert_eq!(engine.liquidity().platforms(), ["univ3"]);
		assert_eq!(engine.liquidity().step(), 50);
	}

	#[test]
	fn test_missing_factory() {
		let mut config = EngineConfig::default();
		config.solver.implementation = "glpsol".to_string();
		let err = builder(config).build().err().unwrap();
		assert!(
			matches!(&err, EngineError::Configuration(msg) if msg.contains("glpsol")),
			"{}",
			err
		);

		let err = RiskEngineBuilder::new(EngineConfig::default())
			.build()
			.err()
			.unwrap();
		assert!(matches!(err, EngineError::Configuration(msg) if msg.contains("memory")));
	}

	#[test]
	fn test_invalid_implementation_config() {
		let mut config = EngineConfig::default();
		config.solver.config = toml::from_str("max_iterations = 0").unwrap();
		let err = builder(config).build().err().unwrap();
		assert!(matches!(err, EngineError::Configuration(msg) if msg.contains("simplex")));
	}

	#[test]
	fn test_error_mapping() {
		let err: EngineError = LiquidityError::UnknownPlatform("sushi".into()).into();
		assert!(matches!(err, EngineError::Configuration(_)));
		let err: EngineError = LiquidityError::Source("timeout".into()).into();
		assert!(matches!(err, EngineError::Source(_)));
		let err: EngineError = VolatilityError::InvalidLambda(1.5).into();
		assert!(matches!(err, EngineError::Configuration(_)));
		let err: EngineError = VolatilityError::MissingTimestamp(7).into();
		assert!(matches!(err, EngineError::Volatility(_)));
		let err: EngineError = OptimizerError::MissingPrice("WETH".into()).into();
		assert!(matches!(err, EngineError::Configuration(msg) if msg.contains("WETH")));
	}
}
