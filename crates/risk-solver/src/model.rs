//! Linear program representation.

use risk_types::{Asset, SlippageBps};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::SolverError;

/// Flow through one edge at one slippage bucket.
///
/// Rendered as `assetIn_bucket_assetOut`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LpVariable {
	pub asset_in: Asset,
	pub bucket: SlippageBps,
	pub asset_out: Asset,
}

impl LpVariable {
	pub fn new(asset_in: impl Into<Asset>, bucket: SlippageBps, asset_out: impl Into<Asset>) -> Self {
		Self {
			asset_in: asset_in.into(),
			bucket,
			asset_out: asset_out.into(),
		}
	}

	pub fn name(&self) -> String {
		self.to_string()
	}

	/// Parses a variable name back.
	///
	/// The first all-digit segment with text on both sides is the bucket, so
	/// asset symbols may contain underscores as long as no segment before
	/// the bucket is purely numeric.
	pub fn parse(name: &str) -> Result<Self, SolverError> {
		let segments: Vec<&str> = name.split('_').collect();
		for i in 1..segments.len().saturating_sub(1) {
			let segment = segments[i];
			if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
				continue;
			}
			let bucket = segment
				.parse::<u32>()
				.map_err(|e| SolverError::Parse(format!("{}: {}", name, e)))?;
			let asset_in = segments[..i].join("_");
			let asset_out = segments[i + 1..].join("_");
			if asset_in.is_empty() || asset_out.is_empty() {
				break;
			}
			return Ok(Self::new(asset_in, SlippageBps(bucket), asset_out));
		}
		Err(SolverError::Parse(format!("not an edge variable: {}", name)))
	}
}

impl fmt::Display for LpVariable {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}_{}_{}", self.asset_in, self.bucket.bps(), self.asset_out)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
	Le,
	Ge,
}

impl fmt::Display for Relation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Relation::Le => write!(f, "<="),
			Relation::Ge => write!(f, ">="),
		}
	}
}

/// `Σ coefficient · variable (<= | >=) rhs`, terms referring to variable indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
	pub terms: Vec<(usize, f64)>,
	pub relation: Relation,
	pub rhs: f64,
}

/// A maximization over non-negative variables.
#[derive(Debug, Clone, Default)]
pub struct LpModel {
	variables: Vec<LpVariable>,
	index: HashMap<LpVariable, usize>,
	objective: BTreeMap<usize, f64>,
	constraints: Vec<Constraint>,
}

impl LpModel {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds `variable` unless already present and returns its index.
	pub fn add_variable(&mut self, variable: LpVariable) -> usize {
		if let Some(index) = self.index.get(&variable) {
			return *index;
		}
		let index = self.variables.len();
		self.index.insert(variable.clone(), index);
		self.variables.push(variable);
		index
	}

	pub fn index_of(&self, variable: &LpVariable) -> Option<usize> {
		self.index.get(variable).copied()
	}

	pub fn variable(&self, index: usize) -> Option<&LpVariable> {
		self.variables.get(index)
	}

	pub fn variables(&self) -> &[LpVariable] {
		&self.variables
	}

	/// Adds `coefficient` to the objective weight of `index`.
	pub fn add_objective_term(&mut self, index: usize, coefficient: f64) {
		*self.objective.entry(index).or_insert(0.0) += coefficient;
	}

	pub fn objective(&self) -> &BTreeMap<usize, f64> {
		&self.objective
	}

	pub fn add_constraint(&mut self, terms: Vec<(usize, f64)>, relation: Relation, rhs: f64) {
		self.constraints.push(Constraint {
			terms,
			relation,
			rhs,
		});
	}

	pub fn constraints(&self) -> &[Constraint] {
		&self.constraints
	}

	pub fn num_variables(&self) -> usize {
		self.variables.len()
	}

	pub fn is_empty(&self) -> bool {
		self.variables.is_empty()
	}

	/// Objective value at `values` (indexed like the variables).
	pub fn evaluate(&self, values: &[f64]) -> f64 {
		self.objective
			.iter()
			.map(|(i, c)| c * values.get(*i).copied().unwrap_or(0.0))
			.sum()
	}
}

/// Optimal value of one variable, as reported by a solver.
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
	pub name: String,
	pub value: f64,
}

impl Activation {
	pub fn new(name: impl Into<String>, value: f64) -> Self {
		Self {
			name: name.into(),
			value,
		}
	}

	/// The edge this activation flows through.
	pub fn variable(&self) -> Result<LpVariable, SolverError> {
		LpVariable::parse(&self.name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_variable_name() {
		let var = LpVariable::new("WETH", SlippageBps(150), "USDC");
		assert_eq!(var.name(), "WETH_150_USDC");
		assert_eq!(LpVariable::parse("WETH_150_USDC").unwrap(), var);
	}

	#[test]
	fn test_parse_underscored_assets() {
		let var = LpVariable::parse("st_ETH_50_USDC_e").unwrap();
		assert_eq!(var.asset_in, "st_ETH");
		assert_eq!(var.bucket, SlippageBps(50));
		assert_eq!(var.asset_out, "USDC_e");
	}

	#[test]
	fn test_parse_rejects_garbage() {
		assert!(matches!(LpVariable::parse("z"), Err(SolverError::Parse(_))));
		assert!(LpVariable::parse("WETH_USDC").is_err());
		assert!(LpVariable::parse("_50_USDC").is_err());
		assert!(LpVariable::parse("WETH_50_").is_err());
		assert!(Activation::new("c1", 1.0).variable().is_err());
	}

	#[test]
	fn test_variables_are_deduplicated() {
		let mut model = LpModel::new();
		let a = model.add_variable(LpVariable::new("A", SlippageBps(50), "B"));
		let b = model.add_variable(LpVariable::new("B", SlippageBps(50), "C"));
		let again = model.add_variable(LpVariable::new("A", SlippageBps(50), "B"));
		assert_eq!((a, b, again), (0, 1, 0));
		assert_eq!(model.num_variables(), 2);

		model.add_objective_term(a, 1.0);
		model.add_objective_term(a, -0.25);
		model.add_objective_term(b, 2.0);
		assert_eq!(model.evaluate(&[4.0, 1.0]), 5.0);
	}
}
