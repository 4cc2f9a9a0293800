//! In-process primal simplex.
//!
//! Single-variable `<=` rows with a positive coefficient become upper
//! bounds and are handled by bound flipping, so the tableau only carries
//! the coupling rows. The slack basis must be feasible, i.e. every
//! remaining row must have a non-negative right-hand side once `>=` rows
//! are negated. Route models always satisfy this: the origin, with no
//! flow at all, is a feasible point.

use async_trait::async_trait;
use risk_types::{ConfigSchema, Field, FieldType, Schema};
use tracing::trace;

use crate::model::{Activation, LpModel, Relation};
use crate::{LpSolverInterface, SolverError};

const EPSILON: f64 = 1e-9;

/// Dense bounded-variable simplex using Bland's rule.
pub struct SimplexSolver {
	max_iterations: usize,
}

impl SimplexSolver {
	pub fn new(max_iterations: usize) -> Self {
		Self { max_iterations }
	}

	/// Optimal variable values, indexed like the model's variables.
	pub fn optimize(&self, model: &LpModel) -> Result<Vec<f64>, SolverError> {
		let mut tableau = Tableau::from_model(model)?;
		for iteration in 0..self.max_iterations {
			if !tableau.step()? {
				trace!(iteration, rows = tableau.rows.len(), "simplex optimal");
				return Ok(tableau.solution(model.num_variables()));
			}
		}
		Err(SolverError::IterationLimit(self.max_iterations))
	}
}

impl Default for SimplexSolver {
	fn default() -> Self {
		Self::new(10_000)
	}
}

struct Tableau {
	rows: Vec<Vec<f64>>,
	/// Column basic in each row.
	basis: Vec<usize>,
	/// Row of each basic column.
	row_of: Vec<Option<usize>>,
	/// Current value of each row's basic column.
	values: Vec<f64>,
	/// Non-basic columns sitting at their upper bound.
	at_upper: Vec<bool>,
	costs: Vec<f64>,
	upper: Vec<f64>,
}

impl Tableau {
	fn from_model(model: &LpModel) -> Result<Self, SolverError> {
		let n = model.num_variables();
		let mut upper = vec![f64::INFINITY; n];
		let mut coupling: Vec<(Vec<(usize, f64)>, f64)> = Vec::new();

		for (row, constraint) in model.constraints().iter().enumerate() {
			if !constraint.rhs.is_finite() {
				return Err(SolverError::InvalidModel(format!("row {} has no finite rhs", row)));
			}
			for (index, coefficient) in &constraint.terms {
				if *index >= n || !coefficient.is_finite() {
					return Err(SolverError::InvalidModel(format!("row {} has a bad term", row)));
				}
			}

			if let (Relation::Le, [(index, coefficient)]) =
				(constraint.relation, constraint.terms.as_slice())
			{
				if *coefficient > 0.0 {
					let bound = constraint.rhs / coefficient;
					if bound < -EPSILON {
						return Err(SolverError::Infeasible);
					}
					upper[*index] = upper[*index].min(bound.max(0.0));
					continue;
				}
			}

			let sign = match constraint.relation {
				Relation::Le => 1.0,
				Relation::Ge => -1.0,
			};
			let rhs = sign * constraint.rhs;
			if rhs < -EPSILON {
				return Err(SolverError::InvalidModel(format!(
					"row {} excludes the origin; no feasible starting basis",
					row
				)));
			}
			let terms = constraint
				.terms
				.iter()
				.map(|(i, c)| (*i, sign * c))
				.collect();
			coupling.push((terms, rhs.max(0.0)));
		}

		let m = coupling.len();
		let columns = n + m;
		let mut rows = Vec::with_capacity(m);
		let mut values = Vec::with_capacity(m);
		for (r, (terms, rhs)) in coupling.into_iter().enumerate() {
			let mut row = vec![0.0; columns];
			for (index, coefficient) in terms {
				row[index] += coefficient;
			}
			row[n + r] = 1.0;
			rows.push(row);
			values.push(rhs);
		}

		let mut costs = vec![0.0; columns];
		for (index, coefficient) in model.objective() {
			if *index >= n || !coefficient.is_finite() {
				return Err(SolverError::InvalidModel(format!(
					"objective has a bad term for {}",
					index
				)));
			}
			costs[*index] = *coefficient;
		}
		upper.extend(std::iter::repeat(f64::INFINITY).take(m));

		let mut row_of = vec![None; columns];
		for r in 0..m {
			row_of[n + r] = Some(r);
		}

		Ok(Self {
			rows,
			basis: (n..columns).collect(),
			row_of,
			values,
			at_upper: vec![false; columns],
			costs,
			upper,
		})
	}

	fn reduced_cost(&self, column: usize) -> f64 {
		self.costs[column]
			- self
				.rows
				.iter()
				.zip(&self.basis)
				.map(|(row, basic)| self.costs[*basic] * row[column])
				.sum::<f64>()
	}

	/// Performs one pivot or bound flip. Returns `false` at optimality.
	fn step(&mut self) -> Result<bool, SolverError> {
		let entering = (0..self.costs.len())
			.filter(|j| self.row_of[*j].is_none())
			.find(|j| {
				let d = self.reduced_cost(*j);
				if self.at_upper[*j] {
					d < -EPSILON
				} else {
					d > EPSILON
				}
			});
		let Some(j) = entering else {
			return Ok(false);
		};
		let direction = if self.at_upper[j] { -1.0 } else { 1.0 };

		// ratio test, ties to the lowest basic column
		let mut leaving: Option<(usize, f64, bool)> = None;
		for (i, row) in self.rows.iter().enumerate() {
			let rate = direction * row[j];
			let basic = self.basis[i];
			let (ratio, to_upper) = if rate > EPSILON {
				(self.values[i] / rate, false)
			} else if rate < -EPSILON && self.upper[basic].is_finite() {
				((self.upper[basic] - self.values[i]) / -rate, true)
			} else {
				continue;
			};
			let ratio = ratio.max(0.0);
			let better = match leaving {
				None => true,
				Some((r, best, _)) => {
					ratio < best - EPSILON || (ratio <= best + EPSILON && basic < self.basis[r])
				}
			};
			if better {
				leaving = Some((i, ratio, to_upper));
			}
		}

		match leaving {
			Some((r, ratio, to_upper)) if ratio < self.upper[j] => {
				let start = if self.at_upper[j] { self.upper[j] } else { 0.0 };
				self.shift(j, direction * ratio);
				let left = self.basis[r];
				self.row_of[left] = None;
				self.at_upper[left] = to_upper;
				self.at_upper[j] = false;
				self.basis[r] = j;
				self.row_of[j] = Some(r);
				self.values[r] = start + direction * ratio;
				self.pivot(r, j);
			}
			_ if self.upper[j].is_finite() => {
				self.shift(j, direction * self.upper[j]);
				self.at_upper[j] = !self.at_upper[j];
			}
			_ => return Err(SolverError::Unbounded),
		}
		Ok(true)
	}

	/// Moves non-basic column `j` by `delta`, updating the basic values.
	fn shift(&mut self, j: usize, delta: f64) {
		for (value, row) in self.values.iter_mut().zip(&self.rows) {
			*value -= delta * row[j];
		}
	}

	fn pivot(&mut self, r: usize, j: usize) {
		let element = self.rows[r][j];
		for value in self.rows[r].iter_mut() {
			*value /= element;
		}
		let pivot_row = self.rows[r].clone();
		for (i, row) in self.rows.iter_mut().enumerate() {
			if i == r {
				continue;
			}
			let factor = row[j];
			if factor == 0.0 {
				continue;
			}
			for (value, p) in row.iter_mut().zip(&pivot_row) {
				*value -= factor * p;
			}
		}
	}

	fn solution(&self, n: usize) -> Vec<f64> {
		(0..n)
			.map(|j| {
				let value = match self.row_of[j] {
					Some(r) => self.values[r],
					None if self.at_upper[j] => self.upper[j],
					None => 0.0,
				};
				value.clamp(0.0, self.upper[j])
			})
			.collect()
	}
}

/// Configuration schema for SimplexSolver.
pub struct SimplexSolverSchema;

impl ConfigSchema for SimplexSolverSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), risk_types::ValidationError> {
		let schema = Schema::new(
			// Required fields
			vec![],
			// Optional fields
			vec![Field::new(
				"max_iterations",
				FieldType::Integer {
					min: Some(1),
					max: None,
				},
			)],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl LpSolverInterface for SimplexSolver {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(SimplexSolverSchema)
	}

	async fn solve(&self, model: &LpModel) -> Result<Vec<Activation>, SolverError> {
		let values = self.optimize(model)?;
		Ok(model
			.variables()
			.iter()
			.zip(values)
			.filter(|(_, value)| *value > EPSILON)
			.map(|(variable, value)| Activation::new(variable.name(), value))
			.collect())
	}
}

/// Factory function to create the in-process solver from configuration.
///
/// Configuration parameters:
/// - `max_iterations`: pivot budget per model (default: 10000)
pub fn create_solver(config: &toml::Value) -> Box<dyn LpSolverInterface> {
	let max_iterations = config
		.get("max_iterations")
		.and_then(|v| v.as_integer())
		.unwrap_or(10_000)
		.max(1) as usize;

	Box::new(SimplexSolver::new(max_iterations))
}
