//! External GLPK solver.
//!
//! The model is rendered to GMPL, written to a temporary directory and
//! handed to `glpsol`. The raw solution file it writes lists columns in
//! declaration order, which is how activations are mapped back to names.

use async_trait::async_trait;
use risk_types::{ConfigSchema, Field, FieldType, Schema};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::gmpl;
use crate::model::{Activation, LpModel};
use crate::{LpSolverInterface, SolverError};

/// Solver delegating to the `glpsol` command line tool.
pub struct GlpsolSolver {
	binary: PathBuf,
	timeout: Duration,
}

impl GlpsolSolver {
	pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
		Self {
			binary: binary.into(),
			timeout,
		}
	}
}

/// Reads the raw (`--write`) solution of a model with `names` as columns.
///
/// Both the basic (`s bas`) and the MIP (`s mip`) layouts are accepted.
pub fn parse_solution(text: &str, names: &[String]) -> Result<Vec<Activation>, SolverError> {
	let mut activations = Vec::new();
	let mut status_seen = false;

	for line in text.lines() {
		let fields: Vec<&str> = line.split_whitespace().collect();
		match fields.first().copied() {
			Some("s") => {
				status_seen = true;
				// s bas <rows> <cols> <primal status> <dual status> <objective>
				// s mip <rows> <cols> <status> <objective>
				let status = match fields.get(1).copied() {
					Some("bas") | Some("mip") | Some("ipt") => fields.get(4).copied(),
					_ => None,
				};
				match status {
					Some("n") | Some("i") => return Err(SolverError::Infeasible),
					Some("u") => {
						return Err(SolverError::Parse("solution status undefined".to_string()))
					}
					Some(_) => {}
					None => return Err(SolverError::Parse(format!("bad status line: {}", line))),
				}
			}
			Some("j") => {
				let index: usize = fields
					.get(1)
					.and_then(|v| v.parse().ok())
					.ok_or_else(|| SolverError::Parse(format!("bad column line: {}", line)))?;
				// j <col> <status> <primal> <dual>  or  j <col> <value>
				let raw = if fields.len() >= 5 {
					fields.get(3)
				} else {
					fields.get(2)
				};
				let value: f64 = raw
					.and_then(|v| v.parse().ok())
					.ok_or_else(|| SolverError::Parse(format!("bad column line: {}", line)))?;
				let name = index
					.checked_sub(1)
					.and_then(|i| names.get(i))
					.ok_or_else(|| SolverError::Parse(format!("unknown column {}", index)))?;
				if value != 0.0 {
					activations.push(Activation::new(name.clone(), value));
				}
			}
			_ => {}
		}
	}

	if !status_seen {
		return Err(SolverError::Parse("no solution status".to_string()));
	}
	Ok(activations)
}

/// Configuration schema for GlpsolSolver.
pub struct GlpsolSolverSchema;

impl ConfigSchema for GlpsolSolverSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), risk_types::ValidationError> {
		let schema = Schema::new(
			// Required fields
			vec![],
			// Optional fields
			vec![
				Field::new("binary", FieldType::String),
				Field::new(
					"timeout_ms",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl LpSolverInterface for GlpsolSolver {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(GlpsolSolverSchema)
	}

	async fn solve(&self, model: &LpModel) -> Result<Vec<Activation>, SolverError> {
		if model.is_empty() {
			return Ok(Vec::new());
		}
		let program = gmpl::render(model)?;
		let names: Vec<String> = model.variables().iter().map(|v| v.name()).collect();

		let dir = tempfile::tempdir().map_err(|e| SolverError::Process(e.to_string()))?;
		let model_path = dir.path().join("model.mod");
		let solution_path = dir.path().join("solution.txt");
		tokio::fs::write(&model_path, program)
			.await
			.map_err(|e| SolverError::Process(format!("Failed to write model: {}", e)))?;

		let run = Command::new(&self.binary)
			.arg("--math")
			.arg(&model_path)
			.arg("--write")
			.arg(&solution_path)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.output();
		let output = tokio::time::timeout(self.timeout, run)
			.await
			.map_err(|_| SolverError::Process(format!("timed out after {:?}", self.timeout)))?
			.map_err(|e| SolverError::Process(format!("Failed to run {:?}: {}", self.binary, e)))?;

		if !output.status.success() {
			return Err(SolverError::Process(format!(
				"{:?} exited with {}: {}",
				self.binary,
				output.status,
				String::from_utf8_lossy(&output.stdout).trim()
			)));
		}

		let text = tokio::fs::read_to_string(&solution_path)
			.await
			.map_err(|e| SolverError::Process(format!("Failed to read solution: {}", e)))?;
		debug!(columns = names.len(), "glpsol finished");
		parse_solution(&text, &names)
	}
}

/// Factory function to create the external GLPK solver from configuration.
///
/// Configuration parameters:
/// - `binary`: path of the glpsol executable (default: "glpsol")
/// - `timeout_ms`: wall clock limit per model (default: 10000)
pub fn create_solver(config: &toml::Value) -> Box<dyn LpSolverInterface> {
	let binary = config
		.get("binary")
		.and_then(|v| v.as_str())
		.unwrap_or("glpsol")
		.to_string();
	let timeout_ms = config
		.get("timeout_ms")
		.and_then(|v| v.as_integer())
		.unwrap_or(10_000)
		.max(1) as u64;

	Box::new(GlpsolSolver::new(binary, Duration::from_millis(timeout_ms)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::LpVariable;
	use risk_types::SlippageBps;

	fn names() -> Vec<String> {
		vec!["A_50_P".to_string(), "P_50_B".to_string()]
	}

	#[test]
	fn test_parse_basic_solution() {
		let text = "\
c Problem:    model
c Rows:       3
c Columns:    2
c Status:     OPTIMAL
c
s bas 3 2 f f 0.402010050251256
i 1 b 80.4020100502513 0
i 2 u 0 1
i 3 l 0 0
j 1 b 80.4020100502513 0
j 2 u 80 0.005
e o f
";
		let activations = parse_solution(text, &names()).unwrap();
		assert_eq!(activations.len(), 2);
		assert_eq!(activations[0].name, "A_50_P");
		assert!((activations[0].value - 80.4020100502513).abs() < 1e-12);
		assert_eq!(activations[1], Activation::new("P_50_B", 80.0));
		assert_eq!(
			activations[1].variable().unwrap(),
			LpVariable::new("P", SlippageBps(50), "B")
		);
	}

	#[test]
	fn test_parse_skips_zero_columns() {
		let text = "s bas 1 2 f f 0\nj 1 l 0 0\nj 2 b 3.5 0\ne o f\n";
		let activations = parse_solution(text, &names()).unwrap();
		assert_eq!(activations, vec![Activation::new("P_50_B", 3.5)]);
	}

	#[test]
	fn test_parse_mip_layout() {
		let text = "s mip 1 2 o 4\nj 1 4\nj 2 0\ne o f\n";
		let activations = parse_solution(text, &names()).unwrap();
		assert_eq!(activations, vec![Activation::new("A_50_P", 4.0)]);
	}

	#[test]
	fn test_parse_failures() {
		assert!(matches!(
			parse_solution("s bas 1 2 n f 0\n", &names()),
			Err(SolverError::Infeasible)
		));
		assert!(matches!(
			parse_solution("j 1 b 1 0\n", &names()),
			Err(SolverError::Parse(_))
		));
		assert!(matches!(
			parse_solution("s bas 1 2 f f 0\nj 9 b 1 0\n", &names()),
			Err(SolverError::Parse(_))
		));
		assert!(matches!(
			parse_solution("s bas 1 2 f f 0\nj 1 b x 0\n", &names()),
			Err(SolverError::Parse(_))
		));
	}

	#[tokio::test]
	async fn test_missing_binary() {
		let solver = GlpsolSolver::new("/nonexistent/glpsol", Duration::from_secs(1));
		let mut model = LpModel::new();
		model.add_variable(LpVariable::new("A", SlippageBps(50), "B"));
		assert!(matches!(
			solver.solve(&model).await,
			Err(SolverError::Process(_))
		));
	}

	#[test]
	fn test_schema() {
		let config: toml::Value = toml::from_str(
			r#"
binary = "/usr/bin/glpsol"
timeout_ms = 500
"#,
		)
		.unwrap();
		assert!(GlpsolSolverSchema.validate(&config).is_ok());
		assert!(create_solver(&config).config_schema().validate(&config).is_ok());
	}
}
