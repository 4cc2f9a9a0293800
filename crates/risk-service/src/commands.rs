//! Engine assembly and command execution.

use anyhow::{Context, Result};
use chrono::DateTime;
use risk_config::{EngineConfig, RoutingConfig};
use risk_core::{RiskEngine, RiskEngineBuilder};
use risk_liquidity::implementations::{file, memory};
use risk_solver::implementations::{glpsol, simplex};
use risk_types::{BlockNumber, SlippageBps};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::info;

use crate::cli::{Command, PairArgs};

/// Builds the engine with every bundled implementation registered.
pub fn build_engine(config: EngineConfig) -> Result<RiskEngine> {
	RiskEngineBuilder::new(config)
		.with_source_factory("memory", memory::create_source)
		.with_source_factory("file", file::create_source)
		.with_solver_factory("simplex", simplex::create_solver)
		.with_solver_factory("glpsol", glpsol::create_solver)
		.build()
		.context("Failed to build risk engine")
}

/// A query answer; `result` is null when the engine has no data.
#[derive(Debug, Serialize)]
struct Report<'a, T: Serialize> {
	platform: &'a str,
	from: &'a str,
	to: &'a str,
	result: Option<T>,
}

impl<'a, T: Serialize> Report<'a, T> {
	fn new(pair: &'a PairArgs, result: Option<T>) -> Self {
		Self {
			platform: &pair.platform,
			from: &pair.from,
			to: &pair.to,
			result,
		}
	}

	fn into_json(self) -> Result<Value> {
		serde_json::to_value(self).context("Failed to serialize result")
	}
}

#[derive(Debug, Serialize)]
struct VolatilityResult {
	/// Wall-clock time of the last day's final block, when known
	as_of: Option<String>,
	#[serde(flatten)]
	series: risk_types::VolatilitySeries,
}

#[derive(Serialize)]
struct RoutingFile<'a> {
	routing: &'a RoutingConfig,
}

/// Runs a query command and returns its JSON answer.
pub async fn execute(engine: &RiskEngine, command: &Command) -> Result<Value> {
	match command {
		Command::Curve {
			pair,
			from_block,
			to_block,
			no_jumps,
			step_block,
		} => {
			let series = engine
				.aggregated_slippage_curve(
					&pair.platform,
					&pair.from,
					&pair.to,
					*from_block,
					*to_block,
					!no_jumps,
					*step_block,
				)
				.await?;
			Report::new(pair, series).into_json()
		}
		Command::Liquidity { pair, block } => {
			let liquidity = engine
				.optimized_liquidity_at_block(&pair.platform, &pair.from, &pair.to, *block)
				.await?;
			Report::new(pair, liquidity).into_json()
		}
		Command::AverageLiquidity {
			pair,
			from_block,
			to_block,
		} => {
			let liquidity = engine
				.average_optimized_liquidity(
					&pair.platform,
					&pair.from,
					&pair.to,
					*from_block,
					*to_block,
				)
				.await?;
			Report::new(pair, liquidity).into_json()
		}
		Command::Volatility { pair, lambda } => {
			let series = engine
				.rolling_volatility(&pair.platform, &pair.from, &pair.to, *lambda)
				.await?;
			let result = match series {
				Some(series) => Some(VolatilityResult {
					as_of: block_time(engine, series.latest.block_end).await?,
					series,
				}),
				None => None,
			};
			Report::new(pair, result).into_json()
		}
		Command::Parkinson { pair, days } => {
			let sigma = engine
				.parkinson_volatility(&pair.platform, &pair.from, &pair.to, *days)
				.await?;
			Report::new(pair, sigma).into_json()
		}
		Command::TunePivots {
			pair,
			block,
			candidates,
			reference_bps,
			output,
		} => {
			let candidates = if candidates.is_empty() {
				let (from, to) = engine.config().routing.resolve_pair(&pair.from, &pair.to);
				engine.config().routing.pivots_for(&from, &to)
			} else {
				candidates.clone()
			};
			let tuning = engine
				.tune_pivots(
					&pair.platform,
					&pair.from,
					&pair.to,
					*block,
					&candidates,
					Some(SlippageBps(*reference_bps)),
				)
				.await?;
			if let Some(path) = output {
				let routing = tuning.apply(&engine.config().routing);
				write_routing(path, &routing)?;
				info!("Routing written to {:?}", path);
			}
			Report::new(pair, Some(tuning)).into_json()
		}
		Command::Validate => anyhow::bail!("validate does not query the engine"),
	}
}

async fn block_time(engine: &RiskEngine, block: BlockNumber) -> Result<Option<String>> {
	let timestamp = engine.liquidity().source().block_timestamp(block).await?;
	Ok(timestamp
		.and_then(|ts| DateTime::from_timestamp(ts, 0))
		.map(|time| time.to_rfc3339()))
}

/// Writes a `[routing]` section that can be pasted into the engine config.
pub fn write_routing(path: &Path, routing: &RoutingConfig) -> Result<()> {
	let content = toml::to_string_pretty(&RoutingFile { routing })
		.context("Failed to serialize routing")?;
	std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
}

#[cfg(test)]
mod tests {
	use super::*;
	use risk_config::{ConfigLoader, PairPattern};
	use std::io::Write;
	use tempfile::NamedTempFile;

	const DATASET: &str = r#"{
		"block_timestamps": { "0": 1700000000, "1000": 1700012000 },
		"pools": [
			{
				"platform": "univ3",
				"pool_id": "0xab",
				"from": "A",
				"to": "B",
				"snapshots": [
					{
						"block_number": 100,
						"price": 1.0,
						"slippage_map": {
							"50": { "base": 100.0, "quote": 100.0 },
							"100": { "base": 180.0, "quote": 178.0 }
						}
					}
				]
			}
		],
		"prices": [
			{ "platform": "univ3", "from": "A", "to": "USDC", "points": [{ "block": 1, "price": 1.0 }] }
		]
	}"#;

	fn engine_with_dataset() -> (RiskEngine, NamedTempFile) {
		let mut dataset = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
		dataset.write_all(DATASET.as_bytes()).unwrap();

		let config = ConfigLoader::from_toml(&format!(
			r#"
platforms = ["univ3"]

[engine]
step_block = 10

[routing]
default_pivots = []

[source]
implementation = "file"

[source.config]
path = "{}"

[solver]
implementation = "simplex"
"#,
			dataset.path().display()
		))
		.unwrap();
		(build_engine(config).unwrap(), dataset)
	}

	fn pair() -> PairArgs {
		PairArgs {
			platform: "all".to_string(),
			from: "A".to_string(),
			to: "B".to_string(),
		}
	}

	#[tokio::test]
	async fn test_curve_command() {
		let (engine, _dataset) = engine_with_dataset();
		let command = Command::Curve {
			pair: pair(),
			from_block: 100,
			to_block: 120,
			no_jumps: false,
			step_block: None,
		};
		let output = execute(&engine, &command).await.unwrap();
		assert_eq!(output["platform"], "all");
		let series = output["result"].as_object().unwrap();
		assert_eq!(series.len(), 3);
		assert_eq!(output["result"]["110"]["slippage_map"]["100"]["base"], 180.0);
	}

	#[tokio::test]
	async fn test_liquidity_command() {
		let (engine, _dataset) = engine_with_dataset();
		let command = Command::Liquidity {
			pair: pair(),
			block: 100,
		};
		let output = execute(&engine, &command).await.unwrap();
		assert_eq!(output["result"]["slippage_map"]["50"], 100.0);
		assert_eq!(output["result"]["slippage_map"]["100"], 180.0);

		let command = Command::Liquidity {
			pair: PairArgs {
				from: "B".to_string(),
				to: "A".to_string(),
				..pair()
			},
			block: 100,
		};
		let output = execute(&engine, &command).await.unwrap();
		assert!(output["result"].is_null());
	}

	#[tokio::test]
	async fn test_unknown_platform_is_an_error() {
		let (engine, _dataset) = engine_with_dataset();
		let command = Command::Parkinson {
			pair: PairArgs {
				platform: "sushi".to_string(),
				..pair()
			},
			days: None,
		};
		assert!(execute(&engine, &command).await.is_err());
	}

	#[test]
	fn test_write_routing_round_trip() {
		let routing = RoutingConfig::with_default_pivots(["WETH", "USDC"])
			.with_override(PairPattern::exact("WBTC", "DAI"), vec!["USDC".to_string()]);
		let file = NamedTempFile::new().unwrap();
		write_routing(file.path(), &routing).unwrap();

		#[derive(serde::Deserialize)]
		struct Wrapper {
			routing: RoutingConfig,
		}
		let content = std::fs::read_to_string(file.path()).unwrap();
		let parsed: Wrapper = toml::from_str(&content).unwrap();
		assert_eq!(parsed.routing, routing);
	}
}
