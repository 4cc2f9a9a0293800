//! Configuration loading from files and environment.

use crate::types::*;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "RISK_";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
	/// Load configuration from file
	///
	/// `${VAR}` references are replaced by the variable's value before parsing.
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
		let path = path.as_ref();
		info!("Loading configuration from {:?}", path);

		let raw = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {:?}", path))?;
		let contents = substitute_env_vars(&raw)?;

		let config = match path.extension().and_then(|s| s.to_str()) {
			Some("toml") => Self::from_toml(&contents)?,
			Some("json") => Self::from_json(&contents)?,
			Some("yaml") | Some("yml") => Self::from_yaml(&contents)?,
			_ => anyhow::bail!("Unsupported config format: {:?}", path),
		};

		Self::validate_config(&config)?;
		Ok(config)
	}

	/// Load from TOML string
	pub fn from_toml(contents: &str) -> Result<EngineConfig> {
		toml::from_str(contents).map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))
	}

	/// Load from JSON string
	pub fn from_json(contents: &str) -> Result<EngineConfig> {
		serde_json::from_str(contents).context("Failed to parse JSON")
	}

	/// Load from YAML string
	pub fn from_yaml(contents: &str) -> Result<EngineConfig> {
		serde_yaml::from_str(contents).context("Failed to parse YAML")
	}

	/// Load from environment variables with optional file override
	pub fn from_env_and_file(file_path: Option<&Path>) -> Result<EngineConfig> {
		let mut config = if let Some(path) = file_path {
			Self::from_file(path)?
		} else {
			EngineConfig::default()
		};

		Self::apply_env_overrides(&mut config)?;

		Self::validate_config(&config)?;
		Ok(config)
	}

	/// Apply environment variable overrides
	fn apply_env_overrides(config: &mut EngineConfig) -> Result<()> {
		if let Ok(path) = std::env::var(format!("{}DATASET", ENV_PREFIX)) {
			debug!("Overriding source dataset path from environment");
			if let Some(table) = config.source.config.as_table_mut() {
				table.insert("path".to_string(), toml::Value::String(path));
			}
		}

		if let Ok(pivots) = std::env::var(format!("{}PIVOTS", ENV_PREFIX)) {
			debug!("Overriding default pivots from environment");
			config.routing.default_pivots = pivots
				.split(',')
				.map(str::trim)
				.filter(|s| !s.is_empty())
				.map(String::from)
				.collect();
		}

		if let Ok(step_block) = std::env::var(format!("{}STEP_BLOCK", ENV_PREFIX)) {
			debug!("Overriding step block from environment");
			config.engine.step_block = step_block
				.parse()
				.with_context(|| format!("Invalid {}STEP_BLOCK: {}", ENV_PREFIX, step_block))?;
		}

		Ok(())
	}

	/// Validate configuration
	pub fn validate_config(config: &EngineConfig) -> Result<()> {
		let engine = &config.engine;
		if engine.step_bps == 0 {
			anyhow::bail!("step_bps must be positive");
		}
		if engine.max_slippage_bps % engine.step_bps != 0 {
			anyhow::bail!(
				"max_slippage_bps ({}) must be a multiple of step_bps ({})",
				engine.max_slippage_bps,
				engine.step_bps
			);
		}
		if engine.max_slippage_bps == 0 || engine.max_slippage_bps >= 10_000 {
			anyhow::bail!("max_slippage_bps must be in (0, 10000)");
		}
		if engine.step_block == 0 {
			anyhow::bail!("step_block must be positive");
		}
		if !(1..=100).contains(&engine.scan_max_percent) {
			anyhow::bail!("scan_max_percent must be between 1 and 100");
		}

		if config.platforms.is_empty() {
			anyhow::bail!("At least one platform must be configured");
		}
		let mut seen = BTreeSet::new();
		for platform in &config.platforms {
			if platform == risk_types::ALL_PLATFORMS {
				anyhow::bail!("'{}' is reserved and cannot be a platform", platform);
			}
			if !seen.insert(platform) {
				anyhow::bail!("Platform '{}' configured twice", platform);
			}
		}

		let lambda = config.volatility.lambda;
		if !(lambda > 0.0 && lambda < 1.0) {
			anyhow::bail!("volatility.lambda must be in (0, 1), got {}", lambda);
		}
		if config.volatility.median_window_blocks == 0 {
			anyhow::bail!("volatility.median_window_blocks must be positive");
		}

		if config.source.implementation.is_empty() || config.solver.implementation.is_empty() {
			anyhow::bail!("source and solver implementations must be named");
		}

		config.routing.validate_aliases()?;

		// without an asset table, symbols are checked at query time
		if !config.assets.is_empty() {
			let known: BTreeSet<String> = config.assets.keys().cloned().collect();
			config.routing.validate_assets(&known)?;
			if !known.contains(&engine.usd_quote) {
				anyhow::bail!("usd_quote asset '{}' is not configured", engine.usd_quote);
			}
		}

		Ok(())
	}
}

/// Replaces `${VAR_NAME}` patterns with environment values.
fn substitute_env_vars(content: &str) -> Result<String> {
	let mut result = String::with_capacity(content.len());
	let mut rest = content;

	while let Some(start) = rest.find("${") {
		result.push_str(&rest[..start]);
		let after = &rest[start + 2..];
		let end = after
			.find('}')
			.with_context(|| format!("Unterminated variable reference near '{}'", &rest[start..]))?;
		let var_name = &after[..end];
		let value = std::env::var(var_name)
			.with_context(|| format!("Environment variable not found: {}", var_name))?;
		result.push_str(&value);
		rest = &after[end + 1..];
	}
	result.push_str(rest);

	Ok(result)
}

/// Load configuration from standard locations
pub fn load_config() -> Result<EngineConfig> {
	// Check for config file in order:
	// 1. Environment variable RISK_CONFIG
	// 2. ./config/engine.toml
	// 3. ./engine.toml
	// 4. Default config with env overrides

	if let Ok(path) = std::env::var(format!("{}CONFIG", ENV_PREFIX)) {
		return ConfigLoader::from_env_and_file(Some(Path::new(&path)));
	}

	let paths = ["./config/engine.toml", "./engine.toml"];

	for path in &paths {
		if Path::new(path).exists() {
			return ConfigLoader::from_env_and_file(Some(Path::new(path)));
		}
	}

	ConfigLoader::from_env_and_file(None)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::routing::PairPattern;
	use std::io::Write;

	const FULL_TOML: &str = r#"
platforms = ["univ3", "curve"]

[engine]
name = "test-engine"
step_bps = 50
max_slippage_bps = 2000
step_block = 100

[assets]
USDC = { decimals = 6 }
USDT = { decimals = 6 }
WETH = { decimals = 18 }
WBTC = { decimals = 8 }
DAI = { decimals = 18 }

[routing]
default_pivots = ["USDC", "WETH"]

[routing.overrides]
"WBTC/*" = ["WETH", "USDC", "USDT"]

[source]
implementation = "file"
config = { path = "data/dataset.json" }

[solver]
implementation = "glpsol"
config = { binary = "/usr/bin/glpsol", timeout_secs = 30 }

[volatility]
lambda = 0.99
"#;

	#[test]
	fn test_toml_parsing() {
		let config = ConfigLoader::from_toml(FULL_TOML).unwrap();
		assert_eq!(config.engine.name, "test-engine");
		assert_eq!(config.engine.step_block, 100);
		assert_eq!(config.platforms, vec!["univ3", "curve"]);
		assert_eq!(config.assets.get("WBTC").unwrap().decimals, 8);
		assert_eq!(
			config
				.routing
				.overrides
				.get(&PairPattern::From("WBTC".into()))
				.unwrap()
				.len(),
			3
		);
		assert_eq!(config.solver.implementation, "glpsol");
		assert_eq!(
			config.solver.config.get("timeout_secs").unwrap().as_integer(),
			Some(30)
		);
		// untouched defaults
		assert_eq!(config.volatility.median_window_blocks, 50);
		assert_eq!(config.volatility.lambda, 0.99);
		assert!(ConfigLoader::validate_config(&config).is_ok());
	}

	#[test]
	fn test_json_parsing() {
		let json = r#"{
            "platforms": ["univ3"],
            "engine": { "step_bps": 100, "max_slippage_bps": 1000 },
            "source": { "implementation": "memory" },
            "solver": { "implementation": "simplex" }
        }"#;

		let config = ConfigLoader::from_json(json).unwrap();
		assert_eq!(config.engine.step_bps, 100);
		assert_eq!(config.routing.default_pivots.len(), 5);
		assert!(ConfigLoader::validate_config(&config).is_ok());
	}

	#[test]
	fn test_yaml_parsing() {
		let yaml = r#"
platforms: [univ3]
engine:
  name: yaml-engine
source:
  implementation: memory
solver:
  implementation: simplex
routing:
  default_pivots: [WETH]
  overrides:
    "*/USDY": [USDC]
"#;

		let config = ConfigLoader::from_yaml(yaml).unwrap();
		assert_eq!(config.engine.name, "yaml-engine");
		assert_eq!(config.routing.pivots_for("WETH", "USDY"), vec!["USDC"]);
	}

	#[test]
	fn test_validation_step_grid() {
		let mut config = EngineConfig::default();
		config.engine.step_bps = 30;

		let result = ConfigLoader::validate_config(&config);
		assert!(result
			.unwrap_err()
			.to_string()
			.contains("must be a multiple of step_bps"));
	}

	#[test]
	fn test_validation_reserved_platform() {
		let mut config = EngineConfig::default();
		config.platforms.push("all".to_string());
		assert!(ConfigLoader::validate_config(&config).is_err());
	}

	#[test]
	fn test_validation_unknown_pivot_asset() {
		let mut config = ConfigLoader::from_toml(FULL_TOML).unwrap();
		config.routing.default_pivots.push("mETH".to_string());

		let err = ConfigLoader::validate_config(&config).unwrap_err();
		assert!(err.to_string().contains("unknown asset mETH"));
	}

	#[test]
	fn test_validation_override_on_alias() {
		let mut config = ConfigLoader::from_toml(FULL_TOML).unwrap();
		config.routing.aliases.insert("WBTC".to_string(), "WETH".to_string());

		let err = ConfigLoader::validate_config(&config).unwrap_err();
		assert!(err.to_string().contains("names alias WBTC"));
	}

	#[test]
	fn test_bundled_config_is_valid() {
		let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/engine.toml");
		let config = ConfigLoader::from_file(&path).unwrap();
		assert_eq!(
			config.routing.pivots_for("stETH", "DAI"),
			vec!["WBTC", "USDC", "USDT", "WETH"]
		);
		let (from, to) = config.routing.resolve_pair("stETH", "DAI");
		assert_eq!(config.routing.pivots_for(&from, &to), vec!["USDC"]);
	}

	#[test]
	fn test_validation_lambda() {
		let mut config = EngineConfig::default();
		config.volatility.lambda = 1.0;
		assert!(ConfigLoader::validate_config(&config).is_err());
	}

	#[test]
	fn test_from_file_with_env_substitution() {
		std::env::set_var("RISK_TEST_DATASET_PATH", "/tmp/risk-dataset.json");
		let toml = r#"
platforms = ["univ3"]

[engine]

[source]
implementation = "file"
config = { path = "${RISK_TEST_DATASET_PATH}" }

[solver]
implementation = "simplex"
"#;
		let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
		file.write_all(toml.as_bytes()).unwrap();

		let config = ConfigLoader::from_file(file.path()).unwrap();
		assert_eq!(
			config.source.config.get("path").unwrap().as_str(),
			Some("/tmp/risk-dataset.json")
		);
	}

	#[test]
	fn test_missing_env_var() {
		let err = substitute_env_vars("path = \"${RISK_TEST_SURELY_UNSET_VAR}\"").unwrap_err();
		assert!(err.to_string().contains("RISK_TEST_SURELY_UNSET_VAR"));
	}

	#[test]
	fn test_unsupported_extension() {
		let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
		let err = ConfigLoader::from_file(file.path()).unwrap_err();
		assert!(err.to_string().contains("Unsupported config format"));
	}
}
