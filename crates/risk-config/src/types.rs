//! Configuration types for the risk engine.

use crate::routing::RoutingConfig;
use risk_types::{DEFAULT_STEP_BPS, MAX_SLIPPAGE_BPS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
	/// Engine-wide numeric settings
	pub engine: EngineSettings,
	/// Venues known to the engine; "all" unions them
	pub platforms: Vec<String>,
	/// Known assets keyed by symbol
	#[serde(default)]
	pub assets: BTreeMap<String, AssetConfig>,
	/// Pivot selection
	#[serde(default)]
	pub routing: RoutingConfig,
	/// Price/pool-state provider
	pub source: ImplementationConfig,
	/// LP solver backend
	pub solver: ImplementationConfig,
	/// Volatility estimator settings
	#[serde(default)]
	pub volatility: VolatilitySettings,
}

/// Engine-wide numeric settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
	/// Engine name for logging
	#[serde(default = "default_name")]
	pub name: String,
	/// Distance between slippage buckets, in bps
	#[serde(default = "default_step_bps")]
	pub step_bps: u32,
	/// Largest slippage bucket, in bps
	#[serde(default = "default_max_slippage_bps")]
	pub max_slippage_bps: u32,
	/// Block stride of snapshot series
	#[serde(default = "default_step_block")]
	pub step_block: u64,
	/// Largest price impact recorded by the tick scanner, in percent
	#[serde(default = "default_scan_max_percent")]
	pub scan_max_percent: u32,
	/// Asset used as the USD unit of account
	#[serde(default = "default_usd_quote")]
	pub usd_quote: String,
}

/// Per-asset settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetConfig {
	pub decimals: u8,
}

/// A pluggable implementation selected by name, with its own settings table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImplementationConfig {
	/// Name of the implementation factory
	pub implementation: String,
	/// Implementation-specific table, validated by the implementation's schema
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

/// Volatility estimator settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VolatilitySettings {
	/// Blocks reduced to one median price
	#[serde(default = "default_median_window")]
	pub median_window_blocks: u64,
	/// Default decay factor
	#[serde(default = "default_lambda")]
	pub lambda: f64,
	/// Days averaged by the Parkinson estimator
	#[serde(default = "default_parkinson_days")]
	pub parkinson_days: u32,
}

impl Default for VolatilitySettings {
	fn default() -> Self {
		Self {
			median_window_blocks: default_median_window(),
			lambda: default_lambda(),
			parkinson_days: default_parkinson_days(),
		}
	}
}

impl Default for EngineSettings {
	fn default() -> Self {
		Self {
			name: default_name(),
			step_bps: default_step_bps(),
			max_slippage_bps: default_max_slippage_bps(),
			step_block: default_step_block(),
			scan_max_percent: default_scan_max_percent(),
			usd_quote: default_usd_quote(),
		}
	}
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			engine: EngineSettings::default(),
			platforms: vec!["univ3".to_string()],
			assets: BTreeMap::new(),
			routing: RoutingConfig::default(),
			source: ImplementationConfig {
				implementation: "memory".to_string(),
				config: empty_table(),
			},
			solver: ImplementationConfig {
				implementation: "simplex".to_string(),
				config: empty_table(),
			},
			volatility: VolatilitySettings::default(),
		}
	}
}

fn default_name() -> String {
	"risk-engine".to_string()
}

fn default_step_bps() -> u32 {
	DEFAULT_STEP_BPS
}

fn default_max_slippage_bps() -> u32 {
	MAX_SLIPPAGE_BPS
}

fn default_step_block() -> u64 {
	50
}

fn default_scan_max_percent() -> u32 {
	20
}

fn default_usd_quote() -> String {
	"USDC".to_string()
}

fn default_median_window() -> u64 {
	50
}

// one-year half-life at one point per day
fn default_lambda() -> f64 {
	0.9981
}

fn default_parkinson_days() -> u32 {
	30
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::map::Map::new())
}
