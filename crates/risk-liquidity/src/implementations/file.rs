//! Dataset-backed provider.
//!
//! Reads a JSON dataset once, on first use, into a [`MemorySource`]. The
//! dataset may carry pre-built snapshots, raw tick state (scanned at load
//! time), explicit price points and block timestamps.

use async_trait::async_trait;
use risk_types::{
	BlockNumber, ConfigSchema, Field, FieldType, LiquiditySnapshot, PoolSeries, PricePoint, Schema,
	TickLiquidityState, Timestamp,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::memory::{MemorySource, ScanSettings, TickPool};
use crate::{LiquidityError, LiquiditySourceInterface};

/// On-disk dataset layout.
#[derive(Debug, Default, Deserialize)]
pub struct Dataset {
	#[serde(default)]
	pub block_timestamps: BTreeMap<BlockNumber, Timestamp>,
	#[serde(default)]
	pub pools: Vec<PoolRecord>,
	#[serde(default)]
	pub tick_pools: Vec<TickPoolRecord>,
	#[serde(default)]
	pub prices: Vec<PriceRecord>,
}

/// Pre-built snapshots of one pool in one direction.
#[derive(Debug, Deserialize)]
pub struct PoolRecord {
	pub platform: String,
	pub pool_id: String,
	pub from: String,
	pub to: String,
	pub snapshots: Vec<LiquiditySnapshot>,
}

/// Raw tick state of one concentrated-liquidity pool.
#[derive(Debug, Deserialize)]
pub struct TickPoolRecord {
	pub platform: String,
	pub pool_id: String,
	pub token0: String,
	pub token1: String,
	pub decimals0: u8,
	pub decimals1: u8,
	pub states: Vec<TickStateRecord>,
}

#[derive(Debug, Deserialize)]
pub struct TickStateRecord {
	pub block: BlockNumber,
	pub state: TickLiquidityState,
}

/// Explicit price observations of `from` in `to`.
#[derive(Debug, Deserialize)]
pub struct PriceRecord {
	pub platform: String,
	pub from: String,
	pub to: String,
	pub points: Vec<PricePoint>,
}

/// Provider reading a JSON dataset from disk.
pub struct FileSource {
	path: PathBuf,
	scan: ScanSettings,
	loaded: OnceCell<MemorySource>,
}

impl FileSource {
	pub fn new(path: PathBuf, scan: ScanSettings) -> Self {
		Self {
			path,
			scan,
			loaded: OnceCell::new(),
		}
	}

	async fn data(&self) -> Result<&MemorySource, LiquidityError> {
		self.loaded
			.get_or_try_init(|| load_dataset(self.path.clone(), self.scan))
			.await
	}
}

/// Reads and indexes the dataset at `path`.
///
/// A tick state whose values overflow the tick math is skipped with a
/// warning; every other problem fails the load.
pub async fn load_dataset(
	path: PathBuf,
	scan: ScanSettings,
) -> Result<MemorySource, LiquidityError> {
	let contents = fs::read_to_string(&path)
		.await
		.map_err(|e| LiquidityError::Source(format!("Failed to read {:?}: {}", path, e)))?;
	let dataset: Dataset = serde_json::from_str(&contents)
		.map_err(|e| LiquidityError::Source(format!("Invalid dataset {:?}: {}", path, e)))?;

	let source = MemorySource::new();
	for (block, timestamp) in &dataset.block_timestamps {
		source.set_block_timestamp(*block, *timestamp);
	}
	for record in dataset.pools {
		for snapshot in record.snapshots {
			source.insert_snapshot(
				&record.platform,
				&record.pool_id,
				&record.from,
				&record.to,
				snapshot,
			);
		}
	}
	for record in dataset.prices {
		for point in record.points {
			source.insert_price(&record.platform, &record.from, &record.to, point);
		}
	}

	let mut skipped = 0usize;
	for record in dataset.tick_pools {
		let pool = TickPool {
			platform: record.platform,
			pool_id: record.pool_id,
			token0: record.token0,
			token1: record.token1,
			decimals0: record.decimals0,
			decimals1: record.decimals1,
		};
		for entry in record.states {
			match source.insert_tick_state(&pool, entry.block, &entry.state, &scan) {
				Ok(()) => {}
				Err(LiquidityError::Overflow(what)) => {
					warn!(pool = %pool.pool_id, block = entry.block, "skipping tick state: overflow in {}", what);
					skipped += 1;
				}
				Err(e) => return Err(e),
			}
		}
	}

	info!(
		"Loaded dataset {:?} ({} timestamps, {} tick states skipped)",
		path,
		dataset.block_timestamps.len(),
		skipped
	);
	Ok(source)
}

/// Configuration schema for FileSource.
pub struct FileSourceSchema;

impl ConfigSchema for FileSourceSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), risk_types::ValidationError> {
		let schema = Schema::new(
			// Required fields
			vec![Field::new("path", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(path) if path.ends_with(".json") => Ok(()),
					_ => Err("dataset must be a .json file".to_string()),
				}
			})],
			// Optional fields
			vec![Field::new(
				"scan_max_percent",
				FieldType::Integer {
					min: Some(1),
					max: Some(100),
				},
			)],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl LiquiditySourceInterface for FileSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileSourceSchema)
	}

	async fn pool_series(
		&self,
		platform: &str,
		from: &str,
		to: &str,
	) -> Result<Vec<PoolSeries>, LiquidityError> {
		self.data().await?.pool_series(platform, from, to).await
	}

	async fn price_history(
		&self,
		platform: &str,
		from: &str,
		to: &str,
		from_block: BlockNumber,
		to_block: BlockNumber,
	) -> Result<Vec<PricePoint>, LiquidityError> {
		self.data()
			.await?
			.price_history(platform, from, to, from_block, to_block)
			.await
	}

	async fn price_at_block(
		&self,
		platform: &str,
		from: &str,
		to: &str,
		block: BlockNumber,
	) -> Result<Option<f64>, LiquidityError> {
		self.data()
			.await?
			.price_at_block(platform, from, to, block)
			.await
	}

	async fn block_timestamp(&self, block: BlockNumber) -> Result<Option<Timestamp>, LiquidityError> {
		self.data().await?.block_timestamp(block).await
	}

	async fn latest_block(&self) -> Result<Option<BlockNumber>, LiquidityError> {
		self.data().await?.latest_block().await
	}
}

/// Factory function to create a dataset-backed provider from configuration.
///
/// Configuration parameters:
/// - `path`: JSON dataset (default: "./data/dataset.json")
/// - `scan_max_percent`: price impact scanned for raw tick state (default: 20)
pub fn create_source(config: &toml::Value) -> Box<dyn LiquiditySourceInterface> {
	let path = config
		.get("path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/dataset.json")
		.to_string();
	let max_percent = config
		.get("scan_max_percent")
		.and_then(|v| v.as_integer())
		.unwrap_or(20) as u32;

	Box::new(FileSource::new(
		PathBuf::from(path),
		ScanSettings {
			max_percent,
			..ScanSettings::default()
		},
	))
}

#[cfg(test)]
mod tests {
	use super::*;
	use risk_types::SlippageBps;
	use std::io::Write;

	const DATASET: &str = r#"{
  "block_timestamps": { "1000": 1700000000, "8200": 1700086400 },
  "pools": [
    {
      "platform": "univ3",
      "pool_id": "0xab",
      "from": "WETH",
      "to": "USDC",
      "snapshots": [
        { "block_number": 1000, "price": 2000.0,
          "slippage_map": { "50": { "base": 10.0, "quote": 19900.0 }, "100": { "base": 25.0, "quote": 49500.0 } } }
      ]
    }
  ],
  "tick_pools": [
    {
      "platform": "univ3",
      "pool_id": "0xcd",
      "token0": "DAI",
      "token1": "USDC",
      "decimals0": 18,
      "decimals1": 18,
      "states": [
        { "block": 1000,
          "state": { "current_tick": 0, "tick_spacing": 10,
                     "sqrt_price_x96": "0x1000000000000000000000000",
                     "liquidity_by_tick": { "-10": 1000000000000000000000, "0": 1000000000000000000000 } } }
      ]
    }
  ],
  "prices": [
    { "platform": "univ3", "from": "WETH", "to": "USDC",
      "points": [ { "block": 1000, "price": 2000.0 }, { "block": 1100, "price": 2100.0 } ] }
  ]
}"#;

	fn dataset_file(contents: &str) -> tempfile::NamedTempFile {
		let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
		file.write_all(contents.as_bytes()).unwrap();
		file
	}

	#[tokio::test]
	async fn test_load_dataset() {
		let file = dataset_file(DATASET);
		let source = FileSource::new(file.path().to_path_buf(), ScanSettings::default());

		let pools = source.pool_series("univ3", "WETH", "USDC").await.unwrap();
		assert_eq!(pools.len(), 1);
		let snapshot = pools[0].series.get(1000).unwrap();
		assert_eq!(snapshot.slippage_map.get(SlippageBps(100)).base, 25.0);

		// tick pool is scanned in both directions
		assert_eq!(source.pool_series("univ3", "DAI", "USDC").await.unwrap().len(), 1);
		assert_eq!(source.pool_series("univ3", "USDC", "DAI").await.unwrap().len(), 1);

		assert_eq!(
			source.price_at_block("univ3", "WETH", "USDC", 1150).await.unwrap(),
			Some(2100.0)
		);
		assert_eq!(source.block_timestamp(8200).await.unwrap(), Some(1700086400));
		assert_eq!(source.latest_block().await.unwrap(), Some(8200));
	}

	#[tokio::test]
	async fn test_missing_file() {
		let source = FileSource::new(PathBuf::from("/nonexistent/dataset.json"), ScanSettings::default());
		let err = source.latest_block().await.unwrap_err();
		assert!(matches!(err, LiquidityError::Source(_)));
	}

	#[tokio::test]
	async fn test_overflowing_tick_state_is_skipped() {
		let contents = r#"{
  "tick_pools": [
    { "platform": "univ3", "pool_id": "0xef", "token0": "A", "token1": "B",
      "decimals0": 0, "decimals1": 0,
      "states": [ { "block": 1, "state": { "current_tick": 0, "tick_spacing": 10,
        "sqrt_price_x96": "0x1000000000000000000000000",
        "liquidity_by_tick": { "0": 340282366920938463463374607431768211455 } } } ] }
  ]
}"#;
		let file = dataset_file(contents);
		let source = load_dataset(file.path().to_path_buf(), ScanSettings::default())
			.await
			.unwrap();
		assert!(source.pool_series("univ3", "A", "B").await.unwrap().is_empty());
	}

	#[test]
	fn test_schema() {
		let good: toml::Value = toml::from_str(r#"path = "data/dataset.json""#).unwrap();
		assert!(FileSourceSchema.validate(&good).is_ok());
		let bad: toml::Value = toml::from_str(
			r#"
path = "data/dataset.json"
scan_max_percent = 0
"#,
		)
		.unwrap();
		assert!(FileSourceSchema.validate(&bad).is_err());
		let empty = toml::Value::Table(toml::map::Map::new());
		assert!(FileSourceSchema.validate(&empty).is_err());
	}
}
