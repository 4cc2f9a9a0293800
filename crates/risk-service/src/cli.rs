//! Command-line interface definitions.

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "risk-engine")]
#[command(about = "Liquidity aggregation, route optimization and volatility queries", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
	/// Path to configuration file (TOML, JSON or YAML)
	#[arg(short, long, env = "RISK_CONFIG")]
	pub config: Option<PathBuf>,

	/// Log level or filter directive (trace, debug, info, warn, error)
	#[arg(short, long, env = "RISK_LOG_LEVEL", default_value = "info")]
	pub log_level: String,

	/// Log output format
	#[arg(long, env = "RISK_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
	pub log_format: LogFormat,

	/// Subcommand to execute
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
	Pretty,
	Json,
}

/// A directed pair on one venue, or on every venue with `all`.
#[derive(ClapArgs, Debug, Clone)]
pub struct PairArgs {
	/// Venue name, or "all" for the cross-venue union
	#[arg(short, long, default_value = "all")]
	pub platform: String,

	/// Asset sold
	pub from: String,

	/// Asset bought
	pub to: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Aggregated slippage curve over a block range
	#[command(about = "Print the aggregated slippage curve series of a pair")]
	Curve {
		#[command(flatten)]
		pair: PairArgs,

		#[arg(long)]
		from_block: u64,

		#[arg(long)]
		to_block: u64,

		/// Only count direct pools
		#[arg(long)]
		no_jumps: bool,

		/// Block stride of the series (default: engine.step_block)
		#[arg(long)]
		step_block: Option<u64>,
	},

	/// Optimized multi-hop liquidity at one block
	#[command(about = "Print the optimized liquidity of a pair at a block")]
	Liquidity {
		#[command(flatten)]
		pair: PairArgs,

		#[arg(long)]
		block: u64,
	},

	/// Optimized liquidity over block-averaged curves
	#[command(about = "Print the optimized liquidity of a pair averaged over a block range")]
	AverageLiquidity {
		#[command(flatten)]
		pair: PairArgs,

		#[arg(long)]
		from_block: u64,

		#[arg(long)]
		to_block: u64,
	},

	/// Rolling biggest daily change
	#[command(about = "Print the decayed daily volatility history of a price")]
	Volatility {
		#[command(flatten)]
		pair: PairArgs,

		/// Daily decay factor in (0, 1) (default: volatility.lambda)
		#[arg(long)]
		lambda: Option<f64>,
	},

	/// Parkinson high/low volatility
	#[command(about = "Print the Parkinson volatility of a price")]
	Parkinson {
		#[command(flatten)]
		pair: PairArgs,

		/// Days to average (default: volatility.parkinson_days)
		#[arg(long)]
		days: Option<u32>,
	},

	/// Search the best pivot ordering of a pair
	#[command(about = "Score every ordering of candidate pivots and report the best")]
	TunePivots {
		#[command(flatten)]
		pair: PairArgs,

		#[arg(long)]
		block: u64,

		/// Candidate pivots, comma separated (default: the pair's configured pivots)
		#[arg(long, value_delimiter = ',')]
		candidates: Vec<String>,

		/// Bucket scoring each ordering, in bps
		#[arg(long, default_value_t = 500)]
		reference_bps: u32,

		/// Write the resulting [routing] section to this file
		#[arg(short, long)]
		output: Option<PathBuf>,
	},

	/// Validate configuration file
	#[command(about = "Load and validate the configuration file")]
	Validate,
}
