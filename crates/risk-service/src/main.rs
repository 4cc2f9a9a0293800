use anyhow::{Context, Result};
use clap::Parser;
use risk_config::{load_config, ConfigLoader, EngineConfig};
use risk_service::cli::{Args, Command};
use risk_service::commands::{build_engine, execute};
use risk_service::telemetry::{init_tracing, TracingConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();

	// Initialize tracing
	init_tracing(
		TracingConfig::new()
			.with_filter(&args.log_level)
			.with_format(args.log_format),
	)
	.map_err(|e| anyhow::anyhow!("{}", e))?;

	let config = load(&args)?;

	if let Command::Validate = args.command {
		return validate(&config);
	}

	info!("Engine name: {}", config.engine.name);
	let engine = build_engine(config)?;
	let output = execute(&engine, &args.command).await?;
	println!(
		"{}",
		serde_json::to_string_pretty(&output).context("Failed to render output")?
	);
	Ok(())
}

fn load(args: &Args) -> Result<EngineConfig> {
	match &args.config {
		Some(path) => {
			info!("Loading configuration from: {:?}", path);
			ConfigLoader::from_env_and_file(Some(path.as_path()))
				.context("Failed to load configuration")
		}
		None => load_config().context("Failed to load configuration"),
	}
}

fn validate(config: &EngineConfig) -> Result<()> {
	info!("Configuration is valid");
	info!("Engine name: {}", config.engine.name);
	info!("Platforms: {:?}", config.platforms);
	info!(
		"Buckets: every {} bps up to {} bps",
		config.engine.step_bps, config.engine.max_slippage_bps
	);
	info!("Default pivots: {:?}", config.routing.default_pivots);
	for (pattern, pivots) in &config.routing.overrides {
		info!("  Override {}: {:?}", pattern, pivots);
	}
	info!("Source: {}", config.source.implementation);
	info!("Solver: {}", config.solver.implementation);

	// instantiating the engine runs the implementation schemas
	build_engine(config.clone())?;
	Ok(())
}
