//! Configuration validation utility
//!
//! Usage: cargo run --bin validate-config config/engine.toml

use std::env;
use std::process;

use risk_config::ConfigLoader;

fn main() {
	let args: Vec<String> = env::args().collect();

	if args.len() != 2 {
		eprintln!("Usage: {} <config-file>", args[0]);
		process::exit(1);
	}

	let config_path = &args[1];

	println!("Validating configuration file: {}", config_path);

	match ConfigLoader::from_file(config_path) {
		Ok(config) => {
			println!("✅ Configuration is valid!");
			println!("Engine name: {}", config.engine.name);
			println!("Platforms: {:?}", config.platforms);
			println!("Assets configured: {}", config.assets.len());
			println!("Default pivots: {:?}", config.routing.default_pivots);
			println!("Pivot overrides: {}", config.routing.overrides.len());
			println!("Source: {}", config.source.implementation);
			println!("Solver: {}", config.solver.implementation);
		}
		Err(e) => {
			eprintln!("❌ Configuration validation failed:");
			eprintln!("{:#}", e);
			process::exit(1);
		}
	}
}
