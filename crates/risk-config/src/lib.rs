//! Configuration for the liquidity risk engine.
//!
//! Configuration files may be TOML, JSON or YAML. Implementation-specific
//! tables (`[source.config]`, `[solver.config]`) are kept as raw TOML values
//! and validated by the implementation that consumes them.

pub mod loader;
pub mod routing;
pub mod serde_helpers;
pub mod types;

pub use loader::{load_config, ConfigLoader};
pub use routing::{PairPattern, RoutingConfig, RoutingError, DEFAULT_PIVOTS};
pub use types::*;
