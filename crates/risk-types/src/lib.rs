//! Shared value types for the liquidity risk engine.
//!
//! Everything that crosses a crate boundary lives here: slippage curves,
//! liquidity snapshots, pool tick state and volatility output. These are
//! plain values, freely cloned between components.

pub mod common;
pub mod errors;
pub mod pool;
pub mod slippage;
pub mod snapshot;
pub mod validation;
pub mod volatility;

pub use common::*;
pub use errors::*;
pub use pool::*;
pub use slippage::*;
pub use snapshot::*;
pub use validation::*;
pub use volatility::*;
