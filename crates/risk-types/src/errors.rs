//! Error types for malformed input values.

use thiserror::Error;

/// Errors raised while building value types from raw collaborator data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TypesError {
	#[error("Invalid tick spacing: {0}")]
	InvalidTickSpacing(i32),

	#[error("Negative liquidity {liquidity} for range starting at tick {tick}")]
	NegativeLiquidity { tick: i32, liquidity: i128 },

	#[error("Invalid slippage step {step} for maximum {max}")]
	InvalidStep { step: u32, max: u32 },
}
