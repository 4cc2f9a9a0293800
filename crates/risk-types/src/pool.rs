//! Concentrated-liquidity pool state as delivered by indexers.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::TypesError;

/// State of one concentrated-liquidity pool at one block.
///
/// `liquidity_by_tick[t]` is the liquidity active over `[t, t + tick_spacing)`.
/// Ticks without an entry have no active liquidity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickLiquidityState {
	pub current_tick: i32,
	pub tick_spacing: i32,
	pub sqrt_price_x96: U256,
	pub liquidity_by_tick: BTreeMap<i32, u128>,
}

impl TickLiquidityState {
	/// Builds the per-range form from Uniswap-style `liquidityNet` deltas.
	///
	/// `active_liquidity` is the pool's in-range liquidity at `current_tick`.
	/// Ranges are materialized for `window_ticks` on both sides of the current
	/// range: crossing an initialized tick upward adds its net delta, crossing
	/// it downward subtracts it.
	pub fn from_liquidity_net(
		current_tick: i32,
		tick_spacing: i32,
		sqrt_price_x96: U256,
		active_liquidity: u128,
		liquidity_net: &BTreeMap<i32, i128>,
		window_ticks: i32,
	) -> Result<Self, TypesError> {
		if tick_spacing <= 0 {
			return Err(TypesError::InvalidTickSpacing(tick_spacing));
		}
		let start = current_tick.div_euclid(tick_spacing) * tick_spacing;
		let mut liquidity_by_tick = BTreeMap::new();
		if active_liquidity > 0 {
			liquidity_by_tick.insert(start, active_liquidity);
		}

		let to_u128 = |tick: i32, value: i128| -> Result<u128, TypesError> {
			u128::try_from(value).map_err(|_| TypesError::NegativeLiquidity {
				tick,
				liquidity: value,
			})
		};

		// upward: entering range t crosses tick t
		let mut running = active_liquidity as i128;
		let mut tick = start + tick_spacing;
		while tick <= start + window_ticks {
			running += liquidity_net.get(&tick).copied().unwrap_or(0);
			let value = to_u128(tick, running)?;
			if value > 0 {
				liquidity_by_tick.insert(tick, value);
			}
			tick += tick_spacing;
		}

		// downward: leaving range t+spacing crosses tick t+spacing
		let mut running = active_liquidity as i128;
		let mut tick = start - tick_spacing;
		while tick >= start - window_ticks {
			running -= liquidity_net
				.get(&(tick + tick_spacing))
				.copied()
				.unwrap_or(0);
			let value = to_u128(tick, running)?;
			if value > 0 {
				liquidity_by_tick.insert(tick, value);
			}
			tick -= tick_spacing;
		}

		Ok(Self {
			current_tick,
			tick_spacing,
			sqrt_price_x96,
			liquidity_by_tick,
		})
	}

	/// Active liquidity over the range starting at `tick`.
	pub fn liquidity_at(&self, tick: i32) -> u128 {
		self.liquidity_by_tick.get(&tick).copied().unwrap_or(0)
	}
}
