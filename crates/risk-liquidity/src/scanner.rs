//! Tick liquidity scanner.
//!
//! Walks the tick ranges of a concentrated-liquidity pool away from the
//! current price and records, at every whole percent of price impact, how
//! much of each token the walk has consumed. All tick math is done in
//! `rust_decimal` so that nearby square roots can be subtracted without the
//! cancellation a double would suffer.

use alloy_primitives::U256;
use risk_types::{SlippageBps, SlippageMap, TickLiquidityState, TypesError, VolumePair};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

use crate::LiquidityError;

/// One percent of price impact, in ticks (a tick moves the price by 1 bp).
pub const TICKS_PER_PERCENT: i32 = 100;

/// sqrt(1.0001), the square-root price ratio between adjacent ticks.
const SQRT_1_0001: Decimal = dec!(1.000049998750062496094023417);

/// 2^95; 2^96 itself is one past the largest decimal mantissa.
const TWO_POW_95: Decimal = dec!(39614081257132168796771975168);

/// Cumulative volume per whole percent of price impact.
///
/// `base` is the token driving the walk, `quote` the token on the other side
/// of the same swaps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PercentCurve {
	pub points: BTreeMap<u32, VolumePair>,
}

impl PercentCurve {
	pub fn get(&self, percent: u32) -> VolumePair {
		self.points.get(&percent).copied().unwrap_or(VolumePair::ZERO)
	}

	/// Re-keys the curve onto a bps grid; half-percent buckets carry the
	/// previous whole percent forward.
	pub fn to_slippage_map(&self, step: u32, max: u32) -> Result<SlippageMap, TypesError> {
		SlippageMap::from_sparse(
			self.points
				.iter()
				.map(|(percent, value)| (SlippageBps(percent * 100), *value)),
			step,
			max,
		)
	}
}

/// Result of scanning one pool state.
#[derive(Debug, Clone, PartialEq)]
pub struct TickScan {
	/// Walk toward higher prices; `base` is token0.
	pub token0: PercentCurve,
	/// Walk toward lower prices; `base` is token1.
	pub token1: PercentCurve,
	/// Price of one token0 in token1, decimals applied.
	pub price: f64,
}

impl TickScan {
	/// Slippage maps for `token0 → token1` and `token1 → token0`.
	pub fn into_pair_maps(
		self,
		step: u32,
		max: u32,
	) -> Result<(SlippageMap, SlippageMap), TypesError> {
		Ok((
			self.token0.to_slippage_map(step, max)?,
			self.token1.to_slippage_map(step, max)?,
		))
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Direction {
	Up,
	Down,
}

/// Scans `state` up to `max_percent` of price impact in both directions.
///
/// Volumes are divided by `10^decimals` of their token. A state without
/// liquidity in the scanned window yields all-zero curves.
pub fn scan_tick_liquidity(
	state: &TickLiquidityState,
	token0_decimals: u8,
	token1_decimals: u8,
	max_percent: u32,
) -> Result<TickScan, LiquidityError> {
	if state.tick_spacing <= 0 {
		return Err(TypesError::InvalidTickSpacing(state.tick_spacing).into());
	}
	let start = state.current_tick.div_euclid(state.tick_spacing) * state.tick_spacing;
	let sqrt_price = sqrt_price_from_x96(state.sqrt_price_x96)?;

	let scale0 = pow10(token0_decimals)?;
	let scale1 = pow10(token1_decimals)?;

	let up = walk(state, start, sqrt_price, Direction::Up, max_percent)?;
	let down = walk(state, start, sqrt_price, Direction::Down, max_percent)?;

	let raw_price = checked(sqrt_price.checked_mul(sqrt_price), "price")?;
	let price = checked(raw_price.checked_mul(scale0), "price")?;
	let price = checked(price.checked_div(scale1), "price")?;

	Ok(TickScan {
		token0: normalize(up, scale0, scale1)?,
		token1: normalize(down, scale1, scale0)?,
		price: to_f64(price)?,
	})
}

/// Square-root price at `tick`, unscaled.
pub fn sqrt_price_at_tick(tick: i32) -> Result<Decimal, LiquidityError> {
	checked(SQRT_1_0001.checked_powi(tick as i64), "sqrt price at tick")
}

/// Converts a Q64.96 square-root price into a decimal.
pub fn sqrt_price_from_x96(sqrt_price_x96: U256) -> Result<Decimal, LiquidityError> {
	let one = U256::from(1u8);
	let integer = sqrt_price_x96 >> 96usize;
	let fraction = sqrt_price_x96 & ((one << 96usize) - one);

	let integer = u128::try_from(integer)
		.ok()
		.and_then(decimal_from_u128)
		.ok_or_else(|| LiquidityError::Overflow("sqrt price integer part".to_string()))?;
	let fraction = u128::try_from(fraction)
		.ok()
		.and_then(decimal_from_u128)
		.ok_or_else(|| LiquidityError::Overflow("sqrt price fraction".to_string()))?;

	let fraction = checked(fraction.checked_div(TWO_POW_95), "sqrt price fraction")?;
	let fraction = checked(fraction.checked_div(Decimal::TWO), "sqrt price fraction")?;
	checked(integer.checked_add(fraction), "sqrt price")
}

/// Cumulative (driving, companion) amounts per percent, raw token units.
fn walk(
	state: &TickLiquidityState,
	start: i32,
	sqrt_price: Decimal,
	direction: Direction,
	max_percent: u32,
) -> Result<BTreeMap<u32, (Decimal, Decimal)>, LiquidityError> {
	let spacing = state.tick_spacing as i64;
	let steps_for = |percent: u32| (TICKS_PER_PERCENT as i64 * percent as i64) / spacing;
	let total_steps = steps_for(max_percent);

	let mut driving = Decimal::ZERO;
	let mut companion = Decimal::ZERO;
	let mut sqrt_current = sqrt_price;
	let mut cumulative = Vec::with_capacity(total_steps as usize + 1);

	if direction == Direction::Down {
		// the current range is only partly below the price
		let sqrt_start = sqrt_price_at_tick(start)?;
		if sqrt_current > sqrt_start {
			let liquidity = liquidity_at(state, start)?;
			let (d, c) = segment_down(liquidity, sqrt_current, sqrt_start)?;
			driving += d;
			companion += c;
			sqrt_current = sqrt_start;
		}
	}
	cumulative.push((driving, companion));

	for k in 1..=total_steps {
		let offset = i32::try_from(k * spacing)
			.map_err(|_| LiquidityError::Overflow("tick offset".to_string()))?;
		let (target, range_tick) = match direction {
			Direction::Up => (start + offset, start + offset - state.tick_spacing),
			Direction::Down => (start - offset, start - offset),
		};
		let liquidity = liquidity_at(state, range_tick)?;
		let sqrt_next = sqrt_price_at_tick(target)?;
		let (d, c) = match direction {
			Direction::Up => segment_up(liquidity, sqrt_current, sqrt_next)?,
			Direction::Down => segment_down(liquidity, sqrt_current, sqrt_next)?,
		};
		driving = checked(driving.checked_add(d), "cumulative volume")?;
		companion = checked(companion.checked_add(c), "cumulative volume")?;
		sqrt_current = sqrt_next;
		cumulative.push((driving, companion));
	}

	// boundaries closer than one spacing repeat the previous value
	Ok((1..=max_percent)
		.map(|percent| (percent, cumulative[steps_for(percent) as usize]))
		.collect())
}

/// Amounts swapped while the price rises from `lower` to `upper`:
/// token0 out of the pool and token1 into it.
fn segment_up(
	liquidity: Decimal,
	lower: Decimal,
	upper: Decimal,
) -> Result<(Decimal, Decimal), LiquidityError> {
	let inv_lower = checked(Decimal::ONE.checked_div(lower), "inverse sqrt price")?;
	let inv_upper = checked(Decimal::ONE.checked_div(upper), "inverse sqrt price")?;
	let dx = checked(liquidity.checked_mul(inv_lower - inv_upper), "token0 amount")?;
	let dy = checked(liquidity.checked_mul(upper - lower), "token1 amount")?;
	Ok((dx, dy))
}

/// Amounts swapped while the price falls from `upper` to `lower`:
/// token1 out of the pool and token0 into it.
fn segment_down(
	liquidity: Decimal,
	upper: Decimal,
	lower: Decimal,
) -> Result<(Decimal, Decimal), LiquidityError> {
	let (dx, dy) = segment_up(liquidity, lower, upper)?;
	Ok((dy, dx))
}

fn liquidity_at(state: &TickLiquidityState, tick: i32) -> Result<Decimal, LiquidityError> {
	decimal_from_u128(state.liquidity_at(tick))
		.ok_or_else(|| LiquidityError::Overflow(format!("liquidity at tick {}", tick)))
}

fn normalize(
	raw: BTreeMap<u32, (Decimal, Decimal)>,
	driving_scale: Decimal,
	companion_scale: Decimal,
) -> Result<PercentCurve, LiquidityError> {
	let mut points = BTreeMap::new();
	for (percent, (driving, companion)) in raw {
		let base = checked(driving.checked_div(driving_scale), "normalization")?;
		let quote = checked(companion.checked_div(companion_scale), "normalization")?;
		points.insert(percent, VolumePair::new(to_f64(base)?, to_f64(quote)?));
	}
	Ok(PercentCurve { points })
}

/// Exact conversion; `None` above the 96-bit decimal mantissa.
fn decimal_from_u128(value: u128) -> Option<Decimal> {
	let value = i128::try_from(value).ok()?;
	Decimal::try_from_i128_with_scale(value, 0).ok()
}

fn pow10(decimals: u8) -> Result<Decimal, LiquidityError> {
	checked(Decimal::TEN.checked_powi(decimals as i64), "decimals")
}

fn to_f64(value: Decimal) -> Result<f64, LiquidityError> {
	value
		.to_f64()
		.ok_or_else(|| LiquidityError::Overflow(format!("conversion of {}", value)))
}

fn checked(value: Option<Decimal>, what: &str) -> Result<Decimal, LiquidityError> {
	value.ok_or_else(|| LiquidityError::Overflow(what.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn q96() -> U256 {
		U256::from(1u128 << 96)
	}

	/// Constant liquidity over `[-width, width)` around tick 0 at price 1.
	fn flat_state(spacing: i32, liquidity: u128, width: i32) -> TickLiquidityState {
		let mut liquidity_by_tick = BTreeMap::new();
		let mut tick = -width;
		while tick < width {
			liquidity_by_tick.insert(tick, liquidity);
			tick += spacing;
		}
		TickLiquidityState {
			current_tick: 0,
			tick_spacing: spacing,
			sqrt_price_x96: q96(),
			liquidity_by_tick,
		}
	}

	fn assert_close(actual: f64, expected: f64) {
		let tolerance = expected.abs() * 1e-6 + 1e-12;
		assert!(
			(actual - expected).abs() <= tolerance,
			"expected {}, got {}",
			expected,
			actual
		);
	}

	#[test]
	fn test_sqrt_price_conversion() {
		assert_eq!(sqrt_price_from_x96(q96()).unwrap(), Decimal::ONE);
		assert_eq!(
			sqrt_price_from_x96(q96() * U256::from(3u8) / U256::from(2u8)).unwrap(),
			dec!(1.5)
		);
		assert_eq!(sqrt_price_at_tick(0).unwrap(), Decimal::ONE);
		assert_eq!(sqrt_price_at_tick(2).unwrap().round_dp(12), dec!(1.0001));
	}

	#[test]
	fn test_constant_liquidity_matches_closed_form() {
		// L = 1e20 raw units, 18 decimals on both sides
		let liquidity = 100_000_000_000_000_000_000u128;
		let state = flat_state(10, liquidity, 3000);
		let scan = scan_tick_liquidity(&state, 18, 18, 20).unwrap();

		let l = 100.0;
		for i in 1..=20u32 {
			let ticks = (100 * i) as f64;
			let expected_dx = l * (1.0 - 1.0001f64.powf(-ticks / 2.0));
			assert_close(scan.token0.get(i).base, expected_dx);
			// companion of the upward walk: L (sqrt(P_i) - 1)
			assert_close(scan.token0.get(i).quote, l * (1.0001f64.powf(ticks / 2.0) - 1.0));
			// symmetric walk down
			assert_close(scan.token1.get(i).base, expected_dx);
		}
		assert_close(scan.price, 1.0);
	}

	#[test]
	fn test_curves_are_monotonic() {
		let mut state = flat_state(60, 5_000_000_000_000, 6000);
		// a hole and a thick range
		state.liquidity_by_tick.remove(&120);
		state.liquidity_by_tick.insert(-600, 90_000_000_000_000);
		let scan = scan_tick_liquidity(&state, 6, 18, 20).unwrap();
		let (map0, map1) = scan.into_pair_maps(50, 2000).unwrap();
		assert!(map0.is_monotonic());
		assert!(map1.is_monotonic());
		assert_eq!(map0.len(), 40);
	}

	#[test]
	fn test_wide_spacing_carries_forward() {
		// boundaries every 200 ticks: 1% rounds back onto the start
		let state = flat_state(200, 1_000_000, 4000);
		let scan = scan_tick_liquidity(&state, 0, 0, 4).unwrap();
		assert_eq!(scan.token0.get(1), VolumePair::ZERO);
		assert!(scan.token0.get(2).base > 0.0);
		assert_eq!(scan.token0.get(3), scan.token0.get(2));
		assert!(scan.token0.get(4).base > scan.token0.get(3).base);
	}

	#[test]
	fn test_no_liquidity_is_all_zero() {
		let state = TickLiquidityState {
			current_tick: 0,
			tick_spacing: 10,
			sqrt_price_x96: q96(),
			liquidity_by_tick: BTreeMap::new(),
		};
		let scan = scan_tick_liquidity(&state, 18, 18, 20).unwrap();
		assert!(scan.token0.points.values().all(VolumePair::is_zero));
		assert!(scan.token1.points.values().all(VolumePair::is_zero));
	}

	#[test]
	fn test_partial_current_range_counts_downward() {
		// price sits halfway into range [0, 10)
		let mut state = flat_state(10, 1_000_000_000, 1000);
		state.current_tick = 5;
		state.sqrt_price_x96 = U256::from(1_000_250_000_000u64) * q96() / U256::from(1_000_000_000_000u64);
		let scan = scan_tick_liquidity(&state, 0, 0, 1).unwrap();
		let centred = scan_tick_liquidity(&flat_state(10, 1_000_000_000, 1000), 0, 0, 1).unwrap();
		assert!(scan.token1.get(1).base > centred.token1.get(1).base);
	}

	#[test]
	fn test_overflowing_liquidity_is_an_error() {
		let state = flat_state(10, u128::MAX, 200);
		assert!(matches!(
			scan_tick_liquidity(&state, 18, 18, 1),
			Err(LiquidityError::Overflow(_))
		));
	}

	#[test]
	fn test_invalid_spacing() {
		let mut state = flat_state(10, 1, 100);
		state.tick_spacing = 0;
		assert!(matches!(
			scan_tick_liquidity(&state, 0, 0, 1),
			Err(LiquidityError::InvalidState(TypesError::InvalidTickSpacing(0)))
		));
	}
}
