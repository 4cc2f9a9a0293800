//! Pairwise routes considered by the optimizer.

use risk_types::Asset;

/// Every directed pair the optimizer may route through, in fetch order.
///
/// Origin to each pivot first, then pivot to pivot, then each pivot to the
/// target. The order matters: pools claimed by an earlier pair are not
/// counted again by a later one.
pub fn all_pairs(from: &str, to: &str, pivots: &[String]) -> Vec<(Asset, Asset)> {
	let mut pairs = Vec::with_capacity(pivots.len() * (pivots.len() + 1));
	for pivot in pivots {
		pairs.push((from.to_string(), pivot.clone()));
	}
	for first in pivots {
		for second in pivots {
			if first != second {
				pairs.push((first.clone(), second.clone()));
			}
		}
	}
	for pivot in pivots {
		pairs.push((pivot.clone(), to.to_string()));
	}
	pairs
}
