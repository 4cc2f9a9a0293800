//! Pivot selection per asset pair.
//!
//! A [`RoutingConfig`] is an immutable value: every resolution receives its own
//! copy, and the offline tuner produces a new override table instead of
//! editing one in place.

use crate::serde_helpers::{deserialize_pattern_map, serialize_pattern_map};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Pivots tried when no override matches.
pub const DEFAULT_PIVOTS: [&str; 5] = ["DAI", "WBTC", "USDC", "USDT", "WETH"];

const WILDCARD: &str = "*";

#[derive(Debug, Error, PartialEq)]
pub enum RoutingError {
	#[error("Invalid pair pattern '{0}', expected FROM/TO, FROM/* or */TO")]
	InvalidPattern(String),

	#[error("Pivot override '{pattern}' references unknown asset {asset}")]
	UnknownAsset { pattern: String, asset: String },

	#[error("Pivot override '{pattern}' names alias {alias}, key it on {target} instead")]
	AliasedPattern {
		pattern: String,
		alias: String,
		target: String,
	},
}

/// Key of a pivot override.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PairPattern {
	/// `FROM/TO`
	Exact { from: String, to: String },
	/// `FROM/*`
	From(String),
	/// `*/TO`
	To(String),
}

impl PairPattern {
	pub fn exact(from: impl Into<String>, to: impl Into<String>) -> Self {
		PairPattern::Exact {
			from: from.into(),
			to: to.into(),
		}
	}

	fn assets(&self) -> Vec<&str> {
		match self {
			PairPattern::Exact { from, to } => vec![from.as_str(), to.as_str()],
			PairPattern::From(a) | PairPattern::To(a) => vec![a.as_str()],
		}
	}
}

impl FromStr for PairPattern {
	type Err = RoutingError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (from, to) = s
			.split_once('/')
			.ok_or_else(|| RoutingError::InvalidPattern(s.to_string()))?;
		let (from, to) = (from.trim(), to.trim());
		match (from, to) {
			("", _) | (_, "") | (WILDCARD, WILDCARD) => {
				Err(RoutingError::InvalidPattern(s.to_string()))
			}
			(from, WILDCARD) => Ok(PairPattern::From(from.to_string())),
			(WILDCARD, to) => Ok(PairPattern::To(to.to_string())),
			(from, to) => Ok(PairPattern::exact(from, to)),
		}
	}
}

impl fmt::Display for PairPattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PairPattern::Exact { from, to } => write!(f, "{}/{}", from, to),
			PairPattern::From(from) => write!(f, "{}/{}", from, WILDCARD),
			PairPattern::To(to) => write!(f, "{}/{}", WILDCARD, to),
		}
	}
}

/// Pivot configuration: global default, per-pattern overrides and symbol aliases.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RoutingConfig {
	#[serde(default = "default_pivots")]
	pub default_pivots: Vec<String>,
	/// Ordered pivot lists keyed by `FROM/TO`, `FROM/*` or `*/TO`
	#[serde(
		default,
		deserialize_with = "deserialize_pattern_map",
		serialize_with = "serialize_pattern_map"
	)]
	pub overrides: BTreeMap<PairPattern, Vec<String>>,
	/// Symbols routed as another asset (e.g. a wrapper priced as its underlying)
	#[serde(default)]
	pub aliases: BTreeMap<String, String>,
}

impl Default for RoutingConfig {
	fn default() -> Self {
		Self {
			default_pivots: default_pivots(),
			overrides: BTreeMap::new(),
			aliases: BTreeMap::new(),
		}
	}
}

fn default_pivots() -> Vec<String> {
	DEFAULT_PIVOTS.iter().map(|s| s.to_string()).collect()
}

impl RoutingConfig {
	/// Config with the given default pivots and nothing else.
	pub fn with_default_pivots<I, S>(pivots: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			default_pivots: pivots.into_iter().map(Into::into).collect(),
			..Self::default()
		}
	}

	/// Returns a copy with `pattern` overridden.
	pub fn with_override(mut self, pattern: PairPattern, pivots: Vec<String>) -> Self {
		self.overrides.insert(pattern, pivots);
		self
	}

	/// Applies symbol aliases to a requested pair.
	pub fn resolve_pair(&self, from: &str, to: &str) -> (String, String) {
		let resolve = |s: &str| self.aliases.get(s).cloned().unwrap_or_else(|| s.to_string());
		(resolve(from), resolve(to))
	}

	/// Ordered pivot list for `from → to`.
	///
	/// Precedence: `FROM/TO`, then `FROM/*`, then `*/TO`, then the default
	/// list. `from` and `to` themselves are never returned, nor duplicates.
	pub fn pivots_for(&self, from: &str, to: &str) -> Vec<String> {
		let candidates = [
			PairPattern::exact(from, to),
			PairPattern::From(from.to_string()),
			PairPattern::To(to.to_string()),
		];
		let chosen = candidates
			.iter()
			.find_map(|pattern| self.overrides.get(pattern))
			.unwrap_or(&self.default_pivots);

		let mut seen = BTreeSet::new();
		chosen
			.iter()
			.filter(|p| p.as_str() != from && p.as_str() != to)
			.filter(|p| seen.insert(p.as_str()))
			.cloned()
			.collect()
	}

	/// Rejects override keys naming an aliased symbol.
	///
	/// Pairs are resolved through `aliases` before any override lookup, so
	/// such a key can never match.
	pub fn validate_aliases(&self) -> Result<(), RoutingError> {
		for pattern in self.overrides.keys() {
			for asset in pattern.assets() {
				if let Some(target) = self.aliases.get(asset) {
					return Err(RoutingError::AliasedPattern {
						pattern: pattern.to_string(),
						alias: asset.to_string(),
						target: target.clone(),
					});
				}
			}
		}
		Ok(())
	}

	/// Checks every asset named by the routing tables against `known`.
	pub fn validate_assets(&self, known: &BTreeSet<String>) -> Result<(), RoutingError> {
		let unknown = |pattern: String, asset: &str| RoutingError::UnknownAsset {
			pattern,
			asset: asset.to_string(),
		};

		for pivot in &self.default_pivots {
			if !known.contains(pivot) {
				return Err(unknown("default".to_string(), pivot));
			}
		}
		for (pattern, pivots) in &self.overrides {
			for asset in pattern.assets().into_iter().chain(pivots.iter().map(String::as_str)) {
				if !known.contains(asset) {
					return Err(unknown(pattern.to_string(), asset));
				}
			}
		}
		for (alias, target) in &self.aliases {
			if !known.contains(target) {
				return Err(unknown(format!("alias {}", alias), target));
			}
		}
		Ok(())
	}
}
