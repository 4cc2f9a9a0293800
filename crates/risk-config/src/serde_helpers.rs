//! Serde helpers for configuration deserialization

use crate::routing::PairPattern;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Custom deserializer for BTreeMap<PairPattern, T> that parses `FROM/TO` string keys
pub fn deserialize_pattern_map<'de, D, T>(
	deserializer: D,
) -> Result<BTreeMap<PairPattern, T>, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de>,
{
	let map = BTreeMap::<String, T>::deserialize(deserializer)?;

	map.into_iter()
		.map(|(k, v)| {
			k.parse::<PairPattern>()
				.map(|pattern| (pattern, v))
				.map_err(serde::de::Error::custom)
		})
		.collect()
}

/// Custom serializer for BTreeMap<PairPattern, T> that writes patterns back as strings
pub fn serialize_pattern_map<S, T>(
	map: &BTreeMap<PairPattern, T>,
	serializer: S,
) -> Result<S::Ok, S::Error>
where
	S: Serializer,
	T: Serialize,
{
	let string_map: BTreeMap<String, &T> = map.iter().map(|(k, v)| (k.to_string(), v)).collect();

	string_map.serialize(serializer)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde::Deserialize;

	#[derive(Debug, Deserialize, Serialize)]
	struct TestStruct {
		#[serde(
			deserialize_with = "deserialize_pattern_map",
			serialize_with = "serialize_pattern_map"
		)]
		overrides: BTreeMap<PairPattern, Vec<String>>,
	}

	#[test]
	fn test_deserialize_pattern_map() {
		let toml = r#"
            [overrides]
            "WBTC/*" = ["WETH"]
            "*/USDC" = ["USDT"]
        "#;

		let result: TestStruct = toml::from_str(toml).unwrap();
		assert_eq!(
			result.overrides.get(&PairPattern::From("WBTC".into())).unwrap(),
			&vec!["WETH".to_string()]
		);
		assert_eq!(
			result.overrides.get(&PairPattern::To("USDC".into())).unwrap(),
			&vec!["USDT".to_string()]
		);
	}

	#[test]
	fn test_invalid_pattern_key() {
		let toml = r#"
            [overrides]
            "WBTC" = ["WETH"]
        "#;

		let result: Result<TestStruct, _> = toml::from_str(toml);
		assert!(result.unwrap_err().to_string().contains("Invalid pair pattern"));
	}

	#[test]
	fn test_serialize_pattern_map() {
		let mut overrides = BTreeMap::new();
		overrides.insert(PairPattern::exact("WETH", "USDC"), vec!["DAI".to_string()]);

		let json = serde_json::to_string(&TestStruct { overrides }).unwrap();
		assert_eq!(json, r#"{"overrides":{"WETH/USDC":["DAI"]}}"#);
	}
}
