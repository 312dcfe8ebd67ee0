//! Deserializers which turn malformed registry fields into defaults instead of errors.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accept any JSON for an optional field, keeping it only if it has the expected shape.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| serde_json::from_value(value).ok()))
}

/// A byte count which tolerates strings, floats, nulls and garbage.
///
/// Anything that is not a non-negative number is treated as missing.
pub(crate) fn lenient_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

#[cfg(test)]
mod test {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Fields {
        #[serde(default, deserialize_with = "lenient_size")]
        size: Option<u64>,
        #[serde(default, deserialize_with = "lenient")]
        tags: Option<Vec<String>>,
    }

    fn fields(json: &str) -> Fields {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn sizes() {
        assert_eq!(fields(r#"{"size": 42}"#).size, Some(42));
        assert_eq!(fields(r#"{"size": "42"}"#).size, Some(42));
        assert_eq!(fields(r#"{"size": 42.0}"#).size, Some(42));
        assert_eq!(fields(r#"{"size": -1}"#).size, None);
        assert_eq!(fields(r#"{"size": null}"#).size, None);
        assert_eq!(fields(r#"{"size": {"bytes": 1}}"#).size, None);
        assert_eq!(fields(r#"{}"#).size, None);
    }

    #[test]
    fn shapes() {
        assert_eq!(fields(r#"{"tags": ["1", "2"]}"#).tags.unwrap(), ["1", "2"]);
        assert_eq!(fields(r#"{"tags": null}"#).tags, None);
        assert_eq!(fields(r#"{"tags": "latest"}"#).tags, None);
    }
}
