use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserializes `null` as the type's default, for fields Mailgun sometimes sends as `null`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts a string, a number or `null` and yields its string form.
///
/// MX priorities arrive as `"10"` from some endpoints and `10` from others.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    })
}

pub fn is_empty_str(value: &str) -> bool {
    value.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "string_or_number")]
        priority: String,
        #[serde(default, deserialize_with = "null_as_default")]
        cached: Vec<String>,
    }

    #[test]
    fn test_priority_from_number_string_and_null() {
        let s: Sample = serde_json::from_str(r#"{"priority": 10, "cached": null}"#).unwrap();
        assert_eq!(s.priority, "10");
        assert!(s.cached.is_empty());

        let s: Sample = serde_json::from_str(r#"{"priority": "20", "cached": ["a"]}"#).unwrap();
        assert_eq!(s.priority, "20");
        assert_eq!(s.cached, vec!["a".to_string()]);

        let s: Sample = serde_json::from_str(r#"{"priority": null}"#).unwrap();
        assert_eq!(s.priority, "");
    }

    #[test]
    fn test_missing_fields_default() {
        let s: Sample = serde_json::from_str("{}").unwrap();
        assert_eq!(s.priority, "");
        assert!(s.cached.is_empty());
    }
}
