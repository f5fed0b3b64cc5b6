//! Lenient field deserializers for documents written by older clients,
//! which stored numbers as strings and left blank form fields as `""`.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Accepts `95`, `95.4` or `"95"`.
pub fn u32_from_number_or_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| de::Error::custom(format!("expected a non-negative number, got {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| de::Error::custom(format!("expected a number, got '{}'", s))),
        other => Err(de::Error::custom(format!("expected a number, got {}", other))),
    }
}

/// Accepts a number, a numeric string, `""` or `null` (the last two mean "not recorded").
pub fn optional_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expected a number, got '{}'", s))),
        Some(other) => Err(de::Error::custom(format!("expected a number, got {}", other))),
    }
}

/// Accepts a string or a number and renders it as text.
pub fn text_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(de::Error::custom(format!("expected text, got {}", other))),
    }
}
