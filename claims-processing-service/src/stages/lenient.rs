//! Forgiving field deserializers for model output.
//!
//! Models return `"N/A"` for unknown text, `"$1,500.00"` for amounts, a bare string where a
//! list was asked for and labels in any case. These helpers accept all of that and map
//! placeholders to `None`, so the typed schemas stay strict about structure only.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

const PLACEHOLDERS: &[&str] = &[
    "",
    "-",
    "null",
    "none",
    "n/a",
    "na",
    "unknown",
    "not provided",
    "not specified",
    "not mentioned",
    "not available",
];

fn is_placeholder(text: &str) -> bool {
    let lowered = text.trim().to_ascii_lowercase();
    PLACEHOLDERS.contains(&lowered.as_str())
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !is_placeholder(&s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Text from a string, number or bool; placeholders and null become `None`.
pub fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(Value::deserialize(deserializer)?))
}

/// A number, or a currency string such as `"$1,500.00"`.
pub fn opt_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(amount_from_value(&Value::deserialize(deserializer)?))
}

pub(crate) fn amount_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

pub(crate) fn parse_amount(text: &str) -> Option<f64> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
        .collect();
    if !digits.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// A plain number or a numeric string; anything else is `None`.
pub fn opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    })
}

/// A categorical label matched case-insensitively; unknown labels become `None`.
pub fn opt_label<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<String, Error = String>,
{
    let Some(text) = scalar_text(Value::deserialize(deserializer)?) else {
        return Ok(None);
    };
    match T::try_from(text) {
        Ok(label) => Ok(Some(label)),
        Err(e) => {
            debug!(error = %e, "ignoring unrecognised label in AI response");
            Ok(None)
        }
    }
}

/// A list of strings. A single string becomes a one-item list; objects contribute their
/// `description`, `action` or `text` field; null becomes an empty list.
pub fn text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single => vec![single],
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(mut fields) => ["description", "action", "text"]
                .iter()
                .find_map(|key| fields.remove(*key))
                .and_then(scalar_text),
            other => scalar_text(other),
        })
        .collect())
}

/// A list whose items follow their own schema; null becomes an empty list.
pub fn list_or_null<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskLevel;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        #[serde(default, deserialize_with = "opt_text")]
        name: Option<String>,
        #[serde(default, deserialize_with = "opt_amount")]
        amount: Option<f64>,
        #[serde(default, deserialize_with = "opt_number")]
        score: Option<f64>,
        #[serde(default, deserialize_with = "opt_label")]
        risk: Option<RiskLevel>,
        #[serde(default, deserialize_with = "text_list")]
        notes: Vec<String>,
    }

    fn sample(value: Value) -> Sample {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_placeholders_become_none() {
        let s = sample(json!({"name": "N/A", "amount": "unknown", "risk": "Not Provided"}));
        assert_eq!(s.name, None);
        assert_eq!(s.amount, None);
        assert_eq!(s.risk, None);
    }

    #[test]
    fn test_currency_strings_are_amounts() {
        assert_eq!(sample(json!({"amount": "$1,500.00"})).amount, Some(1500.0));
        assert_eq!(sample(json!({"amount": "USD 2500"})).amount, Some(2500.0));
        assert_eq!(sample(json!({"amount": 99.5})).amount, Some(99.5));
    }

    #[test]
    fn test_numbers_and_labels_are_forgiving() {
        let s = sample(json!({"score": "85%", "risk": "HIGH", "name": 1234}));
        assert_eq!(s.score, Some(85.0));
        assert_eq!(s.risk, Some(RiskLevel::High));
        assert_eq!(s.name.as_deref(), Some("1234"));

        assert_eq!(sample(json!({"risk": "apocalyptic"})).risk, None);
    }

    #[test]
    fn test_text_lists_accept_many_shapes() {
        assert_eq!(sample(json!({"notes": "single"})).notes, vec!["single"]);
        assert!(sample(json!({"notes": null})).notes.is_empty());
        assert_eq!(
            sample(json!({"notes": [{"action": "Call claimant"}, "Photos", 3]})).notes,
            vec!["Call claimant", "Photos", "3"]
        );
    }
}
