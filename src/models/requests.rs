use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use validator::Validate;

/// Raw search form submission
///
/// Every field arrives as text, exactly as the browser posted it. JSON
/// clients may send numbers and booleans; those are converted to their
/// textual form so the criteria resolver sees one shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SearchRequest {
    #[serde(default, deserialize_with = "lenient_text")]
    pub is_band: Option<String>,
    #[validate(length(min = 1, max = 64))]
    #[serde(default, deserialize_with = "lenient_text")]
    pub instruments: Option<String>,
    #[validate(length(min = 1, max = 64))]
    #[serde(default, deserialize_with = "lenient_text")]
    pub genres: Option<String>,
    #[validate(length(equal = 5, message = "Please enter a valid zip code."))]
    #[serde(default, deserialize_with = "zip_text")]
    pub zip_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub radius: Option<String>,
}

/// Accept strings, numbers and booleans; treat blank strings as absent
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Like `lenient_text`, but numeric zips get their leading zeros back
fn zip_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => match n.as_u64() {
            Some(zip) if zip <= 99_999 => Some(format!("{:05}", zip)),
            _ => Some(n.to_string()),
        },
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}
