use serde::de::Error;
use serde::{Deserialize, Deserializer};

use crate::model::ModelError;

/// parses an optional numeric field. blank input is `None`; anything else must parse
/// to a finite number.
pub fn parse_optional_f64(field: &str, value: &str) -> Result<Option<f64>, ModelError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let parsed = trimmed
        .parse::<f64>()
        .map_err(|e| ModelError::NumericParse {
            field: field.to_string(),
            value: value.to_string(),
            message: e.to_string(),
        })?;
    if !parsed.is_finite() {
        return Err(ModelError::NumericParse {
            field: field.to_string(),
            value: value.to_string(),
            message: String::from("value is not finite"),
        });
    }
    Ok(Some(parsed))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// deserializes an optional number written either as a number or as text, so that
/// csv and json inputs share one representation.
pub fn deserialize_optional_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<NumberOrText> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => parse_optional_f64("numeric", &n.to_string())
            .map_err(|e| D::Error::custom(e.to_string())),
        Some(NumberOrText::Text(s)) => {
            parse_optional_f64("numeric", &s).map_err(|e| D::Error::custom(e.to_string()))
        }
    }
}
