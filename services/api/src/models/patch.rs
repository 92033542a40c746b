//! Deserialisation helpers for partial updates
//!
//! Profile updates follow a truthy-merge rule: a blank string, an empty list
//! or the number zero means "not provided" and leaves the stored value alone.
//! Nullable timeline fields use `Option<Option<T>>` so an explicit `null`
//! (clear) can be told apart from an omitted field (keep).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, de::Error as _};

/// Trimmed string, `None` when blank.
pub fn truthy(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn truthy_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(truthy)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Number(serde_json::Number),
}

/// Free text or a number; `0` counts as not provided.
pub fn truthy_text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<TextOrNumber>::deserialize(deserializer)?;
    Ok(match value {
        Some(TextOrNumber::Text(text)) => truthy(Some(text)),
        Some(TextOrNumber::Number(number)) if number.as_f64() == Some(0.0) => None,
        Some(TextOrNumber::Number(number)) => Some(number.to_string()),
        None => None,
    })
}

/// A number, a numeric string as sent by form inputs, or blank/null for
/// not provided.
pub fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<TextOrNumber>::deserialize(deserializer)? {
        Some(TextOrNumber::Number(number)) => number
            .as_f64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid number: {}", number))),
        Some(TextOrNumber::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid number: {}", text)))
        }
        None => Ok(None),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrCsv {
    List(Vec<String>),
    Csv(String),
}

/// Split, trim and drop blank items.
pub fn normalize_list<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| item.as_ref().trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// A list of strings or one comma-separated string; empty means not provided.
pub fn truthy_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Option::<ListOrCsv>::deserialize(deserializer)? {
        Some(ListOrCsv::List(items)) => normalize_list(items),
        Some(ListOrCsv::Csv(text)) => normalize_list(text.split(',')),
        None => return Ok(None),
    };
    Ok(Some(items).filter(|items| !items.is_empty()))
}

/// Wrap whatever is present (including `null`) in `Some`, so that together
/// with `#[serde(default)]` an omitted field stays `None`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Accept RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_datetime(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("Invalid date: {}", value))
}

pub fn datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_datetime(&text).map_err(D::Error::custom)
}

pub fn nullable_datetime<'de, D>(deserializer: D) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(text) => parse_datetime(&text).map(|d| Some(Some(d))).map_err(D::Error::custom),
        None => Ok(Some(None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Form {
        #[serde(default, deserialize_with = "truthy_string")]
        text: Option<String>,
        #[serde(default, deserialize_with = "truthy_text_or_number")]
        size: Option<String>,
        #[serde(default, deserialize_with = "truthy_list")]
        list: Option<Vec<String>>,
        #[serde(default, deserialize_with = "nullable")]
        note: Option<Option<String>>,
        #[serde(default, deserialize_with = "lenient_number")]
        reading: Option<f64>,
    }

    fn form(json: &str) -> Form {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_blank_values_count_as_absent() {
        let p = form(r#"{"text": "   ", "size": 0, "list": []}"#);
        assert_eq!(p.text, None);
        assert_eq!(p.size, None);
        assert_eq!(p.list, None);
    }

    #[test]
    fn test_values_are_trimmed() {
        let p = form(r#"{"text": " Nashik ", "size": 12.5, "list": " wheat, rice ,,"}"#);
        assert_eq!(p.text.as_deref(), Some("Nashik"));
        assert_eq!(p.size.as_deref(), Some("12.5"));
        assert_eq!(p.list, Some(vec!["wheat".to_string(), "rice".to_string()]));
    }

    #[test]
    fn test_nullable_tells_null_from_missing() {
        assert_eq!(form(r#"{}"#).note, None);
        assert_eq!(form(r#"{"note": null}"#).note, Some(None));
        assert_eq!(
            form(r#"{"note": "x"}"#).note,
            Some(Some("x".to_string()))
        );
    }

    #[test]
    fn test_lenient_number_accepts_form_values() {
        assert_eq!(form(r#"{"reading": 27.5}"#).reading, Some(27.5));
        assert_eq!(form(r#"{"reading": " 27.5 "}"#).reading, Some(27.5));
        assert_eq!(form(r#"{"reading": ""}"#).reading, None);
        assert_eq!(form(r#"{"reading": null}"#).reading, None);
        assert_eq!(form(r#"{}"#).reading, None);

        assert!(serde_json::from_str::<Form>(r#"{"reading": "warm"}"#).is_err());
        assert!(serde_json::from_str::<Form>(r#"{"reading": [1]}"#).is_err());
    }

    #[test]
    fn test_parse_datetime_formats() {
        let date = parse_datetime("2024-06-15").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 6, 15));
        assert_eq!(date.hour(), 0);

        let stamp = parse_datetime("2024-06-15T10:30:00+05:30").unwrap();
        assert_eq!(stamp.hour(), 5);

        assert!(parse_datetime("15/06/2024").is_err());
    }
}
