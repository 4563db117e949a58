//! Form field parsing and the wire formats shared by record kinds.
//!
//! Dates travel as `YYYY-MM-DD`, times as `HH:MM`, and an unset optional date
//! is stored as an empty string.

use chrono::{NaiveDate, NaiveTime, Timelike};

use crate::error::{Error, Result};

/// Date format used on forms and in stored documents.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Time format used on forms and in stored documents.
pub const TIME_FORMAT: &str = "%H:%M";

/// Trim a mandatory text field, rejecting blank input.
///
/// # Errors
///
/// Returns a validation error naming `field` when the value is empty after trimming.
pub fn required_text(field: &'static str, raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(field, "is required"));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional text field; absent input becomes an empty string.
#[must_use]
pub fn optional_text(raw: Option<&str>) -> String {
    raw.map(str::trim).unwrap_or_default().to_string()
}

/// Parse a `YYYY-MM-DD` date, falling back to `default` when the input is absent or blank.
///
/// # Errors
///
/// Returns a validation error when the input is present but malformed.
pub fn date_or(field: &'static str, raw: Option<&str>, default: NaiveDate) -> Result<NaiveDate> {
    Ok(optional_date(field, raw)?.unwrap_or(default))
}

/// Parse an optional `YYYY-MM-DD` date. Blank input is `None`.
///
/// # Errors
///
/// Returns a validation error when the input is present but malformed.
pub fn optional_date(field: &'static str, raw: Option<&str>) -> Result<Option<NaiveDate>> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, DATE_FORMAT)
            .map(Some)
            .map_err(|_| Error::validation(field, format!("expected YYYY-MM-DD, got `{value}`"))),
    }
}

/// Parse an `HH:MM` time, falling back to `default` when the input is absent or blank.
///
/// # Errors
///
/// Returns a validation error when the input is present but malformed.
pub fn time_or(field: &'static str, raw: Option<&str>, default: NaiveTime) -> Result<NaiveTime> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(default),
        Some(value) => NaiveTime::parse_from_str(value, TIME_FORMAT)
            .map_err(|_| Error::validation(field, format!("expected HH:MM, got `{value}`"))),
    }
}

/// Truncate a time to whole minutes.
#[must_use]
pub fn to_minute(time: NaiveTime) -> NaiveTime {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}

/// `Option<NaiveDate>` stored as `YYYY-MM-DD`, or `""` when unset.
pub mod blank_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::DATE_FORMAT;

    /// Serialize `None` as an empty string.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.collect_str(&date.format(DATE_FORMAT)),
            None => serializer.serialize_str(""),
        }
    }

    /// Deserialize an empty string, `null`, or a missing value as `None`.
    ///
    /// # Errors
    ///
    /// Fails on a non-empty string that is not a `YYYY-MM-DD` date.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => NaiveDate::parse_from_str(value, DATE_FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// `NaiveTime` stored as `HH:MM`.
pub mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIME_FORMAT;

    /// Serialize as `HH:MM`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(TIME_FORMAT))
    }

    /// Deserialize `HH:MM`, also accepting `HH:MM:SS`.
    ///
    /// # Errors
    ///
    /// Fails when the value is not a time.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text_trims() {
        assert_eq!(required_text("reason", "  Dolor  ").unwrap(), "Dolor");
    }

    #[test]
    fn test_required_text_rejects_blank() {
        let err = required_text("reason", " \t ").unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().starts_with("reason"));
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text(None), "");
        assert_eq!(optional_text(Some("  x ")), "x");
    }

    #[test]
    fn test_optional_date() {
        assert_eq!(optional_date("d", None).unwrap(), None);
        assert_eq!(optional_date("d", Some("  ")).unwrap(), None);
        assert_eq!(
            optional_date("d", Some("2024-03-05")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert!(optional_date("d", Some("05/03/2024")).is_err());
    }

    #[test]
    fn test_date_or_default() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(date_or("d", None, today).unwrap(), today);
    }

    #[test]
    fn test_time_or() {
        let default = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(time_or("t", None, default).unwrap(), default);
        assert_eq!(
            time_or("t", Some("14:30"), default).unwrap(),
            NaiveTime::from_hms_opt(14, 30, 0).unwrap()
        );
        assert!(time_or("t", Some("2pm"), default).is_err());
    }

    #[test]
    fn test_to_minute_drops_seconds() {
        let time = NaiveTime::from_hms_milli_opt(10, 15, 42, 250).unwrap();
        assert_eq!(to_minute(time), NaiveTime::from_hms_opt(10, 15, 0).unwrap());
    }

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Wrapper {
        #[serde(default, with = "blank_date")]
        date: Option<NaiveDate>,
        #[serde(with = "hh_mm")]
        time: NaiveTime,
    }

    #[test]
    fn test_blank_date_and_hh_mm_wire_format() {
        let value = Wrapper {
            date: None,
            time: NaiveTime::from_hms_opt(8, 5, 0).unwrap(),
        };
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["date"], "");
        assert_eq!(json["time"], "08:05");
    }

    #[test]
    fn test_blank_date_accepts_missing_and_null() {
        let parsed: Wrapper = serde_json::from_str(r#"{"time": "08:05:00"}"#).unwrap();
        assert_eq!(parsed.date, None);

        let parsed: Wrapper = serde_json::from_str(r#"{"date": null, "time": "08:05"}"#).unwrap();
        assert_eq!(parsed.date, None);

        let parsed: Wrapper =
            serde_json::from_str(r#"{"date": "2024-02-29", "time": "08:05"}"#).unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2024, 2, 29));
    }
}
