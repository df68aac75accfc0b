//! Snapshot format and storage
//!
//! A snapshot is the serializable copy of one exchange. Field names are
//! PascalCase on disk and absent sections are written as `null`.

use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cookie::Cookie;
use crate::error::{Error, Result};
use crate::parameter::Parameter;

/// Start and end of an exchange, plus the elapsed time between them
///
/// Elapsed is derived, never stored independently: it exists only when both
/// bounds do. Deserializing recomputes it from the bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", from = "DurationBounds")]
pub struct DurationData {
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    #[serde(serialize_with = "elapsed_format::serialize")]
    duration: Option<TimeDelta>,
}

impl DurationData {
    pub fn new(start_time: Option<DateTime<Utc>>, end_time: Option<DateTime<Utc>>) -> Self {
        let duration = match (start_time, end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        };
        Self {
            start_time,
            end_time,
            duration,
        }
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn elapsed(&self) -> Option<TimeDelta> {
        self.duration
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DurationBounds {
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

impl From<DurationBounds> for DurationData {
    fn from(bounds: DurationBounds) -> Self {
        Self::new(bounds.start_time, bounds.end_time)
    }
}

/// The request side of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestData {
    pub method: String,
    /// Absolute URI the request resolves to
    pub uri: Url,
    pub resource: String,
    pub parameters: Vec<Parameter>,
}

/// The response side of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseData {
    pub uri: Url,
    pub status_code: u16,
    pub error_message: Option<String>,
    pub content: String,
    pub headers: Vec<Parameter>,
}

/// Everything observable about one exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExchangeSnapshot {
    pub duration: DurationData,
    pub request: Option<RequestData>,
    pub response: Option<ResponseData>,
    pub cookies: Vec<Cookie>,
}

impl ExchangeSnapshot {
    /// Indented JSON, as written to disk
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Load a snapshot from a file
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<ExchangeSnapshot> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let snapshot: ExchangeSnapshot = serde_json::from_str(&content)?;
    Ok(snapshot)
}

/// Save a snapshot to a file, replacing any existing content
///
/// The JSON is rendered before the file is opened, so a serialization
/// failure leaves the destination untouched.
pub fn save_snapshot(snapshot: &ExchangeSnapshot, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let content = snapshot.to_json_pretty()?;
    std::fs::write(path, content).map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Elapsed time as `[-][d.]hh:mm:ss[.fffffff]`
///
/// Seven fractional digits (100ns ticks), dropped entirely when zero.
pub mod elapsed_format {
    use chrono::TimeDelta;
    use serde::Serializer;

    const TICK_NANOS: u32 = 100;

    pub fn format(delta: TimeDelta) -> String {
        let sign = if delta < TimeDelta::zero() { "-" } else { "" };
        let delta = delta.abs();
        let secs = delta.num_seconds();
        let ticks = delta.subsec_nanos().unsigned_abs() / TICK_NANOS;

        let days = secs / 86_400;
        let hours = (secs % 86_400) / 3_600;
        let minutes = (secs % 3_600) / 60;
        let seconds = secs % 60;

        let mut out = String::from(sign);
        if days > 0 {
            out.push_str(&format!("{days}."));
        }
        out.push_str(&format!("{hours:02}:{minutes:02}:{seconds:02}"));
        if ticks > 0 {
            out.push_str(&format!(".{ticks:07}"));
        }
        out
    }

    /// Parse an elapsed value back out of a written snapshot file
    ///
    /// For consumers reading the output file directly. Loading a snapshot
    /// ignores the stored text and recomputes elapsed from the bounds.
    pub fn parse(text: &str) -> Option<TimeDelta> {
        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let mut fields = body.split(':');
        let (days_hours, minutes, rest) = (fields.next()?, fields.next()?, fields.next()?);
        if fields.next().is_some() {
            return None;
        }

        let (days, hours) = match days_hours.split_once('.') {
            Some((d, h)) => (d.parse::<i64>().ok()?, h.parse::<i64>().ok()?),
            None => (0, days_hours.parse::<i64>().ok()?),
        };
        let minutes = minutes.parse::<i64>().ok()?;
        let (seconds, fraction) = match rest.split_once('.') {
            Some((s, f)) => (s, f),
            None => (rest, ""),
        };
        let seconds = seconds.parse::<i64>().ok()?;

        if days < 0
            || !(0..24).contains(&hours)
            || !(0..60).contains(&minutes)
            || !(0..60).contains(&seconds)
        {
            return None;
        }
        if fraction.len() > 7 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let ticks = if fraction.is_empty() {
            0
        } else {
            format!("{fraction:0<7}").parse::<i64>().ok()?
        };

        let total = days
            .checked_mul(86_400)?
            .checked_add(hours * 3_600 + minutes * 60 + seconds)?;
        let delta = TimeDelta::try_seconds(total)?
            .checked_add(&TimeDelta::nanoseconds(ticks * i64::from(TICK_NANOS)))?;

        Some(if negative { -delta } else { delta })
    }

    pub fn serialize<S: Serializer>(
        value: &Option<TimeDelta>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(delta) => serializer.serialize_str(&format(*delta)),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::ParameterKind;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(secs: u32, millis: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, secs).unwrap()
            + TimeDelta::milliseconds(millis.into())
    }

    #[test]
    fn test_duration_requires_both_bounds() {
        assert_eq!(DurationData::new(Some(at(0, 0)), None).elapsed(), None);
        assert_eq!(DurationData::new(None, Some(at(0, 0))).elapsed(), None);
        assert_eq!(DurationData::new(None, None).elapsed(), None);
        assert_eq!(
            DurationData::new(Some(at(1, 0)), Some(at(2, 250))).elapsed(),
            Some(TimeDelta::milliseconds(1_250))
        );
    }

    #[test]
    fn test_duration_json_shape() {
        let value =
            serde_json::to_value(DurationData::new(Some(at(1, 0)), Some(at(2, 250)))).unwrap();
        assert_eq!(value["Duration"], json!("00:00:01.2500000"));
        assert!(value["StartTime"].is_string());

        let value = serde_json::to_value(DurationData::new(None, Some(at(0, 0)))).unwrap();
        assert_eq!(value["StartTime"], json!(null));
        assert_eq!(value["Duration"], json!(null));
    }

    #[test]
    fn test_duration_recomputed_on_load() {
        let text = r#"{
            "StartTime": "2024-06-01T12:00:00Z",
            "EndTime": "2024-06-01T12:00:03Z",
            "Duration": "99:00:00"
        }"#;
        let data: DurationData = serde_json::from_str(text).unwrap();
        assert_eq!(data.elapsed(), Some(TimeDelta::seconds(3)));
    }

    #[test]
    fn test_elapsed_format() {
        assert_eq!(elapsed_format::format(TimeDelta::zero()), "00:00:00");
        assert_eq!(
            elapsed_format::format(TimeDelta::milliseconds(1_500)),
            "00:00:01.5000000"
        );
        assert_eq!(elapsed_format::format(TimeDelta::microseconds(1)), "00:00:00.0000010");
        let delta = TimeDelta::days(2) + TimeDelta::hours(3) + TimeDelta::minutes(4);
        assert_eq!(elapsed_format::format(delta), "2.03:04:00");
        assert_eq!(elapsed_format::format(-TimeDelta::seconds(5)), "-00:00:05");
    }

    #[test]
    fn test_elapsed_parse() {
        assert_eq!(elapsed_format::parse("00:00:01.25"), Some(TimeDelta::milliseconds(1_250)));
        assert_eq!(elapsed_format::parse("1.02:00:00"), Some(TimeDelta::hours(26)));
        assert_eq!(elapsed_format::parse("-00:01:00"), Some(-TimeDelta::minutes(1)));
        assert_eq!(elapsed_format::parse("00:60:00"), None);
        assert_eq!(elapsed_format::parse("00:00"), None);
        assert_eq!(elapsed_format::parse("00:00:00.12345678"), None);
        assert_eq!(elapsed_format::parse("garbage"), None);
    }

    #[test]
    fn test_elapsed_format_parse_agree() {
        for delta in [
            TimeDelta::zero(),
            TimeDelta::milliseconds(42),
            TimeDelta::seconds(86_399),
            TimeDelta::days(3) + TimeDelta::nanoseconds(700),
            -TimeDelta::milliseconds(1_001),
        ] {
            assert_eq!(elapsed_format::parse(&elapsed_format::format(delta)), Some(delta));
        }
    }

    #[test]
    fn test_absent_sections_are_null() {
        let snapshot = ExchangeSnapshot {
            duration: DurationData::new(None, None),
            request: None,
            response: None,
            cookies: vec![],
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["Request"], json!(null));
        assert_eq!(value["Response"], json!(null));
        assert_eq!(value["Cookies"], json!([]));
        assert!(value["Duration"].is_object());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exchange.json");
        let snapshot = ExchangeSnapshot {
            duration: DurationData::new(Some(at(0, 0)), Some(at(0, 120))),
            request: Some(RequestData {
                method: "GET".to_string(),
                uri: Url::parse("https://api.example.com/users?page=2").unwrap(),
                resource: "/users".to_string(),
                parameters: vec![Parameter::new("page", 2i64, ParameterKind::QueryString)],
            }),
            response: None,
            cookies: vec![],
        };

        save_snapshot(&snapshot, &path).unwrap();
        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_snapshot(dir.path().join("nope.json")).unwrap_err();
        assert_eq!(err.io_kind(), Some(std::io::ErrorKind::NotFound));
    }
}
