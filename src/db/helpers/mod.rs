use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use crate::db::models::EventKind;

/// Fixed-width RFC 3339 so that text ordering in SQLite matches time ordering.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time at the precision timestamps are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn to_u8(value: i64, field: &str) -> Result<u8> {
    u8::try_from(value).map_err(|_| anyhow!("{field} contains out-of-range value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_event_kind(value: &str) -> Result<EventKind> {
    match value {
        "focus" => Ok(EventKind::Focus),
        "distraction" => Ok(EventKind::Distraction),
        other => Err(anyhow!("unknown event kind {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formatted_timestamps_sort_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 5).unwrap();
        let later = earlier + chrono::Duration::microseconds(120);

        let (a, b) = (format_datetime(&earlier), format_datetime(&later));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_datetime(&b, "t").unwrap(), later);
    }

    #[test]
    fn now_survives_a_storage_round_trip() {
        let stamp = now();
        assert_eq!(parse_datetime(&format_datetime(&stamp), "t").unwrap(), stamp);
    }

    #[test]
    fn rejects_unknown_kind_and_out_of_range_score() {
        assert!(parse_event_kind("idle").is_err());
        assert!(to_u8(-1, "focus_score").is_err());
        assert_eq!(to_u8(67, "focus_score").unwrap(), 67);
    }
}
