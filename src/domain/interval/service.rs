use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::config::IntervalEnv;
use crate::errors::TracerError;

/// Fixed civil zone for all interval input and timestamp rendering.
/// UTC+3:30, no daylight-saving transitions.
const TEHRAN_OFFSET_SECONDS: i32 = 3 * 3600 + 30 * 60;

/// Suffix appended to every rendered display timestamp.
const TEHRAN_DISPLAY_SUFFIX: &str = " +0330/Tehran";

pub fn tehran() -> FixedOffset {
    FixedOffset::east_opt(TEHRAN_OFFSET_SECONDS).expect("UTC+03:30 is a valid fixed offset")
}

/// Interpret a naive wall-clock reading as Tehran local time.
fn at_tehran(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    let offset = tehran();
    DateTime::from_naive_utc_and_offset(naive - offset, offset)
}

/// Render an instant as the canonical display form,
/// e.g. `2024-02-20 10:00:00 +0330/Tehran`.
pub fn format_timestamp_tehran(dt: DateTime<Utc>) -> String {
    format!(
        "{}{}",
        dt.with_timezone(&tehran()).format("%Y-%m-%d %H:%M:%S"),
        TEHRAN_DISPLAY_SUFFIX
    )
}

/// Parse a rendered display timestamp back into an instant. Returns
/// `None` for anything that is not in the canonical form.
pub fn parse_display_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    let cleaned = s.trim().replace(TEHRAN_DISPLAY_SUFFIX, "");
    NaiveDateTime::parse_from_str(cleaned.trim(), "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(at_tehran)
}

/// Interval metadata carried verbatim into the output document.
#[derive(Debug, Clone, Serialize)]
pub struct IntervalMetadata {
    pub from_asia_tehran: String,
    pub to_asia_tehran: String,
    pub from_utc: String,
    pub to_utc: String,
}

/// A validated time interval: both endpoints in Tehran local time plus
/// their UTC equivalents. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct ResolvedInterval {
    pub from_local: DateTime<FixedOffset>,
    pub to_local: DateTime<FixedOffset>,
    pub from_utc: DateTime<Utc>,
    pub to_utc: DateTime<Utc>,
}

impl ResolvedInterval {
    fn new(
        from_local: DateTime<FixedOffset>,
        to_local: DateTime<FixedOffset>,
    ) -> Result<Self, TracerError> {
        if from_local >= to_local {
            return Err(TracerError::InvalidRange);
        }
        Ok(Self {
            from_local,
            to_local,
            from_utc: from_local.with_timezone(&Utc),
            to_utc: to_local.with_timezone(&Utc),
        })
    }

    pub fn metadata(&self) -> IntervalMetadata {
        IntervalMetadata {
            from_asia_tehran: self.from_local.format("%Y-%m-%dT%H:%M:%S%.6f%z").to_string(),
            to_asia_tehran: self.to_local.format("%Y-%m-%dT%H:%M:%S%.6f%z").to_string(),
            from_utc: self.from_utc.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            to_utc: self.to_utc.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
        }
    }
}

/// Resolve an interval from explicit command-line overrides.
pub fn resolve_explicit(from_raw: &str, to_raw: &str) -> Result<ResolvedInterval, TracerError> {
    ResolvedInterval::new(parse_flexible(from_raw)?, parse_flexible(to_raw)?)
}

/// Resolve an interval from the configured defaults.
pub fn resolve_from_config(env: &IntervalEnv) -> Result<ResolvedInterval, TracerError> {
    if env.start_date.is_empty() || env.end_date.is_empty() {
        return Err(TracerError::Configuration(
            "set START_DATE, START_TIME, END_DATE, END_TIME in .env, or use --from and --to"
                .into(),
        ));
    }
    ResolvedInterval::new(
        parse_date_time(&env.start_date, &env.start_time)?,
        parse_date_time(&env.end_date, &env.end_time)?,
    )
}

/// Parse a date plus a time-of-day (`HH:MM` or `HH:MM:SS`) as Tehran
/// local time.
fn parse_date_time(date: &str, time: &str) -> Result<DateTime<FixedOffset>, TracerError> {
    let combined = format!("{} {}", date.trim(), time.trim());
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&combined, fmt) {
            return Ok(at_tehran(naive));
        }
    }
    Err(TracerError::InvalidFormat {
        what: "date/time",
        value: combined,
    })
}

/// Parse an explicit override datetime. ISO-8601 variants and plain
/// date forms are accepted; a trailing `Z` or `+hh:mm` suffix is
/// stripped and the value is interpreted as Tehran local time.
fn parse_flexible(raw: &str) -> Result<DateTime<FixedOffset>, TracerError> {
    let cleaned = raw.trim().trim_end_matches('Z');
    let cleaned = cleaned.split('+').next().unwrap_or_default().trim();

    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(cleaned, fmt) {
            return Ok(at_tehran(naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(cleaned, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(at_tehran(naive));
        }
    }
    Err(TracerError::InvalidFormat {
        what: "datetime",
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval_env(start_date: &str, start_time: &str, end_date: &str, end_time: &str) -> IntervalEnv {
        IntervalEnv {
            start_date: start_date.into(),
            start_time: start_time.into(),
            end_date: end_date.into(),
            end_time: end_time.into(),
        }
    }

    #[test]
    fn tehran_interval_maps_to_utc_minus_3_30() {
        let env = interval_env("2024-02-20", "10:00", "2024-02-20", "18:00");
        let interval = resolve_from_config(&env).unwrap();
        let meta = interval.metadata();
        assert_eq!(meta.from_utc, "2024-02-20T06:30:00.000000Z");
        assert_eq!(meta.to_utc, "2024-02-20T14:30:00.000000Z");
        assert_eq!(meta.from_asia_tehran, "2024-02-20T10:00:00.000000+0330");
        assert_eq!(meta.to_asia_tehran, "2024-02-20T18:00:00.000000+0330");
    }

    #[test]
    fn inverted_or_empty_range_is_rejected() {
        let inverted = interval_env("2024-02-21", "10:00", "2024-02-20", "10:00");
        assert!(matches!(
            resolve_from_config(&inverted),
            Err(TracerError::InvalidRange)
        ));

        let empty = interval_env("2024-02-20", "10:00", "2024-02-20", "10:00");
        assert!(matches!(
            resolve_from_config(&empty),
            Err(TracerError::InvalidRange)
        ));
    }

    #[test]
    fn missing_dates_are_a_configuration_error() {
        let env = interval_env("", "10:00", "2024-02-20", "18:00");
        assert!(matches!(
            resolve_from_config(&env),
            Err(TracerError::Configuration(_))
        ));
    }

    #[test]
    fn seconds_in_time_of_day_are_accepted() {
        let env = interval_env("2024-02-20", "10:00:30", "2024-02-20", "18:00");
        let interval = resolve_from_config(&env).unwrap();
        assert_eq!(interval.metadata().from_utc, "2024-02-20T06:30:30.000000Z");
    }

    #[test]
    fn explicit_overrides_accept_flexible_formats() {
        for raw in [
            "2024-02-20T10:00:00",
            "2024-02-20T10:00:00.000",
            "2024-02-20 10:00:00",
            "2024-02-20 10:00",
            "2024-02-20T10:00:00Z",
            "2024-02-20T10:00:00+03:30",
        ] {
            let interval = resolve_explicit(raw, "2024-02-21 00:00").unwrap();
            assert_eq!(
                interval.metadata().from_utc,
                "2024-02-20T06:30:00.000000Z",
                "input {raw:?}"
            );
        }

        let date_only = resolve_explicit("2024-02-20", "2024-02-21").unwrap();
        assert_eq!(date_only.metadata().from_utc, "2024-02-19T20:30:00.000000Z");
    }

    #[test]
    fn unparseable_override_is_invalid_format() {
        assert!(matches!(
            resolve_explicit("20/02/2024", "2024-02-21"),
            Err(TracerError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn display_timestamp_round_trip() {
        let rendered = format_timestamp_tehran("2024-02-20T06:30:00Z".parse().unwrap());
        assert_eq!(rendered, "2024-02-20 10:00:00 +0330/Tehran");

        let parsed = parse_display_timestamp(&rendered).unwrap();
        assert_eq!(parsed.with_timezone(&Utc).timestamp(), 1708410600);

        assert!(parse_display_timestamp("not a timestamp").is_none());
        assert!(parse_display_timestamp("").is_none());
    }
}
