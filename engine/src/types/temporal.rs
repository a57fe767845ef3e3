//! Date, date-time and time parsing and rendering.
//!
//! Canonical renderings are ISO 8601 (`2024-01-15`, `2024-01-15T14:30:00+01:00`,
//! `14:30:00`). Free-form input goes through [`parse_heuristic`], which tries a
//! fixed list of patterns and keeps the first one that matches.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ConversionError, ConversionResult};
use crate::types::locale::LocaleInfo;

pub const CANONICAL_DATE: &str = "%Y-%m-%d";
pub const CANONICAL_DATE_TIME: &str = "%Y-%m-%dT%H:%M:%S%:z";
pub const CANONICAL_TIME: &str = "%H:%M:%S";

/// Which temporal shape a string format expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalKind {
    Date,
    DateTime,
    Time,
}

impl TemporalKind {
    pub fn name(self) -> &'static str {
        match self {
            TemporalKind::Date => "date",
            TemporalKind::DateTime => "date-time",
            TemporalKind::Time => "time",
        }
    }
}

/// A parsed point in time.
///
/// Pure dates and times float: they carry no timezone and are never shifted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Moment {
    Date(NaiveDate),
    DateTime(DateTime<Tz>),
    Time(NaiveTime),
}

/// Resolve an IANA timezone name. An empty name means UTC.
pub fn time_zone(name: &str) -> ConversionResult<Tz> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(Tz::UTC);
    }
    name.parse::<Tz>()
        .map_err(|_| ConversionError::InvalidTimeZone(name.to_string()))
}

fn localize(naive: NaiveDateTime, tz: Tz) -> DateTime<Tz> {
    tz.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    Zoned,
    Naive,
    Date,
    Time,
}

fn try_pattern(input: &str, pattern: &str, shape: Shape, tz: Tz) -> Option<Moment> {
    match shape {
        Shape::Zoned => DateTime::parse_from_str(input, pattern)
            .ok()
            .map(|dt| Moment::DateTime(dt.with_timezone(&tz))),
        Shape::Naive => NaiveDateTime::parse_from_str(input, pattern)
            .ok()
            .map(|naive| Moment::DateTime(localize(naive, tz))),
        Shape::Date => NaiveDate::parse_from_str(input, pattern)
            .ok()
            .map(Moment::Date),
        Shape::Time => NaiveTime::parse_from_str(input, pattern)
            .ok()
            .map(Moment::Time),
    }
}

/// Parse a canonical rendering of `kind`.
pub fn parse_canonical(input: &str, kind: TemporalKind, tz: Tz) -> Option<Moment> {
    let input = input.trim();
    match kind {
        TemporalKind::Date => try_pattern(input, CANONICAL_DATE, Shape::Date, tz),
        TemporalKind::DateTime => DateTime::parse_from_rfc3339(input)
            .ok()
            .map(|dt| Moment::DateTime(dt.with_timezone(&tz))),
        TemporalKind::Time => try_pattern(input, "%H:%M:%S%.f", Shape::Time, tz),
    }
}

fn candidates(locale: &LocaleInfo) -> Vec<(String, Shape)> {
    let mut list: Vec<(String, Shape)> = vec![
        ("%Y-%m-%dT%H:%M:%S%.f%z".into(), Shape::Zoned),
        ("%Y-%m-%d %H:%M:%S%.f%z".into(), Shape::Zoned),
        ("%Y-%m-%dT%H:%M:%S%.f".into(), Shape::Naive),
        ("%Y-%m-%d %H:%M:%S%.f".into(), Shape::Naive),
        ("%Y-%m-%dT%H:%M".into(), Shape::Naive),
        ("%Y-%m-%d %H:%M".into(), Shape::Naive),
        (CANONICAL_DATE.into(), Shape::Date),
        ("%H:%M:%S%.f".into(), Shape::Time),
        ("%H:%M".into(), Shape::Time),
    ];

    for date in [locale.short_date, locale.medium_date] {
        for time in [locale.medium_time, locale.short_time] {
            list.push((format!("{date} {time}"), Shape::Naive));
        }
    }
    list.push((locale.short_date.into(), Shape::Date));
    list.push((locale.medium_date.into(), Shape::Date));
    list.push((locale.medium_time.into(), Shape::Time));
    list.push((locale.short_time.into(), Shape::Time));

    for date in [locale.short_date, CANONICAL_DATE] {
        for time in ["%I:%M:%S %p", "%I:%M %p"] {
            list.push((format!("{date} {time}"), Shape::Naive));
        }
    }
    list.push(("%I:%M:%S %p".into(), Shape::Time));
    list.push(("%I:%M %p".into(), Shape::Time));
    list
}

static MERIDIEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*(am|pm)$").expect("meridiem pattern"));

static HOUR_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^:\d])(\d{1,2}) (AM|PM)$").expect("hour pattern"));

/// Rewrite `3pm` / `3 pm` / `10:15pm` into the `3:00 PM` shape `%I:%M %p` accepts.
fn normalize_meridiem(input: &str) -> Option<String> {
    let caps = MERIDIEM.captures(input)?;
    let suffix = caps.get(1)?.as_str().to_uppercase();
    let whole = caps.get(0)?;
    let spaced = format!("{} {}", input[..whole.start()].trim_end(), suffix);

    Some(HOUR_ONLY.replace(&spaced, "${1}${2}:00 ${3}").into_owned())
}

/// Coerce a free-form, possibly localized string to a [`Moment`].
///
/// Naive date-times are interpreted in `tz`.
pub fn parse_heuristic(input: &str, locale: &LocaleInfo, tz: Tz) -> Option<Moment> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(Moment::DateTime(dt.with_timezone(&tz)));
    }

    let list = candidates(locale);
    if let Some(moment) = list
        .iter()
        .find_map(|(pattern, shape)| try_pattern(input, pattern, *shape, tz))
    {
        return Some(moment);
    }

    let normalized = normalize_meridiem(input)?;
    list.iter()
        .find_map(|(pattern, shape)| try_pattern(&normalized, pattern, *shape, tz))
}

/// Reshape a moment to `kind`, shifting zoned values into `tz`.
///
/// Dates become midnight in `source_tz` when a date-time is requested. Times
/// and dates never convert into each other.
pub fn coerce(moment: Moment, kind: TemporalKind, source_tz: Tz, tz: Tz) -> Option<Moment> {
    match (moment, kind) {
        (Moment::Date(d), TemporalKind::Date) => Some(Moment::Date(d)),
        (Moment::Date(d), TemporalKind::DateTime) => Some(Moment::DateTime(
            localize(d.and_time(NaiveTime::MIN), source_tz).with_timezone(&tz),
        )),
        (Moment::DateTime(dt), TemporalKind::Date) => {
            Some(Moment::Date(dt.with_timezone(&tz).date_naive()))
        }
        (Moment::DateTime(dt), TemporalKind::DateTime) => {
            Some(Moment::DateTime(dt.with_timezone(&tz)))
        }
        (Moment::DateTime(dt), TemporalKind::Time) => {
            Some(Moment::Time(dt.with_timezone(&tz).time()))
        }
        (Moment::Time(t), TemporalKind::Time) => Some(Moment::Time(t)),
        (Moment::Time(_), _) | (Moment::Date(_), TemporalKind::Time) => None,
    }
}

/// Render a moment in its canonical ISO form.
pub fn format_canonical(moment: &Moment) -> String {
    match moment {
        Moment::Date(d) => d.format(CANONICAL_DATE).to_string(),
        Moment::DateTime(dt) => dt.format(CANONICAL_DATE_TIME).to_string(),
        Moment::Time(t) => t.format(CANONICAL_TIME).to_string(),
    }
}

/// Render a moment with the locale's SHORT date and MEDIUM time patterns.
pub fn format_local(moment: &Moment, locale: &LocaleInfo) -> String {
    match moment {
        Moment::Date(d) => d.format(locale.short_date).to_string(),
        Moment::DateTime(dt) => dt
            .format(&format!("{} {}", locale.short_date, locale.medium_time))
            .to_string(),
        Moment::Time(t) => t.format(locale.medium_time).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::locale::lookup;

    fn utc() -> Tz {
        Tz::UTC
    }

    #[test]
    fn test_time_zone_lookup() {
        assert_eq!(time_zone("").unwrap(), Tz::UTC);
        assert_eq!(time_zone("Europe/Paris").unwrap(), Tz::Europe__Paris);
        assert!(matches!(
            time_zone("Mars/Olympus"),
            Err(ConversionError::InvalidTimeZone(_))
        ));
    }

    #[test]
    fn test_iso_variants() {
        let locale = lookup("en-US");
        let moment = parse_heuristic("2024-01-15T14:30:00+01:00", locale, utc()).unwrap();
        assert_eq!(format_canonical(&moment), "2024-01-15T13:30:00+00:00");

        let moment = parse_heuristic("2024-01-15 14:30", locale, utc()).unwrap();
        assert_eq!(format_canonical(&moment), "2024-01-15T14:30:00+00:00");

        let moment = parse_heuristic("2024-01-15", locale, utc()).unwrap();
        assert_eq!(moment, Moment::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()));
    }

    #[test]
    fn test_localized_patterns() {
        let moment = parse_heuristic("15/01/2024", lookup("fr-FR"), utc()).unwrap();
        assert_eq!(format_canonical(&moment), "2024-01-15");

        let moment = parse_heuristic("01/15/2024 02:30:00 PM", lookup("en-US"), utc()).unwrap();
        assert_eq!(format_canonical(&moment), "2024-01-15T14:30:00+00:00");

        let moment = parse_heuristic("15.01.2024 14:30", lookup("de-DE"), utc()).unwrap();
        assert_eq!(format_canonical(&moment), "2024-01-15T14:30:00+00:00");
    }

    #[test]
    fn test_meridiem_fallbacks() {
        let locale = lookup("en-US");
        let moment = parse_heuristic("3pm", locale, utc()).unwrap();
        assert_eq!(format_canonical(&moment), "15:00:00");

        let moment = parse_heuristic("10:15 am", locale, utc()).unwrap();
        assert_eq!(format_canonical(&moment), "10:15:00");

        assert!(parse_heuristic("not a date", locale, utc()).is_none());
    }

    #[test]
    fn test_normalize_meridiem() {
        assert_eq!(normalize_meridiem("3 pm").as_deref(), Some("3:00 PM"));
        assert_eq!(normalize_meridiem("10:15pm").as_deref(), Some("10:15 PM"));
        assert_eq!(normalize_meridiem("15:00"), None);
    }

    #[test]
    fn test_naive_values_use_source_zone() {
        let paris = time_zone("Europe/Paris").unwrap();
        let moment = parse_heuristic("2024-01-15 14:30:00", lookup("en-US"), paris).unwrap();
        let moment = coerce(moment, TemporalKind::DateTime, paris, utc()).unwrap();
        assert_eq!(format_canonical(&moment), "2024-01-15T13:30:00+00:00");
    }

    #[test]
    fn test_coerce_rejects_time_to_date() {
        let time = Moment::Time(NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert!(coerce(time, TemporalKind::Date, utc(), utc()).is_none());
        let date = Moment::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert!(coerce(date, TemporalKind::Time, utc(), utc()).is_none());
    }

    #[test]
    fn test_format_local() {
        let moment = parse_canonical("2024-01-15T14:30:00+00:00", TemporalKind::DateTime, utc())
            .unwrap();
        assert_eq!(format_local(&moment, lookup("en-US")), "01/15/2024 02:30:00 PM");
        assert_eq!(format_local(&moment, lookup("de-DE")), "15.01.2024 14:30:00");
    }
}
