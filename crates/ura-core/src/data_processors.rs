use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use regex::Regex;
use tracing::warn;

use crate::models::Cell;

// ── TimestampProcessor ────────────────────────────────────────────────────────

/// Spreadsheet serial of 9999-12-31.
const MAX_SERIAL: f64 = 2_958_465.0;

/// Parses the timestamp shapes found in URA exports into local wall-clock
/// [`NaiveDateTime`] values. No timezone conversion is applied: hour-of-day
/// statistics are reported in the call center's own clock.
pub struct TimestampProcessor;

impl TimestampProcessor {
    /// Parse a textual timestamp.
    ///
    /// Handles the Brazilian `DD/MM/YYYY HH:MM:SS` layout used by the IVR,
    /// ISO 8601 with or without offset (the offset is dropped), and a few
    /// common date-only patterns.
    pub fn parse_str(s: &str) -> Option<NaiveDateTime> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.naive_local());
        }

        const FORMATS: &[&str] = &[
            "%d/%m/%Y %H:%M:%S",
            "%d/%m/%Y %H:%M",
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
        ];
        for fmt in FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(naive);
            }
        }

        const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d"];
        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                return date.and_hms_opt(0, 0, 0);
            }
        }

        warn!(
            "TimestampProcessor: could not parse timestamp string \"{}\"",
            s
        );
        None
    }

    /// Convert a spreadsheet serial date (days since 1899-12-30, fractional
    /// part = time of day) into a timestamp.
    ///
    /// Serials past 9999-12-31 are rejected.
    pub fn from_serial(serial: f64) -> Option<NaiveDateTime> {
        if !serial.is_finite() || !(0.0..=MAX_SERIAL).contains(&serial) {
            return None;
        }
        let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
        let seconds = (serial * 86_400.0).round() as i64;
        epoch.checked_add_signed(Duration::try_seconds(seconds)?)
    }

    /// Parse a spreadsheet cell: numbers are serial dates, text is parsed
    /// with [`TimestampProcessor::parse_str`].
    pub fn parse_cell(cell: &Cell) -> Option<NaiveDateTime> {
        match cell {
            Cell::Empty => None,
            Cell::Number(n) => Self::from_serial(*n),
            Cell::Text(s) => Self::parse_str(s),
        }
    }

    /// Combine a `DATA_REF` date cell with an optional `HORA_REF` time cell.
    ///
    /// The time cell may be a day fraction (`0.5` = noon) or `HH:MM[:SS]` text.
    pub fn combine_date_time(date: &Cell, time: Option<&Cell>) -> Option<NaiveDateTime> {
        let base = Self::parse_cell(date)?;
        let Some(time) = time else {
            return Some(base);
        };
        let offset_seconds = match time {
            Cell::Number(fraction) if (0.0..1.0).contains(fraction) => {
                (fraction * 86_400.0).round() as i64
            }
            Cell::Text(text) => match parse_clock(text) {
                Some(secs) => secs,
                None => return Some(base),
            },
            _ => return Some(base),
        };
        base.checked_add_signed(Duration::try_seconds(offset_seconds)?)
    }
}

/// `HH:MM[:SS]` → seconds since midnight.
fn parse_clock(text: &str) -> Option<i64> {
    const FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];
    let text = text.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
        .map(|time| i64::from(time.num_seconds_from_midnight()))
}

// ── Weekday labels ────────────────────────────────────────────────────────────

/// Portuguese weekday label, as shown in the dashboard.
pub fn weekday_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Domingo",
        Weekday::Mon => "Segunda",
        Weekday::Tue => "Terça",
        Weekday::Wed => "Quarta",
        Weekday::Thu => "Quinta",
        Weekday::Fri => "Sexta",
        Weekday::Sat => "Sábado",
    }
}

/// Weekday label from a spreadsheet day index (`0` = Sunday).
pub fn weekday_from_index(index: u32) -> Option<&'static str> {
    let day = match index {
        0 => Weekday::Sun,
        1 => Weekday::Mon,
        2 => Weekday::Tue,
        3 => Weekday::Wed,
        4 => Weekday::Thu,
        5 => Weekday::Fri,
        6 => Weekday::Sat,
        _ => return None,
    };
    Some(weekday_label(day))
}

// ── Token helpers ─────────────────────────────────────────────────────────────

/// Split a `|`-joined field into trimmed, non-empty tokens.
pub fn split_pipe_values(value: &str) -> Vec<String> {
    value
        .split('|')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// `true` when the token is a finite number (a checkpoint code rather than a
/// flow name).
pub fn is_numeric_token(token: &str) -> bool {
    token
        .trim()
        .parse::<f64>()
        .map(|n| n.is_finite())
        .unwrap_or(false)
}

/// Extract `Tipo_Servico:<value>` from a routing tag such as
/// `"Tipo_Servico:JORNADA_RE_GERAL|Workflow:JORNADA_RE"`.
pub fn extract_service_type(routing_tag: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"Tipo_Servico:([^|]+)").expect("regex is valid"));
    re.captures(routing_tag)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Strip the phone-type annotation from an ANI: `"+5511996261856 (Land Line)"`
/// → `"+5511996261856"`.
pub fn clean_ani(raw: &str) -> String {
    raw.split('(').next().unwrap_or_default().trim().to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
