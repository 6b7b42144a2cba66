//! Fight-duration tokens as they appear in game text ("1:23.40", "45", "1:02:03").

use std::time::Duration;

use serde::Serializer;

/// Parse a `[h:]m:ss[.ff]` token into a duration.
///
/// Fractional seconds are read as a decimal fraction, so "23.4" and "23.40"
/// are the same duration. Tokens too large to represent give `None`.
pub fn parse_time(token: &str) -> Option<Duration> {
    let token = token.trim().trim_end_matches('.');
    if token.is_empty() {
        return None;
    }

    let mut parts = token.rsplit(':');
    let seconds_part = parts.next()?;
    let (whole, fraction) = match seconds_part.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (seconds_part, ""),
    };

    let mut millis: u64 = whole.parse::<u64>().ok()?.checked_mul(1000)?;
    if !fraction.is_empty() {
        if !fraction.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let padded: String = fraction.chars().chain("000".chars()).take(3).collect();
        millis = millis.checked_add(padded.parse::<u64>().ok()?)?;
    }

    let mut multiplier: u64 = 60_000;
    for unit in parts {
        let unit_millis = unit.parse::<u64>().ok()?.checked_mul(multiplier)?;
        millis = millis.checked_add(unit_millis)?;
        multiplier = multiplier.checked_mul(60)?;
    }

    Some(Duration::from_millis(millis))
}

/// Render a duration for message templates; `precise` keeps hundredths.
pub fn format_time(duration: Option<Duration>, precise: bool) -> String {
    let Some(duration) = duration else {
        return String::new();
    };

    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let hundredths = duration.subsec_millis() / 10;

    let mut out = if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    };
    if precise {
        out.push_str(&format!(".{:02}", hundredths));
    }
    out
}

/// ISO-8601 duration ("PT1M23.4S"), the form downstream consumers expect.
pub fn to_iso(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = duration.subsec_millis();

    if total_secs == 0 && millis == 0 {
        return "PT0S".to_string();
    }

    let mut out = String::from("PT");
    if hours > 0 {
        out.push_str(&format!("{}H", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}M", minutes));
    }
    if seconds > 0 || millis > 0 {
        out.push_str(&seconds.to_string());
        if millis > 0 {
            let fraction = format!("{:03}", millis);
            out.push('.');
            out.push_str(fraction.trim_end_matches('0'));
        }
        out.push('S');
    }
    out
}

pub fn serialize_iso_opt<S: Serializer>(
    value: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(duration) => serializer.serialize_str(&to_iso(*duration)),
        None => serializer.serialize_none(),
    }
}
