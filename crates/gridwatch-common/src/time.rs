//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Shared primitives and utilities for the polling client."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::NaiveDateTime;

const SERVER_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Convert a duration into milliseconds, saturating at `u64::MAX`.
pub fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Render a server `lastSeen` value for display.
///
/// Server timestamps such as `2024-05-01 14:03:22` collapse to their time part. Anything
/// that is not a recognised timestamp falls back to the text after the first space, or the
/// raw value when there is none. Display only; nothing here judges staleness.
pub fn display_last_seen(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    for format in SERVER_TIMESTAMP_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return parsed.format("%H:%M:%S").to_string();
        }
    }
    match trimmed.split_once(' ') {
        Some((_, time)) if !time.is_empty() => time.to_owned(),
        _ => trimmed.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_seen_shows_time_part() {
        assert_eq!(display_last_seen("2024-05-01 14:03:22"), "14:03:22");
        assert_eq!(display_last_seen("2024-05-01 14:03:22.0"), "14:03:22");
        assert_eq!(display_last_seen("2024-05-01T09:00:01"), "09:00:01");
    }

    #[test]
    fn last_seen_falls_back_to_raw_text() {
        assert_eq!(display_last_seen(""), "");
        assert_eq!(display_last_seen("yesterday"), "yesterday");
        assert_eq!(display_last_seen("day two"), "two");
    }

    #[test]
    fn millis_saturate() {
        assert_eq!(duration_to_millis(Duration::from_millis(1_500)), 1_500);
        assert_eq!(duration_to_millis(Duration::MAX), u64::MAX);
    }
}
