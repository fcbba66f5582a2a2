// libs/shared/utils/src/time.rs
//
// Conversion between the platform's 12-hour slot labels ("10:30 AM") and
// 24-hour (hour, minute) pairs. Pure functions, no I/O.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

/// Fallback used when a slot label cannot be parsed. Callers treat this as a
/// degraded default, not a hard failure.
pub const FALLBACK_TIME: (u32, u32) = (9, 0);

fn slot_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*(\d{1,2}):(\d{2})\s*(AM|PM)\s*$").unwrap())
}

/// Strict parse of a `H:MM AM|PM` label into a 24-hour (hour, minute) pair.
///
/// 12 AM maps to hour 0, 12 PM stays 12, PM hours 1-11 add 12. Returns `None`
/// for anything that does not match the pattern or is out of range.
pub fn try_parse_time_of_day(label: &str) -> Option<(u32, u32)> {
    let caps = slot_label_regex().captures(label)?;

    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    if hour < 1 || hour > 12 || minute > 59 {
        return None;
    }

    let meridiem = caps[3].to_ascii_uppercase();
    let hour24 = match (meridiem.as_str(), hour) {
        ("AM", 12) => 0,
        ("AM", h) => h,
        ("PM", 12) => 12,
        ("PM", h) => h + 12,
        _ => return None,
    };

    Some((hour24, minute))
}

/// Lenient parse used on the reminder path: malformed labels fall back to
/// `FALLBACK_TIME` with a warning instead of failing the whole job.
pub fn parse_time_of_day(label: &str) -> (u32, u32) {
    match try_parse_time_of_day(label) {
        Some(parsed) => parsed,
        None => {
            warn!("Unparseable time-of-day label {:?}, falling back to {:?}", label, FALLBACK_TIME);
            FALLBACK_TIME
        }
    }
}

/// Format a 24-hour (hour, minute) pair as the canonical 12-hour slot label.
/// Round-trips through `try_parse_time_of_day`.
pub fn format_time_of_day(hour: u32, minute: u32) -> String {
    let (display_hour, meridiem) = match hour {
        0 => (12, "AM"),
        1..=11 => (hour, "AM"),
        12 => (12, "PM"),
        _ => (hour - 12, "PM"),
    };
    format!("{}:{:02} {}", display_hour, minute, meridiem)
}
