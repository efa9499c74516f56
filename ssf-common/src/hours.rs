//! Opening-hours display
//!
//! The service reports hours either as free-form text (sometimes prefixed with
//! a weekday, e.g. `"Sunday: 8am-8pm"`) or as an `HH:MM` open/close pair.
//! Pairs are kept as times and rendered in 12-hour form on demand.

use chrono::NaiveTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static DAY_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(monday|tuesday|wednesday|thursday|friday|saturday|sunday):\s*")
        .expect("day prefix pattern is valid")
});

/// Hours as reported for a spot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpotHours {
    /// Free-form text with any weekday prefix removed
    Text { text: String },
    /// Open/close pair
    Range { open: NaiveTime, close: NaiveTime },
    /// Service gave nothing usable
    Unspecified,
}

impl SpotHours {
    /// Build from free-form text; blank text is `Unspecified`
    pub fn from_text(raw: &str) -> Self {
        let text = strip_day_prefix(raw).trim();
        if text.is_empty() {
            SpotHours::Unspecified
        } else {
            SpotHours::Text {
                text: text.to_string(),
            }
        }
    }

    /// Build from an `HH:MM[:SS]` pair; `None` if either side fails to parse
    pub fn from_pair(open: &str, close: &str) -> Option<Self> {
        Some(SpotHours::Range {
            open: parse_clock(open)?,
            close: parse_clock(close)?,
        })
    }

    /// Full display string (`""` when unspecified)
    pub fn display(&self) -> String {
        match self {
            SpotHours::Text { text } => text.clone(),
            SpotHours::Range { open, close } => {
                format!("{} - {}", to_twelve_hour(*open), to_twelve_hour(*close))
            }
            SpotHours::Unspecified => String::new(),
        }
    }

    /// First comma-separated segment, used on compact list rows
    pub fn summary(&self) -> String {
        let full = self.display();
        match full.split(',').next() {
            Some(first) => first.trim().to_string(),
            None => full,
        }
    }

    pub fn is_specified(&self) -> bool {
        !matches!(self, SpotHours::Unspecified)
    }
}

/// Remove a leading `"<Weekday>: "` prefix, case-insensitively
pub fn strip_day_prefix(raw: &str) -> &str {
    match DAY_PREFIX.find(raw) {
        Some(m) => &raw[m.end()..],
        None => raw,
    }
}

/// Parse `HH:MM` or `HH:MM:SS`
pub fn parse_clock(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

/// Render a time as `9:05 AM`
pub fn to_twelve_hour(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}
