use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIME_SLOTS: [&str; 4] = ["9:00 AM", "11:00 AM", "2:00 PM", "4:00 PM"];

/// `Wed Jul 10 2024`
pub const DATE_LABEL_FORMAT: &str = "%a %b %d %Y";

const DATE_FORMATS: [&str; 10] = [
    "%Y-%m-%d",
    "%a %b %d %Y",
    "%A, %B %d, %Y",
    "%a, %b %d, %Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %B, %Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
];

/// The bookable time labels offered on every day, in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlotCatalog {
    labels: Vec<String>,
}

impl Default for TimeSlotCatalog {
    fn default() -> Self {
        Self {
            labels: DEFAULT_TIME_SLOTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TimeSlotCatalog {
    pub fn new(labels: Vec<String>) -> Self {
        let mut seen = HashSet::new();
        let labels = labels
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty() && seen.insert(l.clone()))
            .collect();
        Self { labels }
    }

    /// Parses `"9:00 AM, 11:00 AM"`. Returns `None` when no usable label is present.
    pub fn from_csv(s: &str) -> Option<Self> {
        let catalog = Self::new(s.split(',').map(str::to_string).collect());
        if catalog.labels.is_empty() {
            None
        } else {
            Some(catalog)
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Maps free text such as `"2 pm"`, `"2:00pm"` or `"14:00"` onto a catalog label.
    pub fn match_label(&self, input: &str) -> Option<&str> {
        let input = input.trim();
        if let Some(label) = self.labels.iter().find(|l| l.eq_ignore_ascii_case(input)) {
            return Some(label);
        }

        let wanted = parse_clock_time(input)?;
        self.labels
            .iter()
            .find(|l| parse_clock_time(l) == Some(wanted))
            .map(String::as_str)
    }

    /// Splits a combined `"<label> on <date>"` slot. Only labels from this catalog count.
    pub fn split_scheduled<'a>(&self, slot: &'a str) -> Option<(&'a str, &'a str)> {
        let (time, date) = slot.split_once(" on ")?;
        let time = time.trim();
        if self.contains(time) {
            Some((time, date.trim()))
        } else {
            None
        }
    }

    /// Catalog labels not present in `taken`, catalog order preserved.
    pub fn without(&self, taken: &HashSet<String>) -> Vec<String> {
        self.labels
            .iter()
            .filter(|l| !taken.contains(*l))
            .cloned()
            .collect()
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_LABEL_FORMAT).to_string()
}

pub fn combine(label: &str, date_label: &str) -> String {
    format!("{label} on {date_label}")
}

/// Parses an absolute calendar date. Relative words are resolved by the dialogue engine.
pub fn parse_calendar_date(input: &str) -> Option<NaiveDate> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
}

pub fn parse_clock_time(input: &str) -> Option<NaiveTime> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect::<String>()
        .to_uppercase();

    let (clock, meridiem) = if let Some(c) = compact.strip_suffix("AM") {
        (c, Some("AM"))
    } else if let Some(c) = compact.strip_suffix("PM") {
        (c, Some("PM"))
    } else {
        (compact.as_str(), None)
    };

    if clock.is_empty() {
        return None;
    }
    let clock = if clock.contains(':') {
        clock.to_string()
    } else {
        format!("{clock}:00")
    };

    match meridiem {
        Some(m) => NaiveTime::parse_from_str(&format!("{clock} {m}"), "%I:%M %p").ok(),
        None => NaiveTime::parse_from_str(&clock, "%H:%M").ok(),
    }
}
