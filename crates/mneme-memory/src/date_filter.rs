//! Calendar filters over record timestamps, and date detection in queries.
//!
//! All calendar arithmetic is done on UTC dates.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::hooks::contains_phrase;

const MONTHS: &str = "jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

static ISO_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"));
static MONTH_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+) (\d{4})$").expect("valid regex"));

static SLASH_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,2}/\d{1,2}/\d{2,4}\b").expect("valid regex"));
static ISO_LOOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid regex"));
static MONTH_DAY_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b({MONTHS})\s+(\d{{1,2}})(?:st|nd|rd|th)?(?:,?\s+(\d{{4}}))?\b"
    ))
    .expect("valid regex")
});
static DAY_MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({MONTHS})\s+(\d{{4}})\b"
    ))
    .expect("valid regex")
});

/// Phrases that signal a question about earlier interactions.
pub const TIME_PHRASES: &[&str] = &[
    "yesterday",
    "last week",
    "last time",
    "previously",
    "before",
    "earlier",
    "last month",
    "remember",
    "recall",
    "mentioned",
    "talked about",
    "discussed",
    "said",
    "told",
    "asked",
];

/// Month number for an English month name or abbreviation.
pub fn month_from_name(name: &str) -> Option<u32> {
    let month = match name.trim().to_lowercase().as_str() {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

// ─────────────────────────────────────────────────────────────────────────────
// Date Filter
// ─────────────────────────────────────────────────────────────────────────────

/// A parsed date filter. The first rule that recognises the input wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateFilter {
    Today,
    Yesterday,
    /// Monday of the current week through today.
    ThisWeek,
    /// Monday through Sunday of the previous week.
    LastWeek,
    Day(NaiveDate),
    Month { year: i32, month: u32 },
    /// Substring of `Month DD, YYYY`, `DD Month YYYY` or `YYYY-MM-DD`.
    ///
    /// Short inputs such as `"13"` match many dates; this is a known
    /// imprecision kept for compatibility with stored queries.
    Text(String),
}

impl DateFilter {
    pub fn parse(input: &str) -> Self {
        let filter = input.trim().to_lowercase();
        match filter.as_str() {
            "today" => return DateFilter::Today,
            "yesterday" => return DateFilter::Yesterday,
            "this week" => return DateFilter::ThisWeek,
            "last week" => return DateFilter::LastWeek,
            _ => {}
        }

        if ISO_DAY.is_match(&filter)
            && let Ok(day) = NaiveDate::parse_from_str(&filter, "%Y-%m-%d")
        {
            return DateFilter::Day(day);
        }

        if let Some(caps) = MONTH_YEAR.captures(&filter)
            && let Some(month) = month_from_name(&caps[1])
            && let Ok(year) = caps[2].parse::<i32>()
        {
            return DateFilter::Month { year, month };
        }

        DateFilter::Text(filter)
    }

    /// Test a timestamp against the filter, relative to the current UTC day.
    pub fn matches(&self, timestamp: DateTime<Utc>) -> bool {
        self.matches_on(timestamp, Utc::now().date_naive())
    }

    /// Test a timestamp against the filter, relative to `today`.
    pub fn matches_on(&self, timestamp: DateTime<Utc>, today: NaiveDate) -> bool {
        let day = timestamp.date_naive();
        match self {
            DateFilter::Today => day == today,
            DateFilter::Yesterday => day == today - Duration::days(1),
            DateFilter::ThisWeek => {
                let start = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
                start <= day && day <= today
            }
            DateFilter::LastWeek => {
                let end = today
                    - Duration::days(i64::from(today.weekday().num_days_from_monday()) + 1);
                let start = end - Duration::days(6);
                start <= day && day <= end
            }
            DateFilter::Day(target) => day == *target,
            DateFilter::Month { year, month } => day.year() == *year && day.month() == *month,
            DateFilter::Text(text) => rendered_forms(timestamp)
                .iter()
                .any(|form| form.contains(text.as_str())),
        }
    }
}

impl std::str::FromStr for DateFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DateFilter::parse(s))
    }
}

fn rendered_forms(timestamp: DateTime<Utc>) -> [String; 3] {
    [
        timestamp.format("%B %d, %Y").to_string().to_lowercase(),
        timestamp.format("%d %B %Y").to_string().to_lowercase(),
        timestamp.format("%Y-%m-%d").to_string(),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Date Detection
// ─────────────────────────────────────────────────────────────────────────────

/// Date-like mentions in free text, in pattern order.
pub fn extract_dates(text: &str) -> Vec<String> {
    let mut dates: Vec<String> = Vec::new();
    let patterns: [&Regex; 4] = [&SLASH_DATE, &ISO_LOOSE, &MONTH_DAY_YEAR, &DAY_MONTH_YEAR];
    for pattern in patterns {
        for m in pattern.find_iter(text) {
            let found = m.as_str().to_string();
            if !dates.contains(&found) {
                dates.push(found);
            }
        }
    }
    dates
}

/// Temporal intent detected in a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemporalHint {
    /// A relative time phrase ("last time", "remember", ...) was seen.
    pub phrase_detected: bool,
    /// The first mention that resolves to one calendar day.
    pub specific_date: Option<NaiveDate>,
    /// Raw date mentions.
    pub mentions: Vec<String>,
}

impl TemporalHint {
    pub fn is_temporal(&self) -> bool {
        self.phrase_detected || self.specific_date.is_some() || !self.mentions.is_empty()
    }
}

/// Scan `text` for time phrases and resolvable dates, relative to `today`.
pub fn detect_temporal(text: &str, today: NaiveDate) -> TemporalHint {
    let lower = text.to_lowercase();
    let phrase_detected = TIME_PHRASES.iter().any(|p| contains_phrase(&lower, p));
    let mentions = extract_dates(text);

    let specific_date = resolve_specific_date(text)
        .or_else(|| contains_phrase(&lower, "today").then_some(today))
        .or_else(|| contains_phrase(&lower, "yesterday").then(|| today - Duration::days(1)));

    TemporalHint {
        phrase_detected,
        specific_date,
        mentions,
    }
}

/// The earliest `Month DD, YYYY`, `DD Month YYYY` or ISO date in the text,
/// by position.
fn resolve_specific_date(text: &str) -> Option<NaiveDate> {
    let month_day_year = MONTH_DAY_YEAR.captures_iter(text).filter_map(|caps| {
        let month = month_from_name(&caps[1])?;
        let day = caps[2].parse().ok()?;
        let year = caps.get(3)?.as_str().parse().ok()?;
        Some((caps.get(0)?.start(), NaiveDate::from_ymd_opt(year, month, day)?))
    });
    let day_month_year = DAY_MONTH_YEAR.captures_iter(text).filter_map(|caps| {
        let day = caps[1].parse().ok()?;
        let month = month_from_name(&caps[2])?;
        let year = caps[3].parse().ok()?;
        Some((caps.get(0)?.start(), NaiveDate::from_ymd_opt(year, month, day)?))
    });
    let iso = ISO_LOOSE.captures_iter(text).filter_map(|caps| {
        let date = NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        )?;
        Some((caps.get(0)?.start(), date))
    });
    month_day_year
        .chain(day_month_year)
        .chain(iso)
        .min_by_key(|(start, _)| *start)
        .map(|(_, date)| date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(DateFilter::parse(" Today "), DateFilter::Today);
        assert_eq!(DateFilter::parse("LAST WEEK"), DateFilter::LastWeek);
        assert_eq!(DateFilter::parse("2025-04-13"), DateFilter::Day(day(2025, 4, 13)));
        assert_eq!(
            DateFilter::parse("Sept 2024"),
            DateFilter::Month { year: 2024, month: 9 }
        );
        assert_eq!(
            DateFilter::parse("Smarch 2024"),
            DateFilter::Text("smarch 2024".into())
        );
        assert_eq!(DateFilter::parse("2025-13-45"), DateFilter::Text("2025-13-45".into()));
    }

    #[test]
    fn test_relative_filters() {
        // 2025-04-16 is a Wednesday.
        let today = day(2025, 4, 16);
        assert!(DateFilter::Today.matches_on(ts(2025, 4, 16), today));
        assert!(DateFilter::Yesterday.matches_on(ts(2025, 4, 15), today));
        assert!(!DateFilter::Yesterday.matches_on(ts(2025, 4, 16), today));

        assert!(DateFilter::ThisWeek.matches_on(ts(2025, 4, 14), today));
        assert!(!DateFilter::ThisWeek.matches_on(ts(2025, 4, 13), today));
        assert!(!DateFilter::ThisWeek.matches_on(ts(2025, 4, 17), today));

        assert!(DateFilter::LastWeek.matches_on(ts(2025, 4, 7), today));
        assert!(DateFilter::LastWeek.matches_on(ts(2025, 4, 13), today));
        assert!(!DateFilter::LastWeek.matches_on(ts(2025, 4, 6), today));
        assert!(!DateFilter::LastWeek.matches_on(ts(2025, 4, 14), today));
    }

    #[test]
    fn test_absolute_filters() {
        let today = day(2025, 6, 1);
        assert!(DateFilter::parse("2025-04-13").matches_on(ts(2025, 4, 13), today));
        assert!(!DateFilter::parse("2025-04-13").matches_on(ts(2025, 4, 14), today));
        assert!(DateFilter::parse("april 2025").matches_on(ts(2025, 4, 30), today));
        assert!(!DateFilter::parse("april 2025").matches_on(ts(2024, 4, 30), today));
    }

    #[test]
    fn test_substring_fallback() {
        let today = day(2025, 6, 1);
        let record = ts(2025, 4, 13);
        assert!(DateFilter::parse("April 13").matches_on(record, today));
        assert!(DateFilter::parse("13 april").matches_on(record, today));
        assert!(DateFilter::parse("13").matches_on(record, today));
        assert!(!DateFilter::parse("may").matches_on(record, today));
    }

    #[test]
    fn test_extract_dates() {
        let dates = extract_dates("On 4/13/2025 and 2025-4-2, then April 13th, 2025 or 2 May 2024.");
        assert_eq!(dates, vec!["4/13/2025", "2025-4-2", "April 13th, 2025", "2 May 2024"]);
    }

    #[test]
    fn test_detect_temporal() {
        let today = day(2025, 4, 16);

        let hint = detect_temporal("What did we discuss on April 13, 2025?", today);
        assert_eq!(hint.specific_date, Some(day(2025, 4, 13)));

        let hint = detect_temporal("Do you remember my dog?", today);
        assert!(hint.phrase_detected);
        assert_eq!(hint.specific_date, None);
        assert!(hint.is_temporal());

        let hint = detect_temporal("Compare 2025-03-02 with April 13, 2025", today);
        assert_eq!(hint.specific_date, Some(day(2025, 3, 2)));

        let hint = detect_temporal("From 5 May 2024 to June 1, 2024", today);
        assert_eq!(hint.specific_date, Some(day(2024, 5, 5)));

        let hint = detect_temporal("What happened yesterday?", today);
        assert_eq!(hint.specific_date, Some(day(2025, 4, 15)));

        let hint = detect_temporal("Tell me a joke", today);
        assert!(!hint.is_temporal());
    }
}
