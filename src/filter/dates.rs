use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

static ORDINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})(st|nd|rd|th)\b").expect("static regex"));

static RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+|an?)\s+(second|minute|hour|day|week|month|year)s?\s+ago$")
        .expect("static regex")
});

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dt%H:%M:%S",
    "%Y-%m-%dt%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%b. %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%d %B, %Y",
];

/// Parses a platform-supplied publication date
///
/// Accepts ISO-8601 timestamps (with or without offset or trailing `Z`),
/// common written forms like "July 5th, 2019" or "5 Jul 2019", and
/// relative forms like "yesterday" or "3 days ago", resolved against `today`.
///
/// # Returns
///
/// * `Some(NaiveDate)` - The calendar date of the publication
/// * `None` - The string could not be understood
pub fn parse_date(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let cleaned = raw.trim().to_lowercase();
    let cleaned = cleaned.trim_end_matches('z').trim();
    if cleaned.is_empty() {
        return None;
    }

    if let Some(date) = parse_relative(cleaned, today) {
        return Some(date);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&cleaned.replacen('t', "T", 1)) {
        return Some(dt.date_naive());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(cleaned, format) {
            return Some(dt.date());
        }
    }

    let cleaned = ORDINAL.replace_all(cleaned, "$1");
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&cleaned, format).ok())
}

fn parse_relative(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    match s {
        "today" | "now" | "just now" => return Some(today),
        "yesterday" => return today.pred_opt(),
        _ => {}
    }

    let caps = RELATIVE.captures(s)?;
    let amount: u32 = match &caps[1] {
        "a" | "an" => 1,
        n => n.parse().ok()?,
    };

    match &caps[2] {
        "second" | "minute" | "hour" => Some(today),
        "day" => today.checked_sub_signed(Duration::days(i64::from(amount))),
        "week" => today.checked_sub_signed(Duration::weeks(i64::from(amount))),
        "month" => today.checked_sub_months(Months::new(amount)),
        "year" => today.checked_sub_months(Months::new(amount.checked_mul(12)?)),
        _ => None,
    }
}

/// Returns true if `date` lies in `[start, end]`
pub fn in_range(date: NaiveDate, start: NaiveDate, end: NaiveDate) -> bool {
    date >= start && date <= end
}

/// Parses a date and checks it against `[start, end]`
///
/// Unparseable and out-of-range dates are both logged and rejected; neither
/// is an error for the caller.
pub fn parse_date_in_range(
    raw: &str,
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
) -> Option<NaiveDate> {
    let Some(date) = parse_date(raw, today) else {
        tracing::warn!("Could not parse date from '{}'", raw);
        return None;
    };

    if !in_range(date, start, end) {
        tracing::debug!("Date {} outside {}..={}", date, start, end);
        return None;
    }

    Some(date)
}

/// Returns the leading date segment of a search-result snippet
///
/// Web-search snippets start with the publication date followed by an
/// elision marker, e.g. `"Jul 5, 2019 ... The rest of the text"`.
pub fn snippet_date(snippet: &str) -> &str {
    snippet.split(" ... ").next().unwrap_or("").trim()
}
