//! Transaction date extraction.

use chrono::{Datelike, NaiveDate};

use super::patterns::{DATE_DAY_FIRST, DATE_LABEL, DATE_MONTH_NAME_FIRST, DATE_NUMERIC, DATE_YMD};
use super::{ExtractionMatch, FieldExtractor};

/// Receipts dated before this are treated as misreads.
const EARLIEST_YEAR: i32 = 2000;

/// Date field extractor.
///
/// Recognizes `MM/DD/YYYY` (falling back to day-first when the first
/// number cannot be a month), `YYYY-MM-DD` and month-name forms. Dates
/// after `today` are dropped.
#[derive(Debug, Clone)]
pub struct DateExtractor {
    today: NaiveDate,
}

impl DateExtractor {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    fn plausible(&self, date: NaiveDate) -> bool {
        date <= self.today && date.year() >= EARLIEST_YEAR
    }

    fn parse_numeric(first: &str, second: &str, year: &str) -> Option<NaiveDate> {
        let a: u32 = first.parse().ok()?;
        let b: u32 = second.parse().ok()?;
        let year = expand_year(year)?;

        // US order unless the first number can only be a day.
        let (month, day) = if a > 12 { (b, a) } else { (a, b) };
        NaiveDate::from_ymd_opt(year, month, day)
    }

    fn parse_ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
    }

    fn parse_named(month: &str, day: &str, year: &str) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year.parse().ok()?, month_from_name(month)?, day.parse().ok()?)
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<ExtractionMatch<NaiveDate>> = Vec::new();

        let mut push = |date: Option<NaiveDate>, start: usize, end: usize, source: &str| {
            if results.iter().any(|m| m.overlaps(start, end)) {
                return;
            }
            if let Some(date) = date.filter(|d| self.plausible(*d)) {
                results.push(ExtractionMatch::new(date, 0.8, source).with_position(start, end));
            }
        };

        for caps in DATE_YMD.captures_iter(text) {
            let full = &caps[0];
            let m = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or_default();
            push(Self::parse_ymd(&caps[1], &caps[2], &caps[3]), m.0, m.1, full);
        }

        for caps in DATE_MONTH_NAME_FIRST.captures_iter(text) {
            let full = &caps[0];
            let m = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or_default();
            push(Self::parse_named(&caps[1], &caps[2], &caps[3]), m.0, m.1, full);
        }

        for caps in DATE_DAY_FIRST.captures_iter(text) {
            let full = &caps[0];
            let m = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or_default();
            push(Self::parse_named(&caps[2], &caps[1], &caps[3]), m.0, m.1, full);
        }

        for caps in DATE_NUMERIC.captures_iter(text) {
            let full = &caps[0];
            let m = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or_default();
            push(Self::parse_numeric(&caps[1], &caps[2], &caps[3]), m.0, m.1, full);
        }

        results.sort_by_key(|m| m.position.map(|(s, _)| s).unwrap_or(0));
        results
    }
}

/// Pick the transaction date: a date on a labelled line wins, otherwise
/// the most recent date found.
pub fn extract_transaction_date(text: &str, today: NaiveDate) -> Option<ExtractionMatch<NaiveDate>> {
    let extractor = DateExtractor::new(today);

    for line in text.lines().filter(|l| DATE_LABEL.is_match(l)) {
        if let Some(found) = extractor.extract(line) {
            return Some(ExtractionMatch {
                confidence: 0.95,
                ..found
            });
        }
    }

    extractor.extract_all(text).into_iter().max_by_key(|m| m.value)
}

fn expand_year(year: &str) -> Option<i32> {
    let value: i32 = year.parse().ok()?;
    match year.len() {
        2 => Some(2000 + value),
        4 => Some(value),
        _ => None,
    }
}

fn month_from_name(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect::<String>().to_ascii_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}
