//! Date phrase parsing.
//!
//! # Responsibility
//! - Split composite date text (`公元前1600年 - 公元前1046年`) into segments.
//! - Convert each segment into a tick through strict formats first and
//!   fixed lexical patterns second.
//!
//! # Invariants
//! - Segments that cannot be read are dropped, never guessed.
//! - Year 0 is never handed to the calendar.

use crate::time::calendar::{
    checked_date_time_to_tick, format_bracketed, is_leap_year, month_days, naive_to_tick,
    now_tick, Tick,
};
use crate::time::numeral::normalize_numerals;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

const CANONICAL_SEPARATOR: &str = ",";

static BRACKET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[.*?\]").expect("valid bracket regex"));
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+)\s*年").expect("valid year regex"));
static MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+)\s*月").expect("valid month regex"));
static DAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+)\s*日").expect("valid day regex"));

static DEFAULT_PARSER: Lazy<DatePhraseParser> = Lazy::new(DatePhraseParser::default);

/// Segment-level parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhraseError {
    /// Segment carries no digits after numeral normalization.
    NoMatch(String),
    /// Segment names a year that ticks cannot represent.
    OutOfRange(String),
}

impl PhraseError {
    /// Stable metadata-only code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoMatch(_) => "no_match",
            Self::OutOfRange(_) => "out_of_range",
        }
    }
}

impl Display for PhraseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMatch(segment) => write!(f, "no date found in `{segment}`"),
            Self::OutOfRange(segment) => write!(f, "date out of range in `{segment}`"),
        }
    }
}

impl Error for PhraseError {}

/// Era marker found in a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Era {
    Bce,
    Ce,
    Unmarked,
}

/// Lexical tables driving [`DatePhraseParser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseConfig {
    /// Removed before anything else (`约`).
    pub fillers: Vec<String>,
    /// Literal rewrites applied in order (`正月` -> `1月`).
    pub replacements: Vec<(String, String)>,
    /// Replaced with the current local time as a bracketed literal.
    pub present_marker: Option<String>,
    /// Every separator is mapped to `,` before splitting.
    pub separators: Vec<String>,
    /// Matched case-insensitively anywhere in a segment.
    pub bce_markers: Vec<String>,
    pub ce_markers: Vec<String>,
}

impl Default for PhraseConfig {
    fn default() -> Self {
        Self {
            fillers: to_strings(&["约"]),
            replacements: vec![
                ("元月".to_string(), "1月".to_string()),
                ("正月".to_string(), "1月".to_string()),
                ("世纪".to_string(), "00".to_string()),
            ],
            present_marker: Some("至今".to_string()),
            separators: to_strings(&[
                ",", "，", "~", "～", "-", "–", "－", "—", "―", "─", "至", "到",
            ]),
            bce_markers: to_strings(&[
                "bc",
                "bce",
                "before common era",
                "公元前",
                "前",
                "距今",
                "史前",
            ]),
            ce_markers: to_strings(&["ac", "ce", "common era", "公元"]),
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

/// Converts human-written date text into ticks.
#[derive(Debug, Clone, Default)]
pub struct DatePhraseParser {
    config: PhraseConfig,
}

impl DatePhraseParser {
    pub fn new(config: PhraseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PhraseConfig {
        &self.config
    }

    /// Splits composite text into trimmed, non-empty segments.
    ///
    /// Bracketed literals (`[1949-10-01 15:00:00]`) are kept whole and
    /// appended after the separator-split segments.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut text = text.to_string();
        for filler in &self.config.fillers {
            text = text.replace(filler.as_str(), "");
        }
        for (from, to) in &self.config.replacements {
            text = text.replace(from.as_str(), to.as_str());
        }
        if let Some(marker) = self.config.present_marker.as_deref() {
            if !marker.is_empty() && text.contains(marker) {
                text = text.replace(marker, &format_bracketed(now_tick()));
            }
        }

        let literals: Vec<String> = BRACKET_RE
            .find_iter(&text)
            .map(|found| found.as_str().to_string())
            .collect();
        let mut text = BRACKET_RE
            .replace_all(&text, CANONICAL_SEPARATOR)
            .into_owned();
        for separator in &self.config.separators {
            text = text.replace(separator.as_str(), CANONICAL_SEPARATOR);
        }

        text.split(CANONICAL_SEPARATOR)
            .map(str::to_string)
            .chain(literals)
            .map(|segment| strip_brackets(&segment).to_string())
            .filter(|segment| !segment.is_empty())
            .collect()
    }

    /// Reports which era marker a segment carries; BCE wins over CE.
    pub fn era(&self, segment: &str) -> Era {
        let lowered = segment.trim().to_lowercase();
        let contains_any = |markers: &[String]| {
            markers
                .iter()
                .any(|marker| lowered.contains(marker.as_str()))
        };
        if contains_any(&self.config.bce_markers) {
            Era::Bce
        } else if contains_any(&self.config.ce_markers) {
            Era::Ce
        } else {
            Era::Unmarked
        }
    }

    /// Converts one segment into a tick.
    ///
    /// # Errors
    /// - `NoMatch` when the segment carries no digits.
    /// - `OutOfRange` when the year cannot be represented.
    pub fn segment_to_tick(&self, segment: &str) -> Result<Tick, PhraseError> {
        let segment = strip_brackets(segment);
        if let Some(tick) = parse_strict(segment) {
            return Ok(tick);
        }

        let sign = if self.era(segment) == Era::Bce { -1 } else { 1 };
        let normalized = normalize_numerals(segment);

        let Some(year_digits) = first_capture(&YEAR_RE, &normalized) else {
            let digits: String = normalized.chars().filter(char::is_ascii_digit).collect();
            if digits.is_empty() {
                return Err(PhraseError::NoMatch(segment.to_string()));
            }
            let year = signed_year(&digits, sign, segment)?;
            return checked_date_time_to_tick(year, 1, 1, 0, 0, 0)
                .ok_or_else(|| PhraseError::OutOfRange(segment.to_string()));
        };

        let year = signed_year(year_digits, sign, segment)?;
        let month = first_capture(&MONTH_RE, &normalized)
            .map(|digits| clamp_field(digits, 12))
            .unwrap_or(1);
        let last_day = month_days(month, is_leap_year(year));
        let day = first_capture(&DAY_RE, &normalized)
            .map(|digits| clamp_field(digits, last_day))
            .unwrap_or(1);

        checked_date_time_to_tick(year, month, day, 0, 0, 0)
            .ok_or_else(|| PhraseError::OutOfRange(segment.to_string()))
    }

    /// Ticks for every readable segment, in segment order.
    pub fn phrase_to_ticks(&self, text: &str) -> Vec<Tick> {
        self.split(text)
            .iter()
            .filter_map(|segment| match self.segment_to_tick(segment) {
                Ok(tick) => Some(tick),
                Err(err) => {
                    debug!(
                        "event=date_segment_skip module=time status=skipped reason={}",
                        err.code()
                    );
                    None
                }
            })
            .collect()
    }

    /// `(min, max)` over [`Self::phrase_to_ticks`], `None` when nothing parses.
    pub fn phrase_range(&self, text: &str) -> Option<(Tick, Tick)> {
        let ticks = self.phrase_to_ticks(text);
        let since = ticks.iter().min()?;
        let until = ticks.iter().max()?;
        Some((*since, *until))
    }
}

/// [`DatePhraseParser::phrase_to_ticks`] with the default tables.
pub fn phrase_to_ticks(text: &str) -> Vec<Tick> {
    DEFAULT_PARSER.phrase_to_ticks(text)
}

/// [`DatePhraseParser::phrase_range`] with the default tables.
pub fn phrase_range(text: &str) -> Option<(Tick, Tick)> {
    DEFAULT_PARSER.phrase_range(text)
}

fn strip_brackets(segment: &str) -> &str {
    segment.trim().trim_matches(['[', ']']).trim()
}

fn parse_strict(segment: &str) -> Option<Tick> {
    if let Ok(value) = NaiveDateTime::parse_from_str(segment, "%Y-%m-%d %H:%M:%S") {
        return naive_to_tick(&value);
    }
    if let Ok(date) = NaiveDate::parse_from_str(segment, "%Y-%m-%d") {
        return naive_to_tick(&date.and_hms_opt(0, 0, 0)?);
    }
    if let Ok(time) = NaiveTime::parse_from_str(segment, "%H:%M:%S") {
        // A bare time of day lands on 1900-01-01.
        return naive_to_tick(&NaiveDate::from_ymd_opt(1900, 1, 1)?.and_time(time));
    }
    if let Ok(date) = NaiveDate::parse_from_str(segment, "%Y%m%d") {
        return naive_to_tick(&date.and_hms_opt(0, 0, 0)?);
    }
    None
}

fn first_capture<'t>(pattern: &Regex, text: &'t str) -> Option<&'t str> {
    pattern
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|found| found.as_str())
}

fn signed_year(digits: &str, sign: i64, segment: &str) -> Result<i64, PhraseError> {
    let magnitude: i64 = digits
        .parse()
        .map_err(|_| PhraseError::OutOfRange(segment.to_string()))?;
    if magnitude == 0 {
        return Ok(1);
    }
    Ok(sign * magnitude)
}

fn clamp_field(digits: &str, max: u32) -> u32 {
    digits.parse::<u32>().unwrap_or(max).clamp(1, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::calendar::{date_time_to_tick, tick_to_date_time};

    fn year_month(text: &str) -> (i64, u32) {
        let ticks = phrase_to_ticks(text);
        assert_eq!(ticks.len(), 1, "expected one tick for `{text}`");
        let value = tick_to_date_time(ticks[0]);
        (value.year, value.month)
    }

    #[test]
    fn split_maps_separators_and_keeps_brackets_whole() {
        let parser = DatePhraseParser::default();
        assert_eq!(
            parser.split("约1900年 ~ 1910年，[1949-10-01 15:00:00]"),
            vec!["1900年", "1910年", "1949-10-01 15:00:00"]
        );
        assert_eq!(parser.split(" , ,"), Vec::<String>::new());
    }

    #[test]
    fn strict_formats_are_tried_first() {
        let parser = DatePhraseParser::default();
        assert_eq!(
            parser.segment_to_tick("1949-10-01 15:00:00"),
            Ok(date_time_to_tick(1949, 10, 1, 15, 0, 0))
        );
        assert_eq!(
            parser.segment_to_tick("[1949-10-01]"),
            Ok(date_time_to_tick(1949, 10, 1, 0, 0, 0))
        );
        assert_eq!(
            parser.segment_to_tick("19491001"),
            Ok(date_time_to_tick(1949, 10, 1, 0, 0, 0))
        );
        assert_eq!(
            parser.segment_to_tick("12:30:00"),
            Ok(date_time_to_tick(1900, 1, 1, 12, 30, 0))
        );
    }

    #[test]
    fn chinese_numeral_years() {
        assert_eq!(year_month("9百年"), (900, 1));
        assert_eq!(year_month("2010年"), (2010, 1));
        assert_eq!(year_month("二千年"), (2000, 1));
        assert_eq!(year_month("公元3百年"), (300, 1));
        assert_eq!(year_month("公元三百年"), (300, 1));
    }

    #[test]
    fn bce_markers_flip_the_sign() {
        assert_eq!(year_month("公元前1900年"), (-1900, 1));
        assert_eq!(year_month("前一百万年"), (-1_000_000, 1));
        assert_eq!(year_month("前200万年"), (-2_000_000, 1));
        assert_eq!(year_month("500 BC"), (-500, 1));
        assert_eq!(year_month("距今1万年"), (-10_000, 1));
    }

    #[test]
    fn month_names_resolve() {
        assert_eq!(year_month("1900年元月"), (1900, 1));
        assert_eq!(year_month("1900年正月"), (1900, 1));
        let names = [
            "一月", "二月", "三月", "四月", "五月", "六月", "七月", "八月", "九月", "十月",
            "十一月", "十二月",
        ];
        for (index, name) in names.iter().enumerate() {
            assert_eq!(
                year_month(&format!("1900年{name}")),
                (1900, index as u32 + 1)
            );
        }
        assert_eq!(year_month("公元前200年十一月"), (-200, 11));
    }

    #[test]
    fn fields_are_clamped() {
        let parser = DatePhraseParser::default();
        assert_eq!(
            parser.segment_to_tick("2001年2月31日"),
            Ok(date_time_to_tick(2001, 2, 28, 0, 0, 0))
        );
        assert_eq!(
            parser.segment_to_tick("2001年13月"),
            Ok(date_time_to_tick(2001, 12, 1, 0, 0, 0))
        );
        assert_eq!(
            parser.segment_to_tick("0年"),
            Ok(date_time_to_tick(1, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn unreadable_segments_are_errors() {
        let parser = DatePhraseParser::default();
        assert_eq!(
            parser.segment_to_tick("long ago"),
            Err(PhraseError::NoMatch("long ago".to_string()))
        );
        assert!(matches!(
            parser.segment_to_tick("一万亿年"),
            Err(PhraseError::OutOfRange(_))
        ));
        assert!(matches!(
            parser.segment_to_tick("前一万亿年"),
            Err(PhraseError::OutOfRange(_))
        ));
    }

    #[test]
    fn ranges_cover_composite_text() {
        assert_eq!(
            phrase_to_ticks("公元前1600年 - 公元前1046年"),
            vec![
                date_time_to_tick(-1600, 1, 1, 0, 0, 0),
                date_time_to_tick(-1046, 1, 1, 0, 0, 0)
            ]
        );
        assert_eq!(
            phrase_range("1911年, 1840年, 1894年"),
            Some((
                date_time_to_tick(1840, 1, 1, 0, 0, 0),
                date_time_to_tick(1911, 1, 1, 0, 0, 0)
            ))
        );
        assert_eq!(phrase_range("unknown"), None);
    }

    #[test]
    fn present_marker_expands_to_now() {
        let ticks = phrase_to_ticks("1949年至今");
        assert_eq!(ticks.len(), 2);
        assert!(ticks[1] > ticks[0]);
    }

    #[test]
    fn century_suffix_reads_as_hundreds() {
        assert_eq!(year_month("19世纪"), (1900, 1));
        assert_eq!(year_month("十九世纪"), (1900, 1));
    }
}
