//! Proleptic Gregorian calendar arithmetic on integer ticks.
//!
//! # Responsibility
//! - Convert between calendar fields and `Tick` (seconds since
//!   0001-01-01T00:00:00 CE).
//! - Apply calendar-aware offsets (month/year carry, day clamping).
//! - Render ticks for display and for the phrase parser's strict formats.
//!
//! # Invariants
//! - Year 0 does not exist: year `-1` (1 BCE) is followed by year `1`.
//! - Day number 0 does not exist: day `1` is 0001-01-01 and day `-1` is
//!   -0001-12-31.
//! - Leap years are decided on `|year|`, so 4 BCE is a leap year.
//! - Field preconditions are programmer contracts and panic when violated.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Write};

/// Signed seconds since 0001-01-01T00:00:00 CE.
pub type Tick = i64;

pub const TICK_SEC: Tick = 1;
pub const TICK_MIN: Tick = 60 * TICK_SEC;
pub const TICK_HOUR: Tick = 60 * TICK_MIN;
pub const TICK_DAY: Tick = 24 * TICK_HOUR;
pub const TICK_MONTH_AVG: Tick = 30 * TICK_DAY;
pub const TICK_YEAR: Tick = 365 * TICK_DAY;
pub const TICK_LEAP_YEAR: Tick = 366 * TICK_DAY;
pub const TICK_WEEK: Tick = TICK_YEAR / 52;

pub const DAYS_PER_4_YEARS: i64 = 4 * 365 + 1;
pub const DAYS_PER_100_YEARS: i64 = 25 * DAYS_PER_4_YEARS - 1;
pub const DAYS_PER_400_YEARS: i64 = 4 * DAYS_PER_100_YEARS + 1;

/// Largest `|year|` whose ticks fit in `i64`.
pub const MAX_TICK_YEAR: i64 = 292_000_000_000;

const MONTH_DAYS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const MONTH_DAYS_LEAP: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const MONTH_DAYS_SUM: [u32; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];
const MONTH_DAYS_SUM_LEAP: [u32; 12] = [0, 31, 60, 91, 121, 152, 182, 213, 244, 274, 305, 335];

/// Broken-down calendar value. `year` is never 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CalendarDateTime {
    pub year: i64,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl CalendarDateTime {
    /// Creates a validated calendar value.
    ///
    /// # Panics
    /// - When any field is outside its calendar range or `year == 0`.
    pub fn new(year: i64, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        assert_date(year, month, day);
        assert_time(hour, minute, second);
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Midnight of the given date.
    pub fn date(year: i64, month: u32, day: u32) -> Self {
        Self::new(year, month, day, 0, 0, 0)
    }

    pub fn from_tick(tick: Tick) -> Self {
        tick_to_date_time(tick)
    }

    pub fn to_tick(&self) -> Tick {
        date_time_to_tick(
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        )
    }

    pub fn as_tuple(&self) -> (i64, u32, u32, u32, u32, u32) {
        (
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        )
    }
}

impl Display for CalendarDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Calendar delta applied by [`offset`] and [`offset_date_time`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalendarOffset {
    pub years: i64,
    pub months: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl CalendarOffset {
    pub fn years(years: i64) -> Self {
        Self {
            years,
            ..Self::default()
        }
    }

    pub fn months(months: i64) -> Self {
        Self {
            months,
            ..Self::default()
        }
    }

    pub fn days(days: i64) -> Self {
        Self {
            days,
            ..Self::default()
        }
    }

    pub fn apply(&self, tick: Tick) -> Tick {
        offset(
            tick,
            self.years,
            self.months,
            self.days,
            self.hours,
            self.minutes,
            self.seconds,
        )
    }
}

pub fn is_leap_year(year: i64) -> bool {
    assert!(year != 0, "year 0 does not exist");
    let year = year.unsigned_abs();
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn year_days(leap: bool) -> i64 {
    if leap {
        366
    } else {
        365
    }
}

/// Length of `month` (1..=12).
pub fn month_days(month: u32, leap: bool) -> u32 {
    assert_month(month);
    let table = if leap { &MONTH_DAYS_LEAP } else { &MONTH_DAYS };
    table[month as usize - 1]
}

/// Days of the year that precede the first day of `month`.
pub fn months_to_days(month: u32, leap: bool) -> i64 {
    assert_month(month);
    let table = if leap {
        &MONTH_DAYS_SUM_LEAP
    } else {
        &MONTH_DAYS_SUM
    };
    i64::from(table[month as usize - 1])
}

/// Signed day distance from the epoch to Jan 1 of `year`.
///
/// CE years count the whole years before them (`years_to_days(1) == 0`);
/// BCE years count back to their own Jan 1 (`years_to_days(-1) == -365`).
pub fn years_to_days(year: i64) -> i64 {
    assert!(year != 0, "year 0 does not exist");
    if year > 0 {
        whole_years_days(year - 1)
    } else {
        -whole_years_days(-year)
    }
}

/// Signed day number of a date, with no day 0.
///
/// `date_to_days(1, 1, 1) == 1` and `date_to_days(-1, 12, 31) == -1`.
pub fn date_to_days(year: i64, month: u32, day: u32) -> i64 {
    assert_date(year, month, day);
    let base = years_to_days(year) + months_to_days(month, is_leap_year(year));
    if year > 0 {
        base + i64::from(day)
    } else {
        base + i64::from(day) - 1
    }
}

/// Inverse of [`date_to_days`].
pub fn days_to_date(days: i64) -> (i64, u32, u32) {
    assert!(days != 0, "day number 0 does not exist");
    let (ordinal_year, offset) = split_year_blocks(days.abs() - 1);
    if days > 0 {
        let (month, day) = ordinal_to_month_day(offset, is_leap_year(ordinal_year));
        (ordinal_year, month, day)
    } else {
        // Before the epoch the offset counts back from Dec 31.
        let year = -ordinal_year;
        let leap = is_leap_year(year);
        let (month, day) = ordinal_to_month_day(year_days(leap) - 1 - offset, leap);
        (year, month, day)
    }
}

pub fn date_time_to_tick(
    year: i64,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Tick {
    assert_time(hour, minute, second);
    day_start_tick(date_to_days(year, month, day)) + time_of_day(hour, minute, second)
}

/// Like [`date_time_to_tick`] but returns `None` instead of panicking or
/// overflowing.
pub fn checked_date_time_to_tick(
    year: i64,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Option<Tick> {
    if year == 0 || year.unsigned_abs() > MAX_TICK_YEAR as u64 {
        return None;
    }
    if !(1..=12).contains(&month)
        || day == 0
        || day > month_days(month, is_leap_year(year))
        || hour > 23
        || minute > 59
        || second > 59
    {
        return None;
    }
    Some(date_time_to_tick(year, month, day, hour, minute, second))
}

/// Decodes a tick into `(year, month, day, seconds_into_day)`.
pub fn tick_to_date(tick: Tick) -> (i64, u32, u32, Tick) {
    let day_index = tick.div_euclid(TICK_DAY);
    let remainder = tick.rem_euclid(TICK_DAY);
    let days = if day_index >= 0 {
        day_index + 1
    } else {
        day_index
    };
    let (year, month, day) = days_to_date(days);
    (year, month, day, remainder)
}

pub fn tick_to_date_time(tick: Tick) -> CalendarDateTime {
    let (year, month, day, remainder) = tick_to_date(tick);
    CalendarDateTime {
        year,
        month,
        day,
        hour: (remainder / TICK_HOUR) as u32,
        minute: (remainder % TICK_HOUR / TICK_MIN) as u32,
        second: (remainder % TICK_MIN) as u32,
    }
}

/// Applies a calendar delta to `tick`.
///
/// Day and time deltas are exact second arithmetic. Month and year deltas
/// carry into each other, skip year 0, and clamp the day to the length of
/// the resulting month while keeping the time of day.
pub fn offset(
    tick: Tick,
    years: i64,
    months: i64,
    days: i64,
    hours: i64,
    minutes: i64,
    seconds: i64,
) -> Tick {
    let tick = tick + days * TICK_DAY + hours * TICK_HOUR + minutes * TICK_MIN + seconds * TICK_SEC;
    if years == 0 && months == 0 {
        return tick;
    }

    let (year, month, day, remainder) = tick_to_date(tick);
    let mut carry_years = years;
    let mut month = i64::from(month) + months;
    if month > 0 {
        carry_years += (month - 1) / 12;
        month = (month - 1) % 12 + 1;
    } else {
        let borrowed = -month / 12 + 1;
        month += borrowed * 12;
        carry_years -= borrowed;
    }

    let year = historical_year(astronomical_year(year) + carry_years);
    let month = month as u32;
    let day = day.min(month_days(month, is_leap_year(year)));
    date_time_to_tick(year, month, day, 0, 0, 0) + remainder
}

/// Applies `delta` to a broken-down value.
pub fn offset_date_time(origin: &CalendarDateTime, delta: &CalendarOffset) -> CalendarDateTime {
    tick_to_date_time(delta.apply(origin.to_tick()))
}

/// Current local wall-clock time as a tick.
pub fn now_tick() -> Tick {
    naive_to_tick(&Local::now().naive_local()).unwrap_or_default()
}

/// Converts a chrono value (astronomical years, 0 = 1 BCE) into a tick.
pub fn naive_to_tick(value: &NaiveDateTime) -> Option<Tick> {
    checked_date_time_to_tick(
        historical_year(i64::from(value.year())),
        value.month(),
        value.day(),
        value.hour(),
        value.minute(),
        value.second(),
    )
}

/// Converts a tick into a chrono value; `None` outside chrono's year range.
pub fn tick_to_naive(tick: Tick) -> Option<NaiveDateTime> {
    let value = tick_to_date_time(tick);
    let year = i32::try_from(astronomical_year(value.year)).ok()?;
    NaiveDate::from_ymd_opt(year, value.month, value.day)?.and_hms_opt(
        value.hour,
        value.minute,
        value.second,
    )
}

/// Display text such as `500 BCE`, `1949 CE/10/1` or `1949 CE/10/1 08:00:00`.
pub fn format_tick(tick: Tick, show_date: bool, show_time: bool) -> String {
    let value = tick_to_date_time(tick);
    let mut text = if value.year < 0 {
        format!("{} BCE", -value.year)
    } else {
        format!("{} CE", value.year)
    };
    if show_date {
        let _ = write!(text, "/{}/{}", value.month, value.day);
    }
    if show_time {
        let _ = write!(
            text,
            " {:02}:{:02}:{:02}",
            value.hour, value.minute, value.second
        );
    }
    text
}

/// Chinese date text such as `公元前500年1月1日`.
pub fn format_cn(tick: Tick) -> String {
    let value = tick_to_date_time(tick);
    if value.year < 0 {
        format!("公元前{}年{}月{}日", -value.year, value.month, value.day)
    } else {
        format!("公元{}年{}月{}日", value.year, value.month, value.day)
    }
}

/// Bracketed strict-format literal (`[YYYY-MM-DD HH:MM:SS]`, astronomical
/// year) that the phrase parser reads back to the same tick.
pub fn format_bracketed(tick: Tick) -> String {
    let value = tick_to_date_time(tick);
    let year = astronomical_year(value.year);
    let year = if year < 0 {
        format!("-{:04}", -year)
    } else {
        format!("{year:04}")
    };
    format!(
        "[{}-{:02}-{:02} {:02}:{:02}:{:02}]",
        year, value.month, value.day, value.hour, value.minute, value.second
    )
}

fn whole_years_days(years: i64) -> i64 {
    365 * years + years / 4 - years / 100 + years / 400
}

/// Splits a zero-based day offset into a 1-based year ordinal and a
/// zero-based day within that year.
fn split_year_blocks(days: i64) -> (i64, i64) {
    let cycles_400 = days / DAYS_PER_400_YEARS;
    let mut days = days % DAYS_PER_400_YEARS;

    let mut cycles_100 = days / DAYS_PER_100_YEARS;
    days %= DAYS_PER_100_YEARS;
    if cycles_100 == 4 {
        // Dec 31 of the 400th year.
        cycles_100 = 3;
        days = DAYS_PER_100_YEARS;
    }

    let cycles_4 = days / DAYS_PER_4_YEARS;
    days %= DAYS_PER_4_YEARS;

    let mut single_years = days / 365;
    days %= 365;
    if single_years == 4 {
        // Dec 31 of a leap year closing a 4-year block.
        single_years = 3;
        days = 365;
    }

    (
        400 * cycles_400 + 100 * cycles_100 + 4 * cycles_4 + single_years + 1,
        days,
    )
}

fn ordinal_to_month_day(day_of_year: i64, leap: bool) -> (u32, u32) {
    let table = if leap {
        &MONTH_DAYS_SUM_LEAP
    } else {
        &MONTH_DAYS_SUM
    };
    let index = table
        .iter()
        .rposition(|start| i64::from(*start) <= day_of_year)
        .unwrap_or(0);
    (
        index as u32 + 1,
        (day_of_year - i64::from(table[index])) as u32 + 1,
    )
}

fn day_start_tick(days: i64) -> Tick {
    if days > 0 {
        (days - 1) * TICK_DAY
    } else {
        days * TICK_DAY
    }
}

fn time_of_day(hour: u32, minute: u32, second: u32) -> Tick {
    i64::from(hour) * TICK_HOUR + i64::from(minute) * TICK_MIN + i64::from(second) * TICK_SEC
}

fn astronomical_year(year: i64) -> i64 {
    if year > 0 {
        year
    } else {
        year + 1
    }
}

fn historical_year(astronomical: i64) -> i64 {
    if astronomical > 0 {
        astronomical
    } else {
        astronomical - 1
    }
}

fn assert_month(month: u32) {
    assert!((1..=12).contains(&month), "month out of range: {month}");
}

fn assert_date(year: i64, month: u32, day: u32) {
    assert!(year != 0, "year 0 does not exist");
    let last = month_days(month, is_leap_year(year));
    assert!(
        (1..=last).contains(&day),
        "day out of range: {year}-{month}-{day}"
    );
}

fn assert_time(hour: u32, minute: u32, second: u32) {
    assert!(
        hour < 24 && minute < 60 && second < 60,
        "time out of range: {hour}:{minute}:{second}"
    );
}
