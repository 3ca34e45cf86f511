//! Datetime generator: compiles a strftime-like pattern into a token
//! program, executed against a broken-down time plus microseconds.
//!
//! Fixed-width numeric tokens are rendered with a hand-rolled zero-padding
//! writer rather than `format!`, avoiding the generic formatting machinery
//! on this hot path.

use chrono::{DateTime, Datelike, Local, Offset, TimeZone, Timelike, Utc};
use std::fmt::Write;

use crate::error::{LoglyError, Result};

/// Zero-pads `value` to `width` decimal digits and appends it to `out`.
fn fill(out: &mut String, mut value: i64, width: usize) {
    let mut digits = [0u8; 20];
    let negative = value < 0;
    if negative {
        value = -value;
    }
    let mut n = 0;
    loop {
        digits[n] = (value % 10) as u8;
        value /= 10;
        n += 1;
        if value == 0 {
            break;
        }
    }
    if negative {
        out.push('-');
    }
    for _ in n..width {
        out.push('0');
    }
    for i in (0..n).rev() {
        out.push((b'0' + digits[i]) as char);
    }
}

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// A single compiled step of a datetime pattern.
#[derive(Debug, Clone)]
enum Token {
    Literal(String),
    FullYear,
    ShortYear,
    Century,
    NumericMonth,
    FullMonthName,
    AbbrevMonthName,
    FullWeekdayName,
    AbbrevWeekdayName,
    WeekOfYearSunday,
    WeekOfYearMonday,
    DayOfYear,
    MonthDay,
    MonthDaySpace,
    Hour24,
    Hour12,
    Minute,
    Second,
    AmPm,
    UtcOffset,
    TimeZoneName,
    LocaleDateTime,
    UsDate,
    IsoDate,
    IsoTime,
    Microseconds,
    EpochSeconds,
    EpochSecondsAlt,
    Percent,
}

/// A compiled datetime pattern, ready to be applied repeatedly.
#[derive(Debug, Clone)]
pub struct DatetimeGenerator {
    tokens: Vec<Token>,
}

/// Calendar fields plus microseconds passed to [`DatetimeGenerator::apply`].
///
/// Mirrors the C++ original's `context_t { tm, usec }` pairing of a broken
/// down time with sub-second precision the `struct tm` cannot carry.
#[derive(Debug, Clone, Copy)]
pub struct BrokenDownTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub weekday: u32,
    pub day_of_year: u32,
    pub microsecond: u32,
    pub utc_offset_seconds: i32,
}

impl BrokenDownTime {
    /// Breaks down a UTC instant.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self::from_parts(&dt, 0)
    }

    /// Breaks down a local-time instant.
    pub fn from_local(dt: DateTime<Local>) -> Self {
        let offset = dt.offset().fix().local_minus_utc();
        Self::from_parts(&dt, offset)
    }

    fn from_parts<Tz: TimeZone>(dt: &DateTime<Tz>, utc_offset_seconds: i32) -> Self {
        BrokenDownTime {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
            weekday: dt.weekday().num_days_from_sunday(),
            day_of_year: dt.ordinal(),
            microsecond: dt.timestamp_subsec_micros(),
            utc_offset_seconds,
        }
    }
}

impl DatetimeGenerator {
    /// Compiles `pattern` into a token program.
    ///
    /// Recognizes the standard strftime directive set plus `%f` (six-digit
    /// microseconds) and `%s`/`%Es` (epoch seconds, alternative form
    /// UTC-offset adjusted). A `%` not followed by a recognized directive
    /// is a [`LoglyError::ParseError`].
    pub fn compile(pattern: &str) -> Result<Self> {
        let bytes = pattern.as_bytes();
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut i = 0;
        macro_rules! flush_literal {
            () => {
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
            };
        }
        while i < bytes.len() {
            if bytes[i] != b'%' {
                let start = i;
                while i < bytes.len() && bytes[i] != b'%' {
                    i += 1;
                }
                literal.push_str(&pattern[start..i]);
                continue;
            }
            // bytes[i] == '%'
            if i + 1 >= bytes.len() {
                return Err(LoglyError::ParseError {
                    pos: i,
                    message: "dangling '%' at end of pattern".to_string(),
                    snippet: pattern[i..].to_string(),
                });
            }
            let (token, consumed) = if bytes[i + 1] == b'E' && i + 2 < bytes.len() && bytes[i + 2] == b's' {
                (Token::EpochSecondsAlt, 3)
            } else {
                let c = bytes[i + 1] as char;
                let token = match c {
                    'Y' => Token::FullYear,
                    'y' => Token::ShortYear,
                    'C' => Token::Century,
                    'm' => Token::NumericMonth,
                    'B' => Token::FullMonthName,
                    'b' | 'h' => Token::AbbrevMonthName,
                    'A' => Token::FullWeekdayName,
                    'a' => Token::AbbrevWeekdayName,
                    'U' => Token::WeekOfYearSunday,
                    'W' => Token::WeekOfYearMonday,
                    'j' => Token::DayOfYear,
                    'd' => Token::MonthDay,
                    'e' => Token::MonthDaySpace,
                    'H' => Token::Hour24,
                    'I' => Token::Hour12,
                    'M' => Token::Minute,
                    'S' => Token::Second,
                    'p' => Token::AmPm,
                    'z' => Token::UtcOffset,
                    'Z' => Token::TimeZoneName,
                    'c' => Token::LocaleDateTime,
                    'D' => Token::UsDate,
                    'F' => Token::IsoDate,
                    'T' => Token::IsoTime,
                    'f' => Token::Microseconds,
                    's' => Token::EpochSeconds,
                    '%' => Token::Percent,
                    other => {
                        return Err(LoglyError::ParseError {
                            pos: i,
                            message: format!("unrecognized strftime directive '%{other}'"),
                            snippet: pattern[i..(i + 2).min(pattern.len())].to_string(),
                        });
                    }
                };
                (token, 2)
            };
            flush_literal!();
            tokens.push(token);
            i += consumed;
        }
        flush_literal!();
        Ok(DatetimeGenerator { tokens })
    }

    /// Runs the compiled token program against `tm`, writing into `out`.
    pub fn apply(&self, tm: &BrokenDownTime, out: &mut String) {
        for token in &self.tokens {
            match token {
                Token::Literal(s) => out.push_str(s),
                Token::FullYear => fill(out, tm.year as i64, 4),
                Token::ShortYear => fill(out, (tm.year % 100) as i64, 2),
                Token::Century => fill(out, (tm.year / 100) as i64, 2),
                Token::NumericMonth => fill(out, tm.month as i64, 2),
                Token::FullMonthName => {
                    out.push_str(MONTH_NAMES[(tm.month as usize).saturating_sub(1) % 12])
                }
                Token::AbbrevMonthName => {
                    out.push_str(&MONTH_NAMES[(tm.month as usize).saturating_sub(1) % 12][..3])
                }
                Token::FullWeekdayName => out.push_str(WEEKDAY_NAMES[tm.weekday as usize % 7]),
                Token::AbbrevWeekdayName => {
                    out.push_str(&WEEKDAY_NAMES[tm.weekday as usize % 7][..3])
                }
                Token::WeekOfYearSunday => fill(out, week_of_year(tm.day_of_year, tm.weekday), 2),
                Token::WeekOfYearMonday => {
                    fill(out, week_of_year(tm.day_of_year, (tm.weekday + 6) % 7), 2)
                }
                Token::DayOfYear => fill(out, tm.day_of_year as i64, 3),
                Token::MonthDay => fill(out, tm.day as i64, 2),
                Token::MonthDaySpace => {
                    if tm.day < 10 {
                        out.push(' ');
                        out.push((b'0' + tm.day as u8) as char);
                    } else {
                        fill(out, tm.day as i64, 2);
                    }
                }
                Token::Hour24 => fill(out, tm.hour as i64, 2),
                Token::Hour12 => {
                    let h12 = tm.hour % 12;
                    fill(out, if h12 == 0 { 12 } else { h12 as i64 }, 2)
                }
                Token::Minute => fill(out, tm.minute as i64, 2),
                Token::Second => fill(out, tm.second as i64, 2),
                Token::AmPm => out.push_str(if tm.hour < 12 { "AM" } else { "PM" }),
                Token::UtcOffset => write_utc_offset(out, tm.utc_offset_seconds),
                Token::TimeZoneName => out.push_str(if tm.utc_offset_seconds == 0 { "UTC" } else { "" }),
                Token::LocaleDateTime => {
                    out.push_str(&WEEKDAY_NAMES[tm.weekday as usize % 7][..3]);
                    out.push(' ');
                    out.push_str(&MONTH_NAMES[(tm.month as usize).saturating_sub(1) % 12][..3]);
                    out.push(' ');
                    if tm.day < 10 {
                        out.push(' ');
                        out.push((b'0' + tm.day as u8) as char);
                    } else {
                        fill(out, tm.day as i64, 2);
                    }
                    out.push(' ');
                    fill(out, tm.hour as i64, 2);
                    out.push(':');
                    fill(out, tm.minute as i64, 2);
                    out.push(':');
                    fill(out, tm.second as i64, 2);
                    out.push(' ');
                    fill(out, tm.year as i64, 4);
                }
                Token::UsDate => {
                    fill(out, tm.month as i64, 2);
                    out.push('/');
                    fill(out, tm.day as i64, 2);
                    out.push('/');
                    fill(out, (tm.year % 100) as i64, 2);
                }
                Token::IsoDate => {
                    fill(out, tm.year as i64, 4);
                    out.push('-');
                    fill(out, tm.month as i64, 2);
                    out.push('-');
                    fill(out, tm.day as i64, 2);
                }
                Token::IsoTime => {
                    fill(out, tm.hour as i64, 2);
                    out.push(':');
                    fill(out, tm.minute as i64, 2);
                    out.push(':');
                    fill(out, tm.second as i64, 2);
                }
                Token::Microseconds => fill(out, tm.microsecond as i64, 6),
                Token::EpochSeconds => {
                    let secs = epoch_seconds(tm);
                    let _ = write!(out, "{secs}");
                }
                Token::EpochSecondsAlt => {
                    let secs = epoch_seconds(tm) - tm.utc_offset_seconds as i64;
                    let _ = write!(out, "{secs}");
                }
                Token::Percent => out.push('%'),
            }
        }
    }
}

fn epoch_seconds(tm: &BrokenDownTime) -> i64 {
    Utc.with_ymd_and_hms(tm.year, tm.month, tm.day, tm.hour, tm.minute, tm.second)
        .single()
        .map(|dt| dt.timestamp())
        .unwrap_or(0)
}

fn write_utc_offset(out: &mut String, offset_seconds: i32) {
    let sign = if offset_seconds < 0 { '-' } else { '+' };
    let abs = offset_seconds.unsigned_abs();
    out.push(sign);
    fill(out, (abs / 3600) as i64, 2);
    fill(out, (abs % 3600 / 60) as i64, 2);
}

/// Week number of the year. Callers pre-rotate `weekday` (0 = start-of-week
/// day, already aligned to Sunday- or Monday-start before calling this).
fn week_of_year(day_of_year: u32, weekday: u32) -> i64 {
    let adjusted = day_of_year as i64 + 6 - weekday as i64;
    (adjusted / 7).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tm() -> BrokenDownTime {
        // 2014-02-23 12:20:30, a Sunday.
        BrokenDownTime {
            year: 2014,
            month: 2,
            day: 23,
            hour: 12,
            minute: 20,
            second: 30,
            weekday: 0,
            day_of_year: 54,
            microsecond: 42,
            utc_offset_seconds: 0,
        }
    }

    #[test]
    fn default_pattern_renders_with_zero_padded_microseconds() {
        let gen = DatetimeGenerator::compile("%Y-%m-%d %H:%M:%S.%f").unwrap();
        let mut out = String::new();
        gen.apply(&sample_tm(), &mut out);
        assert_eq!(out, "2014-02-23 12:20:30.000042");
    }

    #[test]
    fn literal_runs_and_percent_escape_round_trip() {
        let gen = DatetimeGenerator::compile("100%% at %H").unwrap();
        let mut out = String::new();
        gen.apply(&sample_tm(), &mut out);
        assert_eq!(out, "100% at 12");
    }

    #[test]
    fn unrecognized_directive_is_a_parse_error() {
        let err = DatetimeGenerator::compile("%Q").unwrap_err();
        match err {
            LoglyError::ParseError { pos, .. } => assert_eq!(pos, 0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn iso_and_us_date_forms() {
        let gen = DatetimeGenerator::compile("%F %D").unwrap();
        let mut out = String::new();
        gen.apply(&sample_tm(), &mut out);
        assert_eq!(out, "2014-02-23 02/23/14");
    }

    #[test]
    fn hour12_and_ampm() {
        let gen = DatetimeGenerator::compile("%I %p").unwrap();
        let mut out = String::new();
        gen.apply(&sample_tm(), &mut out);
        assert_eq!(out, "12 PM");
    }
}
