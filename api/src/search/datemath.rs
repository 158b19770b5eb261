//! Relative date expressions such as `now-3d`, `now/d` or
//! `2024-03-01||+1M/d`, evaluated in the caller's timezone.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, Months, NaiveDate, NaiveDateTime, TimeZone,
    Timelike, Utc,
};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Unit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
}

impl Unit {
    fn from_char(ch: char) -> Option<Self> {
        match ch {
            'y' => Some(Unit::Year),
            'M' => Some(Unit::Month),
            'w' => Some(Unit::Week),
            'd' => Some(Unit::Day),
            'h' | 'H' => Some(Unit::Hour),
            'm' => Some(Unit::Minute),
            's' => Some(Unit::Second),
            _ => None,
        }
    }
}

/// Evaluate a date-math expression. Returns `None` when `expr` is not date
/// math or is malformed.
pub fn evaluate(expr: &str, now: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
    let expr = expr.trim();
    let starts_with_now = expr
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("now"));
    let (anchor, ops) = if starts_with_now {
        (now.with_timezone(&tz), &expr[3..])
    } else if let Some((anchor, ops)) = expr.split_once("||") {
        let anchor = parse_absolute(anchor, tz)?.with_timezone(&tz);
        (anchor, ops)
    } else {
        return None;
    };

    let mut current = anchor;
    let mut chars = ops.trim().chars().peekable();
    while let Some(op) = chars.next() {
        match op {
            '+' | '-' => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(d);
                    chars.next();
                }
                let amount: i64 = if digits.is_empty() {
                    1
                } else {
                    digits.parse().ok()?
                };
                let unit = Unit::from_char(chars.next()?)?;
                let amount = if op == '-' { -amount } else { amount };
                current = shift(current, amount, unit, tz)?;
            }
            '/' => {
                let unit = Unit::from_char(chars.next()?)?;
                current = round_down(current, unit, tz)?;
            }
            c if c.is_whitespace() => {}
            _ => return None,
        }
    }

    Some(current.with_timezone(&Utc))
}

/// Parse an absolute date or date-time. Literals without an offset are read
/// in `tz`.
pub fn parse_absolute(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    const DATE_TIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for format in DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return localize(tz, naive).map(|dt| dt.with_timezone(&Utc));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return start_of_day(tz, date);
    }

    // Last resort: plain year, month and day separated by '-', '/' or '.'
    let parts: Vec<&str> = raw.split(['-', '/', '.']).collect();
    if let [year, month, day] = parts.as_slice() {
        let date = NaiveDate::from_ymd_opt(
            year.trim().parse().ok()?,
            month.trim().parse().ok()?,
            day.trim().parse().ok()?,
        )?;
        return start_of_day(tz, date);
    }

    None
}

fn start_of_day(tz: Tz, date: NaiveDate) -> Option<DateTime<Utc>> {
    localize(tz, date.and_hms_opt(0, 0, 0)?).map(|dt| dt.with_timezone(&Utc))
}

/// Map a wall-clock time to an instant; times skipped by a DST jump move
/// forward by an hour.
fn localize(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest(),
    }
}

fn shift(dt: DateTime<Tz>, amount: i64, unit: Unit, tz: Tz) -> Option<DateTime<Tz>> {
    let naive = dt.naive_local();
    let months = |n: i64| Months::new(n.unsigned_abs() as u32);
    let shifted = match unit {
        Unit::Second => return dt.checked_add_signed(Duration::seconds(amount)),
        Unit::Minute => return dt.checked_add_signed(Duration::minutes(amount)),
        Unit::Hour => return dt.checked_add_signed(Duration::hours(amount)),
        Unit::Day => naive.checked_add_signed(Duration::days(amount))?,
        Unit::Week => naive.checked_add_signed(Duration::weeks(amount))?,
        Unit::Month if amount >= 0 => naive.checked_add_months(months(amount))?,
        Unit::Month => naive.checked_sub_months(months(amount))?,
        Unit::Year if amount >= 0 => naive.checked_add_months(months(amount * 12))?,
        Unit::Year => naive.checked_sub_months(months(amount * 12))?,
    };
    localize(tz, shifted)
}

fn round_down(dt: DateTime<Tz>, unit: Unit, tz: Tz) -> Option<DateTime<Tz>> {
    let naive = dt.naive_local();
    let date = naive.date();
    let rounded = match unit {
        Unit::Second => naive.with_nanosecond(0)?,
        Unit::Minute => naive.with_second(0)?.with_nanosecond(0)?,
        Unit::Hour => date.and_hms_opt(naive.hour(), 0, 0)?,
        Unit::Day => date.and_hms_opt(0, 0, 0)?,
        Unit::Week => {
            let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
            monday.and_hms_opt(0, 0, 0)?
        }
        Unit::Month => date.with_day(1)?.and_hms_opt(0, 0, 0)?,
        Unit::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)?.and_hms_opt(0, 0, 0)?,
    };
    localize(tz, rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_now() {
        let now = utc("2024-05-10T13:45:00Z");
        assert_eq!(evaluate("now", now, Tz::UTC), Some(now));
        assert_eq!(evaluate("NOW", now, Tz::UTC), Some(now));
    }

    #[test]
    fn test_offsets() {
        let now = utc("2024-05-10T13:45:00Z");
        assert_eq!(
            evaluate("now-3d", now, Tz::UTC),
            Some(utc("2024-05-07T13:45:00Z"))
        );
        assert_eq!(
            evaluate("now+1w-2h", now, Tz::UTC),
            Some(utc("2024-05-17T11:45:00Z"))
        );
        assert_eq!(
            evaluate("now+1M", now, Tz::UTC),
            Some(utc("2024-06-10T13:45:00Z"))
        );
        assert_eq!(
            evaluate("now-1y", now, Tz::UTC),
            Some(utc("2023-05-10T13:45:00Z"))
        );
    }

    #[test]
    fn test_rounding_uses_timezone() {
        let now = utc("2024-05-10T01:30:00Z");
        // 03:30 in Berlin (UTC+2), start of that day is 22:00 UTC the day before
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        assert_eq!(evaluate("now/d", now, tz), Some(utc("2024-05-09T22:00:00Z")));
        assert_eq!(
            evaluate("now/d", now, Tz::UTC),
            Some(utc("2024-05-10T00:00:00Z"))
        );
    }

    #[test]
    fn test_round_week_and_month() {
        // Friday
        let now = utc("2024-05-10T13:45:00Z");
        assert_eq!(
            evaluate("now/w", now, Tz::UTC),
            Some(utc("2024-05-06T00:00:00Z"))
        );
        assert_eq!(
            evaluate("now/M", now, Tz::UTC),
            Some(utc("2024-05-01T00:00:00Z"))
        );
    }

    #[test]
    fn test_absolute_anchor() {
        let now = utc("2024-05-10T13:45:00Z");
        assert_eq!(
            evaluate("2024-01-31||+1M", now, Tz::UTC),
            Some(utc("2024-02-29T00:00:00Z"))
        );
    }

    #[test]
    fn test_not_date_math() {
        let now = utc("2024-05-10T13:45:00Z");
        assert_eq!(evaluate("2024-01-01", now, Tz::UTC), None);
        assert_eq!(evaluate("now-3x", now, Tz::UTC), None);
        assert_eq!(evaluate("nowhere", now, Tz::UTC), None);
    }

    #[test]
    fn test_parse_absolute_formats() {
        let expected = utc("2024-03-05T00:00:00Z");
        assert_eq!(parse_absolute("2024-03-05", Tz::UTC), Some(expected));
        assert_eq!(parse_absolute("2024/3/5", Tz::UTC), Some(expected));
        assert_eq!(
            parse_absolute("2024-03-05 14:30", Tz::UTC),
            Some(utc("2024-03-05T14:30:00Z"))
        );
        assert_eq!(
            parse_absolute("2024-03-05T14:30:00+02:00", Tz::UTC),
            Some(utc("2024-03-05T12:30:00Z"))
        );
        assert_eq!(parse_absolute("yesterday", Tz::UTC), None);
    }

    #[test]
    fn test_parse_absolute_in_timezone() {
        let tz: Tz = "America/New_York".parse().unwrap();
        assert_eq!(
            parse_absolute("2024-01-15 09:00", tz),
            Some(utc("2024-01-15T14:00:00Z"))
        );
    }
}
