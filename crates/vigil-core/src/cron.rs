//! 5-field cron expression matching
//!
//! Evaluates standard `minute hour day-of-month month day-of-week`
//! expressions against a single instant. Supports `*`, comma lists, ranges
//! (`1-5`) and steps (`*/10`, `1-5/2`). Day-of-week accepts both 0 and 7 for
//! Sunday. Unlike standard cron there is no day-of-month/day-of-week OR
//! rule: when both fields are restricted, both must match.

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// A parsed cron expression, expanded to the set of matching values per field.
#[derive(Debug, Clone)]
pub struct CronExpr {
    minutes: BTreeSet<u8>,
    hours: BTreeSet<u8>,
    days_of_month: BTreeSet<u8>,
    months: BTreeSet<u8>,
    /// Normalized to 0=Sunday..6=Saturday
    days_of_week: BTreeSet<u8>,
}

impl CronExpr {
    /// Parse a 5-field cron expression.
    pub fn parse(expression: &str) -> Result<Self> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(Error::InvalidCron(format!(
                "expected 5 fields, got {}: '{}'",
                fields.len(),
                expression
            )));
        }

        let mut days_of_week = parse_field(fields[4], "day-of-week", 0, 7)?;
        // 0 and 7 both mean Sunday
        if days_of_week.remove(&7) {
            days_of_week.insert(0);
        }

        Ok(Self {
            minutes: parse_field(fields[0], "minute", 0, 59)?,
            hours: parse_field(fields[1], "hour", 0, 23)?,
            days_of_month: parse_field(fields[2], "day-of-month", 1, 31)?,
            months: parse_field(fields[3], "month", 1, 12)?,
            days_of_week,
        })
    }

    /// Return true if the given instant falls in a matching minute.
    pub fn matches(&self, instant: DateTime<Utc>) -> bool {
        let dow = instant.weekday().num_days_from_sunday() as u8;
        self.minutes.contains(&(instant.minute() as u8))
            && self.hours.contains(&(instant.hour() as u8))
            && self.days_of_month.contains(&(instant.day() as u8))
            && self.months.contains(&(instant.month() as u8))
            && self.days_of_week.contains(&dow)
    }
}

/// Parse and match in one step.
pub fn matches(expression: &str, instant: DateTime<Utc>) -> Result<bool> {
    Ok(CronExpr::parse(expression)?.matches(instant))
}

/// Expand one field into the set of matching integers within `[min, max]`.
fn parse_field(field: &str, name: &str, min: u8, max: u8) -> Result<BTreeSet<u8>> {
    let mut values = BTreeSet::new();

    for part in field.split(',') {
        if part.is_empty() {
            return Err(Error::InvalidCron(format!("{name}: empty element in '{field}'")));
        }

        let (base, step) = match part.split_once('/') {
            Some((base, step)) => {
                let step: u8 = step.parse().map_err(|_| {
                    Error::InvalidCron(format!("{name}: bad step in '{part}'"))
                })?;
                if step == 0 {
                    return Err(Error::InvalidCron(format!("{name}: zero step in '{part}'")));
                }
                (base, Some(step))
            }
            None => (part, None),
        };

        let (start, end) = if base == "*" {
            (min, max)
        } else if let Some((a, b)) = base.split_once('-') {
            let start = parse_value(a, name, min, max)?;
            let end = parse_value(b, name, min, max)?;
            if start > end {
                return Err(Error::InvalidCron(format!("{name}: reversed range '{base}'")));
            }
            (start, end)
        } else {
            if step.is_some() {
                // A stepped element needs a range to step over
                return Err(Error::InvalidCron(format!(
                    "{name}: step base must be '*' or a range in '{part}'"
                )));
            }
            let value = parse_value(base, name, min, max)?;
            (value, value)
        };

        let step = step.unwrap_or(1);
        values.extend((start..=end).step_by(step as usize));
    }

    Ok(values)
}

fn parse_value(raw: &str, name: &str, min: u8, max: u8) -> Result<u8> {
    let value: u8 = raw
        .parse()
        .map_err(|_| Error::InvalidCron(format!("{name}: bad value '{raw}'")))?;
    if value < min || value > max {
        return Err(Error::InvalidCron(format!(
            "{name}: {value} out of range {min}-{max}"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_wildcard_matches_any_minute() {
        assert!(matches("* * * * *", at(2026, 1, 5, 10, 32)).unwrap());
        assert!(matches("* * * * *", at(2026, 12, 31, 23, 59)).unwrap());
    }

    #[test]
    fn test_step_every_15_minutes() {
        let expr = CronExpr::parse("*/15 * * * *").unwrap();
        for minute in 0..60u32 {
            let instant = at(2026, 1, 5, 10, minute);
            assert_eq!(expr.matches(instant), minute % 15 == 0, "minute {minute}");
        }
    }

    #[test]
    fn test_weekday_mornings() {
        let expr = CronExpr::parse("0 9 * * 1-5").unwrap();
        // 2026-01-05 is a Monday, 2026-01-04 a Sunday
        assert!(expr.matches(at(2026, 1, 5, 9, 0)));
        assert!(!expr.matches(at(2026, 1, 4, 9, 0)));
        assert!(!expr.matches(at(2026, 1, 5, 9, 1)));
        assert!(!expr.matches(at(2026, 1, 5, 10, 0)));
    }

    #[test]
    fn test_sunday_is_both_zero_and_seven() {
        let sunday = at(2026, 1, 4, 0, 0);
        let monday = at(2026, 1, 5, 0, 0);
        for expr in ["0 0 * * 0", "0 0 * * 7"] {
            assert!(matches(expr, sunday).unwrap(), "{expr}");
            assert!(!matches(expr, monday).unwrap(), "{expr}");
        }
    }

    #[test]
    fn test_stepped_range() {
        let expr = CronExpr::parse("1-5/2 * * * *").unwrap();
        for minute in [1u32, 3, 5] {
            assert!(expr.matches(at(2026, 1, 5, 0, minute)));
        }
        for minute in [0u32, 2, 4, 6] {
            assert!(!expr.matches(at(2026, 1, 5, 0, minute)));
        }
    }

    #[test]
    fn test_comma_list() {
        let expr = CronExpr::parse("0 8,12,18 * * *").unwrap();
        assert!(expr.matches(at(2026, 1, 5, 8, 0)));
        assert!(expr.matches(at(2026, 1, 5, 12, 0)));
        assert!(expr.matches(at(2026, 1, 5, 18, 0)));
        assert!(!expr.matches(at(2026, 1, 5, 9, 0)));
    }

    #[test]
    fn test_both_dom_and_dow_must_match() {
        // No standard-cron OR rule: Friday the 13th only.
        let expr = CronExpr::parse("0 0 13 * 5").unwrap();
        // 2026-02-13 is a Friday
        assert!(expr.matches(at(2026, 2, 13, 0, 0)));
        // 2026-01-13 is a Tuesday: dom matches, dow does not
        assert!(!expr.matches(at(2026, 1, 13, 0, 0)));
        // 2026-01-16 is a Friday: dow matches, dom does not
        assert!(!expr.matches(at(2026, 1, 16, 0, 0)));
    }

    #[test]
    fn test_wrong_field_count_is_rejected() {
        assert!(matches!(
            CronExpr::parse("* * * *"),
            Err(Error::InvalidCron(_))
        ));
        assert!(matches!(
            CronExpr::parse("* * * * * *"),
            Err(Error::InvalidCron(_))
        ));
        assert!(matches!(CronExpr::parse(""), Err(Error::InvalidCron(_))));
    }

    #[test]
    fn test_malformed_fields_are_rejected() {
        for expr in [
            "a * * * *",     // not a number
            "60 * * * *",    // out of domain
            "* 24 * * *",    // out of domain
            "* * 0 * *",     // day-of-month starts at 1
            "* * * 13 *",    // out of domain
            "* * * * 8",     // day-of-week tops out at 7
            "5-1 * * * *",   // reversed range
            "*/0 * * * *",   // zero step
            "5/2 * * * *",   // step base must be * or a range
            ",5 * * * *",    // empty list element
        ] {
            assert!(
                matches!(CronExpr::parse(expr), Err(Error::InvalidCron(_))),
                "expected rejection: '{expr}'"
            );
        }
    }

    #[test]
    fn test_step_without_base_covers_full_domain() {
        let expr = CronExpr::parse("*/20 * * * *").unwrap();
        for minute in [0u32, 20, 40] {
            assert!(expr.matches(at(2026, 1, 5, 3, minute)));
        }
        assert!(!expr.matches(at(2026, 1, 5, 3, 10)));
    }

    #[test]
    fn test_specific_date() {
        let expr = CronExpr::parse("30 6 1 1 *").unwrap();
        assert!(expr.matches(at(2026, 1, 1, 6, 30)));
        assert!(!expr.matches(at(2026, 2, 1, 6, 30)));
    }
}
