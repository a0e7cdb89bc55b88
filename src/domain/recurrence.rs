//! Recurrence evaluation
//!
//! Pure calendar arithmetic that maps an occurrence date to the next one.
//! An out-of-range day-of-month moves to the last day of the target month.

use chrono::{Datelike, Days, Months, NaiveDate};

use super::{Frequency, Interval};

/// Compute the occurrence that follows `date`.
///
/// - DAILY: `date + interval` days
/// - WEEKLY: `date + 7 * interval` days
/// - MONTHLY: `interval` calendar months, day clamped to the month's end
/// - YEARLY: `interval` years, Feb 29 clamped to Feb 28 in common years
///
/// Total and deterministic. A result past chrono's representable range
/// saturates at `NaiveDate::MAX`, which is later than any sweep date, so the
/// definition simply stops being due.
pub fn next_occurrence(date: NaiveDate, frequency: Frequency, interval: Interval) -> NaiveDate {
    next_occurrence_on_day(date, frequency, interval, date.day())
}

/// Same as [`next_occurrence`], but MONTHLY and YEARLY land on `anchor_day`
/// (clamped to the target month) instead of on `date`'s own day.
///
/// A schedule anchored on the 31st therefore goes Jan 31, Feb 29, Mar 31
/// rather than drifting to the 29th after the first short month.
pub fn next_occurrence_on_day(
    date: NaiveDate,
    frequency: Frequency,
    interval: Interval,
    anchor_day: u32,
) -> NaiveDate {
    let n = interval.get();
    let next = match frequency {
        Frequency::Daily => date.checked_add_days(Days::new(u64::from(n))),
        Frequency::Weekly => date.checked_add_days(Days::new(u64::from(n) * 7)),
        Frequency::Monthly => add_months_on_day(date, n, anchor_day),
        Frequency::Yearly => n
            .checked_mul(12)
            .and_then(|months| add_months_on_day(date, months, anchor_day)),
    };
    next.unwrap_or(NaiveDate::MAX)
}

fn add_months_on_day(date: NaiveDate, months: u32, day: u32) -> Option<NaiveDate> {
    let first_of_month = date.with_day(1)?.checked_add_months(Months::new(months))?;
    (1..=day.clamp(1, 31))
        .rev()
        .find_map(|d| first_of_month.with_day(d))
}

/// Iterator over scheduled dates, starting at (and including) a cursor.
#[derive(Debug, Clone)]
pub struct Occurrences {
    cursor: Option<NaiveDate>,
    frequency: Frequency,
    interval: Interval,
    anchor_day: u32,
    end_date: Option<NaiveDate>,
}

impl Occurrences {
    pub fn anchored(
        cursor: NaiveDate,
        frequency: Frequency,
        interval: Interval,
        anchor_day: u32,
        end_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            cursor: Some(cursor),
            frequency,
            interval,
            anchor_day,
            end_date,
        }
    }
}

impl Iterator for Occurrences {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.cursor?;
        if self.end_date.is_some_and(|end| current > end) {
            self.cursor = None;
            return None;
        }

        let following =
            next_occurrence_on_day(current, self.frequency, self.interval, self.anchor_day);
        // Saturated: nothing representable comes after this one
        self.cursor = (following > current).then_some(following);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn interval(n: i64) -> Interval {
        Interval::new(n).unwrap()
    }

    #[test]
    fn test_monthly_clamps_to_leap_day() {
        assert_eq!(
            next_occurrence(date(2024, 1, 31), Frequency::Monthly, Interval::ONE),
            date(2024, 2, 29)
        );
    }

    #[test]
    fn test_monthly_clamps_to_feb_28_in_common_year() {
        assert_eq!(
            next_occurrence(date(2023, 1, 31), Frequency::Monthly, Interval::ONE),
            date(2023, 2, 28)
        );
    }

    #[test]
    fn test_monthly_clamps_to_30_day_month() {
        assert_eq!(
            next_occurrence(date(2024, 3, 31), Frequency::Monthly, Interval::ONE),
            date(2024, 4, 30)
        );
        assert_eq!(
            next_occurrence(date(2024, 8, 31), Frequency::Monthly, interval(3)),
            date(2024, 11, 30)
        );
    }

    #[test]
    fn test_monthly_crosses_year_boundary() {
        assert_eq!(
            next_occurrence(date(2024, 11, 15), Frequency::Monthly, interval(2)),
            date(2025, 1, 15)
        );
        assert_eq!(
            next_occurrence(date(2024, 12, 31), Frequency::Monthly, interval(14)),
            date(2026, 2, 28)
        );
    }

    #[test]
    fn test_yearly_clamps_leap_day() {
        assert_eq!(
            next_occurrence(date(2024, 2, 29), Frequency::Yearly, interval(3)),
            date(2027, 2, 28)
        );
        assert_eq!(
            next_occurrence(date(2024, 2, 29), Frequency::Yearly, interval(4)),
            date(2028, 2, 29)
        );
    }

    #[test]
    fn test_daily_and_weekly() {
        assert_eq!(
            next_occurrence(date(2024, 2, 28), Frequency::Daily, Interval::ONE),
            date(2024, 2, 29)
        );
        assert_eq!(
            next_occurrence(date(2024, 12, 30), Frequency::Daily, interval(3)),
            date(2025, 1, 2)
        );
        assert_eq!(
            next_occurrence(date(2024, 1, 1), Frequency::Weekly, interval(2)),
            date(2024, 1, 15)
        );
    }

    #[test]
    fn test_strictly_monotonic_for_all_frequencies() {
        let starts = [
            date(2023, 1, 31),
            date(2024, 2, 29),
            date(2024, 12, 31),
            date(2025, 6, 15),
        ];

        for frequency in Frequency::ALL {
            for n in [1, 2, 5, 12, 400] {
                for start in starts {
                    let mut seen = std::collections::HashSet::new();
                    let mut current = start;
                    for _ in 0..50 {
                        assert!(seen.insert(current), "{frequency} x{n} revisited {current}");
                        let next = next_occurrence(current, frequency, interval(n));
                        assert!(next > current, "{frequency} x{n}: {next} <= {current}");
                        current = next;
                    }
                }
            }
        }
    }

    #[test]
    fn test_saturates_at_max_date() {
        let huge = interval(i64::from(i32::MAX));
        assert_eq!(
            next_occurrence(date(2024, 1, 1), Frequency::Yearly, huge),
            NaiveDate::MAX
        );
    }

    #[test]
    fn test_occurrences_unbounded() {
        let dates: Vec<NaiveDate> =
            Occurrences::anchored(date(2024, 1, 1), Frequency::Weekly, Interval::ONE, 1, None)
                .take(3)
                .collect();

        assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 1, 8), date(2024, 1, 15)]);
    }

    #[test]
    fn test_occurrences_empty_when_cursor_past_end() {
        let mut occurrences = Occurrences::anchored(
            date(2024, 3, 2),
            Frequency::Daily,
            Interval::ONE,
            2,
            Some(date(2024, 3, 1)),
        );
        assert_eq!(occurrences.next(), None);
    }

    #[test]
    fn test_anchored_monthly_does_not_drift() {
        let anchor = 31;
        let feb = next_occurrence_on_day(date(2024, 1, 31), Frequency::Monthly, Interval::ONE, anchor);
        assert_eq!(feb, date(2024, 2, 29));
        let mar = next_occurrence_on_day(feb, Frequency::Monthly, Interval::ONE, anchor);
        assert_eq!(mar, date(2024, 3, 31));
        let apr = next_occurrence_on_day(mar, Frequency::Monthly, Interval::ONE, anchor);
        assert_eq!(apr, date(2024, 4, 30));

        // Unanchored arithmetic keeps the clamped day
        assert_eq!(
            next_occurrence(feb, Frequency::Monthly, Interval::ONE),
            date(2024, 3, 29)
        );
    }

    #[test]
    fn test_anchored_yearly_returns_to_leap_day() {
        let mut current = date(2024, 2, 29);
        let mut dates = Vec::new();
        for _ in 0..4 {
            current = next_occurrence_on_day(current, Frequency::Yearly, Interval::ONE, 29);
            dates.push(current);
        }
        assert_eq!(
            dates,
            vec![date(2025, 2, 28), date(2026, 2, 28), date(2027, 2, 28), date(2028, 2, 29)]
        );
    }

    #[test]
    fn test_anchored_occurrences() {
        let dates: Vec<NaiveDate> = Occurrences::anchored(
            date(2024, 1, 31),
            Frequency::Monthly,
            Interval::ONE,
            31,
            Some(date(2024, 4, 30)),
        )
        .collect();

        assert_eq!(
            dates,
            vec![date(2024, 1, 31), date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30)]
        );
    }
}
