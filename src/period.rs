//! Calendar arithmetic over [`PeriodKind`] buckets.
//!
//! All functions are pure and operate on zone-less UTC instants
//! (`NaiveDateTime`). A period's end is its last representable nanosecond,
//! so `[beginning_of, end_of]` is an inclusive window that matches the
//! `date >= ? AND date <= ?` predicates the dispatcher generates.

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};

use crate::types::PeriodKind;

/// Number of periods in the default window when the caller gives no start.
pub const DEFAULT_PERIOD_RANGE_LENGTH: usize = 90;

fn quarter_of(month: u32) -> u32 {
    (month - 1) / 3 + 1
}

/// First calendar day of the period containing `date`.
fn first_day(date: NaiveDate, period: PeriodKind) -> NaiveDate {
    match period {
        PeriodKind::Date => date,
        PeriodKind::Month => date.with_day(1).unwrap_or(date),
        PeriodKind::Quarter => {
            let month = (quarter_of(date.month()) - 1) * 3 + 1;
            NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
        }
        PeriodKind::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
    }
}

/// First calendar day of the period after the one containing `date`.
/// `None` only at the end of chrono's representable range.
fn next_first_day(date: NaiveDate, period: PeriodKind) -> Option<NaiveDate> {
    let first = first_day(date, period);
    match period {
        PeriodKind::Date => first.succ_opt(),
        PeriodKind::Month => first.checked_add_months(Months::new(1)),
        PeriodKind::Quarter => first.checked_add_months(Months::new(3)),
        PeriodKind::Year => first.checked_add_months(Months::new(12)),
    }
}

/// Midnight at the start of the period containing `t`.
pub fn beginning_of(t: NaiveDateTime, period: PeriodKind) -> NaiveDateTime {
    first_day(t.date(), period).and_time(NaiveTime::MIN)
}

/// Last instant of the period containing `t`.
pub fn end_of(t: NaiveDateTime, period: PeriodKind) -> NaiveDateTime {
    next_first_day(t.date(), period)
        .and_then(|next| {
            next.and_time(NaiveTime::MIN)
                .checked_sub_signed(TimeDelta::nanoseconds(1))
        })
        .unwrap_or(NaiveDateTime::MAX)
}

/// Beginning of the period before the one containing `t`.
pub fn backward(t: NaiveDateTime, period: PeriodKind) -> NaiveDateTime {
    let start = beginning_of(t, period);
    match start.checked_sub_signed(TimeDelta::nanoseconds(1)) {
        Some(just_before) => beginning_of(just_before, period),
        None => start,
    }
}

/// Beginning of the period after the one containing `t`.
///
/// Saturates at the beginning of the current period when the calendar runs
/// out, so callers stepping forward must check for progress.
pub fn forward(t: NaiveDateTime, period: PeriodKind) -> NaiveDateTime {
    match next_first_day(t.date(), period) {
        Some(next) => next.and_time(NaiveTime::MIN),
        None => beginning_of(t, period),
    }
}

/// The next coarser granularity; `year` is its own ceiling.
pub fn next_level(period: PeriodKind) -> PeriodKind {
    match period {
        PeriodKind::Date => PeriodKind::Month,
        PeriodKind::Month => PeriodKind::Quarter,
        PeriodKind::Quarter | PeriodKind::Year => PeriodKind::Year,
    }
}

/// Snap a window to whole periods.
///
/// A missing `end` means now. A missing `beginning` produces a window of
/// exactly [`DEFAULT_PERIOD_RANGE_LENGTH`] periods ending at `end`.
pub fn align_range(
    beginning: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    period: PeriodKind,
) -> (NaiveDateTime, NaiveDateTime) {
    let end = end_of(end.unwrap_or_else(|| Utc::now().naive_utc()), period);

    let beginning = match beginning {
        Some(b) => beginning_of(b, period),
        None => {
            let mut b = beginning_of(end, period);
            for _ in 1..DEFAULT_PERIOD_RANGE_LENGTH {
                b = backward(b, period);
            }
            b
        }
    };

    (beginning, end)
}

/// Short label for the period containing `t`: `2021/03/07`, `2021/03`,
/// `2021/Q1` or `2021`.
pub fn format_period(t: NaiveDateTime, period: PeriodKind) -> String {
    match period {
        PeriodKind::Date => t.format("%Y/%m/%d").to_string(),
        PeriodKind::Month => t.format("%Y/%m").to_string(),
        PeriodKind::Quarter => format!("{}/Q{}", t.format("%Y"), quarter_of(t.month())),
        PeriodKind::Year => t.format("%Y").to_string(),
    }
}

/// Labels of every period from `start` to `end` inclusive.
pub fn period_range(start: NaiveDateTime, end: NaiveDateTime, period: PeriodKind) -> Vec<String> {
    let mut labels = Vec::new();
    let mut cursor = beginning_of(start, period);
    if start > end {
        return labels;
    }
    while cursor <= end {
        labels.push(format_period(cursor, period));
        let next = forward(cursor, period);
        if next <= cursor {
            break;
        }
        cursor = next;
    }
    labels
}

/// Display name of a period-over-period comparison.
pub fn xox_name(period: PeriodKind) -> &'static str {
    match period {
        PeriodKind::Date => "Day-on-Day",
        PeriodKind::Month => "Month-on-Month",
        PeriodKind::Quarter => "Quarter-on-Quarter",
        PeriodKind::Year => "Year-on-Year",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDateTime {
        at(y, m, d, 0, 0, 0)
    }

    #[test]
    fn beginning_of_each_period() {
        let t = at(2021, 8, 17, 13, 45, 2);
        assert_eq!(beginning_of(t, PeriodKind::Date), day(2021, 8, 17));
        assert_eq!(beginning_of(t, PeriodKind::Month), day(2021, 8, 1));
        assert_eq!(beginning_of(t, PeriodKind::Quarter), day(2021, 7, 1));
        assert_eq!(beginning_of(t, PeriodKind::Year), day(2021, 1, 1));
    }

    #[test]
    fn end_of_is_last_nanosecond() {
        let t = at(2020, 2, 10, 8, 0, 0);
        let end = end_of(t, PeriodKind::Month);
        assert_eq!(end.date(), NaiveDate::from_ymd_opt(2020, 2, 29).unwrap());
        assert_eq!(end + TimeDelta::nanoseconds(1), day(2020, 3, 1));

        let q_end = end_of(t, PeriodKind::Quarter);
        assert_eq!(q_end + TimeDelta::nanoseconds(1), day(2020, 4, 1));

        let y_end = end_of(t, PeriodKind::Year);
        assert_eq!(y_end + TimeDelta::nanoseconds(1), day(2021, 1, 1));
    }

    #[test]
    fn backward_and_forward_cross_year_boundaries() {
        assert_eq!(backward(day(2021, 1, 1), PeriodKind::Date), day(2020, 12, 31));
        assert_eq!(backward(day(2021, 1, 15), PeriodKind::Month), day(2020, 12, 1));
        assert_eq!(backward(day(2021, 2, 15), PeriodKind::Quarter), day(2020, 10, 1));
        assert_eq!(forward(day(2020, 12, 31), PeriodKind::Date), day(2021, 1, 1));
        assert_eq!(forward(day(2020, 11, 30), PeriodKind::Quarter), day(2021, 1, 1));
        assert_eq!(forward(day(2020, 6, 30), PeriodKind::Year), day(2021, 1, 1));
    }

    #[test]
    fn forward_from_month_end_lands_on_next_month() {
        // Jan 31 + 1 month must not clamp into February's last day.
        assert_eq!(forward(day(2021, 1, 31), PeriodKind::Month), day(2021, 2, 1));
    }

    #[test]
    fn next_level_ceiling() {
        assert_eq!(next_level(PeriodKind::Date), PeriodKind::Month);
        assert_eq!(next_level(PeriodKind::Month), PeriodKind::Quarter);
        assert_eq!(next_level(PeriodKind::Quarter), PeriodKind::Year);
        assert_eq!(next_level(PeriodKind::Year), PeriodKind::Year);
    }

    #[test]
    fn align_range_default_window_has_ninety_days() {
        let (start, end) = align_range(None, Some(at(2021, 5, 10, 9, 0, 0)), PeriodKind::Date);
        assert_eq!(end, end_of(day(2021, 5, 10), PeriodKind::Date));
        let labels = period_range(start, end, PeriodKind::Date);
        assert_eq!(labels.len(), DEFAULT_PERIOD_RANGE_LENGTH);
        assert_eq!(labels.last().unwrap(), "2021/05/10");
        assert_eq!(labels.first().unwrap(), "2021/02/10");
    }

    #[test]
    fn align_range_snaps_explicit_beginning() {
        let (start, end) = align_range(
            Some(at(2021, 2, 14, 10, 0, 0)),
            Some(day(2021, 5, 3)),
            PeriodKind::Quarter,
        );
        assert_eq!(start, day(2021, 1, 1));
        assert_eq!(end + TimeDelta::nanoseconds(1), day(2021, 7, 1));
    }

    #[test]
    fn format_period_labels() {
        let t = day(2021, 11, 3);
        assert_eq!(format_period(t, PeriodKind::Date), "2021/11/03");
        assert_eq!(format_period(t, PeriodKind::Month), "2021/11");
        assert_eq!(format_period(t, PeriodKind::Quarter), "2021/Q4");
        assert_eq!(format_period(day(2021, 4, 1), PeriodKind::Quarter), "2021/Q2");
        assert_eq!(format_period(t, PeriodKind::Year), "2021");
    }

    #[test]
    fn period_range_quarters_are_distinct_and_ordered() {
        let labels = period_range(
            day(2020, 10, 1),
            end_of(day(2021, 6, 1), PeriodKind::Quarter),
            PeriodKind::Quarter,
        );
        assert_eq!(labels, vec!["2020/Q4", "2021/Q1", "2021/Q2"]);
    }

    #[test]
    fn period_range_empty_when_start_after_end() {
        assert!(period_range(day(2021, 2, 1), day(2021, 1, 1), PeriodKind::Date).is_empty());
    }

    #[test]
    fn period_range_single_period() {
        let labels = period_range(day(2021, 3, 1), day(2021, 3, 1), PeriodKind::Month);
        assert_eq!(labels, vec!["2021/03"]);
    }

    #[test]
    fn xox_names() {
        assert_eq!(xox_name(PeriodKind::Date), "Day-on-Day");
        assert_eq!(xox_name(PeriodKind::Year), "Year-on-Year");
    }
}
