use chrono::{Datelike, Months, NaiveDate};

use super::{BalanceOverflow, Totals, Transaction};

/// Range of salary days accepted in settings.
pub const SALARY_DAY_RANGE: std::ops::RangeInclusive<u32> = 1..=31;

/// First day of the budgeting period containing `today`.
///
/// Without a salary day the period is the calendar month. With one, the period
/// starts on the most recent salary day on or before `today`. Months shorter
/// than the salary day use their last day instead.
pub fn period_start(today: NaiveDate, salary_day: Option<u32>) -> NaiveDate {
    let first_of_month = today.with_day(1).unwrap_or(today);
    let Some(day) = salary_day else {
        return first_of_month;
    };

    let this_month = payday_in_month(first_of_month, day);
    if this_month <= today {
        return this_month;
    }

    let previous_month = first_of_month
        .checked_sub_months(Months::new(1))
        .unwrap_or(first_of_month);
    payday_in_month(previous_month, day)
}

fn payday_in_month(first_of_month: NaiveDate, day: u32) -> NaiveDate {
    let last_day = first_of_month
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28);
    first_of_month
        .with_day(day.clamp(1, last_day))
        .unwrap_or(first_of_month)
}

/// Transactions of a budgeting period together with their totals.
#[derive(Debug, Clone)]
pub struct PeriodSummary {
    pub start: NaiveDate,
    /// `(position, transaction)` pairs, positions relative to the full ledger
    pub entries: Vec<(usize, Transaction)>,
    pub totals: Totals,
}

/// Collect the ledger entries recorded on or after `start`.
pub fn summarize(
    transactions: &[Transaction],
    start: NaiveDate,
) -> Result<PeriodSummary, BalanceOverflow> {
    let entries: Vec<(usize, Transaction)> = transactions
        .iter()
        .enumerate()
        .filter(|(_, t)| t.timestamp.date_naive() >= start)
        .map(|(index, t)| (index + 1, t.clone()))
        .collect();
    let totals = Totals::of(entries.iter().map(|(_, t)| t))?;

    Ok(PeriodSummary {
        start,
        entries,
        totals,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::{Ledger, NewTransaction};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_calendar_month_without_salary_day() {
        assert_eq!(period_start(date("2024-03-17"), None), date("2024-03-01"));
    }

    #[test]
    fn test_salary_day_already_passed() {
        assert_eq!(period_start(date("2024-03-17"), Some(10)), date("2024-03-10"));
        assert_eq!(period_start(date("2024-03-10"), Some(10)), date("2024-03-10"));
    }

    #[test]
    fn test_salary_day_not_reached_yet() {
        assert_eq!(period_start(date("2024-03-05"), Some(25)), date("2024-02-25"));
        // January wraps to the previous year
        assert_eq!(period_start(date("2024-01-05"), Some(25)), date("2023-12-25"));
    }

    #[test]
    fn test_salary_day_clamped_to_short_month() {
        assert_eq!(period_start(date("2024-03-15"), Some(31)), date("2024-02-29"));
        assert_eq!(period_start(date("2023-02-28"), Some(30)), date("2023-02-28"));
    }

    #[test]
    fn test_summarize_keeps_ledger_positions() {
        let mut ledger = Ledger::new();
        ledger.append(
            NewTransaction::income(dec!(100))
                .with_timestamp(date("2024-02-20").and_hms_opt(9, 0, 0).unwrap().and_utc()),
        );
        ledger.append(
            NewTransaction::income(dec!(2000))
                .with_timestamp(date("2024-03-10").and_hms_opt(9, 0, 0).unwrap().and_utc()),
        );
        ledger.append(
            NewTransaction::expense(dec!(300))
                .with_timestamp(date("2024-03-12").and_hms_opt(18, 30, 0).unwrap().and_utc()),
        );

        let summary = summarize(ledger.entries(), date("2024-03-10")).unwrap();

        let positions: Vec<usize> = summary.entries.iter().map(|(p, _)| *p).collect();
        assert_eq!(positions, vec![2, 3]);
        assert_eq!(summary.totals.income, dec!(2000));
        assert_eq!(summary.totals.expense, dec!(300));
        assert_eq!(summary.totals.net(), dec!(1700));
    }
}
