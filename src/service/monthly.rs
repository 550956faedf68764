use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::MySqlPool;

use crate::engine::status::{
    DEFAULT_FULL_DAY_MINUTES, DEFAULT_MIN_WORK_MINUTES, DayInput, StatusPolicy,
    resolve_daily_status,
};
use crate::error::{Error, Result};
use crate::model::{AttendanceRecord, HolidaySet};
use crate::service::filter::RosterFilter;
use crate::service::{
    RosterEmployee, fetch_company_records, fetch_company_roster, fetch_holiday_sets,
    index_records,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonthlyTotals {
    pub present: u32,
    pub absent: u32,
    pub holiday: u32,
    pub unmarked: u32,
    pub not_applicable: u32,
}

/// One grid line: a letter per day of the range plus per-code totals.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyRow {
    pub employee_id: u64,
    pub employee_code: String,
    pub employee_name: String,
    pub codes: String,
    pub totals: MonthlyTotals,
}

/// Pure grid assembly under the CheckInOnly policy: `P` for any day with a
/// check-in, regardless of checkout or lateness. A looser rule than
/// Daily/History, kept as its own policy on purpose.
pub(crate) fn assemble_monthly(
    from: NaiveDate,
    to: NaiveDate,
    now: NaiveDateTime,
    roster: &[RosterEmployee],
    records: &HashMap<u64, HashMap<NaiveDate, AttendanceRecord>>,
    holidays: &HashMap<u64, HolidaySet>,
) -> Vec<MonthlyRow> {
    let empty = HashMap::new();
    let mut grid = Vec::with_capacity(roster.len());

    for employee in roster {
        let own_records = records.get(&employee.id).unwrap_or(&empty);
        let holiday_set = holidays.get(&employee.branch_id);

        let mut codes = String::new();
        let mut totals = MonthlyTotals::default();

        for date in from.iter_days().take_while(|d| *d <= to) {
            let input = DayInput {
                date,
                joining_date: employee.joining_date,
                now,
                window: employee.window(),
                is_holiday: holiday_set.map(|s| s.contains(date)).unwrap_or(false),
                record: own_records.get(&date),
                min_work_minutes: employee.min_work_minutes.unwrap_or(DEFAULT_MIN_WORK_MINUTES),
                full_day_minutes: employee.full_day_minutes.unwrap_or(DEFAULT_FULL_DAY_MINUTES),
            };
            let resolved = resolve_daily_status(&input, StatusPolicy::CheckInOnly);
            let code = resolved.status.grid_code();
            codes.push(code);
            match code {
                'P' => totals.present += 1,
                'A' => totals.absent += 1,
                'H' => totals.holiday += 1,
                'U' => totals.unmarked += 1,
                _ => totals.not_applicable += 1,
            }
        }

        grid.push(MonthlyRow {
            employee_id: employee.id,
            employee_code: employee.employee_code.clone(),
            employee_name: employee.full_name(),
            codes,
            totals,
        });
    }

    grid
}

/// Month grid across a company's employees for an inclusive date range.
pub async fn get_monthly_view(
    pool: &MySqlPool,
    company_id: u64,
    from: NaiveDate,
    to: NaiveDate,
    filter: &RosterFilter,
    now: NaiveDateTime,
) -> Result<Vec<MonthlyRow>> {
    if from > to {
        return Err(Error::InvalidDateRange(format!("{from} > {to}")));
    }

    let roster = fetch_company_roster(pool, company_id, filter).await?;
    let records = index_records(fetch_company_records(pool, company_id, from, to).await?);
    let holidays = fetch_holiday_sets(pool, from, to).await?;

    let grid = assemble_monthly(from, to, now, &roster, &records, &holidays);
    tracing::debug!(
        company_id,
        from = %from,
        to = %to,
        employees = grid.len(),
        "monthly grid assembled"
    );
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn roster_employee(id: u64, joining: NaiveDate) -> RosterEmployee {
        RosterEmployee {
            id,
            branch_id: 1,
            employee_code: format!("EMP-{id:03}"),
            first_name: "Tanvir".into(),
            last_name: "Ahmed".into(),
            department_id: 1,
            shift_id: Some(1),
            joining_date: joining,
            base_salary: 25_000.0,
            pf_applicable: false,
            shift_start: Some(t(9, 0)),
            shift_end: Some(t(18, 0)),
            shift_grace: Some(10),
            min_work_minutes: Some(240),
            full_day_minutes: Some(480),
        }
    }

    fn check_in_only_record(employee_id: u64, date: NaiveDate) -> AttendanceRecord {
        AttendanceRecord {
            id: employee_id,
            employee_id,
            attendance_date: date,
            check_in_time: Some(t(11, 30)),
            check_out_time: None,
            shift_start: Some(t(9, 0)),
            shift_end: Some(t(18, 0)),
            grace_minutes: Some(10),
            min_work_minutes: Some(240),
            full_day_minutes: Some(480),
            check_in_lat: Some(23.8),
            check_in_lng: Some(90.4),
            check_out_lat: None,
            check_out_lng: None,
            worked_minutes: None,
            overtime_minutes: None,
            status: "LATE".into(),
            is_checked_in_session: true,
            source: "MOBILE".into(),
        }
    }

    #[test]
    fn grid_codes_and_totals() {
        let from = d(2024, 1, 1);
        let to = d(2024, 1, 5);
        let now = d(2024, 1, 4).and_time(t(12, 0));

        let roster = vec![roster_employee(1, d(2024, 1, 2))];
        let mut own = HashMap::new();
        // A bare late check-in with no checkout still counts P here.
        own.insert(d(2024, 1, 3), check_in_only_record(1, d(2024, 1, 3)));
        let mut records = HashMap::new();
        records.insert(1u64, own);

        let rows = assemble_monthly(from, to, now, &roster, &records, &HashMap::new());
        let row = &rows[0];
        // 1st pre-joining, 2nd absent, 3rd present, 4th is today with no
        // check-in (the loose rule defaults it to A), 5th future.
        assert_eq!(row.codes, "-APAU");
        assert_eq!(
            row.totals,
            MonthlyTotals {
                present: 1,
                absent: 2,
                holiday: 0,
                unmarked: 1,
                not_applicable: 1
            }
        );
    }

    #[test]
    fn branch_holiday_appears_as_h() {
        let date = d(2024, 1, 26);
        let now = d(2024, 2, 1).and_time(t(9, 0));
        let roster = vec![roster_employee(1, d(2023, 1, 1))];
        let mut set = HolidaySet::default();
        set.insert(date);
        let mut holidays = HashMap::new();
        holidays.insert(1u64, set);

        let rows = assemble_monthly(date, date, now, &roster, &HashMap::new(), &holidays);
        assert_eq!(rows[0].codes, "H");
        assert_eq!(rows[0].totals.holiday, 1);
    }
}
