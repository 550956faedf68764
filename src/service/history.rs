use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use sqlx::MySqlPool;

use crate::engine::status::{
    DEFAULT_FULL_DAY_MINUTES, DEFAULT_MIN_WORK_MINUTES, DayInput, StatusPolicy,
    resolve_daily_status,
};
use crate::engine::window::ShiftWindow;
use crate::error::{Error, Result};
use crate::model::{AttendanceRecord, AttendanceStatus, BranchHoliday, Employee, HolidaySet, Shift};
use crate::service::RECORD_COLUMNS;
use crate::service::attendance::reconcile_absence;

#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    /// Calendar letter code: `-`, `U`, `H`, `P`, `A`.
    pub code: char,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_time: Option<NaiveTime>,
    pub late_minutes: i64,
    pub early_checkout_minutes: i64,
    pub overtime_minutes: i64,
    pub worked_minutes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEmployee {
    pub id: u64,
    pub employee_code: String,
    pub name: String,
    pub joining_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HistorySummary {
    pub present_days: f64,
    pub absent_days: u32,
    pub holiday_days: u32,
    pub late_days: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub employee: HistoryEmployee,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub summary: HistorySummary,
    pub rows: Vec<HistoryRow>,
}

/// Pure calendar assembly: one entry per day in the inclusive range, each
/// resolved independently through the full state machine.
pub(crate) fn assemble_history(
    employee: &Employee,
    from: NaiveDate,
    to: NaiveDate,
    now: NaiveDateTime,
    live_shift: Option<&Shift>,
    records: &HashMap<NaiveDate, AttendanceRecord>,
    holidays: &HolidaySet,
) -> (HistorySummary, Vec<HistoryRow>) {
    let live_window =
        live_shift.map(|s| ShiftWindow::new(s.start_time, s.end_time, s.grace_minutes));
    // Same fallback rule as the Daily/Monthly views: the live shift's
    // thresholds back-fill rows without snapshots.
    let min_work = live_shift
        .map(|s| s.min_work_minutes)
        .unwrap_or(DEFAULT_MIN_WORK_MINUTES);
    let full_day = live_shift
        .map(|s| s.full_day_minutes)
        .unwrap_or(DEFAULT_FULL_DAY_MINUTES);

    let mut summary = HistorySummary::default();
    let mut rows = Vec::new();

    for date in from.iter_days().take_while(|d| *d <= to) {
        let record = records.get(&date);
        let input = DayInput {
            date,
            joining_date: employee.joining_date,
            now,
            window: live_window,
            is_holiday: holidays.contains(date),
            record,
            min_work_minutes: min_work,
            full_day_minutes: full_day,
        };
        let resolved = resolve_daily_status(&input, StatusPolicy::FullStateMachine);

        summary.present_days += resolved.credit();
        match resolved.status {
            AttendanceStatus::Absent => summary.absent_days += 1,
            AttendanceStatus::Holiday => summary.holiday_days += 1,
            _ => {}
        }
        if resolved.late_minutes > 0 {
            summary.late_days += 1;
        }

        rows.push(HistoryRow {
            date,
            status: resolved.status,
            code: resolved.status.grid_code(),
            check_in_time: record.and_then(|r| r.check_in_time),
            check_out_time: record.and_then(|r| r.check_out_time),
            late_minutes: resolved.late_minutes,
            early_checkout_minutes: resolved.early_checkout_minutes,
            overtime_minutes: resolved.overtime_minutes,
            worked_minutes: resolved.worked_minutes,
        });
    }

    (summary, rows)
}

/// Per-employee attendance calendar over a date range, defaulting to
/// joining-date..today. Reconciles today's absence first when today falls in
/// range, so "my attendance" shows a settled day once the shift is over.
pub async fn get_history_view(
    pool: &MySqlPool,
    employee_id: u64,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    now: NaiveDateTime,
) -> Result<HistoryView> {
    let employee = sqlx::query_as::<_, Employee>(
        r#"
        SELECT id, company_id, branch_id, employee_code, first_name, last_name, email, phone,
               department_id, designation_id, shift_id, joining_date, base_salary,
               pf_applicable, status
        FROM employees
        WHERE id = ?
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool)
    .await?
    .ok_or(Error::EmployeeNotFound(employee_id))?;

    let today = now.date();
    let from = from.unwrap_or(employee.joining_date);
    let to = to.unwrap_or(today);
    if from > to {
        return Err(Error::InvalidDateRange(format!("{from} > {to}")));
    }

    if from <= today && today <= to {
        reconcile_absence(pool, employee_id, today, now).await?;
    }

    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM attendance_records \
         WHERE employee_id = ? AND attendance_date BETWEEN ? AND ?"
    );
    let records: HashMap<NaiveDate, AttendanceRecord> =
        sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(employee_id)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(|r| (r.attendance_date, r))
            .collect();

    let holiday_rows = sqlx::query_as::<_, BranchHoliday>(
        r#"
        SELECT id, branch_id, holiday_date, name, is_active, applies_to_attendance
        FROM branch_holidays
        WHERE branch_id = ? AND holiday_date BETWEEN ? AND ? AND is_active = 1
        "#,
    )
    .bind(employee.branch_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;
    let holidays = HolidaySet::from_rows(&holiday_rows);

    let live_shift = match employee.shift_id {
        Some(shift_id) => {
            sqlx::query_as::<_, Shift>(
                r#"
                SELECT id, company_id, name, start_time, end_time, grace_minutes,
                       min_work_minutes, full_day_minutes, is_active
                FROM shifts
                WHERE id = ? AND is_active = 1
                "#,
            )
            .bind(shift_id)
            .fetch_optional(pool)
            .await?
        }
        None => None,
    };

    let (summary, rows) =
        assemble_history(&employee, from, to, now, live_shift.as_ref(), &records, &holidays);

    tracing::debug!(
        employee_id,
        from = %from,
        to = %to,
        days = rows.len(),
        "history view assembled"
    );

    Ok(HistoryView {
        employee: HistoryEmployee {
            id: employee.id,
            employee_code: employee.employee_code.clone(),
            name: employee.full_name(),
            joining_date: employee.joining_date,
        },
        from,
        to,
        summary,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn employee(joining: NaiveDate) -> Employee {
        Employee {
            id: 7,
            company_id: 1,
            branch_id: 1,
            employee_code: "EMP-007".into(),
            first_name: "Arifa".into(),
            last_name: "Khan".into(),
            email: "arifa.khan@company.com".into(),
            phone: None,
            department_id: 2,
            designation_id: 3,
            shift_id: Some(1),
            joining_date: joining,
            base_salary: 30_000.0,
            pf_applicable: true,
            status: "active".into(),
        }
    }

    fn full_day_record(date: NaiveDate) -> AttendanceRecord {
        AttendanceRecord {
            id: 1,
            employee_id: 7,
            attendance_date: date,
            check_in_time: Some(t(9, 0)),
            check_out_time: Some(t(18, 0)),
            shift_start: Some(t(9, 0)),
            shift_end: Some(t(18, 0)),
            grace_minutes: Some(10),
            min_work_minutes: Some(240),
            full_day_minutes: Some(480),
            check_in_lat: Some(23.8),
            check_in_lng: Some(90.4),
            check_out_lat: Some(23.8),
            check_out_lng: Some(90.4),
            worked_minutes: Some(540),
            overtime_minutes: Some(0),
            status: "CHECKED_OUT".into(),
            is_checked_in_session: false,
            source: "WEB".into(),
        }
    }

    fn day_shift() -> Shift {
        Shift {
            id: 1,
            company_id: 1,
            name: "Day".into(),
            start_time: t(9, 0),
            end_time: t(18, 0),
            grace_minutes: 10,
            min_work_minutes: 240,
            full_day_minutes: 480,
            is_active: true,
        }
    }

    #[test]
    fn range_spanning_joining_date_renders_dash_then_states() {
        let joining = d(2024, 1, 3);
        let emp = employee(joining);
        let now = d(2024, 1, 6).and_time(t(12, 0));
        let shift = day_shift();

        let mut records = HashMap::new();
        records.insert(d(2024, 1, 4), full_day_record(d(2024, 1, 4)));

        let mut holidays = HolidaySet::default();
        holidays.insert(d(2024, 1, 5));

        let (summary, rows) = assemble_history(
            &emp,
            d(2024, 1, 1),
            d(2024, 1, 6),
            now,
            Some(&shift),
            &records,
            &holidays,
        );

        let codes: String = rows.iter().map(|r| r.code).collect();
        // 1st-2nd pre-joining, 3rd absent, 4th present, 5th holiday,
        // 6th is today at noon with no check-in: unmarked
        assert_eq!(codes, "--APHU");
        assert_eq!(summary.present_days, 1.0);
        assert_eq!(summary.absent_days, 1);
        assert_eq!(summary.holiday_days, 1);
    }

    #[test]
    fn holiday_with_no_row_is_never_absent() {
        let emp = employee(d(2023, 1, 1));
        let holiday = d(2024, 1, 26);
        let now = d(2024, 2, 10).and_time(t(12, 0));
        let mut holidays = HolidaySet::default();
        holidays.insert(holiday);

        let (_, rows) = assemble_history(
            &emp,
            holiday,
            holiday,
            now,
            None,
            &HashMap::new(),
            &holidays,
        );
        assert_eq!(rows[0].status, AttendanceStatus::Holiday);
        assert_eq!(rows[0].code, 'H');
    }

    #[test]
    fn live_shift_thresholds_back_fill_rows_without_snapshots() {
        let emp = employee(d(2023, 1, 1));
        let date = d(2024, 1, 10);
        let now = d(2024, 1, 15).and_time(t(12, 0));

        // 540 worked minutes with no snapshotted thresholds; the live shift
        // demands 600 for a full day.
        let mut row = full_day_record(date);
        row.min_work_minutes = None;
        row.full_day_minutes = None;
        let mut records = HashMap::new();
        records.insert(date, row);

        let mut shift = day_shift();
        shift.full_day_minutes = 600;

        let (_, rows) = assemble_history(
            &emp,
            date,
            date,
            now,
            Some(&shift),
            &records,
            &HolidaySet::default(),
        );
        assert_eq!(rows[0].status, AttendanceStatus::HalfDay);
    }
}
