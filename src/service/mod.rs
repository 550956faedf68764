pub mod attendance;
pub mod daily;
pub mod filter;
pub mod history;
pub mod monthly;
pub mod payroll;

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use sqlx::MySqlPool;

use crate::engine::window::ShiftWindow;
use crate::error::Result;
use crate::model::{AttendanceRecord, BranchHoliday, HolidaySet};
use filter::{RosterFilter, SqlValue, push_roster_filters};

pub(crate) const RECORD_COLUMNS: &str = "id, employee_id, attendance_date, check_in_time, \
     check_out_time, shift_start, shift_end, grace_minutes, min_work_minutes, full_day_minutes, \
     check_in_lat, check_in_lng, check_out_lat, check_out_lng, worked_minutes, overtime_minutes, \
     status, is_checked_in_session, source";

/// One roster line: an active employee joined with their live shift, as the
/// aggregation views consume it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RosterEmployee {
    pub id: u64,
    pub branch_id: u64,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub department_id: u64,
    pub shift_id: Option<u64>,
    pub joining_date: NaiveDate,
    pub base_salary: f64,
    pub pf_applicable: bool,
    pub shift_start: Option<NaiveTime>,
    pub shift_end: Option<NaiveTime>,
    pub shift_grace: Option<i64>,
    pub min_work_minutes: Option<i64>,
    pub full_day_minutes: Option<i64>,
}

impl RosterEmployee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Live shift window, used only as a fallback where no snapshot exists.
    pub fn window(&self) -> Option<ShiftWindow> {
        match (self.shift_start, self.shift_end) {
            (Some(start), Some(end)) => {
                Some(ShiftWindow::new(start, end, self.shift_grace.unwrap_or(0)))
            }
            _ => None,
        }
    }
}

/// Active employees of a company with their live shift, honoring the
/// search/department/shift filters.
pub(crate) async fn fetch_company_roster(
    pool: &MySqlPool,
    company_id: u64,
    filter: &RosterFilter,
) -> Result<Vec<RosterEmployee>> {
    let mut where_sql = String::from(" WHERE e.company_id = ? AND e.status = 'active'");
    let mut args = vec![SqlValue::U64(company_id)];
    push_roster_filters(&mut where_sql, &mut args, filter);

    let sql = format!(
        r#"
        SELECT e.id, e.branch_id, e.employee_code, e.first_name, e.last_name,
               e.department_id, e.shift_id, e.joining_date, e.base_salary, e.pf_applicable,
               s.start_time AS shift_start, s.end_time AS shift_end,
               s.grace_minutes AS shift_grace, s.min_work_minutes, s.full_day_minutes
        FROM employees e
        LEFT JOIN shifts s ON s.id = e.shift_id AND s.is_active = 1
        {}
        ORDER BY e.employee_code
        "#,
        where_sql
    );

    let mut query = sqlx::query_as::<_, RosterEmployee>(&sql);
    for arg in args {
        query = match arg {
            SqlValue::U64(v) => query.bind(v),
            SqlValue::Str(v) => query.bind(v),
        };
    }
    Ok(query.fetch_all(pool).await?)
}

/// Attendance rows for every employee of a company inside a date range.
pub(crate) async fn fetch_company_records(
    pool: &MySqlPool,
    company_id: u64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<AttendanceRecord>> {
    let sql = format!(
        r#"
        SELECT {cols}
        FROM attendance_records a
        JOIN employees e ON e.id = a.employee_id
        WHERE e.company_id = ? AND a.attendance_date BETWEEN ? AND ?
        "#,
        cols = RECORD_COLUMNS
            .split(", ")
            .map(|c| format!("a.{c}"))
            .collect::<Vec<_>>()
            .join(", "),
    );

    Ok(sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(company_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?)
}

/// Attendance-applicable holiday sets keyed by branch for a date range.
pub(crate) async fn fetch_holiday_sets(
    pool: &MySqlPool,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<HashMap<u64, HolidaySet>> {
    let rows = sqlx::query_as::<_, BranchHoliday>(
        r#"
        SELECT id, branch_id, holiday_date, name, is_active, applies_to_attendance
        FROM branch_holidays
        WHERE holiday_date BETWEEN ? AND ? AND is_active = 1
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    let mut by_branch: HashMap<u64, Vec<BranchHoliday>> = HashMap::new();
    for row in rows {
        by_branch.entry(row.branch_id).or_default().push(row);
    }

    Ok(by_branch
        .into_iter()
        .map(|(branch_id, rows)| (branch_id, HolidaySet::from_rows(&rows)))
        .collect())
}

/// Groups fetched records by employee and date for replay.
pub(crate) fn index_records(
    records: Vec<AttendanceRecord>,
) -> HashMap<u64, HashMap<NaiveDate, AttendanceRecord>> {
    let mut by_employee: HashMap<u64, HashMap<NaiveDate, AttendanceRecord>> = HashMap::new();
    for record in records {
        by_employee
            .entry(record.employee_id)
            .or_default()
            .insert(record.attendance_date, record);
    }
    by_employee
}
