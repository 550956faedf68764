use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use sqlx::MySqlPool;

use crate::engine::status::{
    DEFAULT_FULL_DAY_MINUTES, DEFAULT_MIN_WORK_MINUTES, DayInput, StatusPolicy,
    resolve_daily_status,
};
use crate::error::Result;
use crate::model::{AttendanceRecord, AttendanceStatus, HolidaySet};
use crate::service::filter::RosterFilter;
use crate::service::{RosterEmployee, fetch_company_records, fetch_company_roster, fetch_holiday_sets};

#[derive(Debug, Clone, Serialize)]
pub struct DailyRow {
    pub employee_id: u64,
    pub employee_code: String,
    pub employee_name: String,
    pub department_id: u64,
    pub shift_id: Option<u64>,
    pub status: AttendanceStatus,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_time: Option<NaiveTime>,
    pub late_minutes: i64,
    pub early_checkout_minutes: i64,
    pub overtime_minutes: i64,
    pub worked_minutes: i64,
}

/// Company-wide counts for the roster date, taken before any status filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub total_employees: u32,
    pub present: u32,
    pub checked_in: u32,
    pub late: u32,
    pub half_day: u32,
    pub absent: u32,
    pub unmarked: u32,
    pub holiday: u32,
    pub not_applicable: u32,
}

impl DailySummary {
    fn tally(&mut self, status: AttendanceStatus) {
        self.total_employees += 1;
        match status {
            AttendanceStatus::Present | AttendanceStatus::CheckedOut => self.present += 1,
            AttendanceStatus::CheckedIn => self.checked_in += 1,
            AttendanceStatus::Late => self.late += 1,
            AttendanceStatus::HalfDay => self.half_day += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Unmarked => self.unmarked += 1,
            AttendanceStatus::Holiday => self.holiday += 1,
            AttendanceStatus::NotApplicable => self.not_applicable += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyView {
    pub date: NaiveDate,
    pub summary: DailySummary,
    pub rows: Vec<DailyRow>,
}

/// Pure roster assembly: one state-machine pass per employee for the date.
pub(crate) fn assemble_daily(
    date: NaiveDate,
    now: NaiveDateTime,
    roster: &[RosterEmployee],
    records: &HashMap<u64, AttendanceRecord>,
    holidays: &HashMap<u64, HolidaySet>,
    status_filter: Option<AttendanceStatus>,
) -> DailyView {
    let mut summary = DailySummary::default();
    let mut rows = Vec::with_capacity(roster.len());

    for employee in roster {
        let record = records.get(&employee.id);
        let is_holiday = holidays
            .get(&employee.branch_id)
            .map(|set| set.contains(date))
            .unwrap_or(false);

        let input = DayInput {
            date,
            joining_date: employee.joining_date,
            now,
            window: employee.window(),
            is_holiday,
            record,
            min_work_minutes: employee.min_work_minutes.unwrap_or(DEFAULT_MIN_WORK_MINUTES),
            full_day_minutes: employee.full_day_minutes.unwrap_or(DEFAULT_FULL_DAY_MINUTES),
        };
        let resolved = resolve_daily_status(&input, StatusPolicy::FullStateMachine);
        summary.tally(resolved.status);

        if status_filter.map(|s| s != resolved.status).unwrap_or(false) {
            continue;
        }

        rows.push(DailyRow {
            employee_id: employee.id,
            employee_code: employee.employee_code.clone(),
            employee_name: employee.full_name(),
            department_id: employee.department_id,
            shift_id: employee.shift_id,
            status: resolved.status,
            check_in_time: record.and_then(|r| r.check_in_time),
            check_out_time: record.and_then(|r| r.check_out_time),
            late_minutes: resolved.late_minutes,
            early_checkout_minutes: resolved.early_checkout_minutes,
            overtime_minutes: resolved.overtime_minutes,
            worked_minutes: resolved.worked_minutes,
        });
    }

    DailyView {
        date,
        summary,
        rows,
    }
}

/// Roster view for one date across a company. Read-only; resolution replays
/// the state machine against that day's rows and holiday calendar.
pub async fn get_daily_view(
    pool: &MySqlPool,
    company_id: u64,
    date: NaiveDate,
    filter: &RosterFilter,
    now: NaiveDateTime,
) -> Result<DailyView> {
    let roster = fetch_company_roster(pool, company_id, filter).await?;
    let records = fetch_company_records(pool, company_id, date, date).await?;
    let holidays = fetch_holiday_sets(pool, date, date).await?;

    let by_employee: HashMap<u64, AttendanceRecord> = records
        .into_iter()
        .map(|r| (r.employee_id, r))
        .collect();

    let view = assemble_daily(date, now, &roster, &by_employee, &holidays, filter.status);
    tracing::debug!(
        company_id,
        date = %date,
        employees = view.summary.total_employees,
        present = view.summary.present,
        "daily view assembled"
    );
    Ok(view)
}
