use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::{MySql, MySqlPool, Transaction};

use crate::engine::payroll::{SalaryInput, calculate_salary, round2};
use crate::engine::status::{
    DEFAULT_FULL_DAY_MINUTES, DEFAULT_MIN_WORK_MINUTES, DayInput, StatusPolicy,
    resolve_daily_status,
};
use crate::error::{Error, Result};
use crate::model::{AttendanceRecord, HolidaySet, LeaveRequest, PaymentStatus, PayrollEmployeeEntry};
use crate::service::filter::RosterFilter;
use crate::service::{
    RosterEmployee, fetch_company_records, fetch_company_roster, fetch_holiday_sets,
    index_records,
};

#[derive(Debug, Clone, Serialize)]
pub struct PayrollRowError {
    pub employee_id: u64,
    pub error: String,
}

/// Outcome of one payroll run. Calculation failures are collected per row so
/// one bad salary never aborts the whole batch.
#[derive(Debug, Clone, Serialize)]
pub struct PayrollRunReport {
    pub batch_id: u64,
    pub pay_month: u32,
    pub pay_year: i32,
    pub generated: u32,
    pub skipped_paid: u32,
    pub failures: Vec<PayrollRowError>,
}

/// First and last day of a (year, month) pair.
pub(crate) fn month_bounds(pay_year: i32, pay_month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let from = NaiveDate::from_ymd_opt(pay_year, pay_month, 1)
        .ok_or_else(|| Error::InvalidDateRange(format!("{pay_year}-{pay_month}")))?;
    let next = if pay_month == 12 {
        NaiveDate::from_ymd_opt(pay_year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(pay_year, pay_month + 1, 1)
    }
    .ok_or_else(|| Error::InvalidDateRange(format!("{pay_year}-{pay_month}")))?;
    Ok((from, next.pred_opt().unwrap_or(from)))
}

/// Approved leave days intersecting the range, net of attendance-applicable
/// holidays (a holiday inside a leave span is not charged as leave).
pub(crate) fn leave_days_in_range(
    leaves: &[LeaveRequest],
    from: NaiveDate,
    to: NaiveDate,
    holidays: &HolidaySet,
) -> f64 {
    let mut days = 0.0;
    for leave in leaves {
        if !leave.is_approved() {
            continue;
        }
        let start = leave.start_date.max(from);
        let end = leave.end_date.min(to);
        if start > end {
            continue;
        }
        for date in start.iter_days().take_while(|d| *d <= end) {
            if !holidays.contains(date) {
                days += 1.0;
            }
        }
    }
    days
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct MonthAggregate {
    pub present_days: f64,
    pub late_days: i64,
    pub overtime_minutes: i64,
}

/// Replays the full state machine over the month, mirroring what History
/// reports for the same days.
pub(crate) fn aggregate_month(
    employee: &RosterEmployee,
    from: NaiveDate,
    to: NaiveDate,
    now: NaiveDateTime,
    records: &HashMap<NaiveDate, AttendanceRecord>,
    holidays: &HolidaySet,
) -> MonthAggregate {
    let mut aggregate = MonthAggregate::default();

    for date in from.iter_days().take_while(|d| *d <= to) {
        let input = DayInput {
            date,
            joining_date: employee.joining_date,
            now,
            window: employee.window(),
            is_holiday: holidays.contains(date),
            record: records.get(&date),
            min_work_minutes: employee.min_work_minutes.unwrap_or(DEFAULT_MIN_WORK_MINUTES),
            full_day_minutes: employee.full_day_minutes.unwrap_or(DEFAULT_FULL_DAY_MINUTES),
        };
        let resolved = resolve_daily_status(&input, StatusPolicy::FullStateMachine);
        aggregate.present_days += resolved.credit();
        aggregate.overtime_minutes += resolved.overtime_minutes;
        if resolved.late_minutes > 0 {
            aggregate.late_days += 1;
        }
    }

    aggregate
}

async fn upsert_batch(
    pool: &MySqlPool,
    company_id: u64,
    pay_month: u32,
    pay_year: i32,
    now: NaiveDateTime,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO payroll_batches (company_id, pay_month, pay_year, generated_at)
        VALUES (?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE id = LAST_INSERT_ID(id), generated_at = VALUES(generated_at)
        "#,
    )
    .bind(company_id)
    .bind(pay_month)
    .bind(pay_year)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id())
}

async fn lock_entry(
    tx: &mut Transaction<'_, MySql>,
    batch_id: u64,
    employee_id: u64,
) -> Result<Option<PayrollEmployeeEntry>> {
    Ok(sqlx::query_as::<_, PayrollEmployeeEntry>(
        r#"
        SELECT id, batch_id, employee_id, base_salary, present_days, leave_days, late_days,
               ot_hours, incentive, bonus, tax, other_deductions, pf_amount, gross_salary,
               net_salary, payment_status
        FROM payroll_employee_entries
        WHERE batch_id = ? AND employee_id = ?
        FOR UPDATE
        "#,
    )
    .bind(batch_id)
    .bind(employee_id)
    .fetch_optional(&mut **tx)
    .await?)
}

/// (Re)generates the payroll batch for (company, month, year). Entries are
/// upserted idempotently; entries already paid out are left untouched.
/// Manually entered incentive/bonus/tax/deductions on an unpaid entry survive
/// regeneration.
pub async fn generate_payroll(
    pool: &MySqlPool,
    company_id: u64,
    pay_month: u32,
    pay_year: i32,
    now: NaiveDateTime,
) -> Result<PayrollRunReport> {
    if !(1..=12).contains(&pay_month) {
        return Err(Error::InvalidDateRange(format!("month {pay_month}")));
    }
    let (from, to) = month_bounds(pay_year, pay_month)?;

    let batch_id = upsert_batch(pool, company_id, pay_month, pay_year, now).await?;
    let roster = fetch_company_roster(pool, company_id, &RosterFilter::default()).await?;
    let records = index_records(fetch_company_records(pool, company_id, from, to).await?);
    let holidays = fetch_holiday_sets(pool, from, to).await?;

    let leaves = sqlx::query_as::<_, LeaveRequest>(
        r#"
        SELECT l.id, l.employee_id, l.start_date, l.end_date, l.leave_type, l.status
        FROM leave_requests l
        JOIN employees e ON e.id = l.employee_id
        WHERE e.company_id = ? AND l.status = 'APPROVED'
          AND l.start_date <= ? AND l.end_date >= ?
        "#,
    )
    .bind(company_id)
    .bind(to)
    .bind(from)
    .fetch_all(pool)
    .await?;
    let mut leaves_by_employee: HashMap<u64, Vec<LeaveRequest>> = HashMap::new();
    for leave in leaves {
        leaves_by_employee
            .entry(leave.employee_id)
            .or_default()
            .push(leave);
    }

    let empty_records = HashMap::new();
    let empty_holidays = HolidaySet::default();
    let no_leaves: Vec<LeaveRequest> = Vec::new();
    let days_in_month = (to - from).num_days() as u32 + 1;

    let mut report = PayrollRunReport {
        batch_id,
        pay_month,
        pay_year,
        generated: 0,
        skipped_paid: 0,
        failures: Vec::new(),
    };

    let mut tx = pool.begin().await?;

    for employee in &roster {
        let own_records = records.get(&employee.id).unwrap_or(&empty_records);
        let branch_holidays = holidays.get(&employee.branch_id).unwrap_or(&empty_holidays);
        let own_leaves = leaves_by_employee.get(&employee.id).unwrap_or(&no_leaves);

        let aggregate = aggregate_month(employee, from, to, now, own_records, branch_holidays);
        let leave_days = leave_days_in_range(own_leaves, from, to, branch_holidays);
        let total_working_days =
            f64::from(days_in_month - branch_holidays.count_in_range(from, to));

        let existing = lock_entry(&mut tx, batch_id, employee.id).await?;
        if let Some(entry) = &existing {
            if entry.payment_status() == PaymentStatus::Success {
                report.skipped_paid += 1;
                tracing::debug!(
                    employee_id = employee.id,
                    batch_id,
                    "entry already paid, left untouched"
                );
                continue;
            }
        }

        let (incentive, bonus, tax, other_deductions) = existing
            .as_ref()
            .map(|e| (e.incentive, e.bonus, e.tax, e.other_deductions))
            .unwrap_or((0.0, 0.0, 0.0, 0.0));

        let input = SalaryInput {
            base_salary: employee.base_salary,
            present_days: aggregate.present_days,
            leave_days,
            overtime_minutes: aggregate.overtime_minutes,
            incentive,
            bonus,
            tax,
            other_deductions,
            total_working_days,
            pf_applicable: employee.pf_applicable,
        };

        let breakdown = match calculate_salary(&input) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(
                    employee_id = employee.id,
                    batch_id,
                    error = %e,
                    "salary calculation failed, row skipped"
                );
                report.failures.push(PayrollRowError {
                    employee_id: employee.id,
                    error: e.to_string(),
                });
                continue;
            }
        };

        match existing {
            Some(entry) => {
                sqlx::query(
                    r#"
                    UPDATE payroll_employee_entries
                    SET base_salary = ?, present_days = ?, leave_days = ?, late_days = ?,
                        ot_hours = ?, pf_amount = ?, gross_salary = ?, net_salary = ?
                    WHERE id = ?
                    "#,
                )
                .bind(employee.base_salary)
                .bind(round2(aggregate.present_days))
                .bind(leave_days)
                .bind(aggregate.late_days)
                .bind(breakdown.ot_hours)
                .bind(breakdown.pf_amount)
                .bind(breakdown.gross_salary)
                .bind(breakdown.net_salary)
                .bind(entry.id)
                .execute(&mut *tx)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO payroll_employee_entries
                        (batch_id, employee_id, base_salary, present_days, leave_days,
                         late_days, ot_hours, incentive, bonus, tax, other_deductions,
                         pf_amount, gross_salary, net_salary, payment_status)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(batch_id)
                .bind(employee.id)
                .bind(employee.base_salary)
                .bind(round2(aggregate.present_days))
                .bind(leave_days)
                .bind(aggregate.late_days)
                .bind(breakdown.ot_hours)
                .bind(incentive)
                .bind(bonus)
                .bind(tax)
                .bind(other_deductions)
                .bind(breakdown.pf_amount)
                .bind(breakdown.gross_salary)
                .bind(breakdown.net_salary)
                .bind(PaymentStatus::Pending.to_string())
                .execute(&mut *tx)
                .await?;
            }
        }
        report.generated += 1;
    }

    tx.commit().await?;

    tracing::info!(
        company_id,
        batch_id,
        pay_month,
        pay_year,
        generated = report.generated,
        skipped_paid = report.skipped_paid,
        failed = report.failures.len(),
        "payroll batch generated"
    );
    Ok(report)
}

/// Validates a payout confirmation against the locked entry; a paid entry is
/// immutable and cannot be confirmed twice.
pub(crate) fn decide_mark_paid(
    existing: Option<&PayrollEmployeeEntry>,
    batch_id: u64,
    employee_id: u64,
) -> Result<u64> {
    let entry = existing.ok_or(Error::PayrollEntryNotFound {
        batch_id,
        employee_id,
    })?;
    if entry.payment_status() == PaymentStatus::Success {
        return Err(Error::PayrollEntryAlreadyPaid {
            batch_id,
            employee_id,
        });
    }
    Ok(entry.id)
}

/// Confirms payout of one entry; the entry becomes immutable afterwards.
pub async fn mark_entry_paid(pool: &MySqlPool, batch_id: u64, employee_id: u64) -> Result<()> {
    let mut tx = pool.begin().await?;
    let existing = lock_entry(&mut tx, batch_id, employee_id).await?;
    let entry_id = decide_mark_paid(existing.as_ref(), batch_id, employee_id)?;

    sqlx::query("UPDATE payroll_employee_entries SET payment_status = ? WHERE id = ?")
        .bind(PaymentStatus::Success.to_string())
        .bind(entry_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(batch_id, employee_id, "payroll entry marked paid");
    Ok(())
}
