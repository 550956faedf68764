use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, Transaction};

use crate::engine::status::{classify_worked, is_late_for_status, snapshot_window};
use crate::engine::window::{MINUTES_PER_DAY, ShiftWindow, time_to_minutes, worked_minutes};
use crate::error::{Error, Result};
use crate::model::{
    ApprovalStatus, AttendanceRecord, AttendanceSource, AttendanceStatus, Employee, LogAction,
    Shift,
};
use crate::service::RECORD_COLUMNS;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Geo {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckInRequest {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub now: NaiveDateTime,
    pub geo: Option<Geo>,
    pub source: AttendanceSource,
    pub device: Option<String>,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckOutRequest {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub now: NaiveDateTime,
    pub geo: Option<Geo>,
    pub source: AttendanceSource,
    pub device: Option<String>,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorrectionRequest {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub note: String,
    pub source: AttendanceSource,
    pub device: Option<String>,
    pub ip: Option<String>,
}

/// Decides whether a check-in may proceed and with which initial status.
/// Pure; the caller holds the day's row lock while this runs.
fn decide_check_in(
    existing: Option<&AttendanceRecord>,
    employee: &Employee,
    window: &ShiftWindow,
    date: NaiveDate,
    now: NaiveDateTime,
) -> Result<AttendanceStatus> {
    if existing.map(|r| r.check_in_time.is_some()).unwrap_or(false) {
        return Err(Error::AlreadyCheckedIn);
    }
    if date < employee.joining_date {
        return Err(Error::BeforeJoining {
            date,
            joining: employee.joining_date,
        });
    }

    let now_min = time_to_minutes(now.time());
    if now.date() <= date && now_min < window.start_min {
        return Err(Error::TooEarly);
    }

    let status = if is_late_for_status(now_min, window) {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::CheckedIn
    };
    Ok(status)
}

fn require_geo(geo: Option<Geo>, operation: &'static str) -> Result<Geo> {
    geo.ok_or(Error::MissingGeolocation(operation))
}

/// Validates a check-out against the locked day row.
fn decide_check_out<'a>(
    existing: Option<&'a AttendanceRecord>,
    employee: &Employee,
    date: NaiveDate,
) -> Result<&'a AttendanceRecord> {
    let record = existing.ok_or(Error::NotCheckedIn)?;
    if record.check_in_time.is_none() {
        return Err(Error::NotCheckedIn);
    }
    if record.check_out_time.is_some() {
        return Err(Error::AlreadyCheckedOut);
    }
    if date < employee.joining_date {
        return Err(Error::BeforeJoining {
            date,
            joining: employee.joining_date,
        });
    }
    Ok(record)
}

/// Validates a correction request against the locked record and its pending
/// log count; returns the record id to attach the request to. At most one
/// pending request may exist per record.
fn decide_correction(
    existing: Option<&AttendanceRecord>,
    pending_logs: i64,
    employee_id: u64,
    date: NaiveDate,
) -> Result<u64> {
    let record = existing.ok_or(Error::RecordNotFound { employee_id, date })?;
    if pending_logs > 0 {
        return Err(Error::DuplicatePendingRequest);
    }
    Ok(record.id)
}

/// An employee without an active shift has nothing to reconcile today; any
/// other lookup failure propagates.
fn shift_for_reconcile(looked_up: Result<Shift>) -> Result<Option<Shift>> {
    match looked_up {
        Ok(shift) => Ok(Some(shift)),
        Err(Error::NoActiveShift(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

async fn load_employee(pool: &MySqlPool, employee_id: u64) -> Result<Employee> {
    sqlx::query_as::<_, Employee>(
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
    .ok_or(Error::EmployeeNotFound(employee_id))
}

async fn load_active_shift(pool: &MySqlPool, employee: &Employee) -> Result<Shift> {
    let shift_id = employee.shift_id.ok_or(Error::NoActiveShift(employee.id))?;
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
    .ok_or(Error::NoActiveShift(employee.id))
}

/// Reads the employee-day row under a pessimistic lock so concurrent
/// check-in/out attempts serialize on it.
async fn lock_day_row(
    tx: &mut Transaction<'_, MySql>,
    employee_id: u64,
    date: NaiveDate,
) -> Result<Option<AttendanceRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM attendance_records \
         WHERE employee_id = ? AND attendance_date = ? FOR UPDATE"
    );
    Ok(sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(employee_id)
        .bind(date)
        .fetch_optional(&mut **tx)
        .await?)
}

async fn insert_log(
    tx: &mut Transaction<'_, MySql>,
    attendance_id: u64,
    actor_id: u64,
    action: LogAction,
    source: AttendanceSource,
    device: Option<&str>,
    ip: Option<&str>,
    approval_status: Option<&str>,
    note: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO attendance_logs
            (attendance_id, actor_id, action, source, device, ip, approval_status, note)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(attendance_id)
    .bind(actor_id)
    .bind(action.to_string())
    .bind(source.to_string())
    .bind(device)
    .bind(ip)
    .bind(approval_status)
    .bind(note)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn fetch_record(pool: &MySqlPool, id: u64, employee_id: u64, date: NaiveDate) -> Result<AttendanceRecord> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM attendance_records WHERE id = ?");
    sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(Error::RecordNotFound { employee_id, date })
}

/// First check-in of the day. Snapshots the shift window and thresholds onto
/// the record so later shift edits never rewrite this day, sets CHECKED_IN or
/// LATE per the fixed 30-minute rule, and appends an audit log entry.
pub async fn check_in(pool: &MySqlPool, req: &CheckInRequest) -> Result<AttendanceRecord> {
    let geo = require_geo(req.geo, "check-in")?;

    let employee = load_employee(pool, req.employee_id).await?;
    let shift = load_active_shift(pool, &employee).await?;
    let window = ShiftWindow::new(shift.start_time, shift.end_time, shift.grace_minutes);

    let mut tx = pool.begin().await?;
    let existing = lock_day_row(&mut tx, req.employee_id, req.date).await?;
    let status = decide_check_in(existing.as_ref(), &employee, &window, req.date, req.now)?;

    let check_in_time = req.now.time();
    let record_id = match existing {
        // Row may already exist from absence reconciliation; claim it.
        Some(row) => {
            sqlx::query(
                r#"
                UPDATE attendance_records
                SET check_in_time = ?, shift_start = ?, shift_end = ?, grace_minutes = ?,
                    min_work_minutes = ?, full_day_minutes = ?, check_in_lat = ?,
                    check_in_lng = ?, status = ?, is_checked_in_session = 1, source = ?
                WHERE id = ?
                "#,
            )
            .bind(check_in_time)
            .bind(shift.start_time)
            .bind(shift.end_time)
            .bind(shift.grace_minutes)
            .bind(shift.min_work_minutes)
            .bind(shift.full_day_minutes)
            .bind(geo.lat)
            .bind(geo.lng)
            .bind(status.to_string())
            .bind(req.source.to_string())
            .bind(row.id)
            .execute(&mut *tx)
            .await?;
            row.id
        }
        None => {
            let result = sqlx::query(
                r#"
                INSERT INTO attendance_records
                    (employee_id, attendance_date, check_in_time, shift_start, shift_end,
                     grace_minutes, min_work_minutes, full_day_minutes, check_in_lat,
                     check_in_lng, status, is_checked_in_session, source)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?)
                "#,
            )
            .bind(req.employee_id)
            .bind(req.date)
            .bind(check_in_time)
            .bind(shift.start_time)
            .bind(shift.end_time)
            .bind(shift.grace_minutes)
            .bind(shift.min_work_minutes)
            .bind(shift.full_day_minutes)
            .bind(geo.lat)
            .bind(geo.lng)
            .bind(status.to_string())
            .bind(req.source.to_string())
            .execute(&mut *tx)
            .await?;
            result.last_insert_id()
        }
    };

    insert_log(
        &mut tx,
        record_id,
        employee.id,
        LogAction::CheckIn,
        req.source,
        req.device.as_deref(),
        req.ip.as_deref(),
        None,
        None,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        employee_id = req.employee_id,
        date = %req.date,
        status = %status,
        "check-in recorded"
    );
    fetch_record(pool, record_id, req.employee_id, req.date).await
}

/// Check-out: computes worked/overtime minutes against the snapshotted
/// window, settles the day's final status (HALF_DAY vs CHECKED_OUT) and
/// appends an audit log entry.
pub async fn check_out(pool: &MySqlPool, req: &CheckOutRequest) -> Result<AttendanceRecord> {
    let geo = require_geo(req.geo, "check-out")?;

    let employee = load_employee(pool, req.employee_id).await?;

    let mut tx = pool.begin().await?;
    let existing = lock_day_row(&mut tx, req.employee_id, req.date).await?;
    let record = decide_check_out(existing.as_ref(), &employee, req.date)?;

    let check_in_time = record
        .check_in_time
        .ok_or(Error::NotCheckedIn)?;
    let check_out_time = req.now.time();
    let worked = worked_minutes(check_in_time, check_out_time);

    let status = classify_worked(
        worked,
        record
            .min_work_minutes
            .unwrap_or(crate::engine::status::DEFAULT_MIN_WORK_MINUTES),
        record
            .full_day_minutes
            .unwrap_or(crate::engine::status::DEFAULT_FULL_DAY_MINUTES),
    );

    let overtime = match snapshot_window(record) {
        Some(window) => {
            let ci_min = time_to_minutes(check_in_time);
            let mut co_min = time_to_minutes(check_out_time);
            if co_min < ci_min {
                co_min += MINUTES_PER_DAY;
            }
            (co_min - window.end_min).max(0)
        }
        None => 0,
    };

    let record_id = record.id;
    sqlx::query(
        r#"
        UPDATE attendance_records
        SET check_out_time = ?, check_out_lat = ?, check_out_lng = ?, worked_minutes = ?,
            overtime_minutes = ?, status = ?, is_checked_in_session = 0
        WHERE id = ?
        "#,
    )
    .bind(check_out_time)
    .bind(geo.lat)
    .bind(geo.lng)
    .bind(worked)
    .bind(overtime)
    .bind(status.to_string())
    .bind(record_id)
    .execute(&mut *tx)
    .await?;

    insert_log(
        &mut tx,
        record_id,
        employee.id,
        LogAction::CheckOut,
        req.source,
        req.device.as_deref(),
        req.ip.as_deref(),
        None,
        None,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        employee_id = req.employee_id,
        date = %req.date,
        status = %status,
        worked_minutes = worked,
        overtime_minutes = overtime,
        "check-out recorded"
    );
    fetch_record(pool, record_id, req.employee_id, req.date).await
}

/// Raises a pending correction request against an existing record. At most
/// one pending request may exist per record; the record row is locked while
/// the pending count is checked so duplicate submissions serialize.
pub async fn request_correction(pool: &MySqlPool, req: &CorrectionRequest) -> Result<()> {
    let mut tx = pool.begin().await?;

    let existing = lock_day_row(&mut tx, req.employee_id, req.date).await?;
    let pending: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM attendance_logs l
        JOIN attendance_records a ON a.id = l.attendance_id
        WHERE a.employee_id = ? AND a.attendance_date = ? AND l.approval_status = ?
        "#,
    )
    .bind(req.employee_id)
    .bind(req.date)
    .bind(ApprovalStatus::Pending.to_string())
    .fetch_one(&mut *tx)
    .await?;

    let record_id = decide_correction(existing.as_ref(), pending, req.employee_id, req.date)?;

    let pending_status = ApprovalStatus::Pending.to_string();
    insert_log(
        &mut tx,
        record_id,
        req.employee_id,
        LogAction::AdminEdit,
        req.source,
        req.device.as_deref(),
        req.ip.as_deref(),
        Some(&pending_status),
        Some(&req.note),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        employee_id = req.employee_id,
        date = %req.date,
        attendance_id = record_id,
        "correction request raised"
    );
    Ok(())
}

/// Idempotently persists an ABSENT row for a day whose shift has ended with
/// no check-in. This is the lazy-absence marking of the read path, surfaced
/// as an explicit operation so the side effect is auditable on its own.
/// Returns whether a row was inserted.
pub async fn reconcile_absence(
    pool: &MySqlPool,
    employee_id: u64,
    date: NaiveDate,
    now: NaiveDateTime,
) -> Result<bool> {
    let employee = load_employee(pool, employee_id).await?;
    let today = now.date();

    if date < employee.joining_date || date > today {
        return Ok(false);
    }

    // Holidays never generate ABSENT.
    let holiday: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM branch_holidays \
         WHERE branch_id = ? AND holiday_date = ? AND is_active = 1 AND applies_to_attendance = 1",
    )
    .bind(employee.branch_id)
    .bind(date)
    .fetch_one(pool)
    .await?;
    if holiday > 0 {
        return Ok(false);
    }

    if date == today {
        let Some(shift) = shift_for_reconcile(load_active_shift(pool, &employee).await)? else {
            return Ok(false);
        };
        let window = ShiftWindow::new(shift.start_time, shift.end_time, shift.grace_minutes);
        if time_to_minutes(now.time()) <= window.end_with_grace() {
            return Ok(false);
        }
    }

    // Unique (employee_id, attendance_date) keeps this idempotent under
    // concurrent reconciliation.
    let result = sqlx::query(
        r#"
        INSERT INTO attendance_records (employee_id, attendance_date, status, is_checked_in_session, source)
        VALUES (?, ?, ?, 0, ?)
        ON DUPLICATE KEY UPDATE id = id
        "#,
    )
    .bind(employee_id)
    .bind(date)
    .bind(AttendanceStatus::Absent.to_string())
    .bind(AttendanceSource::Auto.to_string())
    .execute(pool)
    .await?;

    let inserted = result.rows_affected() == 1;
    if inserted {
        tracing::debug!(employee_id, date = %date, "absence reconciled");
    }
    Ok(inserted)
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

    fn employee() -> Employee {
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
            joining_date: d(2023, 6, 1),
            base_salary: 30_000.0,
            pf_applicable: true,
            status: "active".into(),
        }
    }

    fn window() -> ShiftWindow {
        ShiftWindow::from_minutes(540, 1080, 10)
    }

    fn day_row(ci: Option<NaiveTime>, co: Option<NaiveTime>) -> AttendanceRecord {
        AttendanceRecord {
            id: 11,
            employee_id: 7,
            attendance_date: d(2024, 1, 15),
            check_in_time: ci,
            check_out_time: co,
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
            status: "CHECKED_IN".into(),
            is_checked_in_session: true,
            source: "WEB".into(),
        }
    }

    #[test]
    fn second_check_in_conflicts() {
        let row = day_row(Some(t(9, 5)), None);
        let date = d(2024, 1, 15);
        let err = decide_check_in(Some(&row), &employee(), &window(), date, date.and_time(t(9, 6)))
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyCheckedIn));
    }

    #[test]
    fn reconciled_absent_row_can_still_be_claimed() {
        let mut row = day_row(None, None);
        row.status = "ABSENT".into();
        let date = d(2024, 1, 15);
        let status =
            decide_check_in(Some(&row), &employee(), &window(), date, date.and_time(t(9, 5)))
                .unwrap();
        assert_eq!(status, AttendanceStatus::CheckedIn);
    }

    #[test]
    fn check_in_before_joining_rejected() {
        let date = d(2023, 5, 20);
        let err = decide_check_in(None, &employee(), &window(), date, date.and_time(t(9, 0)))
            .unwrap_err();
        assert!(matches!(err, Error::BeforeJoining { .. }));
    }

    #[test]
    fn check_in_before_shift_start_rejected() {
        let date = d(2024, 1, 15);
        let err = decide_check_in(None, &employee(), &window(), date, date.and_time(t(8, 30)))
            .unwrap_err();
        assert!(matches!(err, Error::TooEarly));
    }

    #[test]
    fn check_in_past_threshold_is_late() {
        let date = d(2024, 1, 15);
        let status = decide_check_in(None, &employee(), &window(), date, date.and_time(t(9, 45)))
            .unwrap();
        assert_eq!(status, AttendanceStatus::Late);
    }

    #[test]
    fn check_in_and_out_require_geolocation() {
        assert!(matches!(
            require_geo(None, "check-in"),
            Err(Error::MissingGeolocation("check-in"))
        ));
        assert!(require_geo(Some(Geo { lat: 23.8, lng: 90.4 }), "check-out").is_ok());
    }

    #[test]
    fn correction_needs_a_record_and_rejects_duplicate_pending() {
        let date = d(2024, 1, 15);
        assert!(matches!(
            decide_correction(None, 0, 7, date),
            Err(Error::RecordNotFound { .. })
        ));

        let row = day_row(Some(t(9, 0)), None);
        assert!(matches!(
            decide_correction(Some(&row), 1, 7, date),
            Err(Error::DuplicatePendingRequest)
        ));
        assert_eq!(decide_correction(Some(&row), 0, 7, date).unwrap(), row.id);
    }

    #[test]
    fn reconcile_tolerates_missing_shift_but_propagates_db_errors() {
        let shift = Shift {
            id: 1,
            company_id: 1,
            name: "Day".into(),
            start_time: t(9, 0),
            end_time: t(18, 0),
            grace_minutes: 10,
            min_work_minutes: 240,
            full_day_minutes: 480,
            is_active: true,
        };
        assert!(matches!(shift_for_reconcile(Ok(shift)), Ok(Some(_))));
        assert!(matches!(
            shift_for_reconcile(Err(Error::NoActiveShift(7))),
            Ok(None)
        ));
        assert!(matches!(
            shift_for_reconcile(Err(Error::Database(sqlx::Error::PoolClosed))),
            Err(Error::Database(_))
        ));
    }

    #[test]
    fn check_out_requires_open_session() {
        let date = d(2024, 1, 15);
        assert!(matches!(
            decide_check_out(None, &employee(), date),
            Err(Error::NotCheckedIn)
        ));

        let absent = day_row(None, None);
        assert!(matches!(
            decide_check_out(Some(&absent), &employee(), date),
            Err(Error::NotCheckedIn)
        ));

        let closed = day_row(Some(t(9, 0)), Some(t(18, 0)));
        assert!(matches!(
            decide_check_out(Some(&closed), &employee(), date),
            Err(Error::AlreadyCheckedOut)
        ));

        let open = day_row(Some(t(9, 0)), None);
        assert!(decide_check_out(Some(&open), &employee(), date).is_ok());
    }
}
