use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Resolved per-day attendance state. Stored as its SCREAMING_SNAKE_CASE
/// string in the `status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Unmarked,
    CheckedIn,
    Late,
    CheckedOut,
    HalfDay,
    Absent,
    Present,
    Holiday,
    NotApplicable,
}

impl AttendanceStatus {
    /// Single-letter code used by the monthly grid and history calendar.
    pub fn grid_code(self) -> char {
        match self {
            AttendanceStatus::NotApplicable => '-',
            AttendanceStatus::Unmarked => 'U',
            AttendanceStatus::Holiday => 'H',
            AttendanceStatus::Absent => 'A',
            AttendanceStatus::Present
            | AttendanceStatus::CheckedIn
            | AttendanceStatus::Late
            | AttendanceStatus::CheckedOut
            | AttendanceStatus::HalfDay => 'P',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceSource {
    Web,
    Mobile,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogAction {
    CheckIn,
    CheckOut,
    AdminEdit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// One row per (employee, calendar date). Created on first check-in (or by
/// absence reconciliation), mutated by check-out, never deleted.
///
/// Shift fields are snapshotted at check-in so later shift edits do not
/// rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: u64,
    pub employee_id: u64,
    pub attendance_date: NaiveDate,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_time: Option<NaiveTime>,
    pub shift_start: Option<NaiveTime>,
    pub shift_end: Option<NaiveTime>,
    pub grace_minutes: Option<i64>,
    pub min_work_minutes: Option<i64>,
    pub full_day_minutes: Option<i64>,
    pub check_in_lat: Option<f64>,
    pub check_in_lng: Option<f64>,
    pub check_out_lat: Option<f64>,
    pub check_out_lng: Option<f64>,
    pub worked_minutes: Option<i64>,
    pub overtime_minutes: Option<i64>,
    pub status: String,
    pub is_checked_in_session: bool,
    pub source: String,
}

impl AttendanceRecord {
    pub fn stored_status(&self) -> AttendanceStatus {
        self.status.parse().unwrap_or(AttendanceStatus::Unmarked)
    }
}

/// Append-only audit/approval trail attached to an attendance record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceLog {
    pub id: u64,
    pub attendance_id: u64,
    pub actor_id: u64,
    pub action: String,
    pub source: String,
    pub device: Option<String>,
    pub ip: Option<String>,
    pub approval_status: Option<String>,
    pub note: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}
