use chrono::NaiveDate;
use thiserror::Error;

/// Coarse classification used by the HTTP layer to pick a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Eligibility,
    NotFound,
    Calculation,
    Database,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("geolocation is required for {0}")]
    MissingGeolocation(&'static str),

    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("invalid time value: {0}")]
    InvalidTime(String),

    #[error("already checked in today")]
    AlreadyCheckedIn,

    #[error("already checked out today")]
    AlreadyCheckedOut,

    #[error("no active check-in found for today")]
    NotCheckedIn,

    #[error("a pending correction request already exists for this record")]
    DuplicatePendingRequest,

    #[error("attendance date {date} precedes joining date {joining}")]
    BeforeJoining { date: NaiveDate, joining: NaiveDate },

    #[error("check-in attempted before shift start")]
    TooEarly,

    #[error("employee {0} has no active shift assignment")]
    NoActiveShift(u64),

    #[error("employee {0} not found")]
    EmployeeNotFound(u64),

    #[error("attendance record not found for employee {employee_id} on {date}")]
    RecordNotFound { employee_id: u64, date: NaiveDate },

    #[error("payroll entry not found for employee {employee_id} in batch {batch_id}")]
    PayrollEntryNotFound { batch_id: u64, employee_id: u64 },

    #[error("payroll entry for employee {employee_id} in batch {batch_id} is already paid")]
    PayrollEntryAlreadyPaid { batch_id: u64, employee_id: u64 },

    #[error("invalid base salary: {0}")]
    InvalidBaseSalary(f64),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingGeolocation(_) | Error::InvalidDateRange(_) | Error::InvalidTime(_) => {
                ErrorKind::Validation
            }
            Error::AlreadyCheckedIn
            | Error::AlreadyCheckedOut
            | Error::NotCheckedIn
            | Error::DuplicatePendingRequest
            | Error::PayrollEntryAlreadyPaid { .. } => ErrorKind::Conflict,
            Error::BeforeJoining { .. } | Error::TooEarly | Error::NoActiveShift(_) => {
                ErrorKind::Eligibility
            }
            Error::EmployeeNotFound(_)
            | Error::RecordNotFound { .. }
            | Error::PayrollEntryNotFound { .. } => ErrorKind::NotFound,
            Error::InvalidBaseSalary(_) => ErrorKind::Calculation,
            Error::Database(_) => ErrorKind::Database,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
