use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
}

/// One payroll run per (company, pay_month, pay_year).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PayrollBatch {
    pub id: u64,
    pub company_id: u64,
    pub pay_month: u32,
    pub pay_year: i32,
    pub generated_at: Option<NaiveDateTime>,
}

/// Per-employee salary line inside a batch. Upserted idempotently while the
/// batch is unconfirmed; immutable once `payment_status` is SUCCESS.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PayrollEmployeeEntry {
    pub id: u64,
    pub batch_id: u64,
    pub employee_id: u64,
    pub base_salary: f64,
    pub present_days: f64,
    pub leave_days: f64,
    pub late_days: i64,
    pub ot_hours: f64,
    pub incentive: f64,
    pub bonus: f64,
    pub tax: f64,
    pub other_deductions: f64,
    pub pf_amount: f64,
    pub gross_salary: f64,
    pub net_salary: f64,
    pub payment_status: String,
}

impl PayrollEmployeeEntry {
    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status.parse().unwrap_or(PaymentStatus::Pending)
    }
}
