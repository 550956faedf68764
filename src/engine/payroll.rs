use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Statutory PF wage-base ceiling: contributions are computed on at most this
/// much of the base salary.
pub const PF_WAGE_CEILING: f64 = 15_000.0;
pub const PF_RATE: f64 = 0.12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalaryInput {
    pub base_salary: f64,
    pub present_days: f64,
    pub leave_days: f64,
    pub overtime_minutes: i64,
    pub incentive: f64,
    pub bonus: f64,
    pub tax: f64,
    pub other_deductions: f64,
    pub total_working_days: f64,
    pub pf_applicable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryBreakdown {
    pub earned_basic: f64,
    pub incentive: f64,
    pub bonus: f64,
    pub tax: f64,
    pub other_deductions: f64,
    pub pf_amount: f64,
    pub gross_salary: f64,
    pub net_salary: f64,
    pub ot_hours: f64,
}

/// Standard rounding to 2 decimal places (half away from zero, not banker's).
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Deterministic salary computation; no I/O. Fails only on a non-positive or
/// non-finite base salary.
pub fn calculate_salary(input: &SalaryInput) -> Result<SalaryBreakdown, Error> {
    if !input.base_salary.is_finite() || input.base_salary <= 0.0 {
        return Err(Error::InvalidBaseSalary(input.base_salary));
    }

    let credited_days = input.present_days + input.leave_days;
    let earned_basic = if input.total_working_days > 0.0 {
        round2(input.base_salary / input.total_working_days * credited_days)
    } else {
        round2(input.base_salary)
    };

    let pf_amount = if input.pf_applicable {
        round2(input.base_salary.min(PF_WAGE_CEILING) * PF_RATE)
    } else {
        0.0
    };

    let gross_salary = round2(input.base_salary + input.incentive + input.bonus);
    let net_salary = round2(gross_salary - input.tax - input.other_deductions - pf_amount);

    Ok(SalaryBreakdown {
        earned_basic,
        incentive: round2(input.incentive),
        bonus: round2(input.bonus),
        tax: round2(input.tax),
        other_deductions: round2(input.other_deductions),
        pf_amount,
        gross_salary,
        net_salary,
        ot_hours: round2(input.overtime_minutes as f64 / 60.0),
    })
}
