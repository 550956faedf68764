pub mod payroll;
pub mod status;
pub mod window;

pub use payroll::{SalaryBreakdown, SalaryInput, calculate_salary};
pub use status::{DayInput, ResolvedDay, StatusPolicy, resolve_daily_status};
pub use window::{ShiftWindow, parse_time_minutes, time_to_minutes, worked_minutes};
