pub mod attendance;
pub mod employee;
pub mod holiday;
pub mod leave_request;
pub mod payroll;
pub mod shift;

pub use attendance::{
    ApprovalStatus, AttendanceLog, AttendanceRecord, AttendanceSource, AttendanceStatus, LogAction,
};
pub use employee::Employee;
pub use holiday::{BranchHoliday, HolidaySet};
pub use leave_request::LeaveRequest;
pub use payroll::{PaymentStatus, PayrollBatch, PayrollEmployeeEntry};
pub use shift::Shift;
