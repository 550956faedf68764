use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Shift configuration. `end_time` may be numerically earlier than
/// `start_time`, which marks an overnight shift ending the next day.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Shift {
    pub id: u64,
    pub company_id: u64,
    pub name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub grace_minutes: i64,
    pub min_work_minutes: i64,
    pub full_day_minutes: i64,
    pub is_active: bool,
}
