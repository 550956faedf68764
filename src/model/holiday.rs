use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BranchHoliday {
    pub id: u64,
    pub branch_id: u64,
    pub holiday_date: NaiveDate,
    pub name: String,
    pub is_active: bool,
    pub applies_to_attendance: bool,
}

/// Set of dates that count as holidays for attendance purposes. A date makes
/// it into the set only when the holiday row is active and
/// `applies_to_attendance` is true.
#[derive(Debug, Clone, Default)]
pub struct HolidaySet {
    dates: HashSet<NaiveDate>,
}

impl HolidaySet {
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a BranchHoliday>,
    {
        let dates = rows
            .into_iter()
            .filter(|h| h.is_active && h.applies_to_attendance)
            .map(|h| h.holiday_date)
            .collect();
        Self { dates }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn insert(&mut self, date: NaiveDate) {
        self.dates.insert(date);
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Number of holidays falling inside `from..=to`.
    pub fn count_in_range(&self, from: NaiveDate, to: NaiveDate) -> u32 {
        self.dates.iter().filter(|d| **d >= from && **d <= to).count() as u32
    }
}
