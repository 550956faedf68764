use serde::Deserialize;

use crate::model::AttendanceStatus;

/// Bindable value for dynamically assembled WHERE clauses. Callers bind the
/// accumulated values in order with a match loop, the usual sqlx dance for
/// dynamic filters.
#[derive(Debug, Clone)]
pub enum SqlValue {
    U64(u64),
    Str(String),
}

/// Optional narrowing applied to roster-style views (Daily, Monthly).
/// `status` is applied post-hoc to resolved rows, not in SQL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RosterFilter {
    pub search: Option<String>,
    pub department_id: Option<u64>,
    pub shift_id: Option<u64>,
    pub status: Option<AttendanceStatus>,
}

/// Appends SQL predicates for the filter and collects their bind values.
pub fn push_roster_filters(
    where_sql: &mut String,
    args: &mut Vec<SqlValue>,
    filter: &RosterFilter,
) {
    if let Some(department_id) = filter.department_id {
        where_sql.push_str(" AND e.department_id = ?");
        args.push(SqlValue::U64(department_id));
    }

    if let Some(shift_id) = filter.shift_id {
        where_sql.push_str(" AND e.shift_id = ?");
        args.push(SqlValue::U64(shift_id));
    }

    if let Some(search) = filter.search.as_deref() {
        let like = format!("%{}%", search.trim());
        where_sql.push_str(
            " AND (e.first_name LIKE ? OR e.last_name LIKE ? OR e.employee_code LIKE ?)",
        );
        args.push(SqlValue::Str(like.clone()));
        args.push(SqlValue::Str(like.clone()));
        args.push(SqlValue::Str(like));
    }
}
