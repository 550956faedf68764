use chrono::{NaiveDate, NaiveDateTime};

use crate::engine::window::{MINUTES_PER_DAY, ShiftWindow, time_to_minutes, worked_minutes};
use crate::model::{AttendanceRecord, AttendanceStatus};

/// Fixed policy threshold for flagging a check-in as LATE instead of
/// CHECKED_IN. Deliberately distinct from the shift's own `grace_minutes`,
/// which only discounts the late-minutes figure. The two are not unified;
/// see DESIGN.md.
pub const LATE_STATUS_THRESHOLD_MINUTES: i64 = 30;

pub const DEFAULT_MIN_WORK_MINUTES: i64 = 240;
pub const DEFAULT_FULL_DAY_MINUTES: i64 = 480;

/// Which "present" rule a view applies.
///
/// Daily and History replay the full state machine; the Monthly grid counts
/// any day with a check-in as present, a deliberately looser rule kept as its
/// own named policy rather than silently merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPolicy {
    FullStateMachine,
    CheckInOnly,
}

/// Everything the state machine needs to resolve one employee-day. `now` is
/// always passed in explicitly; nothing in the engine reads the system clock.
#[derive(Debug, Clone)]
pub struct DayInput<'a> {
    pub date: NaiveDate,
    pub joining_date: NaiveDate,
    pub now: NaiveDateTime,
    /// Live shift window, used only when the record carries no snapshot.
    pub window: Option<ShiftWindow>,
    pub is_holiday: bool,
    pub record: Option<&'a AttendanceRecord>,
    /// Fallback thresholds for rows without snapshotted values.
    pub min_work_minutes: i64,
    pub full_day_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedDay {
    pub status: AttendanceStatus,
    pub late_minutes: i64,
    pub early_checkout_minutes: i64,
    pub overtime_minutes: i64,
    pub worked_minutes: i64,
}

impl ResolvedDay {
    fn status_only(status: AttendanceStatus) -> Self {
        Self {
            status,
            late_minutes: 0,
            early_checkout_minutes: 0,
            overtime_minutes: 0,
            worked_minutes: 0,
        }
    }

    /// Payroll credit for the day: full for worked-out/late days, half for
    /// half days, nothing otherwise.
    pub fn credit(&self) -> f64 {
        day_credit(self.status)
    }
}

pub fn day_credit(status: AttendanceStatus) -> f64 {
    match status {
        AttendanceStatus::CheckedOut | AttendanceStatus::Present | AttendanceStatus::Late => 1.0,
        AttendanceStatus::HalfDay => 0.5,
        _ => 0.0,
    }
}

/// Window snapshotted on the record at check-in time, if present. Views
/// prefer this over the live shift so reassigning a shift never rewrites
/// history.
pub fn snapshot_window(record: &AttendanceRecord) -> Option<ShiftWindow> {
    match (record.shift_start, record.shift_end) {
        (Some(start), Some(end)) => Some(ShiftWindow::new(
            start,
            end,
            record.grace_minutes.unwrap_or(0),
        )),
        _ => None,
    }
}

/// Minutes late past start+grace; zero when the check-in is on time.
pub fn late_minutes(check_in_min: i64, window: &ShiftWindow) -> i64 {
    if check_in_min <= window.start_min {
        return 0;
    }
    (check_in_min - window.start_min - window.grace_min).max(0)
}

/// The fixed 30-minute rule deciding LATE vs CHECKED_IN at check-in time.
pub fn is_late_for_status(check_in_min: i64, window: &ShiftWindow) -> bool {
    check_in_min - window.start_min > LATE_STATUS_THRESHOLD_MINUTES
}

/// Final status at check-out time based on worked duration.
pub fn classify_worked(worked: i64, min_work: i64, full_day: i64) -> AttendanceStatus {
    if worked < min_work {
        AttendanceStatus::HalfDay
    } else if worked < full_day {
        AttendanceStatus::HalfDay
    } else {
        AttendanceStatus::CheckedOut
    }
}

/// Resolves one employee-day to a status plus late/early/overtime minutes.
///
/// Precedence: pre-joining, future, holiday, then the check-in driven rules.
/// Holidays never derive ABSENT.
pub fn resolve_daily_status(input: &DayInput<'_>, policy: StatusPolicy) -> ResolvedDay {
    let today = input.now.date();

    if input.date < input.joining_date {
        return ResolvedDay::status_only(AttendanceStatus::NotApplicable);
    }
    if input.date > today {
        return ResolvedDay::status_only(AttendanceStatus::Unmarked);
    }
    if input.is_holiday {
        return ResolvedDay::status_only(AttendanceStatus::Holiday);
    }

    let check_in = input.record.and_then(|r| r.check_in_time);

    if policy == StatusPolicy::CheckInOnly {
        let status = if check_in.is_some() {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Absent
        };
        return ResolvedDay::status_only(status);
    }

    let window = input
        .record
        .and_then(snapshot_window)
        .or(input.window);

    // No check-in: absent once the day (or the shift, today) is over.
    let missing = || {
        if input.date < today {
            return ResolvedDay::status_only(AttendanceStatus::Absent);
        }
        let now_min = time_to_minutes(input.now.time());
        let past_shift = window
            .map(|w| now_min > w.end_with_grace())
            .unwrap_or(false);
        let status = if past_shift {
            AttendanceStatus::Absent
        } else {
            AttendanceStatus::Unmarked
        };
        ResolvedDay::status_only(status)
    };

    let Some(record) = input.record else {
        return missing();
    };
    let Some(ci) = record.check_in_time else {
        return missing();
    };

    let ci_min = time_to_minutes(ci);
    let late = window.as_ref().map(|w| late_minutes(ci_min, w)).unwrap_or(0);

    let Some(co) = record.check_out_time else {
        let late_status = window
            .as_ref()
            .map(|w| is_late_for_status(ci_min, w))
            .unwrap_or(false);
        let status = if late_status {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::CheckedIn
        };
        return ResolvedDay {
            status,
            late_minutes: late,
            early_checkout_minutes: 0,
            overtime_minutes: 0,
            worked_minutes: 0,
        };
    };

    let worked = worked_minutes(ci, co);
    let min_work = record.min_work_minutes.unwrap_or(input.min_work_minutes);
    let full_day = record.full_day_minutes.unwrap_or(input.full_day_minutes);
    let status = classify_worked(worked, min_work, full_day);

    let mut co_min = time_to_minutes(co);
    if co_min < ci_min {
        co_min += MINUTES_PER_DAY;
    }
    let (early, overtime) = window
        .map(|w| ((w.end_min - co_min).max(0), (co_min - w.end_min).max(0)))
        .unwrap_or((0, 0));

    ResolvedDay {
        status,
        late_minutes: late,
        early_checkout_minutes: early,
        overtime_minutes: overtime,
        worked_minutes: worked,
    }
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

    fn record(date: NaiveDate, ci: Option<NaiveTime>, co: Option<NaiveTime>) -> AttendanceRecord {
        AttendanceRecord {
            id: 1,
            employee_id: 7,
            attendance_date: date,
            check_in_time: ci,
            check_out_time: co,
            shift_start: Some(t(9, 0)),
            shift_end: Some(t(18, 0)),
            grace_minutes: Some(10),
            min_work_minutes: Some(DEFAULT_MIN_WORK_MINUTES),
            full_day_minutes: Some(DEFAULT_FULL_DAY_MINUTES),
            check_in_lat: Some(23.8),
            check_in_lng: Some(90.4),
            check_out_lat: None,
            check_out_lng: None,
            worked_minutes: None,
            overtime_minutes: None,
            status: "CHECKED_IN".into(),
            is_checked_in_session: ci.is_some() && co.is_none(),
            source: "WEB".into(),
        }
    }

    fn input<'a>(
        date: NaiveDate,
        now: NaiveDateTime,
        record: Option<&'a AttendanceRecord>,
    ) -> DayInput<'a> {
        DayInput {
            date,
            joining_date: d(2023, 1, 1),
            now,
            window: Some(ShiftWindow::new(t(9, 0), t(18, 0), 10)),
            is_holiday: false,
            record,
            min_work_minutes: DEFAULT_MIN_WORK_MINUTES,
            full_day_minutes: DEFAULT_FULL_DAY_MINUTES,
        }
    }

    fn noon(date: NaiveDate) -> NaiveDateTime {
        date.and_time(t(12, 0))
    }

    #[test]
    fn pre_joining_dates_resolve_dash_even_with_a_row() {
        let date = d(2022, 12, 30);
        let row = record(date, Some(t(9, 0)), Some(t(18, 0)));
        let inp = input(date, noon(d(2024, 1, 15)), Some(&row));
        let res = resolve_daily_status(&inp, StatusPolicy::FullStateMachine);
        assert_eq!(res.status, AttendanceStatus::NotApplicable);
    }

    #[test]
    fn future_dates_are_unmarked() {
        let inp = input(d(2024, 2, 1), noon(d(2024, 1, 15)), None);
        let res = resolve_daily_status(&inp, StatusPolicy::FullStateMachine);
        assert_eq!(res.status, AttendanceStatus::Unmarked);
    }

    #[test]
    fn holiday_never_becomes_absent() {
        let date = d(2024, 1, 26);
        let mut inp = input(date, noon(d(2024, 2, 10)), None);
        inp.is_holiday = true;
        let res = resolve_daily_status(&inp, StatusPolicy::FullStateMachine);
        assert_eq!(res.status, AttendanceStatus::Holiday);
    }

    #[test]
    fn on_time_check_in_within_grace() {
        // shift 09:00-18:00 grace 10, check-in 09:05
        let date = d(2024, 1, 15);
        let row = record(date, Some(t(9, 5)), None);
        let inp = input(date, noon(date), Some(&row));
        let res = resolve_daily_status(&inp, StatusPolicy::FullStateMachine);
        assert_eq!(res.status, AttendanceStatus::CheckedIn);
        assert_eq!(res.late_minutes, 0);
    }

    #[test]
    fn late_check_in_past_threshold() {
        // check-in 09:45: 45 > 30-minute threshold, late = 45 - 10 grace = 35
        let date = d(2024, 1, 15);
        let row = record(date, Some(t(9, 45)), None);
        let inp = input(date, noon(date), Some(&row));
        let res = resolve_daily_status(&inp, StatusPolicy::FullStateMachine);
        assert_eq!(res.status, AttendanceStatus::Late);
        assert_eq!(res.late_minutes, 35);
    }

    #[test]
    fn check_in_between_grace_and_threshold_is_checked_in_but_late_minutes_accrue() {
        // 09:25 is 25 min after start: below the 30-minute status threshold,
        // above the 10-minute grace.
        let date = d(2024, 1, 15);
        let row = record(date, Some(t(9, 25)), None);
        let inp = input(date, noon(date), Some(&row));
        let res = resolve_daily_status(&inp, StatusPolicy::FullStateMachine);
        assert_eq!(res.status, AttendanceStatus::CheckedIn);
        assert_eq!(res.late_minutes, 15);
    }

    #[test]
    fn full_day_checkout_with_overtime() {
        let date = d(2024, 1, 15);
        let row = record(date, Some(t(9, 0)), Some(t(19, 0)));
        let inp = input(date, date.and_time(t(20, 0)), Some(&row));
        let res = resolve_daily_status(&inp, StatusPolicy::FullStateMachine);
        assert_eq!(res.status, AttendanceStatus::CheckedOut);
        assert_eq!(res.worked_minutes, 600);
        assert_eq!(res.overtime_minutes, 60);
        assert_eq!(res.early_checkout_minutes, 0);
        assert_eq!(res.credit(), 1.0);
    }

    #[test]
    fn short_day_is_half_day_with_early_checkout() {
        let date = d(2024, 1, 15);
        let row = record(date, Some(t(9, 0)), Some(t(14, 0)));
        let inp = input(date, date.and_time(t(20, 0)), Some(&row));
        let res = resolve_daily_status(&inp, StatusPolicy::FullStateMachine);
        assert_eq!(res.status, AttendanceStatus::HalfDay);
        assert_eq!(res.worked_minutes, 300);
        assert_eq!(res.early_checkout_minutes, 240);
        assert_eq!(res.credit(), 0.5);
    }

    #[test]
    fn full_day_threshold_never_yields_half_day() {
        for extra in 0..180 {
            let worked = DEFAULT_FULL_DAY_MINUTES + extra;
            let status = classify_worked(worked, DEFAULT_MIN_WORK_MINUTES, DEFAULT_FULL_DAY_MINUTES);
            assert_ne!(status, AttendanceStatus::HalfDay, "worked = {worked}");
        }
    }

    #[test]
    fn overnight_shift_checkout_rolls_over_midnight() {
        // 22:00-06:00 shift, in 22:10, out 05:30 next day -> 450 minutes
        let date = d(2024, 1, 15);
        let mut row = record(date, Some(t(22, 10)), Some(t(5, 30)));
        row.shift_start = Some(t(22, 0));
        row.shift_end = Some(t(6, 0));
        let inp = input(date, d(2024, 1, 16).and_time(t(8, 0)), Some(&row));
        let res = resolve_daily_status(&inp, StatusPolicy::FullStateMachine);
        assert_eq!(res.worked_minutes, 450);
        assert_eq!(res.status, AttendanceStatus::HalfDay);
        assert_eq!(res.early_checkout_minutes, 30);
        assert_eq!(res.overtime_minutes, 0);
    }

    #[test]
    fn past_day_without_check_in_is_absent() {
        let inp = input(d(2024, 1, 10), noon(d(2024, 1, 15)), None);
        let res = resolve_daily_status(&inp, StatusPolicy::FullStateMachine);
        assert_eq!(res.status, AttendanceStatus::Absent);
    }

    #[test]
    fn today_before_shift_end_is_unmarked_after_end_is_absent() {
        let date = d(2024, 1, 15);
        let inp = input(date, noon(date), None);
        let res = resolve_daily_status(&inp, StatusPolicy::FullStateMachine);
        assert_eq!(res.status, AttendanceStatus::Unmarked);

        // 18:11 is past end 18:00 + grace 10
        let inp = input(date, date.and_time(t(18, 11)), None);
        let res = resolve_daily_status(&inp, StatusPolicy::FullStateMachine);
        assert_eq!(res.status, AttendanceStatus::Absent);
    }

    #[test]
    fn record_snapshot_window_wins_over_live_shift() {
        // Row snapshotted a 10:00 start; live shift says 09:00. 10:05 check-in
        // must resolve against the snapshot and stay on time.
        let date = d(2024, 1, 10);
        let mut row = record(date, Some(t(10, 5)), None);
        row.shift_start = Some(t(10, 0));
        let inp = input(date, noon(d(2024, 1, 15)), Some(&row));
        let res = resolve_daily_status(&inp, StatusPolicy::FullStateMachine);
        assert_eq!(res.status, AttendanceStatus::CheckedIn);
        assert_eq!(res.late_minutes, 0);
    }

    #[test]
    fn check_in_only_policy_counts_any_check_in_as_present() {
        let date = d(2024, 1, 10);
        let row = record(date, Some(t(13, 0)), None);
        let inp = input(date, noon(d(2024, 1, 15)), Some(&row));
        let res = resolve_daily_status(&inp, StatusPolicy::CheckInOnly);
        assert_eq!(res.status, AttendanceStatus::Present);

        let inp = input(date, noon(d(2024, 1, 15)), None);
        let res = resolve_daily_status(&inp, StatusPolicy::CheckInOnly);
        assert_eq!(res.status, AttendanceStatus::Absent);
    }
}
