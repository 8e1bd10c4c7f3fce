//! Gate calculator.
//!
//! Derives whether a caregiver may start their current program day from the
//! progress and control records, the admin overrides and the current time.
//! Everything here is pure: no I/O, no clock access, no mutation of inputs.
//!
//! Precedence, first match wins:
//!
//! 1. `paused` / `terminated` / `completed` status closes the gate
//! 2. an override for the current day opens it
//! 3. day 1, or nothing completed yet, is open immediately
//! 4. the previous day must be recorded, otherwise `previous_day_incomplete`
//! 5. the delay after the previous completion must have elapsed
//!    (rolled past weekends when `skipWeekends` is set)
//! 6. the current local hour must be inside `allowedStartHours`

use chrono::{
    DateTime, Datelike, Days, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc,
    Weekday,
};
use shared::{AllowedStartHours, BlockedReason, CustomSettings, ProgramStatus};

use super::models::{ControlRecord, GateResult, OverrideRecord, ProgressRecord};

/// Upper bound applied to `delayHours` before converting to a duration
const MAX_DELAY_HOURS: f64 = 1_000_000.0;

/// Compute the authoritative gate for the caregiver's current day
pub fn recalculate_gating(
    progress: &ProgressRecord,
    control: &ControlRecord,
    overrides: &[OverrideRecord],
    local_offset: FixedOffset,
    now: DateTime<Utc>,
) -> GateResult {
    let day = progress.current_day;

    match control.status {
        ProgramStatus::Terminated => {
            return GateResult::closed(day, BlockedReason::ProgramTerminated, None, now)
        }
        ProgramStatus::Paused => {
            return GateResult::closed(day, BlockedReason::ProgramPaused, None, now)
        }
        ProgramStatus::Completed => {
            return GateResult::closed(day, BlockedReason::ProgramCompleted, None, now)
        }
        ProgramStatus::Active => {}
    }

    if overrides.iter().any(|entry| entry.day == day) {
        return GateResult::open(day, now, now);
    }

    if day <= 1 || progress.completed_days.is_empty() {
        return GateResult::open(day, now, now);
    }

    let Some(previous) = progress.completion(day - 1) else {
        return GateResult::closed(day, BlockedReason::PreviousDayIncomplete, None, now);
    };

    let settings = &control.custom_settings;
    let mut next_available = previous
        .completed_at
        .checked_add_signed(delay_duration(control.delay_hours))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    if settings.skip_weekends && is_weekend(next_available, local_offset) {
        next_available = next_weekday_start(next_available, settings, local_offset);
    }

    if now < next_available {
        return GateResult::closed(day, BlockedReason::TimeDelay, Some(next_available), now);
    }

    if settings.skip_weekends && is_weekend(now, local_offset) {
        let reopens = next_weekday_start(now, settings, local_offset);
        return GateResult::closed(day, BlockedReason::OutsideAllowedHours, Some(reopens), now);
    }

    let local_hour = now.with_timezone(&local_offset).hour();
    if !hour_in_window(local_hour, settings.allowed_start_hours) {
        let reopens = next_window_start(now, settings, local_offset);
        return GateResult::closed(day, BlockedReason::OutsideAllowedHours, Some(reopens), now);
    }

    GateResult::open(day, next_available, now)
}

/// Convert fractional delay hours to a duration, treating invalid values as zero
pub fn delay_duration(delay_hours: f64) -> Duration {
    if !delay_hours.is_finite() || delay_hours <= 0.0 {
        return Duration::zero();
    }
    let millis = (delay_hours.min(MAX_DELAY_HOURS) * 3_600_000.0).round() as i64;
    Duration::milliseconds(millis)
}

/// `end` is exclusive; `start > end` wraps past midnight; `start == end` is the whole day
pub fn hour_in_window(hour: u32, window: AllowedStartHours) -> bool {
    let start = u32::from(window.start);
    let end = u32::from(window.end);
    if start < end {
        hour >= start && hour < end
    } else if start > end {
        hour >= start || hour < end
    } else {
        true
    }
}

fn is_weekend(instant: DateTime<Utc>, local_offset: FixedOffset) -> bool {
    is_weekend_day(instant.with_timezone(&local_offset).weekday())
}

fn is_weekend_day(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

/// Window start on the given local day, or on the following Monday for a weekend day
fn next_weekday_start(
    instant: DateTime<Utc>,
    settings: &CustomSettings,
    local_offset: FixedOffset,
) -> DateTime<Utc> {
    let date = instant.with_timezone(&local_offset).date_naive();
    let skip = match date.weekday() {
        Weekday::Sat => 2,
        Weekday::Sun => 1,
        _ => 0,
    };
    let monday = date.checked_add_days(Days::new(skip)).unwrap_or(date);
    local_at_hour(monday, settings.allowed_start_hours.start, local_offset)
}

/// Next local occurrence of the window start strictly after `now`
fn next_window_start(
    now: DateTime<Utc>,
    settings: &CustomSettings,
    local_offset: FixedOffset,
) -> DateTime<Utc> {
    let start_hour = settings.allowed_start_hours.start;
    let today = now.with_timezone(&local_offset).date_naive();
    let mut candidate = local_at_hour(today, start_hour, local_offset);
    if candidate <= now {
        let tomorrow = today.succ_opt().unwrap_or(today);
        candidate = local_at_hour(tomorrow, start_hour, local_offset);
    }
    if settings.skip_weekends && is_weekend(candidate, local_offset) {
        candidate = next_weekday_start(candidate, settings, local_offset);
    }
    candidate
}

fn local_at_hour(date: NaiveDate, hour: u8, local_offset: FixedOffset) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(u32::from(hour.min(23)), 0, 0).unwrap_or(NaiveTime::MIN);
    let naive = date.and_time(time);
    // A fixed offset maps every local time to exactly one instant
    local_offset
        .from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::domain::models::CompletedDayRecord;
    use chrono::Offset;

    fn utc() -> FixedOffset {
        Utc.fix()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    /// Caregiver on `current_day` with every earlier day completed at `last_completed_at`
    fn progress_on_day(current_day: u32, last_completed_at: DateTime<Utc>) -> ProgressRecord {
        let mut progress = ProgressRecord::new("cg-1");
        for day in 1..current_day {
            progress.record_completion(CompletedDayRecord {
                day,
                completed_at: last_completed_at,
                notes: None,
                time_spent: 10.0,
            });
        }
        progress.current_day = current_day;
        progress
    }

    fn control(delay_hours: f64) -> ControlRecord {
        ControlRecord::new("cg-1", delay_hours)
    }

    fn unlock(day: u32, now: DateTime<Utc>) -> OverrideRecord {
        OverrideRecord {
            day,
            unlocked_by: "admin-1".to_string(),
            unlocked_at: now,
            reason: None,
        }
    }

    #[test]
    fn test_first_day_is_open_immediately() {
        let now = at(2025, 3, 3, 9, 0);
        let gate = recalculate_gating(&ProgressRecord::new("cg-1"), &control(24.0), &[], utc(), now);

        assert!(gate.can_start_current_day);
        assert_eq!(gate.blocked_reason, None);
        assert_eq!(gate.next_available_at, Some(now));
        assert_eq!(gate.current_available_day, 1);
    }

    #[test]
    fn test_delay_blocks_until_elapsed() {
        let completed = at(2025, 3, 3, 9, 0);
        let progress = progress_on_day(2, completed);
        let control = control(24.0);

        let during = recalculate_gating(&progress, &control, &[], utc(), completed + Duration::hours(1));
        assert!(!during.can_start_current_day);
        assert_eq!(during.blocked_reason, Some(BlockedReason::TimeDelay));
        assert_eq!(during.next_available_at, Some(completed + Duration::hours(24)));

        let after = recalculate_gating(
            &progress,
            &control,
            &[],
            utc(),
            completed + Duration::hours(24) + Duration::seconds(1),
        );
        assert!(after.can_start_current_day);
        assert_eq!(after.blocked_reason, None);
    }

    #[test]
    fn test_fractional_delay_hours() {
        let completed = at(2025, 3, 3, 9, 0);
        let progress = progress_on_day(2, completed);

        let gate = recalculate_gating(&progress, &control(1.5), &[], utc(), completed + Duration::minutes(89));
        assert_eq!(gate.next_available_at, Some(completed + Duration::minutes(90)));
        assert!(!gate.can_start_current_day);
    }

    #[test]
    fn test_paused_and_terminated_dominate_overrides() {
        let now = at(2025, 3, 3, 9, 0);
        let progress = progress_on_day(3, now - Duration::hours(48));
        let overrides = [unlock(3, now)];

        let mut paused = control(24.0);
        paused.status = ProgramStatus::Paused;
        let gate = recalculate_gating(&progress, &paused, &overrides, utc(), now);
        assert!(!gate.can_start_current_day);
        assert_eq!(gate.blocked_reason, Some(BlockedReason::ProgramPaused));

        let mut terminated = control(24.0);
        terminated.status = ProgramStatus::Terminated;
        let gate = recalculate_gating(&progress, &terminated, &overrides, utc(), now);
        assert!(!gate.can_start_current_day);
        assert_eq!(gate.blocked_reason, Some(BlockedReason::ProgramTerminated));
    }

    #[test]
    fn test_completed_program_is_closed() {
        let now = at(2025, 3, 3, 9, 0);
        let mut finished = control(0.0);
        finished.status = ProgramStatus::Completed;

        let gate = recalculate_gating(&progress_on_day(10, now), &finished, &[], utc(), now);
        assert_eq!(gate.blocked_reason, Some(BlockedReason::ProgramCompleted));
    }

    #[test]
    fn test_override_opens_gate_inside_delay_window() {
        let completed = at(2025, 3, 3, 9, 0);
        let now = completed + Duration::hours(2);
        let progress = progress_on_day(5, completed);

        let gate = recalculate_gating(&progress, &control(24.0), &[unlock(5, now)], utc(), now);
        assert!(gate.can_start_current_day);
        assert_eq!(gate.blocked_reason, None);
    }

    #[test]
    fn test_override_for_other_day_is_ignored() {
        let completed = at(2025, 3, 3, 9, 0);
        let now = completed + Duration::hours(2);
        let progress = progress_on_day(5, completed);

        let gate = recalculate_gating(&progress, &control(24.0), &[unlock(4, now)], utc(), now);
        assert_eq!(gate.blocked_reason, Some(BlockedReason::TimeDelay));
    }

    #[test]
    fn test_missing_previous_day_fails_safe() {
        let now = at(2025, 3, 3, 9, 0);
        let mut progress = progress_on_day(2, now);
        progress.current_day = 4;

        let gate = recalculate_gating(&progress, &control(0.0), &[], utc(), now);
        assert!(!gate.can_start_current_day);
        assert_eq!(gate.blocked_reason, Some(BlockedReason::PreviousDayIncomplete));
        assert_eq!(gate.next_available_at, None);
    }

    #[test]
    fn test_outside_allowed_hours_points_at_next_start() {
        let completed = at(2025, 3, 3, 6, 0);
        let progress = progress_on_day(2, completed);
        let mut control = control(0.0);
        control.custom_settings.allowed_start_hours = AllowedStartHours { start: 9, end: 17 };

        let early = recalculate_gating(&progress, &control, &[], utc(), at(2025, 3, 3, 7, 30));
        assert_eq!(early.blocked_reason, Some(BlockedReason::OutsideAllowedHours));
        assert_eq!(early.next_available_at, Some(at(2025, 3, 3, 9, 0)));

        let late = recalculate_gating(&progress, &control, &[], utc(), at(2025, 3, 3, 17, 0));
        assert_eq!(late.blocked_reason, Some(BlockedReason::OutsideAllowedHours));
        assert_eq!(late.next_available_at, Some(at(2025, 3, 4, 9, 0)));

        let inside = recalculate_gating(&progress, &control, &[], utc(), at(2025, 3, 3, 16, 59));
        assert!(inside.can_start_current_day);
    }

    #[test]
    fn test_allowed_hours_use_local_offset() {
        let completed = at(2025, 3, 3, 0, 0);
        let progress = progress_on_day(2, completed);
        let mut control = control(0.0);
        control.custom_settings.allowed_start_hours = AllowedStartHours { start: 9, end: 17 };
        let new_york = FixedOffset::west_opt(5 * 3600).unwrap();

        // 13:00 UTC is 08:00 in UTC-5
        let gate = recalculate_gating(&progress, &control, &[], new_york, at(2025, 3, 3, 13, 0));
        assert_eq!(gate.blocked_reason, Some(BlockedReason::OutsideAllowedHours));
        assert_eq!(gate.next_available_at, Some(at(2025, 3, 3, 14, 0)));
    }

    #[test]
    fn test_skip_weekends_rolls_delay_to_monday() {
        // Friday 2025-03-07 10:00 + 24h lands on Saturday
        let completed = at(2025, 3, 7, 10, 0);
        let progress = progress_on_day(2, completed);
        let mut control = control(24.0);
        control.custom_settings.skip_weekends = true;
        control.custom_settings.allowed_start_hours = AllowedStartHours { start: 8, end: 20 };

        let gate = recalculate_gating(&progress, &control, &[], utc(), at(2025, 3, 8, 12, 0));
        assert_eq!(gate.blocked_reason, Some(BlockedReason::TimeDelay));
        assert_eq!(gate.next_available_at, Some(at(2025, 3, 10, 8, 0)));

        let monday = recalculate_gating(&progress, &control, &[], utc(), at(2025, 3, 10, 8, 0));
        assert!(monday.can_start_current_day);
    }

    #[test]
    fn test_skip_weekends_blocks_when_now_is_weekend() {
        // Delay elapsed on Thursday but the caregiver comes back on Sunday
        let completed = at(2025, 3, 5, 10, 0);
        let progress = progress_on_day(2, completed);
        let mut control = control(24.0);
        control.custom_settings.skip_weekends = true;

        let gate = recalculate_gating(&progress, &control, &[], utc(), at(2025, 3, 9, 15, 0));
        assert_eq!(gate.blocked_reason, Some(BlockedReason::OutsideAllowedHours));
        assert_eq!(gate.next_available_at, Some(at(2025, 3, 10, 0, 0)));
    }

    #[test]
    fn test_overnight_window() {
        let window = AllowedStartHours { start: 22, end: 6 };
        assert!(hour_in_window(23, window));
        assert!(hour_in_window(2, window));
        assert!(!hour_in_window(6, window));
        assert!(!hour_in_window(12, window));
        assert!(hour_in_window(12, AllowedStartHours { start: 7, end: 7 }));
    }

    #[test]
    fn test_calculation_is_repeatable() {
        let completed = at(2025, 3, 3, 9, 0);
        let progress = progress_on_day(4, completed);
        let control = control(12.0);
        let now = completed + Duration::hours(3);

        let first = recalculate_gating(&progress, &control, &[], utc(), now);
        let second = recalculate_gating(&progress, &control, &[], utc(), now);

        assert_eq!(first, second);
        assert_eq!(progress.current_day, 4);
        assert_eq!(progress.completed_days.len(), 3);
    }

    #[test]
    fn test_delay_duration_guards_invalid_values() {
        assert_eq!(delay_duration(-3.0), Duration::zero());
        assert_eq!(delay_duration(f64::NAN), Duration::zero());
        assert_eq!(delay_duration(0.5), Duration::minutes(30));
    }
}
