//! Sprint scheduling and deadline classification.
//!
//! Everything in this module is a pure function of its arguments: the
//! reference instant is always passed in explicitly and is only defaulted
//! to the wall clock at the outermost call sites. That keeps the schedule
//! arithmetic testable and lets the live session and the reminder job share
//! one source of truth for "does the persisted data match the current
//! schedule".

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::fields::DeadlineStatus;
use crate::task::Task;

/// Number of sprint windows kept on the rolling schedule.
pub const DEFAULT_SPRINT_COUNT: u32 = 4;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// One weekly sprint period: a Monday-anchored week plus a one-week
/// overflow grace period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintWindow {
    /// 1-based position in the schedule.
    pub index: u32,
    /// Monday of the sprint week, local midnight.
    pub start: NaiveDateTime,
    /// Sunday of the sprint week, 23:59:59.999.
    pub end: NaiveDateTime,
    /// One week past `end`, same time of day.
    pub overflow_end: NaiveDateTime,
}

/// Deadline classification of a task relative to a reference instant.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadlineInfo {
    pub status: DeadlineStatus,
    /// Human-readable summary, e.g. "Due Sun Mar 10 (3d left)".
    pub label: String,
    /// The date the label refers to.
    pub target: Option<NaiveDateTime>,
}

/// Result of reconciling a task collection against a schedule.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub tasks: Vec<Task>,
    /// True iff any task's schedule-derived fields differed from its input.
    pub changed: bool,
}

/// Build `total_sprints` consecutive weekly windows anchored to the week
/// containing `reference`. Counts below 1 are treated as 1.
///
/// The first window starts on the most recent Monday at or before the
/// reference date, at local midnight; each window ends six days later at
/// the last millisecond of that day, with the overflow deadline one further
/// week out.
pub fn build_sprint_schedule(reference: NaiveDateTime, total_sprints: u32) -> Vec<SprintWindow> {
    let total = total_sprints.max(1);
    let back = i64::from(reference.date().weekday().num_days_from_monday());
    let first_monday = reference.date() - Duration::days(back);

    (0..total)
        .map(|i| {
            let start_date = first_monday + Duration::weeks(i64::from(i));
            let end_date = start_date + Duration::days(6);
            let end = end_date.and_hms_milli_opt(23, 59, 59, 999).unwrap();
            SprintWindow {
                index: i + 1,
                start: start_date.and_time(NaiveTime::MIN),
                end,
                overflow_end: end + Duration::days(7),
            }
        })
        .collect()
}

/// Resolve the sprint a task belongs to. Total: always returns an index
/// of at least 1.
///
/// An explicit finite `sprintIndex` wins (floored, clamped to 1). Without
/// one, the tags are scanned for a legacy "week<digits>" encoding left by
/// older clients. Tasks with neither land in the first sprint.
pub fn resolve_task_sprint_index(task: &Task) -> u32 {
    if let Some(raw) = task.sprint_index {
        if raw.is_finite() {
            return raw.floor().max(1.0) as u32;
        }
    }
    task.tags
        .iter()
        .find_map(|tag| sprint_index_from_tag(tag))
        .unwrap_or(1)
}

/// Parse a "week<digits>" marker anywhere inside a tag, case-insensitively.
fn sprint_index_from_tag(tag: &str) -> Option<u32> {
    let lower = tag.to_lowercase();
    for (pos, _) in lower.match_indices("week") {
        let digits: String = lower[pos + 4..]
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        if digits.is_empty() {
            continue;
        }
        if let Ok(n) = digits.parse::<u32>() {
            return Some(n.max(1));
        }
    }
    None
}

/// Classify a deadline pair against `now`.
///
/// Both comparisons are inclusive: a task is still on track at the exact
/// due instant and still in overflow at the exact overflow instant.
/// Day counts round up and never go negative.
pub fn describe_task_deadline(
    due: Option<NaiveDateTime>,
    overflow: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> DeadlineInfo {
    let Some(due) = due else {
        return DeadlineInfo {
            status: DeadlineStatus::None,
            label: "No due date".to_string(),
            target: None,
        };
    };

    if now <= due {
        let left = days_left(now, due);
        return DeadlineInfo {
            status: DeadlineStatus::OnTrack,
            label: format!("Due {} ({}d left)", format_day(due), left),
            target: Some(due),
        };
    }

    if let Some(overflow) = overflow {
        if now <= overflow {
            let left = days_left(now, overflow);
            return DeadlineInfo {
                status: DeadlineStatus::Overflow,
                label: format!("Overflow until {} ({}d left)", format_day(overflow), left),
                target: Some(overflow),
            };
        }
    }

    let target = overflow.unwrap_or(due);
    DeadlineInfo {
        status: DeadlineStatus::Late,
        label: format!("Late since {}", format_day(target)),
        target: Some(target),
    }
}

/// Whole days remaining from `from` to `to`, rounded up, floored at zero.
fn days_left(from: NaiveDateTime, to: NaiveDateTime) -> i64 {
    let ms = (to - from).num_milliseconds();
    if ms <= 0 {
        0
    } else {
        (ms + MS_PER_DAY - 1) / MS_PER_DAY
    }
}

fn format_day(d: NaiveDateTime) -> String {
    d.format("%a %b %-d").to_string()
}

/// Reconcile a task collection against a built schedule.
///
/// Every returned task carries its resolved sprint index, a due date equal
/// to the matching window's end, an overflow date equal to that window's
/// overflow end, and a concrete subtask list. Indexes beyond the schedule
/// fall back to the last window. The input is never mutated, and running
/// the result through again with the same schedule reports no change.
///
/// Callers must pass a non-empty schedule (`build_sprint_schedule` always
/// yields at least one window); an empty one returns the input unchanged.
pub fn ensure_sprint_dates(tasks: &[Task], schedule: &[SprintWindow]) -> ReconcileOutcome {
    let Some(fallback) = schedule.last() else {
        return ReconcileOutcome {
            tasks: tasks.to_vec(),
            changed: false,
        };
    };

    let mut changed = false;
    let tasks = tasks
        .iter()
        .map(|task| {
            let index = resolve_task_sprint_index(task);
            let window = schedule
                .iter()
                .find(|w| w.index == index)
                .unwrap_or(fallback);

            let mut next = task.clone();
            next.sprint_index = Some(f64::from(index));
            next.due_date = Some(window.end);
            next.overflow_date = Some(window.overflow_end);
            if next.subtasks.is_none() {
                next.subtasks = Some(Vec::new());
            }

            changed |= next.due_date != task.due_date
                || next.overflow_date != task.overflow_date
                || next.sprint_index != task.sprint_index
                || task.subtasks.is_none();
            next
        })
        .collect();

    ReconcileOutcome { tasks, changed }
}

/// Select the schedule entry whose [start, overflowEnd] range contains
/// `reference`, falling back to the last entry. An empty schedule yields
/// the sole entry of a fresh one-sprint schedule anchored at `reference`.
pub fn active_sprint(schedule: &[SprintWindow], reference: NaiveDateTime) -> SprintWindow {
    let contains = |w: &&SprintWindow| w.start <= reference && reference <= w.overflow_end;
    match schedule.iter().find(contains).or_else(|| schedule.last()) {
        Some(window) => window.clone(),
        None => build_sprint_schedule(reference, 1).remove(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Weekday};

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn task_with_tags(tags: &[&str]) -> Task {
        let mut t = Task::new("t".into(), crate::fields::TaskType::Sprint);
        t.tags = tags.iter().map(|s| s.to_string()).collect();
        t
    }

    #[test]
    fn schedule_has_requested_shape() {
        for (reference, count) in [
            (dt(2024, 3, 6, 10, 30, 0), 4u32),
            (dt(2024, 3, 4, 0, 0, 0), 1),
            (dt(2024, 12, 31, 23, 59, 59), 8),
        ] {
            let schedule = build_sprint_schedule(reference, count);
            assert_eq!(schedule.len(), count as usize);
            for (i, w) in schedule.iter().enumerate() {
                assert_eq!(w.index, i as u32 + 1);
                assert!(w.start <= w.end);
                assert!(w.end < w.overflow_end);
                assert_eq!((w.end - w.start).num_milliseconds(), 7 * MS_PER_DAY - 1);
                assert_eq!((w.overflow_end - w.end).num_days(), 7);
                if i > 0 {
                    assert_eq!((w.start - schedule[i - 1].start).num_days(), 7);
                }
            }
        }
    }

    #[test]
    fn schedule_starts_on_monday_midnight_for_any_weekday() {
        // 2024-03-04 is a Monday; walk the whole week.
        for day in 4..=10 {
            let schedule = build_sprint_schedule(dt(2024, 3, day, 15, 0, 0), 4);
            let first = &schedule[0];
            assert_eq!(first.start, dt(2024, 3, 4, 0, 0, 0));
            assert_eq!(first.start.weekday(), Weekday::Mon);
            assert_eq!(
                first.end,
                NaiveDate::from_ymd_opt(2024, 3, 10)
                    .unwrap()
                    .and_hms_milli_opt(23, 59, 59, 999)
                    .unwrap()
            );
        }
    }

    #[test]
    fn zero_sprint_count_is_clamped_to_one() {
        assert_eq!(build_sprint_schedule(dt(2024, 3, 6, 0, 0, 0), 0).len(), 1);
    }

    #[test]
    fn resolver_defaults_to_first_sprint() {
        assert_eq!(resolve_task_sprint_index(&task_with_tags(&[])), 1);
        assert_eq!(resolve_task_sprint_index(&task_with_tags(&["backend", "urgent"])), 1);
        // "week" with no digits is not a marker.
        assert_eq!(resolve_task_sprint_index(&task_with_tags(&["weekly"])), 1);
    }

    #[test]
    fn resolver_reads_tag_encoding_case_insensitively() {
        assert_eq!(resolve_task_sprint_index(&task_with_tags(&["tag-week3"])), 3);
        assert_eq!(resolve_task_sprint_index(&task_with_tags(&["TAG-WEEK3"])), 3);
        assert_eq!(resolve_task_sprint_index(&task_with_tags(&["Week12"])), 12);
        // First "week" hit has no digits; scanning continues.
        assert_eq!(resolve_task_sprint_index(&task_with_tags(&["weekly-week2"])), 2);
        // Parsed zero clamps up to 1.
        assert_eq!(resolve_task_sprint_index(&task_with_tags(&["week0"])), 1);
    }

    #[test]
    fn resolver_prefers_explicit_index() {
        let mut t = task_with_tags(&["tag-week3"]);
        t.sprint_index = Some(2.0);
        assert_eq!(resolve_task_sprint_index(&t), 2);
        t.sprint_index = Some(2.7);
        assert_eq!(resolve_task_sprint_index(&t), 2);
        t.sprint_index = Some(0.4);
        assert_eq!(resolve_task_sprint_index(&t), 1);
        t.sprint_index = Some(-3.0);
        assert_eq!(resolve_task_sprint_index(&t), 1);
        // Non-finite values fall through to the tag.
        t.sprint_index = Some(f64::NAN);
        assert_eq!(resolve_task_sprint_index(&t), 3);
    }

    #[test]
    fn classifier_without_due_date() {
        let info = describe_task_deadline(None, None, dt(2024, 3, 6, 12, 0, 0));
        assert_eq!(info.status, DeadlineStatus::None);
        assert_eq!(info.label, "No due date");
        assert_eq!(info.target, None);
    }

    #[test]
    fn classifier_boundaries_are_inclusive() {
        let due = dt(2024, 3, 10, 23, 59, 59);
        let overflow = dt(2024, 3, 17, 23, 59, 59);

        let at_due = describe_task_deadline(Some(due), Some(overflow), due);
        assert_eq!(at_due.status, DeadlineStatus::OnTrack);
        assert_eq!(at_due.target, Some(due));
        assert!(at_due.label.contains("0d left"));

        let at_overflow = describe_task_deadline(Some(due), Some(overflow), overflow);
        assert_eq!(at_overflow.status, DeadlineStatus::Overflow);
        assert_eq!(at_overflow.target, Some(overflow));

        let past = describe_task_deadline(
            Some(due),
            Some(overflow),
            overflow + Duration::milliseconds(1),
        );
        assert_eq!(past.status, DeadlineStatus::Late);
        assert_eq!(past.target, Some(overflow));
    }

    #[test]
    fn classifier_rounds_days_up() {
        let due = dt(2024, 3, 10, 0, 0, 0);
        let barely = describe_task_deadline(Some(due), None, due - Duration::milliseconds(1));
        assert_eq!(barely.status, DeadlineStatus::OnTrack);
        assert!(barely.label.contains("1d left"));

        let half = describe_task_deadline(Some(due), None, dt(2024, 3, 8, 12, 0, 0));
        assert!(half.label.contains("2d left"));
    }

    #[test]
    fn classifier_late_without_overflow_targets_due_date() {
        let due = dt(2024, 3, 10, 23, 59, 59);
        let info = describe_task_deadline(Some(due), None, due + Duration::days(1));
        assert_eq!(info.status, DeadlineStatus::Late);
        assert_eq!(info.target, Some(due));
    }

    #[test]
    fn reconcile_assigns_window_dates_and_reports_change() {
        let schedule = build_sprint_schedule(dt(2024, 3, 6, 9, 0, 0), 4);
        let tasks = vec![task_with_tags(&["tag-week2"])];

        let outcome = ensure_sprint_dates(&tasks, &schedule);
        assert!(outcome.changed);
        assert_eq!(outcome.tasks[0].due_date, Some(schedule[1].end));
        assert_eq!(outcome.tasks[0].overflow_date, Some(schedule[1].overflow_end));
        assert_eq!(outcome.tasks[0].sprint_index, Some(2.0));
        // Input untouched.
        assert_eq!(tasks[0].due_date, None);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let schedule = build_sprint_schedule(dt(2024, 3, 6, 9, 0, 0), 4);
        let mut stale = task_with_tags(&["tag-week3"]);
        stale.subtasks = None;
        let tasks = vec![task_with_tags(&[]), stale, {
            let mut t = task_with_tags(&[]);
            t.sprint_index = Some(2.7);
            t
        }];

        let first = ensure_sprint_dates(&tasks, &schedule);
        assert!(first.changed);
        let second = ensure_sprint_dates(&first.tasks, &schedule);
        assert!(!second.changed);
        assert_eq!(first.tasks.len(), second.tasks.len());
    }

    #[test]
    fn reconcile_normalizes_missing_subtasks() {
        let schedule = build_sprint_schedule(dt(2024, 3, 6, 9, 0, 0), 1);
        let mut t = task_with_tags(&[]);
        t.subtasks = None;
        let outcome = ensure_sprint_dates(&[t], &schedule);
        assert!(outcome.changed);
        assert!(outcome.tasks[0].subtasks.is_some());
        assert!(outcome.tasks[0].subtasks().is_empty());
    }

    #[test]
    fn reconcile_round_trips_every_index_to_its_window() {
        let schedule = build_sprint_schedule(dt(2024, 3, 6, 9, 0, 0), 4);
        let tasks: Vec<Task> = (1..=6u32)
            .map(|i| {
                let mut t = task_with_tags(&[]);
                t.sprint_index = Some(f64::from(i));
                t
            })
            .collect();

        let outcome = ensure_sprint_dates(&tasks, &schedule);
        for (i, task) in outcome.tasks.iter().enumerate() {
            let wanted = schedule
                .iter()
                .find(|w| w.index == i as u32 + 1)
                .unwrap_or_else(|| schedule.last().unwrap());
            assert_eq!(task.due_date, Some(wanted.end));
            assert_eq!(task.overflow_date, Some(wanted.overflow_end));
        }
    }

    #[test]
    fn reconcile_with_empty_schedule_returns_input() {
        let tasks = vec![task_with_tags(&["tag-week2"])];
        let outcome = ensure_sprint_dates(&tasks, &[]);
        assert!(!outcome.changed);
        assert_eq!(outcome.tasks[0].due_date, None);
    }

    #[test]
    fn active_sprint_contains_reference_instant() {
        let reference = dt(2024, 3, 6, 9, 0, 0); // a Wednesday
        let schedule = build_sprint_schedule(reference, 4);
        let active = active_sprint(&schedule, reference);
        assert_eq!(active.index, 1);

        // Inside window 2's overflow but past its nominal end.
        let later = schedule[1].end + Duration::days(3);
        assert_eq!(active_sprint(&schedule, later).index, 2);
    }

    #[test]
    fn active_sprint_falls_back_to_last_entry() {
        let schedule = build_sprint_schedule(dt(2024, 3, 6, 9, 0, 0), 2);
        let before = schedule[0].start - Duration::days(1);
        assert_eq!(active_sprint(&schedule, before).index, 2);
        let after = schedule[1].overflow_end + Duration::days(30);
        assert_eq!(active_sprint(&schedule, after).index, 2);
    }

    #[test]
    fn active_sprint_builds_fallback_for_empty_schedule() {
        let reference = dt(2024, 3, 6, 9, 0, 0);
        let active = active_sprint(&[], reference);
        assert_eq!(active.index, 1);
        assert!(active.start <= reference && reference <= active.overflow_end);
    }
}
