//! The reminder job: digest composition and dispatch.
//!
//! A scheduled, non-interactive run reads the board, reconciles it,
//! collects outstanding sprint tasks for the active window, and either
//! records a zero-count snapshot or sends a plaintext digest and records
//! what was sent. The job is idempotent per sprint: operators can inspect
//! the snapshot to see whether a run already reported nothing outstanding.

use std::fs;
use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::board::{epoch_millis, BoardSession, BoardStore, OutstandingTask, ReminderSnapshot};
use crate::fields::{format_column, Column, TaskType};
use crate::sprint::{active_sprint, describe_task_deadline, resolve_task_sprint_index, SprintWindow};
use crate::task::Task;

/// A composed message handed to the transport.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivery boundary. The shipped implementation writes to a local outbox
/// directory; network transports plug in behind this trait.
pub trait MailTransport {
    fn send(&self, mail: &OutgoingMail) -> Result<(), String>;
}

/// Writes each message as an RFC-822-shaped file into an outbox directory,
/// for pickup by whatever actually delivers mail on this machine.
pub struct OutboxTransport {
    dir: PathBuf,
}

impl OutboxTransport {
    pub fn new(dir: PathBuf) -> Self {
        OutboxTransport { dir }
    }
}

impl MailTransport for OutboxTransport {
    fn send(&self, mail: &OutgoingMail) -> Result<(), String> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| format!("cannot create outbox {}: {e}", self.dir.display()))?;
        let name = format!("reminder-{}.eml", uuid::Uuid::new_v4());
        let path = self.dir.join(name);
        let contents = format!(
            "To: {}\nSubject: {}\n\n{}",
            mail.to, mail.subject, mail.body
        );
        fs::write(&path, contents).map_err(|e| format!("cannot write {}: {e}", path.display()))?;
        println!("Reminder written to {}", path.display());
        Ok(())
    }
}

/// What a reminder run did, for the caller's summary line.
#[derive(Debug)]
pub struct ReminderReport {
    pub sprint_index: u32,
    pub outstanding: usize,
    pub sent: bool,
}

/// Tasks that belong in the digest: sprint-scoped, not done, assigned to
/// the active sprint window.
pub fn outstanding_sprint_tasks<'a>(tasks: &'a [Task], active: &SprintWindow) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| {
            t.task_type == TaskType::Sprint
                && t.column != Column::Done
                && resolve_task_sprint_index(t) == active.index
        })
        .collect()
}

/// Compose the plaintext digest: the sprint window header plus one line
/// per outstanding task with its column and deadline label.
pub fn compose_digest(
    active: &SprintWindow,
    outstanding: &[&Task],
    now: NaiveDateTime,
) -> OutgoingMailBody {
    let subject = format!(
        "Sprint {} reminder: {} outstanding task{}",
        active.index,
        outstanding.len(),
        if outstanding.len() == 1 { "" } else { "s" }
    );

    let mut body = format!(
        "Sprint {}: {} to {} (overflow until {})\n\nOutstanding tasks:\n",
        active.index,
        active.start.format("%Y-%m-%d"),
        active.end.format("%Y-%m-%d"),
        active.overflow_end.format("%Y-%m-%d"),
    );
    for task in outstanding {
        let deadline = describe_task_deadline(task.due_date, task.overflow_date, now);
        body.push_str(&format!(
            "- {} [{}] {}\n",
            task.title,
            format_column(task.column),
            deadline.label
        ));
    }
    body.push_str("\nSent by sprintboard.\n");

    OutgoingMailBody { subject, body }
}

/// Subject/body pair before a recipient is attached.
#[derive(Debug)]
pub struct OutgoingMailBody {
    pub subject: String,
    pub body: String,
}

/// Run one reminder cycle against the store.
///
/// `recipient` is the already-resolved command-line/environment address;
/// when absent, the address stored in the reminder document is used. With
/// nothing outstanding, a zero-count snapshot is written and no mail is
/// sent. Missing recipient with outstanding work is a configuration error.
pub fn run_reminder_job(
    store: &BoardStore,
    recipient: Option<String>,
    transport: &dyn MailTransport,
    now: NaiveDateTime,
) -> Result<ReminderReport, String> {
    let session = BoardSession::open_at(store.clone(), now)
        .map_err(|e| format!("cannot open board: {e}"))?;
    let active = active_sprint(&session.schedule, now);
    let outstanding = outstanding_sprint_tasks(&session.board.tasks, &active);

    let snapshot = ReminderSnapshot {
        generated_at: epoch_millis(now),
        sprint_index: active.index,
        sprint_start: active.start,
        sprint_end: active.end,
        overflow_end: active.overflow_end,
        outstanding_count: outstanding.len(),
        outstanding_tasks: outstanding
            .iter()
            .map(|t| OutstandingTask {
                id: t.id.clone(),
                title: t.title.clone(),
                column: t.column,
                due_date: t.due_date,
                overflow_date: t.overflow_date,
            })
            .collect(),
    };

    let mut reminder = store.load_reminder();

    if outstanding.is_empty() {
        reminder.snapshot = Some(snapshot);
        store
            .save_reminder(&reminder)
            .map_err(|e| format!("cannot record snapshot: {e}"))?;
        return Ok(ReminderReport {
            sprint_index: active.index,
            outstanding: 0,
            sent: false,
        });
    }

    let to = recipient
        .or_else(|| reminder.email.clone())
        .ok_or_else(|| {
            "no reminder recipient configured (pass --to or set SPRINTBOARD_EMAIL)".to_string()
        })?;

    let digest = compose_digest(&active, &outstanding, now);
    transport.send(&OutgoingMail {
        to: to.clone(),
        subject: digest.subject,
        body: digest.body,
    })?;

    let count = outstanding.len();
    reminder.email = Some(to);
    reminder.last_notified_at = Some(epoch_millis(now));
    reminder.snapshot = Some(snapshot);
    store
        .save_reminder(&reminder)
        .map_err(|e| format!("cannot record snapshot: {e}"))?;

    Ok(ReminderReport {
        sprint_index: active.index,
        outstanding: count,
        sent: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardDocument, DEFAULT_BOARD_ID};
    use crate::sprint::build_sprint_schedule;
    use chrono::NaiveDate;
    use std::cell::RefCell;

    struct RecordingTransport {
        sent: RefCell<Vec<OutgoingMail>>,
    }

    impl RecordingTransport {
        fn new() -> Self {
            RecordingTransport {
                sent: RefCell::new(Vec::new()),
            }
        }
    }

    impl MailTransport for RecordingTransport {
        fn send(&self, mail: &OutgoingMail) -> Result<(), String> {
            self.sent.borrow_mut().push(mail.clone());
            Ok(())
        }
    }

    fn noon(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn temp_store() -> BoardStore {
        let dir = std::env::temp_dir()
            .join("sprintboard-test")
            .join(uuid::Uuid::new_v4().to_string());
        BoardStore::new(dir, DEFAULT_BOARD_ID)
    }

    fn sprint_task(title: &str, column: Column, week: u32) -> Task {
        let mut t = Task::new(title.into(), TaskType::Sprint);
        t.column = column;
        t.sprint_index = Some(f64::from(week));
        t
    }

    #[test]
    fn outstanding_filter_keeps_open_sprint_tasks_in_active_window() {
        let now = noon(2024, 3, 6);
        let schedule = build_sprint_schedule(now, 4);
        let active = active_sprint(&schedule, now);
        assert_eq!(active.index, 1);

        let mut micro = Task::new("micro chore".into(), TaskType::Micro);
        micro.sprint_index = Some(1.0);
        let tasks = vec![
            sprint_task("open this week", Column::Todo, 1),
            sprint_task("in progress this week", Column::InProgress, 1),
            sprint_task("already done", Column::Done, 1),
            sprint_task("next week", Column::Todo, 2),
            micro,
        ];

        let outstanding = outstanding_sprint_tasks(&tasks, &active);
        let titles: Vec<&str> = outstanding.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["open this week", "in progress this week"]);
    }

    #[test]
    fn digest_lists_window_and_tasks() {
        let now = noon(2024, 3, 6);
        let schedule = build_sprint_schedule(now, 4);
        let active = active_sprint(&schedule, now);
        let tasks = vec![sprint_task("Fix the parser", Column::InProgress, 1)];

        // Give the task its reconciled dates so the label is meaningful.
        let reconciled = crate::sprint::ensure_sprint_dates(&tasks, &schedule).tasks;
        let refs: Vec<&Task> = reconciled.iter().collect();
        let digest = compose_digest(&active, &refs, now);

        assert!(digest.subject.contains("Sprint 1"));
        assert!(digest.subject.contains("1 outstanding task"));
        assert!(digest.body.contains("2024-03-04 to 2024-03-10"));
        assert!(digest.body.contains("- Fix the parser [In Progress]"));
        assert!(digest.body.contains("d left"));
    }

    #[test]
    fn job_with_nothing_outstanding_records_snapshot_without_sending() {
        let store = temp_store();
        let mut doc = BoardDocument::default();
        doc.tasks.push(sprint_task("done already", Column::Done, 1));
        store.save_board(&doc).unwrap();

        let transport = RecordingTransport::new();
        let report =
            run_reminder_job(&store, Some("me@example.com".into()), &transport, noon(2024, 3, 6))
                .unwrap();

        assert_eq!(report.outstanding, 0);
        assert!(!report.sent);
        assert!(transport.sent.borrow().is_empty());

        let reminder = store.load_reminder();
        let snapshot = reminder.snapshot.unwrap();
        assert_eq!(snapshot.outstanding_count, 0);
        assert_eq!(snapshot.sprint_index, 1);
        assert_eq!(reminder.last_notified_at, None);
        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn job_sends_digest_and_records_populated_snapshot() {
        let store = temp_store();
        let mut doc = BoardDocument::default();
        doc.tasks.push(sprint_task("ship it", Column::Todo, 1));
        store.save_board(&doc).unwrap();

        let now = noon(2024, 3, 6);
        let transport = RecordingTransport::new();
        let report =
            run_reminder_job(&store, Some("me@example.com".into()), &transport, now).unwrap();

        assert_eq!(report.outstanding, 1);
        assert!(report.sent);
        let sent = transport.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "me@example.com");
        assert!(sent[0].body.contains("ship it"));

        let reminder = store.load_reminder();
        assert_eq!(reminder.email.as_deref(), Some("me@example.com"));
        assert_eq!(reminder.last_notified_at, Some(epoch_millis(now)));
        assert_eq!(reminder.snapshot.unwrap().outstanding_count, 1);
        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn job_without_recipient_is_a_configuration_error() {
        let store = temp_store();
        let mut doc = BoardDocument::default();
        doc.tasks.push(sprint_task("ship it", Column::Todo, 1));
        store.save_board(&doc).unwrap();

        let transport = RecordingTransport::new();
        let err = run_reminder_job(&store, None, &transport, noon(2024, 3, 6)).unwrap_err();
        assert!(err.contains("no reminder recipient"));
        assert!(transport.sent.borrow().is_empty());
        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn job_reuses_address_stored_in_reminder_document() {
        let store = temp_store();
        let mut doc = BoardDocument::default();
        doc.tasks.push(sprint_task("ship it", Column::Todo, 1));
        store.save_board(&doc).unwrap();
        let mut reminder = store.load_reminder();
        reminder.email = Some("stored@example.com".into());
        store.save_reminder(&reminder).unwrap();

        let transport = RecordingTransport::new();
        let report = run_reminder_job(&store, None, &transport, noon(2024, 3, 6)).unwrap();
        assert!(report.sent);
        assert_eq!(transport.sent.borrow()[0].to, "stored@example.com");
        let _ = fs::remove_dir_all(store.dir());
    }
}
