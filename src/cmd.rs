//! Command implementations for the CLI interface.
//!
//! This module contains the command handlers for everything the binary can
//! do, from basic card operations to the scheduled reminder job and the
//! kanban board TUI.

use clap::{CommandFactory, Subcommand};
use clap_complete::{generate, Shell};

use std::collections::BTreeSet;

use chrono::Local;

use crate::board::{from_epoch_millis, BoardSession, BoardStore};
use crate::cli::Cli;
use crate::fields::*;
use crate::remind::{run_reminder_job, compose_digest, outstanding_sprint_tasks, OutboxTransport};
use crate::sprint::{
    active_sprint, build_sprint_schedule, describe_task_deadline, ensure_sprint_dates,
    resolve_task_sprint_index, DEFAULT_SPRINT_COUNT,
};
use crate::task::{Subtask, Task};
use crate::tui::run::run_board_tui;

#[derive(Subcommand)]
pub enum Commands {
    /// Launch the interactive kanban board.
    Board,

    /// Add a new task.
    Add {
        /// Short title for the task.
        title: String,
        /// Optional longer description.
        #[arg(long)]
        desc: Option<String>,
        /// Task type: phase | micro | sprint.
        #[arg(long = "type", value_enum, default_value_t = TaskType::Sprint)]
        task_type: TaskType,
        /// Comma-separated tags. May be repeated.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Sprint index to schedule the task into (1 = current week).
        #[arg(long)]
        sprint: Option<u32>,
        /// Starting column: todo | inprogress | done.
        #[arg(long, value_enum, default_value_t = Column::Todo)]
        column: Column,
    },

    /// List tasks with optional filters.
    List {
        /// Include tasks in the done column.
        #[arg(long)]
        all: bool,
        /// Filter by column.
        #[arg(long, value_enum)]
        column: Option<Column>,
        /// Filter by task type.
        #[arg(long = "type", value_enum)]
        task_type: Option<TaskType>,
        /// Filter by resolved sprint index.
        #[arg(long)]
        sprint: Option<u32>,
        /// Filter by tag. May be repeated. Accepts comma-separated.
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// View a single task by id, id prefix or title.
    View {
        /// Task id, unique id prefix, or exact title.
        id: String,
    },

    /// Move a task to another column.
    Move {
        /// Task id, unique id prefix, or exact title.
        id: String,
        /// Target column.
        #[arg(value_enum)]
        column: Column,
    },

    /// Shortcut: move a task to the done column.
    Done {
        /// Task id, unique id prefix, or exact title.
        id: String,
    },

    /// Delete a task.
    Delete {
        /// Task id, unique id prefix, or exact title.
        id: String,
    },

    /// Manage subtasks on a task.
    Subtask {
        #[command(subcommand)]
        action: SubtaskAction,
    },

    /// Print the rolling sprint schedule.
    Schedule {
        /// Number of sprint windows to show.
        #[arg(long, default_value_t = DEFAULT_SPRINT_COUNT)]
        sprints: u32,
    },

    /// Reconcile the board against the current schedule and report.
    Reconcile,

    /// Run the reminder job: mail a digest of outstanding sprint tasks.
    Remind {
        /// Recipient address. Falls back to SPRINTBOARD_EMAIL, then to the
        /// address stored in the reminder document.
        #[arg(long)]
        to: Option<String>,
        /// Print the digest instead of sending or recording anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the last reminder snapshot.
    Snapshot,

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SubtaskAction {
    /// Add a subtask to a task.
    Add {
        /// Parent task id, unique id prefix, or exact title.
        id: String,
        /// Subtask title.
        title: String,
    },
    /// Toggle a subtask done/undone by its 1-based position.
    Toggle {
        /// Parent task id, unique id prefix, or exact title.
        id: String,
        /// Position of the subtask in the checklist (1-based).
        position: usize,
    },
}

/// Normalize a tag string by trimming, lowercasing, and replacing spaces
/// with hyphens.
pub fn normalise_tag(s: &str) -> String {
    s.trim().to_lowercase().replace(' ', "-")
}

/// Split comma-separated tag strings and normalize each tag.
pub fn split_and_normalise_tags(inputs: &[String]) -> Vec<String> {
    let mut tags = Vec::new();
    for raw in inputs {
        for part in raw.split(',') {
            let tag = normalise_tag(part);
            if !tag.is_empty() {
                tags.push(tag);
            }
        }
    }
    tags.sort();
    tags.dedup();
    tags
}

/// Launch the kanban board TUI.
pub fn cmd_board(store: BoardStore) {
    if let Err(e) = run_board_tui(store) {
        eprintln!("Board UI error: {e}");
        std::process::exit(1);
    }
}

/// Add a new task to the board.
pub fn cmd_add(
    session: &mut BoardSession,
    title: String,
    desc: Option<String>,
    task_type: TaskType,
    tags: Vec<String>,
    sprint: Option<u32>,
    column: Column,
) {
    let mut task = Task::new(title, task_type);
    task.desc = desc.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
    task.tags = split_and_normalise_tags(&tags);
    task.sprint_index = sprint.map(f64::from);
    task.column = column;
    let id = task.id.clone();

    session.board.tasks.push(task);
    if let Err(e) = session.commit() {
        eprintln!("Failed to save board: {e}");
        std::process::exit(1);
    }
    println!("Added task {}", short_id(&id));
}

/// List tasks with optional filtering.
pub fn cmd_list(
    session: &BoardSession,
    all: bool,
    column: Option<Column>,
    task_type: Option<TaskType>,
    sprint: Option<u32>,
    tags: Vec<String>,
) {
    let tags = split_and_normalise_tags(&tags);
    let now = Local::now().naive_local();

    let mut filtered: Vec<&Task> = session
        .board
        .tasks
        .iter()
        .filter(|t| {
            if !all && t.column == Column::Done {
                return false;
            }
            if let Some(c) = column {
                if t.column != c {
                    return false;
                }
            }
            if let Some(ty) = task_type {
                if t.task_type != ty {
                    return false;
                }
            }
            if let Some(s) = sprint {
                if resolve_task_sprint_index(t) != s {
                    return false;
                }
            }
            if !tags.is_empty() {
                let tagset: BTreeSet<_> = t.tags.iter().cloned().collect();
                for tg in &tags {
                    if !tagset.contains(tg) {
                        return false;
                    }
                }
            }
            true
        })
        .collect();

    filtered.sort_by(|a, b| {
        resolve_task_sprint_index(a)
            .cmp(&resolve_task_sprint_index(b))
            .then_with(|| a.due_date.cmp(&b.due_date))
            .then_with(|| a.title.cmp(&b.title))
    });

    // Header.
    println!(
        "{:<10} {:<7} {:<12} {:<7} {:<28} {}",
        "ID", "Sprint", "Column", "Type", "Deadline", "Title [tags]"
    );
    for t in filtered {
        let deadline = describe_task_deadline(t.due_date, t.overflow_date, now);
        let tags = if t.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", t.tags.join(","))
        };
        println!(
            "{:<10} {:<7} {:<12} {:<7} {:<28} {}{}",
            short_id(&t.id),
            resolve_task_sprint_index(t),
            format_column(t.column),
            format_task_type(t.task_type),
            deadline.label,
            t.title,
            tags
        );
    }
}

/// View detailed information about a single task.
pub fn cmd_view(session: &BoardSession, id: String) {
    let task = &session.board.tasks[resolve_or_exit(session, &id)];
    let now = Local::now().naive_local();
    let deadline = describe_task_deadline(task.due_date, task.overflow_date, now);

    println!("ID:        {}", task.id);
    println!("Title:     {}", task.title);
    println!("Type:      {}", format_task_type(task.task_type));
    println!("Column:    {}", format_column(task.column));
    println!("Sprint:    {}", resolve_task_sprint_index(task));
    println!(
        "Due:       {}",
        task.due_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into())
    );
    println!(
        "Overflow:  {}",
        task.overflow_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into())
    );
    println!(
        "Deadline:  {} ({})",
        deadline.label,
        format_deadline_status(deadline.status)
    );
    println!(
        "Tags:      {}",
        if task.tags.is_empty() { "-".into() } else { task.tags.join(",") }
    );
    println!("Description:\n{}\n", task.desc.as_deref().unwrap_or("-"));

    println!("Subtasks:");
    if task.subtasks().is_empty() {
        println!("  -");
    } else {
        for (i, st) in task.subtasks().iter().enumerate() {
            println!("  {}. [{}] {}", i + 1, if st.done { "x" } else { " " }, st.title);
        }
    }
}

/// Move a task to another column.
pub fn cmd_move(session: &mut BoardSession, id: String, column: Column) {
    let i = resolve_or_exit(session, &id);
    session.board.tasks[i].column = column;
    let title = session.board.tasks[i].title.clone();
    if let Err(e) = session.commit() {
        eprintln!("Failed to save board: {e}");
        std::process::exit(1);
    }
    println!("Moved '{}' to {}", title, format_column(column));
}

/// Delete a task from the board.
pub fn cmd_delete(session: &mut BoardSession, id: String) {
    let i = resolve_or_exit(session, &id);
    let task = session.board.tasks.remove(i);
    if let Err(e) = session.commit() {
        eprintln!("Failed to save board: {e}");
        std::process::exit(1);
    }
    println!("Deleted '{}' ({})", task.title, short_id(&task.id));
}

/// Add or toggle subtasks on a task.
pub fn cmd_subtask(session: &mut BoardSession, action: SubtaskAction) {
    match action {
        SubtaskAction::Add { id, title } => {
            let i = resolve_or_exit(session, &id);
            let subtasks = session.board.tasks[i].subtasks.get_or_insert_with(Vec::new);
            subtasks.push(Subtask::new(title.clone()));
            if let Err(e) = session.commit() {
                eprintln!("Failed to save board: {e}");
                std::process::exit(1);
            }
            println!("Added subtask '{}'", title);
        }
        SubtaskAction::Toggle { id, position } => {
            let i = resolve_or_exit(session, &id);
            let subtasks = session.board.tasks[i].subtasks.get_or_insert_with(Vec::new);
            let Some(st) = position.checked_sub(1).and_then(|p| subtasks.get_mut(p)) else {
                eprintln!(
                    "No subtask at position {} (task has {})",
                    position,
                    subtasks.len()
                );
                std::process::exit(1);
            };
            st.done = !st.done;
            let label = format!("{} {}", if st.done { "Completed" } else { "Reopened" }, st.title);
            if let Err(e) = session.commit() {
                eprintln!("Failed to save board: {e}");
                std::process::exit(1);
            }
            println!("{label}");
        }
    }
}

/// Print the rolling sprint schedule with the active window marked.
pub fn cmd_schedule(sprints: u32) {
    let now = Local::now().naive_local();
    let schedule = build_sprint_schedule(now, sprints);
    let active = active_sprint(&schedule, now);

    for w in &schedule {
        let marker = if w.index == active.index { "  <- active" } else { "" };
        println!(
            "Sprint {}  {} to {}  overflow until {}{}",
            w.index,
            w.start.format("%Y-%m-%d"),
            w.end.format("%Y-%m-%d"),
            w.overflow_end.format("%Y-%m-%d"),
            marker
        );
    }
}

/// Reconcile the board against the current schedule.
pub fn cmd_reconcile(store: BoardStore) {
    match BoardSession::open(store) {
        Ok(session) => {
            if session.rewrote {
                println!("Schedule-derived fields were stale; board rewritten.");
            } else {
                println!("Board already consistent with the current schedule.");
            }
        }
        Err(e) => {
            eprintln!("Failed to open board: {e}");
            std::process::exit(1);
        }
    }
}

/// Run the reminder job (or preview the digest with --dry-run).
pub fn cmd_remind(store: BoardStore, to: Option<String>, dry_run: bool) {
    let now = Local::now().naive_local();
    let recipient = to.or_else(|| std::env::var("SPRINTBOARD_EMAIL").ok());

    if dry_run {
        // Preview only: reconcile in memory, no writes, no sends.
        let board = store.load_board();
        let schedule = build_sprint_schedule(now, DEFAULT_SPRINT_COUNT);
        let tasks = ensure_sprint_dates(&board.tasks, &schedule).tasks;
        let active = active_sprint(&schedule, now);
        let outstanding = outstanding_sprint_tasks(&tasks, &active);
        if outstanding.is_empty() {
            println!("Nothing outstanding in sprint {}.", active.index);
            return;
        }
        let digest = compose_digest(&active, &outstanding, now);
        println!("Subject: {}\n\n{}", digest.subject, digest.body);
        return;
    }

    let outbox = std::env::var("SPRINTBOARD_OUTBOX")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| store.dir().join("outbox"));
    let transport = OutboxTransport::new(outbox);

    match run_reminder_job(&store, recipient, &transport, now) {
        Ok(report) if report.sent => {
            println!(
                "Reminder sent: {} outstanding task(s) in sprint {}.",
                report.outstanding, report.sprint_index
            );
        }
        Ok(report) => {
            println!(
                "Nothing outstanding in sprint {}; snapshot recorded, no mail sent.",
                report.sprint_index
            );
        }
        Err(e) => {
            eprintln!("Reminder job failed: {e}");
            std::process::exit(1);
        }
    }
}

/// Show the last recorded reminder snapshot.
pub fn cmd_snapshot(store: BoardStore) {
    let reminder = store.load_reminder();
    let Some(snapshot) = reminder.snapshot else {
        println!("No reminder snapshot recorded yet.");
        return;
    };

    let generated = from_epoch_millis(snapshot.generated_at)
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".into());
    println!("Generated:   {generated}");
    println!(
        "Sprint {}:    {} to {} (overflow until {})",
        snapshot.sprint_index,
        snapshot.sprint_start.format("%Y-%m-%d"),
        snapshot.sprint_end.format("%Y-%m-%d"),
        snapshot.overflow_end.format("%Y-%m-%d")
    );
    println!("Outstanding: {}", snapshot.outstanding_count);
    for t in &snapshot.outstanding_tasks {
        println!(
            "  - {} [{}] due {}",
            t.title,
            format_column(t.column),
            t.due_date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_else(|| "-".into())
        );
    }
    if let Some(at) = reminder.last_notified_at.and_then(from_epoch_millis) {
        println!(
            "Last notified: {} ({})",
            at,
            reminder.email.as_deref().unwrap_or("-")
        );
    }
}

/// Generate shell completion scripts on stdout.
pub fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
}

fn short_id(id: &str) -> &str {
    &id[..8.min(id.len())]
}

fn resolve_or_exit(session: &BoardSession, key: &str) -> usize {
    match session.find_task(key) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("Error resolving task: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_split_and_normalised() {
        let tags = split_and_normalise_tags(&["Backend, URGENT".into(), "tag week3".into()]);
        assert_eq!(tags, vec!["backend", "tag-week3", "urgent"]);
    }
}
