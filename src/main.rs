//! # Sprintboard - sprint-scheduled kanban task board
//!
//! A personal task board that organizes cards into a rolling weekly sprint
//! schedule with due/overflow deadlines, and periodically emails a digest
//! of unfinished sprint work.
//!
//! ## Key Features
//!
//! - **Kanban board**: three fixed columns (to do, in progress, done) with
//!   an interactive TUI and a full CLI for automation
//! - **Sprint scheduling**: tasks are assigned to Monday-anchored weekly
//!   windows; due and overflow dates are derived, never hand-edited
//! - **Deadline tracking**: every card carries an on-track / overflow /
//!   late classification relative to the current instant
//! - **Reminder digests**: a non-interactive job collects outstanding
//!   sprint tasks and writes a plaintext email to a pluggable transport
//! - **Single shared board**: one JSON document per board, written whole,
//!   last write wins; safe to sync the store directory between machines
//!
//! ## Quick Start
//!
//! ```bash
//! # Launch the kanban board
//! sprintboard board
//!
//! # Add a task into the current sprint
//! sprintboard add "Implement user authentication" --tag backend
//!
//! # See the rolling schedule
//! sprintboard schedule
//!
//! # Mail the outstanding-work digest (cron-friendly)
//! sprintboard remind --to me@example.com
//! ```
//!
//! Data is stored locally in `~/.sprintboard/`, one JSON document per
//! board (default board id `shared-board`). Configuration is read from
//! the environment (or a `.env` file): `SPRINTBOARD_DIR`,
//! `SPRINTBOARD_BOARD`, `SPRINTBOARD_EMAIL`, `SPRINTBOARD_OUTBOX`.

use std::path::PathBuf;

use clap::Parser;

pub mod board;
pub mod cli;
pub mod cmd;
pub mod fields;
pub mod remind;
pub mod sprint;
pub mod task;
pub mod tui {
    pub mod board;
    pub mod colors;
    pub mod input;
    pub mod run;
}

use board::{BoardSession, BoardStore, DEFAULT_BOARD_ID};
use cli::Cli;
use cmd::*;

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Determine the store directory.
    let dir = cli
        .dir
        .or_else(|| std::env::var("SPRINTBOARD_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".sprintboard")
        });
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("Failed to create store directory {}: {}", dir.display(), e);
        std::process::exit(1);
    }

    let board_id = cli
        .board
        .or_else(|| std::env::var("SPRINTBOARD_BOARD").ok())
        .unwrap_or_else(|| DEFAULT_BOARD_ID.to_string());
    let store = BoardStore::new(dir, &board_id);

    match cli.command {
        // Commands that manage the store directly.
        Commands::Board => cmd_board(store),
        Commands::Schedule { sprints } => cmd_schedule(sprints),
        Commands::Reconcile => cmd_reconcile(store),
        Commands::Remind { to, dry_run } => cmd_remind(store, to, dry_run),
        Commands::Snapshot => cmd_snapshot(store),
        Commands::Completions { shell } => cmd_completions(shell),

        // Everything else works on a live, reconciled session.
        Commands::Add {
            title,
            desc,
            task_type,
            tags,
            sprint,
            column,
        } => cmd_add(&mut open_session(store), title, desc, task_type, tags, sprint, column),

        Commands::List {
            all,
            column,
            task_type,
            sprint,
            tags,
        } => cmd_list(&open_session(store), all, column, task_type, sprint, tags),

        Commands::View { id } => cmd_view(&open_session(store), id),

        Commands::Move { id, column } => cmd_move(&mut open_session(store), id, column),

        Commands::Done { id } => cmd_move(&mut open_session(store), id, fields::Column::Done),

        Commands::Delete { id } => cmd_delete(&mut open_session(store), id),

        Commands::Subtask { action } => cmd_subtask(&mut open_session(store), action),
    }
}

fn open_session(store: BoardStore) -> BoardSession {
    match BoardSession::open(store) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open board: {e}");
            std::process::exit(1);
        }
    }
}
