//! Enumerations and field types for the task board.
//!
//! This module defines the closed vocabularies used across the board:
//! kanban columns, task categories and deadline status values.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Kanban column a task sits in. The order here is the board order.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    #[default]
    #[serde(alias = "Todo")]
    Todo,
    #[serde(alias = "in-progress")]
    #[value(name = "inprogress", alias = "in-progress")]
    InProgress,
    #[serde(alias = "Done")]
    Done,
}

impl Column {
    /// All columns in board order.
    pub fn all() -> [Column; 3] {
        [Column::Todo, Column::InProgress, Column::Done]
    }

    /// The column to the left on the board, if any.
    pub fn prev(self) -> Option<Column> {
        match self {
            Column::Todo => None,
            Column::InProgress => Some(Column::Todo),
            Column::Done => Some(Column::InProgress),
        }
    }

    /// The column to the right on the board, if any.
    pub fn next(self) -> Option<Column> {
        match self {
            Column::Todo => Some(Column::InProgress),
            Column::InProgress => Some(Column::Done),
            Column::Done => None,
        }
    }
}

/// Task category. Only affects presentation and reminder filtering:
/// sprint tasks are the ones collected into the outstanding-work digest.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    /// Long-running phase-level work.
    Phase,
    /// Small one-off item outside the sprint cadence.
    Micro,
    /// Sprint-scoped work, scheduled against the weekly windows.
    #[default]
    Sprint,
}

/// Classification of a task's deadline relative to a reference instant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeadlineStatus {
    /// No due date assigned.
    None,
    /// The due date has not passed yet.
    OnTrack,
    /// Past due, but still inside the overflow grace week.
    Overflow,
    /// Past due and past the overflow window (or no overflow window).
    Late,
}

/// Format a column for display.
pub fn format_column(c: Column) -> &'static str {
    match c {
        Column::Todo => "To Do",
        Column::InProgress => "In Progress",
        Column::Done => "Done",
    }
}

/// Format a task type for display.
pub fn format_task_type(t: TaskType) -> &'static str {
    match t {
        TaskType::Phase => "Phase",
        TaskType::Micro => "Micro",
        TaskType::Sprint => "Sprint",
    }
}

/// Format a deadline status for display.
pub fn format_deadline_status(s: DeadlineStatus) -> &'static str {
    match s {
        DeadlineStatus::None => "-",
        DeadlineStatus::OnTrack => "On track",
        DeadlineStatus::Overflow => "Overflow",
        DeadlineStatus::Late => "Late",
    }
}
