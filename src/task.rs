//! Task data structure and the board-document wire shapes built from it.
//!
//! Field names serialize in camelCase because the board document format is
//! shared with other clients of the same store.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::fields::{Column, TaskType};

/// A single card on the board.
///
/// `due_date`, `overflow_date` and the normalized `subtasks` list are owned
/// by the schedule reconciler: they are derived from the task's sprint
/// assignment and overwritten on every reconciliation, never edited
/// directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(rename = "type", default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub column: Column,
    /// Authoritative sprint assignment when present. Kept as a float
    /// because documents written by older clients hold fractional values;
    /// the resolver floors and clamps it.
    #[serde(default)]
    pub sprint_index: Option<f64>,
    #[serde(default)]
    pub due_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub overflow_date: Option<NaiveDateTime>,
    /// Absent in documents written before subtasks existed; the reconciler
    /// normalizes it to a concrete (possibly empty) list.
    #[serde(default)]
    pub subtasks: Option<Vec<Subtask>>,
}

impl Task {
    /// Create a task with a fresh id and reconciler-owned fields unset.
    pub fn new(title: String, task_type: TaskType) -> Self {
        Task {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            desc: None,
            task_type,
            tags: Vec::new(),
            column: Column::Todo,
            sprint_index: None,
            due_date: None,
            overflow_date: None,
            subtasks: Some(Vec::new()),
        }
    }

    /// Subtasks as a slice, regardless of normalization state.
    pub fn subtasks(&self) -> &[Subtask] {
        self.subtasks.as_deref().unwrap_or(&[])
    }
}

/// A checklist entry inside a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

impl Subtask {
    pub fn new(title: String) -> Self {
        Subtask {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            done: false,
        }
    }
}
