//! Board document persistence and the live board session.
//!
//! A store directory holds one JSON document per board (`<board>.json`)
//! plus a reminder side document (`<board>_reminder.json`) and a persistent
//! anonymous device identity. Writes are full-document overwrites, last
//! write wins. The session funnels every load and mutation through the
//! schedule reconciler so persisted dates always match the current
//! schedule before anything trusts them.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fields::Column;
use crate::sprint::{
    build_sprint_schedule, ensure_sprint_dates, SprintWindow, DEFAULT_SPRINT_COUNT,
};
use crate::task::Task;

/// Board used when none is named on the command line or environment.
pub const DEFAULT_BOARD_ID: &str = "shared-board";

/// The persisted board: the single collection of tasks plus write metadata.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardDocument {
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Epoch milliseconds (local clock) of the last write.
    #[serde(default)]
    pub updated_at: i64,
    /// Device identity of the last writer.
    #[serde(default)]
    pub updated_by: String,
}

/// Side document recording reminder configuration and the last digest run.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderDocument {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub last_notified_at: Option<i64>,
    #[serde(default)]
    pub snapshot: Option<ReminderSnapshot>,
}

/// What the reminder job saw on its last run, kept for inspection and for
/// the board UI's "last reminder" display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSnapshot {
    pub generated_at: i64,
    pub sprint_index: u32,
    pub sprint_start: NaiveDateTime,
    pub sprint_end: NaiveDateTime,
    pub overflow_end: NaiveDateTime,
    pub outstanding_count: usize,
    pub outstanding_tasks: Vec<OutstandingTask>,
}

/// Per-task line item inside a reminder snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutstandingTask {
    pub id: String,
    pub title: String,
    pub column: Column,
    pub due_date: Option<NaiveDateTime>,
    pub overflow_date: Option<NaiveDateTime>,
}

/// Epoch milliseconds for a local-clock instant.
pub fn epoch_millis(at: NaiveDateTime) -> i64 {
    at.and_utc().timestamp_millis()
}

/// Inverse of [`epoch_millis`], for displaying persisted stamps.
pub fn from_epoch_millis(ms: i64) -> Option<NaiveDateTime> {
    chrono::DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

/// File-backed store for one board's documents.
#[derive(Debug, Clone)]
pub struct BoardStore {
    dir: PathBuf,
    board_id: String,
}

impl BoardStore {
    pub fn new(dir: PathBuf, board_id: &str) -> Self {
        BoardStore {
            dir,
            board_id: board_id.to_string(),
        }
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn board_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.board_id))
    }

    pub fn reminder_path(&self) -> PathBuf {
        self.dir.join(format!("{}_reminder.json", self.board_id))
    }

    /// Load the board document, defaulting to an empty board when the file
    /// is missing or unreadable.
    pub fn load_board(&self) -> BoardDocument {
        load_json(&self.board_path(), "board")
    }

    /// Save the board document using atomic write (temp file + rename).
    pub fn save_board(&self, doc: &BoardDocument) -> io::Result<()> {
        save_json(&self.board_path(), doc)
    }

    pub fn load_reminder(&self) -> ReminderDocument {
        load_json(&self.reminder_path(), "reminder")
    }

    pub fn save_reminder(&self, doc: &ReminderDocument) -> io::Result<()> {
        save_json(&self.reminder_path(), doc)
    }

    /// Anonymous per-device identity, created on first use and reused for
    /// every subsequent write from this store directory.
    pub fn device_id(&self) -> io::Result<String> {
        let path = self.dir.join("device");
        if path.exists() {
            let mut buf = String::new();
            File::open(&path)?.read_to_string(&mut buf)?;
            let id = buf.trim();
            if !id.is_empty() {
                return Ok(id.to_string());
            }
        }
        let id = Uuid::new_v4().to_string();
        fs::create_dir_all(&self.dir)?;
        fs::write(&path, &id)?;
        Ok(id)
    }
}

fn load_json<T: Default + DeserializeOwned>(path: &Path, what: &str) -> T {
    if !path.exists() {
        return T::default();
    }
    let mut buf = String::new();
    match File::open(path).and_then(|mut f| f.read_to_string(&mut buf)) {
        Ok(_) => match serde_json::from_str(&buf) {
            Ok(doc) => doc,
            Err(e) => {
                eprintln!("Error parsing {what} document, starting fresh: {e}");
                T::default()
            }
        },
        Err(e) => {
            eprintln!("Error reading {what} document, starting fresh: {e}");
            T::default()
        }
    }
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    let mut f = File::create(&tmp)?;
    let data = serde_json::to_string_pretty(value).unwrap();
    f.write_all(data.as_bytes())?;
    f.flush()?;
    fs::rename(tmp, path)?;
    Ok(())
}

/// A board loaded into memory with its schedule, reconciled and ready to
/// mutate. Every commit re-runs the reconciler before writing back, so a
/// session can never persist dates that disagree with the schedule.
pub struct BoardSession {
    store: BoardStore,
    pub board: BoardDocument,
    pub schedule: Vec<SprintWindow>,
    device_id: String,
    /// Whether opening the session had to rewrite stale persisted data.
    pub rewrote: bool,
}

impl BoardSession {
    /// Open the board anchored at the current local time.
    pub fn open(store: BoardStore) -> io::Result<Self> {
        Self::open_at(store, Local::now().naive_local())
    }

    /// Open the board anchored at an explicit reference instant.
    ///
    /// Loads the document, reconciles it against a fresh rolling schedule,
    /// and writes back once if anything was stale. Re-opening an already
    /// consistent board performs no write.
    pub fn open_at(store: BoardStore, now: NaiveDateTime) -> io::Result<Self> {
        let device_id = store.device_id()?;
        let schedule = build_sprint_schedule(now, DEFAULT_SPRINT_COUNT);
        let mut board = store.load_board();
        let outcome = ensure_sprint_dates(&board.tasks, &schedule);
        board.tasks = outcome.tasks;

        let mut session = BoardSession {
            store,
            board,
            schedule,
            device_id,
            rewrote: outcome.changed,
        };
        if session.rewrote {
            session.persist(now)?;
        }
        Ok(session)
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn store(&self) -> &BoardStore {
        &self.store
    }

    /// Reconcile and persist after a local mutation.
    pub fn commit(&mut self) -> io::Result<()> {
        let now = Local::now().naive_local();
        let outcome = ensure_sprint_dates(&self.board.tasks, &self.schedule);
        self.board.tasks = outcome.tasks;
        self.persist(now)
    }

    fn persist(&mut self, now: NaiveDateTime) -> io::Result<()> {
        self.board.updated_at = epoch_millis(now);
        self.board.updated_by = self.device_id.clone();
        self.store.save_board(&self.board)
    }

    /// Resolve a task by full id, unique id prefix, or exact title
    /// (case-insensitive). Returns the task's position in the collection.
    pub fn find_task(&self, key: &str) -> Result<usize, String> {
        if let Some(i) = self.board.tasks.iter().position(|t| t.id == key) {
            return Ok(i);
        }

        let prefix_matches: Vec<usize> = self
            .board
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.id.starts_with(key))
            .map(|(i, _)| i)
            .collect();
        if prefix_matches.len() == 1 {
            return Ok(prefix_matches[0]);
        }

        let key_lower = key.to_lowercase();
        let title_matches: Vec<usize> = self
            .board
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.title.to_lowercase() == key_lower)
            .map(|(i, _)| i)
            .collect();

        match (prefix_matches.len(), title_matches.len()) {
            (0, 0) => Err(format!("No task found matching '{key}'")),
            (0, 1) => Ok(title_matches[0]),
            _ => {
                let mut msg = format!("Multiple tasks match '{key}':\n");
                for &i in prefix_matches.iter().chain(&title_matches) {
                    let t = &self.board.tasks[i];
                    msg.push_str(&format!("  {}  {}\n", &t.id[..8.min(t.id.len())], t.title));
                }
                msg.push_str("Use a longer id prefix.");
                Err(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::TaskType;
    use chrono::NaiveDate;

    fn temp_store() -> BoardStore {
        let dir = std::env::temp_dir()
            .join("sprintboard-test")
            .join(Uuid::new_v4().to_string());
        BoardStore::new(dir, DEFAULT_BOARD_ID)
    }

    fn noon(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn missing_board_loads_as_default() {
        let store = temp_store();
        let board = store.load_board();
        assert!(board.tasks.is_empty());
        assert_eq!(board.updated_at, 0);
    }

    #[test]
    fn board_round_trips_through_store() {
        let store = temp_store();
        let mut doc = BoardDocument::default();
        doc.tasks.push(Task::new("write tests".into(), TaskType::Sprint));
        doc.updated_at = 123;
        doc.updated_by = "device-a".into();
        store.save_board(&doc).unwrap();

        let loaded = store.load_board();
        assert_eq!(loaded.tasks.len(), 1);
        assert_eq!(loaded.tasks[0].title, "write tests");
        assert_eq!(loaded.updated_at, 123);
        assert_eq!(loaded.updated_by, "device-a");
        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn device_id_is_stable() {
        let store = temp_store();
        let a = store.device_id().unwrap();
        let b = store.device_id().unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn open_reconciles_once_then_settles() {
        let store = temp_store();
        let mut doc = BoardDocument::default();
        let mut stale = Task::new("carried over".into(), TaskType::Sprint);
        stale.tags = vec!["tag-week2".into()];
        stale.sprint_index = None;
        stale.subtasks = None;
        doc.tasks.push(stale);
        store.save_board(&doc).unwrap();

        let now = noon(2024, 3, 6);
        let first = BoardSession::open_at(store.clone(), now).unwrap();
        assert!(first.rewrote);
        assert_eq!(first.board.tasks[0].sprint_index, Some(2.0));
        assert!(first.board.tasks[0].due_date.is_some());

        let second = BoardSession::open_at(store.clone(), now).unwrap();
        assert!(!second.rewrote);
        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn find_task_by_prefix_and_title() {
        let store = temp_store();
        let mut session = BoardSession::open_at(store.clone(), noon(2024, 3, 6)).unwrap();
        let task = Task::new("Ship release".into(), TaskType::Sprint);
        let id = task.id.clone();
        session.board.tasks.push(task);
        session.commit().unwrap();

        assert_eq!(session.find_task(&id).unwrap(), 0);
        assert_eq!(session.find_task(&id[..8]).unwrap(), 0);
        assert_eq!(session.find_task("ship release").unwrap(), 0);
        assert!(session.find_task("no-such-task").is_err());
        let _ = fs::remove_dir_all(store.dir());
    }
}
