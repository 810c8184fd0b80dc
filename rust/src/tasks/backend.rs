//! Document storage for tasks. Backends store what they are given; ownership
//! and encryption are the repository's job.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::model::Task;
use super::TaskError;
use crate::fsio::write_atomically;

pub trait TaskBackend {
    fn get(&self, id: &str) -> Result<Option<Task>, TaskError>;

    /// Inserts or replaces the task with the same id.
    fn put(&mut self, task: Task) -> Result<(), TaskError>;

    /// Returns whether a task was removed.
    fn delete(&mut self, id: &str) -> Result<bool, TaskError>;

    fn list(&self) -> Result<Vec<Task>, TaskError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryTaskBackend {
    tasks: BTreeMap<String, Task>,
}

impl MemoryTaskBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskBackend for MemoryTaskBackend {
    fn get(&self, id: &str) -> Result<Option<Task>, TaskError> {
        Ok(self.tasks.get(id).cloned())
    }

    fn put(&mut self, task: Task) -> Result<(), TaskError> {
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<bool, TaskError> {
        Ok(self.tasks.remove(id).is_some())
    }

    fn list(&self) -> Result<Vec<Task>, TaskError> {
        Ok(self.tasks.values().cloned().collect())
    }
}

/// All tasks in one JSON array file, rewritten on every change.
#[derive(Debug)]
pub struct JsonTaskBackend {
    path: PathBuf,
    tasks: Vec<Task>,
}

impl JsonTaskBackend {
    /// A missing file opens as an empty list.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TaskError> {
        let path = path.as_ref().to_path_buf();
        let tasks = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|e| TaskError::Backend(format!("{}: {e}", path.display())))?;
            serde_json::from_str(&raw).map_err(|e| TaskError::Backend(format!("{}: {e}", path.display())))?
        } else {
            Vec::new()
        };
        Ok(Self { path, tasks })
    }

    fn save(&self, tasks: &[Task]) -> Result<(), TaskError> {
        let bytes = serde_json::to_vec_pretty(tasks).map_err(|e| TaskError::Backend(format!("{e}")))?;
        write_atomically(&self.path, &bytes).map_err(|e| TaskError::Backend(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), tasks = tasks.len(), "saved task list");
        Ok(())
    }
}

impl TaskBackend for JsonTaskBackend {
    fn get(&self, id: &str) -> Result<Option<Task>, TaskError> {
        Ok(self.tasks.iter().find(|task| task.id == id).cloned())
    }

    fn put(&mut self, task: Task) -> Result<(), TaskError> {
        let mut next = self.tasks.clone();
        match next.iter_mut().find(|existing| existing.id == task.id) {
            Some(existing) => *existing = task,
            None => next.push(task),
        }
        self.save(&next)?;
        self.tasks = next;
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<bool, TaskError> {
        let mut next = self.tasks.clone();
        let before = next.len();
        next.retain(|task| task.id != id);
        if next.len() == before {
            return Ok(false);
        }
        self.save(&next)?;
        self.tasks = next;
        Ok(true)
    }

    fn list(&self) -> Result<Vec<Task>, TaskError> {
        Ok(self.tasks.clone())
    }
}
