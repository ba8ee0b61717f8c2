//! In-memory task directory.
//!
//! Loaded from the TaskManager listing and kept current by the task
//! lifecycle commands. Every full load announces `DataLoaded` so that
//! reminders buffered for unknown tasks can be retried.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::models::Task;
use crate::domain::ports::{DirectoryEvent, TaskDirectory};

const EVENT_CAPACITY: usize = 16;

pub struct InMemoryTaskDirectory {
    tasks: RwLock<HashMap<String, Task>>,
    events: broadcast::Sender<DirectoryEvent>,
}

impl InMemoryTaskDirectory {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            tasks: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Replace the directory contents and announce `DataLoaded`
    pub fn load(&self, tasks: impl IntoIterator<Item = Task>) {
        let count = {
            let mut guard = self.write_guard();
            guard.clear();
            guard.extend(tasks.into_iter().map(|t| (t.id.clone(), t)));
            guard.len()
        };
        debug!(count, "task directory loaded");
        let _ = self.events.send(DirectoryEvent::DataLoaded);
    }

    /// Insert or replace a single task (no event)
    pub fn upsert(&self, task: Task) {
        self.write_guard().insert(task.id.clone(), task);
    }

    pub fn remove(&self, task_id: &str) -> Option<Task> {
        self.write_guard().remove(task_id)
    }

    pub fn len(&self) -> usize {
        self.read_guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_guard().is_empty()
    }

    /// All tasks, sorted by id for stable output
    pub fn tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.read_guard().values().cloned().collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        tasks
    }

    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Task>> {
        self.tasks.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Task>> {
        self.tasks.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for InMemoryTaskDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskDirectory for InMemoryTaskDirectory {
    fn resolve(&self, task_id: &str) -> Option<Task> {
        self.read_guard().get(task_id).cloned()
    }

    fn subscribe(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.events.subscribe()
    }
}
