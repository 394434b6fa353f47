use std::collections::HashMap;

use crate::types::TaskKey;

use super::Task;

/// Tasks of one pool, keyed by their stable key
#[derive(Debug, Default)]
pub struct TaskTable {
    tasks: HashMap<TaskKey, Task>,
}

impl TaskTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a task
    pub fn insert(&mut self, task: Task) -> Option<Task> {
        self.tasks.insert(task.key, task)
    }

    /// Look up a task
    pub fn get(&self, key: TaskKey) -> Option<&Task> {
        self.tasks.get(&key)
    }

    /// Look up a task for modification
    pub fn get_mut(&mut self, key: TaskKey) -> Option<&mut Task> {
        self.tasks.get_mut(&key)
    }

    /// Drop a task
    pub fn remove(&mut self, key: TaskKey) -> Option<Task> {
        self.tasks.remove(&key)
    }

    /// Number of tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// All tasks, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Keys of the tasks the engine is currently holding
    pub fn tracked(&self) -> Vec<TaskKey> {
        let mut keys: Vec<_> = self
            .tasks
            .values()
            .filter(|task| task.status.is_tracked())
            .map(|task| task.key)
            .collect();
        keys.sort();
        keys
    }
}
