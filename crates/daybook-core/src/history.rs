use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::task::Task;

/// Date-key to that day's task list. Keys are canonical `YYYY-MM-DD`, so the
/// map iterates in calendar order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    buckets: BTreeMap<String, Vec<Task>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_buckets(buckets: BTreeMap<String, Vec<Task>>) -> Self {
        Self { buckets }
    }

    pub fn bucket(&self, key: &str) -> &[Task] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn ensure_bucket(&mut self, key: &str) -> &mut Vec<Task> {
        if !self.buckets.contains_key(key) {
            trace!(date = key, "creating empty bucket");
        }
        self.buckets.entry(key.to_string()).or_default()
    }

    pub fn contains_date(&self, key: &str) -> bool {
        self.buckets.contains_key(key)
    }

    pub fn dates(&self) -> impl Iterator<Item = &String> {
        self.buckets.keys()
    }

    pub fn first_date(&self) -> Option<&str> {
        self.buckets.keys().next().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Task>)> {
        self.buckets.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn find_task(&self, key: &str, id: u64) -> Option<&Task> {
        self.bucket(key).iter().find(|task| task.id == id)
    }

    pub fn find_task_mut(&mut self, key: &str, id: u64) -> Option<&mut Task> {
        self.buckets
            .get_mut(key)?
            .iter_mut()
            .find(|task| task.id == id)
    }

    /// Appends after the existing tasks of `key`.
    pub fn insert_task(&mut self, key: &str, task: Task) {
        self.ensure_bucket(key).push(task);
    }

    pub fn remove_task(&mut self, key: &str, id: u64) -> Option<Task> {
        let bucket = self.buckets.get_mut(key)?;
        let idx = bucket.iter().position(|task| task.id == id)?;
        Some(bucket.remove(idx))
    }

    pub fn marked_dates(&self) -> BTreeSet<String> {
        self.buckets
            .iter()
            .filter(|(_, tasks)| !tasks.is_empty())
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn total_tasks(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn has_any_tasks(&self) -> bool {
        self.buckets.values().any(|tasks| !tasks.is_empty())
    }

    pub fn max_id(&self) -> Option<u64> {
        self.buckets.values().flatten().map(|task| task.id).max()
    }
}

#[cfg(test)]
mod tests {
    use super::History;
    use crate::task::Task;

    fn task(id: u64, text: &str) -> Task {
        Task::new_todo(id, text.to_string(), None)
    }

    #[test]
    fn insert_appends_and_remove_keeps_order() {
        let mut history = History::new();
        history.insert_task("2024-01-02", task(1, "a"));
        history.insert_task("2024-01-02", task(2, "b"));
        history.insert_task("2024-01-02", task(3, "c"));

        let removed = history.remove_task("2024-01-02", 2).expect("removed");
        assert_eq!(removed.text, "b");

        let ids: Vec<u64> = history.bucket("2024-01-02").iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(history.remove_task("2024-01-02", 99).is_none());
        assert!(history.remove_task("2030-01-01", 1).is_none());
    }

    #[test]
    fn marked_dates_skip_empty_buckets() {
        let mut history = History::new();
        history.ensure_bucket("2024-01-05");
        history.insert_task("2024-01-03", task(1, "a"));
        history.insert_task("2024-01-01", task(2, "b"));

        let marked: Vec<String> = history.marked_dates().into_iter().collect();
        assert_eq!(marked, vec!["2024-01-01", "2024-01-03"]);
        assert_eq!(history.first_date(), Some("2024-01-01"));
        assert_eq!(history.total_tasks(), 2);
        assert_eq!(history.max_id(), Some(2));
    }

    #[test]
    fn empty_buckets_do_not_count_as_tasks() {
        let mut history = History::new();
        history.ensure_bucket("2024-01-05");
        assert!(!history.is_empty());
        assert!(!history.has_any_tasks());
        assert!(history.bucket("2024-02-01").is_empty());
    }
}
