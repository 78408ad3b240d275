use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::normalize::ListName;

pub type ListId = Uuid;
pub type TaskId = Uuid;

/// Tasks a brand-new list starts with when the caller supplies none.
pub const DEFAULT_SEED_TASKS: [&str; 3] = [
    "Greetings, Friend",
    "Hope you have a productive day",
    "Good Luck!",
];

/// Stable identifier handed out by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Data model representing a single task inside a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub completed: bool,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            completed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub id: ListId,
    pub name: ListName,
    pub tasks: Vec<Task>,
}

impl TaskList {
    /// Builds a list whose tasks are fresh, incomplete copies of `seed`.
    pub fn new<S: AsRef<str>>(name: ListName, seed: &[S]) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            tasks: seed.iter().map(|text| Task::new(text.as_ref())).collect(),
        }
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == id)
    }

    pub fn push_task(&mut self, name: impl Into<String>) -> Task {
        let task = Task::new(name);
        self.tasks.push(task.clone());
        task
    }

    pub fn remove_task(&mut self, id: TaskId) -> Option<Task> {
        let position = self.tasks.iter().position(|task| task.id == id)?;
        Some(self.tasks.remove(position))
    }
}

/// The aggregate root. Lists and tasks only exist embedded in a user and are
/// always persisted together with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub task_lists: Vec<TaskList>,
}

impl User {
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            task_lists: Vec::new(),
        }
    }

    pub fn list(&self, name: &ListName) -> Option<&TaskList> {
        self.task_lists.iter().find(|list| &list.name == name)
    }

    pub fn list_mut(&mut self, name: &ListName) -> Option<&mut TaskList> {
        self.task_lists.iter_mut().find(|list| &list.name == name)
    }

    pub fn remove_list(&mut self, id: ListId) -> Option<TaskList> {
        let position = self.task_lists.iter().position(|list| list.id == id)?;
        Some(self.task_lists.remove(position))
    }
}

/// Identity attached to a request by the auth middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: UserId,
    pub display_name: Option<String>,
}

/// The raw bearer token of the current request, kept for sign-out.
#[derive(Debug, Clone)]
pub struct AccessToken(pub String);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    #[test]
    fn seeded_list_copies_tasks_with_fresh_ids() {
        let first = TaskList::new(normalize("chores").unwrap(), &DEFAULT_SEED_TASKS);
        let second = TaskList::new(normalize("chores").unwrap(), &DEFAULT_SEED_TASKS);

        let names: Vec<_> = first.tasks.iter().map(|task| task.name.as_str()).collect();
        assert_eq!(
            names,
            ["Greetings, Friend", "Hope you have a productive day", "Good Luck!"]
        );
        assert!(first.tasks.iter().all(|task| !task.completed));
        assert_ne!(first.id, second.id);
        assert_ne!(first.tasks[0].id, second.tasks[0].id);
    }

    #[test]
    fn removing_by_id_keeps_order_of_the_rest() {
        let mut list = TaskList::new(normalize("chores").unwrap(), &["a", "b", "c"]);
        let middle = list.tasks[1].id;

        assert_eq!(list.remove_task(middle).map(|task| task.name), Some("b".into()));
        assert_eq!(list.remove_task(middle), None);

        let names: Vec<_> = list.tasks.iter().map(|task| task.name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn lists_are_found_by_normalized_name() {
        let mut user = User::new(UserId::new("alice"), "Alice");
        user.task_lists
            .push(TaskList::new(normalize("work").unwrap(), &[] as &[&str]));

        assert!(user.list(&normalize("  WORK ").unwrap()).is_some());
        assert!(user.list(&normalize("home").unwrap()).is_none());
    }
}
