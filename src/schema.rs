use serde::{Deserialize, Serialize};

use crate::{
    model::{ListId, Task, TaskList},
    normalize::ListName,
};

// Form body for creating a new list
#[derive(Debug, Deserialize)]
pub struct CreateListSchema {
    pub name: String,
}

// Form body for appending a task to a list
#[derive(Debug, Deserialize)]
pub struct AppendTaskSchema {
    pub text: String,
}

// Form body carrying the desired completed state of a task
#[derive(Debug, Deserialize)]
pub struct SetCompletedSchema {
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct DeleteListSchema {
    /// Kept as text: an id that doesn't parse names no list, which is not an
    /// error for a delete.
    pub list_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupSchema {
    pub username: String,
    pub email: String,
    pub password: String,
    pub real_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmUserSchema {
    pub username: String,
    pub confirmation_code: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginSchema {
    pub username: String,
    pub password: String,
}

/// One row of the list index.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListSummary {
    pub id: ListId,
    pub name: ListName,
    pub task_count: usize,
    pub completed_count: usize,
}

impl From<&TaskList> for ListSummary {
    fn from(list: &TaskList) -> Self {
        Self {
            id: list.id,
            name: list.name.clone(),
            task_count: list.tasks.len(),
            completed_count: list.tasks.iter().filter(|task| task.completed).count(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListIndexView {
    pub display_name: String,
    pub lists: Vec<ListSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListView {
    pub list_id: ListId,
    pub list_name: ListName,
    pub tasks: Vec<Task>,
    pub display_name: String,
}
