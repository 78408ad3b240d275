//! The task-list store: every operation loads the whole user aggregate,
//! changes it in memory and writes it back. Writes carry the version the
//! aggregate was read at; when another request got there first the
//! mutation is re-applied to a fresh copy instead of overwriting it.

use crate::{
    error::StoreError,
    model::{ListId, Task, TaskId, TaskList, User, UserId},
    normalize::ListName,
    repo::{StoredUser, UserRepository},
};

pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 5;

enum Outcome<T> {
    Changed(T),
    Unchanged(T),
}

pub struct TaskListStore<R> {
    repo: R,
    max_write_attempts: u32,
}

impl<R: UserRepository> TaskListStore<R> {
    pub fn new(repo: R, max_write_attempts: u32) -> Self {
        Self {
            repo,
            max_write_attempts: max_write_attempts.max(1),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    async fn load(&self, user: &UserId) -> Result<StoredUser, StoreError> {
        self.repo
            .find(user)
            .await?
            .ok_or_else(|| StoreError::UserNotFound(user.clone()))
    }

    async fn mutate<T, F>(&self, user: &UserId, mut apply: F) -> Result<T, StoreError>
    where
        T: Send,
        F: FnMut(&mut User) -> Result<Outcome<T>, StoreError> + Send,
    {
        for attempt in 1..=self.max_write_attempts {
            let StoredUser {
                user: mut aggregate,
                version,
            } = self.load(user).await?;

            let value = match apply(&mut aggregate)? {
                Outcome::Unchanged(value) => return Ok(value),
                Outcome::Changed(value) => value,
            };

            if self.repo.update(&aggregate, version).await? {
                tracing::debug!(%user, version = version + 1, "saved task lists");
                return Ok(value);
            }
            tracing::warn!(%user, attempt, "user modified concurrently, retrying");
        }

        Err(StoreError::Conflict {
            user: user.clone(),
            attempts: self.max_write_attempts,
        })
    }

    pub async fn get_user(&self, user: &UserId) -> Result<User, StoreError> {
        Ok(self.load(user).await?.user)
    }

    pub async fn display_name(&self, user: &UserId) -> Result<String, StoreError> {
        Ok(self.get_user(user).await?.display_name)
    }

    pub async fn get_lists(&self, user: &UserId) -> Result<Vec<TaskList>, StoreError> {
        Ok(self.get_user(user).await?.task_lists)
    }

    pub async fn get_list(&self, user: &UserId, name: &ListName) -> Result<TaskList, StoreError> {
        self.get_user(user)
            .await?
            .list(name)
            .cloned()
            .ok_or_else(|| StoreError::ListNotFound(name.clone()))
    }

    /// Creates a list seeded with `seed`. If the user already has a list with
    /// this name, that list is returned untouched, so retries are harmless.
    pub async fn create_list<S>(
        &self,
        user: &UserId,
        name: &ListName,
        seed: &[S],
    ) -> Result<TaskList, StoreError>
    where
        S: AsRef<str> + Sync,
    {
        self.mutate(user, |aggregate| {
            if let Some(existing) = aggregate.list(name) {
                return Ok(Outcome::Unchanged(existing.clone()));
            }
            let list = TaskList::new(name.clone(), seed);
            aggregate.task_lists.push(list.clone());
            Ok(Outcome::Changed(list))
        })
        .await
    }

    pub async fn append_task(
        &self,
        user: &UserId,
        list_name: &ListName,
        text: &str,
    ) -> Result<Task, StoreError> {
        self.mutate(user, |aggregate| {
            let list = aggregate
                .list_mut(list_name)
                .ok_or_else(|| StoreError::ListNotFound(list_name.clone()))?;
            Ok(Outcome::Changed(list.push_task(text)))
        })
        .await
    }

    /// Sets the completed flag to `completed` regardless of its current value.
    pub async fn set_task_completed(
        &self,
        user: &UserId,
        list_name: &ListName,
        task_id: TaskId,
        completed: bool,
    ) -> Result<Task, StoreError> {
        self.update_task(user, list_name, task_id, |_| completed)
            .await
    }

    /// Flips the completed flag based on the state currently stored.
    pub async fn toggle_task(
        &self,
        user: &UserId,
        list_name: &ListName,
        task_id: TaskId,
    ) -> Result<Task, StoreError> {
        self.update_task(user, list_name, task_id, |current| !current)
            .await
    }

    async fn update_task<F>(
        &self,
        user: &UserId,
        list_name: &ListName,
        task_id: TaskId,
        next_state: F,
    ) -> Result<Task, StoreError>
    where
        F: Fn(bool) -> bool + Send + Sync,
    {
        self.mutate(user, |aggregate| {
            let task = aggregate
                .list_mut(list_name)
                .ok_or_else(|| StoreError::ListNotFound(list_name.clone()))?
                .task_mut(task_id)
                .ok_or(StoreError::TaskNotFound(task_id))?;
            task.completed = next_state(task.completed);
            Ok(Outcome::Changed(task.clone()))
        })
        .await
    }

    /// Removes a task if it is there. Missing lists or tasks are not errors.
    pub async fn delete_task(
        &self,
        user: &UserId,
        list_name: &ListName,
        task_id: TaskId,
    ) -> Result<(), StoreError> {
        self.mutate(user, |aggregate| {
            if let Some(list) = aggregate.list_mut(list_name) {
                if list.remove_task(task_id).is_none() {
                    tracing::debug!(%task_id, %list_name, "task to delete not present");
                }
            }
            Ok(Outcome::Changed(()))
        })
        .await
    }

    pub async fn delete_list(&self, user: &UserId, list_id: ListId) -> Result<(), StoreError> {
        self.mutate(user, |aggregate| {
            if aggregate.remove_list(list_id).is_none() {
                tracing::debug!(%list_id, "list to delete not present");
            }
            Ok(Outcome::Changed(()))
        })
        .await
    }

    /// Creates the empty aggregate for a freshly registered account.
    pub async fn register_user(
        &self,
        user: &UserId,
        display_name: &str,
    ) -> Result<User, StoreError> {
        let fresh = User::new(user.clone(), display_name);
        if !self.repo.insert(&fresh).await? {
            return Err(StoreError::AlreadyExists(user.clone()));
        }
        tracing::info!(%user, "registered user");
        Ok(fresh)
    }

    /// Federated login: create the aggregate on first sight. `display_name`
    /// is whatever the identity provider reported; when it has nothing the
    /// user id stands in for a new aggregate, and an existing name is kept.
    pub async fn find_or_create_user(
        &self,
        user: &UserId,
        display_name: Option<&str>,
    ) -> Result<User, StoreError> {
        for attempt in 1..=self.max_write_attempts {
            match self.repo.find(user).await? {
                None => {
                    let fresh = User::new(user.clone(), display_name.unwrap_or(user.as_str()));
                    if self.repo.insert(&fresh).await? {
                        tracing::info!(%user, "created user on first login");
                        return Ok(fresh);
                    }
                }
                Some(StoredUser {
                    user: mut aggregate,
                    version,
                }) => {
                    let refreshed = match display_name {
                        Some(name) if name != aggregate.display_name => name,
                        _ => return Ok(aggregate),
                    };
                    aggregate.display_name = refreshed.to_owned();
                    if self.repo.update(&aggregate, version).await? {
                        tracing::debug!(%user, "refreshed display name");
                        return Ok(aggregate);
                    }
                }
            }
            tracing::warn!(%user, attempt, "user modified concurrently, retrying");
        }

        Err(StoreError::Conflict {
            user: user.clone(),
            attempts: self.max_write_attempts,
        })
    }
}
