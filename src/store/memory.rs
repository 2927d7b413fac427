use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, TaskStore, UserStore};
use crate::error::AppError;
use crate::models::{
    NewUser, SortField, SortOrder, Task, TaskListQuery, TaskUpdate, User, UserChanges,
};

struct UserRecord {
    user: User,
    avatar: Option<Vec<u8>>,
    tokens: Vec<String>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, UserRecord>,
    /// Insertion order doubles as the default listing order.
    tasks: Vec<Task>,
}

impl Inner {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|record| record.user.email == email && Some(record.user.id) != except)
    }
}

/// Process-local store behind one async `RwLock`.
///
/// Each operation holds the lock for its whole duration, which makes the cascade in
/// `delete_user` atomic with respect to every other request.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active sessions of a user; zero for an unknown user.
    pub async fn session_count(&self, user_id: Uuid) -> usize {
        let inner = self.inner.read().await;
        inner
            .users
            .get(&user_id)
            .map_or(0, |record| record.tokens.len())
    }
}

fn duplicate_email() -> AppError {
    AppError::BadRequest("Email is already registered".into())
}

fn compare_tasks(a: &Task, b: &Task, field: SortField) -> Ordering {
    match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::Description => a.description.cmp(&b.description),
        SortField::Completed => a.completed.cmp(&b.completed),
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let mut inner = self.inner.write().await;
        if inner.email_taken(&new_user.email, None) {
            return Err(duplicate_email());
        }

        let now = Utc::now();
        let user = User {
            id: new_user.id,
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            age: new_user.age,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(
            user.id,
            UserRecord {
                user: user.clone(),
                avatar: None,
                tokens: Vec::new(),
            },
        );
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&id).map(|record| record.user.clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|record| record.user.email == email)
            .map(|record| record.user.clone()))
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, AppError> {
        let mut inner = self.inner.write().await;
        if let Some(email) = &changes.email {
            if inner.email_taken(email, Some(id)) {
                return Err(duplicate_email());
            }
        }

        let Some(record) = inner.users.get_mut(&id) else {
            return Ok(None);
        };
        let user = &mut record.user;
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(password_hash) = changes.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(age) = changes.age {
            user.age = age;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let mut inner = self.inner.write().await;
        let before = inner.tasks.len();
        inner.tasks.retain(|task| task.owner != id);
        let removed_tasks = before - inner.tasks.len();

        let user = inner.users.remove(&id).map(|record| record.user);
        if user.is_some() {
            log::debug!("deleted user {} and {} task(s)", id, removed_tasks);
        }
        Ok(user)
    }

    async fn set_avatar(&self, id: Uuid, avatar: Option<Vec<u8>>) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        match inner.users.get_mut(&id) {
            Some(record) => {
                record.avatar = avatar;
                record.user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn avatar(&self, id: Uuid) -> Result<Option<Vec<u8>>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&id).and_then(|record| record.avatar.clone()))
    }

    async fn add_token(&self, user_id: Uuid, token: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        match inner.users.get_mut(&user_id) {
            Some(record) => {
                record.tokens.push(token.to_string());
                Ok(())
            }
            None => Err(AppError::NotFound("User not found".into())),
        }
    }

    async fn find_user_by_token(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<Option<User>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .get(&user_id)
            .filter(|record| record.tokens.iter().any(|t| t == token))
            .map(|record| record.user.clone()))
    }

    async fn remove_token(&self, user_id: Uuid, token: &str) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        let Some(record) = inner.users.get_mut(&user_id) else {
            return Ok(false);
        };
        match record.tokens.iter().position(|t| t == token) {
            Some(index) => {
                record.tokens.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear_tokens(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .users
            .get_mut(&user_id)
            .map(|record| std::mem::take(&mut record.tokens).len() as u64)
            .unwrap_or(0))
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, task: Task) -> Result<Task, AppError> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&task.owner) {
            return Err(AppError::BadRequest("Owner does not exist".into()));
        }
        inner.tasks.push(task.clone());
        Ok(task)
    }

    async fn find_task(&self, id: Uuid, owner: Uuid) -> Result<Option<Task>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .tasks
            .iter()
            .find(|task| task.id == id && task.owner == owner)
            .cloned())
    }

    async fn list_tasks_by_owner(
        &self,
        owner: Uuid,
        query: &TaskListQuery,
    ) -> Result<Vec<Task>, AppError> {
        let inner = self.inner.read().await;
        let mut tasks: Vec<Task> = inner
            .tasks
            .iter()
            .filter(|task| task.owner == owner)
            .filter(|task| query.completed.map_or(true, |c| task.completed == c))
            .cloned()
            .collect();

        // Stable sort keeps insertion order among equal keys.
        if let Some(sort) = query.sort {
            tasks.sort_by(|a, b| {
                let ordering = compare_tasks(a, b, sort.field);
                match sort.order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }

        let skip = query.skip.unwrap_or(0) as usize;
        let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);
        Ok(tasks.into_iter().skip(skip).take(limit).collect())
    }

    async fn update_task(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: &TaskUpdate,
    ) -> Result<Option<Task>, AppError> {
        let mut inner = self.inner.write().await;
        let Some(task) = inner
            .tasks
            .iter_mut()
            .find(|task| task.id == id && task.owner == owner)
        else {
            return Ok(None);
        };
        if let Some(description) = &changes.description {
            task.description = description.clone();
        }
        if let Some(completed) = changes.completed {
            task.completed = completed;
        }
        task.updated_at = Utc::now();
        Ok(Some(task.clone()))
    }

    async fn delete_task(&self, id: Uuid, owner: Uuid) -> Result<Option<Task>, AppError> {
        let mut inner = self.inner.write().await;
        let position = inner
            .tasks
            .iter()
            .position(|task| task.id == id && task.owner == owner);
        Ok(position.map(|index| inner.tasks.remove(index)))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskInput, TaskSort};
    use pretty_assertions::assert_eq;

    async fn user(store: &MemoryStore, email: &str) -> User {
        store
            .insert_user(NewUser::new(
                "Test".to_string(),
                email.to_string(),
                "hash".to_string(),
                0,
            ))
            .await
            .unwrap()
    }

    async fn task(store: &MemoryStore, owner: Uuid, description: &str, completed: bool) -> Task {
        store
            .insert_task(Task::new(
                TaskInput {
                    description: description.to_string(),
                    completed,
                },
                owner,
            ))
            .await
            .unwrap()
    }

    #[actix_rt::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        user(&store, "a@example.com").await;
        let result = store
            .insert_user(NewUser::new(
                "Other".to_string(),
                "a@example.com".to_string(),
                "hash".to_string(),
                0,
            ))
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[actix_rt::test]
    async fn test_tokens_are_scoped_to_user() {
        let store = MemoryStore::new();
        let a = user(&store, "a@example.com").await;
        let b = user(&store, "b@example.com").await;
        store.add_token(a.id, "t1").await.unwrap();
        store.add_token(a.id, "t2").await.unwrap();

        assert!(store.find_user_by_token(a.id, "t1").await.unwrap().is_some());
        assert!(store.find_user_by_token(b.id, "t1").await.unwrap().is_none());

        assert!(store.remove_token(a.id, "t1").await.unwrap());
        assert!(!store.remove_token(a.id, "t1").await.unwrap());
        assert!(store.find_user_by_token(a.id, "t1").await.unwrap().is_none());
        assert!(store.find_user_by_token(a.id, "t2").await.unwrap().is_some());

        assert_eq!(store.clear_tokens(a.id).await.unwrap(), 1);
        assert_eq!(store.session_count(a.id).await, 0);
    }

    #[actix_rt::test]
    async fn test_task_access_requires_owner() {
        let store = MemoryStore::new();
        let a = user(&store, "a@example.com").await;
        let b = user(&store, "b@example.com").await;
        let t = task(&store, a.id, "mine", false).await;

        assert!(store.find_task(t.id, b.id).await.unwrap().is_none());
        assert!(store.delete_task(t.id, b.id).await.unwrap().is_none());
        let update = TaskUpdate {
            description: Some("stolen".to_string()),
            completed: None,
        };
        assert!(store.update_task(t.id, b.id, &update).await.unwrap().is_none());

        let stored = store.find_task(t.id, a.id).await.unwrap().unwrap();
        assert_eq!(stored.description, "mine");
    }

    #[actix_rt::test]
    async fn test_list_filters_sorts_and_pages() {
        let store = MemoryStore::new();
        let a = user(&store, "a@example.com").await;
        let b = user(&store, "b@example.com").await;
        task(&store, a.id, "c", true).await;
        task(&store, a.id, "a", false).await;
        task(&store, a.id, "b", true).await;
        task(&store, b.id, "other", true).await;

        let all = store
            .list_tasks_by_owner(a.id, &TaskListQuery::default())
            .await
            .unwrap();
        let descriptions: Vec<&str> = all.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descriptions, vec!["c", "a", "b"]);

        let query = TaskListQuery {
            completed: Some(true),
            sort: Some("description:desc".parse::<TaskSort>().unwrap()),
            limit: Some(1),
            skip: None,
        };
        let page = store.list_tasks_by_owner(a.id, &query).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].description, "c");

        let query = TaskListQuery {
            sort: Some("description:asc".parse::<TaskSort>().unwrap()),
            skip: Some(1),
            ..Default::default()
        };
        let page = store.list_tasks_by_owner(a.id, &query).await.unwrap();
        let descriptions: Vec<&str> = page.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descriptions, vec!["b", "c"]);
    }

    #[actix_rt::test]
    async fn test_delete_user_cascades() {
        let store = MemoryStore::new();
        let a = user(&store, "a@example.com").await;
        let b = user(&store, "b@example.com").await;
        let ta = task(&store, a.id, "a's", false).await;
        let tb = task(&store, b.id, "b's", false).await;

        assert!(store.delete_user(a.id).await.unwrap().is_some());
        assert!(store.find_user(a.id).await.unwrap().is_none());
        assert!(store.find_task(ta.id, a.id).await.unwrap().is_none());
        assert!(store.find_task(tb.id, b.id).await.unwrap().is_some());
        assert!(store.delete_user(a.id).await.unwrap().is_none());
    }

    #[actix_rt::test]
    async fn test_task_for_missing_owner_rejected() {
        let store = MemoryStore::new();
        let result = store
            .insert_task(Task::new(
                TaskInput {
                    description: "orphan".to_string(),
                    completed: false,
                },
                Uuid::new_v4(),
            ))
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
