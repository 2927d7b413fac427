pub mod task;
pub mod user;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::AppError;

pub use task::{
    SortField, SortOrder, Task, TaskInput, TaskListQuery, TaskQueryParams, TaskSort, TaskUpdate,
    TASK_UPDATABLE_FIELDS,
};
pub use user::{NewUser, User, UserChanges, UserUpdate, USER_UPDATABLE_FIELDS};

/// Parses a PATCH body restricted to `allowed` keys.
///
/// A single key outside the allow-list rejects the whole body before anything is
/// deserialized, so no subset of an invalid update is ever applied.
pub fn parse_allowed_update<T: DeserializeOwned>(
    body: Map<String, Value>,
    allowed: &[&str],
) -> Result<T, AppError> {
    if let Some(key) = body.keys().find(|key| !allowed.contains(&key.as_str())) {
        log::debug!("rejecting update containing disallowed key '{}'", key);
        return Err(AppError::BadRequest("Invalid updates!".into()));
    }
    Ok(serde_json::from_value(Value::Object(body))?)
}
