use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// Keys a `PATCH /tasks/{id}` body may contain.
pub const TASK_UPDATABLE_FIELDS: &[&str] = &["description", "completed"];

/// Input structure for creating a task.
///
/// Any `owner` key in the request body is ignored: the owner is always the
/// authenticated user.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TaskInput {
    /// Trimmed before validation; must not be empty.
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    #[serde(default)]
    pub completed: bool,
}

impl TaskInput {
    pub fn normalized(self) -> Self {
        Self {
            description: self.description.trim().to_string(),
            completed: self.completed,
        }
    }
}

/// Body of `PATCH /tasks/{id}`, after the allow-list check.
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct TaskUpdate {
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: Option<String>,
    pub completed: Option<bool>,
}

impl TaskUpdate {
    pub fn normalized(self) -> Self {
        Self {
            description: self.description.map(|d| d.trim().to_string()),
            completed: self.completed,
        }
    }
}

/// A task entity as stored and returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier for the task (UUID v4).
    pub id: Uuid,
    pub description: String,
    pub completed: bool,
    /// Identifier of the user who owns the task.
    pub owner: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new `Task` owned by `owner`, stamped with the current time.
    pub fn new(input: TaskInput, owner: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            description: input.description,
            completed: input.completed,
            owner,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Columns a task listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Description,
    Completed,
}

impl SortField {
    pub fn column(self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Description => "description",
            SortField::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A single-key ordering parsed from `sortBy=<field>:<asc|desc>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSort {
    pub field: SortField,
    pub order: SortOrder,
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownSortField(pub String);

impl fmt::Display for UnknownSortField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Cannot sort tasks by '{}'", self.0)
    }
}

impl FromStr for TaskSort {
    type Err = UnknownSortField;

    /// Anything but an explicit `desc` direction sorts ascending.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (field, direction) = value.split_once(':').unwrap_or((value, "asc"));
        let field = match field {
            "createdAt" => SortField::CreatedAt,
            "updatedAt" => SortField::UpdatedAt,
            "description" => SortField::Description,
            "completed" => SortField::Completed,
            other => return Err(UnknownSortField(other.to_string())),
        };
        let order = if direction == "desc" {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        };
        Ok(TaskSort { field, order })
    }
}

/// Raw query string of `GET /tasks`.
///
/// An empty value (`?completed=`) counts as absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQueryParams {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub completed: Option<bool>,
    pub sort_by: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<u64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub skip: Option<u64>,
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match Option::<String>::deserialize(deserializer)?.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(de::Error::custom),
    }
}

/// Filter, ordering and page for listing one owner's tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskListQuery {
    pub completed: Option<bool>,
    pub sort: Option<TaskSort>,
    /// `None` means unbounded.
    pub limit: Option<u64>,
    /// `None` means from the start.
    pub skip: Option<u64>,
}

impl TryFrom<TaskQueryParams> for TaskListQuery {
    type Error = AppError;

    fn try_from(params: TaskQueryParams) -> Result<Self, Self::Error> {
        let sort = params
            .sort_by
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse::<TaskSort>)
            .transpose()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        Ok(TaskListQuery {
            completed: params.completed,
            sort,
            // A limit of zero places no bound on the result.
            limit: params.limit.filter(|limit| *limit > 0),
            skip: params.skip.filter(|skip| *skip > 0),
        })
    }
}
