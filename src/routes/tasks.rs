use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::{
        parse_allowed_update, Task, TaskInput, TaskListQuery, TaskQueryParams, TaskUpdate,
        TASK_UPDATABLE_FIELDS,
    },
    state::AppState,
};
use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

fn task_not_found() -> AppError {
    AppError::NotFound("Task not found".into())
}

/// Creates a new task owned by the authenticated user.
///
/// Any `owner` key in the body is ignored.
///
/// ## Responses:
/// - `201 Created`: Returns the newly created `Task` object as JSON.
/// - `400 Bad Request`: If the description is missing or blank.
/// - `401 Unauthorized`: If the request lacks a valid authentication token.
#[post("")]
pub async fn create_task(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
    task_data: web::Json<TaskInput>,
) -> Result<impl Responder, AppError> {
    let input = task_data.into_inner().normalized();
    input.validate()?;

    let task = state
        .store
        .insert_task(Task::new(input, auth.user.id))
        .await?;
    log::debug!("user {} created task {}", auth.user.id, task.id);

    Ok(HttpResponse::Created().json(task))
}

/// Lists the authenticated user's tasks.
///
/// ## Query Parameters:
/// - `completed` (optional): `true` or `false`.
/// - `sortBy` (optional): `<field>:<asc|desc>` with field one of `createdAt`,
///   `updatedAt`, `description`, `completed`.
/// - `limit`, `skip` (optional): non-negative page bounds; a limit of 0 is unbounded.
///
/// ## Responses:
/// - `200 OK`: Returns a JSON array of `Task` objects.
/// - `400 Bad Request`: Malformed query values or an unknown sort field.
/// - `401 Unauthorized`: If the request lacks a valid authentication token.
#[get("")]
pub async fn get_tasks(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
    query_params: web::Query<TaskQueryParams>,
) -> Result<impl Responder, AppError> {
    let query = TaskListQuery::try_from(query_params.into_inner())?;
    let tasks = state.store.list_tasks_by_owner(auth.user.id, &query).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Retrieves one of the authenticated user's tasks.
///
/// ## Responses:
/// - `200 OK`: Returns the `Task` object as JSON.
/// - `401 Unauthorized`: If the request lacks a valid authentication token.
/// - `404 Not Found`: If the task does not exist or belongs to someone else.
#[get("/{id}")]
pub async fn get_task(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let task = state
        .store
        .find_task(task_id.into_inner(), auth.user.id)
        .await?
        .ok_or_else(task_not_found)?;
    Ok(HttpResponse::Ok().json(task))
}

/// Updates `description` and/or `completed` of an owned task.
///
/// ## Responses:
/// - `200 OK`: Returns the updated `Task`.
/// - `400 Bad Request`: A key outside the allow-list (`"Invalid updates!"`) or an
///   invalid value. Nothing is applied in either case.
/// - `401 Unauthorized`: If the request lacks a valid authentication token.
/// - `404 Not Found`: If the task does not exist or belongs to someone else.
#[patch("/{id}")]
pub async fn update_task(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
    task_id: web::Path<Uuid>,
    body: web::Json<Map<String, Value>>,
) -> Result<impl Responder, AppError> {
    let update: TaskUpdate = parse_allowed_update(body.into_inner(), TASK_UPDATABLE_FIELDS)?;
    let update = update.normalized();
    update.validate()?;

    let task = state
        .store
        .update_task(task_id.into_inner(), auth.user.id, &update)
        .await?
        .ok_or_else(task_not_found)?;
    Ok(HttpResponse::Ok().json(task))
}

/// Deletes an owned task and returns it.
///
/// ## Responses:
/// - `200 OK`: Returns the deleted `Task`.
/// - `401 Unauthorized`: If the request lacks a valid authentication token.
/// - `404 Not Found`: If the task does not exist or belongs to someone else. Another
///   user's task is left untouched.
#[delete("/{id}")]
pub async fn delete_task(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let task = state
        .store
        .delete_task(task_id.into_inner(), auth.user.id)
        .await?
        .ok_or_else(task_not_found)?;
    log::debug!("user {} deleted task {}", auth.user.id, task.id);
    Ok(HttpResponse::Ok().json(task))
}
