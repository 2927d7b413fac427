//! Shared setup for the integration tests: an in-memory app with a recording mailer.
#![allow(dead_code)]

use actix_cors::Cors;
use actix_http::Request;
use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::middleware::Logger;
use actix_web::{test, web, App};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskmanager::auth::SessionKeys;
use taskmanager::error::AppError;
use taskmanager::mailer::{Email, MailError, Mailer};
use taskmanager::models::{NewUser, Task, TaskListQuery, TaskUpdate, User, UserChanges};
use taskmanager::store::{MemoryStore, Store, TaskStore, UserStore};
use taskmanager::{routes, AppState};
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const MULTIPART_BOUNDARY: &str = "----taskmanager-test-boundary";

/// Keeps every message instead of sending it.
#[derive(Default, Clone)]
pub struct RecordingMailer {
    pub sent: Arc<Mutex<Vec<Email>>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

impl RecordingMailer {
    /// Waits for spawned deliveries to land and returns the subjects sent to `to`.
    pub async fn subjects_for(&self, to: &str) -> Vec<String> {
        for _ in 0..20 {
            let subjects: Vec<String> = self
                .sent
                .lock()
                .unwrap()
                .iter()
                .filter(|email| email.to == to)
                .map(|email| email.subject.clone())
                .collect();
            if !subjects.is_empty() {
                return subjects;
            }
            actix_rt::time::sleep(Duration::from_millis(10)).await;
        }
        Vec::new()
    }
}

/// Rejects every message, as a provider outage would.
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _email: Email) -> Result<(), MailError> {
        Err(MailError::Rejected {
            status: 503,
            body: "provider unavailable".to_string(),
        })
    }
}

/// A store whose backend is unreachable: every call fails.
pub struct UnavailableStore;

fn unavailable<T>() -> Result<T, AppError> {
    Err(AppError::DatabaseError("connection refused".to_string()))
}

#[async_trait]
impl UserStore for UnavailableStore {
    async fn insert_user(&self, _user: NewUser) -> Result<User, AppError> {
        unavailable()
    }
    async fn find_user(&self, _id: Uuid) -> Result<Option<User>, AppError> {
        unavailable()
    }
    async fn find_user_by_email(&self, _email: &str) -> Result<Option<User>, AppError> {
        unavailable()
    }
    async fn update_user(
        &self,
        _id: Uuid,
        _changes: UserChanges,
    ) -> Result<Option<User>, AppError> {
        unavailable()
    }
    async fn delete_user(&self, _id: Uuid) -> Result<Option<User>, AppError> {
        unavailable()
    }
    async fn set_avatar(&self, _id: Uuid, _avatar: Option<Vec<u8>>) -> Result<bool, AppError> {
        unavailable()
    }
    async fn avatar(&self, _id: Uuid) -> Result<Option<Vec<u8>>, AppError> {
        unavailable()
    }
    async fn add_token(&self, _user_id: Uuid, _token: &str) -> Result<(), AppError> {
        unavailable()
    }
    async fn find_user_by_token(
        &self,
        _user_id: Uuid,
        _token: &str,
    ) -> Result<Option<User>, AppError> {
        unavailable()
    }
    async fn remove_token(&self, _user_id: Uuid, _token: &str) -> Result<bool, AppError> {
        unavailable()
    }
    async fn clear_tokens(&self, _user_id: Uuid) -> Result<u64, AppError> {
        unavailable()
    }
}

#[async_trait]
impl TaskStore for UnavailableStore {
    async fn insert_task(&self, _task: Task) -> Result<Task, AppError> {
        unavailable()
    }
    async fn find_task(&self, _id: Uuid, _owner: Uuid) -> Result<Option<Task>, AppError> {
        unavailable()
    }
    async fn list_tasks_by_owner(
        &self,
        _owner: Uuid,
        _query: &TaskListQuery,
    ) -> Result<Vec<Task>, AppError> {
        unavailable()
    }
    async fn update_task(
        &self,
        _id: Uuid,
        _owner: Uuid,
        _changes: &TaskUpdate,
    ) -> Result<Option<Task>, AppError> {
        unavailable()
    }
    async fn delete_task(&self, _id: Uuid, _owner: Uuid) -> Result<Option<Task>, AppError> {
        unavailable()
    }
}

#[async_trait]
impl Store for UnavailableStore {
    async fn ping(&self) -> Result<(), AppError> {
        unavailable()
    }
}

pub struct TestContext {
    pub state: web::Data<AppState>,
    pub store: Arc<MemoryStore>,
    pub mailer: RecordingMailer,
}

pub fn context() -> TestContext {
    let mailer = RecordingMailer::default();
    let store = Arc::new(MemoryStore::new());
    let state = state_with(store.clone(), Arc::new(mailer.clone()));
    TestContext {
        state,
        store,
        mailer,
    }
}

/// App state over an arbitrary store and mailer.
pub fn state_with(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>) -> web::Data<AppState> {
    let _ = env_logger::builder().is_test(true).try_init();
    web::Data::new(AppState::new(
        store,
        SessionKeys::from_secret(TEST_SECRET),
        mailer,
        4,
    ))
}

pub async fn init_app(
    ctx: &TestContext,
) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error> {
    init_app_with(ctx.state.clone()).await
}

pub async fn init_app_with(
    state: web::Data<AppState>,
) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error> {
    test::init_service(
        App::new()
            .app_data(state)
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .configure(routes::config),
    )
    .await
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

/// Signs up through the API and returns the user JSON and the session token.
pub async fn signup<S, B>(app: &S, name: &str, email: &str, password: &str) -> (Value, String)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/users")
        .set_json(json!({ "name": name, "email": email, "password": password }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let token = body["token"].as_str().unwrap().to_string();
    (body["user"].clone(), token)
}

pub async fn create_task<S, B>(app: &S, token: &str, body: Value) -> Value
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/tasks")
        .insert_header(bearer(token))
        .set_json(body)
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);
    test::read_body_json(resp).await
}

/// Builds a `multipart/form-data` body with a single file field.
pub fn multipart_file(field: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> (&'static str, String) {
    (
        "Content-Type",
        format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
    )
}

/// A small PNG with distinct width and height.
pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let buffer = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 90]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(buffer)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}
