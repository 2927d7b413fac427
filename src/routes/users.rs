use crate::{
    accounts,
    auth::{session, AuthMiddleware, AuthenticatedUser, LoginRequest, SignupRequest},
    avatar,
    error::AppError,
    state::AppState,
};
use actix_multipart::Multipart;
use actix_web::{
    delete, get, http::header::ContentType, patch, post, web, HttpResponse, Responder,
};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Sign up
///
/// Creates an account and opens its first session.
///
/// ## Responses:
/// - `201 Created`: `{ "user": User, "token": String }`.
/// - `400 Bad Request`: Invalid fields or an email that is already registered.
#[post("")]
pub async fn signup(
    state: web::Data<AppState>,
    signup_data: web::Json<SignupRequest>,
) -> Result<impl Responder, AppError> {
    let response = accounts::signup(&state, signup_data.into_inner()).await?;
    Ok(HttpResponse::Created().json(response))
}

/// Login user
///
/// ## Responses:
/// - `200 OK`: `{ "user": User, "token": String }` with a fresh session token.
/// - `400 Bad Request`: `"Unable to login"` for any credential mismatch.
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    let response = accounts::login(&state, login_data.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Ends the session the request was made with. Other sessions stay valid.
#[post("/logout", wrap = "AuthMiddleware")]
pub async fn logout(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    session::revoke(&state, auth.user.id, &auth.token).await?;
    log::info!("user {} logged out", auth.user.id);
    Ok(HttpResponse::Ok().finish())
}

/// Ends every session of the user.
#[post("/logoutAll", wrap = "AuthMiddleware")]
pub async fn logout_all(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    session::revoke_all(&state, auth.user.id).await?;
    Ok(HttpResponse::Ok().finish())
}

#[get("/me", wrap = "AuthMiddleware")]
pub async fn get_profile(auth: AuthenticatedUser) -> impl Responder {
    HttpResponse::Ok().json(auth.user)
}

/// Updates `name`, `email`, `age` and/or `password`.
///
/// ## Responses:
/// - `200 OK`: The updated user.
/// - `400 Bad Request`: A key outside the allow-list (`"Invalid updates!"`), an
///   invalid value, or an email taken by another account. Nothing is applied.
/// - `401 Unauthorized`: If the request lacks a valid authentication token.
#[patch("/me", wrap = "AuthMiddleware")]
pub async fn update_profile(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
    body: web::Json<Map<String, Value>>,
) -> Result<impl Responder, AppError> {
    let user = accounts::update_profile(&state, &auth.user, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// Deletes the account together with its tasks and sessions, returning the removed user.
#[delete("/me", wrap = "AuthMiddleware")]
pub async fn delete_profile(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let user = accounts::delete_account(&state, &auth.user).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// Uploads or replaces the avatar.
///
/// Expects `multipart/form-data` with an `avatar` file field named `*.jpg`, `*.jpeg`
/// or `*.png`, at most 1 MB. The image is stored as a 250x250 PNG.
///
/// ## Responses:
/// - `200 OK`: Avatar stored.
/// - `400 Bad Request`: `{"error": ...}` for a missing, oversized or non-image upload.
/// - `401 Unauthorized`: If the request lacks a valid authentication token.
#[post("/me/avatar", wrap = "AuthMiddleware")]
pub async fn upload_avatar(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
    payload: Multipart,
) -> Result<impl Responder, AppError> {
    let upload = avatar::read_avatar_field(payload).await?;
    let png = avatar::normalize(&upload)?;

    if !state.store.set_avatar(auth.user.id, Some(png)).await? {
        return Err(AppError::unauthenticated());
    }
    log::debug!("stored avatar for user {}", auth.user.id);
    Ok(HttpResponse::Ok().finish())
}

#[delete("/me/avatar", wrap = "AuthMiddleware")]
pub async fn delete_avatar(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    state.store.set_avatar(auth.user.id, None).await?;
    Ok(HttpResponse::Ok().finish())
}

/// Serves a user's avatar as `image/png`. Public.
///
/// ## Responses:
/// - `200 OK`: The PNG bytes.
/// - `404 Not Found`: Unknown user, or a user without an avatar.
#[get("/{id}/avatar")]
pub async fn get_avatar(
    state: web::Data<AppState>,
    user_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let png = state
        .store
        .avatar(user_id.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("Avatar not found".into()))?;
    Ok(HttpResponse::Ok().content_type(ContentType::png()).body(png))
}
