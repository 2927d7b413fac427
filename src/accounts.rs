//! Account lifecycle: signup, login, profile changes and deletion.
//!
//! Hashing, uniqueness checks and the cascade on delete all happen here, explicitly,
//! so the store stays a plain persistence layer.

use serde_json::{Map, Value};
use validator::Validate;

use crate::auth::{self, session, AuthResponse, LoginRequest, SignupRequest};
use crate::error::AppError;
use crate::mailer::{self, Email};
use crate::models::{
    parse_allowed_update, user::normalize_email, NewUser, User, UserChanges, UserUpdate,
    USER_UPDATABLE_FIELDS,
};
use crate::state::AppState;

fn duplicate_email() -> AppError {
    AppError::BadRequest("Email is already registered".into())
}

/// Creates an account, sends the welcome mail and opens the first session.
pub async fn signup(state: &AppState, request: SignupRequest) -> Result<AuthResponse, AppError> {
    let request = request.normalized();
    request.validate()?;

    if state.store.find_user_by_email(&request.email).await?.is_some() {
        return Err(duplicate_email());
    }

    let password_hash = auth::hash_password(&request.password, state.bcrypt_cost)?;
    let user = state
        .store
        .insert_user(NewUser::new(request.name, request.email, password_hash, request.age))
        .await?;
    log::info!("user {} signed up", user.id);

    mailer::dispatch(state.mailer.clone(), Email::welcome(&user.email, &user.name));

    let token = session::issue(state, user.id).await?;
    Ok(AuthResponse { user, token })
}

/// Checks credentials and opens a new session.
///
/// An unknown email and a wrong password fail identically.
pub async fn login(state: &AppState, request: LoginRequest) -> Result<AuthResponse, AppError> {
    let unable = || AppError::BadRequest("Unable to login".into());

    let email = normalize_email(&request.email);
    let Some(user) = state.store.find_user_by_email(&email).await? else {
        log::debug!("login attempt for unknown email");
        return Err(unable());
    };

    if !auth::verify_password(request.password.trim(), &user.password_hash)? {
        log::debug!("login attempt with a wrong password for user {}", user.id);
        return Err(unable());
    }

    let token = session::issue(state, user.id).await?;
    log::info!("user {} logged in", user.id);
    Ok(AuthResponse { user, token })
}

/// Applies a `PATCH /users/me` body.
///
/// Either every change is applied in one store write or none is.
pub async fn update_profile(
    state: &AppState,
    user: &User,
    body: Map<String, Value>,
) -> Result<User, AppError> {
    let update: UserUpdate = parse_allowed_update(body, USER_UPDATABLE_FIELDS)?;
    let update = update.normalized();
    update.validate()?;

    if let Some(email) = &update.email {
        if let Some(existing) = state.store.find_user_by_email(email).await? {
            if existing.id != user.id {
                return Err(duplicate_email());
            }
        }
    }

    let password_hash = match &update.password {
        Some(password) => Some(auth::hash_password(password, state.bcrypt_cost)?),
        None => None,
    };

    let changes = UserChanges {
        name: update.name,
        email: update.email,
        password_hash,
        age: update.age,
    };
    if changes.is_empty() {
        return Ok(user.clone());
    }

    state
        .store
        .update_user(user.id, changes)
        .await?
        .ok_or_else(AppError::unauthenticated)
}

/// Deletes the account with its tasks and sessions, then says goodbye.
pub async fn delete_account(state: &AppState, user: &User) -> Result<User, AppError> {
    let removed = state
        .store
        .delete_user(user.id)
        .await?
        .ok_or_else(AppError::unauthenticated)?;
    log::info!("user {} deleted their account", removed.id);

    mailer::dispatch(
        state.mailer.clone(),
        Email::cancellation(&removed.email, &removed.name),
    );
    Ok(removed)
}
