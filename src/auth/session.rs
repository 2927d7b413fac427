//! Session lifecycle: issue, resolve, revoke.
//!
//! A token is only honoured while it is in the owner's active set, so revoking a
//! session takes effect immediately even though the token still verifies.

use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::state::AppState;

/// Signs a token for `user_id` and records it as an active session.
pub async fn issue(state: &AppState, user_id: Uuid) -> Result<String, AppError> {
    let token = state.sessions.sign(user_id)?;
    state.store.add_token(user_id, &token).await?;
    log::debug!("issued session for user {}", user_id);
    Ok(token)
}

/// Ends exactly one session.
pub async fn revoke(state: &AppState, user_id: Uuid, token: &str) -> Result<(), AppError> {
    if !state.store.remove_token(user_id, token).await? {
        log::debug!("session for user {} was already gone", user_id);
    }
    Ok(())
}

/// Ends every session of the user.
pub async fn revoke_all(state: &AppState, user_id: Uuid) -> Result<u64, AppError> {
    let removed = state.store.clear_tokens(user_id).await?;
    log::info!("revoked {} session(s) for user {}", removed, user_id);
    Ok(removed)
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves the acting user from a raw `Authorization` header.
///
/// Every authentication failure collapses into the same `Unauthorized` error; only a
/// storage failure is reported differently.
pub async fn authenticate(
    state: &AppState,
    header: Option<&str>,
) -> Result<AuthenticatedUser, AppError> {
    let Some(token) = header.and_then(bearer_token) else {
        log::debug!("rejecting request without a bearer token");
        return Err(AppError::unauthenticated());
    };

    let claims = match state.sessions.verify(token) {
        Ok(claims) => claims,
        Err(err) => {
            log::debug!("rejecting bearer token: {}", err);
            return Err(AppError::unauthenticated());
        }
    };

    match state.store.find_user_by_token(claims.sub, token).await? {
        Some(user) => Ok(AuthenticatedUser {
            user,
            token: token.to_string(),
        }),
        None => {
            log::debug!("rejecting inactive session for user {}", claims.sub);
            Err(AppError::unauthenticated())
        }
    }
}
