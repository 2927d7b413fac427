pub mod extractors;
pub mod middleware;
pub mod password;
pub mod session;
pub mod token;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::user::{validate_email_domain, validate_password_policy};
use crate::models::User;

// Re-export necessary items
pub use extractors::AuthenticatedUser;
pub use middleware::AuthMiddleware;
pub use password::{hash_password, verify_password};
pub use token::{Claims, SessionKeys};

/// Represents the payload for a user login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Represents the payload for a signup request.
///
/// Unknown keys are ignored, so a client cannot smuggle in tokens or an avatar.
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(
        email(message = "Email is invalid"),
        custom = "validate_email_domain"
    )]
    pub email: String,
    #[validate(
        length(min = 7, message = "Password must be at least 7 characters"),
        custom = "validate_password_policy"
    )]
    pub password: String,
    #[validate(range(min = 0, message = "Age must be a positive number"))]
    #[serde(default)]
    pub age: i32,
}

impl SignupRequest {
    /// Trims every text field and lower-cases the email.
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: crate::models::user::normalize_email(&self.email),
            password: self.password.trim().to_string(),
            age: self.age,
        }
    }
}

/// Response body of signup and login.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    /// Bearer token for the new session.
    pub token: String,
}
