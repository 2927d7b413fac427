use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Keys a `PATCH /users/me` body may contain.
pub const USER_UPDATABLE_FIELDS: &[&str] = &["name", "email", "age", "password"];

/// A registered account as returned by the API.
///
/// The password hash is never serialized; the avatar and the session tokens are kept
/// out of this struct altogether and are only reachable through the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Always stored trimmed and lower-cased.
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub age: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user ready to be inserted: already validated, password already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub age: i32,
}

impl NewUser {
    pub fn new(name: String, email: String, password_hash: String, age: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            age,
        }
    }
}

/// Field changes applied by a single store update. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub age: Option<i32>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.age.is_none()
    }
}

/// Body of `PATCH /users/me`, after the allow-list check.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: Option<String>,
    #[validate(
        email(message = "Email is invalid"),
        custom = "validate_email_domain"
    )]
    pub email: Option<String>,
    #[validate(range(min = 0, message = "Age must be a positive number"))]
    pub age: Option<i32>,
    #[validate(
        length(min = 7, message = "Password must be at least 7 characters"),
        custom = "validate_password_policy"
    )]
    pub password: Option<String>,
}

impl UserUpdate {
    /// Applies the same trimming and case folding as signup.
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.map(|name| name.trim().to_string()),
            email: self.email.map(|email| normalize_email(&email)),
            age: self.age,
            password: self.password.map(|password| password.trim().to_string()),
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Requires a dotted domain with an alphabetic top-level label, e.g. rejects
/// `mike@example` and `mike@example.1`.
pub fn validate_email_domain(email: &str) -> Result<(), ValidationError> {
    let tld = email
        .rsplit_once('@')
        .and_then(|(_, domain)| domain.rsplit_once('.'))
        .map(|(_, tld)| tld);
    match tld {
        Some(tld) if tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()) => Ok(()),
        _ => {
            let mut error = ValidationError::new("email_domain");
            error.message = Some("Email is invalid".into());
            Err(error)
        }
    }
}

/// Rejects passwords containing the word "password" in any letter case.
pub fn validate_password_policy(password: &str) -> Result<(), ValidationError> {
    if password.to_lowercase().contains("password") {
        let mut error = ValidationError::new("password_policy");
        error.message = Some("Password can't contain 'password'".into());
        return Err(error);
    }
    Ok(())
}
