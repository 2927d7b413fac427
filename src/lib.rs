#![doc = "The `taskmanager` library crate."]
#![doc = ""]
#![doc = "Domain models, storage backends, session handling, account services and routing"]
#![doc = "for the task manager API. The binary (`main.rs`) reads the configuration, builds"]
#![doc = "an `AppState` and mounts `routes::config` on an actix-web server."]

pub mod accounts;
pub mod auth;
pub mod avatar;
pub mod config;
pub mod error;
pub mod mailer;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

pub use crate::error::AppError;
pub use crate::state::AppState;
