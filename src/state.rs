use std::sync::Arc;

use crate::auth::SessionKeys;
use crate::mailer::Mailer;
use crate::store::Store;

/// Shared application state, registered once as `web::Data<AppState>`.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub sessions: SessionKeys,
    pub mailer: Arc<dyn Mailer>,
    /// bcrypt work factor for new password hashes.
    pub bcrypt_cost: u32,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        sessions: SessionKeys,
        mailer: Arc<dyn Mailer>,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            store,
            sessions,
            mailer,
            bcrypt_cost,
        }
    }
}
