use std::sync::Arc;

use tracing::error;

use jobtrack_db::Database;

use crate::error::ApiError;
use crate::mail::Mailer;
use crate::storage::Storage;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Base URL used when building links that go out by mail.
    pub public_url: String,
    pub storage: Storage,
    pub mailer: Arc<dyn Mailer>,
}

/// Run blocking DB work off the async runtime.
pub async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::from)
}
