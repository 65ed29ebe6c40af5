//! Startup provisioning of the initial admin user.

use cynode_db::models::user::CreateUser;
use cynode_db::{DbError, Store};

use crate::auth::password::{hash_password, HASH_ALGORITHM};
use crate::config::ServerConfig;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Store(#[from] DbError),

    #[error("failed to hash bootstrap password: {0}")]
    Hash(String),
}

/// Create the bootstrap admin when a password is configured and the handle
/// is free. Returns `true` if a user was created.
pub async fn ensure_admin_user(store: &dyn Store, config: &ServerConfig) -> Result<bool, BootstrapError> {
    let Some(password) = config.bootstrap_admin_password.as_deref() else {
        return Ok(false);
    };
    let handle = config.bootstrap_admin_handle.as_str();

    if store.find_user_by_handle(handle).await?.is_some() {
        tracing::debug!(handle, "Bootstrap admin already exists");
        return Ok(false);
    }

    let password_hash = hash_password(password).map_err(|e| BootstrapError::Hash(e.to_string()))?;
    let user = store
        .create_user(&CreateUser {
            handle: handle.to_string(),
            email: None,
        })
        .await?;
    store
        .set_password_credential(user.id, &password_hash, HASH_ALGORITHM)
        .await?;

    tracing::info!(user_id = %user.id, handle, "Created bootstrap admin user");
    Ok(true)
}
