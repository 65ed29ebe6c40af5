use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Reject a payload whose `version` is not the supported protocol version.
    pub fn check_version(version: u32) -> Result<(), CoreError> {
        if version != crate::PROTOCOL_VERSION {
            return Err(CoreError::Validation(format!(
                "unsupported version {version}, expected {}",
                crate::PROTOCOL_VERSION
            )));
        }
        Ok(())
    }
}
