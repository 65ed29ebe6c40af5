/// Errors surfaced by every store implementation.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The targeted row does not exist (or is no longer in the required state).
    #[error("Row not found")]
    NotFound,

    /// A unique constraint was violated. Carries the constraint name.
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    /// Any other database failure.
    #[error("Database error: {0}")]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some("23505") => {
                DbError::Conflict(db_err.constraint().unwrap_or("unknown").to_string())
            }
            other => DbError::Sqlx(other),
        }
    }
}
