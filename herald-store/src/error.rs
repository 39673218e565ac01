//! Store error taxonomy and `sqlx` conversions.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("migration error: {0}")]
    Migration(String),

    /// Insert hit a uniqueness constraint; callers treat this as "already exists".
    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The release already left `new`; its terminal status is kept.
    #[error("release already settled: {0}")]
    AlreadySettled(String),

    /// A persisted value could not be mapped back onto the domain model.
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("query error: {0}")]
    Query(String),
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::DuplicateEntity(_))
    }

    pub fn is_already_settled(&self) -> bool {
        matches!(self, StoreError::AlreadySettled(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("no rows returned".to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    StoreError::DuplicateEntity(db_err.message().to_string())
                } else {
                    StoreError::Query(db_err.message().to_string())
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Connection(err.to_string())
            }
            sqlx::Error::ColumnNotFound(_) | sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::InvalidData(err.to_string())
            }
            sqlx::Error::Migrate(e) => StoreError::Migration(e.to_string()),
            other => StoreError::Query(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Migration(err.to_string())
    }
}

impl From<herald_common::HeraldError> for StoreError {
    fn from(err: herald_common::HeraldError) -> Self {
        StoreError::InvalidData(err.to_string())
    }
}
