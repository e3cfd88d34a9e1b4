use rusqlite::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} must not be empty")]
    EmptyContent(&'static str),

    #[error("invalid page number: {0:?}")]
    InvalidPage(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already taken")]
    Conflict(&'static str),

    #[error("profile must be archived before it can be deleted")]
    NotArchived,

    #[error("database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// If `err` is a UNIQUE constraint violation, returns SQLite's message
/// (e.g. `"UNIQUE constraint failed: users.email"`).
pub(crate) fn unique_violation(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(e, msg)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Some(msg.as_deref().unwrap_or(""))
        }
        _ => None,
    }
}
