use std::error::Error as StdError;
use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Pagination error: {0}")]
    Pagination(String),

    #[error(transparent)]
    Unchecked(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Converts an arbitrary error into a [`StorageError`].
///
/// A `StorageError` passes through unchanged. Known library errors land in
/// their dedicated variant, an `io::Error` of kind `InvalidInput` is treated
/// as a bad argument, and everything else is wrapped in `Unchecked`.
pub fn unchecked<E>(err: E) -> StorageError
where
    E: Into<anyhow::Error>,
{
    let err: anyhow::Error = err.into();

    let err = match err.downcast::<StorageError>() {
        Ok(e) => return e,
        Err(err) => err,
    };
    let err = match err.downcast::<io::Error>() {
        Ok(e) if e.kind() == io::ErrorKind::InvalidInput => {
            return StorageError::InvalidArgument(e.to_string())
        }
        Ok(e) => return StorageError::Io(e),
        Err(err) => err,
    };
    let err = match err.downcast::<serde_json::Error>() {
        Ok(e) => return StorageError::Json(e),
        Err(err) => err,
    };
    match err.downcast::<rusqlite::Error>() {
        Ok(e) => StorageError::Database(e),
        Err(err) => StorageError::Unchecked(err),
    }
}

/// Peels `Unchecked` wrapper layers and returns the first error that is not
/// one.
pub fn unwrap<'a>(wrapped: &'a (dyn StdError + 'static)) -> &'a (dyn StdError + 'static) {
    let mut current = wrapped;
    while let Some(StorageError::Unchecked(inner)) = current.downcast_ref::<StorageError>() {
        let next: &(dyn StdError + Send + Sync + 'static) = inner.as_ref();
        current = next;
    }
    current
}
