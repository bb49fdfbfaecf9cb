//! Errors surfaced by the paste service.

use cas::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("storage failure: {0}")]
    StorageFailure(#[source] StoreError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Error::NotFound(id.into_inner()),
            StoreError::AlreadyExists(id) => Error::AlreadyExists(id.into_inner()),
            other => Error::StorageFailure(other),
        }
    }
}
