use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookError {
    #[error("missing required field {0}")]
    MissingField(&'static str),
    #[error("no book exists")]
    NotFound,
    #[error("no books to delete")]
    NothingToDelete,
    #[error("StorageError")]
    Storage(#[source] anyhow::Error),
}

impl From<libsql::Error> for BookError {
    fn from(error: libsql::Error) -> Self {
        BookError::Storage(error.into())
    }
}

impl From<serde_json::Error> for BookError {
    fn from(error: serde_json::Error) -> Self {
        BookError::Storage(error.into())
    }
}

impl From<anyhow::Error> for BookError {
    fn from(error: anyhow::Error) -> Self {
        BookError::Storage(error)
    }
}
