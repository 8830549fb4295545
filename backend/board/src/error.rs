use thiserror::Error;

use crate::{models::Table, validation::ValidationError};

#[derive(Error, Debug)]
pub enum BoardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No {table} record with id {id}")]
    NotFound { table: Table, id: u64 },

    /// The data service refused the request; the message is shown to the user as-is.
    #[error("{0}")]
    Rejected(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl BoardError {
    pub fn backend(error: impl std::fmt::Display) -> Self {
        BoardError::Backend(error.to_string())
    }
}
