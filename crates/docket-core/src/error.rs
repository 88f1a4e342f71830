//! Typed failures surfaced by the task engine.

use thiserror::Error;

/// Rejection from the task form validator.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("task title cannot be empty")]
    EmptyTitle,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed reading stored key {key}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stored value under {key} is not a valid task list")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed encoding task list for {key}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed writing stored key {key}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failures that leave the task collection untouched.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("task not found: {id}")]
    NotFound { id: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
