//! # AppError
//!
//! Centralized error handling for the Quorum ecosystem.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type for all domain operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Referenced entity absent (e.g., Question, Answer, Comment)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Malformed or out-of-range input, with the offending field
    #[error("validation error on `{field}`: {message}")]
    Validation { field: String, message: String },

    /// Authorization invariant violated (e.g., non-owner toggling acceptance)
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Uniqueness race at the storage layer (e.g., concurrent reaction insert)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Indexed-search backend failure. Never escapes the search resolver;
    /// it is recovered locally via the fallback matcher.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Relational store failure. Fatal — there is no fallback for
    /// canonical state.
    #[error("storage error: {0}")]
    Storage(String),
}

impl AppError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        AppError::NotFound(entity.to_string(), id.to_string())
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// A specialized Result type for Quorum logic.
pub type Result<T> = std::result::Result<T, AppError>;
