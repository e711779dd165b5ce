// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types shared by the store, bindings and services.

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Auth provider error: {0}")]
    Auth(String),

    #[error("Failed to decode document {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True for errors raised by the store itself (transport or permission).
    pub fn is_store_error(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::PermissionDenied(_))
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        match self {
            AppError::Unauthorized => AppError::Unauthorized,
            AppError::PermissionDenied(m) => AppError::PermissionDenied(m.clone()),
            AppError::NotFound(m) => AppError::NotFound(m.clone()),
            AppError::InvalidArgument(m) => AppError::InvalidArgument(m.clone()),
            AppError::Validation(m) => AppError::Validation(m.clone()),
            AppError::Database(m) => AppError::Database(m.clone()),
            AppError::Auth(m) => AppError::Auth(m.clone()),
            AppError::Decode { path, message } => AppError::Decode {
                path: path.clone(),
                message: message.clone(),
            },
            // anyhow errors aren't Clone; keep the rendered chain
            AppError::Internal(e) => AppError::Internal(anyhow::anyhow!("{e:#}")),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
