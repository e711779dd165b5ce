// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client-side checks for auth forms.
//!
//! These run before any request reaches the auth provider.

use crate::error::AppError;
use std::fmt;
use validator::ValidateEmail;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// A validation failure tied to a form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl From<FieldError> for AppError {
    fn from(e: FieldError) -> Self {
        AppError::Validation(e.to_string())
    }
}

pub fn validate_email(email: &str) -> Result<(), FieldError> {
    if email.is_empty() {
        return Err(FieldError::new("email", "Email is required."));
    }
    if !email.validate_email() {
        return Err(FieldError::new(
            "email",
            "Please enter a valid email address.",
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), FieldError> {
    if password.is_empty() {
        return Err(FieldError::new("password", "Password is required."));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(FieldError::new(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LENGTH} characters."),
        ));
    }
    Ok(())
}

pub fn validate_password_match(password: &str, confirm: &str) -> Result<(), FieldError> {
    if confirm.is_empty() {
        return Err(FieldError::new(
            "confirmPassword",
            "Please confirm your password.",
        ));
    }
    if password != confirm {
        return Err(FieldError::new(
            "confirmPassword",
            "Passwords do not match.",
        ));
    }
    Ok(())
}

/// Map an auth provider error code to text suitable for a form.
///
/// Accepts both REST codes (`EMAIL_EXISTS`) and SDK-style codes
/// (`auth/email-already-in-use`). Unknown codes pass through unchanged.
pub fn friendly_auth_message(code: &str) -> String {
    // REST errors may carry a suffix: "WEAK_PASSWORD : Password should be..."
    let key = code.split(':').next().unwrap_or(code).trim();
    let message = match key {
        "INVALID_LOGIN_CREDENTIALS" | "INVALID_PASSWORD" | "EMAIL_NOT_FOUND"
        | "auth/invalid-credential" | "auth/user-not-found" | "auth/wrong-password" => {
            "The password is invalid or the user does not exist."
        }
        "TOO_MANY_ATTEMPTS_TRY_LATER" | "auth/too-many-requests" => {
            "Access temporarily disabled due to failed attempts."
        }
        "EMAIL_EXISTS" | "auth/email-already-in-use" => {
            "An account with this email already exists."
        }
        "WEAK_PASSWORD" | "auth/weak-password" => {
            "Password is too weak. Please choose a stronger password."
        }
        "USER_DISABLED" | "auth/user-disabled" => "This account has been disabled.",
        "EXPIRED_OOB_CODE" | "INVALID_OOB_CODE" | "auth/expired-action-code"
        | "auth/invalid-action-code" => "This link has expired or was already used.",
        "" => "An error occurred",
        _ => return code.to_string(),
    };
    message.to_string()
}
