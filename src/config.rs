// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Configuration loaded from environment variables.

use std::env;
use std::time::Duration;

/// Default freshness window for cached entities (5 minutes).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 5 * 60;

/// Default result cap applied to collection queries.
pub const DEFAULT_QUERY_LIMIT: u32 = 1000;

/// Default delay before a dropped Firestore listen stream reconnects.
pub const DEFAULT_LISTEN_RETRY_MS: u64 = 5000;

/// Client configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Firebase / GCP project ID
    pub project_id: String,
    /// Firebase Web API key (public, used by the Auth REST API)
    pub api_key: String,
    /// Cache entry freshness window
    pub cache_ttl: Duration,
    /// Result cap for collection queries that don't set one
    pub query_limit: u32,
    /// Reconnect delay for Firestore listen streams
    pub listen_retry: Duration,
}

impl Config {
    /// Config for tests; never reaches a real project.
    pub fn test_default() -> Self {
        Self {
            project_id: "test-project".to_string(),
            api_key: "test-api-key".to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            query_limit: DEFAULT_QUERY_LIMIT,
            listen_retry: Duration::from_millis(DEFAULT_LISTEN_RETRY_MS),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            project_id: env::var("FIREBASE_PROJECT_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FIREBASE_PROJECT_ID"))?,
            api_key: env::var("FIREBASE_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FIREBASE_API_KEY"))?,
            cache_ttl: Duration::from_secs(parse_var("CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?),
            query_limit: parse_var("QUERY_LIMIT", DEFAULT_QUERY_LIMIT)?,
            listen_retry: Duration::from_millis(parse_var(
                "LISTEN_RETRY_MS",
                DEFAULT_LISTEN_RETRY_MS,
            )?),
        })
    }
}

/// Read an optional numeric variable, rejecting values that don't parse.
fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
