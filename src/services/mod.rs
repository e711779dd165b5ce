// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - mutations, caching, auth and directory helpers.

pub mod auth;
pub mod auth_provider;
pub mod cache;
pub mod directory;
pub mod mutations;
pub mod validation;

pub use auth::{AuthPhase, AuthSession, AuthState, Session};
pub use auth_provider::{AuthProvider, FirebaseAuthClient, Identity, MemoryAuthProvider};
pub use cache::EntityCache;
pub use directory::{DirectoryQueries, Preset};
pub use mutations::{MutationStatus, Mutations};
pub use validation::FieldError;
