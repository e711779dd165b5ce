// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Directory data layer: live Firestore bindings for a company / people /
//! events directory.
//!
//! This crate provides query building, live collection and document
//! bindings, a mutation gateway, a short-lived entity cache and an
//! email/password auth session with role-based permission checks.

pub mod binding;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod telemetry;
pub mod time_utils;

use binding::{CollectionBinding, DocumentBinding};
use config::Config;
use db::{DocumentStore, FirestoreDb, QueryBuilder};
use error::Result;
use models::Entity;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use services::{
    AuthProvider, AuthSession, DirectoryQueries, EntityCache, FirebaseAuthClient, Mutations,
    Preset,
};
use std::sync::Arc;

/// Shared client state, passed explicitly to whatever needs it.
///
/// Cloning is cheap; clones share the store, the query interner and the
/// entity cache.
#[derive(Clone)]
pub struct DirectoryContext {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub queries: QueryBuilder,
    /// Recently viewed entities, keyed by document ID
    pub cache: EntityCache<JsonValue>,
}

impl DirectoryContext {
    pub fn new(config: Config, store: Arc<dyn DocumentStore>) -> Self {
        let queries = QueryBuilder::new(config.query_limit);
        let cache = EntityCache::new(config.cache_ttl);
        Self {
            config,
            store,
            queries,
            cache,
        }
    }

    /// Connect to Firestore for `config.project_id`.
    pub async fn connect(config: Config) -> Result<Self> {
        let db = FirestoreDb::new(&config.project_id, config.listen_retry).await?;
        Ok(Self::new(config, Arc::new(db)))
    }

    /// Standard directory queries.
    pub fn presets(&self) -> DirectoryQueries {
        DirectoryQueries::new(self.queries.clone())
    }

    /// Unbound collection binding.
    pub fn collection<T>(&self) -> CollectionBinding<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        CollectionBinding::new(self.store.clone())
    }

    /// Collection binding already following `preset`.
    pub fn bind_preset<T>(&self, preset: &Preset) -> CollectionBinding<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        CollectionBinding::subscribe(self.store.clone(), preset.query.clone(), preset.enabled)
    }

    /// Document binding following `path`; empty disables it.
    pub fn document<T>(&self, path: &str) -> DocumentBinding<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        DocumentBinding::subscribe(self.store.clone(), path, true)
    }

    /// Document binding for entity `id`; `None` leaves it disabled.
    pub fn entity<E: Entity>(&self, id: Option<&str>) -> DocumentBinding<E> {
        match id {
            Some(id) if !id.is_empty() => self.document(&format!("{}/{}", E::COLLECTION, id)),
            _ => DocumentBinding::new(self.store.clone()),
        }
    }

    pub fn mutations(&self) -> Mutations {
        Mutations::new(self.store.clone())
    }

    /// Start an auth session against `provider`.
    pub fn auth_session(&self, provider: Arc<dyn AuthProvider>) -> AuthSession {
        AuthSession::start(provider, self.store.clone(), self.mutations())
    }

    /// Start an auth session against Firebase Auth using `config.api_key`.
    pub fn firebase_auth_session(&self) -> Result<AuthSession> {
        let provider = FirebaseAuthClient::new(&self.config.api_key)?;
        Ok(self.auth_session(Arc::new(provider)))
    }

    /// Cache `entity` for later detail views and remember its display name.
    pub fn remember<E: Entity>(&self, entity: &E, name: &str) -> Result<()> {
        let value = serde_json::to_value(entity)
            .map_err(|e| error::AppError::Internal(anyhow::anyhow!("serialize entity: {e}")))?;
        self.cache.put(entity.id(), value);
        self.cache.put_name(entity.id(), name);
        Ok(())
    }

    /// Cached copy of entity `id`, if still fresh.
    pub fn recall<E: Entity>(&self, id: &str) -> Option<E> {
        let mut value = self.cache.get(id)?;
        if let Some(map) = value.as_object_mut() {
            map.insert("id".to_string(), JsonValue::String(id.to_string()));
        }
        serde_json::from_value(value).ok()
    }
}
