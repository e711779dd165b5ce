// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mutation gateway.
//!
//! Every write is normalized (no `Undefined` reaches the store) and stamped
//! with audit timestamps taken from the store's clock. Failures are returned
//! to the caller and also published on the status channel. Nothing is
//! retried.

use crate::db::query::{QueryHandle, QuerySpec};
use crate::db::value::to_fields;
use crate::db::{
    generate_document_id, normalize_fields, DocPath, DocumentStore, Fields, Filter, TransformOp,
    Value, Write, CREATED_ON, MODIFIED_ON,
};
use crate::error::{AppError, Result};
use crate::models::Entity;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Outcome of the most recent mutation.
#[derive(Debug, Clone, Default)]
pub enum MutationStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Failed(Arc<AppError>),
}

impl MutationStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, MutationStatus::Pending)
    }

    pub fn error(&self) -> Option<&AppError> {
        match self {
            MutationStatus::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Write-side gateway to the store.
///
/// Clones share the status channel.
#[derive(Clone)]
pub struct Mutations {
    store: Arc<dyn DocumentStore>,
    status: Arc<watch::Sender<MutationStatus>>,
}

impl Mutations {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let (status, _) = watch::channel(MutationStatus::Idle);
        Self {
            store,
            status: Arc::new(status),
        }
    }

    pub fn status(&self) -> MutationStatus {
        self.status.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<MutationStatus> {
        self.status.subscribe()
    }

    /// Fresh document ID without writing anything.
    pub fn create_id(&self) -> Result<String> {
        generate_document_id()
    }

    /// Create a document with a generated ID; returns the ID.
    pub async fn add(&self, collection: &str, fields: &Fields) -> Result<String> {
        self.track("add", collection, async {
            let id = generate_document_id()?;
            let write = Write::set(DocPath::new(collection, &id), normalize_fields(fields))
                .stamp(CREATED_ON)
                .stamp(MODIFIED_ON);
            self.store.commit(write).await?;
            Ok(id)
        })
        .await
    }

    /// Create or fully replace the document at `path`.
    pub async fn set(&self, path: &str, fields: &Fields) -> Result<()> {
        self.track("set", path, async {
            let path = DocPath::parse(path)?;
            let write = Write::set(path, normalize_fields(fields))
                .stamp(CREATED_ON)
                .stamp(MODIFIED_ON);
            self.store.commit(write).await
        })
        .await
    }

    /// Merge `fields` into an existing document. Fails with `NotFound` if
    /// the document doesn't exist.
    pub async fn update(&self, path: &str, fields: &Fields) -> Result<()> {
        self.track("update", path, async {
            let path = DocPath::parse(path)?;
            let write = Write::update(path, normalize_fields(fields)).stamp(MODIFIED_ON);
            self.store.commit(write).await
        })
        .await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.track("delete", path, async {
            let path = DocPath::parse(path)?;
            self.store.commit(Write::delete(path)).await
        })
        .await
    }

    /// Fetch and decode one document; `Ok(None)` if it doesn't exist.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        self.track("get", path, async {
            let path = DocPath::parse(path)?;
            match self.store.get(&path).await? {
                Some(doc) => doc.decode(path.collection()).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    /// Add `value` to the array `field` unless already present.
    pub async fn array_add(&self, path: &str, field: &str, value: impl Into<Value>) -> Result<()> {
        let value: Value = value.into();
        let op = TransformOp::ArrayUnion(vec![value.normalized()]);
        self.array_op("array_add", path, field, op).await
    }

    /// Remove every occurrence of `value` from the array `field`.
    pub async fn array_remove(
        &self,
        path: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let value: Value = value.into();
        let op = TransformOp::ArrayRemove(vec![value.normalized()]);
        self.array_op("array_remove", path, field, op).await
    }

    /// Count documents matching `filters` using the store's aggregation.
    pub async fn count(&self, collection: &str, filters: Vec<Filter>) -> Result<u64> {
        self.track("count", collection, async {
            let spec = QuerySpec {
                collection: collection.to_string(),
                filters,
                sorts: Vec::new(),
                limit: None,
            };
            // One-shot; not worth interning
            self.store.count(&QueryHandle::new(spec)).await
        })
        .await
    }

    /// Validate and create `entity` in its collection; returns the new ID.
    pub async fn add_entity<E: Entity>(&self, entity: &E) -> Result<String> {
        let fields = self.entity_fields(entity)?;
        self.add(E::COLLECTION, &fields).await
    }

    /// Validate and write `entity` under `id`, replacing any existing document.
    pub async fn set_entity<E: Entity>(&self, id: &str, entity: &E) -> Result<()> {
        let fields = self.entity_fields(entity)?;
        self.set(&entity_path::<E>(id), &fields).await
    }

    /// Validate and merge `entity` into the existing document `id`.
    pub async fn update_entity<E: Entity>(&self, id: &str, entity: &E) -> Result<()> {
        let fields = self.entity_fields(entity)?;
        self.update(&entity_path::<E>(id), &fields).await
    }

    /// Mark an entity inactive instead of deleting it.
    pub async fn soft_delete<E: Entity>(&self, id: &str) -> Result<()> {
        let mut fields = Fields::new();
        fields.insert("isActive".to_string(), Value::Bool(false));
        self.update(&entity_path::<E>(id), &fields).await
    }

    async fn array_op(
        &self,
        op: &'static str,
        path: &str,
        field: &str,
        transform: TransformOp,
    ) -> Result<()> {
        self.track(op, path, async {
            let path = DocPath::parse(path)?;
            let write = Write::update(path, Fields::new())
                .transform(field, transform)
                .stamp(MODIFIED_ON);
            self.store.commit(write).await
        })
        .await
    }

    fn entity_fields<E: Entity>(&self, entity: &E) -> Result<Fields> {
        if let Err(errors) = entity.validate() {
            let err = AppError::from(errors);
            tracing::debug!(collection = E::COLLECTION, error = %err, "Rejected invalid entity");
            self.status.send_replace(MutationStatus::Failed(Arc::new(err.clone())));
            return Err(err);
        }
        to_fields(entity)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("serialize entity: {e}")))
    }

    async fn track<T, F>(&self, op: &'static str, target: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.status.send_replace(MutationStatus::Pending);
        match fut.await {
            Ok(value) => {
                tracing::debug!(op, target, "Mutation succeeded");
                self.status.send_replace(MutationStatus::Success);
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(op, target, error = %e, "Mutation failed");
                self.status
                    .send_replace(MutationStatus::Failed(Arc::new(e.clone())));
                Err(e)
            }
        }
    }
}

fn entity_path<E: Entity>(id: &str) -> String {
    format!("{}/{}", E::COLLECTION, id)
}
