// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore implementation of [`DocumentStore`].
//!
//! One-shot reads, writes and count aggregations map directly onto the
//! Firestore API. Writes go through a single-write transaction so field
//! transforms are applied together with the document body.
//!
//! Live listeners sit on Firestore's listen stream. Each change event
//! re-reads the target and the stream only yields when the result set
//! differs from the last one delivered, so consumers still see full
//! snapshots in query order.
//!
//! Only top-level collections are supported.

use crate::db::query::{Direction, FilterOp, QueryHandle, QuerySpec};
use crate::db::value::{Fields, Value};
use crate::db::{DocPath, Document, DocumentStore, SnapshotStream, TransformOp, Write, WriteKind};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use firestore::{
    FirestoreListenEvent, FirestoreListener, FirestoreListenerParams, FirestoreListenerTarget,
    FirestoreMemListenStateStorage, FirestoreTransformServerValue, FirestoreWritePrecondition,
};
use futures_util::stream;
use gcloud_sdk::google::firestore::v1::value::ValueType;
use gcloud_sdk::google::firestore::v1::{Document as RawDocument, Value as RawValue};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;

type Listener = FirestoreListener<firestore::FirestoreDb, FirestoreMemListenStateStorage>;

/// Every listener carries exactly one target.
const LISTEN_TARGET_ID: u32 = 1;

/// Translate `Filter`s into a conjunction on a Firestore filter builder.
macro_rules! filter_conditions {
    ($q:ident, $filters:expr) => {{
        let conditions: Vec<_> = $filters
            .iter()
            .map(|f| {
                let field = $q.field(f.field.as_str());
                let value = f.value.normalized();
                match f.op {
                    FilterOp::Equal => field.eq(value),
                    FilterOp::NotEqual => field.not_equal(value),
                    FilterOp::LessThan => field.less_than(value),
                    FilterOp::LessThanOrEqual => field.less_than_or_equal(value),
                    FilterOp::GreaterThan => field.greater_than(value),
                    FilterOp::GreaterThanOrEqual => field.greater_than_or_equal(value),
                    FilterOp::ArrayContains => field.array_contains(value),
                    FilterOp::ArrayContainsAny => field.array_contains_any(value),
                    FilterOp::In => field.is_in(value),
                    FilterOp::NotIn => field.is_not_in(value),
                }
            })
            .collect();
        $q.for_all(conditions)
    }};
}

/// Translate `Transform`s into Firestore field transforms.
macro_rules! field_transforms {
    ($t:ident, $transforms:expr) => {
        $t.fields($transforms.iter().map(|tr| {
            let field = $t.field(tr.field.as_str());
            match &tr.op {
                TransformOp::ServerTimestamp => {
                    field.server_value(FirestoreTransformServerValue::RequestTime)
                }
                TransformOp::ArrayUnion(values) => field.append_missing_elements(values.clone()),
                TransformOp::ArrayRemove(values) => field.remove_all_from_array(values.clone()),
            }
        }))
    };
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
    listen_retry: Duration,
}

/// Result row of a count aggregation.
#[derive(Debug, Deserialize)]
struct CountAggregate {
    count: u64,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str, listen_retry: Duration) -> Result<Self> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id, listen_retry).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
            listen_retry,
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str, listen_retry: Duration) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
            listen_retry,
        })
    }

    /// Create an offline client; every operation returns an error.
    pub fn new_mock() -> Self {
        Self {
            client: None,
            listen_retry: Duration::from_secs(1),
        }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Conversion Helpers ──────────────────────────────────────

    fn top_level(collection: &str) -> Result<&str> {
        if collection.contains('/') {
            return Err(AppError::InvalidArgument(format!(
                "nested collections are not supported: {collection}"
            )));
        }
        Ok(collection)
    }

    fn to_document(raw: &RawDocument) -> Result<Document> {
        let id = raw.name.rsplit('/').next().unwrap_or_default().to_string();
        let fields = raw
            .fields
            .iter()
            .map(|(k, v)| Ok((k.clone(), Self::to_value(v)?)))
            .collect::<Result<Fields>>()
            .map_err(|e| AppError::Database(format!("Failed to read document {}: {}", id, e)))?;
        Ok(Document::new(id, fields))
    }

    fn to_value(raw: &RawValue) -> Result<Value> {
        let value = match &raw.value_type {
            None | Some(ValueType::NullValue(_)) => Value::Null,
            Some(ValueType::BooleanValue(b)) => Value::Bool(*b),
            Some(ValueType::IntegerValue(i)) => Value::Integer(*i),
            Some(ValueType::DoubleValue(d)) => Value::Double(*d),
            Some(ValueType::StringValue(s)) | Some(ValueType::ReferenceValue(s)) => {
                Value::String(s.clone())
            }
            Some(ValueType::TimestampValue(ts)) => Value::Timestamp(
                firestore::timestamp_utils::from_timestamp(ts.clone())
                    .map_err(Self::database_error)?,
            ),
            Some(ValueType::ArrayValue(array)) => Value::Array(
                array
                    .values
                    .iter()
                    .map(Self::to_value)
                    .collect::<Result<_>>()?,
            ),
            Some(ValueType::MapValue(map)) => Value::Map(
                map.fields
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), Self::to_value(v)?)))
                    .collect::<Result<_>>()?,
            ),
            Some(ValueType::GeoPointValue(point)) => Value::Map(crate::fields! {
                "latitude" => point.latitude,
                "longitude" => point.longitude,
            }),
            Some(other) => {
                tracing::debug!(?other, "Unsupported Firestore value read as null");
                Value::Null
            }
        };
        Ok(value)
    }

    fn sort_order(spec: &QuerySpec) -> Vec<(&str, firestore::FirestoreQueryDirection)> {
        spec.sorts
            .iter()
            .map(|s| {
                let direction = match s.direction {
                    Direction::Asc => firestore::FirestoreQueryDirection::Ascending,
                    Direction::Desc => firestore::FirestoreQueryDirection::Descending,
                };
                (s.field.as_str(), direction)
            })
            .collect()
    }

    fn database_error(e: firestore::errors::FirestoreError) -> AppError {
        AppError::Database(e.to_string())
    }

    // ─── Live Listeners ──────────────────────────────────────────

    /// Open a listen stream on `target`; every change event pings `changes`.
    async fn open_listener(
        &self,
        target: &ListenTarget,
        changes: mpsc::UnboundedSender<()>,
    ) -> Result<Listener> {
        let client = self.get_client()?;
        let mut listener = client
            .create_listener_with_params(
                FirestoreMemListenStateStorage::new(),
                FirestoreListenerParams::new().with_retry_delay(self.listen_retry),
            )
            .await
            .map_err(Self::database_error)?;

        let target_id = FirestoreListenerTarget::new(LISTEN_TARGET_ID);
        match target {
            ListenTarget::Query(query) => {
                let spec = query.spec();
                let collection = Self::top_level(&spec.collection)?;
                let filters = spec.filters.clone();
                let mut select = client
                    .fluent()
                    .select()
                    .from(collection)
                    .filter(move |q| filter_conditions!(q, filters))
                    .order_by(Self::sort_order(spec));
                if let Some(limit) = spec.limit {
                    select = select.limit(limit);
                }
                select.listen().add_target(target_id, &mut listener)
            }
            ListenTarget::Document(path) => client
                .fluent()
                .select()
                .by_id_in(Self::top_level(path.collection())?)
                .batch_listen([path.id()])
                .add_target(target_id, &mut listener),
        }
        .map_err(Self::database_error)?;

        listener
            .start(move |event| {
                let changes = changes.clone();
                async move {
                    // Target bookkeeping carries no document data
                    if !matches!(event, FirestoreListenEvent::TargetChange(_)) {
                        let _ = changes.send(());
                    }
                    Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
                }
            })
            .await
            .map_err(Self::database_error)?;

        Ok(listener)
    }

    /// Turn a listen target plus a one-shot fetch into a stream of changed
    /// snapshots. Dropping the stream drops the listener, which stops it.
    fn live<T, F, Fut>(&self, target: ListenTarget, fetch: F) -> SnapshotStream<T>
    where
        T: PartialEq + Clone + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let initial = LiveState {
            db: self.clone(),
            target,
            fetch,
            listening: None,
            last: None,
            done: false,
        };

        Box::pin(stream::unfold(initial, |mut state| async move {
            if state.done {
                return None;
            }
            loop {
                match state.listening.as_mut() {
                    None => {
                        let (tx, rx) = mpsc::unbounded_channel();
                        match state.db.open_listener(&state.target, tx).await {
                            Ok(listener) => state.listening = Some((listener, rx)),
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to open listener");
                                state.done = true;
                                return Some((Err(e), state));
                            }
                        }
                    }
                    Some((_, changes)) => {
                        if changes.recv().await.is_none() {
                            state.done = true;
                            let err = AppError::Database("Listen stream closed".to_string());
                            return Some((Err(err), state));
                        }
                        // Coalesce a burst of changes into one re-read
                        while changes.try_recv().is_ok() {}
                    }
                }

                match (state.fetch)().await {
                    Err(e) => {
                        tracing::warn!(error = %e, "Snapshot read failed");
                        state.done = true;
                        return Some((Err(e), state));
                    }
                    Ok(snapshot) if state.last.as_ref() != Some(&snapshot) => {
                        state.last = Some(snapshot.clone());
                        return Some((Ok(snapshot), state));
                    }
                    Ok(_) => {}
                }
            }
        }))
    }
}

enum ListenTarget {
    Query(QueryHandle),
    Document(DocPath),
}

struct LiveState<F, T> {
    db: FirestoreDb,
    target: ListenTarget,
    fetch: F,
    listening: Option<(Listener, mpsc::UnboundedReceiver<()>)>,
    last: Option<T>,
    done: bool,
}

#[async_trait]
impl DocumentStore for FirestoreDb {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>> {
        let collection = Self::top_level(path.collection())?;
        let raw = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .one(path.id())
            .await
            .map_err(Self::database_error)?;

        raw.as_ref().map(Self::to_document).transpose()
    }

    async fn query(&self, query: &QueryHandle) -> Result<Vec<Document>> {
        let spec = query.spec();
        let collection = Self::top_level(&spec.collection)?;
        let filters = spec.filters.clone();

        let mut select = self
            .get_client()?
            .fluent()
            .select()
            .from(collection)
            .filter(move |q| filter_conditions!(q, filters))
            .order_by(Self::sort_order(spec));

        if let Some(limit) = spec.limit {
            select = select.limit(limit);
        }

        let raw = select
            .query()
            .await
            .map_err(Self::database_error)?;

        raw.iter().map(Self::to_document).collect()
    }

    async fn count(&self, query: &QueryHandle) -> Result<u64> {
        let spec = query.spec();
        let collection = Self::top_level(&spec.collection)?;
        let filters = spec.filters.clone();

        let rows: Vec<CountAggregate> = self
            .get_client()?
            .fluent()
            .select()
            .from(collection)
            .filter(move |q| filter_conditions!(q, filters))
            .aggregate(|a| a.fields([a.field("count").count()]))
            .obj()
            .query()
            .await
            .map_err(Self::database_error)?;

        Ok(rows.first().map(|row| row.count).unwrap_or(0))
    }

    async fn commit(&self, write: Write) -> Result<()> {
        let collection = Self::top_level(write.path.collection())?.to_string();
        let doc_id = write.path.id().to_string();
        let client = self.get_client()?;

        if let WriteKind::Delete = write.kind {
            client
                .fluent()
                .delete()
                .from(collection.as_str())
                .document_id(&doc_id)
                .execute()
                .await
                .map_err(Self::database_error)?;
            tracing::debug!(path = %write.path, "Committed delete");
            return Ok(());
        }

        if let WriteKind::Update = write.kind {
            // Firestore's update is an upsert; keep "update" strict.
            if self.get(&write.path).await?.is_none() {
                return Err(AppError::NotFound(format!(
                    "No document to update: {}",
                    write.path
                )));
            }
        }

        let fields: &Fields = &write.fields;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(Self::database_error)?;

        let staged = match write.kind {
            WriteKind::Set => client
                .fluent()
                .update()
                .in_col(&collection)
                .document_id(&doc_id)
                .object(fields)
                .transforms(|t| field_transforms!(t, write.transforms))
                .add_to_transaction(&mut transaction)
                .map(|_| ()),
            WriteKind::Update if fields.is_empty() => client
                .fluent()
                .update()
                .in_col(&collection)
                .precondition(FirestoreWritePrecondition::Exists(true))
                .document_id(&doc_id)
                .transforms(|t| field_transforms!(t, write.transforms))
                .only_transform()
                .add_to_transaction(&mut transaction)
                .map(|_| ()),
            WriteKind::Update => client
                .fluent()
                .update()
                .fields(fields.keys().cloned().collect::<Vec<_>>())
                .in_col(&collection)
                .precondition(FirestoreWritePrecondition::Exists(true))
                .document_id(&doc_id)
                .object(fields)
                .transforms(|t| field_transforms!(t, write.transforms))
                .add_to_transaction(&mut transaction)
                .map(|_| ()),
            WriteKind::Delete => Ok(()),
        };

        if let Err(e) = staged {
            if let Err(rollback) = transaction.rollback().await {
                tracing::warn!(error = %rollback, "Rollback failed");
            }
            return Err(Self::database_error(e));
        }

        transaction.commit().await.map_err(Self::database_error)?;

        tracing::debug!(path = %write.path, kind = ?write.kind, "Committed write");
        Ok(())
    }

    fn listen_query(&self, query: QueryHandle) -> SnapshotStream<Vec<Document>> {
        let db = self.clone();
        let target = ListenTarget::Query(query.clone());
        self.live(target, move || {
            let db = db.clone();
            let query = query.clone();
            async move { db.query(&query).await }
        })
    }

    fn listen_document(&self, path: DocPath) -> SnapshotStream<Option<Document>> {
        let db = self.clone();
        let target = ListenTarget::Document(path.clone());
        self.live(target, move || {
            let db = db.clone();
            let path = path.clone();
            async move { db.get(&path).await }
        })
    }
}
