// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process document store.
//!
//! Behaves like the remote store as far as the bindings can tell: listeners
//! get a full snapshot on subscribe and again whenever their result changes,
//! writes reject `Undefined`, updates of missing documents fail, and
//! server timestamps come from the store's own clock. Faults can be injected
//! per collection to exercise error paths.

use crate::db::query::{QueryHandle, QuerySpec};
use crate::db::value::{Fields, Value};
use crate::db::{DocPath, Document, DocumentStore, SnapshotStream, TransformOp, Write, WriteKind};
use crate::error::{AppError, Result};
use crate::time_utils::{Clock, SystemClock};
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::stream;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// In-memory store. Clones share state.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    /// collection path -> document ID -> body
    collections: DashMap<String, BTreeMap<String, Fields>>,
    /// root collection -> injected failure message
    faults: DashMap<String, String>,
    /// Bumped on every committed write or fault change.
    changes: watch::Sender<u64>,
    clock: Arc<dyn Clock>,
    active_listeners: AtomicUsize,
    deliveries: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store whose server timestamps come from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                collections: DashMap::new(),
                faults: DashMap::new(),
                changes,
                clock,
                active_listeners: AtomicUsize::new(0),
                deliveries: AtomicUsize::new(0),
            }),
        }
    }

    /// Make every operation and listener on `collection` fail with a
    /// permission error until [`clear_fault`](Self::clear_fault).
    pub fn fail_collection(&self, collection: &str, message: &str) {
        tracing::debug!(collection, message, "Injecting store fault");
        self.inner
            .faults
            .insert(collection.to_string(), message.to_string());
        self.inner.bump();
    }

    pub fn clear_fault(&self, collection: &str) {
        self.inner.faults.remove(collection);
        self.inner.bump();
    }

    /// Listeners currently open.
    pub fn active_listeners(&self) -> usize {
        self.inner.active_listeners.load(Ordering::SeqCst)
    }

    /// Snapshots (or errors) handed to listeners so far.
    pub fn snapshots_delivered(&self) -> usize {
        self.inner.deliveries.load(Ordering::SeqCst)
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.inner
            .collections
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Raw body of a document, bypassing faults.
    pub fn peek(&self, path: &DocPath) -> Option<Fields> {
        self.inner
            .collections
            .get(path.collection())
            .and_then(|docs| docs.get(path.id()).cloned())
    }

    fn listen<T, F>(&self, eval: F) -> SnapshotStream<T>
    where
        T: PartialEq + Clone + Send + Sync + 'static,
        F: Fn(&Inner) -> Result<T> + Send + Sync + 'static,
    {
        let listener = Listener {
            inner: self.inner.clone(),
            rx: self.inner.changes.subscribe(),
            _guard: ListenerGuard::new(self.inner.clone()),
            last: None,
            started: false,
            done: false,
        };
        let eval = Arc::new(eval);

        Box::pin(stream::unfold(listener, move |mut listener| {
            let eval = eval.clone();
            async move {
                if listener.done {
                    return None;
                }
                loop {
                    if listener.started {
                        if listener.rx.changed().await.is_err() {
                            return None;
                        }
                    } else {
                        listener.started = true;
                    }

                    match eval(&listener.inner) {
                        Err(e) => {
                            listener.done = true;
                            listener.inner.deliveries.fetch_add(1, Ordering::SeqCst);
                            return Some((Err(e), listener));
                        }
                        Ok(snapshot) if listener.last.as_ref() != Some(&snapshot) => {
                            listener.last = Some(snapshot.clone());
                            listener.inner.deliveries.fetch_add(1, Ordering::SeqCst);
                            return Some((Ok(snapshot), listener));
                        }
                        Ok(_) => {}
                    }
                }
            }
        }))
    }
}

struct Listener<T> {
    inner: Arc<Inner>,
    rx: watch::Receiver<u64>,
    _guard: ListenerGuard,
    last: Option<T>,
    started: bool,
    done: bool,
}

/// Tracks open listeners; decrements when the stream is dropped.
struct ListenerGuard {
    inner: Arc<Inner>,
}

impl ListenerGuard {
    fn new(inner: Arc<Inner>) -> Self {
        inner.active_listeners.fetch_add(1, Ordering::SeqCst);
        Self { inner }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.inner.active_listeners.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Inner {
    fn bump(&self) {
        self.changes.send_modify(|v| *v += 1);
    }

    fn check_fault(&self, collection: &str) -> Result<()> {
        let root = collection.split('/').next().unwrap_or(collection);
        match self.faults.get(root) {
            Some(message) => Err(AppError::PermissionDenied(message.clone())),
            None => Ok(()),
        }
    }

    fn run_query(&self, spec: &QuerySpec) -> Result<Vec<Document>> {
        self.check_fault(&spec.collection)?;

        let mut matched: Vec<Document> = match self.collections.get(&spec.collection) {
            Some(docs) => docs
                .iter()
                .filter(|(_, fields)| spec.matches(fields))
                .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                .collect(),
            None => Vec::new(),
        };

        matched.sort_by(|a, b| spec.compare((&a.id, &a.fields), (&b.id, &b.fields)));
        if let Some(limit) = spec.limit {
            matched.truncate(limit as usize);
        }
        Ok(matched)
    }

    fn read_document(&self, path: &DocPath) -> Result<Option<Document>> {
        self.check_fault(path.collection())?;
        Ok(self
            .collections
            .get(path.collection())
            .and_then(|docs| docs.get(path.id()).cloned())
            .map(|fields| Document::new(path.id(), fields)))
    }

    fn apply(&self, write: Write) -> Result<()> {
        self.check_fault(write.path.collection())?;

        if write.fields.values().any(Value::contains_undefined) {
            return Err(AppError::InvalidArgument(format!(
                "undefined field value in write to {}",
                write.path
            )));
        }

        let now = self.clock.now();
        let collection = write.path.collection();
        let id = write.path.id();

        match write.kind {
            WriteKind::Delete => {
                if let Some(mut docs) = self.collections.get_mut(collection) {
                    docs.remove(id);
                }
                return Ok(());
            }
            WriteKind::Set => {
                self.collections
                    .entry(collection.to_string())
                    .or_default()
                    .insert(id.to_string(), write.fields);
            }
            WriteKind::Update => {
                let mut docs = self.collections.get_mut(collection);
                let Some(existing) = docs.as_mut().and_then(|docs| docs.get_mut(id)) else {
                    return Err(AppError::NotFound(format!(
                        "No document to update: {}",
                        write.path
                    )));
                };
                for (field, value) in write.fields {
                    set_path(existing, &field, value);
                }
            }
        }

        let Some(mut docs) = self.collections.get_mut(collection) else {
            return Ok(());
        };
        if let Some(body) = docs.get_mut(id) {
            for transform in write.transforms {
                let current = body.get(&transform.field).cloned();
                let next = match transform.op {
                    TransformOp::ServerTimestamp => Value::Timestamp(now),
                    TransformOp::ArrayUnion(values) => {
                        let mut items = existing_array(current);
                        for value in values {
                            if !items.iter().any(|item| item.same_as(&value)) {
                                items.push(value);
                            }
                        }
                        Value::Array(items)
                    }
                    TransformOp::ArrayRemove(values) => {
                        let mut items = existing_array(current);
                        items.retain(|item| !values.iter().any(|v| v.same_as(item)));
                        Value::Array(items)
                    }
                };
                set_path(body, &transform.field, next);
            }
        }
        Ok(())
    }
}

fn existing_array(current: Option<Value>) -> Vec<Value> {
    match current {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// Assign through a dotted path, creating intermediate maps.
fn set_path(fields: &mut Fields, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            fields.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = fields
                .entry(head.to_string())
                .or_insert_with(|| Value::Map(Fields::new()));
            if !matches!(entry, Value::Map(_)) {
                *entry = Value::Map(Fields::new());
            }
            if let Value::Map(inner) = entry {
                set_path(inner, rest, value);
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>> {
        self.inner.read_document(path)
    }

    async fn query(&self, query: &QueryHandle) -> Result<Vec<Document>> {
        self.inner.run_query(query.spec())
    }

    async fn count(&self, query: &QueryHandle) -> Result<u64> {
        Ok(self.inner.run_query(query.spec())?.len() as u64)
    }

    async fn commit(&self, write: Write) -> Result<()> {
        let path = write.path.to_string();
        let kind = write.kind;
        self.inner.apply(write)?;
        tracing::debug!(path = %path, kind = ?kind, "Committed write");
        self.inner.bump();
        Ok(())
    }

    fn listen_query(&self, query: QueryHandle) -> SnapshotStream<Vec<Document>> {
        self.listen(move |inner| inner.run_query(query.spec()))
    }

    fn listen_document(&self, path: DocPath) -> SnapshotStream<Option<Document>> {
        self.listen(move |inner| inner.read_document(&path))
    }
}
