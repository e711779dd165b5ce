// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live mirror of a single document.

use crate::binding::{spawn_forwarder, Subscription};
use crate::db::{DocPath, Document, DocumentStore};
use crate::error::{AppError, Result};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Observable state of a document binding.
///
/// `exists == false` with no error means the document is absent, which is
/// a normal outcome rather than a failure.
#[derive(Debug, Clone)]
pub struct DocumentState<T> {
    pub item: Option<T>,
    pub loading: bool,
    pub error: Option<Arc<AppError>>,
    pub exists: bool,
}

impl<T> DocumentState<T> {
    /// `{None, false, None, false}`
    pub fn idle() -> Self {
        Self {
            item: None,
            loading: false,
            error: None,
            exists: false,
        }
    }
}

impl<T> Default for DocumentState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

/// Binds one document path to a local `Option<T>`.
///
/// Same lifecycle as [`CollectionBinding`](crate::binding::CollectionBinding):
/// errors keep the last item and `exists` flag, a new path starts from idle.
pub struct DocumentBinding<T> {
    store: Arc<dyn DocumentStore>,
    state: Arc<watch::Sender<DocumentState<T>>>,
    generation: Arc<AtomicU64>,
    path: Option<DocPath>,
    enabled: bool,
    subscription: Option<Subscription>,
}

impl<T> DocumentBinding<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let (state, _) = watch::channel(DocumentState::idle());
        Self {
            store,
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
            path: None,
            enabled: false,
            subscription: None,
        }
    }

    /// Create and bind to a textual path in one step.
    pub fn subscribe(store: Arc<dyn DocumentStore>, path: &str, enabled: bool) -> Self {
        let mut binding = Self::new(store);
        binding.bind_path(path, enabled);
        binding
    }

    /// Bind to a textual path. An empty path behaves like `enabled = false`;
    /// a malformed one is reported through `error` without touching the store.
    pub fn bind_path(&mut self, path: &str, enabled: bool) {
        if path.trim().is_empty() {
            self.bind(None, enabled);
            return;
        }
        match DocPath::parse(path) {
            Ok(path) => self.bind(Some(path), enabled),
            Err(e) => {
                self.bind(None, false);
                self.state.send_modify(|s| s.error = Some(Arc::new(e)));
            }
        }
    }

    /// Point the binding at `path` (or nothing).
    pub fn bind(&mut self, path: Option<DocPath>, enabled: bool) {
        let same_path = self.path == path;
        if same_path && self.enabled == enabled && (!enabled || self.is_subscribed()) {
            return;
        }

        if !same_path {
            self.stop();
            self.state.send_replace(DocumentState::idle());
        }
        self.path = path;
        self.enabled = enabled;
        self.restart();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        self.restart();
    }

    pub fn refetch(&mut self) {
        self.restart();
    }

    /// Release the listener. Safe to call more than once.
    pub fn cancel(&mut self) {
        self.stop();
    }

    pub fn watch(&self) -> watch::Receiver<DocumentState<T>> {
        self.state.subscribe()
    }

    pub fn state(&self) -> DocumentState<T> {
        self.state.borrow().clone()
    }

    /// Wait for the binding to leave the loading state.
    pub async fn settled(&self) -> DocumentState<T> {
        let mut rx = self.watch();
        let settled = rx.wait_for(|s| !s.loading).await.map(|s| s.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    pub fn path(&self) -> Option<&DocPath> {
        self.path.as_ref()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }

    fn stop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(mut subscription) = self.subscription.take() {
            if subscription.cancel() {
                if let Some(path) = &self.path {
                    tracing::debug!(path = %path, "Document listener cancelled");
                }
            }
        }
    }

    fn restart(&mut self) {
        self.stop();

        let path = match (&self.path, self.enabled) {
            (Some(path), true) => path.clone(),
            _ => {
                self.state.send_replace(DocumentState::idle());
                return;
            }
        };

        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
        tracing::debug!(path = %path, "Opening document listener");

        let label = path.to_string();
        let collection = path.collection().to_string();
        let stream = self.store.listen_document(path);
        self.subscription = Some(spawn_forwarder(
            stream,
            self.state.clone(),
            self.generation.clone(),
            move |slot: &mut DocumentState<T>, next: Result<Option<Document>>| {
                let decoded = next.and_then(|doc| {
                    doc.map(|doc| doc.decode::<T>(&collection)).transpose()
                });
                match decoded {
                    Ok(Some(item)) => {
                        slot.item = Some(item);
                        slot.exists = true;
                        slot.loading = false;
                        slot.error = None;
                    }
                    Ok(None) => {
                        slot.item = None;
                        slot.exists = false;
                        slot.loading = false;
                        slot.error = None;
                    }
                    Err(e) => {
                        tracing::warn!(path = %label, error = %e, "Document listener error");
                        slot.loading = false;
                        slot.error = Some(Arc::new(e));
                    }
                }
            },
        ));
    }
}

impl<T> Drop for DocumentBinding<T> {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }
}
