// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live mirror of a collection query.

use crate::binding::{spawn_forwarder, Subscription};
use crate::db::{Document, DocumentStore, QueryHandle};
use crate::error::{AppError, Result};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Observable state of a collection binding.
#[derive(Debug, Clone)]
pub struct CollectionState<T> {
    /// Latest snapshot, in query order.
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<Arc<AppError>>,
}

impl<T> CollectionState<T> {
    /// `{[], false, None}`: disabled or never bound.
    pub fn idle() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

impl<T> Default for CollectionState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

/// Binds a query to a local list of `T`.
///
/// Every snapshot replaces `items` wholesale. On a store error `items` keep
/// their last value and `error` is set. Binding a different query cancels
/// the current listener before opening the next one; binding the same query
/// again is a no-op.
pub struct CollectionBinding<T> {
    store: Arc<dyn DocumentStore>,
    state: Arc<watch::Sender<CollectionState<T>>>,
    generation: Arc<AtomicU64>,
    query: Option<QueryHandle>,
    enabled: bool,
    subscription: Option<Subscription>,
}

impl<T> CollectionBinding<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Unbound binding in the idle state.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let (state, _) = watch::channel(CollectionState::idle());
        Self {
            store,
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
            query: None,
            enabled: false,
            subscription: None,
        }
    }

    /// Create and bind in one step.
    pub fn subscribe(store: Arc<dyn DocumentStore>, query: QueryHandle, enabled: bool) -> Self {
        let mut binding = Self::new(store);
        binding.bind(query, enabled);
        binding
    }

    /// Point the binding at `query`.
    pub fn bind(&mut self, query: QueryHandle, enabled: bool) {
        let same_query = self.query.as_ref() == Some(&query);
        if same_query && self.enabled == enabled && (!enabled || self.is_subscribed()) {
            return;
        }

        if !same_query {
            // A new query never inherits the previous one's items
            self.stop();
            self.state.send_replace(CollectionState::idle());
        }
        self.query = Some(query);
        self.enabled = enabled;
        self.restart();
    }

    /// Toggle the binding without changing its query.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        self.restart();
    }

    /// Drop the current listener and open a fresh one for the same query.
    pub fn refetch(&mut self) {
        self.restart();
    }

    /// Release the listener. Safe to call more than once.
    pub fn cancel(&mut self) {
        self.stop();
    }

    /// Receiver for state changes.
    pub fn watch(&self) -> watch::Receiver<CollectionState<T>> {
        self.state.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> CollectionState<T> {
        self.state.borrow().clone()
    }

    /// Wait for the binding to leave the loading state.
    pub async fn settled(&self) -> CollectionState<T> {
        let mut rx = self.watch();
        let settled = rx.wait_for(|s| !s.loading).await.map(|s| s.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    pub fn query(&self) -> Option<&QueryHandle> {
        self.query.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True while a store listener is open.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }

    fn stop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(mut subscription) = self.subscription.take() {
            if subscription.cancel() {
                if let Some(query) = &self.query {
                    tracing::debug!(query = query.key(), "Collection listener cancelled");
                }
            }
        }
    }

    fn restart(&mut self) {
        self.stop();

        let query = match (&self.query, self.enabled) {
            (Some(query), true) => query.clone(),
            _ => {
                self.state.send_replace(CollectionState::idle());
                return;
            }
        };

        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
        tracing::debug!(query = query.key(), "Opening collection listener");

        let collection = query.collection().to_string();
        let key = query.key().to_string();
        let stream = self.store.listen_query(query);
        self.subscription = Some(spawn_forwarder(
            stream,
            self.state.clone(),
            self.generation.clone(),
            move |slot: &mut CollectionState<T>, next: Result<Vec<Document>>| {
                match next.and_then(|docs| decode_all(&collection, &docs)) {
                    Ok(items) => {
                        slot.items = items;
                        slot.loading = false;
                        slot.error = None;
                    }
                    Err(e) => {
                        tracing::warn!(query = %key, error = %e, "Collection listener error");
                        slot.loading = false;
                        slot.error = Some(Arc::new(e));
                    }
                }
            },
        ));
    }
}

fn decode_all<T: DeserializeOwned>(collection: &str, docs: &[Document]) -> Result<Vec<T>> {
    docs.iter().map(|doc| doc.decode(collection)).collect()
}

impl<T> Drop for CollectionBinding<T> {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }
}
