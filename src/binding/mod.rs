// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live bindings of store queries and documents.
//!
//! A binding owns at most one store listener at a time, mirrors its
//! snapshots into a `tokio::sync::watch` channel, and releases the listener
//! when it is re-bound, disabled, cancelled or dropped.
//!
//! Bindings spawn their forwarding task on the current tokio runtime, so
//! `bind` must be called from within one.

pub mod collection;
pub mod document;

pub use collection::{CollectionBinding, CollectionState};
pub use document::{DocumentBinding, DocumentState};

use crate::db::SnapshotStream;
use crate::error::Result;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Scoped handle to an open subscription.
///
/// The cancel action runs exactly once: on the first call to
/// [`cancel`](Self::cancel) or on drop, whichever comes first.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Cancel the subscription. Returns false if it was already cancelled.
    pub fn cancel(&mut self) -> bool {
        match self.cancel.take() {
            Some(cancel) => {
                cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Pump `stream` into `state` until it ends or the binding moves on.
///
/// `generation` is bumped by the owner whenever it abandons this listener;
/// the check happens under the channel's write lock, so a superseded
/// listener can never write into the slot.
pub(crate) fn spawn_forwarder<S, U, F>(
    mut stream: SnapshotStream<S>,
    state: Arc<watch::Sender<U>>,
    generation: Arc<AtomicU64>,
    apply: F,
) -> Subscription
where
    S: Send + 'static,
    U: Send + Sync + 'static,
    F: Fn(&mut U, Result<S>) + Send + 'static,
{
    let owned = generation.load(Ordering::SeqCst);
    let task = tokio::spawn(async move {
        while let Some(next) = stream.next().await {
            let applied = state.send_if_modified(|slot| {
                if generation.load(Ordering::SeqCst) != owned {
                    return false;
                }
                apply(slot, next);
                true
            });
            if !applied && generation.load(Ordering::SeqCst) != owned {
                break;
            }
        }
    });
    Subscription::new(move || task.abort())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_cancel_runs_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut sub = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(sub.cancel());
        assert!(!sub.cancel());
        drop(sub);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_cancels() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        {
            let _sub = Subscription::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
