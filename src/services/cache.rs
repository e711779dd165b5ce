// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ephemeral entity cache.
//!
//! Keeps recently viewed entities so detail pages can render without a
//! fetch, plus a separate ID -> display name map used for "back" labels.
//! Entries go stale after the configured TTL; staleness is checked when an
//! entry is read and the entry is evicted then. There is no background
//! sweep. Names never expire.

use crate::time_utils::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Cached value with the time it was stored.
#[derive(Clone)]
struct CacheEntry<V> {
    value: V,
    cached_at: DateTime<Utc>,
}

/// Process-local cache. Clones share the same maps.
#[derive(Clone)]
pub struct EntityCache<V> {
    entries: Arc<DashMap<String, CacheEntry<V>>>,
    names: Arc<DashMap<String, String>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> EntityCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            names: Arc::new(DashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            clock,
        }
    }

    /// Store `value` under `id`, resetting its age.
    pub fn put(&self, id: &str, value: V) {
        self.entries.insert(
            id.to_string(),
            CacheEntry {
                value,
                cached_at: self.clock.now(),
            },
        );
    }

    /// Fresh value for `id`, evicting it if it has gone stale.
    pub fn get(&self, id: &str) -> Option<V> {
        let now = self.clock.now();
        let (value, cached_at) = {
            let entry = self.entries.get(id)?;
            (entry.value.clone(), entry.cached_at)
        };

        if now - cached_at > self.ttl {
            // Only evict if nobody re-put it in the meantime
            self.entries
                .remove_if(id, |_, entry| entry.cached_at == cached_at);
            tracing::trace!(id, "Cache entry expired");
            return None;
        }
        Some(value)
    }

    /// Remember the display name for `id`.
    pub fn put_name(&self, id: &str, name: &str) {
        self.names.insert(id.to_string(), name.to_string());
    }

    pub fn get_name(&self, id: &str) -> Option<String> {
        self.names.get(id).map(|name| name.clone())
    }

    /// Drop every entry and name.
    pub fn clear(&self) {
        self.entries.clear();
        self.names.clear();
    }

    /// Entries currently held, including stale ones not yet read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
