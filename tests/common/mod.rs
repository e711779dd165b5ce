// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use directory_data::config::Config;
use directory_data::db::{FirestoreDb, MemoryStore};
use directory_data::time_utils::ManualClock;
use directory_data::DirectoryContext;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project", Duration::from_millis(200))
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Context backed by an in-memory store. Returns the store handle too so
/// tests can inject faults and count listeners.
#[allow(dead_code)]
pub fn test_context() -> (DirectoryContext, MemoryStore) {
    let store = MemoryStore::new();
    let ctx = DirectoryContext::new(Config::test_default(), Arc::new(store.clone()));
    (ctx, store)
}

/// Same as [`test_context`] but server timestamps come from `clock`.
#[allow(dead_code)]
pub fn test_context_with_clock(clock: ManualClock) -> (DirectoryContext, MemoryStore) {
    let store = MemoryStore::with_clock(Arc::new(clock));
    let ctx = DirectoryContext::new(Config::test_default(), Arc::new(store.clone()));
    (ctx, store)
}

/// Wait (bounded) until the watched value satisfies `pred`.
#[allow(dead_code)]
pub async fn wait_until<T: Clone>(
    rx: &mut watch::Receiver<T>,
    pred: impl FnMut(&T) -> bool,
) -> T {
    let value = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
        .await
        .expect("timed out waiting for state")
        .expect("state channel closed");
    (*value).clone()
}

/// Poll `check` until it holds, yielding to spawned tasks in between.
#[allow(dead_code)]
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

/// Give spawned listeners a chance to run.
#[allow(dead_code)]
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}
