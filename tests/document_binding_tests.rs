// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live document binding behaviour against the in-memory store.

mod common;

use common::{eventually, settle, test_context, wait_until};
use directory_data::db::collections;
use directory_data::error::AppError;
use directory_data::fields;
use directory_data::models::{Company, Person};

#[tokio::test]
async fn test_missing_document_settles_as_not_found() {
    let (ctx, _store) = test_context();

    let binding = ctx.document::<Company>("company/123");
    assert!(binding.state().loading);

    let state = binding.settled().await;
    assert!(state.item.is_none());
    assert!(!state.exists);
    assert!(!state.loading);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_document_follows_updates_and_delete() {
    let (ctx, _store) = test_context();
    let mutations = ctx.mutations();
    mutations
        .set("company/c1", &fields! { "name" => "Acme", "isActive" => true })
        .await
        .unwrap();

    let binding = ctx.entity::<Company>(Some("c1"));
    let state = binding.settled().await;
    assert!(state.exists);
    let company = state.item.unwrap();
    assert_eq!(company.id, "c1");
    assert_eq!(company.name, "Acme");
    assert!(company.created_on.is_some());

    let mut rx = binding.watch();
    mutations
        .update("company/c1", &fields! { "name" => "Acme Rockets" })
        .await
        .unwrap();
    let state = wait_until(&mut rx, |s| {
        s.item.as_ref().is_some_and(|c| c.name == "Acme Rockets")
    })
    .await;
    assert!(state.exists);

    mutations.delete("company/c1").await.unwrap();
    let state = wait_until(&mut rx, |s| !s.exists).await;
    assert!(state.item.is_none());
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_empty_path_is_disabled() {
    let (ctx, store) = test_context();

    let binding = ctx.document::<Company>("");
    settle().await;

    let state = binding.state();
    assert!(state.item.is_none());
    assert!(!state.loading);
    assert!(state.error.is_none());
    assert!(!binding.is_subscribed());
    assert_eq!(store.active_listeners(), 0);

    let none = ctx.entity::<Person>(None);
    assert!(!none.is_subscribed());
    assert!(!none.state().loading);
}

#[tokio::test]
async fn test_malformed_path_reports_error_without_store_access() {
    let (ctx, store) = test_context();

    let binding = ctx.document::<Company>("company");
    let state = binding.state();
    assert!(!state.loading);
    assert!(matches!(
        state.error.as_deref(),
        Some(AppError::InvalidArgument(_))
    ));
    assert_eq!(store.active_listeners(), 0);
    assert_eq!(store.snapshots_delivered(), 0);
}

#[tokio::test]
async fn test_error_keeps_last_item() {
    let (ctx, store) = test_context();
    ctx.mutations()
        .set("contact/p1", &fields! { "firstName" => "Ada", "isActive" => true })
        .await
        .unwrap();

    let binding = ctx.entity::<Person>(Some("p1"));
    binding.settled().await;

    let mut rx = binding.watch();
    store.fail_collection(collections::CONTACTS, "missing or insufficient permissions");
    let state = wait_until(&mut rx, |s| s.error.is_some()).await;

    assert!(state.exists);
    assert_eq!(state.item.map(|p| p.first_name), Some("Ada".to_string()));
    assert!(matches!(
        state.error.as_deref(),
        Some(AppError::PermissionDenied(_))
    ));
}

#[tokio::test]
async fn test_changing_path_resets_state() {
    let (ctx, store) = test_context();
    let mutations = ctx.mutations();
    mutations
        .set("company/c1", &fields! { "name" => "Acme" })
        .await
        .unwrap();
    mutations
        .set("company/c2", &fields! { "name" => "Bravo" })
        .await
        .unwrap();

    let mut binding = ctx.document::<Company>("company/c1");
    binding.settled().await;

    binding.bind_path("company/c2", true);
    let state = binding.state();
    assert!(state.item.is_none());
    assert!(state.loading);

    let state = binding.settled().await;
    assert_eq!(state.item.map(|c| c.name), Some("Bravo".to_string()));
    eventually(|| store.active_listeners() == 1).await;

    binding.cancel();
    binding.cancel();
    eventually(|| store.active_listeners() == 0).await;
}
