// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth session resolution, permission checks and account flows.

mod common;

use common::{settle, test_context, wait_until};
use directory_data::db::{collections, DocPath, Value};
use directory_data::error::AppError;
use directory_data::fields;
use directory_data::services::{AuthPhase, AuthProvider, AuthSession, MemoryAuthProvider};
use directory_data::DirectoryContext;
use std::sync::Arc;

const EMAIL: &str = "jane@example.com";
const PASSWORD: &str = "hunter22";

struct Harness {
    ctx: DirectoryContext,
    store: directory_data::db::MemoryStore,
    provider: MemoryAuthProvider,
    auth: AuthSession,
    uid: String,
}

/// Account with a profile document; `role_id` is written as given.
async fn harness(role_id: Option<&str>) -> Harness {
    let (ctx, store) = test_context();
    let provider = MemoryAuthProvider::new();
    let uid = provider.add_account(EMAIL, PASSWORD).unwrap();

    let mutations = ctx.mutations();
    mutations
        .set(
            "role/editor",
            &fields! { "name" => "editor", "permissionIds" => vec!["read", "write"] },
        )
        .await
        .unwrap();
    mutations
        .set(
            "role/admin",
            &fields! { "name" => "admin", "permissionIds" => vec!["read", "write", "delete"] },
        )
        .await
        .unwrap();

    let mut profile = fields! {
        "email" => EMAIL,
        "isActive" => true,
        "permissionIds" => vec!["comment", "read"],
    };
    if let Some(role_id) = role_id {
        profile.insert("roleId".to_string(), Value::from(role_id));
    }
    mutations
        .set(&format!("{}/{}", collections::USERS, uid), &profile)
        .await
        .unwrap();

    let auth = ctx.auth_session(Arc::new(provider.clone()));
    Harness {
        ctx,
        store,
        provider,
        auth,
        uid,
    }
}

async fn wait_phase(auth: &AuthSession, phase: AuthPhase) {
    let mut rx = auth.watch();
    wait_until(&mut rx, |s| s.phase() == phase).await;
}

#[tokio::test]
async fn test_sign_in_resolves_profile_and_role() {
    let h = harness(Some("editor")).await;
    assert_eq!(h.auth.phase(), AuthPhase::Unauthenticated);

    let identity = h.auth.sign_in(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(identity.uid, h.uid);
    wait_phase(&h.auth, AuthPhase::Authenticated).await;

    let session = h.auth.session().unwrap();
    assert_eq!(session.uid(), h.uid);
    assert_eq!(session.user.id, h.uid);
    assert_eq!(session.role.as_ref().map(|r| r.name.as_str()), Some("editor"));
    let permissions: Vec<_> = session.permissions().iter().map(String::as_str).collect();
    assert_eq!(permissions, vec!["comment", "read", "write"]);
    assert!(h.auth.is_authenticated());
    assert!(!h.auth.is_admin());
}

#[tokio::test]
async fn test_permission_checks_ignore_order() {
    let h = harness(Some("editor")).await;
    h.auth.sign_in(EMAIL, PASSWORD).await.unwrap();
    wait_phase(&h.auth, AuthPhase::Authenticated).await;

    assert!(h.auth.has_permission("write"));
    assert!(!h.auth.has_permission("delete"));
    assert!(h.auth.has_any(["delete", "comment"]));
    assert!(h.auth.has_any(["comment", "delete"]));
    assert!(!h.auth.has_any(["delete"]));
    assert!(h.auth.has_all(["write", "comment"]));
    assert!(h.auth.has_all(["comment", "write"]));
    assert!(!h.auth.has_all(["comment", "delete"]));
    assert!(h.auth.has_all(Vec::<String>::new()));
    assert!(!h.auth.has_any(Vec::<String>::new()));
}

#[tokio::test]
async fn test_signed_out_has_no_permissions() {
    let h = harness(Some("editor")).await;
    h.auth.sign_in(EMAIL, PASSWORD).await.unwrap();
    wait_phase(&h.auth, AuthPhase::Authenticated).await;

    h.auth.sign_out().await.unwrap();
    wait_phase(&h.auth, AuthPhase::Unauthenticated).await;

    assert!(h.auth.session().is_none());
    assert!(!h.auth.has_permission("read"));
    assert!(!h.auth.has_any(["read"]));
    assert!(!h.auth.has_all(Vec::<&str>::new()));
}

#[tokio::test]
async fn test_profile_without_role() {
    let h = harness(None).await;
    h.auth.sign_in(EMAIL, PASSWORD).await.unwrap();
    wait_phase(&h.auth, AuthPhase::AuthenticatedNoRole).await;

    let session = h.auth.session().unwrap();
    assert!(session.role.is_none());
    assert!(h.auth.has_all(["comment", "read"]));
    assert!(!h.auth.has_permission("write"));
}

#[tokio::test]
async fn test_missing_role_document_yields_no_role() {
    let h = harness(Some("ghost")).await;
    h.auth.sign_in(EMAIL, PASSWORD).await.unwrap();
    wait_phase(&h.auth, AuthPhase::AuthenticatedNoRole).await;
    assert!(h.auth.has_permission("comment"));
}

#[tokio::test]
async fn test_role_read_failure_yields_no_role() {
    let h = harness(Some("editor")).await;
    h.store
        .fail_collection(collections::ROLES, "missing or insufficient permissions");

    h.auth.sign_in(EMAIL, PASSWORD).await.unwrap();
    wait_phase(&h.auth, AuthPhase::AuthenticatedNoRole).await;
    assert!(!h.auth.has_permission("write"));
}

#[tokio::test]
async fn test_session_follows_role_changes() {
    let h = harness(Some("editor")).await;
    h.auth.sign_in(EMAIL, PASSWORD).await.unwrap();
    wait_phase(&h.auth, AuthPhase::Authenticated).await;
    assert!(!h.auth.is_admin());

    let mutations = h.ctx.mutations();
    let profile = format!("{}/{}", collections::USERS, h.uid);
    mutations
        .update(&profile, &fields! { "roleId" => "admin" })
        .await
        .unwrap();

    let mut rx = h.auth.watch();
    wait_until(&mut rx, |s| s.session().is_some_and(|s| s.is_admin())).await;
    assert!(h.auth.has_permission("delete"));

    // Edits to the role document itself flow through too
    mutations
        .update("role/admin", &fields! { "permissionIds" => vec!["read"] })
        .await
        .unwrap();
    wait_until(&mut rx, |s| {
        s.session().is_some_and(|s| !s.has_permission("delete"))
    })
    .await;
    assert!(h.auth.has_all(["read", "comment"]));
}

#[tokio::test]
async fn test_profile_failure_signs_out_locally() {
    let h = harness(Some("editor")).await;
    h.store
        .fail_collection(collections::USERS, "missing or insufficient permissions");

    h.auth.sign_in(EMAIL, PASSWORD).await.unwrap();
    settle().await;
    assert_eq!(h.auth.phase(), AuthPhase::Unauthenticated);

    // Stays signed out until the identity changes again
    h.store.clear_fault(collections::USERS);
    settle().await;
    assert_eq!(h.auth.phase(), AuthPhase::Unauthenticated);

    h.auth.sign_in(EMAIL, PASSWORD).await.unwrap();
    wait_phase(&h.auth, AuthPhase::Authenticated).await;
}

#[tokio::test]
async fn test_external_sign_out_clears_session() {
    let h = harness(Some("editor")).await;
    h.auth.sign_in(EMAIL, PASSWORD).await.unwrap();
    wait_phase(&h.auth, AuthPhase::Authenticated).await;

    h.provider.set_identity(None);
    wait_phase(&h.auth, AuthPhase::Unauthenticated).await;
    assert!(!h.auth.is_authenticated());
}

#[tokio::test]
async fn test_sign_up_creates_profile() {
    let (ctx, store) = test_context();
    let provider = MemoryAuthProvider::new();
    let auth = ctx.auth_session(Arc::new(provider.clone()));

    let identity = auth
        .sign_up("new@example.com", "secret1", "secret1")
        .await
        .unwrap();
    wait_phase(&auth, AuthPhase::AuthenticatedNoRole).await;

    let body = store
        .peek(&DocPath::new(collections::USERS, &identity.uid))
        .unwrap();
    assert_eq!(body.get("email"), Some(&Value::from("new@example.com")));
    assert_eq!(body.get("isActive"), Some(&Value::Bool(true)));
    assert!(body.get("createdOn").is_some());

    let err = auth
        .sign_up("new@example.com", "secret1", "secret1")
        .await
        .unwrap_err();
    match err {
        AppError::Auth(message) => {
            assert_eq!(message, "An account with this email already exists.")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_input_never_reaches_provider() {
    let (ctx, store) = test_context();
    let provider = MemoryAuthProvider::new();
    let auth = ctx.auth_session(Arc::new(provider.clone()));

    let err = auth.sign_in("not-an-email", "secret1").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    let err = auth.sign_in(EMAIL, "").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = auth
        .sign_up("new@example.com", "secret1", "secret2")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    let err = auth
        .sign_up("new@example.com", "abc", "abc")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert!(provider.identity().borrow().is_none());
    assert!(store.is_empty(collections::USERS));
}

#[tokio::test]
async fn test_wrong_password_gets_friendly_message() {
    let h = harness(None).await;
    let err = h.auth.sign_in(EMAIL, "wrong-password").await.unwrap_err();
    match err {
        AppError::Auth(message) => assert_eq!(
            message,
            "The password is invalid or the user does not exist."
        ),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.auth.phase(), AuthPhase::Unauthenticated);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let h = harness(None).await;

    h.auth.send_password_reset(EMAIL).await.unwrap();
    let code = h.provider.reset_code_for(EMAIL).unwrap();
    assert_eq!(h.auth.verify_password_reset_code(&code).await.unwrap(), EMAIL);

    let err = h
        .auth
        .confirm_password_reset(&code, "newpass1", "newpass2")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    h.auth
        .confirm_password_reset(&code, "newpass1", "newpass1")
        .await
        .unwrap();
    assert!(h.auth.sign_in(EMAIL, PASSWORD).await.is_err());
    h.auth.sign_in(EMAIL, "newpass1").await.unwrap();

    // Codes are single use
    let err = h.auth.verify_password_reset_code(&code).await.unwrap_err();
    assert!(matches!(err, AppError::Auth(_)));
    let err = h.auth.verify_password_reset_code("  ").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_email_verification_requires_identity() {
    let h = harness(None).await;
    assert!(h.auth.send_email_verification().await.is_err());

    h.auth.sign_in(EMAIL, PASSWORD).await.unwrap();
    h.auth.send_email_verification().await.unwrap();
    assert_eq!(h.provider.verification_emails_sent(), 1);
}

#[tokio::test]
async fn test_favorites_toggle() {
    let h = harness(None).await;
    let err = h.auth.add_favorite("c1").await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));

    h.auth.sign_in(EMAIL, PASSWORD).await.unwrap();
    wait_phase(&h.auth, AuthPhase::AuthenticatedNoRole).await;
    assert!(!h.auth.is_favorite("c1"));

    let mut rx = h.auth.watch();
    assert!(h.auth.toggle_favorite("c1").await.unwrap());
    wait_until(&mut rx, |s| {
        s.session().is_some_and(|s| s.user.is_favorite("c1"))
    })
    .await;
    assert!(h.auth.is_favorite("c1"));

    assert!(!h.auth.toggle_favorite("c1").await.unwrap());
    wait_until(&mut rx, |s| {
        s.session().is_some_and(|s| !s.user.is_favorite("c1"))
    })
    .await;

    let body = h
        .store
        .peek(&DocPath::new(collections::USERS, &h.uid))
        .unwrap();
    assert_eq!(body.get("favoriteIds"), Some(&Value::Array(Vec::new())));
}
