// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth session and permission checks.
//!
//! A single resolver task follows the provider's identity stream, then the
//! signed-in user's profile document, then the profile's role document. It
//! is the only writer of the session state. Losing the identity replaces
//! the whole session with `Unauthenticated` in one step.

use crate::db::{collections, DocPath, Document, DocumentStore, SnapshotStream};
use crate::error::{AppError, Result};
use crate::models::{Role, User};
use crate::services::auth_provider::{AuthProvider, Identity};
use crate::services::mutations::Mutations;
use crate::services::validation::{
    friendly_auth_message, validate_email, validate_password, validate_password_match,
};
use futures_util::StreamExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const FAVORITES_FIELD: &str = "favoriteIds";

/// A fully resolved session.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub user: User,
    pub role: Option<Role>,
    permissions: BTreeSet<String>,
}

impl Session {
    pub fn new(identity: Identity, user: User, role: Option<Role>) -> Self {
        let permissions = user
            .permission_ids
            .iter()
            .chain(role.iter().flat_map(|r| r.permission_ids.iter()))
            .cloned()
            .collect();
        Self {
            identity,
            user,
            role,
            permissions,
        }
    }

    pub fn uid(&self) -> &str {
        &self.identity.uid
    }

    /// Union of the user's and the role's permission IDs.
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    pub fn has_permission(&self, id: &str) -> bool {
        self.permissions.contains(id)
    }

    pub fn is_admin(&self) -> bool {
        self.role.as_ref().is_some_and(|r| r.name == "admin")
    }
}

#[derive(Debug, Clone, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    /// Identity known, profile (and role, if any) still loading
    ResolvingProfile(Identity),
    Authenticated(Arc<Session>),
}

/// Coarse view of [`AuthState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Unauthenticated,
    ResolvingProfile,
    Authenticated,
    AuthenticatedNoRole,
}

impl AuthState {
    pub fn phase(&self) -> AuthPhase {
        match self {
            AuthState::Unauthenticated => AuthPhase::Unauthenticated,
            AuthState::ResolvingProfile(_) => AuthPhase::ResolvingProfile,
            AuthState::Authenticated(s) if s.role.is_some() => AuthPhase::Authenticated,
            AuthState::Authenticated(_) => AuthPhase::AuthenticatedNoRole,
        }
    }

    pub fn session(&self) -> Option<&Arc<Session>> {
        match self {
            AuthState::Authenticated(session) => Some(session),
            _ => None,
        }
    }
}

/// Process-wide auth context. Dropping it stops the resolver.
pub struct AuthSession {
    provider: Arc<dyn AuthProvider>,
    mutations: Mutations,
    state: watch::Receiver<AuthState>,
    resolver: JoinHandle<()>,
}

impl AuthSession {
    /// Start following `provider`'s identity.
    pub fn start(
        provider: Arc<dyn AuthProvider>,
        store: Arc<dyn DocumentStore>,
        mutations: Mutations,
    ) -> Self {
        let (tx, state) = watch::channel(AuthState::Unauthenticated);
        let identity = provider.identity();
        let resolver = tokio::spawn(run_resolver(identity, store, tx));
        Self {
            provider,
            mutations,
            state,
            resolver,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn phase(&self) -> AuthPhase {
        self.state.borrow().phase()
    }

    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.clone()
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.state.borrow().session().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.session().is_some_and(|s| s.is_admin())
    }

    pub fn has_permission(&self, id: &str) -> bool {
        self.session().is_some_and(|s| s.has_permission(id))
    }

    /// True if any of `ids` is granted. False for an empty list.
    pub fn has_any<I, S>(&self, ids: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self.session() {
            Some(session) => ids.into_iter().any(|id| session.has_permission(id.as_ref())),
            None => false,
        }
    }

    /// True if every one of `ids` is granted. An empty list only requires
    /// being signed in.
    pub fn has_all<I, S>(&self, ids: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self.session() {
            Some(session) => ids.into_iter().all(|id| session.has_permission(id.as_ref())),
            None => false,
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        validate_email(email)?;
        validate_password(password)?;
        self.provider
            .sign_in(email, password)
            .await
            .map_err(friendly)
    }

    /// Register, then create the user's profile document.
    pub async fn sign_up(&self, email: &str, password: &str, confirm: &str) -> Result<Identity> {
        validate_email(email)?;
        validate_password(password)?;
        validate_password_match(password, confirm)?;
        let identity = self
            .provider
            .sign_up(email, password)
            .await
            .map_err(friendly)?;
        self.create_profile(&identity).await?;
        Ok(identity)
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.provider.sign_out().await.map_err(friendly)
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<()> {
        validate_email(email)?;
        self.provider
            .send_password_reset(email)
            .await
            .map_err(friendly)
    }

    pub async fn verify_password_reset_code(&self, code: &str) -> Result<String> {
        if code.trim().is_empty() {
            return Err(AppError::Validation("Reset code is required.".to_string()));
        }
        self.provider
            .verify_password_reset_code(code)
            .await
            .map_err(friendly)
    }

    pub async fn confirm_password_reset(
        &self,
        code: &str,
        new_password: &str,
        confirm: &str,
    ) -> Result<()> {
        if code.trim().is_empty() {
            return Err(AppError::Validation("Reset code is required.".to_string()));
        }
        validate_password(new_password)?;
        validate_password_match(new_password, confirm)?;
        self.provider
            .confirm_password_reset(code, new_password)
            .await
            .map_err(friendly)
    }

    pub async fn send_email_verification(&self) -> Result<()> {
        self.provider
            .send_email_verification()
            .await
            .map_err(friendly)
    }

    /// Write a fresh profile document for `identity`.
    pub async fn create_profile(&self, identity: &Identity) -> Result<()> {
        let email = identity.email.as_deref().unwrap_or_default();
        let profile = User::new_profile(&identity.uid, email);
        self.mutations.set_entity(&identity.uid, &profile).await?;
        tracing::info!(uid = %identity.uid, "Created user profile");
        Ok(())
    }

    pub fn is_favorite(&self, item_id: &str) -> bool {
        self.session().is_some_and(|s| s.user.is_favorite(item_id))
    }

    pub async fn add_favorite(&self, item_id: &str) -> Result<()> {
        let path = self.profile_path()?;
        self.mutations
            .array_add(&path, FAVORITES_FIELD, item_id)
            .await
    }

    pub async fn remove_favorite(&self, item_id: &str) -> Result<()> {
        let path = self.profile_path()?;
        self.mutations
            .array_remove(&path, FAVORITES_FIELD, item_id)
            .await
    }

    /// Flip `item_id` in the favourites list; returns whether it is now a favourite.
    pub async fn toggle_favorite(&self, item_id: &str) -> Result<bool> {
        if self.is_favorite(item_id) {
            self.remove_favorite(item_id).await?;
            Ok(false)
        } else {
            self.add_favorite(item_id).await?;
            Ok(true)
        }
    }

    fn profile_path(&self) -> Result<String> {
        let session = self.session().ok_or(AppError::Unauthorized)?;
        Ok(format!("{}/{}", collections::USERS, session.uid()))
    }
}

impl Drop for AuthSession {
    fn drop(&mut self) {
        self.resolver.abort();
    }
}

fn friendly(e: AppError) -> AppError {
    match e {
        AppError::Auth(code) => AppError::Auth(friendly_auth_message(&code)),
        other => other,
    }
}

async fn run_resolver(
    mut identity_rx: watch::Receiver<Option<Identity>>,
    store: Arc<dyn DocumentStore>,
    state: watch::Sender<AuthState>,
) {
    loop {
        let identity = identity_rx.borrow_and_update().clone();
        match identity {
            None => {
                state.send_replace(AuthState::Unauthenticated);
            }
            Some(identity) => {
                tracing::debug!(uid = %identity.uid, "Resolving profile");
                tokio::select! {
                    // Returns only when the session failed closed
                    _ = follow_identity(identity, store.as_ref(), &state) => {}
                    changed = identity_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        continue;
                    }
                }
            }
        }
        if identity_rx.changed().await.is_err() {
            return;
        }
    }
}

type RoleListener = (String, SnapshotStream<Option<Document>>);

async fn next_role(role: &mut Option<RoleListener>) -> Option<Result<Option<Document>>> {
    match role {
        Some((_, stream)) => stream.next().await,
        None => std::future::pending().await,
    }
}

/// Follow the profile and role documents for one identity.
async fn follow_identity(
    identity: Identity,
    store: &dyn DocumentStore,
    state: &watch::Sender<AuthState>,
) {
    state.send_replace(AuthState::ResolvingProfile(identity.clone()));

    let mut profile = store.listen_document(DocPath::new(collections::USERS, &identity.uid));
    let mut role_listener: Option<RoleListener> = None;
    let mut user: Option<User> = None;
    let mut role: Option<Role> = None;
    let mut role_pending = false;

    loop {
        tokio::select! {
            next = profile.next() => {
                let next_user = match next {
                    Some(Ok(Some(doc))) => doc.decode::<User>(collections::USERS),
                    Some(Ok(None)) => {
                        // Not an error: sign-up creates the profile after the identity
                        tracing::warn!(uid = %identity.uid, "No profile document; waiting for one");
                        user = None;
                        role = None;
                        role_pending = false;
                        role_listener = None;
                        state.send_replace(AuthState::Unauthenticated);
                        continue;
                    }
                    Some(Err(e)) => Err(e),
                    None => Err(AppError::Database("profile listener closed".to_string())),
                };
                let next_user = match next_user {
                    Ok(u) => u,
                    Err(e) => {
                        tracing::error!(
                            uid = %identity.uid,
                            error = %e,
                            "Profile resolution failed; signing out locally"
                        );
                        state.send_replace(AuthState::Unauthenticated);
                        return;
                    }
                };

                let wanted = next_user.role_id.clone().filter(|id| !id.is_empty());
                let current = role_listener.as_ref().map(|(id, _)| id.clone());
                if wanted != current {
                    role = None;
                    role_pending = wanted.is_some();
                    role_listener = wanted.map(|id| {
                        let stream = store.listen_document(DocPath::new(collections::ROLES, &id));
                        (id, stream)
                    });
                }
                user = Some(next_user);
            }
            next = next_role(&mut role_listener) => {
                role_pending = false;
                match next {
                    Some(Ok(Some(doc))) => match doc.decode::<Role>(collections::ROLES) {
                        Ok(r) => role = Some(r),
                        Err(e) => {
                            tracing::warn!(
                                uid = %identity.uid,
                                error = %e,
                                "Role document unreadable"
                            );
                            role = None;
                        }
                    },
                    Some(Ok(None)) => {
                        tracing::warn!(uid = %identity.uid, "Role document missing");
                        role = None;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(uid = %identity.uid, error = %e, "Role resolution failed");
                        role = None;
                        // The listener is finished. Park on the same role ID so the
                        // next profile push doesn't reopen it.
                        if let Some((id, _)) = role_listener.take() {
                            role_listener = Some((id, futures_util::stream::pending().boxed()));
                        }
                    }
                    None => {
                        if let Some((id, _)) = role_listener.take() {
                            role_listener = Some((id, futures_util::stream::pending().boxed()));
                        }
                    }
                }
            }
        }

        if let (Some(user), false) = (&user, role_pending) {
            let session = Session::new(identity.clone(), user.clone(), role.clone());
            tracing::debug!(
                uid = %identity.uid,
                role = session.role.as_ref().map(|r| r.name.as_str()),
                permissions = session.permissions().len(),
                "Session resolved"
            );
            state.send_replace(AuthState::Authenticated(Arc::new(session)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            uid: "u1".into(),
            email: Some("jane@example.com".into()),
            email_verified: true,
            expires_at: None,
        }
    }

    #[test]
    fn test_permissions_are_deduplicated_union() {
        let user = User {
            permission_ids: vec!["read".into(), "write".into()],
            ..User::default()
        };
        let role = Role {
            id: "editor".into(),
            name: "editor".into(),
            permission_ids: vec!["write".into(), "publish".into()],
        };
        let session = Session::new(identity(), user, Some(role));
        let perms: Vec<&str> = session.permissions().iter().map(String::as_str).collect();
        assert_eq!(perms, vec!["publish", "read", "write"]);
        assert!(!session.is_admin());
    }

    #[test]
    fn test_phase_without_role() {
        let session = Session::new(identity(), User::default(), None);
        let state = AuthState::Authenticated(Arc::new(session));
        assert_eq!(state.phase(), AuthPhase::AuthenticatedNoRole);
        assert_eq!(AuthState::default().phase(), AuthPhase::Unauthenticated);
    }
}
