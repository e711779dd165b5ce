// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity providers.
//!
//! [`FirebaseAuthClient`] talks to the Firebase Auth REST API.
//! [`MemoryAuthProvider`] keeps accounts in-process for offline use and tests.

use crate::db::generate_document_id;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

const DEFAULT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// The signed-in account as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    /// Expiry of the current ID token, when known
    pub expires_at: Option<DateTime<Utc>>,
}

/// Email/password identity provider.
///
/// `identity()` is the provider's auth-state stream: `None` while signed
/// out, `Some` after a successful sign-in or sign-up.
#[async_trait]
pub trait AuthProvider: Send + Sync + 'static {
    fn identity(&self) -> watch::Receiver<Option<Identity>>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity>;

    async fn sign_out(&self) -> Result<()>;

    async fn send_password_reset(&self, email: &str) -> Result<()>;

    /// Check a reset code; returns the account email it belongs to.
    async fn verify_password_reset_code(&self, code: &str) -> Result<String>;

    async fn confirm_password_reset(&self, code: &str, new_password: &str) -> Result<()>;

    /// Send a verification email to the signed-in account.
    async fn send_email_verification(&self) -> Result<()>;
}

/// Claims we read from a Firebase ID token.
#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    exp: Option<i64>,
}

/// Read identity claims from an ID token without verifying its signature.
///
/// The token comes straight from the provider over TLS and is only used to
/// populate local state; anything server-side must verify it properly.
pub fn identity_from_id_token(token: &str) -> Result<Identity> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<IdTokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| AppError::Auth(format!("Malformed ID token: {e}")))?;

    Ok(Identity {
        uid: data.claims.sub,
        email: data.claims.email,
        email_verified: data.claims.email_verified,
        expires_at: data
            .claims
            .exp
            .and_then(|exp| DateTime::<Utc>::from_timestamp(exp, 0)),
    })
}

/// Firebase Auth REST client.
pub struct FirebaseAuthClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    id_token: Mutex<Option<String>>,
    identity: watch::Sender<Option<Identity>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    id_token: String,
}

#[derive(Deserialize)]
struct ResetCodeResponse {
    email: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl FirebaseAuthClient {
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point at a different endpoint, e.g. the Auth emulator.
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client: {e}")))?;
        let (identity, _) = watch::channel(None);
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            id_token: Mutex::new(None),
            identity,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/accounts:{}", self.base_url, method)
    }

    async fn post<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .http
            .post(self.endpoint(method))
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Auth(format!("{method} request failed: {e}")))?;

        self.check_response_json(response).await
    }

    /// Check response status and parse the JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            // Error codes come back as {"error": {"message": "EMAIL_EXISTS"}}
            if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
                return Err(AppError::Auth(envelope.error.message));
            }
            return Err(AppError::Auth(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("JSON parse error: {}", e)))
    }

    async fn establish(&self, token: TokenResponse) -> Result<Identity> {
        let identity = identity_from_id_token(&token.id_token)?;
        *self.id_token.lock().await = Some(token.id_token);
        self.identity.send_replace(Some(identity.clone()));
        tracing::info!(uid = %identity.uid, "Signed in");
        Ok(identity)
    }
}

#[async_trait]
impl AuthProvider for FirebaseAuthClient {
    fn identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        let request = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let token = self.post("signInWithPassword", &request).await?;
        self.establish(token).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity> {
        let request = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let token = self.post("signUp", &request).await?;
        self.establish(token).await
    }

    async fn sign_out(&self) -> Result<()> {
        *self.id_token.lock().await = None;
        self.identity.send_replace(None);
        tracing::info!("Signed out");
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<()> {
        let body = serde_json::json!({ "requestType": "PASSWORD_RESET", "email": email });
        let _: serde_json::Value = self.post("sendOobCode", &body).await?;
        Ok(())
    }

    async fn verify_password_reset_code(&self, code: &str) -> Result<String> {
        let body = serde_json::json!({ "oobCode": code });
        let response: ResetCodeResponse = self.post("resetPassword", &body).await?;
        Ok(response.email)
    }

    async fn confirm_password_reset(&self, code: &str, new_password: &str) -> Result<()> {
        let body = serde_json::json!({ "oobCode": code, "newPassword": new_password });
        let _: serde_json::Value = self.post("resetPassword", &body).await?;
        Ok(())
    }

    async fn send_email_verification(&self) -> Result<()> {
        let token = self.id_token.lock().await.clone().ok_or(AppError::Unauthorized)?;
        let body = serde_json::json!({ "requestType": "VERIFY_EMAIL", "idToken": token });
        let _: serde_json::Value = self.post("sendOobCode", &body).await?;
        Ok(())
    }
}

#[derive(Clone)]
struct Account {
    uid: String,
    password: String,
    email_verified: bool,
}

/// In-process identity provider.
///
/// Errors use the same codes as the REST API so callers can share
/// message mapping. Reset codes are kept for inspection instead of mailed.
#[derive(Clone)]
pub struct MemoryAuthProvider {
    inner: Arc<MemoryAuthInner>,
}

struct MemoryAuthInner {
    accounts: DashMap<String, Account>,
    reset_codes: DashMap<String, String>,
    verification_emails: AtomicUsize,
    identity: watch::Sender<Option<Identity>>,
}

impl Default for MemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuthProvider {
    pub fn new() -> Self {
        let (identity, _) = watch::channel(None);
        Self {
            inner: Arc::new(MemoryAuthInner {
                accounts: DashMap::new(),
                reset_codes: DashMap::new(),
                verification_emails: AtomicUsize::new(0),
                identity,
            }),
        }
    }

    /// Register an account directly; returns its UID.
    pub fn add_account(&self, email: &str, password: &str) -> Result<String> {
        let uid = generate_document_id()?;
        self.inner.accounts.insert(
            email.to_string(),
            Account {
                uid: uid.clone(),
                password: password.to_string(),
                email_verified: false,
            },
        );
        Ok(uid)
    }

    /// Most recent reset code issued for `email`.
    pub fn reset_code_for(&self, email: &str) -> Option<String> {
        self.inner
            .reset_codes
            .iter()
            .find(|entry| entry.value() == email)
            .map(|entry| entry.key().clone())
    }

    pub fn verification_emails_sent(&self) -> usize {
        self.inner.verification_emails.load(Ordering::SeqCst)
    }

    /// Push an identity change as if it came from outside (token refresh,
    /// another tab signing out).
    pub fn set_identity(&self, identity: Option<Identity>) {
        self.inner.identity.send_replace(identity);
    }

    fn identity_for(email: &str, account: &Account) -> Identity {
        Identity {
            uid: account.uid.clone(),
            email: Some(email.to_string()),
            email_verified: account.email_verified,
            expires_at: None,
        }
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    fn identity(&self) -> watch::Receiver<Option<Identity>> {
        self.inner.identity.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        let identity = match self.inner.accounts.get(email) {
            Some(account) if account.password == password => Self::identity_for(email, &account),
            _ => return Err(AppError::Auth("INVALID_LOGIN_CREDENTIALS".to_string())),
        };
        self.inner.identity.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity> {
        if self.inner.accounts.contains_key(email) {
            return Err(AppError::Auth("EMAIL_EXISTS".to_string()));
        }
        self.add_account(email, password)?;
        self.sign_in(email, password).await
    }

    async fn sign_out(&self) -> Result<()> {
        self.inner.identity.send_replace(None);
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<()> {
        if !self.inner.accounts.contains_key(email) {
            return Err(AppError::Auth("EMAIL_NOT_FOUND".to_string()));
        }
        let code = generate_document_id()?;
        self.inner.reset_codes.insert(code, email.to_string());
        Ok(())
    }

    async fn verify_password_reset_code(&self, code: &str) -> Result<String> {
        self.inner
            .reset_codes
            .get(code)
            .map(|email| email.clone())
            .ok_or_else(|| AppError::Auth("INVALID_OOB_CODE".to_string()))
    }

    async fn confirm_password_reset(&self, code: &str, new_password: &str) -> Result<()> {
        let (_, email) = self
            .inner
            .reset_codes
            .remove(code)
            .ok_or_else(|| AppError::Auth("INVALID_OOB_CODE".to_string()))?;
        match self.inner.accounts.get_mut(&email) {
            Some(mut account) => {
                account.password = new_password.to_string();
                Ok(())
            }
            None => Err(AppError::Auth("EMAIL_NOT_FOUND".to_string())),
        }
    }

    async fn send_email_verification(&self) -> Result<()> {
        if self.inner.identity.borrow().is_none() {
            return Err(AppError::Unauthorized);
        }
        self.inner.verification_emails.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
