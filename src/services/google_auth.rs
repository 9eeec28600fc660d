// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth client and token lifecycle management.
//!
//! Handles:
//! - Authorization URL construction (offline access, consent prompt)
//! - Code-for-token exchange and userinfo lookup at callback time
//! - Proactive token refresh with a 5-minute expiry margin
//!
//! Every remote operation (YouTube or Drive) goes through
//! [`GoogleAuthService::valid_access_token`] first; a failure there means
//! the remote operation must be aborted.

use crate::db::Db;
use crate::error::AppError;
use crate::models::User;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Token lifetime Google is assumed to grant when the response omits
/// `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Per-user mutexes serializing token refresh operations.
pub type RefreshLocks = Arc<DashMap<i64, Arc<Mutex<()>>>>;

/// Low-level Google OAuth endpoints client.
#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    authorize_url: String,
    token_url: String,
    userinfo_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl OAuthClient {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            authorize_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    /// Point the token and userinfo endpoints somewhere else (tests).
    pub fn with_endpoints(mut self, token_url: String, userinfo_url: String) -> Self {
        self.token_url = token_url;
        self.userinfo_url = userinfo_url;
        self
    }

    /// Authorization URL requesting offline access to YouTube and Drive.
    pub fn authorize_url(&self, state: &str) -> String {
        let scopes = [
            "https://www.googleapis.com/auth/youtube.readonly",
            "https://www.googleapis.com/auth/userinfo.email",
            "https://www.googleapis.com/auth/userinfo.profile",
            "https://www.googleapis.com/auth/drive.file",
        ];
        format!(
            "{}?client_id={}&redirect_uri={}&scope={}&response_type=code\
             &access_type=offline&prompt=consent&include_granted_scopes=true&state={}",
            self.authorize_url,
            self.client_id,
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scopes.join(" ")),
            state
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::OAuth(format!("Token exchange request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Token exchange failed");
            return Err(AppError::OAuth(format!(
                "Token exchange failed with status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::OAuth(format!("Failed to parse token response: {}", e)))
    }

    /// Refresh an access token using the stored refresh token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::OAuth(format!("Token refresh request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Token refresh failed");
            return Err(AppError::OAuth(format!(
                "Token refresh failed with status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::OAuth(format!("Failed to parse refresh response: {}", e)))
    }

    /// Fetch the authenticated user's Google profile.
    pub async fn fetch_userinfo(&self, access_token: &str) -> Result<UserInfo, AppError> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::OAuth(format!("Userinfo request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::OAuth(format!(
                "Userinfo request failed with status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::OAuth(format!("Failed to parse userinfo: {}", e)))
    }
}

/// Token endpoint response. Google omits `refresh_token` on re-auth and
/// may omit `expires_in`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Google userinfo payload; every field is optional in practice.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
}

/// Result of handling the OAuth callback.
#[derive(Debug, Clone)]
pub struct OAuthOutcome {
    pub user: User,
    pub access_token: String,
}

/// High-level token lifecycle service shared by the YouTube and Drive
/// clients.
#[derive(Clone)]
pub struct GoogleAuthService {
    client: OAuthClient,
    db: Db,
    /// Per-user mutex to serialize token refresh operations.
    refresh_locks: RefreshLocks,
}

impl GoogleAuthService {
    pub fn new(client: OAuthClient, db: Db, refresh_locks: RefreshLocks) -> Self {
        Self {
            client,
            db,
            refresh_locks,
        }
    }

    /// Authorization URL for the login redirect.
    pub fn authorize_url(&self, state: &str) -> String {
        self.client.authorize_url(state)
    }

    /// Get a valid (non-expired) access token for the given user.
    ///
    /// Loads the stored credential and, if it expires within the 5-minute
    /// margin, refreshes it first. On refresh failure the stored credential
    /// is left untouched and the error propagates; callers must abort the
    /// remote operation.
    pub async fn valid_access_token(&self, user_id: i64) -> Result<String, AppError> {
        // Serialize refreshes per user so concurrent requests don't race
        // the token endpoint with the same refresh token.
        let lock = self
            .refresh_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let credential = self
            .db
            .get_credential(user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !credential.expires_within(Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)) {
            return Ok(credential.access_token);
        }

        tracing::info!(user_id, "Access token expiring soon, refreshing");

        let refresh_token = credential
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(AppError::InvalidToken)?;

        let refreshed = self.client.refresh_token(refresh_token).await?;

        let expires_at = expiry_from_lifetime(refreshed.expires_in);
        self.db
            .update_access_token(user_id, &refreshed.access_token, expires_at)
            .await?;

        tracing::info!(user_id, "Access token refreshed");
        Ok(refreshed.access_token)
    }

    /// Handle the OAuth callback: exchange the code, resolve the Google
    /// profile to a local user (creating one on first login), and store
    /// the credential.
    pub async fn handle_oauth_callback(&self, code: &str) -> Result<OAuthOutcome, AppError> {
        let tokens = self.client.exchange_code(code).await?;
        let info = self.client.fetch_userinfo(&tokens.access_token).await?;

        // Accounts that don't share an email still get a stable identity.
        let email = match (info.email, info.id) {
            (Some(email), _) if !email.is_empty() => email,
            (_, Some(id)) => format!("{}@vidboxd.user", id),
            _ => {
                return Err(AppError::OAuth(
                    "Userinfo carried neither email nor id".to_string(),
                ))
            }
        };

        let user = match self.db.find_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                let username = self.unique_username(&email).await?;
                self.db
                    .create_user(
                        &email,
                        &username,
                        info.given_name.as_deref(),
                        info.family_name.as_deref(),
                    )
                    .await?
            }
        };

        let expires_at = expiry_from_lifetime(tokens.expires_in);
        self.db
            .replace_credential(
                user.id,
                &tokens.access_token,
                tokens.refresh_token.as_deref(),
                expires_at,
            )
            .await?;
        self.db.touch_last_active(user.id).await?;

        tracing::info!(user_id = user.id, email = %user.email, "OAuth callback handled");

        Ok(OAuthOutcome {
            user,
            access_token: tokens.access_token,
        })
    }

    /// Derive a unique username from the email local part, suffixing a
    /// counter on collision.
    async fn unique_username(&self, email: &str) -> Result<String, AppError> {
        let base = email.split('@').next().unwrap_or(email).to_string();
        let mut candidate = base.clone();
        let mut counter = 1;
        while self.db.username_exists(&candidate).await? {
            candidate = format!("{}{}", base, counter);
            counter += 1;
        }
        Ok(candidate)
    }
}

/// Absolute expiry from a server-reported lifetime, defaulting to an hour.
fn expiry_from_lifetime(expires_in: Option<i64>) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS))
}
