// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth authentication routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE};
use crate::services::SyncScope;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// How long a signed state parameter stays valid.
const STATE_MAX_AGE_MILLIS: u128 = 10 * 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/google", get(auth_start))
        .route("/auth/google/callback", get(auth_callback))
        .route("/auth/logout", get(logout))
}

/// Query parameters for starting the OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to redirect back to after OAuth completes.
    /// If not provided, uses the configured FRONTEND_URL.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Start OAuth flow - redirect to Google authorization.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
) -> Result<Redirect> {
    let frontend_url = params
        .redirect_uri
        .unwrap_or_else(|| state.config.frontend_url.clone());

    let oauth_state = sign_state(&frontend_url, &state.config.oauth_state_key)?;
    let auth_url = state.auth_service.authorize_url(&oauth_state);

    tracing::info!(frontend_url = %frontend_url, "Starting OAuth flow, redirecting to Google");
    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, create a session, run the
/// initial sync, and send the browser back to the frontend.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    let frontend_url = params
        .state
        .as_deref()
        .and_then(|s| verify_and_decode_state(s, &state.config.oauth_state_key))
        .unwrap_or_else(|| {
            tracing::warn!("Invalid or missing state parameter, using default frontend URL");
            state.config.frontend_url.clone()
        });

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth flow denied");
        return Ok((
            jar,
            Redirect::temporary(&format!(
                "{}?error={}",
                frontend_url,
                urlencoding::encode(&error)
            )),
        ));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let outcome = state.auth_service.handle_oauth_callback(&code).await?;

    let token = create_jwt(outcome.user.id, &state.config.jwt_signing_key)?;
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(30))
        .build();
    let jar = jar.add(cookie);

    // First sync happens at login so the dashboard has data to show.
    let report = state.sync.sync_user(outcome.user.id, SyncScope::All).await;
    if !report.succeeded() {
        tracing::warn!(user_id = outcome.user.id, report = ?report, "Initial sync incomplete");
    }

    Ok((jar, Redirect::temporary(&frontend_url)))
}

/// Clear the session cookie. OAuth tokens stay in the store so a later
/// login keeps its sync history.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/").build());
    (jar, Redirect::temporary(&state.config.frontend_url))
}

/// Sign `frontend_url` into a tamper-evident state parameter:
/// base64url("url|timestamp_hex|hmac_hex").
fn sign_state(frontend_url: &str, key: &[u8]) -> Result<String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    let payload = format!("{}|{:x}", frontend_url, timestamp);

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Verify a state parameter and return the frontend URL it carries.
/// Returns None on any tampering, malformed input, or expiry.
fn verify_and_decode_state(state: &str, key: &[u8]) -> Option<String> {
    let decoded = URL_SAFE_NO_PAD.decode(state.as_bytes()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    // Split off the signature; the URL itself may contain '|' so split
    // from the right.
    let (payload, signature_hex) = decoded.rsplit_once('|')?;

    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());
    if expected != signature_hex {
        return None;
    }

    let (frontend_url, timestamp_hex) = payload.rsplit_once('|')?;
    let timestamp = u128::from_str_radix(timestamp_hex, 16).ok()?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()?
        .as_millis();
    if now.saturating_sub(timestamp) > STATE_MAX_AGE_MILLIS {
        return None;
    }

    Some(frontend_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"test_oauth_state_key";

    #[test]
    fn test_state_round_trip() {
        let state = sign_state("http://localhost:5173", KEY).unwrap();
        assert_eq!(
            verify_and_decode_state(&state, KEY).as_deref(),
            Some("http://localhost:5173")
        );
    }

    #[test]
    fn test_tampered_state_is_rejected() {
        let state = sign_state("http://localhost:5173", KEY).unwrap();
        let decoded = URL_SAFE_NO_PAD.decode(state.as_bytes()).unwrap();
        let tampered = String::from_utf8(decoded)
            .unwrap()
            .replace("localhost", "evil.example");
        let tampered = URL_SAFE_NO_PAD.encode(tampered.as_bytes());

        assert!(verify_and_decode_state(&tampered, KEY).is_none());
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let state = sign_state("http://localhost:5173", KEY).unwrap();
        assert!(verify_and_decode_state(&state, b"some_other_key").is_none());
    }

    #[test]
    fn test_garbage_state_is_rejected() {
        assert!(verify_and_decode_state("not-base64!!!", KEY).is_none());
        assert!(verify_and_decode_state("", KEY).is_none());
    }
}
