// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API authentication tests: protected routes reject missing or bad
//! session tokens and accept the cookie and Bearer forms.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::*;
use tower::ServiceExt;
use vidboxd::middleware::auth::{create_jwt, SESSION_COOKIE};

async fn request(app: axum::Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health_is_public() {
    let db = test_db().await;
    let base = spawn_server(axum::Router::new()).await;
    let (app, _) = create_test_app(&db, &base);

    let (status, body) = request(
        app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_protected_route_without_token_is_unauthorized() {
    let db = test_db().await;
    let base = spawn_server(axum::Router::new()).await;
    let (app, _) = create_test_app(&db, &base);

    let (status, _) = request(
        app,
        Request::builder().uri("/api/me").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_bearer_token() {
    let db = test_db().await;
    let user_id = seed_user(&db).await;
    let base = spawn_server(axum::Router::new()).await;
    let (app, state) = create_test_app(&db, &base);

    let token = create_jwt(user_id, &state.config.jwt_signing_key).unwrap();
    let (status, body) = request(
        app,
        Request::builder()
            .uri("/api/me")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "tester@example.com");
    assert_eq!(body["username"], "tester");
}

#[tokio::test]
async fn test_protected_route_with_session_cookie() {
    let db = test_db().await;
    let user_id = seed_user(&db).await;
    let base = spawn_server(axum::Router::new()).await;
    let (app, state) = create_test_app(&db, &base);

    let token = create_jwt(user_id, &state.config.jwt_signing_key).unwrap();
    let (status, body) = request(
        app,
        Request::builder()
            .uri("/api/me")
            .header(header::COOKIE, format!("{}={}", SESSION_COOKIE, token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "tester");
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let db = test_db().await;
    let base = spawn_server(axum::Router::new()).await;
    let (app, _) = create_test_app(&db, &base);

    let (status, _) = request(
        app,
        Request::builder()
            .uri("/api/me")
            .header(header::AUTHORIZATION, "Bearer not.a.jwt")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_another_key_is_rejected() {
    let db = test_db().await;
    let user_id = seed_user(&db).await;
    let base = spawn_server(axum::Router::new()).await;
    let (app, _) = create_test_app(&db, &base);

    let token = create_jwt(user_id, b"a_completely_different_signing_key").unwrap();
    let (status, _) = request(
        app,
        Request::builder()
            .uri("/api/me")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
