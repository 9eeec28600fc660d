// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API validation and tag-layer tests over the full router.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use chrono::{Duration, Utc};
use common::*;
use serde_json::{json, Value};
use tower::ServiceExt;
use vidboxd::db::{Db, VideoMark};
use vidboxd::middleware::auth::create_jwt;

struct TestApi {
    app: axum::Router,
    token: String,
}

impl TestApi {
    async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token));
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}

async fn api_for_seeded_user(db: &Db) -> (TestApi, i64) {
    let user_id = seed_user(db).await;
    seed_credential(db, user_id, Utc::now() + Duration::hours(1)).await;

    let base = spawn_server(axum::Router::new()).await;
    let (app, state) = create_test_app(db, &base);
    let token = create_jwt(user_id, &state.config.jwt_signing_key).unwrap();

    (TestApi { app, token }, user_id)
}

#[tokio::test]
async fn test_tag_name_must_not_be_empty() {
    let db = test_db().await;
    let (api, _) = api_for_seeded_user(&db).await;

    let (status, body) = api
        .request(Method::POST, "/api/tags", Some(json!({"name": ""})))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, _) = api
        .request(Method::POST, "/api/tags", Some(json!({"name": "   "})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tag_create_list_delete() {
    let db = test_db().await;
    let (api, _) = api_for_seeded_user(&db).await;

    let (status, tag) = api
        .request(Method::POST, "/api/tags", Some(json!({"name": "rust"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tag["name"], "rust");

    // Creating the same name again returns the existing tag.
    let (_, again) = api
        .request(Method::POST, "/api/tags", Some(json!({"name": "rust"})))
        .await;
    assert_eq!(again["id"], tag["id"]);

    let (status, tags) = api.request(Method::GET, "/api/tags", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tags.as_array().unwrap().len(), 1);

    let (status, _) = api
        .request(
            Method::DELETE,
            &format!("/api/tags/{}", tag["id"]),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, tags) = api.request(Method::GET, "/api/tags", None).await;
    assert!(tags.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_category_filter_is_rejected() {
    let db = test_db().await;
    let (api, _) = api_for_seeded_user(&db).await;

    let (status, _) = api
        .request(Method::GET, "/api/videos?category=bogus", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_category_filter_selects_flagged_videos() {
    let db = test_db().await;
    let (api, user_id) = api_for_seeded_user(&db).await;

    db.upsert_remote_video(user_id, &remote_video("A"), VideoMark::Liked)
        .await
        .unwrap();
    db.upsert_remote_video(user_id, &remote_video("B"), VideoMark::Saved)
        .await
        .unwrap();

    let (status, liked) = api
        .request(Method::GET, "/api/videos?category=liked", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let liked = liked.as_array().unwrap();
    assert_eq!(liked.len(), 1);
    assert_eq!(liked[0]["video_id"], "A");

    let (_, all) = api.request(Method::GET, "/api/videos", None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_note_update_on_unknown_video_is_not_found() {
    let db = test_db().await;
    let (api, _) = api_for_seeded_user(&db).await;

    let (status, _) = api
        .request(
            Method::PATCH,
            "/api/videos/nope/note",
            Some(json!({"note": "hello"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_note_update_round_trips() {
    let db = test_db().await;
    let (api, user_id) = api_for_seeded_user(&db).await;

    db.upsert_remote_video(user_id, &remote_video("A"), VideoMark::Liked)
        .await
        .unwrap();

    let (status, video) = api
        .request(
            Method::PATCH,
            "/api/videos/A/note",
            Some(json!({"note": "revisit at 12:30"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(video["note"], "revisit at 12:30");

    let (_, detail) = api.request(Method::GET, "/api/videos/A", None).await;
    assert_eq!(detail["note"], "revisit at 12:30");
}

#[tokio::test]
async fn test_attach_tag_is_idempotent() {
    let db = test_db().await;
    let (api, user_id) = api_for_seeded_user(&db).await;

    db.upsert_remote_video(user_id, &remote_video("A"), VideoMark::Liked)
        .await
        .unwrap();
    let (_, tag) = api
        .request(Method::POST, "/api/tags", Some(json!({"name": "rust"})))
        .await;

    let attach = json!({"tag_id": tag["id"]});
    let (status, first) = api
        .request(Method::POST, "/api/videos/A/tags", Some(attach.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["created"], true);

    let (_, second) = api
        .request(Method::POST, "/api/videos/A/tags", Some(attach))
        .await;
    assert_eq!(second["created"], false);

    let (_, detail) = api.request(Method::GET, "/api/videos/A", None).await;
    assert_eq!(detail["tags"].as_array().unwrap().len(), 1);

    let (status, _) = api
        .request(
            Method::DELETE,
            &format!("/api/videos/A/tags/{}", tag["id"]),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, detail) = api.request(Method::GET, "/api/videos/A", None).await;
    assert!(detail["tags"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_watch_event_appears_in_history() {
    let db = test_db().await;
    let (api, user_id) = api_for_seeded_user(&db).await;

    db.upsert_remote_video(user_id, &remote_video("A"), VideoMark::Liked)
        .await
        .unwrap();

    let (status, body) = api
        .request(Method::POST, "/api/videos/A/watch", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, history) = api.request(Method::GET, "/api/history", None).await;
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["video_id"], "A");
    assert_eq!(history[0]["source"], "app");
}
