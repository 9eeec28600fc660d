// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared test helpers: in-memory store, stub Google endpoints, and
//! service wiring pointed at them.

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use vidboxd::config::Config;
use vidboxd::db::Db;
use vidboxd::models::RemoteVideo;
use vidboxd::services::{
    DriveClient, GoogleAuthService, OAuthClient, SnapshotService, SyncEngine, YouTubeClient,
    YouTubeService,
};
use vidboxd::AppState;

/// Fresh in-memory database with migrations applied.
#[allow(dead_code)]
pub async fn test_db() -> Db {
    Db::new_in_memory()
        .await
        .expect("Failed to open in-memory database")
}

/// Insert a test user and return its id.
#[allow(dead_code)]
pub async fn seed_user(db: &Db) -> i64 {
    db.create_user("tester@example.com", "tester", Some("Test"), Some("User"))
        .await
        .expect("Failed to seed user")
        .id
}

/// Store a credential for the user with the given expiry.
#[allow(dead_code)]
pub async fn seed_credential(db: &Db, user_id: i64, expires_at: DateTime<Utc>) {
    db.replace_credential(
        user_id,
        "stored-access-token",
        Some("stored-refresh-token"),
        expires_at,
    )
    .await
    .expect("Failed to seed credential");
}

/// A normalized remote video for direct store seeding.
#[allow(dead_code)]
pub fn remote_video(video_id: &str) -> RemoteVideo {
    RemoteVideo {
        video_id: video_id.to_string(),
        title: format!("Video {}", video_id),
        description: "remote description".to_string(),
        thumbnail_url: Some(format!("https://img.example/{}.jpg", video_id)),
        channel_title: "Test Channel".to_string(),
        channel_id: "chan1".to_string(),
        published_at: "2024-06-01T10:00:00Z".parse().unwrap(),
    }
}

/// Serve a stub router on an ephemeral local port, returning its base URL.
#[allow(dead_code)]
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub server");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// The full service stack pointed at a stub server base URL.
#[allow(dead_code)]
pub struct TestServices {
    pub auth: GoogleAuthService,
    pub youtube: YouTubeService,
    pub sync: SyncEngine,
    pub snapshots: SnapshotService,
}

/// Wire services against stub endpoints under `base`:
/// `{base}/oauth/*`, `{base}/youtube/*`, `{base}/drive/*`, `{base}/upload/*`.
#[allow(dead_code)]
pub fn services_for(db: &Db, base: &str) -> TestServices {
    let oauth_client = OAuthClient::new(
        "test_client_id".to_string(),
        "test_secret".to_string(),
        "http://localhost:8080/auth/google/callback".to_string(),
    )
    .with_endpoints(
        format!("{}/oauth/token", base),
        format!("{}/oauth/userinfo", base),
    );
    let auth = GoogleAuthService::new(oauth_client, db.clone(), Arc::new(dashmap::DashMap::new()));

    let youtube = YouTubeService::new(
        YouTubeClient::with_base_url(format!("{}/youtube", base)),
        auth.clone(),
    );
    let sync = SyncEngine::new(youtube.clone(), db.clone());
    let snapshots = SnapshotService::new(
        DriveClient::with_base_urls(format!("{}/drive", base), format!("{}/upload", base)),
        auth.clone(),
        db.clone(),
    );

    TestServices {
        auth,
        youtube,
        sync,
        snapshots,
    }
}

/// Full application (router + state) with services pointed at `base`.
#[allow(dead_code)]
pub fn create_test_app(db: &Db, base: &str) -> (Router, Arc<AppState>) {
    let config = Config::test_default();
    let services = services_for(db, base);

    let state = Arc::new(AppState {
        config,
        db: db.clone(),
        auth_service: services.auth,
        youtube: services.youtube,
        sync: services.sync,
        snapshots: services.snapshots,
    });

    (vidboxd::routes::create_router(state.clone()), state)
}
