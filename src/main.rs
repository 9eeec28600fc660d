// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! VidBoxd API Server
//!
//! Mirrors a user's YouTube bookmarks (liked videos, Watch Later,
//! playlists) into a local store and keeps a personal tag layer on top,
//! with Google Drive snapshot backup.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vidboxd::{
    config::Config,
    db::Db,
    services::{
        DriveClient, GoogleAuthService, OAuthClient, SnapshotService, SyncEngine, YouTubeClient,
        YouTubeService,
    },
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting VidBoxd API");

    // Open and migrate the database
    let db = Db::new(&config.database_url)
        .await
        .expect("Failed to open database");

    // Shared per-user refresh locks so concurrent requests for one user
    // serialize their token refresh.
    let refresh_locks = Arc::new(dashmap::DashMap::new());

    let oauth_client = OAuthClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.google_redirect_uri.clone(),
    );
    let auth_service = GoogleAuthService::new(oauth_client, db.clone(), refresh_locks);

    let youtube = YouTubeService::new(YouTubeClient::new(), auth_service.clone());
    let sync = SyncEngine::new(youtube.clone(), db.clone());
    let snapshots = SnapshotService::new(DriveClient::new(), auth_service.clone(), db.clone());

    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        auth_service,
        youtube,
        sync,
        snapshots,
    });

    let app = vidboxd::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vidboxd=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
