// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! VidBoxd: personal video bookmarking backend.
//!
//! This crate provides the API for mirroring a user's YouTube data
//! (liked videos, Watch Later, playlists) into a local store, tagging
//! and annotating videos, and backing the tag layer up to Google Drive.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::Db;
use services::{GoogleAuthService, SnapshotService, SyncEngine, YouTubeService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub auth_service: GoogleAuthService,
    pub youtube: YouTubeService,
    pub sync: SyncEngine,
    pub snapshots: SnapshotService,
}
