// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tag layer: tags, tag-video links, and watch events.
//! These are purely local; the sync engine never writes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user tag, unique per (user, name).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A tagged video as exported in snapshots: the video's remote id plus the
/// link's creation instant ("added at").
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaggedVideo {
    pub video_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub note: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Where a watch event was recorded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum WatchSource {
    #[default]
    App,
    Sync,
    Import,
}

/// A single recorded watch of a video.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WatchEvent {
    pub id: i64,
    pub user_id: i64,
    pub video_id: i64,
    pub watched_at: DateTime<Utc>,
    pub source: WatchSource,
}
