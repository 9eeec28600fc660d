// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mirrored video and playlist rows.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A mirrored YouTube video, unique per (user, video_id).
///
/// Remote-sourced fields (title, description, thumbnail, channel, publish
/// instant) are overwritten wholesale on every sync. `note` belongs to the
/// user and is never written by the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Video {
    pub id: i64,
    pub user_id: i64,
    pub video_id: String,
    pub title: String,
    pub description: Option<String>,
    pub note: Option<String>,
    pub thumbnail_url: Option<String>,
    pub channel_title: Option<String>,
    pub channel_id: Option<String>,
    pub published_at: chrono::DateTime<chrono::Utc>,
    pub is_liked: bool,
    pub is_saved: bool,
    pub is_history: bool,
    /// Source playlist reference, if the video was last seen in one.
    pub playlist_id: Option<String>,
    pub playlist_title: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A mirrored YouTube playlist, unique per (user, playlist_id).
/// Metadata is replaced wholesale on each playlist sync pass.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Playlist {
    pub id: i64,
    pub user_id: i64,
    pub playlist_id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub item_count: i64,
    pub channel_id: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Remote-sourced video fields after defensive decoding, ready to upsert.
/// Missing remote values have already been mapped to their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteVideo {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub channel_title: String,
    pub channel_id: String,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

/// Remote-sourced playlist metadata, replaced wholesale on each sync pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePlaylist {
    pub playlist_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub item_count: i64,
    pub channel_id: String,
}

/// A trackable video category. Each maps to one independently
/// toggleable flag column on `videos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Liked,
    Saved,
    History,
}

impl Category {
    /// The flag column this category toggles.
    pub fn flag_column(self) -> &'static str {
        match self {
            Category::Liked => "is_liked",
            Category::Saved => "is_saved",
            Category::History => "is_history",
        }
    }
}
