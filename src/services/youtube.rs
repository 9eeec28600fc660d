// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! YouTube Data API client for fetching liked videos, playlists, and
//! playlist items.
//!
//! Handles:
//! - Page-token pagination, fully drained in page order
//! - Partial results when a later page fails (callers reconcile by
//!   set-difference and tolerate incompleteness)
//! - The Watch Later 403 restriction, reported as an empty result

use crate::error::AppError;
use crate::models::{RemotePlaylist, RemoteVideo};
use crate::services::GoogleAuthService;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// YouTube's reserved Watch Later playlist ID.
pub const WATCH_LATER_PLAYLIST_ID: &str = "WL";
/// YouTube's reserved Liked Videos playlist ID.
pub const LIKED_PLAYLIST_ID: &str = "LL";

/// Items requested per page (the API maximum).
const PAGE_SIZE: u32 = 50;

/// One page of a paginated list response.
#[derive(Debug, Clone, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

/// YouTube Data API client.
#[derive(Clone)]
pub struct YouTubeClient {
    http: reqwest::Client,
    base_url: String,
}

impl YouTubeClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://www.googleapis.com/youtube/v3".to_string(),
        }
    }

    /// Point the client at a different API root (tests).
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// List the user's own playlists, all pages.
    pub async fn list_playlists(
        &self,
        access_token: &str,
    ) -> Result<Vec<PlaylistResource>, AppError> {
        self.fetch_all(
            access_token,
            "playlists",
            &[("part", "snippet,contentDetails"), ("mine", "true")],
        )
        .await
    }

    /// List the items of one playlist, all pages.
    pub async fn list_playlist_items(
        &self,
        access_token: &str,
        playlist_id: &str,
    ) -> Result<Vec<PlaylistItem>, AppError> {
        self.fetch_all(
            access_token,
            "playlistItems",
            &[
                ("part", "snippet,contentDetails"),
                ("playlistId", playlist_id),
            ],
        )
        .await
    }

    /// List the videos the user has rated "like", all pages.
    pub async fn list_liked_videos(&self, access_token: &str) -> Result<Vec<LikedVideo>, AppError> {
        self.fetch_all(
            access_token,
            "videos",
            &[("part", "snippet,contentDetails"), ("myRating", "like")],
        )
        .await
    }

    /// Drain a paginated endpoint, concatenating results in page order.
    ///
    /// A non-success response on the first page is a hard failure. On a
    /// later page it is logged and the pages gathered so far are returned;
    /// callers must treat the list as possibly incomplete.
    async fn fetch_all<T: DeserializeOwned>(
        &self,
        access_token: &str,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<T>, AppError> {
        let url = format!("{}/{}", self.base_url, path);
        let mut all = Vec::new();
        let mut page_token: Option<String> = None;
        let mut first_page = true;

        loop {
            let mut query: Vec<(&str, String)> = params
                .iter()
                .map(|(key, value)| (*key, value.to_string()))
                .collect();
            query.push(("maxResults", PAGE_SIZE.to_string()));
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self
                .http
                .get(&url)
                .bearer_auth(access_token)
                .query(&query)
                .send()
                .await
                .map_err(|e| AppError::YouTubeApi(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();

                if !first_page {
                    tracing::warn!(
                        %status,
                        path,
                        fetched = all.len(),
                        "Page fetch failed, returning partial results"
                    );
                    return Ok(all);
                }

                if status.as_u16() == 403 {
                    return Err(AppError::YouTubeApi(format!(
                        "{} ({})",
                        AppError::REMOTE_FORBIDDEN,
                        path
                    )));
                }
                if status.as_u16() == 401 {
                    return Err(AppError::YouTubeApi(
                        AppError::REMOTE_TOKEN_ERROR.to_string(),
                    ));
                }
                return Err(AppError::YouTubeApi(format!("HTTP {}: {}", status, body)));
            }

            let page: Page<T> = response
                .json()
                .await
                .map_err(|e| AppError::YouTubeApi(format!("JSON parse error: {}", e)))?;

            all.extend(page.items);
            first_page = false;

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(all),
            }
        }
    }
}

impl Default for YouTubeClient {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Raw API records, decoded defensively
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnails {
    #[serde(default)]
    pub high: Option<Thumbnail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceId {
    #[serde(rename = "videoId", default)]
    pub video_id: Option<String>,
}

/// Snippet shared by playlist items and liked videos.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoSnippet {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "publishedAt", default)]
    pub published_at: Option<String>,
    #[serde(rename = "channelTitle", default)]
    pub channel_title: Option<String>,
    #[serde(rename = "channelId", default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub thumbnails: Option<Thumbnails>,
    #[serde(rename = "resourceId", default)]
    pub resource_id: Option<ResourceId>,
}

/// One entry of a playlistItems response; the video id lives under
/// snippet.resourceId.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItem {
    #[serde(default)]
    pub snippet: Option<VideoSnippet>,
}

impl PlaylistItem {
    /// Normalize to a [`RemoteVideo`]; None when the item carries no
    /// video id.
    pub fn video(&self) -> Option<RemoteVideo> {
        let snippet = self.snippet.clone().unwrap_or_default();
        let video_id = snippet.resource_id.as_ref()?.video_id.clone()?;
        Some(normalize_video(video_id, &snippet))
    }
}

/// One entry of a videos?myRating=like response; the video id is top-level.
#[derive(Debug, Clone, Deserialize)]
pub struct LikedVideo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub snippet: Option<VideoSnippet>,
}

impl LikedVideo {
    pub fn video(&self) -> Option<RemoteVideo> {
        let video_id = self.id.clone()?;
        let snippet = self.snippet.clone().unwrap_or_default();
        Some(normalize_video(video_id, &snippet))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistSnippet {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "channelId", default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistContentDetails {
    #[serde(rename = "itemCount", default)]
    pub item_count: Option<i64>,
}

/// One entry of a playlists response.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistResource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub snippet: Option<PlaylistSnippet>,
    #[serde(rename = "contentDetails", default)]
    pub content_details: Option<PlaylistContentDetails>,
}

impl PlaylistResource {
    /// Normalize to a [`RemotePlaylist`]; None without a playlist id.
    pub fn playlist(&self) -> Option<RemotePlaylist> {
        let playlist_id = self.id.clone()?;
        let snippet = self.snippet.clone().unwrap_or_default();
        let content_details = self.content_details.clone().unwrap_or_default();
        Some(RemotePlaylist {
            playlist_id,
            title: snippet
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled Playlist".to_string()),
            description: snippet.description.unwrap_or_default(),
            thumbnail_url: thumbnail_url(&snippet.thumbnails),
            item_count: content_details.item_count.unwrap_or(0),
            channel_id: snippet.channel_id.unwrap_or_default(),
        })
    }
}

fn thumbnail_url(thumbnails: &Option<Thumbnails>) -> Option<String> {
    thumbnails
        .as_ref()?
        .high
        .as_ref()?
        .url
        .clone()
        .filter(|u| !u.is_empty())
}

/// Apply the documented decode defaults for missing remote fields.
fn normalize_video(video_id: String, snippet: &VideoSnippet) -> RemoteVideo {
    RemoteVideo {
        video_id,
        title: snippet
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled Video".to_string()),
        description: snippet.description.clone().unwrap_or_default(),
        thumbnail_url: thumbnail_url(&snippet.thumbnails),
        channel_title: snippet
            .channel_title
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "Unknown Channel".to_string()),
        channel_id: snippet.channel_id.clone().unwrap_or_default(),
        published_at: snippet
            .published_at
            .as_deref()
            .and_then(parse_publish_instant)
            .unwrap_or(DateTime::UNIX_EPOCH),
    }
}

fn parse_publish_instant(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ─────────────────────────────────────────────────────────────────────────────
// YouTubeService - token-guarded API wrappers
// ─────────────────────────────────────────────────────────────────────────────

/// High-level YouTube service: every call obtains a valid access token
/// first, so an unusable credential aborts the remote operation.
#[derive(Clone)]
pub struct YouTubeService {
    client: YouTubeClient,
    auth: GoogleAuthService,
}

impl YouTubeService {
    pub fn new(client: YouTubeClient, auth: GoogleAuthService) -> Self {
        Self { client, auth }
    }

    pub async fn list_playlists(&self, user_id: i64) -> Result<Vec<PlaylistResource>, AppError> {
        let access_token = self.auth.valid_access_token(user_id).await?;
        self.client.list_playlists(&access_token).await
    }

    pub async fn list_playlist_items(
        &self,
        user_id: i64,
        playlist_id: &str,
    ) -> Result<Vec<PlaylistItem>, AppError> {
        let access_token = self.auth.valid_access_token(user_id).await?;
        self.client
            .list_playlist_items(&access_token, playlist_id)
            .await
    }

    pub async fn list_liked_videos(&self, user_id: i64) -> Result<Vec<LikedVideo>, AppError> {
        let access_token = self.auth.valid_access_token(user_id).await?;
        self.client.list_liked_videos(&access_token).await
    }

    /// Fetch the Watch Later playlist.
    ///
    /// The API forbids Watch Later access for most apps; that 403 is an
    /// authoritative "zero items", not a failure, and is reported as an
    /// empty list. Any other failure propagates.
    pub async fn list_watch_later(&self, user_id: i64) -> Result<Vec<PlaylistItem>, AppError> {
        match self
            .list_playlist_items(user_id, WATCH_LATER_PLAYLIST_ID)
            .await
        {
            Ok(items) => Ok(items),
            Err(e) if e.is_remote_forbidden() => {
                tracing::info!(user_id, "Watch Later access restricted, treating as empty");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}
