// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQLite store wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users and OAuth credentials
//! - Videos (upsert + category flag flips, the sync engine's contract)
//! - Playlists (wholesale metadata replace)
//! - Tags, tag-video links, and watch events
//!
//! All upserts are single-statement `INSERT ... ON CONFLICT DO UPDATE`, so
//! concurrent get-or-create races on the same unique key resolve to exactly
//! one surviving row.

use crate::error::AppError;
use crate::models::{
    Category, Credential, Playlist, RemotePlaylist, RemoteVideo, Tag, TaggedVideo, User,
    WatchSource,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::collections::HashSet;
use std::str::FromStr;

/// How an upserted remote video is marked, beyond its remote-sourced fields.
/// Exactly one category is touched per reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoMark {
    Liked,
    /// Watch Later membership; also stamps the reserved playlist reference.
    Saved,
    History,
    /// Ordinary playlist membership: stamps the playlist id and display title.
    Playlist { id: String, title: String },
}

/// Filters for listing a user's videos.
#[derive(Debug, Clone, Default)]
pub struct VideoFilter {
    pub category: Option<Category>,
    pub playlist_id: Option<String>,
    pub tag_id: Option<i64>,
}

/// A watch event joined with its video for API responses.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WatchEventView {
    pub id: i64,
    pub video_id: String,
    pub title: String,
    pub watched_at: DateTime<Utc>,
    pub source: WatchSource,
}

/// SQLite database client.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Open (creating if missing) and migrate the database.
    pub async fn new(database_url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::Database(format!("Invalid database URL: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!(url = database_url, "Connected to SQLite");

        Ok(Self { pool })
    }

    /// In-memory database for tests. A single connection keeps every
    /// query on the same in-memory instance.
    pub async fn new_in_memory() -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AppError::Database(e.to_string()))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ─── User Operations ─────────────────────────────────────────

    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool, AppError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    pub async fn create_user(
        &self,
        email: &str,
        username: &str,
        given_name: Option<&str>,
        family_name: Option<&str>,
    ) -> Result<User, AppError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO users (email, username, given_name, family_name, created_at, last_active)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(email)
        .bind(username)
        .bind(given_name)
        .bind(family_name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let user = self
            .get_user(result.last_insert_rowid())
            .await?
            .ok_or_else(|| AppError::Database("User vanished after insert".to_string()))?;
        Ok(user)
    }

    pub async fn touch_last_active(&self, user_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_active = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ─── Credential Operations ───────────────────────────────────

    pub async fn get_credential(&self, user_id: i64) -> Result<Option<Credential>, AppError> {
        let cred = sqlx::query_as::<_, Credential>("SELECT * FROM credentials WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(cred)
    }

    /// Store a credential from an authorization exchange, replacing any
    /// previous one. Google omits the refresh token on re-auth, so a NULL
    /// incoming refresh token keeps the stored one.
    pub async fn replace_credential(
        &self,
        user_id: i64,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO credentials (user_id, access_token, refresh_token, expires_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = COALESCE(excluded.refresh_token, credentials.refresh_token),
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Overwrite the access token and expiry after a refresh. Single
    /// statement; the refresh token and everything else stay untouched.
    pub async fn update_access_token(
        &self,
        user_id: i64,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE credentials SET access_token = ?, expires_at = ?, updated_at = ? WHERE user_id = ?",
        )
        .bind(access_token)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ─── Video Operations ────────────────────────────────────────

    /// Upsert a remote video keyed by (user, video_id).
    ///
    /// Remote-sourced fields are always overwritten; the mark sets exactly
    /// one category flag (or the playlist reference). The user's `note` and
    /// the other category flags are never touched.
    pub async fn upsert_remote_video(
        &self,
        user_id: i64,
        video: &RemoteVideo,
        mark: VideoMark,
    ) -> Result<(), AppError> {
        let (is_liked, is_saved, is_history) = match mark {
            VideoMark::Liked => (true, false, false),
            VideoMark::Saved => (false, true, false),
            VideoMark::History => (false, false, true),
            VideoMark::Playlist { .. } => (false, false, false),
        };
        let (playlist_id, playlist_title): (Option<String>, Option<String>) = match &mark {
            VideoMark::Saved => (
                Some(crate::services::youtube::WATCH_LATER_PLAYLIST_ID.to_string()),
                Some("Watch Later".to_string()),
            ),
            VideoMark::Playlist { id, title } => (Some(id.clone()), Some(title.clone())),
            _ => (None, None),
        };

        let extra_set = match &mark {
            VideoMark::Liked => ", is_liked = 1",
            VideoMark::History => ", is_history = 1",
            VideoMark::Saved => {
                ", is_saved = 1, playlist_id = excluded.playlist_id, playlist_title = excluded.playlist_title"
            }
            VideoMark::Playlist { .. } => {
                ", playlist_id = excluded.playlist_id, playlist_title = excluded.playlist_title"
            }
        };

        let sql = format!(
            r#"
            INSERT INTO videos (
                user_id, video_id, title, description, thumbnail_url,
                channel_title, channel_id, published_at,
                is_liked, is_saved, is_history, playlist_id, playlist_title,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, video_id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                thumbnail_url = excluded.thumbnail_url,
                channel_title = excluded.channel_title,
                channel_id = excluded.channel_id,
                published_at = excluded.published_at,
                updated_at = excluded.updated_at{}
            "#,
            extra_set
        );

        let now = Utc::now();
        sqlx::query(&sql)
            .bind(user_id)
            .bind(&video.video_id)
            .bind(&video.title)
            .bind(&video.description)
            .bind(&video.thumbnail_url)
            .bind(&video.channel_title)
            .bind(&video.channel_id)
            .bind(video.published_at)
            .bind(is_liked)
            .bind(is_saved)
            .bind(is_history)
            .bind(playlist_id)
            .bind(playlist_title)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remote video ids currently flagged in a category for a user.
    pub async fn flagged_video_ids(
        &self,
        user_id: i64,
        category: Category,
    ) -> Result<HashSet<String>, AppError> {
        let sql = format!(
            "SELECT video_id FROM videos WHERE user_id = ? AND {} = 1",
            category.flag_column()
        );
        let ids: Vec<String> = sqlx::query_scalar(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    /// Flip one category's flag to false for a set of remote video ids.
    /// All other fields and flags are untouched.
    pub async fn clear_category_flag(
        &self,
        user_id: i64,
        video_ids: &[String],
        category: Category,
    ) -> Result<u64, AppError> {
        if video_ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; video_ids.len()].join(", ");
        let sql = format!(
            "UPDATE videos SET {} = 0, updated_at = ? WHERE user_id = ? AND video_id IN ({})",
            category.flag_column(),
            placeholders
        );
        let mut query = sqlx::query(&sql).bind(Utc::now()).bind(user_id);
        for id in video_ids {
            query = query.bind(id);
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Remote video ids currently carrying a playlist reference.
    pub async fn playlist_member_ids(&self, user_id: i64) -> Result<HashSet<String>, AppError> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT video_id FROM videos WHERE user_id = ? AND playlist_id IS NOT NULL",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    /// Drop the playlist reference from a set of videos. Category flags
    /// are untouched.
    pub async fn clear_playlist_refs(
        &self,
        user_id: i64,
        video_ids: &[String],
    ) -> Result<u64, AppError> {
        if video_ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; video_ids.len()].join(", ");
        let sql = format!(
            "UPDATE videos SET playlist_id = NULL, playlist_title = NULL, updated_at = ? \
             WHERE user_id = ? AND video_id IN ({})",
            placeholders
        );
        let mut query = sqlx::query(&sql).bind(Utc::now()).bind(user_id);
        for id in video_ids {
            query = query.bind(id);
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn get_video(
        &self,
        user_id: i64,
        video_id: &str,
    ) -> Result<Option<crate::models::Video>, AppError> {
        let video = sqlx::query_as::<_, crate::models::Video>(
            "SELECT * FROM videos WHERE user_id = ? AND video_id = ?",
        )
        .bind(user_id)
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(video)
    }

    pub async fn list_videos(
        &self,
        user_id: i64,
        filter: &VideoFilter,
    ) -> Result<Vec<crate::models::Video>, AppError> {
        let mut sql = String::from("SELECT v.* FROM videos v");
        if filter.tag_id.is_some() {
            sql.push_str(" JOIN video_tags vt ON vt.video_id = v.id");
        }
        sql.push_str(" WHERE v.user_id = ?");
        if filter.tag_id.is_some() {
            sql.push_str(" AND vt.tag_id = ?");
        }
        if let Some(category) = filter.category {
            sql.push_str(&format!(" AND v.{} = 1", category.flag_column()));
        }
        if filter.playlist_id.is_some() {
            sql.push_str(" AND v.playlist_id = ?");
        }
        sql.push_str(" ORDER BY v.published_at DESC");

        let mut query = sqlx::query_as::<_, crate::models::Video>(&sql).bind(user_id);
        if let Some(tag_id) = filter.tag_id {
            query = query.bind(tag_id);
        }
        if let Some(playlist_id) = &filter.playlist_id {
            query = query.bind(playlist_id);
        }

        let videos = query.fetch_all(&self.pool).await?;
        Ok(videos)
    }

    /// Set the user's note on a video. Returns false if the video is unknown.
    pub async fn update_note(
        &self,
        user_id: i64,
        video_id: &str,
        note: Option<&str>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE videos SET note = ?, updated_at = ? WHERE user_id = ? AND video_id = ?",
        )
        .bind(note)
        .bind(Utc::now())
        .bind(user_id)
        .bind(video_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Backfill the note only when none is set; an existing note wins.
    pub async fn backfill_note_if_empty(&self, video_pk: i64, note: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE videos SET note = ?, updated_at = ? \
             WHERE id = ? AND (note IS NULL OR note = '')",
        )
        .bind(note)
        .bind(Utc::now())
        .bind(video_pk)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ─── Playlist Operations ─────────────────────────────────────

    /// Upsert a playlist keyed by (user, playlist_id), metadata replaced
    /// wholesale.
    pub async fn upsert_playlist(
        &self,
        user_id: i64,
        playlist: &RemotePlaylist,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO playlists (
                user_id, playlist_id, title, description, thumbnail_url,
                item_count, channel_id, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, playlist_id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                thumbnail_url = excluded.thumbnail_url,
                item_count = excluded.item_count,
                channel_id = excluded.channel_id,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(&playlist.playlist_id)
        .bind(&playlist.title)
        .bind(&playlist.description)
        .bind(&playlist.thumbnail_url)
        .bind(playlist.item_count)
        .bind(&playlist.channel_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_playlists(&self, user_id: i64) -> Result<Vec<Playlist>, AppError> {
        let playlists =
            sqlx::query_as::<_, Playlist>("SELECT * FROM playlists WHERE user_id = ? ORDER BY title")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(playlists)
    }

    // ─── Tag Operations ──────────────────────────────────────────

    /// Get or create a tag by (user, name). `created_at` is only used when
    /// the tag does not exist yet (snapshot imports carry the original
    /// creation instant).
    pub async fn get_or_create_tag(
        &self,
        user_id: i64,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Tag, AppError> {
        sqlx::query(
            "INSERT INTO tags (user_id, name, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(user_id, name) DO NOTHING",
        )
        .bind(user_id)
        .bind(name)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        let tag = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE user_id = ? AND name = ?")
            .bind(user_id)
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(tag)
    }

    pub async fn get_tag(&self, user_id: i64, tag_id: i64) -> Result<Option<Tag>, AppError> {
        let tag = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(tag_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tag)
    }

    pub async fn list_tags(&self, user_id: i64) -> Result<Vec<Tag>, AppError> {
        let tags = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE user_id = ? ORDER BY name")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    pub async fn delete_tag(&self, user_id: i64, tag_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tags WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ─── Tag-Video Links ─────────────────────────────────────────

    /// Idempotently link a video to a tag. Returns true if the link was
    /// created by this call.
    pub async fn get_or_create_video_tag(
        &self,
        video_pk: i64,
        tag_pk: i64,
        created_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO video_tags (video_id, tag_id, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(video_id, tag_id) DO NOTHING",
        )
        .bind(video_pk)
        .bind(tag_pk)
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_video_tag(&self, video_pk: i64, tag_pk: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM video_tags WHERE video_id = ? AND tag_id = ?")
            .bind(video_pk)
            .bind(tag_pk)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn tags_for_video(&self, video_pk: i64) -> Result<Vec<Tag>, AppError> {
        let tags = sqlx::query_as::<_, Tag>(
            "SELECT t.* FROM tags t \
             JOIN video_tags vt ON vt.tag_id = t.id \
             WHERE vt.video_id = ? ORDER BY t.name",
        )
        .bind(video_pk)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    /// Videos linked to a tag in link-creation order, shaped for export.
    pub async fn videos_for_tag(&self, tag_pk: i64) -> Result<Vec<TaggedVideo>, AppError> {
        let videos = sqlx::query_as::<_, TaggedVideo>(
            "SELECT v.video_id, v.title, v.thumbnail_url, v.note, vt.created_at AS added_at \
             FROM video_tags vt \
             JOIN videos v ON v.id = vt.video_id \
             WHERE vt.tag_id = ? ORDER BY vt.created_at, vt.id",
        )
        .bind(tag_pk)
        .fetch_all(&self.pool)
        .await?;
        Ok(videos)
    }

    // ─── Watch Events ────────────────────────────────────────────

    pub async fn record_watch_event(
        &self,
        user_id: i64,
        video_pk: i64,
        source: WatchSource,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO watch_events (user_id, video_id, watched_at, source) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(video_pk)
        .bind(Utc::now())
        .bind(source)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_watch_events(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<WatchEventView>, AppError> {
        let events = sqlx::query_as::<_, WatchEventView>(
            "SELECT we.id, v.video_id, v.title, we.watched_at, we.source \
             FROM watch_events we \
             JOIN videos v ON v.id = we.video_id \
             WHERE we.user_id = ? ORDER BY we.watched_at DESC, we.id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }
}
