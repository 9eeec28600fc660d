// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::db::{VideoFilter, WatchEventView};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Category, Playlist, Tag, User, Video, WatchSource};
use crate::services::{ImportOutcome, SyncReport, SyncScope};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

const HISTORY_PAGE_SIZE: i64 = 100;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/videos", get(list_videos))
        .route("/api/videos/{video_id}", get(get_video))
        .route("/api/videos/{video_id}/note", patch(update_note))
        .route("/api/videos/{video_id}/watch", post(record_watch))
        .route("/api/videos/{video_id}/tags", post(attach_tag))
        .route("/api/videos/{video_id}/tags/{tag_id}", delete(detach_tag))
        .route("/api/history", get(get_history))
        .route("/api/playlists", get(list_playlists))
        .route("/api/tags", get(list_tags).post(create_tag))
        .route("/api/tags/{tag_id}", delete(delete_tag))
        .route("/api/sync", post(trigger_sync))
        .route("/api/drive/export", post(export_to_drive))
        .route("/api/drive/import", post(import_from_drive))
}

// ─── User Profile ────────────────────────────────────────────

#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state
        .db
        .get_user(user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;

    Ok(Json(user_response(profile)))
}

fn user_response(user: User) -> UserResponse {
    UserResponse {
        id: user.id,
        email: user.email,
        username: user.username,
        given_name: user.given_name,
        family_name: user.family_name,
    }
}

// ─── Videos ──────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct VideoListParams {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    playlist_id: Option<String>,
    #[serde(default)]
    tag_id: Option<i64>,
}

/// A video plus its tags.
#[derive(Serialize)]
pub struct VideoResponse {
    #[serde(flatten)]
    pub video: Video,
    pub tags: Vec<Tag>,
}

async fn list_videos(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<VideoListParams>,
) -> Result<Json<Vec<VideoResponse>>> {
    let category = parse_category(params.category.as_deref())?;
    let filter = VideoFilter {
        category,
        playlist_id: params.playlist_id,
        tag_id: params.tag_id,
    };

    let videos = state.db.list_videos(user.user_id, &filter).await?;

    let mut responses = Vec::with_capacity(videos.len());
    for video in videos {
        let tags = state.db.tags_for_video(video.id).await?;
        responses.push(VideoResponse { video, tags });
    }
    Ok(Json(responses))
}

fn parse_category(raw: Option<&str>) -> Result<Option<Category>> {
    match raw {
        None | Some("all") | Some("") => Ok(None),
        Some("liked") => Ok(Some(Category::Liked)),
        Some("saved") => Ok(Some(Category::Saved)),
        Some("history") => Ok(Some(Category::History)),
        Some(other) => Err(AppError::BadRequest(format!(
            "Unknown category: {}",
            other
        ))),
    }
}

async fn get_video(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
) -> Result<Json<VideoResponse>> {
    let video = state
        .db
        .get_video(user.user_id, &video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video {}", video_id)))?;
    let tags = state.db.tags_for_video(video.id).await?;
    Ok(Json(VideoResponse { video, tags }))
}

#[derive(Deserialize)]
pub struct NoteUpdateRequest {
    pub note: Option<String>,
}

/// Update the user's note on a video.
async fn update_note(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
    Json(body): Json<NoteUpdateRequest>,
) -> Result<Json<VideoResponse>> {
    let updated = state
        .db
        .update_note(user.user_id, &video_id, body.note.as_deref())
        .await?;
    if !updated {
        return Err(AppError::NotFound(format!("Video {}", video_id)));
    }

    let video = state
        .db
        .get_video(user.user_id, &video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video {}", video_id)))?;
    let tags = state.db.tags_for_video(video.id).await?;
    Ok(Json(VideoResponse { video, tags }))
}

#[derive(Deserialize, Default)]
pub struct WatchRequest {
    #[serde(default)]
    pub source: WatchSource,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Record a watch event for a video.
async fn record_watch(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
    body: Option<Json<WatchRequest>>,
) -> Result<Json<SuccessResponse>> {
    let video = state
        .db
        .get_video(user.user_id, &video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video {}", video_id)))?;

    let source = body.map(|Json(b)| b.source).unwrap_or_default();
    state
        .db
        .record_watch_event(user.user_id, video.id, source)
        .await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<WatchEventView>>> {
    let events = state
        .db
        .list_watch_events(user.user_id, HISTORY_PAGE_SIZE)
        .await?;
    Ok(Json(events))
}

// ─── Playlists ───────────────────────────────────────────────

async fn list_playlists(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Playlist>>> {
    Ok(Json(state.db.list_playlists(user.user_id).await?))
}

// ─── Tags ────────────────────────────────────────────────────

async fn list_tags(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Tag>>> {
    Ok(Json(state.db.list_tags(user.user_id).await?))
}

#[derive(Deserialize, Validate)]
pub struct CreateTagRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

async fn create_tag(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateTagRequest>,
) -> Result<Json<Tag>> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Tag name must not be blank".to_string()));
    }

    let tag = state
        .db
        .get_or_create_tag(user.user_id, name, chrono::Utc::now())
        .await?;
    Ok(Json(tag))
}

async fn delete_tag(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(tag_id): Path<i64>,
) -> Result<Json<SuccessResponse>> {
    let deleted = state.db.delete_tag(user.user_id, tag_id).await?;
    if !deleted {
        return Err(AppError::NotFound(format!("Tag {}", tag_id)));
    }
    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Deserialize)]
pub struct AttachTagRequest {
    pub tag_id: i64,
}

#[derive(Serialize)]
pub struct AttachTagResponse {
    pub success: bool,
    pub created: bool,
}

/// Link a tag to a video (idempotent).
async fn attach_tag(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<String>,
    Json(body): Json<AttachTagRequest>,
) -> Result<Json<AttachTagResponse>> {
    let video = state
        .db
        .get_video(user.user_id, &video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video {}", video_id)))?;
    let tag = state
        .db
        .get_tag(user.user_id, body.tag_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Tag {}", body.tag_id)))?;

    let created = state
        .db
        .get_or_create_video_tag(video.id, tag.id, chrono::Utc::now())
        .await?;
    Ok(Json(AttachTagResponse {
        success: true,
        created,
    }))
}

async fn detach_tag(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((video_id, tag_id)): Path<(String, i64)>,
) -> Result<Json<SuccessResponse>> {
    let video = state
        .db
        .get_video(user.user_id, &video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video {}", video_id)))?;
    let tag = state
        .db
        .get_tag(user.user_id, tag_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Tag {}", tag_id)))?;

    state.db.delete_video_tag(video.id, tag.id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ─── Sync & Drive ────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct SyncRequest {
    #[serde(default)]
    pub sync_type: SyncScope,
}

#[derive(Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub report: SyncReport,
}

/// Manually trigger a sync of the user's YouTube data.
async fn trigger_sync(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: Option<Json<SyncRequest>>,
) -> Result<Json<SyncResponse>> {
    let scope = body.map(|Json(b)| b.sync_type).unwrap_or_default();
    let report = state.sync.sync_user(user.user_id, scope).await;
    Ok(Json(SyncResponse {
        success: report.succeeded(),
        report,
    }))
}

/// Save the user's tag layer to Google Drive.
async fn export_to_drive(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SuccessResponse>> {
    state.snapshots.export_tags(user.user_id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Serialize)]
pub struct ImportResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: ImportOutcome,
}

/// Restore the user's tag layer from Google Drive.
async fn import_from_drive(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ImportResponse>> {
    let outcome = state.snapshots.import_tags(user.user_id).await?;
    Ok(Json(ImportResponse {
        success: true,
        outcome,
    }))
}
