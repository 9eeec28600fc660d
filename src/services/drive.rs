// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Drive snapshot transfer for the tag layer.
//!
//! The snapshot is a single named JSON file in a single named app folder:
//! export replaces it wholesale, import applies it with
//! update-not-overwrite semantics (existing notes and links win).

use crate::db::Db;
use crate::error::AppError;
use crate::services::GoogleAuthService;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Drive folder holding the app's data.
pub const APP_FOLDER_NAME: &str = "VidBoxd Data";
/// The single snapshot file inside the app folder.
pub const SNAPSHOT_FILE_NAME: &str = "vidboxd_tags.json";

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

// ─────────────────────────────────────────────────────────────────────────────
// Snapshot document
// ─────────────────────────────────────────────────────────────────────────────

/// The exported tag layer: tags keyed by name, each with its creation
/// instant and tagged videos in link order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagSnapshot {
    pub user: String,
    pub exported_at: DateTime<Utc>,
    pub tags: BTreeMap<String, SnapshotTag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotTag {
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub videos: Vec<SnapshotVideo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotVideo {
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
}

/// Result of applying a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    /// Tag-video links processed (created or already present). Videos not
    /// yet synced locally are skipped and not counted.
    pub links_imported: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Drive API client
// ─────────────────────────────────────────────────────────────────────────────

/// Google Drive API client, limited to the five operations the snapshot
/// transfer needs.
#[derive(Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    base_url: String,
    upload_url: String,
}

impl DriveClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://www.googleapis.com/drive/v3".to_string(),
            upload_url: "https://www.googleapis.com/upload/drive/v3/files".to_string(),
        }
    }

    /// Point the client at a different API root (tests).
    pub fn with_base_urls(base_url: String, upload_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            upload_url,
        }
    }

    /// Find the app folder by name, if it exists.
    pub async fn find_folder(&self, access_token: &str) -> Result<Option<String>, AppError> {
        let query = format!(
            "name='{}' and mimeType='{}' and trashed=false",
            APP_FOLDER_NAME, FOLDER_MIME_TYPE
        );
        self.find_by_query(access_token, &query).await
    }

    /// Create the app folder, returning its id.
    pub async fn create_folder(&self, access_token: &str) -> Result<String, AppError> {
        let metadata = serde_json::json!({
            "name": APP_FOLDER_NAME,
            "mimeType": FOLDER_MIME_TYPE,
        });

        let response = self
            .http
            .post(format!("{}/files", self.base_url))
            .bearer_auth(access_token)
            .json(&metadata)
            .send()
            .await
            .map_err(|e| AppError::Drive(e.to_string()))?;

        let created: DriveFile = Self::check_json(response).await?;
        Ok(created.id)
    }

    /// Find the snapshot file inside a folder, if it exists.
    pub async fn find_file(
        &self,
        access_token: &str,
        folder_id: &str,
    ) -> Result<Option<String>, AppError> {
        let query = format!(
            "name='{}' and '{}' in parents and trashed=false",
            SNAPSHOT_FILE_NAME, folder_id
        );
        self.find_by_query(access_token, &query).await
    }

    /// Create the snapshot file: metadata first, then its content.
    pub async fn create_file(
        &self,
        access_token: &str,
        folder_id: &str,
        content: &str,
    ) -> Result<String, AppError> {
        let metadata = serde_json::json!({
            "name": SNAPSHOT_FILE_NAME,
            "parents": [folder_id],
            "mimeType": "application/json",
        });

        let response = self
            .http
            .post(format!("{}/files", self.base_url))
            .bearer_auth(access_token)
            .json(&metadata)
            .send()
            .await
            .map_err(|e| AppError::Drive(e.to_string()))?;

        let created: DriveFile = Self::check_json(response).await?;
        self.update_file(access_token, &created.id, content).await?;
        Ok(created.id)
    }

    /// Replace the content of an existing file.
    pub async fn update_file(
        &self,
        access_token: &str,
        file_id: &str,
        content: &str,
    ) -> Result<(), AppError> {
        let response = self
            .http
            .patch(format!("{}/{}?uploadType=media", self.upload_url, file_id))
            .bearer_auth(access_token)
            .header("Content-Type", "application/json")
            .body(content.to_string())
            .send()
            .await
            .map_err(|e| AppError::Drive(e.to_string()))?;

        Self::check_status(response).await?;
        Ok(())
    }

    /// Download a file's content.
    pub async fn download_file(
        &self,
        access_token: &str,
        file_id: &str,
    ) -> Result<String, AppError> {
        let response = self
            .http
            .get(format!("{}/files/{}?alt=media", self.base_url, file_id))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Drive(e.to_string()))?;

        let response = Self::check_status(response).await?;
        response
            .text()
            .await
            .map_err(|e| AppError::Drive(e.to_string()))
    }

    async fn find_by_query(
        &self,
        access_token: &str,
        query: &str,
    ) -> Result<Option<String>, AppError> {
        let response = self
            .http
            .get(format!("{}/files", self.base_url))
            .bearer_auth(access_token)
            .query(&[("q", query), ("fields", "files(id, name)")])
            .send()
            .await
            .map_err(|e| AppError::Drive(e.to_string()))?;

        let listing: DriveFileList = Self::check_json(response).await?;
        Ok(listing.files.into_iter().next().map(|f| f.id))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 403 {
            return Err(AppError::Drive(AppError::REMOTE_FORBIDDEN.to_string()));
        }
        if status.as_u16() == 401 {
            return Err(AppError::Drive(AppError::REMOTE_TOKEN_ERROR.to_string()));
        }
        Err(AppError::Drive(format!("HTTP {}: {}", status, body)))
    }

    async fn check_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| AppError::Drive(format!("JSON parse error: {}", e)))
    }
}

impl Default for DriveClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

// ─────────────────────────────────────────────────────────────────────────────
// SnapshotService - export/import over the Drive client
// ─────────────────────────────────────────────────────────────────────────────

/// Exports and restores a user's tag layer via Drive.
#[derive(Clone)]
pub struct SnapshotService {
    drive: DriveClient,
    auth: GoogleAuthService,
    db: Db,
}

impl SnapshotService {
    pub fn new(drive: DriveClient, auth: GoogleAuthService, db: Db) -> Self {
        Self { drive, auth, db }
    }

    /// Build the user's tag snapshot and upload it, replacing any
    /// previous one.
    pub async fn export_tags(&self, user_id: i64) -> Result<(), AppError> {
        let access_token = self.auth.valid_access_token(user_id).await?;
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;

        let mut tags = BTreeMap::new();
        for tag in self.db.list_tags(user_id).await? {
            let videos = self
                .db
                .videos_for_tag(tag.id)
                .await?
                .into_iter()
                .map(|v| SnapshotVideo {
                    video_id: v.video_id,
                    title: v.title,
                    thumbnail_url: v.thumbnail_url,
                    note: v.note,
                    added_at: Some(v.added_at),
                })
                .collect();
            tags.insert(
                tag.name,
                SnapshotTag {
                    created_at: Some(tag.created_at),
                    videos,
                },
            );
        }

        let snapshot = TagSnapshot {
            user: user.username,
            exported_at: Utc::now(),
            tags,
        };
        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Snapshot encode failed: {}", e)))?;

        let folder_id = match self.drive.find_folder(&access_token).await? {
            Some(id) => id,
            None => self.drive.create_folder(&access_token).await?,
        };

        match self.drive.find_file(&access_token, &folder_id).await? {
            Some(file_id) => {
                self.drive
                    .update_file(&access_token, &file_id, &content)
                    .await?
            }
            None => {
                self.drive
                    .create_file(&access_token, &folder_id, &content)
                    .await?;
            }
        }

        tracing::info!(user_id, tags = snapshot.tags.len(), "Tag snapshot exported");
        Ok(())
    }

    /// Download and apply the user's tag snapshot.
    ///
    /// Videos not yet synced locally are skipped silently; existing links
    /// and notes are never overwritten. A parse failure aborts before
    /// anything is applied.
    pub async fn import_tags(&self, user_id: i64) -> Result<ImportOutcome, AppError> {
        let access_token = self.auth.valid_access_token(user_id).await?;

        let folder_id = self
            .drive
            .find_folder(&access_token)
            .await?
            .ok_or_else(|| AppError::NotFound("No snapshot folder in Drive".to_string()))?;
        let file_id = self
            .drive
            .find_file(&access_token, &folder_id)
            .await?
            .ok_or_else(|| AppError::NotFound("No tag snapshot in Drive".to_string()))?;

        let content = self.drive.download_file(&access_token, &file_id).await?;
        let snapshot: TagSnapshot = serde_json::from_str(&content)
            .map_err(|e| AppError::Drive(format!("Snapshot parse error: {}", e)))?;

        let mut links_imported = 0;
        for (name, entry) in &snapshot.tags {
            let tag = self
                .db
                .get_or_create_tag(user_id, name, entry.created_at.unwrap_or_else(Utc::now))
                .await?;

            for video_ref in &entry.videos {
                // A missing video just hasn't been synced yet.
                let Some(video) = self.db.get_video(user_id, &video_ref.video_id).await? else {
                    continue;
                };

                self.db
                    .get_or_create_video_tag(
                        video.id,
                        tag.id,
                        video_ref.added_at.unwrap_or_else(Utc::now),
                    )
                    .await?;

                if let Some(note) = video_ref.note.as_deref().filter(|n| !n.is_empty()) {
                    self.db.backfill_note_if_empty(video.id, note).await?;
                }
                links_imported += 1;
            }
        }

        tracing::info!(user_id, links_imported, "Tag snapshot imported");
        Ok(ImportOutcome { links_imported })
    }
}
