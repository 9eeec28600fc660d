// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Synchronization engine: reconciles remote YouTube state into the
//! local store.
//!
//! Each trackable category (playlist membership, liked, saved) runs one
//! set-diff pass: fetch the full remote set, upsert every record with its
//! category mark, then flip the category off for ids the remote no longer
//! reports. The pass order playlists → liked → saved is load-bearing:
//! marks are additive per pass and only the removed-set flip clears
//! anything, so a video in several categories ends up with all its flags.
//!
//! A hard fetch failure skips the category entirely and keeps existing
//! flags; an authoritative empty result (the Watch Later 403 case) still
//! applies the removal flip.

use crate::db::{Db, VideoMark};
use crate::error::AppError;
use crate::services::youtube::{LIKED_PLAYLIST_ID, WATCH_LATER_PLAYLIST_ID};
use crate::services::YouTubeService;
use serde::Serialize;
use std::collections::HashSet;

/// Which categories a sync run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncScope {
    #[default]
    All,
    Liked,
    Saved,
}

/// Outcome of one category's reconciliation pass.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CategoryOutcome {
    /// The pass ran; counts cover upserted records and cleared flags.
    Synced { upserted: usize, cleared: usize },
    /// The remote fetch hard-failed; local state was left untouched.
    Failed,
    /// The pass was not part of the requested scope.
    Skipped,
}

/// Per-category report for one sync run. Failures are category-scoped;
/// a failed pass never aborts its siblings.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub playlists: CategoryOutcome,
    pub liked: CategoryOutcome,
    pub saved: CategoryOutcome,
}

impl SyncReport {
    /// True when no attempted pass failed.
    pub fn succeeded(&self) -> bool {
        [&self.playlists, &self.liked, &self.saved]
            .iter()
            .all(|outcome| !matches!(outcome, CategoryOutcome::Failed))
    }
}

struct PassStats {
    upserted: usize,
    cleared: usize,
}

/// Reconciles one user's remote YouTube state into the local store.
#[derive(Clone)]
pub struct SyncEngine {
    youtube: YouTubeService,
    db: Db,
}

impl SyncEngine {
    pub fn new(youtube: YouTubeService, db: Db) -> Self {
        Self { youtube, db }
    }

    /// Run the reconciliation pipeline for one user.
    ///
    /// Categories run strictly in order and errors never escape: each
    /// pass's failure is logged and recorded in the report.
    pub async fn sync_user(&self, user_id: i64, scope: SyncScope) -> SyncReport {
        tracing::info!(user_id, ?scope, "Starting sync");

        let playlists = if scope == SyncScope::All {
            self.run_pass(user_id, "playlists", self.reconcile_playlists(user_id))
                .await
        } else {
            CategoryOutcome::Skipped
        };

        let liked = if matches!(scope, SyncScope::All | SyncScope::Liked) {
            self.run_pass(user_id, "liked", self.reconcile_liked(user_id))
                .await
        } else {
            CategoryOutcome::Skipped
        };

        let saved = if matches!(scope, SyncScope::All | SyncScope::Saved) {
            self.run_pass(user_id, "saved", self.reconcile_watch_later(user_id))
                .await
        } else {
            CategoryOutcome::Skipped
        };

        let report = SyncReport {
            playlists,
            liked,
            saved,
        };
        tracing::info!(user_id, report = ?report, "Sync finished");
        report
    }

    async fn run_pass(
        &self,
        user_id: i64,
        category: &str,
        pass: impl std::future::Future<Output = Result<PassStats, AppError>>,
    ) -> CategoryOutcome {
        match pass.await {
            Ok(stats) => {
                tracing::info!(
                    user_id,
                    category,
                    upserted = stats.upserted,
                    cleared = stats.cleared,
                    "Category reconciled"
                );
                CategoryOutcome::Synced {
                    upserted: stats.upserted,
                    cleared: stats.cleared,
                }
            }
            Err(e) => {
                tracing::error!(user_id, category, error = %e, "Category sync failed, keeping existing state");
                CategoryOutcome::Failed
            }
        }
    }

    /// Liked-videos pass: upsert everything currently liked remotely,
    /// then clear the liked flag on videos the remote no longer reports.
    async fn reconcile_liked(&self, user_id: i64) -> Result<PassStats, AppError> {
        let existing = self
            .db
            .flagged_video_ids(user_id, crate::models::Category::Liked)
            .await?;
        let remote = self.youtube.list_liked_videos(user_id).await?;

        let mut current = HashSet::new();
        let mut upserted = 0;
        for record in &remote {
            let Some(video) = record.video() else {
                continue;
            };
            current.insert(video.video_id.clone());
            self.db
                .upsert_remote_video(user_id, &video, VideoMark::Liked)
                .await?;
            upserted += 1;
        }

        let removed: Vec<String> = existing.difference(&current).cloned().collect();
        let cleared = self
            .db
            .clear_category_flag(user_id, &removed, crate::models::Category::Liked)
            .await? as usize;

        Ok(PassStats { upserted, cleared })
    }

    /// Watch Later pass. A 403 has already been mapped to an empty list
    /// by the fetcher, so an empty result here is authoritative and the
    /// removal flip still applies.
    async fn reconcile_watch_later(&self, user_id: i64) -> Result<PassStats, AppError> {
        let existing = self
            .db
            .flagged_video_ids(user_id, crate::models::Category::Saved)
            .await?;
        let remote = self.youtube.list_watch_later(user_id).await?;

        let mut current = HashSet::new();
        let mut upserted = 0;
        for record in &remote {
            let Some(video) = record.video() else {
                continue;
            };
            current.insert(video.video_id.clone());
            self.db
                .upsert_remote_video(user_id, &video, VideoMark::Saved)
                .await?;
            upserted += 1;
        }

        let removed: Vec<String> = existing.difference(&current).cloned().collect();
        let cleared = self
            .db
            .clear_category_flag(user_id, &removed, crate::models::Category::Saved)
            .await? as usize;

        Ok(PassStats { upserted, cleared })
    }

    /// Playlist pass: upsert each playlist's metadata wholesale, then
    /// reconcile its member videos, stamping each with the playlist
    /// reference.
    ///
    /// The membership removal flip only runs when every playlist's items
    /// were fetched successfully; a partial union must never mass-clear
    /// memberships.
    async fn reconcile_playlists(&self, user_id: i64) -> Result<PassStats, AppError> {
        let resources = self.youtube.list_playlists(user_id).await?;
        let existing = self.db.playlist_member_ids(user_id).await?;

        let mut member_union = HashSet::new();
        let mut union_authoritative = true;
        let mut upserted = 0;

        for resource in &resources {
            let Some(mut playlist) = resource.playlist() else {
                continue;
            };
            if let Some(title) = special_playlist_title(&playlist.playlist_id) {
                playlist.title = title.to_string();
            }
            self.db.upsert_playlist(user_id, &playlist).await?;

            let items = match self
                .youtube
                .list_playlist_items(user_id, &playlist.playlist_id)
                .await
            {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(
                        user_id,
                        playlist_id = %playlist.playlist_id,
                        error = %e,
                        "Playlist item fetch failed, keeping existing memberships"
                    );
                    union_authoritative = false;
                    continue;
                }
            };

            for item in &items {
                let Some(video) = item.video() else {
                    continue;
                };
                member_union.insert(video.video_id.clone());
                self.db
                    .upsert_remote_video(
                        user_id,
                        &video,
                        VideoMark::Playlist {
                            id: playlist.playlist_id.clone(),
                            title: playlist.title.clone(),
                        },
                    )
                    .await?;
                upserted += 1;
            }
        }

        let cleared = if union_authoritative {
            let removed: Vec<String> = existing.difference(&member_union).cloned().collect();
            self.db.clear_playlist_refs(user_id, &removed).await? as usize
        } else {
            0
        };

        Ok(PassStats { upserted, cleared })
    }
}

/// Human-readable titles for the platform's reserved playlists, applied
/// regardless of what the API reports for them.
fn special_playlist_title(playlist_id: &str) -> Option<&'static str> {
    match playlist_id {
        WATCH_LATER_PLAYLIST_ID => Some("Watch Later"),
        LIKED_PLAYLIST_ID => Some("Liked Videos"),
        _ => None,
    }
}
