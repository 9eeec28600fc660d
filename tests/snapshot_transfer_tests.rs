// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Snapshot transfer tests: exporting the tag layer to Drive and
//! restoring it with update-not-overwrite semantics.

mod common;

use axum::extract::{Path, Query};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use common::*;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use vidboxd::db::{Db, VideoMark};

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// In-memory Drive: one folder, one file, its content, and call counters.
#[derive(Default)]
struct DriveState {
    folder_exists: bool,
    file_exists: bool,
    content: Option<String>,
    file_creates: usize,
    content_updates: usize,
}

type SharedDrive = Arc<Mutex<DriveState>>;

/// Stub of the five Drive operations the snapshot transfer uses.
fn drive_stub(state: SharedDrive) -> Router {
    let list = {
        let state = state.clone();
        move |Query(params): Query<HashMap<String, String>>| {
            let state = state.clone();
            async move {
                let q = params.get("q").cloned().unwrap_or_default();
                let state = state.lock().unwrap();
                let files = if q.contains(FOLDER_MIME) {
                    if state.folder_exists {
                        json!([{"id": "folder1", "name": "VidBoxd Data"}])
                    } else {
                        json!([])
                    }
                } else if state.file_exists {
                    json!([{"id": "file1", "name": "vidboxd_tags.json"}])
                } else {
                    json!([])
                };
                Json(json!({"files": files}))
            }
        }
    };

    let create = {
        let state = state.clone();
        move |Json(metadata): Json<Value>| {
            let state = state.clone();
            async move {
                let mut state = state.lock().unwrap();
                if metadata["mimeType"] == FOLDER_MIME {
                    state.folder_exists = true;
                    Json(json!({"id": "folder1"}))
                } else {
                    state.file_exists = true;
                    state.file_creates += 1;
                    Json(json!({"id": "file1"}))
                }
            }
        }
    };

    let upload = {
        let state = state.clone();
        move |Path(_id): Path<String>, body: String| {
            let state = state.clone();
            async move {
                let mut state = state.lock().unwrap();
                state.content = Some(body);
                state.content_updates += 1;
                Json(json!({"id": "file1"}))
            }
        }
    };

    let download = {
        let state = state.clone();
        move |Path(_id): Path<String>| {
            let state = state.clone();
            async move { state.lock().unwrap().content.clone().unwrap_or_default() }
        }
    };

    Router::new()
        .route("/drive/files", get(list).post(create))
        .route("/drive/files/{id}", get(download))
        .route("/upload/{id}", patch(upload))
        // Unused here, but keeps accidental token refreshes from panicking.
        .route("/oauth/token", post(|| async { Json(json!({"access_token": "t"})) }))
}

fn shared_drive() -> SharedDrive {
    Arc::new(Mutex::new(DriveState::default()))
}

/// User with a fresh credential and videos A and B mirrored locally.
async fn seed_synced_user(db: &Db) -> i64 {
    let user_id = seed_user(db).await;
    seed_credential(db, user_id, Utc::now() + Duration::hours(1)).await;
    db.upsert_remote_video(user_id, &remote_video("A"), VideoMark::Liked)
        .await
        .unwrap();
    db.upsert_remote_video(user_id, &remote_video("B"), VideoMark::Liked)
        .await
        .unwrap();
    user_id
}

#[tokio::test]
async fn test_export_then_import_reproduces_the_tag_layer() {
    let drive = shared_drive();
    let base = spawn_server(drive_stub(drive.clone())).await;

    // Source store: tag "rust" on A and B, with a note on A.
    let source = test_db().await;
    let source_user = seed_synced_user(&source).await;
    let tag = source
        .get_or_create_tag(source_user, "rust", Utc::now())
        .await
        .unwrap();
    for video_id in ["A", "B"] {
        let video = source.get_video(source_user, video_id).await.unwrap().unwrap();
        source
            .get_or_create_video_tag(video.id, tag.id, Utc::now())
            .await
            .unwrap();
    }
    source
        .update_note(source_user, "A", Some("watch the borrow checker part"))
        .await
        .unwrap();

    services_for(&source, &base)
        .snapshots
        .export_tags(source_user)
        .await
        .unwrap();

    // Target store: same videos synced, no tag layer yet.
    let target = test_db().await;
    let target_user = seed_synced_user(&target).await;
    let services = services_for(&target, &base);

    let outcome = services.snapshots.import_tags(target_user).await.unwrap();
    assert_eq!(outcome.links_imported, 2);

    let tags = target.list_tags(target_user).await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "rust");

    let tagged = target.videos_for_tag(tags[0].id).await.unwrap();
    let mut ids: Vec<&str> = tagged.iter().map(|v| v.video_id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, ["A", "B"]);

    // The note came along with the link.
    let a = target.get_video(target_user, "A").await.unwrap().unwrap();
    assert_eq!(a.note.as_deref(), Some("watch the borrow checker part"));

    // A second import creates nothing new.
    let outcome = services.snapshots.import_tags(target_user).await.unwrap();
    assert_eq!(outcome.links_imported, 2);
    assert_eq!(target.list_tags(target_user).await.unwrap().len(), 1);
    assert_eq!(target.videos_for_tag(tags[0].id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_import_skips_videos_not_yet_synced() {
    let drive = shared_drive();
    let base = spawn_server(drive_stub(drive.clone())).await;

    let source = test_db().await;
    let source_user = seed_synced_user(&source).await;
    let tag = source
        .get_or_create_tag(source_user, "music", Utc::now())
        .await
        .unwrap();
    for video_id in ["A", "B"] {
        let video = source.get_video(source_user, video_id).await.unwrap().unwrap();
        source
            .get_or_create_video_tag(video.id, tag.id, Utc::now())
            .await
            .unwrap();
    }
    services_for(&source, &base)
        .snapshots
        .export_tags(source_user)
        .await
        .unwrap();

    // Target only knows about A.
    let target = test_db().await;
    let target_user = seed_user(&target).await;
    seed_credential(&target, target_user, Utc::now() + Duration::hours(1)).await;
    target
        .upsert_remote_video(target_user, &remote_video("A"), VideoMark::Liked)
        .await
        .unwrap();

    let outcome = services_for(&target, &base)
        .snapshots
        .import_tags(target_user)
        .await
        .unwrap();

    // B is silently skipped and no placeholder row appears.
    assert_eq!(outcome.links_imported, 1);
    assert!(target.get_video(target_user, "B").await.unwrap().is_none());
}

#[tokio::test]
async fn test_import_never_overwrites_an_existing_note() {
    let drive = shared_drive();
    let base = spawn_server(drive_stub(drive.clone())).await;

    let source = test_db().await;
    let source_user = seed_synced_user(&source).await;
    let tag = source
        .get_or_create_tag(source_user, "later", Utc::now())
        .await
        .unwrap();
    let video = source.get_video(source_user, "A").await.unwrap().unwrap();
    source
        .get_or_create_video_tag(video.id, tag.id, Utc::now())
        .await
        .unwrap();
    source
        .update_note(source_user, "A", Some("note from the snapshot"))
        .await
        .unwrap();
    services_for(&source, &base)
        .snapshots
        .export_tags(source_user)
        .await
        .unwrap();

    let target = test_db().await;
    let target_user = seed_synced_user(&target).await;
    target
        .update_note(target_user, "A", Some("my local note"))
        .await
        .unwrap();

    services_for(&target, &base)
        .snapshots
        .import_tags(target_user)
        .await
        .unwrap();

    let a = target.get_video(target_user, "A").await.unwrap().unwrap();
    assert_eq!(a.note.as_deref(), Some("my local note"));
}

#[tokio::test]
async fn test_unparseable_snapshot_applies_nothing() {
    let drive = shared_drive();
    {
        let mut state = drive.lock().unwrap();
        state.folder_exists = true;
        state.file_exists = true;
        state.content = Some("{ this is not json".to_string());
    }
    let base = spawn_server(drive_stub(drive)).await;

    let db = test_db().await;
    let user_id = seed_synced_user(&db).await;

    let result = services_for(&db, &base)
        .snapshots
        .import_tags(user_id)
        .await;

    assert!(result.is_err());
    assert!(db.list_tags(user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_export_replaces_the_single_snapshot_file() {
    let drive = shared_drive();
    let base = spawn_server(drive_stub(drive.clone())).await;

    let db = test_db().await;
    let user_id = seed_synced_user(&db).await;
    let tag = db
        .get_or_create_tag(user_id, "rewatch", Utc::now())
        .await
        .unwrap();
    let video = db.get_video(user_id, "A").await.unwrap().unwrap();
    db.get_or_create_video_tag(video.id, tag.id, Utc::now())
        .await
        .unwrap();

    let services = services_for(&db, &base);
    services.snapshots.export_tags(user_id).await.unwrap();
    services.snapshots.export_tags(user_id).await.unwrap();

    let state = drive.lock().unwrap();
    // One file ever created; the second export updated it in place.
    assert_eq!(state.file_creates, 1);
    assert_eq!(state.content_updates, 2);

    let snapshot: Value = serde_json::from_str(state.content.as_deref().unwrap()).unwrap();
    assert_eq!(snapshot["user"], "tester");
    assert_eq!(snapshot["tags"]["rewatch"]["videos"][0]["video_id"], "A");
}
