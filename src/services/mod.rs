// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod drive;
pub mod google_auth;
pub mod sync;
pub mod youtube;

pub use drive::{DriveClient, ImportOutcome, SnapshotService, TagSnapshot};
pub use google_auth::{GoogleAuthService, OAuthClient, OAuthOutcome, RefreshLocks};
pub use sync::{CategoryOutcome, SyncEngine, SyncReport, SyncScope};
pub use youtube::{YouTubeClient, YouTubeService};
