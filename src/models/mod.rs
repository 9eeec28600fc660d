// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod tag;
pub mod user;
pub mod video;

pub use tag::{Tag, TaggedVideo, WatchEvent, WatchSource};
pub use user::{Credential, User};
pub use video::{Category, Playlist, RemotePlaylist, RemoteVideo, Video};
