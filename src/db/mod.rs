//! Database layer (SQLite).

pub mod sqlite;

pub use sqlite::{Db, VideoFilter, VideoMark, WatchEventView};
