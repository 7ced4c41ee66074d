//! Core of the `ytgrab` downloader.
//!
//! The heavy lifting is delegated to external tools: yt-dlp for metadata and
//! stream downloads, ffmpeg/ffprobe for probing, merging and audio
//! conversion. This crate holds what sits between them:
//!
//! - [`speed`]: rolling history of observed download speeds
//! - [`format`]: per-resolution candidates with size and time estimates
//! - [`merge`]: remux vs re-encode decision and the re-encode ETA monitor
//! - [`session`]: the interactive run from URL prompt to directory rename

pub mod error;
pub mod extractor;
pub mod format;
pub mod merge;
pub mod prompt;
pub mod session;
pub mod speed;
pub mod tools;
pub mod transcoder;
pub mod utils;

pub use error::{Error, Result};
