//! Media extraction through yt-dlp.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::format::StreamDescriptor;
use crate::{Error, Result};

/// Selector for the audio track merged into a joined download.
pub const MERGE_AUDIO_SELECTOR: &str = "bestaudio[ext=m4a]/bestaudio";

/// Selector for audio-only downloads.
pub const AUDIO_ONLY_SELECTOR: &str = "bestaudio/best";

/// Metadata of one video, as dumped by `yt-dlp -J`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub formats: Vec<StreamDescriptor>,
}

/// One stream download to a fixed path.
#[derive(Debug, Clone)]
pub struct DownloadRequest<'a> {
    pub url: &'a str,
    /// Format id or selector expression.
    pub format: &'a str,
    pub output: &'a Path,
}

/// A finished stream download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub bytes: u64,
    pub elapsed: Duration,
}

impl DownloadedFile {
    /// Observed throughput in bytes per second.
    pub fn speed_bps(&self) -> Option<u64> {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 || self.bytes == 0 {
            return None;
        }
        Some((self.bytes as f64 / secs) as u64)
    }
}

/// Metadata lookup and stream download.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    async fn fetch_info(&self, url: &str) -> Result<MediaInfo>;

    async fn download(&self, request: &DownloadRequest<'_>) -> Result<DownloadedFile>;
}

/// yt-dlp treats `-o` as a template; escape `%` so titles stay literal.
pub fn escape_output_template(path: &Path) -> String {
    path.to_string_lossy().replace('%', "%%")
}

pub fn info_args(url: &str) -> Vec<String> {
    vec![
        "-J".to_string(),
        "--no-warnings".to_string(),
        "--no-playlist".to_string(),
        url.to_string(),
    ]
}

pub fn download_args(request: &DownloadRequest<'_>) -> Vec<String> {
    vec![
        "-f".to_string(),
        request.format.to_string(),
        "-o".to_string(),
        escape_output_template(request.output),
        "--no-warnings".to_string(),
        "--no-playlist".to_string(),
        "--no-part".to_string(),
        request.url.to_string(),
    ]
}

/// The yt-dlp executable.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn spawn_error(&self, e: std::io::Error) -> Error {
        Error::extractor(format!("Failed to run {}: {}", self.program.display(), e))
    }
}

#[async_trait]
impl MediaExtractor for YtDlp {
    async fn fetch_info(&self, url: &str) -> Result<MediaInfo> {
        let args = info_args(url);
        debug!("Running {} {:?}", self.program.display(), args);

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(Error::extractor(format!(
                "metadata lookup for {} failed ({}): {}",
                url,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let info: MediaInfo = serde_json::from_slice(&output.stdout)?;
        info!(
            "Fetched metadata for {:?}: {} formats",
            info.title,
            info.formats.len()
        );
        Ok(info)
    }

    async fn download(&self, request: &DownloadRequest<'_>) -> Result<DownloadedFile> {
        let args = download_args(request);
        debug!("Running {} {:?}", self.program.display(), args);

        let start = Instant::now();
        let status = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| self.spawn_error(e))?;
        let elapsed = start.elapsed();

        if !status.success() {
            return Err(Error::extractor(format!(
                "download of format {} failed with exit code {}",
                request.format,
                status.code().unwrap_or(-1)
            )));
        }

        let bytes = tokio::fs::metadata(request.output)
            .await
            .map_err(|e| {
                Error::extractor(format!(
                    "download finished but {} is missing: {}",
                    request.output.display(),
                    e
                ))
            })?
            .len();

        Ok(DownloadedFile {
            path: request.output.to_path_buf(),
            bytes,
            elapsed,
        })
    }
}
