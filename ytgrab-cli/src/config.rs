//! Optional TOML configuration.
//!
//! Every field may be omitted; missing values fall back to the directory of
//! the executable and to `PATH` lookups.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use ytgrab_core::speed::SPEED_HISTORY_FILE;
use ytgrab_core::tools::ToolOverrides;

use crate::error::{AppError, Result};

/// Config file looked up next to the executable.
pub const LOCAL_CONFIG_FILE: &str = "ytgrab.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Parent directory of the per-run folders.
    pub output_dir: Option<PathBuf>,
    pub speed_history_file: Option<PathBuf>,
    pub ytdlp_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load from `explicit`, else from the first config file found, else defaults.
    pub fn load(explicit: Option<&Path>, tool_dir: &Path) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover(tool_dir),
        };

        match path {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                Self::from_file(&path)
            }
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn discover(tool_dir: &Path) -> Option<PathBuf> {
        let user_config = dirs::config_dir().map(|dir| dir.join("ytgrab").join("config.toml"));
        std::iter::once(tool_dir.join(LOCAL_CONFIG_FILE))
            .chain(user_config)
            .find(|path| path.is_file())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    pub fn tool_overrides(&self) -> ToolOverrides {
        ToolOverrides {
            ytdlp: self.ytdlp_path.clone(),
            ffmpeg: self.ffmpeg_path.clone(),
            ffprobe: self.ffprobe_path.clone(),
        }
    }

    pub fn output_root(&self, tool_dir: &Path) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| tool_dir.to_path_buf())
    }

    pub fn speed_history_path(&self, tool_dir: &Path) -> PathBuf {
        self.speed_history_file
            .clone()
            .unwrap_or_else(|| tool_dir.join(SPEED_HISTORY_FILE))
    }
}
