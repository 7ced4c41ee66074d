//! Locations of the external executables, resolved once at startup.

use std::path::{Path, PathBuf};

/// Explicit per-tool paths, usually from the config file.
#[derive(Debug, Clone, Default)]
pub struct ToolOverrides {
    pub ytdlp: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
}

/// Resolved executable paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub ytdlp: PathBuf,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

/// Directory of the running executable, falling back to the working directory.
pub fn tool_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl ToolPaths {
    /// Resolve every tool: override, then environment variable, then
    /// `<base_dir>/bin/<name>`, then the bare name for a `PATH` lookup.
    pub fn resolve(base_dir: &Path, overrides: &ToolOverrides) -> Self {
        Self::resolve_with(base_dir, overrides, |key| std::env::var(key).ok())
    }

    /// [`ToolPaths::resolve`] with an injectable environment lookup.
    pub fn resolve_with(
        base_dir: &Path,
        overrides: &ToolOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let resolve = |explicit: &Option<PathBuf>, var: &str, name: &str| {
            if let Some(path) = explicit {
                return path.clone();
            }
            if let Some(path) = env(var).filter(|v| !v.is_empty()) {
                return PathBuf::from(path);
            }
            let exe = format!("{name}{}", std::env::consts::EXE_SUFFIX);
            let bundled = base_dir.join("bin").join(&exe);
            if bundled.is_file() {
                bundled
            } else {
                PathBuf::from(exe)
            }
        };

        Self {
            ytdlp: resolve(&overrides.ytdlp, "YTDLP_PATH", "yt-dlp"),
            ffmpeg: resolve(&overrides.ffmpeg, "FFMPEG_PATH", "ffmpeg"),
            ffprobe: resolve(&overrides.ffprobe, "FFPROBE_PATH", "ffprobe"),
        }
    }
}
