//! One interactive download run, from URL prompt to directory rename.

use std::path::{Path, PathBuf};

use chrono::Local;
use colored::Colorize;
use strum::{Display, EnumIter, IntoEnumIterator};
use tracing::{debug, info, warn};

use crate::extractor::{
    AUDIO_ONLY_SELECTOR, DownloadRequest, DownloadedFile, MERGE_AUDIO_SELECTOR, MediaExtractor,
};
use crate::format::{FormatCandidate, FormatTable, select_format};
use crate::merge::{MergeJob, MergeOutcome, Merger};
use crate::prompt::Terminal;
use crate::speed::SpeedHistory;
use crate::transcoder::Transcoder;
use crate::utils::{FALLBACK_TITLE, sanitize_title};
use crate::{Error, Result};

/// Extensions considered for the directory rename, most preferred first.
const PRIMARY_OUTPUT_EXTENSIONS: [&str; 4] = ["mp4", "mkv", "webm", "wav"];

/// Stems of the joined-mode temporaries; a title equal to one gets a suffix.
const TEMP_VIDEO_STEM: &str = "temp_video";
const TEMP_AUDIO_STEM: &str = "temp_audio";

/// Format of the per-run directory name.
const RUN_DIR_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// What to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, Display)]
pub enum DownloadMode {
    #[strum(to_string = "Video + Audio (joined)")]
    Joined,
    #[strum(to_string = "Video + Audio (separate)")]
    Separate,
    #[strum(to_string = "Video only")]
    VideoOnly,
    #[strum(to_string = "Audio only")]
    AudioOnly,
}

impl DownloadMode {
    /// Parse a menu answer (`1`-`4`).
    pub fn from_choice(choice: &str) -> Option<Self> {
        match choice {
            "1" => Some(Self::Joined),
            "2" => Some(Self::Separate),
            "3" => Some(Self::VideoOnly),
            "4" => Some(Self::AudioOnly),
            _ => None,
        }
    }

    pub fn wants_video(self) -> bool {
        !matches!(self, Self::AudioOnly)
    }

    pub fn wants_audio(self) -> bool {
        !matches!(self, Self::VideoOnly)
    }
}

/// Result of the final rename step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed(PathBuf),
    /// A directory with the derived name already exists; nothing was moved.
    Collision(PathBuf),
    /// No mp4/mkv/webm/wav file to take the name from.
    NoCandidate,
}

/// Rename `dir` after the base name of its primary output file.
pub fn rename_output_dir(dir: &Path) -> Result<RenameOutcome> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    let has_ext = |path: &Path, ext: &str| {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext))
    };
    let Some(primary) = PRIMARY_OUTPUT_EXTENSIONS
        .iter()
        .find_map(|ext| files.iter().find(|path| has_ext(path, ext)))
    else {
        return Ok(RenameOutcome::NoCandidate);
    };

    let Some(base_name) = primary.file_stem() else {
        return Ok(RenameOutcome::NoCandidate);
    };
    let parent = dir.parent().unwrap_or(Path::new("."));
    let target = parent.join(base_name);

    if target.exists() {
        return Ok(RenameOutcome::Collision(target));
    }
    std::fs::rename(dir, &target)?;
    Ok(RenameOutcome::Renamed(target))
}

/// Settings for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Parent of the per-run directories.
    pub output_root: PathBuf,
    /// Draw the re-encode ETA line.
    pub show_progress: bool,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub url: String,
    pub mode: DownloadMode,
    pub format: Option<FormatCandidate>,
    /// Final location of the run directory (after any rename).
    pub directory: PathBuf,
    /// Produced files, relative to `directory`.
    pub outputs: Vec<PathBuf>,
    pub merge: Option<MergeOutcome>,
    pub rename: RenameOutcome,
}

/// Drives one run against an extractor, a transcoder and the speed history.
pub struct Session<'a, E: ?Sized, X: ?Sized> {
    extractor: &'a E,
    transcoder: &'a X,
    history: &'a SpeedHistory,
    config: SessionConfig,
}

impl<'a, E, X> Session<'a, E, X>
where
    E: MediaExtractor + ?Sized,
    X: Transcoder + ?Sized,
{
    pub fn new(
        extractor: &'a E,
        transcoder: &'a X,
        history: &'a SpeedHistory,
        config: SessionConfig,
    ) -> Self {
        Self {
            extractor,
            transcoder,
            history,
            config,
        }
    }

    pub async fn run<T: Terminal + ?Sized>(&self, term: &mut T) -> Result<SessionReport> {
        let url = prompt_url(term)?;
        let mode = prompt_mode(term)?;
        info!("Starting {} download of {}", mode, url);

        let speed = self.history.representative();
        match speed {
            Some(speed) => debug!("Representative speed: {} B/s", speed),
            None => term.say("No saved download speed found, showing estimates as N/A"),
        }

        let media = self.extractor.fetch_info(&url).await?;
        let format = if mode.wants_video() {
            let table = FormatTable::build(&media.formats, media.duration);
            Some(select_format(term, &table, speed)?)
        } else {
            None
        };

        let title = output_title(media.title.as_deref().unwrap_or(FALLBACK_TITLE));
        let run_dir = self
            .config
            .output_root
            .join(Local::now().format(RUN_DIR_FORMAT).to_string());
        tokio::fs::create_dir_all(&run_dir).await?;
        info!("Writing to {}", run_dir.display());

        let mut outputs = Vec::new();
        let mut merge = None;
        match (mode, &format) {
            (DownloadMode::Joined, Some(format)) => {
                let outcome = self.joined(&url, format, &title, &run_dir, term).await?;
                if outcome != MergeOutcome::Declined {
                    outputs.push(PathBuf::from(format!("{title}.mp4")));
                }
                merge = Some(outcome);
            }
            (DownloadMode::Separate, Some(format)) => {
                outputs.push(self.video_only(&url, format, &title, &run_dir).await?);
                outputs.push(self.audio_only(&url, &title, &run_dir, term).await?);
            }
            (DownloadMode::VideoOnly, Some(format)) => {
                outputs.push(self.video_only(&url, format, &title, &run_dir).await?);
            }
            (DownloadMode::AudioOnly, _) => {
                outputs.push(self.audio_only(&url, &title, &run_dir, term).await?);
            }
            (_, None) => return Err(Error::Other(format!("{mode} requires a video format"))),
        }

        let rename = rename_output_dir(&run_dir)?;
        let directory = match &rename {
            RenameOutcome::Renamed(path) => {
                term.say(&format!("Renamed folder to: {}", path.display()));
                path.clone()
            }
            RenameOutcome::Collision(path) => {
                let name = path.file_name().unwrap_or_default().to_string_lossy();
                term.say(&format!(
                    "Target folder name '{name}' already exists, skipping rename."
                ));
                run_dir
            }
            RenameOutcome::NoCandidate => {
                term.say("No mp4 or wav output found for renaming.");
                run_dir
            }
        };

        Ok(SessionReport {
            url,
            mode,
            format,
            directory,
            outputs,
            merge,
            rename,
        })
    }

    /// Download one stream and feed its throughput into the speed history.
    async fn fetch(&self, url: &str, format: &str, output: &Path) -> Result<DownloadedFile> {
        let file = self
            .extractor
            .download(&DownloadRequest {
                url,
                format,
                output,
            })
            .await?;

        match file.speed_bps() {
            Some(speed) => self.history.record(speed),
            None => warn!("No usable speed sample from {}", file.path.display()),
        }
        info!(
            "Downloaded {} ({} bytes in {:.1}s)",
            file.path.display(),
            file.bytes,
            file.elapsed.as_secs_f64()
        );
        Ok(file)
    }

    async fn joined<T: Terminal + ?Sized>(
        &self,
        url: &str,
        format: &FormatCandidate,
        title: &str,
        dir: &Path,
        term: &mut T,
    ) -> Result<MergeOutcome> {
        let job = MergeJob {
            video: dir.join(format!("{TEMP_VIDEO_STEM}.{}", video_ext(format))),
            audio: dir.join(format!("{TEMP_AUDIO_STEM}.m4a")),
            output: dir.join(format!("{title}.mp4")),
        };

        self.fetch(url, &format.format_id, &job.video).await?;
        self.fetch(url, MERGE_AUDIO_SELECTOR, &job.audio).await?;

        let outcome = Merger::new(self.transcoder)
            .with_progress(self.config.show_progress)
            .merge(&job, term)
            .await?;

        tokio::fs::remove_file(&job.video).await?;
        tokio::fs::remove_file(&job.audio).await?;
        Ok(outcome)
    }

    async fn video_only(
        &self,
        url: &str,
        format: &FormatCandidate,
        title: &str,
        dir: &Path,
    ) -> Result<PathBuf> {
        let name = PathBuf::from(format!("{title}.{}", video_ext(format)));
        self.fetch(url, &format.format_id, &dir.join(&name)).await?;
        Ok(name)
    }

    async fn audio_only<T: Terminal + ?Sized>(
        &self,
        url: &str,
        title: &str,
        dir: &Path,
        term: &mut T,
    ) -> Result<PathBuf> {
        let source = dir.join(format!("{title}.m4a"));
        let name = PathBuf::from(format!("{title}.wav"));
        let wav = dir.join(&name);

        self.fetch(url, AUDIO_ONLY_SELECTOR, &source).await?;

        term.say(&format!(
            "Converting {} → {} (96kHz WAV)...",
            source.display(),
            wav.display()
        ));
        self.transcoder.convert_to_wav(&source, &wav).await?;
        tokio::fs::remove_file(&source).await?;
        term.say("Conversion complete.");
        Ok(name)
    }
}

/// Sanitized title that can never name one of the joined-mode temporaries.
fn output_title(raw: &str) -> String {
    let title = sanitize_title(raw);
    if [TEMP_VIDEO_STEM, TEMP_AUDIO_STEM]
        .iter()
        .any(|stem| title.eq_ignore_ascii_case(stem))
    {
        format!("{title}_")
    } else {
        title
    }
}

fn video_ext(format: &FormatCandidate) -> &str {
    if format.ext.is_empty() {
        "mp4"
    } else {
        &format.ext
    }
}

fn prompt_url<T: Terminal + ?Sized>(term: &mut T) -> Result<String> {
    loop {
        let url = term.ask("Paste YouTube URL: ")?;
        if !url.is_empty() {
            return Ok(url);
        }
    }
}

fn prompt_mode<T: Terminal + ?Sized>(term: &mut T) -> Result<DownloadMode> {
    loop {
        term.clear();
        term.say(&format!("{}\n", "Select download mode:".bold()));
        for (i, mode) in DownloadMode::iter().enumerate() {
            term.say(&format!("  {}. {}", i + 1, mode));
        }
        term.say("");

        if let Some(mode) = DownloadMode::from_choice(&term.ask("Enter choice: ")?) {
            return Ok(mode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::LineTerminal;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_mode_choices() {
        assert_eq!(DownloadMode::from_choice("1"), Some(DownloadMode::Joined));
        assert_eq!(DownloadMode::from_choice("4"), Some(DownloadMode::AudioOnly));
        assert_eq!(DownloadMode::from_choice("0"), None);
        assert_eq!(DownloadMode::from_choice("01"), None);

        let video: Vec<_> = DownloadMode::iter().filter(|m| m.wants_video()).collect();
        assert_eq!(
            video,
            vec![DownloadMode::Joined, DownloadMode::Separate, DownloadMode::VideoOnly]
        );
        let audio: Vec<_> = DownloadMode::iter().filter(|m| m.wants_audio()).collect();
        assert_eq!(
            audio,
            vec![DownloadMode::Joined, DownloadMode::Separate, DownloadMode::AudioOnly]
        );
    }

    #[test]
    fn test_output_title_avoids_temporary_names() {
        assert_eq!(output_title("temp_video"), "temp_video_");
        assert_eq!(output_title("TEMP_AUDIO"), "TEMP_AUDIO_");
        assert_eq!(output_title("temp/video"), "temp_video_");
        assert_eq!(output_title("temp_video 2"), "temp_video 2");
        assert_eq!(output_title("My: Clip"), "My_ Clip");
    }

    #[test]
    fn test_mode_menu_reprompts_after_undecodable_answer() {
        let mut term = LineTerminal::new(Cursor::new(b"\xc3\x28\n2\n".to_vec()), Vec::new());

        assert_eq!(prompt_mode(&mut term).unwrap(), DownloadMode::Separate);
        let output = String::from_utf8(term.into_output()).unwrap();
        assert_eq!(output.matches("Enter choice: ").count(), 2);
    }

    #[test]
    fn test_mode_labels() {
        assert_eq!(DownloadMode::Joined.to_string(), "Video + Audio (joined)");
        assert_eq!(DownloadMode::AudioOnly.to_string(), "Audio only");
    }

    #[test]
    fn test_rename_to_primary_output() {
        let root = TempDir::new().unwrap();
        let run = root.path().join("2024-01-01_00-00-00");
        std::fs::create_dir(&run).unwrap();
        std::fs::write(run.join("Song.wav"), b"").unwrap();
        std::fs::write(run.join("Clip.mp4"), b"").unwrap();

        let outcome = rename_output_dir(&run).unwrap();

        let expected = root.path().join("Clip");
        assert_eq!(outcome, RenameOutcome::Renamed(expected.clone()));
        assert!(expected.join("Clip.mp4").exists());
        assert!(!run.exists());
    }

    #[test]
    fn test_rename_collision_is_noop() {
        let root = TempDir::new().unwrap();
        let run = root.path().join("2024-01-01_00-00-00");
        std::fs::create_dir(&run).unwrap();
        std::fs::write(run.join("Clip.mp4"), b"new").unwrap();
        let existing = root.path().join("Clip");
        std::fs::create_dir(&existing).unwrap();
        std::fs::write(existing.join("Clip.mp4"), b"old").unwrap();

        let outcome = rename_output_dir(&run).unwrap();

        assert_eq!(outcome, RenameOutcome::Collision(existing.clone()));
        assert_eq!(std::fs::read(run.join("Clip.mp4")).unwrap(), b"new");
        assert_eq!(std::fs::read(existing.join("Clip.mp4")).unwrap(), b"old");
    }

    #[test]
    fn test_rename_without_candidate() {
        let root = TempDir::new().unwrap();
        let run = root.path().join("2024-01-01_00-00-00");
        std::fs::create_dir(&run).unwrap();
        std::fs::write(run.join("temp_audio.m4a"), b"").unwrap();

        assert_eq!(rename_output_dir(&run).unwrap(), RenameOutcome::NoCandidate);
        assert!(run.exists());
    }

    #[test]
    fn test_rename_extension_is_case_insensitive() {
        let root = TempDir::new().unwrap();
        let run = root.path().join("run");
        std::fs::create_dir(&run).unwrap();
        std::fs::write(run.join("Loud.WAV"), b"").unwrap();

        let outcome = rename_output_dir(&run).unwrap();
        assert_eq!(outcome, RenameOutcome::Renamed(root.path().join("Loud")));
    }
}
