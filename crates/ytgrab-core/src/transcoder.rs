//! ffmpeg/ffprobe adapter.
//!
//! Argument lists are built by pure functions so they can be checked without
//! the binaries installed; [`Ffmpeg`] only spawns them.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Sample rate of the WAV produced for audio-only downloads.
pub const WAV_SAMPLE_RATE: u32 = 96_000;

/// Hardware acceleration reported by the transcoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HwCapabilities {
    pub encode: bool,
    pub decode: bool,
}

/// Video encoders used for a re-encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoEncoder {
    /// NVIDIA hardware H.264 encoder.
    Nvenc,
    /// Software H.264 encoder.
    X264,
}

impl VideoEncoder {
    pub const fn ffmpeg_name(self) -> &'static str {
        match self {
            Self::Nvenc => "h264_nvenc",
            Self::X264 => "libx264",
        }
    }

    /// Fastest preset of each encoder; the two use different preset names.
    pub const fn preset(self) -> &'static str {
        match self {
            Self::Nvenc => "p1",
            Self::X264 => "ultrafast",
        }
    }

    pub const fn device(self) -> &'static str {
        match self {
            Self::Nvenc => "GPU",
            Self::X264 => "CPU",
        }
    }
}

/// Operations the merge and audio steps need from a transcoding tool.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Query hardware encode/decode support. Failures count as "none".
    async fn capabilities(&self) -> HwCapabilities;

    /// Codec name of the first video stream, `None` if it cannot be probed.
    async fn probe_video_codec(&self, path: &Path) -> Option<String>;

    /// Join video and audio by stream copy.
    async fn remux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;

    /// Join video and audio, re-encoding the video with `encoder`.
    async fn reencode(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        encoder: VideoEncoder,
    ) -> Result<()>;

    /// Convert an audio file to 96 kHz 24-bit PCM WAV.
    async fn convert_to_wav(&self, input: &Path, output: &Path) -> Result<()>;
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Common flags for the commands that write an output file.
fn output_preamble() -> Vec<String> {
    vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-nostats".to_string(),
        "-loglevel".to_string(),
        "warning".to_string(),
    ]
}

pub fn encoders_args() -> Vec<String> {
    vec!["-hide_banner".to_string(), "-encoders".to_string()]
}

pub fn decoders_args() -> Vec<String> {
    vec!["-hide_banner".to_string(), "-decoders".to_string()]
}

pub fn probe_codec_args(input: &Path) -> Vec<String> {
    [
        "-v",
        "error",
        "-select_streams",
        "v:0",
        "-show_entries",
        "stream=codec_name",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ]
    .into_iter()
    .map(String::from)
    .chain([path_arg(input)])
    .collect()
}

pub fn remux_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
    let mut args = output_preamble();
    args.extend(["-i".to_string(), path_arg(video)]);
    args.extend(["-i".to_string(), path_arg(audio)]);
    args.extend(["-c".to_string(), "copy".to_string()]);
    args.push(path_arg(output));
    args
}

pub fn reencode_args(
    video: &Path,
    audio: &Path,
    output: &Path,
    encoder: VideoEncoder,
) -> Vec<String> {
    let mut args = output_preamble();
    args.extend(["-i".to_string(), path_arg(video)]);
    args.extend(["-i".to_string(), path_arg(audio)]);
    args.extend(["-c:v".to_string(), encoder.ffmpeg_name().to_string()]);
    args.extend(["-preset".to_string(), encoder.preset().to_string()]);
    args.extend(["-c:a".to_string(), "aac".to_string()]);
    args.push(path_arg(output));
    args
}

pub fn wav_args(input: &Path, output: &Path) -> Vec<String> {
    let mut args = output_preamble();
    args.extend(["-i".to_string(), path_arg(input)]);
    args.extend(["-ar".to_string(), WAV_SAMPLE_RATE.to_string()]);
    args.extend(["-c:a".to_string(), "pcm_s24le".to_string()]);
    args.push(path_arg(output));
    args
}

/// Any encoder line mentioning NVENC.
pub fn has_hw_encoder(encoders: &str) -> bool {
    encoders.lines().any(|line| line.contains("nvenc"))
}

/// Any decoder line mentioning NVDEC or CUVID.
pub fn has_hw_decoder(decoders: &str) -> bool {
    decoders
        .lines()
        .any(|line| line.contains("nvdec") || line.contains("cuvid"))
}

/// ffmpeg and ffprobe invoked as child processes.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Ffmpeg {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Run a listing/probe command and return its stdout.
    async fn capture(program: &Path, args: &[String]) -> Result<String> {
        debug!("Running {} {:?}", program.display(), args);
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::transcoder(format!("Failed to run {}: {}", program.display(), e)))?;

        if !output.status.success() {
            return Err(Error::transcoder(format!(
                "{} exited with {}: {}",
                program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a command that writes a file, with output left on the console.
    async fn run(&self, args: &[String]) -> Result<()> {
        debug!("Running {} {:?}", self.ffmpeg.display(), args);
        let status = Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                Error::transcoder(format!("Failed to run {}: {}", self.ffmpeg.display(), e))
            })?;

        if !status.success() {
            return Err(Error::transcoder(format!(
                "ffmpeg failed with exit code {}",
                status.code().unwrap_or(-1)
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Transcoder for Ffmpeg {
    async fn capabilities(&self) -> HwCapabilities {
        let encode = match Self::capture(&self.ffmpeg, &encoders_args()).await {
            Ok(out) => has_hw_encoder(&out),
            Err(e) => {
                warn!("Failed to detect GPU support: {}", e);
                return HwCapabilities::default();
            }
        };
        let decode = match Self::capture(&self.ffmpeg, &decoders_args()).await {
            Ok(out) => has_hw_decoder(&out),
            Err(e) => {
                warn!("Failed to detect GPU decode support: {}", e);
                false
            }
        };

        let caps = HwCapabilities { encode, decode };
        info!("Hardware capabilities: {:?}", caps);
        caps
    }

    async fn probe_video_codec(&self, path: &Path) -> Option<String> {
        match Self::capture(&self.ffprobe, &probe_codec_args(path)).await {
            Ok(out) => Some(out.trim().to_string()).filter(|codec| !codec.is_empty()),
            Err(e) => {
                warn!("Could not probe video codec of {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn remux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        self.run(&remux_args(video, audio, output)).await
    }

    async fn reencode(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        encoder: VideoEncoder,
    ) -> Result<()> {
        self.run(&reencode_args(video, audio, output, encoder))
            .await
    }

    async fn convert_to_wav(&self, input: &Path, output: &Path) -> Result<()> {
        self.run(&wav_args(input, output)).await
    }
}
