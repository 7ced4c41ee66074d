//! Joining a downloaded video stream with its audio stream.
//!
//! The merge walks a small state machine:
//!
//! ```text
//! Probe -> Decide -> Remux    -> Done
//!                 -> Reencode -> Done
//!                 -> Done (declined)
//! ```
//!
//! Hardware encode plus an H.264/HEVC source is remuxed by stream copy.
//! Any other source is re-encoded, on the GPU after the user agrees or on
//! the CPU when no hardware encoder exists. While a re-encode runs an
//! [`EtaMonitor`] estimates the remaining time from the output file size.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Result;
use crate::prompt::{Terminal, confirm};
use crate::transcoder::{HwCapabilities, Transcoder, VideoEncoder};
use crate::utils::format_minutes;

/// Source codecs that are remuxed without re-encoding when a GPU encoder exists.
pub const REMUX_CODECS: [&str; 2] = ["h264", "hevc"];

/// How often the ETA monitor samples the output file.
pub const ETA_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// What the decide step chose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePlan {
    Remux,
    /// GPU available but the codec is not remux-friendly; ask first.
    ConfirmGpuReencode,
    Reencode(VideoEncoder),
}

/// Result of a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Remuxed,
    Reencoded(VideoEncoder),
    /// The user refused a GPU re-encode; nothing was written.
    Declined,
}

/// Decide step: pure function of capabilities and probed codec.
pub fn plan(caps: HwCapabilities, codec: Option<&str>) -> MergePlan {
    if !caps.encode {
        return MergePlan::Reencode(VideoEncoder::X264);
    }
    match codec {
        Some(codec) if REMUX_CODECS.contains(&codec) => MergePlan::Remux,
        _ => MergePlan::ConfirmGpuReencode,
    }
}

enum MergeState {
    Probe,
    Decide {
        caps: HwCapabilities,
        codec: Option<String>,
    },
    Remux,
    Reencode(VideoEncoder),
    Done(MergeOutcome),
}

/// Files taking part in one merge.
#[derive(Debug, Clone)]
pub struct MergeJob {
    pub video: PathBuf,
    pub audio: PathBuf,
    pub output: PathBuf,
}

/// Merges video and audio with a [`Transcoder`], prompting through a [`Terminal`].
pub struct Merger<'a, X: ?Sized> {
    transcoder: &'a X,
    show_progress: bool,
}

impl<'a, X: Transcoder + ?Sized> Merger<'a, X> {
    pub fn new(transcoder: &'a X) -> Self {
        Self {
            transcoder,
            show_progress: true,
        }
    }

    /// Whether to draw the ETA line during re-encodes.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub async fn merge<T: Terminal + ?Sized>(
        &self,
        job: &MergeJob,
        term: &mut T,
    ) -> Result<MergeOutcome> {
        let mut state = MergeState::Probe;
        loop {
            state = match state {
                MergeState::Probe => {
                    let caps = self.transcoder.capabilities().await;
                    let codec = self.transcoder.probe_video_codec(&job.video).await;
                    debug!("Probed {}: codec {:?}", job.video.display(), codec);
                    MergeState::Decide { caps, codec }
                }
                MergeState::Decide { caps, codec } => match plan(caps, codec.as_deref()) {
                    MergePlan::Remux => MergeState::Remux,
                    MergePlan::Reencode(encoder) => {
                        term.say("GPU encoding not available, using CPU...");
                        MergeState::Reencode(encoder)
                    }
                    MergePlan::ConfirmGpuReencode => {
                        if confirm(
                            term,
                            "Video codec not GPU-friendly. Re-encode with GPU? (y) or try another format? (n): ",
                        )? {
                            MergeState::Reencode(VideoEncoder::Nvenc)
                        } else {
                            term.say("Aborting merge. Please select another format with GPU-friendly codec.");
                            MergeState::Done(MergeOutcome::Declined)
                        }
                    }
                },
                MergeState::Remux => {
                    term.say("GPU-friendly codec detected, remuxing without re-encode...");
                    self.transcoder
                        .remux(&job.video, &job.audio, &job.output)
                        .await?;
                    MergeState::Done(MergeOutcome::Remuxed)
                }
                MergeState::Reencode(encoder) => {
                    self.reencode(job, encoder, term).await?;
                    MergeState::Done(MergeOutcome::Reencoded(encoder))
                }
                MergeState::Done(outcome) => {
                    info!("Merge of {} finished: {:?}", job.output.display(), outcome);
                    return Ok(outcome);
                }
            };
        }
    }

    async fn reencode<T: Terminal + ?Sized>(
        &self,
        job: &MergeJob,
        encoder: VideoEncoder,
        term: &mut T,
    ) -> Result<()> {
        term.say(&format!(
            "Merging video + audio using {} encoding...",
            encoder.device()
        ));

        let expected_total = file_len(&job.video).await + file_len(&job.audio).await;
        let bar = if self.show_progress {
            eta_bar()
        } else {
            ProgressBar::hidden()
        };
        let monitor = EtaMonitor::spawn(job.output.clone(), expected_total, bar);

        let result = self
            .transcoder
            .reencode(&job.video, &job.audio, &job.output, encoder)
            .await;
        monitor.stop().await;
        result?;

        term.say("Merge completed.");
        Ok(())
    }
}

async fn file_len(path: &Path) -> u64 {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.len(),
        Err(e) => {
            warn!("Could not stat {}: {}", path.display(), e);
            0
        }
    }
}

fn eta_bar() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar
}

/// Remaining time for a re-encode that has written `current` of an
/// expected `expected_total` bytes after `elapsed`.
pub fn estimate_eta(current: u64, expected_total: u64, elapsed: Duration) -> Duration {
    let speed = current as f64 / elapsed.as_secs_f64().max(0.1);
    let remaining = expected_total.saturating_sub(current) as f64;
    Duration::try_from_secs_f64(remaining / speed.max(0.1)).unwrap_or(Duration::MAX)
}

/// Background task printing the re-encode ETA once per tick.
///
/// It reads only the output file's size and stops when its token is
/// cancelled; [`EtaMonitor::stop`] cancels and joins it.
pub struct EtaMonitor {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl EtaMonitor {
    pub fn spawn(output: PathBuf, expected_total: u64, bar: ProgressBar) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            let start = Instant::now();
            let mut tick = tokio::time::interval(ETA_POLL_INTERVAL);

            loop {
                tokio::select! {
                    biased;

                    _ = task_token.cancelled() => break,
                    _ = tick.tick() => {}
                }

                if let Ok(meta) = tokio::fs::metadata(&output).await {
                    let eta = estimate_eta(meta.len(), expected_total, start.elapsed());
                    bar.set_message(format!(
                        "Re-encoding ETA: {}",
                        format_minutes(eta.as_secs_f64())
                    ));
                    bar.tick();
                }
            }

            bar.finish_and_clear();
        });

        Self { token, handle }
    }

    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!("ETA monitor ended abnormally: {}", e);
        }
    }
}
