//! Per-resolution format ranking and the interactive resolution choice.

use serde::Deserialize;
use strum::{EnumIter, IntoEnumIterator};
use tracing::debug;

use crate::Result;
use crate::prompt::Terminal;
use crate::utils::{format_minutes, format_size};

/// Slack applied to the size/speed ratio for the slow and fast estimates.
const TIME_ESTIMATE_FACTOR: f64 = 1.5;

/// One stream as reported by the extractor (a subset of yt-dlp's format dict).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamDescriptor {
    #[serde(default)]
    pub format_id: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    /// Exact size in bytes.
    #[serde(default)]
    pub filesize: Option<f64>,
    /// Approximate size in bytes.
    #[serde(default)]
    pub filesize_approx: Option<f64>,
    /// Average total bitrate in kbit/s.
    #[serde(default)]
    pub tbr: Option<f64>,
}

impl StreamDescriptor {
    pub fn is_audio_only(&self) -> bool {
        self.vcodec.as_deref() == Some("none")
    }
}

/// Target resolution buckets, in menu order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Resolution {
    Uhd8k,
    Uhd4k,
    Qhd,
    FullHd,
}

impl Resolution {
    pub const fn height(self) -> u32 {
        match self {
            Self::Uhd8k => 4320,
            Self::Uhd4k => 2160,
            Self::Qhd => 1440,
            Self::FullHd => 1080,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Uhd8k => "8K",
            Self::Uhd4k => "4K",
            Self::Qhd => "1440p",
            Self::FullHd => "1080p",
        }
    }

    fn from_height(height: u32) -> Option<Self> {
        Self::iter().find(|r| r.height() == height)
    }
}

/// Best-known stream for one resolution bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatCandidate {
    pub resolution: Resolution,
    pub format_id: String,
    pub fps: f64,
    pub ext: String,
    pub vcodec: Option<String>,
    /// Mean of every resolvable size estimate seen for the bucket.
    pub estimated_size: Option<f64>,
}

/// Estimate a stream's size: exact size, then approximate size, then
/// bitrate times duration.
pub fn estimate_size(stream: &StreamDescriptor, duration_secs: Option<f64>) -> Option<f64> {
    if let Some(size) = stream.filesize {
        return Some(size);
    }
    if let Some(size) = stream.filesize_approx {
        return Some(size);
    }
    match (stream.tbr, duration_secs) {
        (Some(tbr), Some(duration)) if tbr != 0.0 && duration != 0.0 => {
            Some((duration * tbr * 1000.0 / 8.0).trunc())
        }
        _ => None,
    }
}

/// Slow and fast download-time estimates in seconds.
///
/// `None` whenever the speed or a non-zero size is unknown.
pub fn time_estimate(size: Option<f64>, speed_bps: Option<u64>) -> Option<(f64, f64)> {
    match (size, speed_bps) {
        (Some(size), Some(speed)) if size != 0.0 && speed != 0 => {
            let base = size / speed as f64;
            Some((base * TIME_ESTIMATE_FACTOR, base / TIME_ESTIMATE_FACTOR))
        }
        _ => None,
    }
}

/// The four resolution buckets and their candidates.
#[derive(Debug, Clone)]
pub struct FormatTable {
    rows: Vec<(Resolution, Option<FormatCandidate>)>,
}

impl FormatTable {
    pub fn build(streams: &[StreamDescriptor], duration_secs: Option<f64>) -> Self {
        let mut rows: Vec<(Resolution, Option<FormatCandidate>, Vec<f64>)> =
            Resolution::iter().map(|r| (r, None, Vec::new())).collect();

        for stream in streams.iter().filter(|s| !s.is_audio_only()) {
            let Some(resolution) = stream.height.and_then(Resolution::from_height) else {
                continue;
            };
            let Some((_, best, estimates)) = rows.iter_mut().find(|(r, _, _)| *r == resolution)
            else {
                continue;
            };

            let estimate = estimate_size(stream, duration_secs);
            if let Some(size) = estimate {
                estimates.push(size);
            }

            let fps = stream.fps.unwrap_or(0.0);
            if best.as_ref().is_none_or(|b| fps > b.fps) {
                *best = Some(FormatCandidate {
                    resolution,
                    format_id: stream.format_id.clone(),
                    fps,
                    ext: stream.ext.clone().unwrap_or_default(),
                    vcodec: stream.vcodec.clone(),
                    estimated_size: estimate,
                });
            }
        }

        let rows = rows
            .into_iter()
            .map(|(resolution, mut best, estimates)| {
                if let Some(candidate) = best.as_mut()
                    && !estimates.is_empty()
                {
                    candidate.estimated_size =
                        Some(estimates.iter().sum::<f64>() / estimates.len() as f64);
                }
                if let Some(candidate) = &best {
                    debug!(
                        "{}: format {} ({} estimates, size {:?})",
                        resolution.label(),
                        candidate.format_id,
                        estimates.len(),
                        candidate.estimated_size
                    );
                }
                (resolution, best)
            })
            .collect();

        Self { rows }
    }

    pub fn candidate(&self, resolution: Resolution) -> Option<&FormatCandidate> {
        self.rows
            .iter()
            .find(|(r, _)| *r == resolution)
            .and_then(|(_, c)| c.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|(_, c)| c.is_none())
    }

    /// Menu rows, numbered from 1.
    pub fn menu_lines(&self, speed_bps: Option<u64>) -> Vec<String> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, (resolution, candidate))| {
                let n = i + 1;
                let label = resolution.label();
                match candidate {
                    Some(c) => {
                        let (slow, fast) = match time_estimate(c.estimated_size, speed_bps) {
                            Some((slow, fast)) => (format_minutes(slow), format_minutes(fast)),
                            None => ("N/A".to_string(), "N/A".to_string()),
                        };
                        format!(
                            "  {n}. {label:>5}{:.0} | {} | {slow} - {fast}",
                            c.fps,
                            format_size(c.estimated_size)
                        )
                    }
                    None => format!("  {n}. {label:>5}   | not available"),
                }
            })
            .collect()
    }
}

/// Show the resolution menu and block until an available bucket is chosen.
pub fn select_format<T: Terminal + ?Sized>(
    term: &mut T,
    table: &FormatTable,
    speed_bps: Option<u64>,
) -> Result<FormatCandidate> {
    term.say("");
    term.say("Select video resolution:");
    for line in table.menu_lines(speed_bps) {
        term.say(&line);
    }

    loop {
        let choice = term.ask("Enter resolution choice (1-4): ")?;
        let resolution = match choice.as_str() {
            "1" => Resolution::Uhd8k,
            "2" => Resolution::Uhd4k,
            "3" => Resolution::Qhd,
            "4" => Resolution::FullHd,
            _ => {
                term.say("Invalid choice, please enter 1-4.");
                continue;
            }
        };

        match table.candidate(resolution) {
            Some(candidate) => return Ok(candidate.clone()),
            None => term.say("That resolution is not available, please choose again."),
        }
    }
}
