use clap::Parser;
use std::path::PathBuf;

/// Interactive YouTube downloader.
///
/// Prompts for a URL, a download mode and a resolution, then fetches the
/// streams with yt-dlp and merges or converts them with ffmpeg.
#[derive(Parser, Debug)]
#[command(name = "ytgrab", version, about, long_about = None)]
pub struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "YTGRAB_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors and hide the re-encode ETA line
    #[arg(short, long)]
    pub quiet: bool,
}
