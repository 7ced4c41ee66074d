mod cli;
mod config;
mod error;

use crate::{
    cli::Args,
    config::AppConfig,
    error::{AppError, Result},
};
use clap::Parser;
use colored::*;
use std::{io, process};
use tracing::{Level, debug, error, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};
use ytgrab_core::{
    extractor::YtDlp,
    prompt::LineTerminal,
    session::{Session, SessionConfig},
    speed::SpeedHistory,
    tools::{ToolPaths, tool_dir},
    transcoder::Ffmpeg,
};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet)?;

    let tool_dir = tool_dir();
    let config = AppConfig::load(args.config.as_deref(), &tool_dir)?;
    debug!("Config: {:?}", config);

    let tools = ToolPaths::resolve(&tool_dir, &config.tool_overrides());
    debug!(
        "Tools: yt-dlp={}, ffmpeg={}, ffprobe={}",
        tools.ytdlp.display(),
        tools.ffmpeg.display(),
        tools.ffprobe.display()
    );

    let extractor = YtDlp::new(tools.ytdlp.clone());
    let transcoder = Ffmpeg::new(tools.ffmpeg.clone(), tools.ffprobe.clone());
    let history = SpeedHistory::new(config.speed_history_path(&tool_dir));

    let output_root = config.output_root(&tool_dir);
    tokio::fs::create_dir_all(&output_root).await?;

    let session = Session::new(
        &extractor,
        &transcoder,
        &history,
        SessionConfig {
            output_root,
            show_progress: !args.quiet,
        },
    );

    let stdin = io::stdin();
    let mut term = LineTerminal::new(stdin.lock(), io::stdout()).with_clear_screen(true);
    let report = session.run(&mut term).await?;

    info!(
        "Finished {} download of {} ({} file(s))",
        report.mode,
        report.url,
        report.outputs.len()
    );
    println!(
        "{} {}",
        "Saved to".green().bold(),
        report.directory.display()
    );
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(verbose)
                .with_writer(io::stderr),
        )
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))
}
