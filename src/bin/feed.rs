//! `reels-feed` — a small terminal client for the Video Reels server.
//!
//! Features:
//! - swipe through a randomized feed (arrow keys / j,k / mouse wheel)
//! - preloads neighboring clips for instant navigation
//! - Space: pause/resume; m: mute toggle; r: refresh; q: quit
//! - `upload` subcommand to publish a clip with team name + description

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use video_reels::server_api;
use video_reels::viewer;

#[derive(Parser, Debug)]
#[command(name = "reels-feed", version)]
struct Args {
    /// Base URL of the reels server, e.g. http://localhost:5000
    #[arg(long, default_value = "http://localhost:5000")]
    server: String,

    /// Directory for preloaded clips (defaults to a per-session temp dir).
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Client-side upload size ceiling in megabytes. The server enforces
    /// its own limit regardless.
    #[arg(long, default_value_t = 50)]
    max_upload_mb: u64,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a video, then exit.
    Upload {
        /// Path to an .mp4 or .mov file.
        file: PathBuf,
        #[arg(long)]
        team_name: String,
        #[arg(long)]
        description: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Some(Command::Upload {
            file,
            team_name,
            description,
        }) => upload(
            &args.server,
            &file,
            &team_name,
            &description,
            args.max_upload_mb * 1024 * 1024,
        ),
        None => {
            let cache_dir = args.cache_dir.unwrap_or_else(|| {
                std::env::temp_dir().join(format!("reels-feed-{}", std::process::id()))
            });
            viewer::run_viewer(args.server, cache_dir)
        }
    }
}

fn upload(
    server: &str,
    file: &Path,
    team_name: &str,
    description: &str,
    max_file_size: u64,
) -> Result<()> {
    let client = server_api::make_client()?;

    let (progress_tx, progress_rx) = crossbeam_channel::unbounded::<(u64, u64)>();
    let printer = std::thread::spawn(move || {
        let mut last_pct = u64::MAX;
        while let Ok((sent, total)) = progress_rx.recv() {
            let pct = if total == 0 { 100 } else { sent * 100 / total };
            if pct != last_pct {
                eprint!("\rUploading… {pct:>3}%");
                let _ = std::io::stderr().flush();
                last_pct = pct;
            }
        }
        eprintln!();
    });

    let result = server_api::upload_video(
        &client,
        server,
        file,
        team_name,
        description,
        max_file_size,
        progress_tx,
    );
    let _ = printer.join();

    let video_url = result?;
    println!("Uploaded: {video_url}");

    // Re-fetch the feed so the new clip's discoverability is confirmed,
    // like the viewer does after its own fetches. The listing is a random
    // sample, so absence here is not an error.
    match server_api::fetch_videos(&client, server) {
        Ok(videos) if videos.iter().any(|v| v.url == video_url) => {
            println!("Video is live in the feed.");
        }
        Ok(_) => println!("Upload stored; it will appear in upcoming batches."),
        Err(e) => eprintln!("Could not refresh the feed: {e:#}"),
    }
    Ok(())
}
