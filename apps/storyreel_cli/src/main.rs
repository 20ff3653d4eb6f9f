mod stores;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storyreel_render::probe::Ffprobe;
use storyreel_render::storage::LocalStorage;
use storyreel_render::{Collaborators, ComposeConfig, ComposeRequest, Composer};
use tracing::{error, info};
use uuid::Uuid;

use crate::stores::{DirLayoutStore, FileStoryStore, JsonArtifactStore, LogSink};

#[derive(Parser, Debug)]
#[command(name = "storyreel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compose a narrated video from a story JSON file.
    Compose(ComposeArgs),
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Story with pages, as JSON.
    #[arg(long)]
    story: PathBuf,

    /// Directory of saved layouts (`<layout id>.json`).
    #[arg(long)]
    layouts: Option<PathBuf>,

    /// Where relative media paths resolve. Defaults to the story's directory.
    #[arg(long)]
    media_root: Option<PathBuf>,

    /// Output directory, relative to the media root unless absolute.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    #[arg(long)]
    ffprobe: Option<PathBuf>,

    /// Directory of extra `.ttf`/`.otf` faces captions may name. Repeatable.
    #[arg(long = "fonts", value_name = "DIR")]
    font_dirs: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Compose(args) => cmd_compose(args).await,
    }
}

async fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let mut config = ComposeConfig::from_env()?;
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(bin) = args.ffmpeg {
        config.ffmpeg = bin;
    }
    if let Some(bin) = args.ffprobe {
        config.ffprobe = bin;
    }
    config.font_dirs.extend(args.font_dirs);
    check_dependencies(&config)?;

    let media_root = match args.media_root {
        Some(root) => root,
        None => args
            .story
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    let stories = FileStoryStore::load(&args.story).await?;
    let story_id = stories.story_id();
    let storage = Arc::new(LocalStorage::new(&media_root, Ffprobe::new(&config.ffprobe)));
    let artifacts = JsonArtifactStore::new(
        Arc::clone(&storage),
        media_root.join(&config.output_dir),
    );

    let composer = Composer::new(
        Collaborators {
            stories: Arc::new(stories),
            layouts: Arc::new(DirLayoutStore::new(args.layouts)),
            storage,
            artifacts: Arc::new(artifacts),
            sink: Arc::new(LogSink),
        },
        config,
    )?;

    let request = ComposeRequest {
        task_id: Uuid::new_v4(),
        story_id,
        video_id: Uuid::new_v4(),
    };

    // Ctrl-C kills the encoder instead of orphaning it.
    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    match composer.compose(request, Some(cancel_rx)).await {
        Ok(artifact) => {
            let path = artifact.path.as_deref().unwrap_or(Path::new(""));
            info!(path = %path.display(), duration = ?artifact.duration, "video ready");
            println!("{}", path.display());
            Ok(())
        }
        Err(e) => {
            error!(kind = %e.kind(), "composition failed");
            Err(e).context("composition failed")
        }
    }
}

fn check_dependencies(config: &ComposeConfig) -> anyhow::Result<()> {
    let deps = [
        (&config.ffmpeg, "video encoding"),
        (&config.ffprobe, "narration duration probing"),
    ];

    let missing: Vec<String> = deps
        .iter()
        .filter(|(bin, _)| {
            std::process::Command::new(bin)
                .arg("-version")
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .status()
                .is_err()
        })
        .map(|(bin, purpose)| format!("{} ({purpose})", bin.display()))
        .collect();

    if !missing.is_empty() {
        anyhow::bail!(
            "missing required tools: {}. Install ffmpeg (e.g. `sudo apt install ffmpeg`) or pass --ffmpeg/--ffprobe",
            missing.join(", ")
        );
    }
    Ok(())
}
