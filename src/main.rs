use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rrs::bundle::BundleCache;
use rrs::compositor::Composition;
use rrs::config::ServerConfig;
use rrs::encoding::FfmpegMode;
use rrs::render::render_media;
use rrs::schema::CompositionProps;
use rrs::server;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("RRS_GIT_HASH"), ")");

#[derive(Parser)]
#[command(name = "rrs", version = VERSION, about = "Reel render service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP render service.
    Serve {
        #[arg(long)]
        port: Option<u16>,
        /// Bearer token required on /render.
        #[arg(long)]
        secret: Option<String>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long)]
        font_path: Option<PathBuf>,
        #[arg(long, value_parser = FfmpegMode::parse)]
        ffmpeg: Option<FfmpegMode>,
    },
    /// Render one composition from a props JSON file.
    Render {
        #[arg(long)]
        props: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value = "SimpleReel")]
        composition: String,
        #[arg(long)]
        font_path: Option<PathBuf>,
        #[arg(long, value_parser = FfmpegMode::parse)]
        ffmpeg: Option<FfmpegMode>,
    },
    /// Validate a props JSON file without rendering.
    Check {
        #[arg(long)]
        props: PathBuf,
    },
}

fn load_props(path: &PathBuf) -> Result<CompositionProps> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read props file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse props file {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve {
            port,
            secret,
            output_dir,
            font_path,
            ffmpeg,
        } => {
            let config = ServerConfig::resolve(port, secret, output_dir, font_path, ffmpeg)?;
            server::serve(config).await
        }
        Command::Render {
            props,
            output,
            composition: composition_id,
            font_path,
            ffmpeg,
        } => {
            let config = ServerConfig::resolve(None, None, None, font_path, ffmpeg)?;
            let props = load_props(&props)?;
            let composition = Composition::prepare(&props)?;

            let cache = BundleCache::new(config.font_path.clone());
            let bundle = cache.get_or_build().await?;
            let descriptor = *bundle
                .composition(&composition_id)
                .with_context(|| format!("unknown composition '{composition_id}'"))?;

            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let ffmpeg_mode = config.ffmpeg_mode;
            let stats = tokio::task::spawn_blocking(move || {
                render_media(
                    &descriptor,
                    &composition,
                    bundle.font(),
                    &output,
                    ffmpeg_mode,
                )
            })
            .await
            .context("render task panicked")??;
            println!(
                "rendered {} frames in {:.2}s",
                stats.frames, stats.elapsed_seconds
            );
            Ok(())
        }
        Command::Check { props } => {
            let path = props;
            let props = load_props(&path)?;
            let composition = Composition::prepare(&props)?;
            println!(
                "{} is valid: {} frames ({:.2}s, style {:?})",
                path.display(),
                composition.total_frames(),
                props.duration,
                props.caption_style
            );
            Ok(())
        }
    }
}
