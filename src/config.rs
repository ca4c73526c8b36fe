//! Server configuration resolved from CLI flags and `RRS_*` environment
//! variables. A flag given on the command line always wins over the
//! environment; defaults fill whatever remains.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::encoding::FfmpegMode;

pub const DEFAULT_PORT: u16 = 3333;
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Bearer token required on `/render` when set.
    pub secret: Option<String>,
    pub output_dir: PathBuf,
    pub font_path: Option<PathBuf>,
    pub ffmpeg_mode: FfmpegMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            secret: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            font_path: None,
            ffmpeg_mode: FfmpegMode::Auto,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

impl ServerConfig {
    /// Merge CLI overrides over environment over defaults.
    pub fn resolve(
        port: Option<u16>,
        secret: Option<String>,
        output_dir: Option<PathBuf>,
        font_path: Option<PathBuf>,
        ffmpeg_mode: Option<FfmpegMode>,
    ) -> Result<Self> {
        let defaults = Self::default();

        let port = match port {
            Some(port) => port,
            None => match env_var("RRS_PORT") {
                Some(raw) => raw
                    .parse::<u16>()
                    .with_context(|| format!("invalid RRS_PORT value '{raw}'"))?,
                None => defaults.port,
            },
        };

        let secret = secret.or_else(|| env_var("RRS_SECRET"));
        let output_dir = output_dir
            .or_else(|| env_var("RRS_OUTPUT_DIR").map(PathBuf::from))
            .unwrap_or(defaults.output_dir);
        let font_path = font_path.or_else(|| env_var("RRS_FONT_PATH").map(PathBuf::from));

        let ffmpeg_mode = match ffmpeg_mode {
            Some(mode) => mode,
            None => match env_var("RRS_FFMPEG_MODE") {
                Some(raw) => FfmpegMode::parse(&raw)
                    .with_context(|| format!("invalid RRS_FFMPEG_MODE value '{raw}'"))?,
                None => defaults.ffmpeg_mode,
            },
        };

        Ok(Self {
            port,
            secret,
            output_dir,
            font_path,
            ffmpeg_mode,
        })
    }
}
