//! End-to-end render: evaluate every frame of a prepared composition,
//! rasterize it, and stream the pixels into the encoder.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use fontdue::Font;
use tracing::{debug, info};

use crate::bundle::CompositionDescriptor;
use crate::compositor::Composition;
use crate::encoding::{EncodeSettings, FfmpegMode, FfmpegPipe};
use crate::raster::rasterize;

/// Wall-clock accounting for one finished render.
#[derive(Debug, Clone, Copy)]
pub struct RenderStats {
    pub frames: u32,
    pub elapsed_seconds: f64,
}

pub fn render_media(
    descriptor: &CompositionDescriptor,
    composition: &Composition,
    font: Option<&Font>,
    output_path: &Path,
    ffmpeg_mode: FfmpegMode,
) -> Result<RenderStats> {
    let started = Instant::now();
    let total = composition.total_frames();

    let audio_url = composition
        .frame_at(0)
        .audio
        .map(|track| track.src);
    let settings = EncodeSettings {
        width: descriptor.width,
        height: descriptor.height,
        fps: descriptor.fps,
        audio_url,
    };

    info!(
        frames = total,
        width = settings.width,
        height = settings.height,
        fps = settings.fps,
        output = %output_path.display(),
        "starting render"
    );

    let pipe = FfmpegPipe::spawn_with_mode(&settings, output_path, ffmpeg_mode)
        .context("failed to start encoder")?;

    for frame in 0..total {
        let composite = composition.frame_at(frame);
        let pixels = rasterize(&composite, font);
        pipe.write_frame(pixels)
            .with_context(|| format!("failed to encode frame {frame}"))?;
        if frame > 0 && frame % descriptor.fps == 0 {
            debug!(frame, total, "render progress");
        }
    }

    pipe.finish().context("encoder did not finish cleanly")?;

    let elapsed_seconds = started.elapsed().as_secs_f64();
    info!(
        frames = total,
        elapsed_seconds = format!("{elapsed_seconds:.2}"),
        "render complete"
    );

    Ok(RenderStats {
        frames: total,
        elapsed_seconds,
    })
}
