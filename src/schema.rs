use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::color::parse_hex;

/// Render rate is fixed; the composition contract is defined in frames at
/// this rate.
pub const FPS: u32 = 30;
/// Vertical short-form canvas.
pub const CANVAS_WIDTH: u32 = 1080;
pub const CANVAS_HEIGHT: u32 = 1920;
/// Clips are capped at one minute.
pub const MAX_DURATION_SECONDS: f64 = 60.0;

/// One narration word with its spoken interval, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// Caption treatment. Each style fixes its page size and rendering strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionStyle {
    TiktokBounce,
    HighlightWord,
    SubtitleClassic,
}

impl CaptionStyle {
    /// Words shown per caption page.
    pub fn words_per_group(self) -> usize {
        match self {
            CaptionStyle::TiktokBounce | CaptionStyle::HighlightWord => 3,
            CaptionStyle::SubtitleClassic => 6,
        }
    }
}

/// Input props for one composition render, camelCase on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompositionProps {
    /// Narration audio; empty means no audio track.
    #[serde(default)]
    pub audio_url: String,
    pub word_timestamps: Vec<WordTiming>,
    /// Clip length in seconds, `0 < duration <= 60`.
    pub duration: f64,
    pub caption_style: CaptionStyle,
    pub primary_color: String,
    pub accent_color: String,
    /// Defaults to a brightness-adjusted `primary_color` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_color: Option<String>,
}

impl CompositionProps {
    /// Reject anything the renderer cannot safely consume: out-of-range
    /// duration, malformed colors, or a timeline that is unsorted,
    /// overlapping, or has empty word intervals.
    pub fn validate(&self) -> Result<()> {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            bail!("duration must be > 0 seconds, got {}", self.duration);
        }
        if self.duration > MAX_DURATION_SECONDS {
            bail!(
                "duration must be <= {MAX_DURATION_SECONDS} seconds, got {}",
                self.duration
            );
        }

        parse_hex(&self.primary_color)?;
        parse_hex(&self.accent_color)?;
        if let Some(secondary) = &self.secondary_color {
            parse_hex(secondary)?;
        }

        for (index, timing) in self.word_timestamps.iter().enumerate() {
            if !timing.start.is_finite() || !timing.end.is_finite() {
                bail!("word {index} ('{}') has non-finite timing", timing.word);
            }
            if timing.start >= timing.end {
                bail!(
                    "word {index} ('{}') must have start < end, got [{}, {}]",
                    timing.word,
                    timing.start,
                    timing.end
                );
            }
            if let Some(next) = self.word_timestamps.get(index + 1) {
                if timing.end > next.start {
                    bail!(
                        "word {index} ('{}') ends at {} after word {} ('{}') starts at {}",
                        timing.word,
                        timing.end,
                        index + 1,
                        next.word,
                        next.start
                    );
                }
            }
        }

        Ok(())
    }
}
