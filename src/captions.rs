//! Per-frame caption state: which page of words is visible, which word is
//! active, and where each word sits in its entrance animation.

use serde::{Deserialize, Serialize};

use crate::color::Rgb;
use crate::schema::{CaptionStyle, WordTiming};
use crate::timeline::{current_word_index, frame_to_time, group_start};

// Damped-spring entrance response, matching a harmonic oscillator with
// stiffness 200, damping 10, mass 0.5: natural frequency 20 rad/s, damping
// ratio 0.5 (underdamped, so the word overshoots and settles).
const SPRING_STIFFNESS: f64 = 200.0;
const SPRING_DAMPING: f64 = 10.0;
const SPRING_MASS: f64 = 0.5;

/// Closed-form spring response after `elapsed_frames` at `fps`: 0 at rest,
/// rises past 1, converges to 1.
pub fn spring_progress(elapsed_frames: f64, fps: f64) -> f64 {
    if elapsed_frames <= 0.0 {
        return 0.0;
    }
    let t = elapsed_frames / fps;

    let omega_n = (SPRING_STIFFNESS / SPRING_MASS).sqrt();
    let zeta = SPRING_DAMPING / (2.0 * (SPRING_STIFFNESS * SPRING_MASS).sqrt());
    let omega_d = omega_n * (1.0 - zeta * zeta).sqrt();

    let decay = (-zeta * omega_n * t).exp();
    let phase = omega_d * t;
    1.0 - decay * (phase.cos() + (zeta * omega_n / omega_d) * phase.sin())
}

/// Piecewise-linear interpolation through `(inputs[i], outputs[i])` knots,
/// extending the end segments linearly beyond the knot range.
pub fn interpolate(value: f64, inputs: &[f64], outputs: &[f64]) -> f64 {
    debug_assert!(inputs.len() == outputs.len() && inputs.len() >= 2);

    let last = inputs.len() - 1;
    let segment = if value <= inputs[0] {
        0
    } else if value >= inputs[last] {
        last - 1
    } else {
        inputs.partition_point(|input| *input <= value) - 1
    };

    let span = inputs[segment + 1] - inputs[segment];
    let t = (value - inputs[segment]) / span;
    outputs[segment] + (outputs[segment + 1] - outputs[segment]) * t
}

/// One word of a bounce-style caption page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BounceWord {
    /// Upper-cased display text.
    pub text: String,
    pub color: Rgb,
    pub is_current: bool,
    pub scale: f64,
    pub translate_y_px: f64,
}

/// One word of a highlight-style caption page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightSpan {
    pub text: String,
    /// Active word gets a filled accent chip behind it.
    pub highlighted: bool,
}

/// Caption layer state for one frame. Absent entirely when the visible page
/// would be empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum CaptionLayer {
    TiktokBounce { words: Vec<BounceWord> },
    HighlightWord { words: Vec<HighlightSpan>, accent: Rgb },
    SubtitleClassic { line: String },
}

/// Caption state at `frame`. The visible page is the fixed-size word group
/// containing the active word (page 0 before narration starts).
pub fn caption_at(
    frame: u32,
    fps: u32,
    words: &[WordTiming],
    style: CaptionStyle,
    accent: Rgb,
) -> Option<CaptionLayer> {
    let time = frame_to_time(frame, fps);
    let current = current_word_index(time, words);
    let group_size = style.words_per_group();
    let start = group_start(current, group_size);
    let visible = &words[start.min(words.len())..(start + group_size).min(words.len())];
    if visible.is_empty() {
        return None;
    }

    let layer = match style {
        CaptionStyle::TiktokBounce => CaptionLayer::TiktokBounce {
            words: visible
                .iter()
                .enumerate()
                .map(|(offset, timing)| {
                    let is_current = current == Some(start + offset);
                    // Only the active word animates; the rest of the page
                    // sits at rest.
                    let progress = if is_current {
                        let word_frame = (timing.start * f64::from(fps)).floor();
                        spring_progress(f64::from(frame) - word_frame, f64::from(fps))
                    } else {
                        1.0
                    };
                    BounceWord {
                        text: timing.word.to_uppercase(),
                        color: if is_current { accent } else { Rgb::WHITE },
                        is_current,
                        scale: interpolate(progress, &[0.0, 1.0], &[0.7, 1.0]),
                        translate_y_px: interpolate(
                            progress,
                            &[0.0, 0.5, 1.0],
                            &[30.0, -15.0, 0.0],
                        ),
                    }
                })
                .collect(),
        },
        CaptionStyle::HighlightWord => CaptionLayer::HighlightWord {
            words: visible
                .iter()
                .enumerate()
                .map(|(offset, timing)| HighlightSpan {
                    text: timing.word.clone(),
                    highlighted: current == Some(start + offset),
                })
                .collect(),
            accent,
        },
        CaptionStyle::SubtitleClassic => CaptionLayer::SubtitleClassic {
            line: visible
                .iter()
                .map(|timing| timing.word.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        },
    };

    Some(layer)
}
