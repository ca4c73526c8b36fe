//! Frame compositor: the deterministic mapping from `(frame, props)` to the
//! composite layer state an encoding backend consumes. No pixels are
//! produced here; see `raster` for the CPU pixel backend.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::background::{background_at, BackgroundLayer, Theme};
use crate::captions::{caption_at, CaptionLayer};
use crate::color::{adjust_color, parse_hex, Rgb};
use crate::schema::{CompositionProps, FPS};
use crate::timeline::{fade_opacity, total_frames};

/// Audio track reference carried through to the encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub src: String,
}

/// Complete composite state for one frame, bottom to top: background, then
/// captions, with the global fade applied over the whole stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameComposite {
    pub frame: u32,
    pub opacity: f64,
    pub background: BackgroundLayer,
    pub caption: Option<CaptionLayer>,
    pub audio: Option<AudioTrack>,
}

/// A validated, color-resolved composition ready for per-frame evaluation.
#[derive(Debug, Clone)]
pub struct Composition {
    props: CompositionProps,
    theme: Theme,
    accent: Rgb,
    total_frames: u32,
}

impl Composition {
    /// Validate props and resolve colors once. `secondary_color` defaults to
    /// the primary brightened by 30%.
    pub fn prepare(props: &CompositionProps) -> Result<Self> {
        props.validate()?;

        let primary = parse_hex(&props.primary_color)?;
        let accent = parse_hex(&props.accent_color)?;
        let secondary_hex = match &props.secondary_color {
            Some(hex) => hex.clone(),
            None => adjust_color(&props.primary_color, 30.0)
                .context("failed to derive secondary color")?,
        };
        let secondary = parse_hex(&secondary_hex)?;

        Ok(Self {
            props: props.clone(),
            theme: Theme {
                primary,
                secondary,
                accent,
            },
            accent,
            total_frames: total_frames(props.duration, FPS),
        })
    }

    pub fn total_frames(&self) -> u32 {
        self.total_frames
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Composite state at `frame`. Pure: identical inputs produce identical
    /// output, which is what makes the renderer testable without an encoder.
    pub fn frame_at(&self, frame: u32) -> FrameComposite {
        let opacity = fade_opacity(frame, self.total_frames, FPS);
        let background = background_at(frame, FPS, &self.theme);
        let caption = caption_at(
            frame,
            FPS,
            &self.props.word_timestamps,
            self.props.caption_style,
            self.accent,
        );
        let audio = if self.props.audio_url.is_empty() {
            None
        } else {
            Some(AudioTrack {
                src: self.props.audio_url.clone(),
            })
        };

        FrameComposite {
            frame,
            opacity,
            background,
            caption,
            audio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Composition;
    use crate::schema::{CaptionStyle, CompositionProps, WordTiming};

    fn props() -> CompositionProps {
        CompositionProps {
            audio_url: String::new(),
            word_timestamps: vec![WordTiming {
                word: "Hi".to_owned(),
                start: 0.0,
                end: 0.4,
            }],
            duration: 2.0,
            caption_style: CaptionStyle::TiktokBounce,
            primary_color: "#0f0f23".to_owned(),
            accent_color: "#ff5c00".to_owned(),
            secondary_color: None,
        }
    }

    #[test]
    fn secondary_color_defaults_to_brightened_primary() {
        let composition = Composition::prepare(&props()).expect("composition should prepare");
        assert_eq!(composition.theme().secondary.to_hex(), "#5c5c70");
    }

    #[test]
    fn explicit_secondary_color_wins() {
        let mut p = props();
        p.secondary_color = Some("#123456".to_owned());
        let composition = Composition::prepare(&p).expect("composition should prepare");
        assert_eq!(composition.theme().secondary.to_hex(), "#123456");
    }

    #[test]
    fn audio_track_present_only_when_url_set() {
        let composition = Composition::prepare(&props()).expect("composition should prepare");
        assert!(composition.frame_at(0).audio.is_none());

        let mut p = props();
        p.audio_url = "https://example.com/a.mp3".to_owned();
        let composition = Composition::prepare(&p).expect("composition should prepare");
        let audio = composition.frame_at(0).audio.expect("audio track expected");
        assert_eq!(audio.src, "https://example.com/a.mp3");
    }

    #[test]
    fn prepare_rejects_invalid_props() {
        let mut p = props();
        p.duration = 120.0;
        assert!(Composition::prepare(&p).is_err());
    }
}
