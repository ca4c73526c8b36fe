//! Procedural backdrop: a slowly rotating mirrored gradient plus three
//! drifting orb glows. Driven only by `(frame, fps)` — no randomness, so the
//! same frame always yields the same layer state.

use serde::{Deserialize, Serialize};

use crate::color::Rgb;
use crate::schema::{CANVAS_HEIGHT, CANVAS_WIDTH};

/// Resolved colors for one composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub primary: Rgb,
    pub secondary: Rgb,
    pub accent: Rgb,
}

/// One soft radial glow. `alpha` is the tint strength at the center; the
/// glow falls off to transparent at 70% of the radius, softened by `blur_px`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orb {
    pub diameter_px: f64,
    pub left_px: f64,
    pub top_px: f64,
    pub color: Rgb,
    pub alpha: f64,
    pub blur_px: f64,
}

/// Background layer state for one frame: gradient primary → secondary →
/// primary along `rotation_degrees`, with three orbs above it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundLayer {
    pub rotation_degrees: f64,
    pub primary: Rgb,
    pub secondary: Rgb,
    pub orbs: [Orb; 3],
}

// Per-orb oscillation: (period_frames, phase, range_low, range_high) as
// fractions of canvas height. Distinct periods and phases keep the motion
// from ever visibly synchronizing.
const ORB_MOTION: [(f64, f64, f64, f64); 3] = [
    (30.0, 0.0, 0.1, 0.3),
    (25.0, 1.0, 0.4, 0.6),
    (35.0, 2.0, 0.6, 0.8),
];

fn lerp(low: f64, high: f64, t: f64) -> f64 {
    low + (high - low) * t
}

fn orb_top(frame: u32, orb: usize) -> f64 {
    let (period, phase, low, high) = ORB_MOTION[orb];
    let wave = (f64::from(frame) / period + phase).sin();
    let height = f64::from(CANVAS_HEIGHT);
    lerp(height * low, height * high, (wave + 1.0) / 2.0)
}

/// Background state at `frame`.
pub fn background_at(frame: u32, fps: u32, theme: &Theme) -> BackgroundLayer {
    let progress = f64::from(frame) / f64::from(fps) * 0.3;
    let rotation_degrees = (progress * 360.0) % 360.0;

    let width = f64::from(CANVAS_WIDTH);
    let orbs = [
        Orb {
            diameter_px: 500.0,
            left_px: width * 0.05,
            top_px: orb_top(frame, 0),
            color: theme.accent,
            alpha: f64::from(0x30_u8) / 255.0,
            blur_px: 80.0,
        },
        Orb {
            diameter_px: 400.0,
            left_px: width - width * 0.1 - 400.0,
            top_px: orb_top(frame, 1),
            color: theme.secondary,
            alpha: f64::from(0x40_u8) / 255.0,
            blur_px: 60.0,
        },
        Orb {
            diameter_px: 350.0,
            left_px: width * 0.35,
            top_px: orb_top(frame, 2),
            color: theme.accent,
            alpha: f64::from(0x25_u8) / 255.0,
            blur_px: 50.0,
        },
    ];

    BackgroundLayer {
        rotation_degrees,
        primary: theme.primary,
        secondary: theme.secondary,
        orbs,
    }
}
