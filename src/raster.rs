//! CPU pixel backend: turns one `FrameComposite` into an RGBA frame for the
//! encoder. Layout constants (font sizes, paddings, the caption band) live
//! here; all timing-driven state arrives in the composite.

use fontdue::Font;

use crate::background::{BackgroundLayer, Orb};
use crate::captions::CaptionLayer;
use crate::color::Rgb;
use crate::compositor::FrameComposite;
use crate::schema::{CANVAS_HEIGHT, CANVAS_WIDTH};

const BOUNCE_FONT_PX: f32 = 72.0;
const HIGHLIGHT_FONT_PX: f32 = 52.0;
const CLASSIC_FONT_PX: f32 = 44.0;
const BOUNCE_WORD_GAP_PX: f32 = 16.0;
const HIGHLIGHT_WORD_GAP_PX: f32 = 14.0;
// Dark caption plate, rgba(0,0,0,0.85).
const PLATE_ALPHA: f64 = 0.85;
// Caption band sits 20% of the canvas above the bottom edge.
const CAPTION_BOTTOM_FRACTION: f32 = 0.2;

/// Rasterize the composite into an opaque RGBA8 frame, bottom to top:
/// gradient, orbs, captions, then the global fade scaling toward black.
pub fn rasterize(composite: &FrameComposite, font: Option<&Font>) -> Vec<u8> {
    let width = CANVAS_WIDTH;
    let height = CANVAS_HEIGHT;
    let mut pixels = vec![0_u8; width as usize * height as usize * 4];

    paint_gradient(&mut pixels, width, height, &composite.background);
    for orb in &composite.background.orbs {
        paint_orb(&mut pixels, width, height, orb);
    }
    if let Some(caption) = &composite.caption {
        paint_caption(&mut pixels, width, height, caption, font);
    }
    apply_fade(&mut pixels, composite.opacity);

    pixels
}

/// Mirrored two-stop gradient (primary → secondary → primary) along the
/// rotation axis. Angle follows the CSS convention: 0° points up, growing
/// clockwise, with the gradient line through the canvas center.
fn paint_gradient(pixels: &mut [u8], width: u32, height: u32, background: &BackgroundLayer) {
    let theta = background.rotation_degrees.to_radians();
    let (dir_x, dir_y) = (theta.sin(), -theta.cos());
    let line_length =
        (f64::from(width) * dir_x).abs() + (f64::from(height) * dir_y).abs();
    let center_x = f64::from(width) / 2.0;
    let center_y = f64::from(height) / 2.0;

    for y in 0..height {
        let offset_y = (f64::from(y) - center_y) * dir_y;
        for x in 0..width {
            let offset = (f64::from(x) - center_x) * dir_x + offset_y;
            let t = if line_length > 0.0 {
                (0.5 + offset / line_length).clamp(0.0, 1.0)
            } else {
                0.5
            };
            // 0 → primary, 0.5 → secondary, 1 → primary.
            let blend = 1.0 - (2.0 * t - 1.0).abs();
            let color = mix(background.primary, background.secondary, blend);
            let index = pixel_offset(width, x, y);
            pixels[index] = color.r;
            pixels[index + 1] = color.g;
            pixels[index + 2] = color.b;
            pixels[index + 3] = 255;
        }
    }
}

/// Soft radial glow. The tint fades linearly to nothing at 70% of the blur-
/// extended radius, approximating the original's blurred radial gradient.
fn paint_orb(pixels: &mut [u8], width: u32, height: u32, orb: &Orb) {
    let radius = orb.diameter_px / 2.0;
    let extent = radius + orb.blur_px;
    let center_x = orb.left_px + radius;
    let center_y = orb.top_px + radius;

    let min_x = ((center_x - extent).floor().max(0.0)) as u32;
    let max_x = ((center_x + extent).ceil().min(f64::from(width))) as u32;
    let min_y = ((center_y - extent).floor().max(0.0)) as u32;
    let max_y = ((center_y + extent).ceil().min(f64::from(height))) as u32;

    for y in min_y..max_y {
        for x in min_x..max_x {
            let dx = f64::from(x) + 0.5 - center_x;
            let dy = f64::from(y) + 0.5 - center_y;
            let normalized = (dx * dx + dy * dy).sqrt() / extent;
            let falloff = (1.0 - normalized / 0.7).clamp(0.0, 1.0);
            if falloff <= 0.0 {
                continue;
            }
            blend_src_over(
                pixels,
                pixel_offset(width, x, y),
                orb.color,
                orb.alpha * falloff,
            );
        }
    }
}

fn paint_caption(
    pixels: &mut [u8],
    width: u32,
    height: u32,
    caption: &CaptionLayer,
    font: Option<&Font>,
) {
    let band_bottom = height as f32 * (1.0 - CAPTION_BOTTOM_FRACTION);

    match caption {
        CaptionLayer::TiktokBounce { words } => {
            let baseline = band_bottom;
            let widths: Vec<f32> = words
                .iter()
                .map(|word| measure_text(font, &word.text, BOUNCE_FONT_PX))
                .collect();
            let total: f32 =
                widths.iter().sum::<f32>() + BOUNCE_WORD_GAP_PX * (words.len().max(1) - 1) as f32;
            let mut x = (width as f32 - total) / 2.0;

            for (word, word_width) in words.iter().zip(&widths) {
                // Scale about the word center; layout keeps natural widths so
                // neighbors never shift while a word animates.
                let scaled_px = BOUNCE_FONT_PX * word.scale as f32;
                let center = x + word_width / 2.0;
                let scaled_width = measure_text(font, &word.text, scaled_px);
                draw_text(
                    pixels,
                    width,
                    height,
                    font,
                    &word.text,
                    center - scaled_width / 2.0,
                    baseline + word.translate_y_px as f32,
                    scaled_px,
                    word.color,
                );
                x += word_width + BOUNCE_WORD_GAP_PX;
            }
        }
        CaptionLayer::HighlightWord { words, accent } => {
            let baseline = band_bottom;
            let widths: Vec<f32> = words
                .iter()
                .map(|span| measure_text(font, &span.text, HIGHLIGHT_FONT_PX))
                .collect();
            let total: f32 = widths.iter().sum::<f32>()
                + HIGHLIGHT_WORD_GAP_PX * (words.len().max(1) - 1) as f32;

            paint_plate(
                pixels,
                width,
                height,
                (width as f32 - total) / 2.0 - 36.0,
                baseline - HIGHLIGHT_FONT_PX - 20.0,
                total + 72.0,
                HIGHLIGHT_FONT_PX + 40.0,
                Rgb { r: 0, g: 0, b: 0 },
                PLATE_ALPHA,
            );

            let mut x = (width as f32 - total) / 2.0;
            for (span, word_width) in words.iter().zip(&widths) {
                if span.highlighted {
                    paint_plate(
                        pixels,
                        width,
                        height,
                        x - 8.0,
                        baseline - HIGHLIGHT_FONT_PX - 6.0,
                        word_width + 16.0,
                        HIGHLIGHT_FONT_PX + 12.0,
                        *accent,
                        1.0,
                    );
                }
                draw_text(
                    pixels,
                    width,
                    height,
                    font,
                    &span.text,
                    x,
                    baseline,
                    HIGHLIGHT_FONT_PX,
                    Rgb::WHITE,
                );
                x += word_width + HIGHLIGHT_WORD_GAP_PX;
            }
        }
        CaptionLayer::SubtitleClassic { line } => {
            let baseline = band_bottom;
            let line_width = measure_text(font, line, CLASSIC_FONT_PX);
            paint_plate(
                pixels,
                width,
                height,
                (width as f32 - line_width) / 2.0 - 32.0,
                baseline - CLASSIC_FONT_PX - 16.0,
                line_width + 64.0,
                CLASSIC_FONT_PX + 32.0,
                Rgb { r: 0, g: 0, b: 0 },
                PLATE_ALPHA,
            );
            draw_text(
                pixels,
                width,
                height,
                font,
                line,
                (width as f32 - line_width) / 2.0,
                baseline,
                CLASSIC_FONT_PX,
                Rgb::WHITE,
            );
        }
    }
}

fn paint_plate(
    pixels: &mut [u8],
    width: u32,
    height: u32,
    left: f32,
    top: f32,
    plate_width: f32,
    plate_height: f32,
    color: Rgb,
    alpha: f64,
) {
    let min_x = left.floor().max(0.0) as u32;
    let max_x = ((left + plate_width).ceil() as u32).min(width);
    let min_y = top.floor().max(0.0) as u32;
    let max_y = ((top + plate_height).ceil() as u32).min(height);

    for y in min_y..max_y {
        for x in min_x..max_x {
            blend_src_over(pixels, pixel_offset(width, x, y), color, alpha);
        }
    }
}

fn measure_text(font: Option<&Font>, text: &str, px: f32) -> f32 {
    match font {
        Some(font) => text
            .chars()
            .map(|ch| font.metrics(ch, px).advance_width)
            .sum(),
        // Pill fallback: approximate advance for block glyphs.
        None => text.chars().count() as f32 * px * 0.6,
    }
}

fn draw_text(
    pixels: &mut [u8],
    width: u32,
    height: u32,
    font: Option<&Font>,
    text: &str,
    left: f32,
    baseline: f32,
    px: f32,
    color: Rgb,
) {
    match font {
        Some(font) => {
            let mut x = left;
            for ch in text.chars() {
                let (metrics, coverage) = font.rasterize(ch, px);
                let glyph_left = x + metrics.xmin as f32;
                let glyph_top = baseline - metrics.ymin as f32 - metrics.height as f32;
                for row in 0..metrics.height {
                    for col in 0..metrics.width {
                        let alpha = f64::from(coverage[row * metrics.width + col]) / 255.0;
                        if alpha <= 0.0 {
                            continue;
                        }
                        let px_x = glyph_left + col as f32;
                        let px_y = glyph_top + row as f32;
                        if px_x < 0.0 || px_y < 0.0 {
                            continue;
                        }
                        let (px_x, px_y) = (px_x as u32, px_y as u32);
                        if px_x >= width || px_y >= height {
                            continue;
                        }
                        blend_src_over(pixels, pixel_offset(width, px_x, px_y), color, alpha);
                    }
                }
                x += metrics.advance_width;
            }
        }
        None => {
            // No usable font: draw a solid pill per word so caption timing
            // stays visible in the output.
            paint_plate(
                pixels,
                width,
                height,
                left,
                baseline - px * 0.7,
                measure_text(None, text, px),
                px * 0.7,
                color,
                1.0,
            );
        }
    }
}

/// Global fade scales the finished composite toward black; output stays
/// opaque since the container carries no alpha.
fn apply_fade(pixels: &mut [u8], opacity: f64) {
    if opacity >= 1.0 {
        return;
    }
    let opacity = opacity.clamp(0.0, 1.0);
    for chunk in pixels.chunks_exact_mut(4) {
        for channel in &mut chunk[..3] {
            *channel = (f64::from(*channel) * opacity).round() as u8;
        }
    }
}

fn pixel_offset(width: u32, x: u32, y: u32) -> usize {
    (y as usize * width as usize + x as usize) * 4
}

fn blend_src_over(pixels: &mut [u8], index: usize, color: Rgb, alpha: f64) {
    let alpha = alpha.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    let destination = &mut pixels[index..index + 4];
    destination[0] = mix_channel(destination[0], color.r, alpha);
    destination[1] = mix_channel(destination[1], color.g, alpha);
    destination[2] = mix_channel(destination[2], color.b, alpha);
    destination[3] = 255;
}

fn mix_channel(destination: u8, source: u8, alpha: f64) -> u8 {
    (f64::from(source) * alpha + f64::from(destination) * (1.0 - alpha)).round() as u8
}

fn mix(a: Rgb, b: Rgb, t: f64) -> Rgb {
    Rgb {
        r: mix_channel(a.r, b.r, t),
        g: mix_channel(a.g, b.g, t),
        b: mix_channel(a.b, b.b, t),
    }
}

#[cfg(test)]
mod tests {
    use super::rasterize;
    use crate::compositor::Composition;
    use crate::schema::{CaptionStyle, CompositionProps, WordTiming, CANVAS_HEIGHT, CANVAS_WIDTH};

    fn props() -> CompositionProps {
        CompositionProps {
            audio_url: String::new(),
            word_timestamps: vec![WordTiming {
                word: "Hi".to_owned(),
                start: 0.0,
                end: 0.4,
            }],
            duration: 2.0,
            caption_style: CaptionStyle::SubtitleClassic,
            primary_color: "#0f0f23".to_owned(),
            accent_color: "#ff5c00".to_owned(),
            secondary_color: None,
        }
    }

    #[test]
    fn frame_buffer_is_full_canvas_rgba() {
        let composition = Composition::prepare(&props()).expect("composition should prepare");
        let pixels = rasterize(&composition.frame_at(30), None);
        assert_eq!(
            pixels.len(),
            CANVAS_WIDTH as usize * CANVAS_HEIGHT as usize * 4
        );
        assert!(pixels.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn first_frame_fades_to_black() {
        let composition = Composition::prepare(&props()).expect("composition should prepare");
        let pixels = rasterize(&composition.frame_at(0), None);
        assert!(pixels.chunks_exact(4).all(|px| px[..3] == [0, 0, 0]));
    }

    #[test]
    fn plateau_frame_is_not_black() {
        let composition = Composition::prepare(&props()).expect("composition should prepare");
        let pixels = rasterize(&composition.frame_at(30), None);
        assert!(pixels.chunks_exact(4).any(|px| px[..3] != [0, 0, 0]));
    }

    #[test]
    fn identical_frames_rasterize_identically() {
        let composition = Composition::prepare(&props()).expect("composition should prepare");
        assert_eq!(
            rasterize(&composition.frame_at(17), None),
            rasterize(&composition.frame_at(17), None)
        );
    }
}
