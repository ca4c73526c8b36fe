//! Pure frame/time math over a word-timing sequence. Everything here is a
//! function of its arguments so composited frames stay reproducible.

use crate::schema::WordTiming;

/// Seconds elapsed at the start of `frame`.
pub fn frame_to_time(frame: u32, fps: u32) -> f64 {
    f64::from(frame) / f64::from(fps)
}

/// Total frame count for a clip: `ceil(duration * fps)`, at least 1.
pub fn total_frames(duration_seconds: f64, fps: u32) -> u32 {
    let frames = (duration_seconds * f64::from(fps)).ceil();
    frames.max(1.0) as u32
}

/// Global fade envelope: linear 0→1 over the first `fps/2` frames, 1→0 over
/// the last `fps/2`, clamped to the plateau in between. Exactly 0 at frame 0
/// and at `total`, symmetric around the midpoint.
pub fn fade_opacity(frame: u32, total: u32, fps: u32) -> f64 {
    let ramp = f64::from(fps) / 2.0;
    if ramp <= 0.0 {
        return 1.0;
    }
    let frame = f64::from(frame);
    let total = f64::from(total);

    let fade_in = (frame / ramp).clamp(0.0, 1.0);
    let fade_out = ((total - frame) / ramp).clamp(0.0, 1.0);
    fade_in * fade_out
}

/// Index of the word active at `time`: the `i` with `time >= start[i]` and
/// either `i` last or `time < start[i + 1]`. `None` before the first word
/// starts (or for an empty timeline).
pub fn current_word_index(time: f64, words: &[WordTiming]) -> Option<usize> {
    if words.is_empty() || time < words[0].start {
        return None;
    }
    // Timelines are validated sorted-by-start, so the active word is the
    // last one whose start has passed.
    let after = words.partition_point(|word| word.start <= time);
    Some(after - 1)
}

/// First index of the caption page containing `index`. A `None` index still
/// maps to page 0: the first group is shown unhighlighted before narration
/// reaches its first word.
pub fn group_start(index: Option<usize>, group_size: usize) -> usize {
    match index {
        Some(index) if group_size > 0 => (index / group_size) * group_size,
        _ => 0,
    }
}
