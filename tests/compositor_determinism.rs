//! Compositor-level integration tests: full prop-to-frame evaluation
//! without an encoder in the loop.

use rrs::captions::CaptionLayer;
use rrs::compositor::{Composition, FrameComposite};
use rrs::schema::{CaptionStyle, CompositionProps, WordTiming, FPS};

fn hello_world_props() -> CompositionProps {
    CompositionProps {
        audio_url: String::new(),
        word_timestamps: vec![
            WordTiming {
                word: "Hello".to_owned(),
                start: 0.0,
                end: 0.5,
            },
            WordTiming {
                word: "World".to_owned(),
                start: 0.5,
                end: 1.0,
            },
        ],
        duration: 2.0,
        caption_style: CaptionStyle::TiktokBounce,
        primary_color: "#0f0f23".to_owned(),
        accent_color: "#ff5c00".to_owned(),
        secondary_color: None,
    }
}

fn active_word(composite: &FrameComposite) -> String {
    let Some(CaptionLayer::TiktokBounce { words }) = &composite.caption else {
        panic!("expected a bounce caption at frame {}", composite.frame);
    };
    words
        .iter()
        .find(|word| word.is_current)
        .map(|word| word.text.clone())
        .unwrap_or_default()
}

#[test]
fn hello_world_active_word_tracks_the_clock() {
    let composition = Composition::prepare(&hello_world_props()).unwrap();
    assert_eq!(composition.total_frames(), 60);

    assert_eq!(active_word(&composition.frame_at(0)), "HELLO");
    assert_eq!(active_word(&composition.frame_at(20)), "WORLD");
}

#[test]
fn fade_wraps_the_whole_clip() {
    let composition = Composition::prepare(&hello_world_props()).unwrap();
    let total = composition.total_frames();

    assert_eq!(composition.frame_at(0).opacity, 0.0);
    // The last rendered frame is one step into the fade-out ramp.
    let last = composition.frame_at(total - 1).opacity;
    assert!(last > 0.0 && last < 0.1, "unexpected tail opacity {last}");
    // Mid-clip sits on the fully opaque plateau.
    assert_eq!(composition.frame_at(total / 2).opacity, 1.0);
}

#[test]
fn frame_state_is_reproducible() {
    let composition = Composition::prepare(&hello_world_props()).unwrap();
    for frame in [0, 7, 20, 45, 59] {
        assert_eq!(composition.frame_at(frame), composition.frame_at(frame));
    }
}

#[test]
fn frame_state_survives_a_serde_round_trip() {
    let composition = Composition::prepare(&hello_world_props()).unwrap();
    let composite = composition.frame_at(20);
    let json = serde_json::to_string(&composite).unwrap();
    let back: FrameComposite = serde_json::from_str(&json).unwrap();
    assert_eq!(back, composite);
}

#[test]
fn wire_props_decode_with_camel_case_keys() {
    let raw = r##"{
        "audioUrl": "https://example.com/voice.mp3",
        "wordTimestamps": [{"word": "Go", "start": 0.0, "end": 0.3}],
        "duration": 1.5,
        "captionStyle": "highlight_word",
        "primaryColor": "#101020",
        "accentColor": "#00ffaa"
    }"##;
    let props: CompositionProps = serde_json::from_str(raw).unwrap();
    let composition = Composition::prepare(&props).unwrap();
    assert_eq!(composition.total_frames(), 45);

    let composite = composition.frame_at(0);
    assert_eq!(
        composite.audio.map(|a| a.src).as_deref(),
        Some("https://example.com/voice.mp3")
    );
    assert!(matches!(
        composite.caption,
        Some(CaptionLayer::HighlightWord { .. })
    ));
}

#[test]
fn styles_disagree_only_in_the_caption_layer() {
    let mut props = hello_world_props();
    let bounce = Composition::prepare(&props).unwrap();
    props.caption_style = CaptionStyle::SubtitleClassic;
    let classic = Composition::prepare(&props).unwrap();

    let a = bounce.frame_at(20);
    let b = classic.frame_at(20);
    assert_eq!(a.background, b.background);
    assert_eq!(a.opacity, b.opacity);
    assert_ne!(a.caption, b.caption);
    assert_eq!(
        b.caption,
        Some(CaptionLayer::SubtitleClassic {
            line: "Hello World".to_owned()
        })
    );
}

#[test]
fn fps_is_locked_to_thirty() {
    assert_eq!(FPS, 30);
}
