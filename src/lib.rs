//! rrs — reel render service.
//!
//! A deterministic short-form video renderer: composition props (word
//! timings, colors, caption style) are evaluated frame by frame into layer
//! state, rasterized on the CPU, and piped to ffmpeg as h264/mp4. An HTTP
//! service wraps the renderer for on-demand renders and serves the results.

pub mod background;
pub mod bundle;
pub mod captions;
pub mod color;
pub mod compositor;
pub mod config;
pub mod encoding;
pub mod error;
pub mod raster;
pub mod render;
pub mod schema;
pub mod server;
pub mod timeline;
