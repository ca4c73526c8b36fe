//! Composition bundle: the registry of renderable compositions plus shared
//! render assets (the caption font). Built lazily and at most once per
//! process; concurrent requests share one in-flight build.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use fontdue::Font;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::schema::{CANVAS_HEIGHT, CANVAS_WIDTH, FPS};

/// Geometry and timing for one registered composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositionDescriptor {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Immutable output of one bundle build.
pub struct Bundle {
    pub built_at: DateTime<Utc>,
    compositions: BTreeMap<String, CompositionDescriptor>,
    font: Option<Arc<Font>>,
}

impl Bundle {
    pub fn composition(&self, id: &str) -> Option<&CompositionDescriptor> {
        self.compositions.get(id)
    }

    pub fn composition_ids(&self) -> impl Iterator<Item = &str> {
        self.compositions.keys().map(String::as_str)
    }

    pub fn font(&self) -> Option<&Font> {
        self.font.as_deref()
    }
}

/// Well-known font locations tried when no explicit path is configured.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
];

fn load_font(path: &Path) -> Result<Font> {
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read font file {}", path.display()))?;
    Font::from_bytes(bytes, fontdue::FontSettings::default())
        .map_err(|error| anyhow!("failed to parse font {}: {error}", path.display()))
}

/// Locate and load the caption font. An explicitly configured path must
/// load; the fallback candidates are best-effort and a miss only degrades
/// caption text to placeholder pills.
fn discover_font(configured: Option<&Path>) -> Result<Option<Arc<Font>>> {
    if let Some(path) = configured {
        return Ok(Some(Arc::new(load_font(path)?)));
    }
    for candidate in FONT_CANDIDATES {
        let path = Path::new(candidate);
        if path.exists() {
            match load_font(path) {
                Ok(font) => {
                    info!(path = %path.display(), "loaded caption font");
                    return Ok(Some(Arc::new(font)));
                }
                Err(error) => warn!(path = %path.display(), %error, "skipping unusable font"),
            }
        }
    }
    warn!("no caption font found; captions will render as placeholder blocks");
    Ok(None)
}

fn build_bundle(font_path: Option<&Path>) -> Result<Arc<Bundle>> {
    let font = discover_font(font_path)?;
    let mut compositions = BTreeMap::new();
    compositions.insert(
        "SimpleReel".to_owned(),
        CompositionDescriptor {
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
            fps: FPS,
        },
    );
    Ok(Arc::new(Bundle {
        built_at: Utc::now(),
        compositions,
        font,
    }))
}

/// Single-flight lazy bundle holder. The first caller triggers the build;
/// callers arriving mid-build await the same result. A failed build is not
/// cached, so the next request retries.
pub struct BundleCache {
    cell: OnceCell<Arc<Bundle>>,
    builds: AtomicUsize,
    font_path: Option<PathBuf>,
}

impl BundleCache {
    pub fn new(font_path: Option<PathBuf>) -> Self {
        Self {
            cell: OnceCell::new(),
            builds: AtomicUsize::new(0),
            font_path,
        }
    }

    pub async fn get_or_build(&self) -> Result<Arc<Bundle>> {
        let bundle = self
            .cell
            .get_or_try_init(|| async {
                let attempt = self.builds.fetch_add(1, Ordering::SeqCst) + 1;
                info!(attempt, "building composition bundle");
                let font_path = self.font_path.clone();
                let bundle = tokio::task::spawn_blocking(move || {
                    build_bundle(font_path.as_deref())
                })
                .await
                .context("bundle build task panicked")??;
                info!(
                    compositions = bundle.compositions.len(),
                    has_font = bundle.font.is_some(),
                    "bundle ready"
                );
                Ok::<_, anyhow::Error>(bundle)
            })
            .await?;
        Ok(Arc::clone(bundle))
    }

    /// Whether a bundle has finished building. Never blocks; used by the
    /// health endpoint.
    pub fn is_built(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::BundleCache;
    use std::sync::Arc;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_share_one_build() {
        let cache = Arc::new(BundleCache::new(None));
        assert!(!cache.is_built());

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            tasks.push(tokio::spawn(async move { cache.get_or_build().await }));
        }
        for task in tasks {
            let bundle = task.await.unwrap().unwrap();
            assert!(bundle.composition("SimpleReel").is_some());
        }

        assert_eq!(cache.build_count(), 1);
        assert!(cache.is_built());
    }

    #[tokio::test]
    async fn configured_font_path_must_exist() {
        let cache = BundleCache::new(Some("/definitely/not/a/font.ttf".into()));
        assert!(cache.get_or_build().await.is_err());
        // A failed build is retried, not cached.
        assert!(!cache.is_built());
        assert!(cache.get_or_build().await.is_err());
        assert_eq!(cache.build_count(), 2);
    }

    #[tokio::test]
    async fn default_bundle_registers_simple_reel() {
        let cache = BundleCache::new(None);
        let bundle = cache.get_or_build().await.unwrap();
        let descriptor = bundle.composition("SimpleReel").unwrap();
        assert_eq!((descriptor.width, descriptor.height), (1080, 1920));
        assert_eq!(descriptor.fps, 30);
        assert!(bundle.composition("Unknown").is_none());
        assert_eq!(bundle.composition_ids().collect::<Vec<_>>(), ["SimpleReel"]);
    }
}
