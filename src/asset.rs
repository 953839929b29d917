//! Overlay images that finish loading in the background.
//!
//! The renderer never waits for an asset: until `is_ready` it simply skips
//! drawing that asset.

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::config::AssetSettings;
use crate::render::DisplayMode;

const PUMPKIN_ORANGE: Rgba<u8> = Rgba([255, 117, 24, 255]);
const STEM_GREEN: Rgba<u8> = Rgba([60, 110, 40, 255]);
const CARVED: Rgba<u8> = Rgba([40, 20, 0, 255]);

pub struct OverlayAsset {
    name: String,
    image: OnceLock<Arc<RgbaImage>>,
}

impl OverlayAsset {
    /// Asset that has not loaded yet.
    pub fn pending(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            image: OnceLock::new(),
        })
    }

    /// Asset that is already decoded.
    pub fn ready(name: impl Into<String>, image: RgbaImage) -> Arc<Self> {
        let asset = Self::pending(name);
        asset.fill(image);
        asset
    }

    /// Decode `path` synchronously.
    pub fn load(path: &Path) -> Result<Arc<Self>> {
        let image = decode(path)?;
        Ok(Self::ready(path.display().to_string(), image))
    }

    /// Start decoding `path` on a background thread and return immediately.
    /// A decode failure is logged and leaves the asset pending forever.
    pub fn load_in_background(path: PathBuf) -> Arc<Self> {
        let asset = Self::pending(path.display().to_string());
        let target = Arc::clone(&asset);
        std::thread::spawn(move || match decode(&path) {
            Ok(image) => {
                log::debug!(
                    "overlay asset {} loaded ({}x{})",
                    target.name,
                    image.width(),
                    image.height()
                );
                target.fill(image);
            }
            Err(e) => log::warn!("overlay asset {} failed to load: {:#}", target.name, e),
        });
        asset
    }

    /// Complete loading. Later calls are ignored.
    pub fn fill(&self, image: RgbaImage) {
        if self.image.set(Arc::new(image)).is_err() {
            log::debug!("overlay asset {} already loaded", self.name);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ready(&self) -> bool {
        self.image.get().is_some()
    }

    pub fn image(&self) -> Option<Arc<RgbaImage>> {
        self.image.get().cloned()
    }
}

fn decode(path: &Path) -> Result<RgbaImage> {
    Ok(image::open(path)
        .with_context(|| format!("decode overlay {}", path.display()))?
        .to_rgba8())
}

/// The closed-mouth overlay and, for expressive modes, the open-mouth one.
#[derive(Clone)]
pub struct OverlayAssets {
    pub closed: Arc<OverlayAsset>,
    pub open: Option<Arc<OverlayAsset>>,
}

impl OverlayAssets {
    pub fn single(asset: Arc<OverlayAsset>) -> Self {
        Self {
            closed: asset,
            open: None,
        }
    }

    pub fn pair(closed: Arc<OverlayAsset>, open: Arc<OverlayAsset>) -> Self {
        Self {
            closed,
            open: Some(open),
        }
    }

    /// Open-mouth asset, or the closed one when there is no open variant.
    pub fn open_or_closed(&self) -> &Arc<OverlayAsset> {
        self.open.as_ref().unwrap_or(&self.closed)
    }

    /// Start loading the configured files. The open asset is only loaded for
    /// modes that draw it.
    pub fn load_in_background(settings: &AssetSettings, mode: DisplayMode) -> Self {
        let closed = OverlayAsset::load_in_background(settings.closed.clone());
        match &settings.open {
            Some(open) if mode.uses_open_asset() => {
                Self::pair(closed, OverlayAsset::load_in_background(open.clone()))
            }
            _ => Self::single(closed),
        }
    }

    /// Drawn stand-ins for both mouth states.
    pub fn placeholder(size: u32) -> Self {
        Self::pair(
            OverlayAsset::ready("placeholder-closed", placeholder_pumpkin(size, false)),
            OverlayAsset::ready("placeholder-open", placeholder_pumpkin(size, true)),
        )
    }
}

/// A flat jack-o'-lantern: orange disc, stem, triangle eyes and a mouth slit
/// that gets taller when `open`. Transparent outside the disc.
pub fn placeholder_pumpkin(size: u32, open: bool) -> RgbaImage {
    let size = size.max(8);
    let s = size as f32;
    let (cx, cy, r) = (s / 2.0, s * 0.55, s * 0.44);
    let mouth_half_height = if open { s * 0.09 } else { s * 0.025 };

    RgbaImage::from_fn(size, size, |x, y| {
        let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
        let (dx, dy) = ((px - cx) / r, (py - cy) / r);
        if (px - cx).abs() < s * 0.05 && py < cy - r * 0.9 && py > s * 0.02 {
            return STEM_GREEN;
        }
        if dx * dx + dy * dy > 1.0 {
            return Rgba([0, 0, 0, 0]);
        }
        let eye_row = (-0.45..-0.1).contains(&dy);
        let eye = eye_row && {
            let ex = dx.abs() - 0.38;
            let depth = dy + 0.45;
            ex.abs() < depth * 0.6
        };
        let mouth = dx.abs() < 0.55 && (py - (cy + r * 0.35)).abs() < mouth_half_height;
        if eye || mouth {
            CARVED
        } else {
            PUMPKIN_ORANGE
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn pending_asset_becomes_ready_once() {
        let asset = OverlayAsset::pending("pumpkin");
        assert!(!asset.is_ready());
        assert!(asset.image().is_none());
        asset.fill(RgbaImage::new(2, 2));
        asset.fill(RgbaImage::new(9, 9));
        assert_eq!(asset.image().unwrap().dimensions(), (2, 2));
    }

    #[test]
    fn background_load_completes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pumpkin.png");
        RgbaImage::new(3, 5).save(&path).unwrap();

        let asset = OverlayAsset::load_in_background(path);
        let deadline = Instant::now() + Duration::from_secs(5);
        while !asset.is_ready() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(asset.image().unwrap().dimensions(), (3, 5));
    }

    #[test]
    fn missing_file_stays_pending() {
        let asset = OverlayAsset::load_in_background(PathBuf::from("/nonexistent/pumpkin.png"));
        std::thread::sleep(Duration::from_millis(50));
        assert!(!asset.is_ready());
        assert!(OverlayAsset::load(Path::new("/nonexistent/pumpkin.png")).is_err());
    }

    #[test]
    fn placeholder_is_transparent_outside_the_disc() {
        let closed = placeholder_pumpkin(64, false);
        assert_eq!(closed.dimensions(), (64, 64));
        assert_eq!(closed.get_pixel(0, 63)[3], 0);
        assert_eq!(closed.get_pixel(32, 35), &PUMPKIN_ORANGE);

        let carved = |img: &RgbaImage| img.pixels().filter(|p| **p == CARVED).count();
        assert!(carved(&placeholder_pumpkin(64, true)) > carved(&closed));
    }

    #[test]
    fn open_asset_only_loaded_for_expressive_modes() {
        let settings = AssetSettings {
            closed: PathBuf::from("/nonexistent/closed.png"),
            open: Some(PathBuf::from("/nonexistent/open.png")),
        };
        assert!(OverlayAssets::load_in_background(&settings, DisplayMode::Static)
            .open
            .is_none());
        assert!(OverlayAssets::load_in_background(&settings, DisplayMode::Crossfade)
            .open
            .is_some());
    }

    #[test]
    fn open_falls_back_to_closed() {
        let closed = OverlayAsset::pending("closed");
        let assets = OverlayAssets::single(closed.clone());
        assert!(Arc::ptr_eq(assets.open_or_closed(), &closed));
        let open = OverlayAsset::pending("open");
        let assets = OverlayAssets::pair(closed, open.clone());
        assert!(Arc::ptr_eq(assets.open_or_closed(), &open));
    }
}
