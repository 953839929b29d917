use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use image::RgbaImage;
use std::path::{Path, PathBuf};

use super::{capture_timestamp, composite, LensFilter};
use crate::config::CaptureSettings;
use crate::frame::VideoSource;
use crate::surface::OverlaySurface;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhotoOptions {
    /// Output size as a multiple of the video's native size.
    pub scale_factor: u32,
    pub mirrored: bool,
    pub lens: LensFilter,
}

impl Default for PhotoOptions {
    fn default() -> Self {
        Self {
            scale_factor: 2,
            mirrored: false,
            lens: LensFilter::None,
        }
    }
}

impl From<&CaptureSettings> for PhotoOptions {
    fn from(settings: &CaptureSettings) -> Self {
        Self {
            scale_factor: settings.photo_scale_factor,
            mirrored: settings.mirrored,
            lens: settings.lens,
        }
    }
}

/// Composite the current video frame with the latest overlay.
pub fn capture_photo(
    source: &dyn VideoSource,
    surface: &OverlaySurface,
    options: PhotoOptions,
) -> Result<RgbaImage> {
    let frame = source
        .current_frame()
        .ok_or_else(|| anyhow!("no video frame available from {}", source.name()))?;
    let overlay = surface.snapshot()?;
    Ok(composite(
        frame.pixels(),
        &overlay,
        options.scale_factor,
        options.mirrored,
        options.lens,
    ))
}

/// Write `photo` as `photo_<timestamp>.png` inside `dir`.
pub fn save_photo(photo: &RgbaImage, dir: &Path, at: DateTime<Utc>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create capture directory {}", dir.display()))?;
    let path = dir.join(format!("photo_{}.png", capture_timestamp(at)));
    photo
        .save(&path)
        .with_context(|| format!("write photo {}", path.display()))?;
    log::info!("photo saved to {}", path.display());
    Ok(path)
}
