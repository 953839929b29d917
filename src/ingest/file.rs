//! Still-image file source.
//!
//! `FileSource` decodes a local image once and serves it as every frame, which
//! lets the compositor run against photos. Only local paths are accepted.

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::frame::{ReadyState, VideoFrame, VideoSource};

/// Configuration for a local file source.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    /// Local image path (e.g., "portrait.jpg").
    pub path: String,
}

/// Local still-image source.
pub struct FileSource {
    path: String,
    pixels: RgbaImage,
    frames_served: AtomicU64,
}

impl FileSource {
    pub fn open(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file source only supports local paths (no URL schemes)"
            ));
        }
        let pixels = image::open(PathBuf::from(&config.path))
            .with_context(|| format!("decode image {}", config.path))?
            .to_rgba8();
        log::info!(
            "FileSource: loaded {} ({}x{})",
            config.path,
            pixels.width(),
            pixels.height()
        );
        Ok(Self::from_image(config.path, pixels))
    }

    /// Wrap an already decoded image.
    pub fn from_image(path: impl Into<String>, pixels: RgbaImage) -> Self {
        Self {
            path: path.into(),
            pixels,
            frames_served: AtomicU64::new(0),
        }
    }

    pub fn frames_served(&self) -> u64 {
        self.frames_served.load(Ordering::Relaxed)
    }
}

impl VideoSource for FileSource {
    fn name(&self) -> &str {
        &self.path
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::HaveEnoughData
    }

    fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        let sequence = self.frames_served.fetch_add(1, Ordering::Relaxed) + 1;
        Some(VideoFrame::new(self.pixels.clone(), sequence))
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    !path.contains("://")
}
