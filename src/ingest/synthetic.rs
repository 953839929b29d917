//! Synthetic camera source for `stub://` URLs.
//!
//! Produces a slowly shifting gradient at a fixed size. The source reports
//! `HaveNothing` until its warm-up elapses, then `HaveEnoughData`, unless a
//! ready state has been forced (used to simulate camera switches).

use anyhow::{anyhow, Result};
use image::{Rgba, RgbaImage};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::frame::{ReadyState, VideoFrame, VideoSource};

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// Must start with `stub://`.
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Time before the source reports any data.
    pub warm_up: Duration,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            url: "stub://front_camera".to_string(),
            width: 640,
            height: 480,
            warm_up: Duration::ZERO,
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    opened_at: Instant,
    state: Mutex<SyntheticState>,
}

#[derive(Default)]
struct SyntheticState {
    frame_count: u64,
    scene_state: u8,
    forced: Option<ReadyState>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if !config.url.starts_with("stub://") {
            return Err(anyhow!(
                "synthetic source requires a stub:// url, got {}",
                config.url
            ));
        }
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("synthetic source dimensions must be non-zero"));
        }
        log::info!(
            "SyntheticSource: opened {} ({}x{})",
            config.url,
            config.width,
            config.height
        );
        Ok(Self {
            config,
            opened_at: Instant::now(),
            state: Mutex::new(SyntheticState::default()),
        })
    }

    /// Force a ready state, or `None` to return to the warm-up schedule.
    pub fn force_ready_state(&self, state: Option<ReadyState>) {
        if let Ok(mut guard) = self.state.lock() {
            guard.forced = state;
        }
    }

    /// Number of frames handed out so far.
    pub fn frames_captured(&self) -> u64 {
        self.state.lock().map(|s| s.frame_count).unwrap_or(0)
    }

    fn generate_pixels(&self, frame_count: u64, scene_state: u8) -> RgbaImage {
        let shift = frame_count.wrapping_add(scene_state as u64);
        RgbaImage::from_fn(self.config.width, self.config.height, |x, y| {
            let r = ((x as u64 + shift) % 256) as u8;
            let g = ((y as u64 + shift / 2) % 256) as u8;
            Rgba([r, g, 96, 255])
        })
    }
}

impl VideoSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.config.url
    }

    fn ready_state(&self) -> ReadyState {
        if let Ok(guard) = self.state.lock() {
            if let Some(forced) = guard.forced {
                return forced;
            }
        }
        if self.opened_at.elapsed() >= self.config.warm_up {
            ReadyState::HaveEnoughData
        } else {
            ReadyState::HaveNothing
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        if self.ready_state() >= ReadyState::HaveMetadata {
            (self.config.width, self.config.height)
        } else {
            (0, 0)
        }
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        if !self.ready_state().can_start() {
            return None;
        }
        let (frame_count, scene_state) = {
            let mut guard = self.state.lock().ok()?;
            guard.frame_count += 1;
            if guard.frame_count % 50 == 0 {
                guard.scene_state = guard.scene_state.wrapping_add(1);
            }
            (guard.frame_count, guard.scene_state)
        };
        Some(VideoFrame::new(
            self.generate_pixels(frame_count, scene_state),
            frame_count,
        ))
    }
}
