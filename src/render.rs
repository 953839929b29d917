//! Overlay compositor.
//!
//! Each call to `Compositor::render` handles one detector result: it sizes and
//! clears the overlay canvas, turns the landmarks into a placement and an
//! expression state, advances the smoothing for the configured display mode,
//! paints the overlay, and publishes the resulting `OverlayState`.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::asset::{OverlayAsset, OverlayAssets};
use crate::canvas::Canvas;
use crate::clock::Clock;
use crate::detect::{FrameResult, LandmarkIndices};
use crate::placement::{stretch_factor, Placement};
use crate::signal::{SignalExtractor, SignalThresholds};
use crate::smoothing::{Crossfade, Debouncer};
use crate::surface::{OverlayState, OverlaySurface};

/// How the expression signal affects the overlay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// One asset, no expression reactivity.
    #[default]
    Static,
    /// Swap between closed and open assets once a change has held for the debounce window.
    DiscreteDebounced,
    /// Draw both assets with complementary, animated opacity.
    Crossfade,
    /// One asset stretched vertically by mouth intensity.
    Stretch,
}

impl DisplayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::Static => "static",
            DisplayMode::DiscreteDebounced => "discrete_debounced",
            DisplayMode::Crossfade => "crossfade",
            DisplayMode::Stretch => "stretch",
        }
    }

    /// Modes that draw a distinct open-mouth asset.
    pub fn uses_open_asset(&self) -> bool {
        matches!(self, DisplayMode::DiscreteDebounced | DisplayMode::Crossfade)
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "static" => Ok(DisplayMode::Static),
            "discrete_debounced" | "debounced" => Ok(DisplayMode::DiscreteDebounced),
            "crossfade" => Ok(DisplayMode::Crossfade),
            "stretch" => Ok(DisplayMode::Stretch),
            other => Err(anyhow!("unknown display mode '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
    pub mode: DisplayMode,
    /// Overlay side as a multiple of the face's larger side.
    pub scale: f32,
    /// Pixels the overlay is lifted above the face centre.
    pub vertical_offset: f32,
    pub debounce: Duration,
    pub blend_step: f32,
    /// Vertical stretch at full intensity, as a fraction of the overlay size.
    pub stretch_k: f32,
    pub indices: LandmarkIndices,
    pub thresholds: SignalThresholds,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Static,
            scale: 2.6,
            vertical_offset: 50.0,
            debounce: Duration::from_millis(200),
            blend_step: 0.3,
            stretch_k: 0.17,
            indices: LandmarkIndices::default(),
            thresholds: SignalThresholds::default(),
        }
    }
}

enum Smoothing {
    None,
    Debounce(Debouncer),
    Crossfade(Crossfade),
}

impl Smoothing {
    fn for_settings(settings: &RenderSettings) -> Self {
        match settings.mode {
            DisplayMode::Static | DisplayMode::Stretch => Smoothing::None,
            DisplayMode::DiscreteDebounced => Smoothing::Debounce(Debouncer::new(settings.debounce)),
            DisplayMode::Crossfade => Smoothing::Crossfade(Crossfade::new(settings.blend_step)),
        }
    }
}

pub struct Compositor {
    settings: RenderSettings,
    extractor: SignalExtractor,
    smoothing: Smoothing,
    assets: OverlayAssets,
    clock: Arc<dyn Clock>,
    surface: Arc<OverlaySurface>,
    filter_enabled: Arc<AtomicBool>,
    sequence: u64,
}

impl Compositor {
    pub fn new(
        settings: RenderSettings,
        assets: OverlayAssets,
        surface: Arc<OverlaySurface>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        if settings.mode.uses_open_asset() && assets.open.is_none() {
            log::warn!(
                "display mode {} has no open-mouth overlay; using the closed one",
                settings.mode
            );
        }
        Self {
            extractor: SignalExtractor::new(settings.indices, settings.thresholds),
            smoothing: Smoothing::for_settings(&settings),
            settings,
            assets,
            clock,
            surface,
            filter_enabled: Arc::new(AtomicBool::new(true)),
            sequence: 0,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn surface(&self) -> Arc<OverlaySurface> {
        Arc::clone(&self.surface)
    }

    /// Shared on/off flag; the session's filter toggle writes it.
    pub fn filter_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.filter_enabled)
    }

    /// Forget debounce and blend progress.
    pub fn reset(&mut self) {
        match &mut self.smoothing {
            Smoothing::None => {}
            Smoothing::Debounce(debouncer) => debouncer.reset(),
            Smoothing::Crossfade(fade) => fade.reset(),
        }
    }

    /// Paint the overlay for one detector result on a canvas sized to the video.
    pub fn render(
        &mut self,
        video_width: u32,
        video_height: u32,
        result: &FrameResult,
    ) -> Result<OverlayState> {
        let surface = Arc::clone(&self.surface);
        let state = {
            let mut canvas = surface.lock_canvas()?;
            canvas.resize(video_width, video_height);
            canvas.clear();
            self.paint(&mut canvas, result)
        };
        surface.publish(state.clone())?;
        Ok(state)
    }

    fn paint(&mut self, canvas: &mut Canvas, result: &FrameResult) -> OverlayState {
        self.sequence += 1;
        let now = self.clock.now();
        let mut state = OverlayState {
            sequence: self.sequence,
            filter_enabled: self.filter_enabled.load(Ordering::SeqCst),
            ..OverlayState::default()
        };
        match &mut self.smoothing {
            Smoothing::Debounce(debouncer) => state.open = debouncer.poll(now),
            Smoothing::Crossfade(fade) => state.blend = fade.blend(),
            Smoothing::None => {}
        }
        if !state.filter_enabled {
            return state;
        }
        let Some(signal) = result
            .landmarks()
            .and_then(|landmarks| self.extractor.extract(landmarks))
        else {
            return state;
        };

        state.face_present = true;
        state.intensity = signal.intensity;
        let mut placement = Placement::compute(
            &signal.region,
            canvas.width(),
            canvas.height(),
            self.settings.scale,
            self.settings.vertical_offset,
        );

        state.drawn = match &mut self.smoothing {
            Smoothing::None if self.settings.mode == DisplayMode::Stretch => {
                state.open = signal.open;
                placement =
                    placement.with_scale_y(stretch_factor(signal.intensity, self.settings.stretch_k));
                draw(canvas, &self.assets.closed, &placement, 1.0)
            }
            Smoothing::None => {
                state.open = signal.open;
                draw(canvas, &self.assets.closed, &placement, 1.0)
            }
            Smoothing::Debounce(debouncer) => {
                state.open = debouncer.sample(signal.open, now);
                let asset = if state.open {
                    self.assets.open_or_closed()
                } else {
                    &self.assets.closed
                };
                draw(canvas, asset, &placement, 1.0)
            }
            Smoothing::Crossfade(fade) => {
                state.open = signal.open;
                state.blend = fade.approach(signal.open);
                let closed = draw(canvas, &self.assets.closed, &placement, 1.0 - state.blend);
                let open = draw(canvas, self.assets.open_or_closed(), &placement, state.blend);
                closed || open
            }
        };
        state.placement = Some(placement);
        state
    }
}

/// Paint `asset` at `placement`. Returns `false` if nothing was painted
/// (asset still loading or fully transparent).
fn draw(canvas: &mut Canvas, asset: &OverlayAsset, placement: &Placement, alpha: f32) -> bool {
    let Some(image) = asset.image() else {
        log::trace!("overlay {} not loaded yet; skipping", asset.name());
        return false;
    };
    if alpha <= 0.0 {
        return false;
    }
    let (x, y, w, h) = placement.draw_rect();
    canvas.draw_image(&image, x, y, w, h, alpha);
    true
}
