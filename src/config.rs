use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::LensFilter;
use crate::detect::{DetectorOptions, LandmarkIndices};
use crate::render::{DisplayMode, RenderSettings};
use crate::signal::SignalThresholds;

const DEFAULT_OVERLAY_PATH: &str = "assets/jack-o-lantern.png";
const DEFAULT_START_DELAY_MS: u64 = 1000;
const DEFAULT_REFRESH_HZ: u32 = 60;
const DEFAULT_PHOTO_SCALE: u32 = 2;
const DEFAULT_RECORD_FPS: u32 = 30;
const DEFAULT_OUTPUT_DIR: &str = "captures";

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    render: Option<RenderConfigFile>,
    signal: Option<SignalConfigFile>,
    detector: Option<DetectorConfigFile>,
    assets: Option<AssetConfigFile>,
    session: Option<SessionConfigFile>,
    capture: Option<CaptureConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    mode: Option<DisplayMode>,
    scale: Option<f32>,
    vertical_offset: Option<f32>,
    debounce_ms: Option<u64>,
    blend_step: Option<f32>,
    stretch_k: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct SignalConfigFile {
    activation_threshold: Option<f32>,
    low_ratio: Option<f32>,
    high_ratio: Option<f32>,
    indices: Option<LandmarkIndices>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    max_num_faces: Option<u32>,
    refine_landmarks: Option<bool>,
    min_detection_confidence: Option<f32>,
    min_tracking_confidence: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct AssetConfigFile {
    closed: Option<PathBuf>,
    open: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct SessionConfigFile {
    start_delay_ms: Option<u64>,
    refresh_hz: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    output_dir: Option<PathBuf>,
    photo_scale_factor: Option<u32>,
    record_fps: Option<u32>,
    mirrored: Option<bool>,
    lens: Option<String>,
}

/// Everything configurable about the overlay engine.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub render: RenderSettings,
    pub detector: DetectorOptions,
    pub assets: AssetSettings,
    pub session: SessionSettings,
    pub capture: CaptureSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetSettings {
    pub closed: PathBuf,
    pub open: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Delay before detection starts, giving the detector runtime time to load.
    pub start_delay: Duration,
    /// Display refresh rate the detection loop is paced to.
    pub refresh_hz: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    pub output_dir: PathBuf,
    pub photo_scale_factor: u32,
    pub record_fps: u32,
    /// Flip captures horizontally (front camera).
    pub mirrored: bool,
    pub lens: LensFilter,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            render: RenderSettings::default(),
            detector: DetectorOptions::default(),
            assets: AssetSettings {
                closed: PathBuf::from(DEFAULT_OVERLAY_PATH),
                open: None,
            },
            session: SessionSettings {
                start_delay: Duration::from_millis(DEFAULT_START_DELAY_MS),
                refresh_hz: DEFAULT_REFRESH_HZ,
            },
            capture: CaptureSettings {
                output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
                photo_scale_factor: DEFAULT_PHOTO_SCALE,
                record_fps: DEFAULT_RECORD_FPS,
                mirrored: false,
                lens: LensFilter::None,
            },
        }
    }
}

impl OverlayConfig {
    /// Defaults, then the file named by `PUMPKIN_CONFIG`, then `PUMPKIN_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PUMPKIN_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overlaid with one config file, without env overrides.
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: OverlayConfigFile) -> Self {
        let mut cfg = Self::default();

        let render = file.render.unwrap_or_default();
        let r = &mut cfg.render;
        r.mode = render.mode.unwrap_or(r.mode);
        r.scale = render.scale.unwrap_or(r.scale);
        r.vertical_offset = render.vertical_offset.unwrap_or(r.vertical_offset);
        r.debounce = render.debounce_ms.map(Duration::from_millis).unwrap_or(r.debounce);
        r.blend_step = render.blend_step.unwrap_or(r.blend_step);
        r.stretch_k = render.stretch_k.unwrap_or(r.stretch_k);

        let signal = file.signal.unwrap_or_default();
        let defaults = SignalThresholds::default();
        r.thresholds = SignalThresholds {
            activation: signal.activation_threshold.unwrap_or(defaults.activation),
            low_ratio: signal.low_ratio.unwrap_or(defaults.low_ratio),
            high_ratio: signal.high_ratio.unwrap_or(defaults.high_ratio),
        };
        r.indices = signal.indices.unwrap_or_default();

        let detector = file.detector.unwrap_or_default();
        let d = &mut cfg.detector;
        d.max_num_faces = detector.max_num_faces.unwrap_or(d.max_num_faces);
        d.refine_landmarks = detector.refine_landmarks.unwrap_or(d.refine_landmarks);
        d.min_detection_confidence = detector
            .min_detection_confidence
            .unwrap_or(d.min_detection_confidence);
        d.min_tracking_confidence = detector
            .min_tracking_confidence
            .unwrap_or(d.min_tracking_confidence);

        if let Some(assets) = file.assets {
            if let Some(closed) = assets.closed {
                cfg.assets.closed = closed;
            }
            cfg.assets.open = assets.open;
        }

        if let Some(session) = file.session {
            if let Some(ms) = session.start_delay_ms {
                cfg.session.start_delay = Duration::from_millis(ms);
            }
            if let Some(hz) = session.refresh_hz {
                cfg.session.refresh_hz = hz;
            }
        }

        let capture = file.capture.unwrap_or_default();
        let c = &mut cfg.capture;
        if let Some(dir) = capture.output_dir {
            c.output_dir = dir;
        }
        c.photo_scale_factor = capture.photo_scale_factor.unwrap_or(c.photo_scale_factor);
        c.record_fps = capture.record_fps.unwrap_or(c.record_fps);
        c.mirrored = capture.mirrored.unwrap_or(c.mirrored);
        if let Some(lens) = capture.lens {
            c.lens = LensFilter::from_name(&lens);
        }
        cfg
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(mode) = non_empty_env("PUMPKIN_MODE") {
            self.render.mode = mode.parse()?;
        }
        if let Some(scale) = non_empty_env("PUMPKIN_SCALE") {
            self.render.scale = scale
                .parse()
                .map_err(|_| anyhow!("PUMPKIN_SCALE must be a number"))?;
        }
        if let Some(offset) = non_empty_env("PUMPKIN_VERTICAL_OFFSET") {
            self.render.vertical_offset = offset
                .parse()
                .map_err(|_| anyhow!("PUMPKIN_VERTICAL_OFFSET must be a number of pixels"))?;
        }
        if let Some(ms) = non_empty_env("PUMPKIN_DEBOUNCE_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| anyhow!("PUMPKIN_DEBOUNCE_MS must be an integer number of milliseconds"))?;
            self.render.debounce = Duration::from_millis(ms);
        }
        if let Some(ms) = non_empty_env("PUMPKIN_START_DELAY_MS") {
            let ms: u64 = ms.parse().map_err(|_| {
                anyhow!("PUMPKIN_START_DELAY_MS must be an integer number of milliseconds")
            })?;
            self.session.start_delay = Duration::from_millis(ms);
        }
        if let Some(path) = non_empty_env("PUMPKIN_OVERLAY") {
            self.assets.closed = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("PUMPKIN_OVERLAY_OPEN") {
            self.assets.open = Some(PathBuf::from(path));
        }
        if let Some(dir) = non_empty_env("PUMPKIN_OUTPUT_DIR") {
            self.capture.output_dir = PathBuf::from(dir);
        }
        if let Some(lens) = non_empty_env("PUMPKIN_LENS") {
            self.capture.lens = LensFilter::from_name(&lens);
        }
        Ok(())
    }

    pub fn validate(&mut self) -> Result<()> {
        let r = &self.render;
        if !(r.scale.is_finite() && r.scale > 0.0) {
            return Err(anyhow!("render.scale must be a positive number"));
        }
        if !r.vertical_offset.is_finite() {
            return Err(anyhow!("render.vertical_offset must be finite"));
        }
        if !(r.blend_step > 0.0 && r.blend_step <= 1.0) {
            return Err(anyhow!("render.blend_step must be in (0, 1]"));
        }
        if !(r.stretch_k.is_finite() && r.stretch_k >= 0.0) {
            return Err(anyhow!("render.stretch_k must be non-negative"));
        }
        let t = &r.thresholds;
        if !(t.activation.is_finite() && t.activation >= 0.0) {
            return Err(anyhow!("signal.activation_threshold must be non-negative"));
        }
        if !(t.low_ratio.is_finite() && t.high_ratio.is_finite() && t.low_ratio < t.high_ratio) {
            return Err(anyhow!("signal.low_ratio must be below signal.high_ratio"));
        }

        let d = &self.detector;
        if d.max_num_faces == 0 {
            return Err(anyhow!("detector.max_num_faces must be at least 1"));
        }
        if d.max_num_faces > 1 {
            log::warn!(
                "detector.max_num_faces={} but only the first face is overlaid",
                d.max_num_faces
            );
        }
        for (name, value) in [
            ("min_detection_confidence", d.min_detection_confidence),
            ("min_tracking_confidence", d.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("detector.{} must be within [0, 1]", name));
            }
        }

        if self.session.refresh_hz == 0 {
            return Err(anyhow!("session.refresh_hz must be greater than zero"));
        }
        if !(1..=8).contains(&self.capture.photo_scale_factor) {
            return Err(anyhow!("capture.photo_scale_factor must be between 1 and 8"));
        }
        if self.capture.record_fps == 0 {
            return Err(anyhow!("capture.record_fps must be greater than zero"));
        }
        if self.render.mode.uses_open_asset() && self.assets.open.is_none() {
            log::warn!(
                "display mode {} configured without assets.open; the closed overlay is reused",
                self.render.mode
            );
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<OverlayConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
