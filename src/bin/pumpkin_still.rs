//! pumpkin_still - overlay a pumpkin on a still photo
//!
//! The face comes from a landmark script (JSON, as accepted by the scripted
//! detector) or, without one, from a synthetic face centred in the image.
//! Several detection ticks are run so the smoothing modes settle.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use pumpkin_lens::capture::{capture_photo, PhotoOptions};
use pumpkin_lens::detect::{
    synthetic_face, FaceShape, ScriptStep, ScriptedDetector, REFINED_FACE_MESH_LANDMARKS,
};
use pumpkin_lens::driver::{FramePacer, IntervalPacer};
use pumpkin_lens::ingest::{FileConfig, FileSource};
use pumpkin_lens::ui::{Ui, UiMode};
use pumpkin_lens::{
    Compositor, DetectionDriver, DisplayMode, OverlayAsset, OverlayAssets, OverlayConfig,
    OverlaySurface, SystemClock, TickOutcome,
};

const PLACEHOLDER_SIZE: u32 = 256;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Photo to decorate.
    image: PathBuf,
    /// Where to write the result (PNG).
    #[arg(long, default_value = "pumpkin.png")]
    out: PathBuf,
    /// Landmark script; the first steps are replayed, then cycled.
    #[arg(long)]
    landmarks: Option<PathBuf>,
    /// Mouth aperture of the synthetic face when no script is given.
    #[arg(long, default_value_t = 0.0)]
    aperture: f32,
    /// Display mode (static, discrete_debounced, crossfade, stretch).
    #[arg(long, env = "PUMPKIN_MODE")]
    mode: Option<DisplayMode>,
    /// Config file (JSON or TOML). Without it, PUMPKIN_CONFIG is used.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Detection ticks to run before the overlay is captured.
    #[arg(long, default_value_t = 30)]
    ticks: u32,
    /// Terminal output: auto, plain or pretty.
    #[arg(long, default_value = "auto")]
    ui: UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = Ui::for_stderr(args.ui);

    let mut cfg = match &args.config {
        Some(path) => OverlayConfig::from_path(path)?,
        None => OverlayConfig::load()?,
    };
    if let Some(mode) = args.mode {
        cfg.render.mode = mode;
        cfg.validate()?;
    }

    let source = {
        let _stage = ui.stage("decode image");
        Arc::new(FileSource::open(FileConfig {
            path: args.image.display().to_string(),
        })?)
    };

    let detector = match &args.landmarks {
        Some(path) => ScriptedDetector::from_json_file(path)?.cycling(),
        None => {
            let face = synthetic_face(
                FaceShape {
                    center_x: 0.5,
                    center_y: 0.55,
                    width: 0.3,
                    height: 0.4,
                    aperture: args.aperture,
                },
                cfg.render.indices,
                REFINED_FACE_MESH_LANDMARKS,
            );
            ScriptedDetector::new(vec![ScriptStep::Face(face)]).cycling()
        }
    };

    let assets = load_assets(&cfg)?;
    let surface = Arc::new(OverlaySurface::new());
    let compositor = Compositor::new(
        cfg.render.clone(),
        assets,
        Arc::clone(&surface),
        Arc::new(SystemClock),
    );
    let mut driver = DetectionDriver::new(
        source.clone(),
        Box::new(detector),
        compositor,
        Arc::new(AtomicBool::new(true)),
    );

    let mut pacer = IntervalPacer::new(cfg.session.refresh_hz);
    let mut progress = ui.frames("render overlay", u64::from(args.ticks));
    let mut faces = 0u32;
    for _ in 0..args.ticks {
        if let TickOutcome::Rendered { face: true } = driver.tick() {
            faces += 1;
        }
        progress.inc();
        pacer.wait_for_refresh();
    }
    progress.finish("overlay rendered");
    driver.shutdown();
    if faces == 0 {
        log::warn!("no face in any of the {} ticks; writing the photo unchanged", args.ticks);
    }

    let options = PhotoOptions {
        scale_factor: 1,
        ..PhotoOptions::from(&cfg.capture)
    };
    let photo = capture_photo(source.as_ref(), &surface, options)?;
    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    photo
        .save(&args.out)
        .map_err(|e| anyhow!("failed to write {}: {}", args.out.display(), e))?;

    let state = surface.state();
    println!("mode: {}", cfg.render.mode);
    println!("face ticks: {}/{}", faces, args.ticks);
    if let Some(placement) = state.placement {
        println!(
            "overlay: {:.0}px at ({:.0}, {:.0}), mouth intensity {:.2}",
            placement.size, placement.x, placement.y, state.intensity
        );
    }
    println!("written: {}", args.out.display());
    Ok(())
}

/// Decode the overlays up front; a still has no frames to wait through.
fn load_assets(cfg: &OverlayConfig) -> Result<OverlayAssets> {
    if !cfg.assets.closed.exists() {
        log::info!(
            "overlay {} not found; drawing a placeholder pumpkin",
            cfg.assets.closed.display()
        );
        return Ok(OverlayAssets::placeholder(PLACEHOLDER_SIZE));
    }
    let closed = OverlayAsset::load(&cfg.assets.closed)?;
    match cfg.assets.open.as_deref() {
        Some(open) if cfg.render.mode.uses_open_asset() => {
            Ok(OverlayAssets::pair(closed, OverlayAsset::load(Path::new(open))?))
        }
        _ => Ok(OverlayAssets::single(closed)),
    }
}
