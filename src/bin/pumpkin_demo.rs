//! pumpkin_demo - end-to-end synthetic run of the overlay engine
//!
//! Runs a session against the synthetic camera and face detector, toggles the
//! overlay, takes a photo halfway through and optionally records PNG frames.

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pumpkin_lens::capture::{
    capture_photo, save_photo, video_filename, PhotoOptions, PngSequenceSink, RecordOptions,
    Recorder,
};
use pumpkin_lens::detect::SyntheticFaceDetector;
use pumpkin_lens::ingest::{SyntheticConfig, SyntheticSource};
use pumpkin_lens::ui::{Ui, UiMode};
use pumpkin_lens::{DisplayMode, OverlayAssets, OverlayConfig, Session};

const TICK: Duration = Duration::from_millis(100);
const PLACEHOLDER_SIZE: u32 = 256;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// How long to run the session, in seconds.
    #[arg(long, default_value_t = 5)]
    seconds: u64,
    /// Display mode (static, discrete_debounced, crossfade, stretch).
    #[arg(long, env = "PUMPKIN_MODE")]
    mode: Option<DisplayMode>,
    /// Config file (JSON or TOML). Without it, PUMPKIN_CONFIG is used.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory for the photo and recording (defaults to capture.output_dir).
    #[arg(long)]
    out: Option<PathBuf>,
    /// Seed for the synthetic face motion.
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Synthetic camera width.
    #[arg(long, default_value_t = 640)]
    width: u32,
    /// Synthetic camera height.
    #[arg(long, default_value_t = 480)]
    height: u32,
    /// Toggle the overlay off and on again every N seconds (0 disables).
    #[arg(long, default_value_t = 0)]
    toggle_every: u64,
    /// Record composited frames as a PNG sequence.
    #[arg(long)]
    record: bool,
    /// Terminal output: auto, plain or pretty.
    #[arg(long, default_value = "auto")]
    ui: UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = Ui::for_stderr(args.ui);

    let mut cfg = {
        let _stage = ui.stage("load configuration");
        match &args.config {
            Some(path) => OverlayConfig::from_path(path)?,
            None => OverlayConfig::load()?,
        }
    };
    if let Some(mode) = args.mode {
        cfg.render.mode = mode;
        cfg.validate()?;
    }
    let out_dir = args.out.clone().unwrap_or_else(|| cfg.capture.output_dir.clone());

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .map_err(|e| anyhow!("failed to install ctrl-c handler: {e}"))?;
    }

    let assets = if cfg.assets.closed.exists() {
        OverlayAssets::load_in_background(&cfg.assets, cfg.render.mode)
    } else {
        log::info!(
            "overlay {} not found; drawing a placeholder pumpkin",
            cfg.assets.closed.display()
        );
        OverlayAssets::placeholder(PLACEHOLDER_SIZE)
    };

    let source = Arc::new(SyntheticSource::new(SyntheticConfig {
        width: args.width,
        height: args.height,
        ..SyntheticConfig::default()
    })?);
    let detector = SyntheticFaceDetector::new(cfg.detector.clone(), args.seed)
        .with_indices(cfg.render.indices);

    let mut session = {
        let _stage = ui.stage("start overlay session");
        Session::start(&cfg, source, Box::new(detector), assets)?
    };

    let recorder = if args.record {
        let started_at = Utc::now();
        let name = video_filename(started_at);
        let dir = out_dir.join(name.trim_end_matches(".webm"));
        let sink = PngSequenceSink::create(&dir)?;
        Some(Recorder::start_at(
            session.source(),
            session.surface(),
            Box::new(sink),
            RecordOptions {
                fps: cfg.capture.record_fps,
                mirrored: cfg.capture.mirrored,
            },
            started_at,
        )?)
    } else {
        None
    };

    let total_ticks = args.seconds.saturating_mul(1000) / TICK.as_millis() as u64;
    let ticks_per_second = 1000 / TICK.as_millis() as u64;
    let mut progress = ui.frames("run session", total_ticks);
    let mut photo_path = None;
    let started = Instant::now();
    for tick in 0..total_ticks {
        if !running.load(Ordering::SeqCst) {
            log::info!("interrupted");
            break;
        }
        std::thread::sleep(TICK);
        progress.inc();

        if should_toggle(tick, args.toggle_every, ticks_per_second) {
            session.toggle_filter();
        }
        if tick % ticks_per_second == 0 {
            if let Some(recorder) = recorder.as_ref().filter(|r| r.is_recording()) {
                progress.set_message(&format!("recording {}", recorder.elapsed_label()));
            }
        }
        if tick == total_ticks / 2 && photo_path.is_none() {
            let photo = capture_photo(
                session.source().as_ref(),
                &session.surface(),
                PhotoOptions::from(&cfg.capture),
            )?;
            photo_path = Some(save_photo(&photo, &out_dir, Utc::now())?);
        }
    }
    progress.finish("session finished");

    if let Some(recorder) = recorder {
        let _stage = ui.stage("finish recording");
        let summary = recorder.stop()?;
        println!("recording: {} ({})", summary.file_name, summary.mime_type);
        match &summary.output {
            Some(dir) => println!("frames: {} in {}", summary.frames, dir.display()),
            None => println!("frames: none captured"),
        }
    }

    {
        let _stage = ui.stage("stop overlay session");
        session.stop();
    }

    let state = session.overlay_state();
    let summary = session.summary().unwrap_or_default();
    println!("mode: {}", cfg.render.mode);
    println!("ran for: {:.1}s", started.elapsed().as_secs_f64());
    println!(
        "frames submitted: {} ({} dropped)",
        summary.frames_submitted, summary.frames_dropped
    );
    println!("overlay enabled at stop: {}", state.filter_enabled);
    if let Some(path) = photo_path {
        println!("photo: {}", path.display());
    }
    Ok(())
}

/// Every `every_secs` seconds after the first tick; 0 never toggles.
fn should_toggle(tick: u64, every_secs: u64, ticks_per_second: u64) -> bool {
    let period = every_secs.saturating_mul(ticks_per_second);
    period > 0 && tick > 0 && tick % period == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_on_whole_periods() {
        assert!(!should_toggle(0, 2, 10));
        assert!(!should_toggle(10, 2, 10));
        assert!(should_toggle(20, 2, 10));
        assert!(should_toggle(40, 2, 10));
        assert!(!should_toggle(20, 0, 10));
    }

    #[test]
    fn huge_period_does_not_overflow() {
        assert!(!should_toggle(5, u64::MAX, 10));
        assert!(should_toggle(u64::MAX, u64::MAX, 1));
    }
}
