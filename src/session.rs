//! Overlay session lifecycle.
//!
//! `Session::start` returns immediately. Its worker thread waits out the
//! configured start delay, then for the video source to have a current frame,
//! warms up the detector and runs the detection loop until `stop`.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::asset::OverlayAssets;
use crate::clock::{Clock, SystemClock};
use crate::config::OverlayConfig;
use crate::detect::FaceDetector;
use crate::driver::{DetectionDriver, FramePacer, IntervalPacer};
use crate::frame::VideoSource;
use crate::render::Compositor;
use crate::surface::{OverlayState, OverlaySurface};

const STARTUP_POLL: Duration = Duration::from_millis(10);

/// Counters reported once the detection loop has stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames_submitted: u64,
    pub frames_dropped: u64,
}

pub struct Session {
    active: Arc<AtomicBool>,
    filter_enabled: Arc<AtomicBool>,
    surface: Arc<OverlaySurface>,
    source: Arc<dyn VideoSource>,
    worker: Option<JoinHandle<DetectionDriver>>,
    summary: Option<SessionSummary>,
}

impl Session {
    pub fn start(
        config: &OverlayConfig,
        source: Arc<dyn VideoSource>,
        detector: Box<dyn FaceDetector>,
        assets: OverlayAssets,
    ) -> Result<Self> {
        Self::start_with_clock(config, source, detector, assets, Arc::new(SystemClock))
    }

    pub fn start_with_clock(
        config: &OverlayConfig,
        source: Arc<dyn VideoSource>,
        detector: Box<dyn FaceDetector>,
        assets: OverlayAssets,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let surface = Arc::new(OverlaySurface::new());
        let compositor = Compositor::new(config.render.clone(), assets, Arc::clone(&surface), clock);
        let filter_enabled = compositor.filter_flag();
        let active = Arc::new(AtomicBool::new(true));
        let driver = DetectionDriver::new(
            Arc::clone(&source),
            detector,
            compositor,
            Arc::clone(&active),
        );

        let start_delay = config.session.start_delay;
        let mut pacer = IntervalPacer::new(config.session.refresh_hz);
        let worker = std::thread::Builder::new()
            .name("pumpkin-detect".to_string())
            .spawn(move || run_worker(driver, start_delay, &mut pacer))
            .context("spawn detection thread")?;

        log::info!(
            "overlay session started (mode={}, delay={}ms, refresh={}Hz)",
            config.render.mode,
            start_delay.as_millis(),
            config.session.refresh_hz
        );
        Ok(Self {
            active,
            filter_enabled,
            surface,
            source,
            worker: Some(worker),
            summary: None,
        })
    }

    /// Stop the detection loop and release the detector.
    ///
    /// Waits for an in-flight detector call to return; no frame is submitted
    /// after that. Calling `stop` again does nothing.
    pub fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        let Some(worker) = self.worker.take() else {
            return;
        };
        match worker.join() {
            Ok(driver) => {
                self.summary = Some(SessionSummary {
                    frames_submitted: driver.frames_submitted(),
                    frames_dropped: driver.frames_dropped(),
                });
            }
            Err(_) => log::error!("detection thread panicked"),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Flip the overlay on or off. Returns the new state.
    pub fn toggle_filter(&self) -> bool {
        let enabled = !self.filter_enabled.fetch_xor(true, Ordering::SeqCst);
        log::info!("overlay filter {}", if enabled { "enabled" } else { "disabled" });
        enabled
    }

    pub fn is_filter_enabled(&self) -> bool {
        self.filter_enabled.load(Ordering::SeqCst)
    }

    pub fn set_filter_enabled(&self, enabled: bool) {
        self.filter_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Overlay layer shared with capture.
    pub fn surface(&self) -> Arc<OverlaySurface> {
        Arc::clone(&self.surface)
    }

    pub fn source(&self) -> Arc<dyn VideoSource> {
        Arc::clone(&self.source)
    }

    pub fn overlay_state(&self) -> OverlayState {
        self.surface.state()
    }

    /// Set once `stop` has joined the detection loop.
    pub fn summary(&self) -> Option<SessionSummary> {
        self.summary
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    mut driver: DetectionDriver,
    start_delay: Duration,
    pacer: &mut dyn FramePacer,
) -> DetectionDriver {
    if !wait_for_start(&driver, start_delay) {
        driver.shutdown();
        return driver;
    }
    driver.warm_up();
    driver.run(pacer)
}

/// Sleep through the start delay and until the source has a frame. Returns
/// `false` if the session was stopped first.
fn wait_for_start(driver: &DetectionDriver, start_delay: Duration) -> bool {
    let deadline = Instant::now() + start_delay;
    loop {
        if !driver.is_active() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline && driver.source_can_start() {
            return true;
        }
        let wait = if now < deadline {
            (deadline - now).min(STARTUP_POLL)
        } else {
            STARTUP_POLL
        };
        std::thread::sleep(wait);
    }
}
