//! Detection loop.
//!
//! The driver pumps "take current frame → submit → wait for result → render"
//! and then waits for the next display refresh before doing it again. The
//! submission blocks, so there is never more than one frame in flight, and
//! every outcome (rendered, skipped, failed) still schedules the next tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::detect::{FaceDetector, FrameResult};
use crate::frame::VideoSource;
use crate::render::Compositor;

/// Waits until the next display refresh.
pub trait FramePacer: Send {
    fn wait_for_refresh(&mut self);
}

/// Pacer that sleeps to the next boundary of a fixed refresh interval. A tick
/// that overran the interval is followed immediately by the next one.
pub struct IntervalPacer {
    interval: Duration,
    next: Option<Instant>,
}

impl IntervalPacer {
    pub fn new(refresh_hz: u32) -> Self {
        Self {
            interval: Duration::from_nanos(1_000_000_000 / refresh_hz.max(1) as u64),
            next: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl FramePacer for IntervalPacer {
    fn wait_for_refresh(&mut self) {
        let now = Instant::now();
        let next = self.next.unwrap_or(now) + self.interval;
        if next > now {
            std::thread::sleep(next - now);
            self.next = Some(next);
        } else {
            self.next = Some(now);
        }
    }
}

/// What one tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The activity flag is off; the loop ends.
    Stopped,
    /// Source not ready; nothing submitted.
    Skipped,
    /// Detector answered and the overlay was rendered.
    Rendered { face: bool },
    /// Detector failed; rendered as a frame without a face.
    Dropped,
}

pub struct DetectionDriver {
    source: Arc<dyn VideoSource>,
    detector: Box<dyn FaceDetector>,
    compositor: Compositor,
    active: Arc<AtomicBool>,
    frames_submitted: u64,
    frames_dropped: u64,
}

impl DetectionDriver {
    pub fn new(
        source: Arc<dyn VideoSource>,
        detector: Box<dyn FaceDetector>,
        compositor: Compositor,
        active: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            detector,
            compositor,
            active,
            frames_submitted: 0,
            frames_dropped: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    /// Whether the source has at least its current frame decoded.
    pub fn source_can_start(&self) -> bool {
        self.source.ready_state().can_start()
    }

    /// Warm the detector up. A failure is logged; submissions will report it again.
    pub fn warm_up(&mut self) {
        if let Err(e) = self.detector.warm_up() {
            log::warn!("detector {} warm-up failed: {:#}", self.detector.name(), e);
        }
    }

    /// Run one iteration of the loop.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.is_active() {
            return TickOutcome::Stopped;
        }
        if !self.source.ready_state().can_detect() {
            return TickOutcome::Skipped;
        }
        let Some(frame) = self.source.current_frame() else {
            return TickOutcome::Skipped;
        };

        self.frames_submitted += 1;
        let (result, outcome) = match self.detector.submit(&frame) {
            Ok(result) => {
                let face = result.has_face();
                (result, TickOutcome::Rendered { face })
            }
            Err(e) => {
                self.frames_dropped += 1;
                log::debug!(
                    "detector {} failed on frame {}: {:#}",
                    self.detector.name(),
                    frame.sequence,
                    e
                );
                (FrameResult::NoFace, TickOutcome::Dropped)
            }
        };

        if let Err(e) = self
            .compositor
            .render(frame.width(), frame.height(), &result)
        {
            log::warn!("overlay render skipped: {:#}", e);
        }
        outcome
    }

    /// Tick until stopped, waiting for a refresh between ticks. Releases the
    /// detector and resets smoothing on the way out.
    pub fn run(mut self, pacer: &mut dyn FramePacer) -> Self {
        log::info!(
            "detection loop started (source={}, detector={})",
            self.source.name(),
            self.detector.name()
        );
        while self.tick() != TickOutcome::Stopped {
            pacer.wait_for_refresh();
        }
        self.shutdown();
        self
    }

    /// Close the detector and forget smoothing state.
    pub fn shutdown(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.detector.close();
        self.compositor.reset();
        log::info!(
            "detection loop stopped after {} frames ({} dropped)",
            self.frames_submitted,
            self.frames_dropped
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{OverlayAsset, OverlayAssets};
    use crate::clock::SystemClock;
    use crate::detect::{DetectorProbe, FaceLandmarks, Landmark, ScriptStep, ScriptedDetector};
    use crate::frame::ReadyState;
    use crate::ingest::{SyntheticConfig, SyntheticSource};
    use crate::render::RenderSettings;
    use crate::surface::OverlaySurface;
    use image::RgbaImage;

    struct CountingPacer {
        waits: usize,
        stop_after: usize,
        active: Arc<AtomicBool>,
    }

    impl FramePacer for CountingPacer {
        fn wait_for_refresh(&mut self) {
            self.waits += 1;
            if self.waits >= self.stop_after {
                self.active.store(false, Ordering::SeqCst);
            }
        }
    }

    fn face() -> FaceLandmarks {
        FaceLandmarks::new(vec![Landmark::new(0.4, 0.4), Landmark::new(0.6, 0.6)])
    }

    fn driver(script: Vec<ScriptStep>) -> (DetectionDriver, Arc<SyntheticSource>, DetectorProbe) {
        let source = Arc::new(
            SyntheticSource::new(SyntheticConfig {
                width: 64,
                height: 48,
                ..SyntheticConfig::default()
            })
            .unwrap(),
        );
        let detector = ScriptedDetector::new(script);
        let probe = detector.probe();
        let compositor = Compositor::new(
            RenderSettings::default(),
            OverlayAssets::single(OverlayAsset::ready("p", RgbaImage::new(2, 2))),
            Arc::new(OverlaySurface::new()),
            Arc::new(SystemClock),
        );
        let driver = DetectionDriver::new(
            source.clone(),
            Box::new(detector),
            compositor,
            Arc::new(AtomicBool::new(true)),
        );
        (driver, source, probe)
    }

    #[test]
    fn tick_renders_detector_results() {
        let (mut driver, _, probe) = driver(vec![ScriptStep::Face(face()), ScriptStep::NoFace]);
        assert_eq!(driver.tick(), TickOutcome::Rendered { face: true });
        assert!(driver.compositor().surface().state().face_present);
        assert_eq!(driver.tick(), TickOutcome::Rendered { face: false });
        assert!(!driver.compositor().surface().state().face_present);
        assert_eq!(probe.submissions(), 2);
        assert_eq!(driver.compositor().surface().dimensions(), (64, 48));
    }

    #[test]
    fn unready_source_is_skipped_without_submitting() {
        let (mut driver, source, probe) = driver(vec![ScriptStep::Face(face())]);
        source.force_ready_state(Some(ReadyState::HaveFutureData));
        assert_eq!(driver.tick(), TickOutcome::Skipped);
        assert_eq!(probe.submissions(), 0);
        source.force_ready_state(None);
        assert_eq!(driver.tick(), TickOutcome::Rendered { face: true });
    }

    #[test]
    fn detector_failure_is_an_empty_frame() {
        let (mut driver, _, _) = driver(vec![
            ScriptStep::Face(face()),
            ScriptStep::Fail("camera switch".to_string()),
            ScriptStep::Face(face()),
        ]);
        driver.tick();
        assert_eq!(driver.tick(), TickOutcome::Dropped);
        assert!(!driver.compositor().surface().state().face_present);
        assert_eq!(driver.tick(), TickOutcome::Rendered { face: true });
        assert_eq!(driver.frames_dropped(), 1);
        assert_eq!(driver.frames_submitted(), 3);
    }

    #[test]
    fn run_stops_on_flag_and_closes_detector() {
        let (driver, _, probe) = driver(vec![ScriptStep::Face(face())]);
        let mut pacer = CountingPacer {
            waits: 0,
            stop_after: 3,
            active: Arc::clone(&driver.active),
        };
        let mut driver = driver.run(&mut pacer);
        assert_eq!(pacer.waits, 3);
        assert_eq!(probe.submissions(), 3);
        assert!(probe.is_closed());
        assert!(!driver.is_active());
        assert_eq!(driver.tick(), TickOutcome::Stopped);
        assert_eq!(probe.submissions(), 3);
    }

    #[test]
    fn interval_pacer_waits_roughly_one_interval() {
        let mut pacer = IntervalPacer::new(100);
        assert_eq!(pacer.interval(), Duration::from_millis(10));
        let start = Instant::now();
        pacer.wait_for_refresh();
        pacer.wait_for_refresh();
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
