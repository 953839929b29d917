use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};

use pumpkin_lens::capture::{capture_photo, PhotoOptions};
use pumpkin_lens::detect::{
    synthetic_face, FaceShape, ScriptStep, ScriptedDetector, FACE_MESH_LANDMARKS,
};
use pumpkin_lens::ingest::{FileSource, SyntheticConfig, SyntheticSource};
use pumpkin_lens::{
    DisplayMode, LandmarkIndices, OverlayAsset, OverlayAssets, OverlayConfig, ReadyState, Session,
};

const OVERLAY: Rgba<u8> = Rgba([255, 255, 0, 255]);

fn fast_config(mode: DisplayMode) -> OverlayConfig {
    let mut cfg = OverlayConfig::default();
    cfg.render.mode = mode;
    cfg.session.start_delay = Duration::ZERO;
    cfg.session.refresh_hz = 500;
    cfg
}

fn face(aperture: f32) -> ScriptStep {
    ScriptStep::Face(synthetic_face(
        FaceShape {
            center_x: 0.5,
            center_y: 0.5,
            width: 0.2,
            height: 0.25,
            aperture,
        },
        LandmarkIndices::default(),
        FACE_MESH_LANDMARKS,
    ))
}

fn assets() -> OverlayAssets {
    OverlayAssets::single(OverlayAsset::ready("pumpkin", RgbaImage::from_pixel(8, 8, OVERLAY)))
}

fn source() -> Arc<SyntheticSource> {
    Arc::new(
        SyntheticSource::new(SyntheticConfig {
            width: 160,
            height: 120,
            ..SyntheticConfig::default()
        })
        .expect("synthetic source"),
    )
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

#[test]
fn session_renders_then_stops_and_closes_detector() {
    let detector = ScriptedDetector::new(vec![face(0.0)]).cycling();
    let probe = detector.probe();
    let mut session = Session::start(
        &fast_config(DisplayMode::Static),
        source(),
        Box::new(detector),
        assets(),
    )
    .expect("start session");

    assert!(wait_until(Duration::from_secs(5), || {
        session.overlay_state().drawn
    }));
    assert!(session.is_active());
    assert!(session.overlay_state().face_present);
    assert_eq!(session.surface().dimensions(), (160, 120));

    session.stop();
    assert!(!session.is_active());
    assert!(probe.is_closed());
    let summary = session.summary().expect("summary after stop");
    assert_eq!(summary.frames_submitted as usize, probe.submissions());

    let after_stop = probe.submissions();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(probe.submissions(), after_stop);

    session.stop();
    assert_eq!(session.summary(), Some(summary));
}

#[test]
fn stop_waits_for_in_flight_detection() {
    let detector = ScriptedDetector::new(vec![face(0.0)])
        .cycling()
        .with_latency(Duration::from_millis(40));
    let probe = detector.probe();
    let mut session = Session::start(
        &fast_config(DisplayMode::Static),
        source(),
        Box::new(detector),
        assets(),
    )
    .expect("start session");

    assert!(wait_until(Duration::from_secs(5), || probe.submissions() > 0));
    session.stop();
    let submitted = probe.submissions();
    assert!(probe.is_closed());
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(probe.submissions(), submitted);
}

#[test]
fn stop_before_start_delay_never_submits() {
    let detector = ScriptedDetector::new(vec![face(0.0)]).cycling();
    let probe = detector.probe();
    let mut cfg = fast_config(DisplayMode::Static);
    cfg.session.start_delay = Duration::from_secs(10);
    let mut session =
        Session::start(&cfg, source(), Box::new(detector), assets()).expect("start session");

    let started = Instant::now();
    session.stop();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(probe.submissions(), 0);
    assert!(probe.is_closed());
}

#[test]
fn waits_for_source_to_have_a_frame() {
    let source = source();
    source.force_ready_state(Some(ReadyState::HaveMetadata));
    let detector = ScriptedDetector::new(vec![face(0.0)]).cycling();
    let probe = detector.probe();
    let mut session = Session::start(
        &fast_config(DisplayMode::Static),
        source.clone(),
        Box::new(detector),
        assets(),
    )
    .expect("start session");

    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(probe.submissions(), 0);

    source.force_ready_state(None);
    assert!(wait_until(Duration::from_secs(5), || probe.submissions() > 0));
    session.stop();
}

#[test]
fn toggling_twice_restores_the_overlay() {
    let detector = ScriptedDetector::new(vec![face(0.0)]).cycling();
    let mut session = Session::start(
        &fast_config(DisplayMode::Static),
        source(),
        Box::new(detector),
        assets(),
    )
    .expect("start session");
    assert!(wait_until(Duration::from_secs(5), || {
        session.overlay_state().drawn
    }));

    assert!(!session.toggle_filter());
    assert!(!session.is_filter_enabled());
    assert!(wait_until(Duration::from_secs(5), || {
        let state = session.overlay_state();
        !state.filter_enabled && !state.drawn
    }));

    assert!(session.toggle_filter());
    assert!(wait_until(Duration::from_secs(5), || {
        session.overlay_state().drawn
    }));
    session.stop();
}

#[test]
fn disabling_the_filter_hides_the_overlay_until_enabled() {
    let detector = ScriptedDetector::new(vec![face(0.0)]).cycling();
    let mut session = Session::start(
        &fast_config(DisplayMode::Static),
        source(),
        Box::new(detector),
        assets(),
    )
    .expect("start session");
    assert!(wait_until(Duration::from_secs(5), || {
        session.overlay_state().drawn
    }));

    session.set_filter_enabled(false);
    session.set_filter_enabled(false);
    assert!(!session.is_filter_enabled());
    assert!(wait_until(Duration::from_secs(5), || {
        let state = session.overlay_state();
        !state.filter_enabled && !state.drawn
    }));
    let layer = session.surface().snapshot().expect("overlay layer");
    assert!(layer.pixels().all(|p| p.0[3] == 0));

    session.set_filter_enabled(true);
    assert!(session.is_filter_enabled());
    assert!(wait_until(Duration::from_secs(5), || {
        let state = session.overlay_state();
        state.filter_enabled && state.drawn
    }));
    let layer = session.surface().snapshot().expect("overlay layer");
    assert!(layer.pixels().any(|p| *p == OVERLAY));
    session.stop();
}

#[test]
fn photo_contains_the_overlay() {
    let still = Arc::new(FileSource::from_image(
        "still",
        RgbaImage::from_pixel(160, 120, Rgba([0, 0, 0, 255])),
    ));
    let detector = ScriptedDetector::new(vec![face(0.0)]).cycling();
    let mut session = Session::start(
        &fast_config(DisplayMode::Static),
        still.clone(),
        Box::new(detector),
        assets(),
    )
    .expect("start session");
    assert!(wait_until(Duration::from_secs(5), || {
        session.overlay_state().drawn
    }));

    let photo = capture_photo(
        still.as_ref(),
        &session.surface(),
        PhotoOptions {
            scale_factor: 1,
            ..PhotoOptions::default()
        },
    )
    .expect("capture photo");
    session.stop();

    assert_eq!(photo.dimensions(), (160, 120));
    assert!(photo.pixels().any(|p| *p == OVERLAY));
    assert_eq!(photo.get_pixel(0, 119), &Rgba([0, 0, 0, 255]));
}
