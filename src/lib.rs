//! Pumpkin Lens
//!
//! Paints a jack-o'-lantern over the face found in a live video stream.
//!
//! # Architecture
//!
//! - `detect`: face landmark detectors behind the [`FaceDetector`] trait
//! - `signal`: bounding region and mouth aperture from landmarks
//! - `smoothing`: debounce and crossfade of the mouth state
//! - `render`: the compositor that paints the overlay for one detection result
//! - `driver`: the detection loop, one frame in flight at a time
//! - `session`: start/stop/toggle surface around the loop
//! - `capture`: photos and recordings of video plus overlay
//!
//! Video comes from an `ingest` source implementing [`VideoSource`]; the
//! overlay lands on a shared [`OverlaySurface`] that capture reads from.

pub mod asset;
pub mod canvas;
pub mod capture;
pub mod clock;
pub mod config;
pub mod detect;
pub mod driver;
pub mod frame;
pub mod ingest;
pub mod placement;
pub mod render;
pub mod session;
pub mod signal;
pub mod smoothing;
pub mod surface;
pub mod ui;

pub use asset::{OverlayAsset, OverlayAssets};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::OverlayConfig;
pub use detect::{FaceDetector, FaceLandmarks, FrameResult, Landmark, LandmarkIndices};
pub use driver::{DetectionDriver, FramePacer, IntervalPacer, TickOutcome};
pub use frame::{ReadyState, VideoFrame, VideoSource};
pub use placement::Placement;
pub use render::{Compositor, DisplayMode, RenderSettings};
pub use session::{Session, SessionSummary};
pub use signal::{BoundingRegion, FaceSignal, SignalExtractor, SignalThresholds};
pub use surface::{OverlayState, OverlaySurface};
