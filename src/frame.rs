//! Video frame types and the video source seam.
//!
//! - `VideoFrame`: one decoded RGBA frame at the source's native size.
//! - `ReadyState`: how much data the source has buffered, polled every tick.
//! - `VideoSource`: what the driver and the capture path need from a camera.
//!
//! Sources are read concurrently by the detection loop and the capture loop.
//! Reads are snapshots of the current decoder output and never mutate what the
//! other reader sees, so implementations only need interior locking around
//! their own decode state.

use image::RgbaImage;

/// Buffered-data level of a video source, ordered from "nothing" to "enough".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

impl ReadyState {
    /// Detection only runs on frames from a source that reports enough data.
    pub fn can_detect(self) -> bool {
        self == ReadyState::HaveEnoughData
    }

    /// The session waits for at least the current frame before starting detection.
    pub fn can_start(self) -> bool {
        self >= ReadyState::HaveCurrentData
    }
}

/// A decoded video frame.
#[derive(Clone, Debug)]
pub struct VideoFrame {
    pixels: RgbaImage,
    /// Monotonic index assigned by the source.
    pub sequence: u64,
}

impl VideoFrame {
    pub fn new(pixels: RgbaImage, sequence: u64) -> Self {
        Self { pixels, sequence }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Camera or file that the overlay is composited over.
pub trait VideoSource: Send + Sync {
    /// Source identifier for logs.
    fn name(&self) -> &str;

    /// Current buffered-data level. Polled; may go back down during a device switch.
    fn ready_state(&self) -> ReadyState;

    /// Native pixel size of the current decoded frame, `(0, 0)` before metadata.
    fn dimensions(&self) -> (u32, u32);

    /// Snapshot of the current decoded frame, if any.
    fn current_frame(&self) -> Option<VideoFrame>;
}
