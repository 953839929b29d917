use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::detect::result::FrameResult;
use crate::frame::VideoFrame;

/// Options handed to a detector when it is created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectorOptions {
    /// Faces the detector tracks. Only the first is ever used.
    pub max_num_faces: u32,
    /// Request iris/lip refinement (478 landmarks instead of 468).
    pub refine_landmarks: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            max_num_faces: 1,
            refine_landmarks: true,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

/// Face landmark detector.
///
/// The driver guarantees one outstanding `submit` at a time: the next frame is
/// only submitted after the previous call returned, so implementations never
/// see reentrant calls. An `Err` is a transient failure; the driver logs it and
/// treats the frame as having no face.
pub trait FaceDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on one frame.
    fn submit(&mut self, frame: &VideoFrame) -> Result<FrameResult>;

    /// Optional warm-up hook, called once before the first submission.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release the underlying model. Called once when the session stops.
    fn close(&mut self) {}
}
