mod backend;
mod backends;
mod result;

pub use backend::{DetectorOptions, FaceDetector};
pub use backends::{
    synthetic_face, DetectorProbe, FaceShape, ScriptStep, ScriptedDetector, SyntheticFaceDetector,
};
pub use result::{
    FaceLandmarks, FrameResult, Landmark, LandmarkIndices, FACE_MESH_LANDMARKS,
    REFINED_FACE_MESH_LANDMARKS,
};
