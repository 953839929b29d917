pub mod scripted;
pub mod synthetic;

pub use scripted::{DetectorProbe, ScriptStep, ScriptedDetector};
pub use synthetic::{synthetic_face, FaceShape, SyntheticFaceDetector};
