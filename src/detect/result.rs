use serde::{Deserialize, Serialize};

/// Landmarks in a face-mesh result without iris refinement.
pub const FACE_MESH_LANDMARKS: usize = 468;
/// Landmarks in a face-mesh result with iris refinement enabled.
pub const REFINED_FACE_MESH_LANDMARKS: usize = 478;

/// One tracked point. Coordinates are normalized to 0..1 of the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Relative depth. Carried through from detectors, never used for placement.
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// Ordered landmark set of one face.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceLandmarks(Vec<Landmark>);

impl FaceLandmarks {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self(points)
    }

    pub fn point(&self, index: usize) -> Option<Landmark> {
        self.0.get(index).copied()
    }

    pub fn points(&self) -> &[Landmark] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Anatomical indices the expression signal is read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkIndices {
    pub upper_lip: usize,
    pub lower_lip: usize,
    pub nose_bridge: usize,
    pub chin: usize,
}

impl Default for LandmarkIndices {
    fn default() -> Self {
        Self {
            upper_lip: 13,
            lower_lip: 14,
            nose_bridge: 168,
            chin: 152,
        }
    }
}

/// Outcome of one detector submission.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum FrameResult {
    #[default]
    NoFace,
    Face(FaceLandmarks),
}

impl FrameResult {
    /// Keep only the first face a detector reported.
    pub fn from_faces(faces: impl IntoIterator<Item = FaceLandmarks>) -> Self {
        match faces.into_iter().next() {
            Some(face) => FrameResult::Face(face),
            None => FrameResult::NoFace,
        }
    }

    pub fn landmarks(&self) -> Option<&FaceLandmarks> {
        match self {
            FrameResult::Face(landmarks) => Some(landmarks),
            FrameResult::NoFace => None,
        }
    }

    pub fn has_face(&self) -> bool {
        matches!(self, FrameResult::Face(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_faces_keeps_first_face_only() {
        let first = FaceLandmarks::new(vec![Landmark::new(0.1, 0.2)]);
        let second = FaceLandmarks::new(vec![Landmark::new(0.9, 0.9)]);
        let result = FrameResult::from_faces(vec![first.clone(), second]);
        assert_eq!(result.landmarks(), Some(&first));
        assert_eq!(FrameResult::from_faces(Vec::new()), FrameResult::NoFace);
    }

    #[test]
    fn landmarks_deserialize_without_depth() {
        let face: FaceLandmarks = serde_json::from_str(r#"[{"x":0.5,"y":0.25}]"#).unwrap();
        assert_eq!(face.point(0), Some(Landmark::new(0.5, 0.25)));
        assert_eq!(face.point(1), None);
    }
}
