use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::detect::backend::{DetectorOptions, FaceDetector};
use crate::detect::result::{
    FaceLandmarks, FrameResult, Landmark, LandmarkIndices, FACE_MESH_LANDMARKS,
    REFINED_FACE_MESH_LANDMARKS,
};
use crate::frame::VideoFrame;

/// Shape of a synthetic face, all values normalized to the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceShape {
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
    /// Lip gap divided by nose-to-chin distance.
    pub aperture: f32,
}

/// Build a face-mesh-shaped landmark set: points on the face outline ellipse,
/// with the lip, nose bridge and chin indices placed for the given aperture.
pub fn synthetic_face(shape: FaceShape, indices: LandmarkIndices, count: usize) -> FaceLandmarks {
    let half_w = shape.width / 2.0;
    let half_h = shape.height / 2.0;
    let mut points: Vec<Landmark> = (0..count)
        .map(|i| {
            let theta = i as f32 / count as f32 * std::f32::consts::TAU;
            Landmark::new(
                shape.center_x + half_w * theta.cos(),
                shape.center_y + half_h * theta.sin(),
            )
        })
        .collect();

    let nose = Landmark::new(shape.center_x, shape.center_y - 0.15 * shape.height);
    let chin = Landmark::new(shape.center_x, shape.center_y + half_h);
    let upper = Landmark::new(shape.center_x, shape.center_y + 0.18 * shape.height);
    let lower = Landmark::new(
        shape.center_x,
        upper.y + shape.aperture.max(0.0) * (chin.y - nose.y),
    );
    for (index, point) in [
        (indices.nose_bridge, nose),
        (indices.chin, chin),
        (indices.upper_lip, upper),
        (indices.lower_lip, lower),
    ] {
        if let Some(slot) = points.get_mut(index) {
            *slot = point;
        }
    }
    FaceLandmarks::new(points)
}

/// Detector that animates a synthetic face: the head drifts in a small
/// circle, the mouth opens and closes, and the face briefly leaves the frame
/// once per cycle. Jitter is seeded so runs are reproducible.
pub struct SyntheticFaceDetector {
    options: DetectorOptions,
    indices: LandmarkIndices,
    rng: StdRng,
    /// Frames per open/close cycle.
    cycle_frames: u64,
    closed: bool,
}

impl SyntheticFaceDetector {
    pub fn new(options: DetectorOptions, seed: u64) -> Self {
        Self {
            options,
            indices: LandmarkIndices::default(),
            rng: StdRng::seed_from_u64(seed),
            cycle_frames: 90,
            closed: false,
        }
    }

    pub fn with_indices(mut self, indices: LandmarkIndices) -> Self {
        self.indices = indices;
        self
    }

    pub fn with_cycle_frames(mut self, frames: u64) -> Self {
        self.cycle_frames = frames.max(4);
        self
    }

    fn shape_for(&mut self, sequence: u64) -> Option<FaceShape> {
        let position = sequence % self.cycle_frames;
        // Last tenth of every cycle has nobody in frame.
        if position >= self.cycle_frames - self.cycle_frames / 10 {
            return None;
        }
        let phase = position as f32 / self.cycle_frames as f32;
        let angle = phase * std::f32::consts::TAU;
        let jitter = self.rng.gen_range(-0.004f32..0.004);
        let mouth = (angle * 2.0).sin().max(0.0) * 0.12;
        Some(FaceShape {
            center_x: 0.5 + 0.05 * angle.cos() + jitter,
            center_y: 0.5 + 0.03 * angle.sin(),
            width: 0.22,
            height: 0.3,
            aperture: mouth + jitter.abs(),
        })
    }
}

impl FaceDetector for SyntheticFaceDetector {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn warm_up(&mut self) -> Result<()> {
        log::info!(
            "synthetic detector ready (max_faces={}, refine={}, det={:.2}, track={:.2})",
            self.options.max_num_faces,
            self.options.refine_landmarks,
            self.options.min_detection_confidence,
            self.options.min_tracking_confidence
        );
        Ok(())
    }

    fn submit(&mut self, frame: &VideoFrame) -> Result<FrameResult> {
        if self.closed {
            anyhow::bail!("synthetic detector used after close");
        }
        let count = if self.options.refine_landmarks {
            REFINED_FACE_MESH_LANDMARKS
        } else {
            FACE_MESH_LANDMARKS
        };
        let faces = self
            .shape_for(frame.sequence)
            .map(|shape| synthetic_face(shape, self.indices, count));
        Ok(FrameResult::from_faces(faces))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn synthetic_face_places_semantic_points() {
        let indices = LandmarkIndices::default();
        let face = synthetic_face(
            FaceShape {
                center_x: 0.5,
                center_y: 0.5,
                width: 0.2,
                height: 0.4,
                aperture: 0.1,
            },
            indices,
            FACE_MESH_LANDMARKS,
        );
        assert_eq!(face.len(), FACE_MESH_LANDMARKS);
        let nose = face.point(indices.nose_bridge).unwrap();
        let chin = face.point(indices.chin).unwrap();
        let upper = face.point(indices.upper_lip).unwrap();
        let lower = face.point(indices.lower_lip).unwrap();
        let ratio = (lower.y - upper.y).abs() / (chin.y - nose.y).abs();
        assert!((ratio - 0.1).abs() < 1e-5);
    }

    #[test]
    fn detector_cycles_through_an_empty_stretch() {
        let mut detector = SyntheticFaceDetector::new(DetectorOptions::default(), 7)
            .with_cycle_frames(10);
        let mut faces = 0;
        let mut empty = 0;
        for sequence in 0..10 {
            let frame = VideoFrame::new(RgbaImage::new(4, 4), sequence);
            match detector.submit(&frame).unwrap() {
                FrameResult::Face(landmarks) => {
                    assert_eq!(landmarks.len(), REFINED_FACE_MESH_LANDMARKS);
                    faces += 1;
                }
                FrameResult::NoFace => empty += 1,
            }
        }
        assert_eq!(faces, 10 - empty);
        assert!(empty >= 1);
    }

    #[test]
    fn closed_detector_fails_submissions() {
        let mut detector = SyntheticFaceDetector::new(DetectorOptions::default(), 1);
        detector.close();
        let frame = VideoFrame::new(RgbaImage::new(4, 4), 0);
        assert!(detector.submit(&frame).is_err());
    }
}
