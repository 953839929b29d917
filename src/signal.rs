//! Face region and mouth-openness extraction.
//!
//! Everything here is a pure function of one frame's landmarks.

use serde::{Deserialize, Serialize};

use crate::detect::{FaceLandmarks, LandmarkIndices};

/// Nose-to-chin distances below this are treated as "no signal".
pub const MIN_FACE_HEIGHT: f32 = 1e-6;

/// Axis-aligned box around every landmark, normalized to 0..1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingRegion {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl BoundingRegion {
    /// Identity of the min/max fold. Inverted, so `is_empty` holds.
    pub const EMPTY: BoundingRegion = BoundingRegion {
        min_x: 1.0,
        min_y: 1.0,
        max_x: 0.0,
        max_y: 0.0,
    };

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f32, f32) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }
}

/// Fold min/max over all landmarks. Returns `BoundingRegion::EMPTY` for an
/// empty landmark set.
pub fn extract_region(landmarks: &FaceLandmarks) -> BoundingRegion {
    landmarks
        .points()
        .iter()
        .fold(BoundingRegion::EMPTY, |region, point| BoundingRegion {
            min_x: region.min_x.min(point.x),
            min_y: region.min_y.min(point.y),
            max_x: region.max_x.max(point.x),
            max_y: region.max_y.max(point.y),
        })
}

/// Lip gap divided by nose-to-chin distance.
///
/// `None` when one of the indices is missing or the face height is degenerate.
pub fn mouth_aperture(landmarks: &FaceLandmarks, indices: &LandmarkIndices) -> Option<f32> {
    let upper = landmarks.point(indices.upper_lip)?;
    let lower = landmarks.point(indices.lower_lip)?;
    let nose = landmarks.point(indices.nose_bridge)?;
    let chin = landmarks.point(indices.chin)?;

    let face_height = (chin.y - nose.y).abs();
    if !face_height.is_finite() || face_height < MIN_FACE_HEIGHT {
        return None;
    }
    let ratio = (lower.y - upper.y).abs() / face_height;
    ratio.is_finite().then_some(ratio)
}

/// Thresholds mapping the aperture ratio to open/closed and to intensity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    /// Ratio above which the mouth counts as open.
    pub activation: f32,
    /// Ratio mapped to intensity 0.
    pub low_ratio: f32,
    /// Ratio mapped to intensity 1.
    pub high_ratio: f32,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            activation: 0.035,
            low_ratio: 0.02,
            high_ratio: 0.08,
        }
    }
}

impl SignalThresholds {
    pub fn is_open(&self, ratio: f32) -> bool {
        ratio > self.activation
    }

    pub fn intensity(&self, ratio: f32) -> f32 {
        let span = self.high_ratio - self.low_ratio;
        if span <= 0.0 {
            return if ratio >= self.high_ratio { 1.0 } else { 0.0 };
        }
        ((ratio - self.low_ratio) / span).clamp(0.0, 1.0)
    }
}

/// Everything the renderer needs from one frame's landmarks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceSignal {
    pub region: BoundingRegion,
    /// `None` when the aperture could not be measured.
    pub aperture: Option<f32>,
    pub open: bool,
    pub intensity: f32,
}

/// Landmark indices plus thresholds, applied together.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SignalExtractor {
    pub indices: LandmarkIndices,
    pub thresholds: SignalThresholds,
}

impl SignalExtractor {
    pub fn new(indices: LandmarkIndices, thresholds: SignalThresholds) -> Self {
        Self {
            indices,
            thresholds,
        }
    }

    /// `None` when the landmarks do not enclose any region.
    pub fn extract(&self, landmarks: &FaceLandmarks) -> Option<FaceSignal> {
        let region = extract_region(landmarks);
        if region.is_empty() {
            return None;
        }
        let aperture = mouth_aperture(landmarks, &self.indices);
        if aperture.is_none() {
            log::trace!("mouth aperture unavailable; treating mouth as closed");
        }
        Some(FaceSignal {
            region,
            aperture,
            open: aperture.is_some_and(|ratio| self.thresholds.is_open(ratio)),
            intensity: aperture.map_or(0.0, |ratio| self.thresholds.intensity(ratio)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Landmark;

    fn indices() -> LandmarkIndices {
        LandmarkIndices {
            upper_lip: 0,
            lower_lip: 1,
            nose_bridge: 2,
            chin: 3,
        }
    }

    fn face(upper: f32, lower: f32, nose: f32, chin: f32) -> FaceLandmarks {
        FaceLandmarks::new(vec![
            Landmark::new(0.5, upper),
            Landmark::new(0.5, lower),
            Landmark::new(0.45, nose),
            Landmark::new(0.55, chin),
        ])
    }

    #[test]
    fn region_is_ordered_for_any_non_empty_set() {
        let sets = [
            vec![Landmark::new(0.3, 0.7)],
            vec![Landmark::new(0.9, 0.1), Landmark::new(0.1, 0.9)],
            vec![
                Landmark::new(0.5, 0.5),
                Landmark::new(0.2, 0.6),
                Landmark::new(0.7, 0.3),
            ],
        ];
        for points in sets {
            let region = extract_region(&FaceLandmarks::new(points));
            assert!(region.min_x <= region.max_x);
            assert!(region.min_y <= region.max_y);
            assert!(!region.is_empty());
        }
    }

    #[test]
    fn empty_landmarks_give_inverted_region() {
        let region = extract_region(&FaceLandmarks::default());
        assert_eq!(region, BoundingRegion::EMPTY);
        assert!(region.is_empty());
        assert!(SignalExtractor::default()
            .extract(&FaceLandmarks::default())
            .is_none());
    }

    #[test]
    fn region_center_and_extent() {
        let region = extract_region(&FaceLandmarks::new(vec![
            Landmark::new(0.2, 0.4),
            Landmark::new(0.6, 0.8),
        ]));
        assert!((region.width() - 0.4).abs() < 1e-6);
        assert!((region.height() - 0.4).abs() < 1e-6);
        let (cx, cy) = region.center();
        assert!((cx - 0.4).abs() < 1e-6);
        assert!((cy - 0.6).abs() < 1e-6);
    }

    #[test]
    fn aperture_is_scale_free() {
        let base = face(0.50, 0.53, 0.40, 0.70);
        let ratio = mouth_aperture(&base, &indices()).unwrap();
        assert!((ratio - 0.1).abs() < 1e-5);

        for (scale, offset) in [(0.5, 0.1), (2.0, -0.3), (0.25, 0.6)] {
            let map = |y: f32| y * scale + offset;
            let scaled = face(map(0.50), map(0.53), map(0.40), map(0.70));
            let scaled_ratio = mouth_aperture(&scaled, &indices()).unwrap();
            assert!((scaled_ratio - ratio).abs() < 1e-4, "scale {scale}");
        }
    }

    #[test]
    fn degenerate_face_height_has_no_signal() {
        let flat = face(0.5, 0.52, 0.6, 0.6);
        assert_eq!(mouth_aperture(&flat, &indices()), None);

        let extractor = SignalExtractor::new(indices(), SignalThresholds::default());
        let signal = extractor.extract(&flat).unwrap();
        assert!(!signal.open);
        assert_eq!(signal.intensity, 0.0);
    }

    #[test]
    fn missing_indices_have_no_signal() {
        let short = FaceLandmarks::new(vec![Landmark::new(0.5, 0.5)]);
        assert_eq!(mouth_aperture(&short, &LandmarkIndices::default()), None);
    }

    #[test]
    fn thresholds_map_ratio() {
        let thresholds = SignalThresholds::default();
        assert!(!thresholds.is_open(0.035));
        assert!(thresholds.is_open(0.036));
        assert_eq!(thresholds.intensity(0.01), 0.0);
        assert!((thresholds.intensity(0.05) - 0.5).abs() < 1e-5);
        assert_eq!(thresholds.intensity(0.5), 1.0);
    }

    #[test]
    fn extractor_combines_region_and_expression() {
        let extractor = SignalExtractor::new(indices(), SignalThresholds::default());
        let signal = extractor.extract(&face(0.50, 0.53, 0.40, 0.70)).unwrap();
        assert!(signal.open);
        assert_eq!(signal.intensity, 1.0);
        assert!((signal.aperture.unwrap() - 0.1).abs() < 1e-5);
    }
}
