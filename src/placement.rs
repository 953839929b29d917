//! Overlay geometry in destination-canvas pixels.

use serde::{Deserialize, Serialize};

use crate::signal::BoundingRegion;

/// Where the overlay goes on this frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Face centre in canvas pixels.
    pub center_x: f32,
    pub center_y: f32,
    /// Side of the square overlay before vertical scaling.
    pub size: f32,
    /// Top-left corner of the unscaled overlay.
    pub x: f32,
    pub y: f32,
    pub vertical_offset: f32,
    /// Vertical stretch applied about the overlay's own centre.
    pub scale_y: f32,
}

impl Placement {
    /// Square overlay centred on the region, `scale` times its larger side,
    /// lifted by `vertical_offset` pixels.
    pub fn compute(
        region: &BoundingRegion,
        canvas_width: u32,
        canvas_height: u32,
        scale: f32,
        vertical_offset: f32,
    ) -> Self {
        let width = canvas_width as f32;
        let height = canvas_height as f32;
        let face_size = (region.width() * width).max(region.height() * height);
        let size = face_size * scale;
        let (cx, cy) = region.center();
        let center_x = cx * width;
        let center_y = cy * height;
        Self {
            center_x,
            center_y,
            size,
            x: center_x - size / 2.0,
            y: center_y - size / 2.0 - vertical_offset,
            vertical_offset,
            scale_y: 1.0,
        }
    }

    pub fn with_scale_y(mut self, scale_y: f32) -> Self {
        self.scale_y = scale_y;
        self
    }

    /// Destination rectangle `(x, y, w, h)` after the vertical stretch.
    pub fn draw_rect(&self) -> (f32, f32, f32, f32) {
        let height = self.size * self.scale_y;
        let overlay_center_y = self.y + self.size / 2.0;
        (self.x, overlay_center_y - height / 2.0, self.size, height)
    }
}

/// Vertical stretch for a mouth intensity: `1 + intensity * k`.
pub fn stretch_factor(intensity: f32, k: f32) -> f32 {
    1.0 + intensity.clamp(0.0, 1.0) * k
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region_px(x: f32, y: f32, w: f32, h: f32, canvas: f32) -> BoundingRegion {
        BoundingRegion {
            min_x: x / canvas,
            min_y: y / canvas,
            max_x: (x + w) / canvas,
            max_y: (y + h) / canvas,
        }
    }

    #[test]
    fn overlay_uses_larger_side_of_face() {
        let region = region_px(300.0, 200.0, 100.0, 200.0, 1000.0);
        let placement = Placement::compute(&region, 1000, 1000, 2.3, 0.0);
        assert!((placement.size - 460.0).abs() < 1e-2);
        assert!((placement.center_x - 350.0).abs() < 1e-2);
        assert!((placement.center_y - 300.0).abs() < 1e-2);
        assert!((placement.x - (350.0 - 230.0)).abs() < 1e-2);
        assert!((placement.y - (300.0 - 230.0)).abs() < 1e-2);
    }

    #[test]
    fn vertical_offset_lifts_overlay() {
        let region = region_px(300.0, 200.0, 100.0, 200.0, 1000.0);
        let level = Placement::compute(&region, 1000, 1000, 2.3, 0.0);
        let lifted = Placement::compute(&region, 1000, 1000, 2.3, 50.0);
        assert!((level.y - lifted.y - 50.0).abs() < 1e-3);
        assert_eq!(level.x, lifted.x);
    }

    #[test]
    fn non_square_canvas_scales_axes_separately() {
        let region = BoundingRegion {
            min_x: 0.4,
            min_y: 0.4,
            max_x: 0.6,
            max_y: 0.5,
        };
        // 0.2 * 640 = 128 wide, 0.1 * 480 = 48 tall.
        let placement = Placement::compute(&region, 640, 480, 2.6, 20.0);
        assert!((placement.size - 128.0 * 2.6).abs() < 1e-2);
        assert!((placement.center_y - 216.0).abs() < 1e-2);
    }

    #[test]
    fn stretch_keeps_overlay_centre() {
        let region = region_px(300.0, 200.0, 100.0, 200.0, 1000.0);
        let placement = Placement::compute(&region, 1000, 1000, 2.0, 20.0)
            .with_scale_y(stretch_factor(1.0, 0.17));
        let (x, y, w, h) = placement.draw_rect();
        assert_eq!(x, placement.x);
        assert_eq!(w, placement.size);
        assert!((h - placement.size * 1.17).abs() < 1e-2);
        let unscaled_center = placement.y + placement.size / 2.0;
        assert!((y + h / 2.0 - unscaled_center).abs() < 1e-2);
    }

    #[test]
    fn stretch_factor_clamps_intensity() {
        assert_eq!(stretch_factor(0.0, 0.17), 1.0);
        assert!((stretch_factor(2.0, 0.17) - 1.17).abs() < 1e-6);
    }
}
