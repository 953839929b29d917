//! Software RGBA canvas the overlay is painted on.
//!
//! The canvas holds only the overlay layer; video is composited under it by
//! the capture path. Pixels are straight (non-premultiplied) RGBA.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

pub struct Canvas {
    pixels: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Match the video's native size. Returns `true` if the size changed;
    /// an unchanged size keeps the existing buffer.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.pixels.dimensions() == (width, height) {
            return false;
        }
        self.pixels = RgbaImage::new(width, height);
        true
    }

    /// Make every pixel fully transparent.
    pub fn clear(&mut self) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    /// Draw `image` stretched into the rectangle `(x, y, w, h)` with an extra
    /// opacity factor, blending source-over. The rectangle is snapped to whole
    /// pixels; parts outside the canvas are clipped.
    pub fn draw_image(&mut self, image: &RgbaImage, x: f32, y: f32, w: f32, h: f32, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha <= 0.0 || !(w > 0.0 && h > 0.0) || image.width() == 0 || image.height() == 0 {
            return;
        }
        let (left, top) = (x.round() as i64, y.round() as i64);
        let width = (x + w).round() as i64 - left;
        let height = (y + h).round() as i64 - top;
        let (canvas_w, canvas_h) = (self.width() as i64, self.height() as i64);
        if width < 1
            || height < 1
            || left >= canvas_w
            || top >= canvas_h
            || left + width <= 0
            || top + height <= 0
        {
            return;
        }

        let scaled = imageops::resize(image, width as u32, height as u32, FilterType::Nearest);
        for dy in top.max(0)..(top + height).min(canvas_h) {
            for dx in left.max(0)..(left + width).min(canvas_w) {
                let src = scaled.get_pixel((dx - left) as u32, (dy - top) as u32);
                let dst = self.pixels.get_pixel_mut(dx as u32, dy as u32);
                *dst = blend_over(*src, *dst, alpha);
            }
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Copy of the current pixels.
    pub fn snapshot(&self) -> RgbaImage {
        self.pixels.clone()
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

fn blend_over(src: Rgba<u8>, dst: Rgba<u8>, alpha: f32) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0 * alpha;
    if sa <= 0.0 {
        return dst;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let mut out = [0u8; 4];
    for c in 0..3 {
        let value = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        out[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}
