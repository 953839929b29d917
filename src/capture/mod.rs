//! Photo and video capture of the composited result.
//!
//! Capture reads the live video source and the overlay surface; it never
//! talks to the renderer directly. A capture may pair a video frame with an
//! overlay painted one tick earlier.

use chrono::{DateTime, Utc};
use image::imageops::{self, FilterType};
use image::RgbaImage;

pub mod photo;
pub mod recorder;

pub use photo::{capture_photo, save_photo, PhotoOptions};
pub use recorder::{
    choose_mime_type, format_time, video_filename, FrameSink, PngSequenceSink, RecordOptions,
    Recorder, RecordingSummary,
};

/// Colour treatment of the camera "lens", applied to captures.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum LensFilter {
    #[default]
    None,
    /// Full grayscale.
    Monochrome,
    /// Saturation reduced to 10%, used by the gradient lenses.
    Desaturate,
}

impl LensFilter {
    /// `monochrome` and any `gradient*` lens get a filter; everything else is plain.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        if name == "monochrome" {
            LensFilter::Monochrome
        } else if name.starts_with("gradient") {
            LensFilter::Desaturate
        } else {
            LensFilter::None
        }
    }

    pub fn apply(&self, image: &mut RgbaImage) {
        match self {
            LensFilter::None => {}
            LensFilter::Monochrome => saturate(image, 0.0),
            LensFilter::Desaturate => saturate(image, 0.1),
        }
    }
}

/// Saturation matrix (as used by CSS `saturate()`); `amount` 0 is grayscale.
fn saturate(image: &mut RgbaImage, amount: f32) {
    let s = amount;
    let m = [
        [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
    ];
    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let (r, g, b) = (r as f32, g as f32, b as f32);
        let mut out = [0u8; 4];
        for (channel, row) in m.iter().enumerate() {
            out[channel] = (row[0] * r + row[1] * g + row[2] * b).round().clamp(0.0, 255.0) as u8;
        }
        out[3] = a;
        pixel.0 = out;
    }
}

/// Draw the video, then the overlay stretched to the same size, with the lens
/// applied to both and an optional horizontal flip of the result.
pub(crate) fn composite(
    video: &RgbaImage,
    overlay: &RgbaImage,
    scale: u32,
    mirrored: bool,
    lens: LensFilter,
) -> RgbaImage {
    let scale = scale.max(1);
    let (width, height) = (video.width() * scale, video.height() * scale);
    let mut out = if scale == 1 {
        video.clone()
    } else {
        imageops::resize(video, width, height, FilterType::Triangle)
    };
    lens.apply(&mut out);

    if overlay.width() > 0 && overlay.height() > 0 {
        let mut layer = if overlay.dimensions() == (width, height) {
            overlay.clone()
        } else {
            imageops::resize(overlay, width, height, FilterType::Triangle)
        };
        lens.apply(&mut layer);
        imageops::overlay(&mut out, &layer, 0, 0);
    }

    if mirrored {
        imageops::flip_horizontal_in_place(&mut out);
    }
    out
}

/// ISO-8601 UTC time with `:` and `.` removed, e.g. `2026-10-17T120304123Z`.
pub fn capture_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
        .replace([':', '.'], "")
}
