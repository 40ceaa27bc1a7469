//! Decoded pages and the error placeholder.

use image::{DynamicImage, Rgba, RgbaImage};

const PLACEHOLDER_FILL: Rgba<u8> = Rgba([48, 48, 52, 255]);
const PLACEHOLDER_INK: Rgba<u8> = Rgba([220, 64, 64, 255]);
const PLACEHOLDER_BORDER_PX: u32 = 6;

/// A page ready for display: decoded pixels plus the name it was loaded from.
///
/// Pages built by [`render_placeholder`] carry the failure reason; the front
/// end shows `label` and `failure()` next to the stand-in image.
pub struct Page {
    label: String,
    image: DynamicImage,
    failure: Option<String>,
}

impl Page {
    pub fn decoded(label: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            label: label.into(),
            image,
            failure: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// Width over height. Zero when the image has no height.
    pub fn aspect_ratio(&self) -> f64 {
        aspect_ratio(self.dimensions())
    }

    pub fn is_placeholder(&self) -> bool {
        self.failure.is_some()
    }

    /// Why decoding failed, for placeholder pages.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Bytes held by the decoded pixel buffer.
    pub fn size_hint(&self) -> usize {
        self.image.as_bytes().len()
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("label", &self.label)
            .field("width", &self.width())
            .field("height", &self.height())
            .field("failure", &self.failure)
            .finish()
    }
}

pub(crate) fn aspect_ratio((w, h): (u32, u32)) -> f64 {
    if h == 0 {
        return 0.0;
    }
    w as f64 / h as f64
}

/// Size of placeholder pages substituted for failed decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderSpec {
    pub width: u32,
    pub height: u32,
}

impl Default for PlaceholderSpec {
    fn default() -> Self {
        Self {
            width: 800,
            height: 1200,
        }
    }
}

/// Build a visibly marked stand-in page: dark fill, thick red border and a
/// diagonal cross, carrying `label` and `reason`.
pub fn render_placeholder(width: u32, height: u32, label: &str, reason: &str) -> Page {
    let (w, h) = (width.max(1), height.max(1));
    let mut img = RgbaImage::from_pixel(w, h, PLACEHOLDER_FILL);

    let border = PLACEHOLDER_BORDER_PX.min(w / 2).min(h / 2).max(1);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let on_border = x < border || y < border || x >= w - border || y >= h - border;
        if on_border {
            *px = PLACEHOLDER_INK;
        }
    }

    // Cross from corner to corner, two pixels thick.
    let steps = w.max(h);
    for i in 0..steps {
        let x = (i as u64 * w as u64 / steps as u64) as u32;
        let y = (i as u64 * h as u64 / steps as u64) as u32;
        for (cx, cy) in [(x, y), (w - 1 - x, y)] {
            img.put_pixel(cx, cy, PLACEHOLDER_INK);
            if cx + 1 < w {
                img.put_pixel(cx + 1, cy, PLACEHOLDER_INK);
            }
        }
    }

    Page {
        label: label.to_string(),
        image: DynamicImage::ImageRgba8(img),
        failure: Some(reason.to_string()),
    }
}
