//! Grayscale-image depth sampler.

use carvekit_geom::{Matrix33, Pt2, Vec2};

use crate::sampler::DepthSampler;
use crate::Gray16Image;

const U16_WEIGHT: f64 = 1.0 / u16::MAX as f64;

/// Samples carving depth from a 16-bit grayscale image.
///
/// The sampler owns the material-coordinate to pixel-coordinate transform and
/// borrows the image read-only. Pixel coordinates have their origin at the
/// top-left with Y growing downward, so the transform flips Y and insets by
/// half a pixel: NIC (0, 0) lands on pixel centre `(0.5, H - 0.5)` and
/// NIC (1, 1) on `(W - 0.5, 0.5)`. Out-of-range points clamp to the image
/// edge.
pub struct PixelSampler<'a> {
    img: &'a Gray16Image,
    img_width: usize,
    img_height: usize,
    mat_to_pixel: Matrix33,
    invert: bool,
}

impl<'a> PixelSampler<'a> {
    /// Builds a sampler from the MC-to-NIC transform and the height map.
    pub fn new(mc_to_nic: &Matrix33, img: &'a Gray16Image) -> Self {
        let w = img.width() as f64;
        let h = img.height() as f64;

        let mut mat_to_pixel = *mc_to_nic;
        mat_to_pixel.mul(&Matrix33::scale(w - 1.0, -(h - 1.0)));
        mat_to_pixel.mul(&Matrix33::translate(0.5, h - 0.5));

        Self {
            img,
            img_width: img.width() as usize,
            img_height: img.height() as usize,
            mat_to_pixel,
            invert: false,
        }
    }

    fn pixel_span(&self, v: Vec2) -> usize {
        v.xform(&self.mat_to_pixel).length() as usize
    }
}

impl DepthSampler for PixelSampler<'_> {
    fn at(&self, p: Pt2) -> f64 {
        let q = p.xform(&self.mat_to_pixel);

        let x = (q.x.max(0.0) as usize).min(self.img_width - 1);
        let y = (q.y.max(0.0) as usize).min(self.img_height - 1);

        let v = f64::from(self.img.get_pixel(x as u32, y as u32).0[0]) * U16_WEIGHT;
        if self.invert {
            1.0 - v
        } else {
            v
        }
    }

    fn num_samples_x(&self, x0: f64, x1: f64) -> usize {
        self.pixel_span(Vec2::new(x1 - x0, 0.0))
    }

    fn num_samples_y(&self, y0: f64, y1: f64) -> usize {
        self.pixel_span(Vec2::new(0.0, y1 - y0))
    }

    fn enable_invert(&mut self, invert: bool) {
        self.invert = invert;
    }
}
