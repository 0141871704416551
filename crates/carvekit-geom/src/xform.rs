//! Material-to-image coordinate mapping.
//!
//! Builds the transform that takes a material-coordinate point to normalized
//! image coordinates according to the image placement mode.

use serde::{Deserialize, Serialize};

use crate::matrix::Matrix33;
use crate::point::Pt2;
use crate::vector::Vec2;

/// How the height-map image is placed within the carving area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageMode {
    /// Stretch the image to fill the carving area, ignoring aspect ratio.
    Fill,
    /// Whole image fits in the carving area, keeping aspect ratio.
    Fit,
    /// Image overflows the carving area, keeping aspect ratio.
    Crop,
}

impl Default for ImageMode {
    fn default() -> Self {
        Self::Fill
    }
}

/// Computes and caches the material-coordinate to normalized-image-coordinate
/// transform for one material / carving-area / image configuration.
#[derive(Debug, Clone)]
pub struct XformCache {
    carving_width: f64,
    carving_height: f64,
    offset_x: f64,
    offset_y: f64,
    img_pix_width: usize,
    img_pix_height: usize,
    img_mode: ImageMode,

    mc_to_nic: Option<Matrix33>,
}

impl XformCache {
    pub fn new(
        carv_width: f64,
        carv_height: f64,
        offset_x: f64,
        offset_y: f64,
        img_pix_width: usize,
        img_pix_height: usize,
        img_mode: ImageMode,
    ) -> Self {
        Self {
            carving_width: carv_width,
            carving_height: carv_height,
            offset_x,
            offset_y,
            img_pix_width,
            img_pix_height,
            img_mode,
            mc_to_nic: None,
        }
    }

    /// Drops all cached transforms.
    pub fn clear(&mut self) {
        self.mc_to_nic = None;
    }

    /// Returns the MC-to-NIC transform, computing it on first use.
    pub fn mc_to_nic(&mut self) -> &Matrix33 {
        if self.mc_to_nic.is_none() {
            self.mc_to_nic = Some(self.make_mc_to_nic());
        }
        self.mc_to_nic.as_ref().unwrap()
    }

    fn make_mc_to_nic(&self) -> Matrix33 {
        let img_dim = Vec2::new(self.img_pix_width as f64, self.img_pix_height as f64);
        let carv_bottom_left = Pt2::new(self.offset_x, self.offset_y);
        let carv_top_right = Pt2::new(
            self.carving_width + self.offset_x,
            self.carving_height + self.offset_y,
        );

        match self.img_mode {
            ImageMode::Fill => Self::fill_mode_xform(carv_bottom_left, carv_top_right),
            ImageMode::Fit | ImageMode::Crop => {
                self.fit_or_crop_mode_xform(carv_bottom_left, carv_top_right, img_dim)
            }
        }
    }

    fn fill_mode_xform(carv_bottom_left: Pt2, carv_top_right: Pt2) -> Matrix33 {
        let mut m = Matrix33::translate(-carv_bottom_left.x, -carv_bottom_left.y);
        m.mul(&Matrix33::scale(
            1.0 / (carv_top_right.x - carv_bottom_left.x),
            1.0 / (carv_top_right.y - carv_bottom_left.y),
        ));
        m
    }

    fn fit_or_crop_mode_xform(
        &self,
        carv_bottom_left: Pt2,
        carv_top_right: Pt2,
        img_dim: Vec2,
    ) -> Matrix33 {
        let carv_dim = carv_top_right - carv_bottom_left;

        let scale_x = carv_dim.x / img_dim.x;
        let scale_y = carv_dim.y / img_dim.y;
        let scale = match self.img_mode {
            // Smallest scale keeps the whole image within the carving area.
            ImageMode::Fit => scale_x.min(scale_y),
            // Largest scale expands the image past the carving area.
            ImageMode::Crop => scale_x.max(scale_y),
            ImageMode::Fill => unreachable!("fill mode handled separately"),
        };

        // The scaled image is centred within the carving area; points q_bl and
        // q_tr are the image corners in material coordinates.
        let offset = Vec2::new(
            0.5 * (carv_dim.x - scale * img_dim.x),
            0.5 * (carv_dim.y - scale * img_dim.y),
        );
        let q_bl = carv_bottom_left + offset;
        let q_tr = carv_top_right - offset;

        let mut m = Matrix33::translate(-q_bl.x, -q_bl.y);
        m.mul(&Matrix33::scale(
            1.0 / (q_tr.x - q_bl.x),
            1.0 / (q_tr.y - q_bl.y),
        ));
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mc_to_nic_fill_mode() {
        let mut xfc = XformCache::new(64.0, 128.0, 32.0, 64.0, 256, 512, ImageMode::Fill);
        let m = *xfc.mc_to_nic();

        assert_eq!(Pt2::new(32.0, 64.0).xform(&m), Pt2::new(0.0, 0.0));
        assert_eq!(Pt2::new(96.0, 192.0).xform(&m), Pt2::new(1.0, 1.0));
        assert_eq!(Pt2::new(64.0, 128.0).xform(&m), Pt2::new(0.5, 0.5));
    }

    #[test]
    fn mc_to_nic_fit_mode() {
        // Square image in a 64x128 carving area: fit scales to the width and
        // letterboxes along Y.
        let mut xfc = XformCache::new(64.0, 128.0, 32.0, 64.0, 256, 256, ImageMode::Fit);
        let m = *xfc.mc_to_nic();

        assert_eq!(Pt2::new(32.0, 96.0).xform(&m), Pt2::new(0.0, 0.0));
        assert_eq!(Pt2::new(96.0, 160.0).xform(&m), Pt2::new(1.0, 1.0));
        assert_eq!(Pt2::new(64.0, 128.0).xform(&m), Pt2::new(0.5, 0.5));
    }

    #[test]
    fn mc_to_nic_crop_mode() {
        // Square image in a 64x128 carving area: crop scales to the height and
        // overflows along X.
        let mut xfc = XformCache::new(64.0, 128.0, 32.0, 64.0, 256, 256, ImageMode::Crop);
        let m = *xfc.mc_to_nic();

        assert_eq!(Pt2::new(0.0, 64.0).xform(&m), Pt2::new(0.0, 0.0));
        assert_eq!(Pt2::new(128.0, 192.0).xform(&m), Pt2::new(1.0, 1.0));
        assert_eq!(Pt2::new(64.0, 128.0).xform(&m), Pt2::new(0.5, 0.5));
    }

    #[test]
    fn clear_recomputes() {
        let mut xfc = XformCache::new(10.0, 10.0, 0.0, 0.0, 100, 100, ImageMode::Fill);
        let before = *xfc.mc_to_nic();
        xfc.clear();
        assert_eq!(*xfc.mc_to_nic(), before);
    }
}
