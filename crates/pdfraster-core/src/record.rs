//! Decoded-image output and placement metadata.
//!
//! Image XObjects are defined on a 1×1 unit square that the current
//! transformation matrix maps onto the page. [`Placement`] captures the
//! transformed corners plus the derived user-space size and resolution.
//! [`DecodedImage`] is the pipeline's final output: a pixel buffer in a
//! terminal device space plus optional alpha and metadata.

use crate::color::DeviceSpace;
use crate::geometry::{Matrix, UserPoint};

/// User-space placement of one image.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Placement {
    /// Lower-left corner: transform of (0, 0).
    pub ll: UserPoint,
    /// Upper-left corner: transform of (0, 1).
    pub ul: UserPoint,
    /// Upper-right corner: transform of (1, 1).
    pub ur: UserPoint,
    /// Lower-right corner: transform of (1, 0).
    pub lr: UserPoint,
    /// User-space width in points.
    pub user_width: f64,
    /// User-space height in points.
    pub user_height: f64,
    /// Pixel width from the image dictionary.
    pub px_width: u32,
    /// Pixel height from the image dictionary.
    pub px_height: u32,
    /// Horizontal resolution in DPI.
    pub dpi_x: f64,
    /// Vertical resolution in DPI.
    pub dpi_y: f64,
}

impl Placement {
    /// Compute the placement of a unit-square image through `matrix`.
    ///
    /// `switch_wh` swaps the derived user-space width and height; it is set
    /// when the page rotation is an odd multiple of 90°.
    pub fn from_matrix(matrix: &Matrix, px_width: u32, px_height: u32, switch_wh: bool) -> Self {
        let [ll, ul, ur, lr] = matrix.unit_square_corners();

        let mut user_width = (ur.x - ll.x).abs();
        let mut user_height = (ur.y - ll.y).abs();
        if switch_wh {
            std::mem::swap(&mut user_width, &mut user_height);
        }

        let dpi_x = if user_width > 0.0 {
            f64::from(px_width) / user_width * 72.0
        } else {
            0.0
        };
        let dpi_y = if user_height > 0.0 {
            f64::from(px_height) / user_height * 72.0
        } else {
            0.0
        };

        Self {
            ll,
            ul,
            ur,
            lr,
            user_width,
            user_height,
            px_width,
            px_height,
            dpi_x,
            dpi_y,
        }
    }
}

/// A fully decoded image: device-space pixels plus metadata.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecodedImage {
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
    /// Terminal device space of the pixel buffer.
    pub space: DeviceSpace,
    /// Row-major samples, `space.components()` bytes per pixel.
    pub pixels: Vec<u8>,
    /// Per-pixel alpha, when a mask applied. 255 = opaque.
    pub alpha: Option<Vec<u8>>,
    /// Placement on the page, when decoded from a page walk.
    pub placement: Option<Placement>,
    /// Raw ICC profile bytes when the original space was ICCBased.
    pub icc_profile: Option<Vec<u8>>,
}

impl DecodedImage {
    /// Bytes per pixel of the color buffer.
    pub fn components(&self) -> usize {
        self.space.components()
    }

    /// The color components of the pixel at `(x, y)`.
    ///
    /// Returns `None` outside the image bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let n = self.components();
        let offset = (y as usize * self.width as usize + x as usize) * n;
        self.pixels.get(offset..offset + n)
    }

    /// The alpha value at `(x, y)`; 255 when no alpha channel exists.
    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        match &self.alpha {
            Some(alpha) => {
                let offset = y as usize * self.width as usize + x as usize;
                alpha.get(offset).copied().unwrap_or(255)
            }
            None => 255,
        }
    }
}
