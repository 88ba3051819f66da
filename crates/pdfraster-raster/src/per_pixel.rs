//! The per-pixel-alpha raster builder.
//!
//! [`PerPixelRaster`] resolves the mask while each pixel is written: the
//! mask's alpha for the current coordinate is fetched during
//! `write_pixel` and stored alongside the color, so finalize needs no mask
//! compositing pass. The builder accepts JPEG containers only, and only
//! for color spaces with at most 3 components.

use pdfraster_core::color::{ColorSpace, DeviceSpace};
use pdfraster_core::decode::DecodeTable;
use pdfraster_core::error::DecodeError;
use pdfraster_core::record::DecodedImage;

use crate::builder::{ColorMapper, NativeImage, RasterBuilder};
use crate::jpeg;
use crate::mask::MaskModel;

/// Raster builder that bakes mask alpha into each written pixel.
pub struct PerPixelRaster {
    width: u32,
    height: u32,
    space: DeviceSpace,
    mapper: ColorMapper,
    mask: Option<MaskModel>,
    negated: bool,
    pixels: Vec<u8>,
    alpha: Vec<u8>,
    cursor: usize,
    last_raw: Option<Vec<u8>>,
    icc_profile: Option<Vec<u8>>,
}

impl PerPixelRaster {
    /// Create a builder for a `width` × `height` image.
    pub fn new(
        width: u32,
        height: u32,
        space: &ColorSpace,
        bpc: u8,
        decode: Option<DecodeTable>,
        mask: Option<MaskModel>,
    ) -> Result<Self, DecodeError> {
        let mapper = ColorMapper::new(space, bpc, decode)?;
        let base = mapper.base_space();
        let capacity = width as usize * height as usize * base.components();
        Ok(Self {
            width,
            height,
            space: base,
            mapper,
            mask,
            negated: false,
            pixels: Vec::with_capacity(capacity),
            alpha: Vec::new(),
            cursor: 0,
            last_raw: None,
            icc_profile: space.icc_profile().map(<[u8]>::to_vec),
        })
    }

    fn coordinates(&self) -> (u32, u32) {
        let w = self.width.max(1) as usize;
        ((self.cursor % w) as u32, (self.cursor / w) as u32)
    }
}

impl RasterBuilder for PerPixelRaster {
    fn can_read(&self, container: NativeImage) -> bool {
        container == NativeImage::Dct && self.space.components() <= 3
    }

    fn write_pixel(&mut self, raw: &[u8]) -> Result<(), DecodeError> {
        if self.cursor >= self.width as usize * self.height as usize {
            return Ok(()); // surplus samples past the declared size
        }
        let mapped = self.mapper.map(raw)?;
        if let Some(mask) = &self.mask {
            let (x, y) = self.coordinates();
            self.alpha.push(mask.alpha_at(x, y, Some(raw)));
        }
        self.pixels.extend_from_slice(&mapped);
        self.last_raw = Some(raw.to_vec());
        self.cursor += 1;
        Ok(())
    }

    fn add_indexed_color(&mut self, index: u8, color: &[u8]) {
        self.mapper.add_palette_entry(index, color);
    }

    fn read_blob(&mut self, container: NativeImage, bytes: &[u8]) -> Result<(), DecodeError> {
        if !self.can_read(container) {
            return Err(DecodeError::UnsupportedByRenderer(format!(
                "per-pixel renderer cannot read {container:?} for {}",
                self.space.name()
            )));
        }
        let blob = jpeg::read_jpeg(bytes)?;
        if blob.space.components() > 3 {
            return Err(DecodeError::UnsupportedByRenderer(
                "per-pixel renderer is limited to 3 components".to_string(),
            ));
        }
        if (blob.width, blob.height) != (self.width, self.height) {
            log::warn!(
                "JPEG dimensions {}x{} differ from dictionary {}x{}",
                blob.width,
                blob.height,
                self.width,
                self.height
            );
            self.width = blob.width;
            self.height = blob.height;
        }
        self.space = blob.space;
        self.pixels = blob.pixels;
        Ok(())
    }

    fn set_negated(&mut self, negated: bool) {
        self.negated = negated;
    }

    fn finalize(&mut self) -> Result<(), DecodeError> {
        if self.negated {
            // Color channels only; alpha is never negated
            for byte in &mut self.pixels {
                *byte = 255 - *byte;
            }
        }
        // The blob path skips write_pixel, so a mask present without any
        // collected alpha is resolved here instead.
        if let Some(mask) = &self.mask {
            if self.alpha.is_empty() && !self.pixels.is_empty() {
                let mut alpha =
                    Vec::with_capacity(self.width as usize * self.height as usize);
                for y in 0..self.height {
                    for x in 0..self.width {
                        alpha.push(mask.alpha_at(x, y, None));
                    }
                }
                self.alpha = alpha;
            }
        }
        if let Some(mask) = &mut self.mask {
            mask.clean_up();
        }
        self.mask = None;
        self.mapper.clear();
        self.last_raw = None;
        Ok(())
    }

    fn take_result(&mut self) -> DecodedImage {
        DecodedImage {
            width: self.width,
            height: self.height,
            space: self.space,
            pixels: std::mem::take(&mut self.pixels),
            alpha: if self.alpha.is_empty() {
                None
            } else {
                Some(std::mem::take(&mut self.alpha))
            },
            placement: None,
            icc_profile: self.icc_profile.take(),
        }
    }

    fn color_at(&self, x: u32, y: u32) -> Option<Vec<u8>> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let n = self.space.components();
        let offset = (y as usize * self.width as usize + x as usize) * n;
        self.pixels.get(offset..offset + n).map(<[u8]>::to_vec)
    }

    fn current_raw(&self) -> Option<&[u8]> {
        self.last_raw.as_deref()
    }

    fn reads_pixel_by_pixel(&self) -> bool {
        true
    }

    fn clean_up(&mut self) {
        self.pixels = Vec::new();
        self.alpha = Vec::new();
        self.mapper.clear();
        if let Some(mask) = &mut self.mask {
            mask.clean_up();
        }
        self.mask = None;
    }
}
