//! The batch-alpha raster builder.
//!
//! [`BatchRaster`] ignores masks while pixels are written and settles the
//! alpha plane in a single pass at finalize: when the mask can hand over
//! its raster as one blob it is copied wholesale, otherwise the mask is
//! sampled per coordinate. This builder accepts all three native
//! containers (JPEG, JPEG 2000, CCITT) for every device space.

use pdfraster_core::color::{ColorSpace, DeviceSpace};
use pdfraster_core::decode::DecodeTable;
use pdfraster_core::error::DecodeError;
use pdfraster_core::record::DecodedImage;

use crate::builder::{ColorMapper, NativeImage, RasterBuilder};
use crate::ccitt_blob;
use crate::jpeg;
use crate::jpx;
use crate::mask::MaskModel;

/// Raster builder that composes mask alpha in one pass at finalize.
pub struct BatchRaster {
    width: u32,
    height: u32,
    space: DeviceSpace,
    mapper: ColorMapper,
    mask: Option<MaskModel>,
    negated: bool,
    pixels: Vec<u8>,
    alpha: Vec<u8>,
    /// Raw source samples, kept only while a color-key mask needs them.
    raw_samples: Vec<u8>,
    cursor: usize,
    last_raw: Option<Vec<u8>>,
    icc_profile: Option<Vec<u8>>,
}

impl BatchRaster {
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
            raw_samples: Vec::new(),
            cursor: 0,
            last_raw: None,
            icc_profile: space.icc_profile().map(<[u8]>::to_vec),
        })
    }

    fn keeps_raw_samples(&self) -> bool {
        matches!(self.mask, Some(MaskModel::ColorKey { .. }))
    }

    fn compose_mask_alpha(&mut self) {
        let mask = match &self.mask {
            Some(mask) => mask,
            None => return,
        };
        let total = self.width as usize * self.height as usize;

        if let Some(blob) = mask.emit_blob() {
            log::debug!("mask composed from blob ({} bytes)", blob.len());
            let mut alpha = blob;
            alpha.resize(total, 255);
            self.alpha = alpha;
            return;
        }

        let samples_per_pixel = self.mapper.samples_per_pixel();
        let mut alpha = Vec::with_capacity(total);
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = (y as usize * self.width as usize + x as usize) * samples_per_pixel;
                let current = self.raw_samples.get(idx..idx + samples_per_pixel);
                alpha.push(mask.alpha_at(x, y, current));
            }
        }
        self.alpha = alpha;
    }
}

impl RasterBuilder for BatchRaster {
    fn can_read(&self, _container: NativeImage) -> bool {
        true
    }

    fn write_pixel(&mut self, raw: &[u8]) -> Result<(), DecodeError> {
        if self.cursor >= self.width as usize * self.height as usize {
            return Ok(());
        }
        let mapped = self.mapper.map(raw)?;
        self.pixels.extend_from_slice(&mapped);
        if self.keeps_raw_samples() {
            self.raw_samples.extend_from_slice(raw);
        }
        self.last_raw = Some(raw.to_vec());
        self.cursor += 1;
        Ok(())
    }

    fn add_indexed_color(&mut self, index: u8, color: &[u8]) {
        self.mapper.add_palette_entry(index, color);
    }

    fn read_blob(&mut self, container: NativeImage, bytes: &[u8]) -> Result<(), DecodeError> {
        let (width, height, space, pixels, alpha) = match container {
            NativeImage::Dct => {
                let blob = jpeg::read_jpeg(bytes)?;
                if blob.inverted_cmyk {
                    log::debug!("CMYK JPEG read; flipping negation");
                    self.negated = !self.negated;
                }
                (blob.width, blob.height, blob.space, blob.pixels, None)
            }
            NativeImage::Jpx => {
                let blob = jpx::read_jpx(bytes)?;
                (blob.width, blob.height, blob.space, blob.pixels, blob.alpha)
            }
            NativeImage::CcittTiff => {
                let blob = ccitt_blob::read_ccitt_tiff(bytes)?;
                (blob.width, blob.height, blob.space, blob.pixels, None)
            }
        };
        if (width, height) != (self.width, self.height) {
            log::warn!(
                "{container:?} dimensions {}x{} differ from dictionary {}x{}",
                width,
                height,
                self.width,
                self.height
            );
            self.width = width;
            self.height = height;
        }
        self.space = space;
        self.pixels = pixels;
        if let Some(alpha) = alpha {
            self.alpha = alpha;
        }
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
        if self.alpha.is_empty() {
            self.compose_mask_alpha();
        }
        if let Some(mask) = &mut self.mask {
            mask.clean_up();
        }
        self.mask = None;
        self.mapper.clear();
        self.raw_samples = Vec::new();
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
        false
    }

    fn emit_blob(&self) -> Option<Vec<u8>> {
        (self.space == DeviceSpace::Gray).then(|| self.pixels.clone())
    }

    fn clean_up(&mut self) {
        self.pixels = Vec::new();
        self.alpha = Vec::new();
        self.raw_samples = Vec::new();
        self.mapper.clear();
        if let Some(mask) = &mut self.mask {
            mask.clean_up();
        }
        self.mask = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(width: u32, height: u32) -> BatchRaster {
        BatchRaster::new(width, height, &ColorSpace::DeviceGray, 8, None, None).unwrap()
    }

    fn finished_gray_mask(samples: &[u8]) -> Box<dyn RasterBuilder> {
        let mut mask = gray(samples.len() as u32, 1);
        for &s in samples {
            mask.write_pixel(&[s]).unwrap();
        }
        mask.finalize().unwrap();
        Box::new(mask)
    }

    // --- Capability matrix ---

    #[test]
    fn accepts_every_container() {
        let b = BatchRaster::new(1, 1, &ColorSpace::DeviceCmyk, 8, None, None).unwrap();
        assert!(b.can_read(NativeImage::Dct));
        assert!(b.can_read(NativeImage::Jpx));
        assert!(b.can_read(NativeImage::CcittTiff));
    }

    #[test]
    fn reads_pixel_by_pixel_is_false() {
        assert!(!gray(1, 1).reads_pixel_by_pixel());
    }

    // --- Blob emission ---

    #[test]
    fn emits_gray_rasters_as_blobs() {
        let mut b = gray(2, 1);
        b.write_pixel(&[10]).unwrap();
        b.write_pixel(&[20]).unwrap();
        assert_eq!(b.emit_blob().unwrap(), vec![10, 20]);
    }

    #[test]
    fn does_not_emit_color_rasters() {
        let b = BatchRaster::new(1, 1, &ColorSpace::DeviceRgb, 8, None, None).unwrap();
        assert!(b.emit_blob().is_none());
    }

    // --- Mask composition at finalize ---

    #[test]
    fn soft_mask_blob_becomes_alpha() {
        let mask = MaskModel::Soft(finished_gray_mask(&[0, 128]));
        let mut b =
            BatchRaster::new(2, 1, &ColorSpace::DeviceGray, 8, None, Some(mask)).unwrap();
        b.write_pixel(&[50]).unwrap();
        b.write_pixel(&[60]).unwrap();
        b.finalize().unwrap();
        let img = b.take_result();
        assert_eq!(img.pixels, vec![50, 60]);
        assert_eq!(img.alpha, Some(vec![0, 128]));
    }

    #[test]
    fn stencil_mask_blob_is_inverted_into_alpha() {
        let mask = MaskModel::Stencil(finished_gray_mask(&[0, 255]));
        let mut b =
            BatchRaster::new(2, 1, &ColorSpace::DeviceGray, 8, None, Some(mask)).unwrap();
        b.write_pixel(&[1]).unwrap();
        b.write_pixel(&[2]).unwrap();
        b.finalize().unwrap();
        let img = b.take_result();
        // Stencil sample 0 paints: alpha 255 where the mask byte was 0
        assert_eq!(img.alpha, Some(vec![255, 0]));
    }

    #[test]
    fn color_key_mask_samples_kept_raw_values() {
        let mask = MaskModel::ColorKey {
            ranges: vec![(3, 5)],
        };
        let space = ColorSpace::Indexed {
            base: Box::new(ColorSpace::DeviceGray),
            hival: 7,
            lookup: Vec::new(),
        };
        let mut b = BatchRaster::new(3, 1, &space, 8, None, Some(mask)).unwrap();
        for i in 0..8 {
            b.add_indexed_color(i, &[i * 30]);
        }
        b.write_pixel(&[4]).unwrap();
        b.write_pixel(&[6]).unwrap();
        b.write_pixel(&[5]).unwrap();
        b.finalize().unwrap();
        let img = b.take_result();
        assert_eq!(img.alpha, Some(vec![0, 255, 0]));
    }

    #[test]
    fn no_mask_means_no_alpha() {
        let mut b = gray(1, 1);
        b.write_pixel(&[7]).unwrap();
        b.finalize().unwrap();
        assert!(b.take_result().alpha.is_none());
    }

    // --- Negation ---

    #[test]
    fn negation_flips_color_channels_only() {
        let mask = MaskModel::Soft(finished_gray_mask(&[100]));
        let mut b =
            BatchRaster::new(1, 1, &ColorSpace::DeviceGray, 8, None, Some(mask)).unwrap();
        b.set_negated(true);
        b.write_pixel(&[0x40]).unwrap();
        b.finalize().unwrap();
        let img = b.take_result();
        assert_eq!(img.pixels, vec![0xBF]);
        assert_eq!(img.alpha, Some(vec![100]));
    }

    #[test]
    fn double_negation_cancels() {
        let mut b = gray(1, 1);
        b.set_negated(true);
        b.set_negated(false);
        b.write_pixel(&[0x40]).unwrap();
        b.finalize().unwrap();
        assert_eq!(b.take_result().pixels, vec![0x40]);
    }

    // --- Blob error paths ---

    #[test]
    fn garbage_dct_blob_fails() {
        let mut b = gray(1, 1);
        assert!(b.read_blob(NativeImage::Dct, b"garbage").is_err());
    }

    #[test]
    fn garbage_ccitt_blob_fails() {
        let mut b = gray(1, 1);
        assert!(b.read_blob(NativeImage::CcittTiff, b"garbage").is_err());
    }
}
