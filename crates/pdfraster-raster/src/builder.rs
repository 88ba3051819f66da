//! The raster builder facade and shared color construction.
//!
//! [`RasterBuilder`] is the interface the decode orchestrator drives:
//! pixels arrive one at a time through [`write_pixel`](RasterBuilder::write_pixel)
//! or wholesale through [`read_blob`](RasterBuilder::read_blob), and
//! [`finalize`](RasterBuilder::finalize) settles negation and masking.
//! [`ColorMapper`] implements the per-pixel color construction both
//! builders share: palette lookup, decode-array application, sub-byte
//! sample scaling, and a decoded-color cache.

use std::collections::HashMap;

use pdfraster_core::color::{ColorSpace, DeviceSpace};
use pdfraster_core::decode::DecodeTable;
use pdfraster_core::error::DecodeError;
use pdfraster_core::record::DecodedImage;

/// A native image container left at the end of a filter chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeImage {
    /// JPEG (DCTDecode).
    Dct,
    /// JPEG 2000 (JPXDecode).
    Jpx,
    /// CCITT G3/G4 payload rewrapped in a TIFF container.
    CcittTiff,
}

/// Renderer selection: which builder the decode uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Renderer {
    /// Per-pixel-alpha builder; JPEG only, at most 3 components.
    PerPixel,
    /// Batch-alpha builder; JPEG, JPEG 2000 and CCITT, all device spaces.
    #[default]
    Batch,
}

/// The raster-engine facade driven by the decode orchestrator.
pub trait RasterBuilder {
    /// Whether this builder can consume `container` for its color space.
    fn can_read(&self, container: NativeImage) -> bool;

    /// Append one pixel's raw (unscaled) samples in content order.
    fn write_pixel(&mut self, raw: &[u8]) -> Result<(), DecodeError>;

    /// Register a palette entry: `index` maps to raw base-space bytes.
    fn add_indexed_color(&mut self, index: u8, color: &[u8]);

    /// Consume a whole native container instead of per-pixel samples.
    fn read_blob(&mut self, container: NativeImage, bytes: &[u8]) -> Result<(), DecodeError>;

    /// Record that color channels must be negated at finalize.
    fn set_negated(&mut self, negated: bool);

    /// Settle the image: flush, negate color channels if flagged, apply the
    /// mask when this builder's policy defers masking, drop caches.
    fn finalize(&mut self) -> Result<(), DecodeError>;

    /// Move the finished image out of the builder.
    fn take_result(&mut self) -> DecodedImage;

    /// Device-space color components of the pixel at `(x, y)`.
    fn color_at(&self, x: u32, y: u32) -> Option<Vec<u8>>;

    /// Raw bytes of the most recently written pixel.
    fn current_raw(&self) -> Option<&[u8]>;

    /// Whether masks are applied pixel by pixel during writes (`true`) or
    /// in one pass at finalize (`false`).
    fn reads_pixel_by_pixel(&self) -> bool;

    /// The full gray pixel buffer, for builders that can hand their raster
    /// to a mask consumer wholesale.
    fn emit_blob(&self) -> Option<Vec<u8>> {
        None
    }

    /// Release pixel buffers and caches.
    fn clean_up(&mut self);
}

/// Shared per-pixel color construction.
///
/// Maps raw content-stream samples to device-space bytes: palette lookup
/// for Indexed sources (with the decode step applied to the index), decode
/// tables for the rest, and plain `255 / (2^bpc − 1)` scaling otherwise.
/// Mapped colors are cached by their raw bytes; the cache is dropped at
/// finalize.
#[derive(Debug)]
pub(crate) struct ColorMapper {
    space: DeviceSpace,
    indexed: bool,
    bpc: u8,
    decode: Option<DecodeTable>,
    palette: HashMap<u8, Vec<u8>>,
    cache: HashMap<Vec<u8>, Vec<u8>>,
}

impl ColorMapper {
    pub(crate) fn new(
        space: &ColorSpace,
        bpc: u8,
        decode: Option<DecodeTable>,
    ) -> Result<Self, DecodeError> {
        Ok(Self {
            space: space.resolve_base()?,
            indexed: space.is_indexed(),
            bpc,
            decode,
            palette: HashMap::new(),
            cache: HashMap::new(),
        })
    }

    pub(crate) fn base_space(&self) -> DeviceSpace {
        self.space
    }

    /// Raw samples a single `write_pixel` call carries.
    pub(crate) fn samples_per_pixel(&self) -> usize {
        if self.indexed {
            1
        } else {
            self.space.components()
        }
    }

    pub(crate) fn add_palette_entry(&mut self, index: u8, color: &[u8]) {
        self.palette.insert(index, color.to_vec());
    }

    /// Map one pixel's raw samples to device-space bytes.
    pub(crate) fn map(&mut self, raw: &[u8]) -> Result<Vec<u8>, DecodeError> {
        if let Some(cached) = self.cache.get(raw) {
            return Ok(cached.clone());
        }
        let mapped = if self.indexed {
            let index = match &self.decode {
                Some(table) => table.apply_index(raw[0]),
                None => raw[0],
            };
            match self.palette.get(&index) {
                Some(color) => color.clone(),
                None => {
                    // Out-of-palette index renders black
                    vec![0; self.space.components()]
                }
            }
        } else if let Some(table) = &self.decode {
            raw.iter()
                .enumerate()
                .map(|(i, &sample)| table.apply(i, sample))
                .collect()
        } else {
            raw.iter().map(|&sample| self.scale(sample)).collect()
        };
        self.cache.insert(raw.to_vec(), mapped.clone());
        Ok(mapped)
    }

    /// Scale a raw sample to the byte range: `sample · 255 / (2^bpc − 1)`.
    fn scale(&self, sample: u8) -> u8 {
        if self.bpc == 8 {
            return sample;
        }
        let max = (1u16 << self.bpc) - 1;
        (u16::from(sample) * 255 / max) as u8
    }

    /// Drop the decoded-color cache and the palette.
    pub(crate) fn clear(&mut self) {
        self.cache.clear();
        self.palette.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_mapper(bpc: u8) -> ColorMapper {
        ColorMapper::new(&ColorSpace::DeviceRgb, bpc, None).unwrap()
    }

    fn indexed_rgb() -> ColorSpace {
        ColorSpace::Indexed {
            base: Box::new(ColorSpace::DeviceRgb),
            hival: 1,
            lookup: vec![0, 0, 0, 255, 255, 255],
        }
    }

    // --- Plain sample scaling ---

    #[test]
    fn eight_bit_samples_map_unchanged() {
        let mut m = rgb_mapper(8);
        assert_eq!(m.map(&[10, 200, 255]).unwrap(), vec![10, 200, 255]);
    }

    #[test]
    fn sub_byte_samples_scale_to_full_range() {
        let mut m = ColorMapper::new(&ColorSpace::DeviceGray, 1, None).unwrap();
        assert_eq!(m.map(&[0]).unwrap(), vec![0]);
        assert_eq!(m.map(&[1]).unwrap(), vec![255]);

        let mut m = ColorMapper::new(&ColorSpace::DeviceGray, 2, None).unwrap();
        assert_eq!(m.map(&[0]).unwrap(), vec![0]);
        assert_eq!(m.map(&[1]).unwrap(), vec![85]);
        assert_eq!(m.map(&[2]).unwrap(), vec![170]);
        assert_eq!(m.map(&[3]).unwrap(), vec![255]);

        let mut m = ColorMapper::new(&ColorSpace::DeviceGray, 4, None).unwrap();
        assert_eq!(m.map(&[15]).unwrap(), vec![255]);
        assert_eq!(m.map(&[8]).unwrap(), vec![136]);
    }

    // --- Decode tables ---

    #[test]
    fn decode_table_applies_per_component() {
        let table = DecodeTable::from_pairs(&[0.0, 0.5, 0.0, 1.0, 0.5, 1.0], 8);
        let mut m = ColorMapper::new(&ColorSpace::DeviceRgb, 8, Some(table)).unwrap();
        assert_eq!(m.map(&[255, 200, 0]).unwrap(), vec![128, 200, 128]);
    }

    // --- Palette lookup ---

    #[test]
    fn indexed_lookup_resolves_palette_colors() {
        let mut m = ColorMapper::new(&indexed_rgb(), 1, None).unwrap();
        m.add_palette_entry(0, &[0, 0, 0]);
        m.add_palette_entry(1, &[255, 255, 255]);
        assert_eq!(m.map(&[0]).unwrap(), vec![0, 0, 0]);
        assert_eq!(m.map(&[1]).unwrap(), vec![255, 255, 255]);
    }

    #[test]
    fn indexed_out_of_palette_renders_black() {
        let mut m = ColorMapper::new(&indexed_rgb(), 8, None).unwrap();
        m.add_palette_entry(0, &[10, 20, 30]);
        assert_eq!(m.map(&[7]).unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn indexed_decode_remaps_index_first() {
        // Decode [1 0] at 1 bpc flips the index before lookup
        let table = DecodeTable::from_pairs(&[1.0, 0.0], 1);
        let mut m = ColorMapper::new(&indexed_rgb(), 1, Some(table)).unwrap();
        m.add_palette_entry(0, &[0, 0, 0]);
        m.add_palette_entry(1, &[255, 255, 255]);
        assert_eq!(m.map(&[0]).unwrap(), vec![255, 255, 255]);
        assert_eq!(m.map(&[1]).unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn samples_per_pixel_indexed_is_one() {
        let m = ColorMapper::new(&indexed_rgb(), 8, None).unwrap();
        assert_eq!(m.samples_per_pixel(), 1);
        let m = rgb_mapper(8);
        assert_eq!(m.samples_per_pixel(), 3);
    }

    // --- Cache behavior ---

    #[test]
    fn cache_returns_identical_mapping() {
        let mut m = rgb_mapper(8);
        let first = m.map(&[1, 2, 3]).unwrap();
        let second = m.map(&[1, 2, 3]).unwrap();
        assert_eq!(first, second);
        assert_eq!(m.cache.len(), 1);
    }

    #[test]
    fn clear_drops_cache_and_palette() {
        let mut m = ColorMapper::new(&indexed_rgb(), 8, None).unwrap();
        m.add_palette_entry(0, &[1, 2, 3]);
        m.map(&[0]).unwrap();
        m.clear();
        assert!(m.cache.is_empty());
        assert!(m.palette.is_empty());
    }

    // --- Renderer selector ---

    #[test]
    fn renderer_default_is_batch() {
        assert_eq!(Renderer::default(), Renderer::Batch);
    }
}
