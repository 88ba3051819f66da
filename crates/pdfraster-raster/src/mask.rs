//! Mask models: soft masks, stencil masks and color-key masks.
//!
//! Soft and stencil masks are images in their own right, decoded through
//! the same pipeline as their owner and held here as finished builders. A
//! color-key mask is just a set of per-component sample ranges. The owning
//! image's builder queries [`MaskModel::alpha_at`] either per written pixel
//! or in one pass at finalize, depending on its policy.

use crate::builder::RasterBuilder;

/// A resolved mask attached to an image.
pub enum MaskModel {
    /// Grayscale image whose samples are the alpha channel.
    Soft(Box<dyn RasterBuilder>),
    /// 1-bit image; a zero sample paints (opaque), a one sample masks.
    /// An inverting decode array on the mask flows through its own
    /// decode, so no polarity flag is needed here.
    Stencil(Box<dyn RasterBuilder>),
    /// Per-component sample ranges; a source pixel inside every range is
    /// fully transparent.
    ColorKey {
        /// `(lo, hi)` per source component, in raw sample units.
        ranges: Vec<(u8, u8)>,
    },
}

impl std::fmt::Debug for MaskModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaskModel::Soft(_) => f.write_str("MaskModel::Soft"),
            MaskModel::Stencil(_) => f.write_str("MaskModel::Stencil"),
            MaskModel::ColorKey { ranges } => {
                f.debug_struct("MaskModel::ColorKey").field("ranges", ranges).finish()
            }
        }
    }
}

impl MaskModel {
    /// The alpha byte for the owner's pixel at `(x, y)`.
    ///
    /// `current` is the owner's raw bytes for that pixel when the caller is
    /// mid-write; color-key masks prefer it over a random-access read.
    pub fn alpha_at(&self, x: u32, y: u32, current: Option<&[u8]>) -> u8 {
        match self {
            MaskModel::Soft(image) => image
                .color_at(x, y)
                .and_then(|c| c.first().copied())
                .unwrap_or(255),
            MaskModel::Stencil(image) => {
                let sample = image
                    .color_at(x, y)
                    .and_then(|c| c.first().copied())
                    .unwrap_or(255);
                if sample == 0 { 255 } else { 0 }
            }
            MaskModel::ColorKey { ranges } => {
                let raw = match current {
                    Some(raw) => raw,
                    None => {
                        log::debug!("color-key mask sampled without a current pixel");
                        return 255;
                    }
                };
                let keyed = ranges.len() <= raw.len()
                    && ranges
                        .iter()
                        .zip(raw)
                        .all(|(&(lo, hi), &c)| lo <= c && c <= hi);
                if keyed { 0 } else { 255 }
            }
        }
    }

    /// Whether the mask's own source was built pixel by pixel.
    pub fn reads_pixel_by_pixel(&self) -> bool {
        match self {
            MaskModel::Soft(image) | MaskModel::Stencil(image) => image.reads_pixel_by_pixel(),
            MaskModel::ColorKey { .. } => true,
        }
    }

    /// Whether [`emit_blob`](MaskModel::emit_blob) can produce the whole
    /// alpha plane in one buffer.
    pub fn can_emit_blob(&self) -> bool {
        match self {
            MaskModel::Soft(image) | MaskModel::Stencil(image) => image.emit_blob().is_some(),
            MaskModel::ColorKey { .. } => false,
        }
    }

    /// The whole alpha plane as one gray buffer, when available.
    ///
    /// Stencil rasters are inverted on the way out so a returned byte is
    /// always directly usable as alpha.
    pub fn emit_blob(&self) -> Option<Vec<u8>> {
        match self {
            MaskModel::Soft(image) => image.emit_blob(),
            MaskModel::Stencil(image) => image
                .emit_blob()
                .map(|blob| blob.iter().map(|&b| 255 - b).collect()),
            MaskModel::ColorKey { .. } => None,
        }
    }

    /// Release the underlying mask raster.
    pub fn clean_up(&mut self) {
        match self {
            MaskModel::Soft(image) | MaskModel::Stencil(image) => image.clean_up(),
            MaskModel::ColorKey { ranges } => ranges.clear(),
        }
    }
}
