//! The image decode orchestrator.
//!
//! Given an image stream dictionary and its raw payload, this module runs
//! the whole pipeline: color-space resolution, mask wiring (soft masks and
//! stencil masks decode recursively through the same path), decode-array
//! handling, the filter chain, and finally feeding a raster builder either
//! a native container blob or unpacked samples.

use pdfraster_core::bits::{SampleReader, row_bytes};
use pdfraster_core::color::ColorSpace;
use pdfraster_core::decode::{DecodeTable, default_decode_array, is_pure_negation};
use pdfraster_core::error::DecodeError;
use pdfraster_core::record::DecodedImage;
use pdfraster_raster::{
    BatchRaster, MaskModel, PerPixelRaster, RasterBuilder, Renderer,
};

use crate::color_space::{resolve_color_space_name, resolve_color_space_object, resolve_ref};
use crate::filters::{apply_filter_chain, filters_from_dict};

/// Decode one image stream to a finished [`DecodedImage`].
///
/// `resources` is consulted for named color spaces (inline images resolve
/// their `/CS` names against the page resources).
///
/// # Errors
///
/// Any of the pipeline error kinds: unsupported filters, color spaces, bit
/// depths, containers the chosen renderer rejects, or truncated payloads.
pub fn decode_image(
    doc: &lopdf::Document,
    dict: &lopdf::Dictionary,
    payload: &[u8],
    resources: Option<&lopdf::Dictionary>,
    renderer: Renderer,
) -> Result<DecodedImage, DecodeError> {
    let mut builder = build_image(doc, dict, payload, resources, renderer)?;
    Ok(builder.take_result())
}

/// Run the pipeline up to and including `finalize`, returning the builder.
/// Mask images stop here so their rasters stay queryable by the owner.
fn build_image(
    doc: &lopdf::Document,
    dict: &lopdf::Dictionary,
    payload: &[u8],
    resources: Option<&lopdf::Dictionary>,
    renderer: Renderer,
) -> Result<Box<dyn RasterBuilder>, DecodeError> {
    let width = dict_u32(dict, doc, b"Width")
        .ok_or_else(|| DecodeError::Parse("image dictionary without /Width".to_string()))?;
    let height = dict_u32(dict, doc, b"Height")
        .ok_or_else(|| DecodeError::Parse("image dictionary without /Height".to_string()))?;
    let bpc = dict_u32(dict, doc, b"BitsPerComponent").unwrap_or(1);
    if !matches!(bpc, 1 | 2 | 4 | 8) {
        return Err(DecodeError::UnsupportedBitDepth(bpc as u16));
    }
    let bpc = bpc as u8;
    let is_stencil = dict_bool(dict, doc, b"ImageMask");

    let space = resolve_image_color_space(dict, doc, resources, is_stencil)?;

    // Masks, soft before stencil/color-key
    let mask = resolve_mask(doc, dict, &space, resources, renderer)?;

    // Decode array: fold pure negations into the builder's negation flag,
    // build a table for anything else that differs from the default
    let decode_values = dict_number_array(dict, doc, b"Decode");
    let mut negated = false;
    let mut decode_table = None;
    if let Some(values) = decode_values {
        let ncomp = space.num_components();
        if !space.is_indexed() && is_pure_negation(&values, ncomp) {
            negated = true;
        } else if values != default_decode_array(ncomp, space.is_indexed(), bpc) {
            decode_table = Some(DecodeTable::from_pairs(&values, bpc));
        }
    }

    let filters = filters_from_dict(dict, doc)?;
    let output = apply_filter_chain(&filters, payload, dict)?;

    let mut builder: Box<dyn RasterBuilder> = match renderer {
        Renderer::PerPixel => Box::new(PerPixelRaster::new(
            width,
            height,
            &space,
            bpc,
            decode_table.clone(),
            mask,
        )?),
        Renderer::Batch => Box::new(BatchRaster::new(
            width,
            height,
            &space,
            bpc,
            decode_table.clone(),
            mask,
        )?),
    };
    if negated {
        builder.set_negated(true);
    }

    if let Some(native) = output.native {
        if !builder.can_read(native) {
            return Err(DecodeError::UnsupportedByRenderer(format!(
                "{native:?} container for {} components",
                space.num_components()
            )));
        }
        // Per-sample remapping is impossible once the samples live inside
        // a native container; only the negation fold survives
        if decode_table.is_some() {
            return Err(DecodeError::UnsupportedDecodeArray(
                "decode array on a native-container image".to_string(),
            ));
        }
        builder.read_blob(native, &output.data)?;
    } else {
        write_samples(&mut *builder, &space, &output.data, width, height, bpc)?;
    }

    builder.finalize()?;
    Ok(builder)
}

/// Feed unpacked samples to the builder, pixel by pixel.
fn write_samples(
    builder: &mut dyn RasterBuilder,
    space: &ColorSpace,
    data: &[u8],
    width: u32,
    height: u32,
    bpc: u8,
) -> Result<(), DecodeError> {
    // Indexed sources register their palette before the first pixel
    if let Some((base, hival, lookup)) = space.palette() {
        let base_n = base.resolve_base()?.components();
        let last = hival.min(255);
        for index in 0..=last {
            let offset = index as usize * base_n;
            if let Some(color) = lookup.get(offset..offset + base_n) {
                builder.add_indexed_color(index as u8, color);
            }
        }
    }

    let spp = if space.is_indexed() {
        1
    } else {
        space.num_components()
    };
    let width = width as usize;
    let height = height as usize;

    if bpc == 8 {
        let required = width * height * spp;
        if data.len() < required {
            return Err(DecodeError::TruncatedImage {
                expected: required,
                actual: data.len(),
            });
        }
        for pixel in data.chunks_exact(spp).take(width * height) {
            builder.write_pixel(pixel)?;
        }
    } else {
        let row_samples = width * spp;
        let required = row_bytes(row_samples, bpc) * height;
        if data.len() < required {
            return Err(DecodeError::TruncatedImage {
                expected: required,
                actual: data.len(),
            });
        }
        let mut reader = SampleReader::new(data, bpc)?;
        let mut pixel = Vec::with_capacity(spp);
        for _ in 0..height {
            for _ in 0..width {
                pixel.clear();
                for _ in 0..spp {
                    let sample =
                        reader
                            .next_sample()
                            .ok_or_else(|| DecodeError::TruncatedImage {
                                expected: required,
                                actual: data.len(),
                            })?;
                    pixel.push(sample);
                }
                builder.write_pixel(&pixel)?;
            }
            // Row padding bits are discarded at each row boundary
            reader.align_to_byte();
        }
    }
    Ok(())
}

/// Resolve the image's color space. Stencil masks carry none and decode
/// as 1-bit gray; everything else defaults to DeviceGray.
fn resolve_image_color_space(
    dict: &lopdf::Dictionary,
    doc: &lopdf::Document,
    resources: Option<&lopdf::Dictionary>,
    is_stencil: bool,
) -> Result<ColorSpace, DecodeError> {
    if is_stencil {
        return Ok(ColorSpace::DeviceGray);
    }
    let obj = match dict.get(b"ColorSpace") {
        Ok(obj) => obj,
        Err(_) => return Ok(ColorSpace::DeviceGray),
    };
    let resolved = match resolve_ref(doc, obj) {
        lopdf::Object::Name(name) => {
            let name = String::from_utf8_lossy(name);
            let empty = lopdf::Dictionary::new();
            resolve_color_space_name(&name, doc, resources.unwrap_or(&empty))
        }
        other => resolve_color_space_object(other, doc),
    };
    resolved.ok_or_else(|| {
        DecodeError::UnsupportedColorSpace(format!("{:?}", dict.get(b"ColorSpace").ok()))
    })
}

/// Resolve the image's mask: `/SMask` (soft) wins over `/Mask` (stencil
/// stream or color-key array).
fn resolve_mask(
    doc: &lopdf::Document,
    dict: &lopdf::Dictionary,
    space: &ColorSpace,
    resources: Option<&lopdf::Dictionary>,
    renderer: Renderer,
) -> Result<Option<MaskModel>, DecodeError> {
    if let Ok(obj) = dict.get(b"SMask") {
        if let Ok(stream) = resolve_ref(doc, obj).as_stream() {
            log::debug!("decoding soft mask");
            let mask =
                build_image(doc, &stream.dict, &stream.content, resources, renderer)?;
            return Ok(Some(MaskModel::Soft(mask)));
        }
    }

    let obj = match dict.get(b"Mask") {
        Ok(obj) => obj,
        Err(_) => return Ok(None),
    };
    match resolve_ref(doc, obj) {
        lopdf::Object::Stream(stream) => {
            log::debug!("decoding stencil mask");
            let mask = build_image(doc, &stream.dict, &stream.content, resources, renderer)?;
            Ok(Some(MaskModel::Stencil(mask)))
        }
        lopdf::Object::Array(arr) => {
            if !space.is_indexed() {
                return Err(DecodeError::UnsupportedMaskColorSpace(
                    "color-key mask on a non-indexed image".to_string(),
                ));
            }
            let values: Vec<u8> = arr
                .iter()
                .filter_map(|o| resolve_ref(doc, o).as_i64().ok())
                .map(|v| v.clamp(0, 255) as u8)
                .collect();
            let ranges: Vec<(u8, u8)> = values
                .chunks_exact(2)
                .map(|pair| (pair[0], pair[1]))
                .collect();
            Ok(Some(MaskModel::ColorKey { ranges }))
        }
        _ => Ok(None),
    }
}

// --- Dictionary read helpers ---

fn dict_u32(dict: &lopdf::Dictionary, doc: &lopdf::Document, key: &[u8]) -> Option<u32> {
    dict.get(key)
        .ok()
        .map(|o| resolve_ref(doc, o))
        .and_then(|o| o.as_i64().ok())
        .and_then(|v| u32::try_from(v).ok())
}

fn dict_bool(dict: &lopdf::Dictionary, doc: &lopdf::Document, key: &[u8]) -> bool {
    dict.get(key)
        .ok()
        .map(|o| resolve_ref(doc, o))
        .and_then(|o| o.as_bool().ok())
        .unwrap_or(false)
}

fn dict_number_array(
    dict: &lopdf::Dictionary,
    doc: &lopdf::Document,
    key: &[u8],
) -> Option<Vec<f64>> {
    let obj = dict.get(key).ok()?;
    let arr = resolve_ref(doc, obj).as_array().ok()?;
    Some(
        arr.iter()
            .filter_map(|o| match resolve_ref(doc, o) {
                lopdf::Object::Integer(i) => Some(*i as f64),
                lopdf::Object::Real(f) => Some(f64::from(*f)),
                _ => None,
            })
            .collect(),
    )
}
