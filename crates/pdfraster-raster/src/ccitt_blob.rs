//! CCITT blob reading: parses the minimal TIFF container the filter chain
//! wraps around CCITT payloads and decodes the fax data to gray samples.

use fax::decoder;
use pdfraster_core::color::DeviceSpace;
use pdfraster_core::error::DecodeError;

/// A decoded CCITT raster, expanded to 8-bit gray.
pub(crate) struct GrayBlob {
    pub width: u32,
    pub height: u32,
    pub space: DeviceSpace,
    pub pixels: Vec<u8>,
}

const TAG_IMAGE_WIDTH: u16 = 256;
const TAG_IMAGE_LENGTH: u16 = 257;
const TAG_COMPRESSION: u16 = 259;
const TAG_STRIP_OFFSETS: u16 = 273;
const TAG_STRIP_BYTE_COUNTS: u16 = 279;
const TAG_T4_OPTIONS: u16 = 292;
const TAG_T6_OPTIONS: u16 = 293;

/// Decode a TIFF-wrapped CCITT payload to gray samples.
pub(crate) fn read_ccitt_tiff(bytes: &[u8]) -> Result<GrayBlob, DecodeError> {
    let tiff = parse_header(bytes)?;

    if tiff.byte_align {
        log::warn!("CCITT EncodedByteAlign set; decoder ignores row alignment");
    }

    let width = tiff.width;
    let height_hint = (tiff.rows > 0).then_some(tiff.rows as u16);
    let bytes_per_row = (width as usize).div_ceil(8);

    let mut rows: Vec<Vec<u8>> = Vec::new();
    let payload = tiff.payload.iter().copied();
    let outcome = if tiff.group4 {
        decoder::decode_g4(payload, width as u16, height_hint, |transitions: &[u16]| {
            rows.push(transitions_to_bytes(transitions, width as usize));
        })
    } else {
        decoder::decode_g3(payload, |transitions: &[u16]| {
            rows.push(transitions_to_bytes(transitions, width as usize));
        })
    };

    if outcome.is_none() || rows.is_empty() {
        // Lenient fallback: a damaged fax stream becomes white rows rather
        // than failing the whole image.
        log::warn!(
            "CCITT decode produced no rows ({} bytes, {}x{})",
            tiff.payload.len(),
            width,
            tiff.rows
        );
        let fallback_rows = tiff.rows.max(1) as usize;
        rows = vec![vec![0u8; bytes_per_row]; fallback_rows];
    } else if (tiff.rows as usize) > rows.len() {
        log::debug!(
            "CCITT decode returned {} of {} declared rows; padding white",
            rows.len(),
            tiff.rows
        );
        rows.resize(tiff.rows as usize, vec![0u8; bytes_per_row]);
    }

    let height = rows.len() as u32;
    let mut pixels = Vec::with_capacity(width as usize * rows.len());
    for row in &rows {
        for x in 0..width as usize {
            let bit = (row[x / 8] >> (7 - (x % 8))) & 1;
            pixels.push(if bit == 1 { 0x00 } else { 0xFF });
        }
    }

    Ok(GrayBlob {
        width,
        height,
        space: DeviceSpace::Gray,
        pixels,
    })
}

struct TiffFax<'a> {
    width: u32,
    rows: u32,
    group4: bool,
    byte_align: bool,
    payload: &'a [u8],
}

/// Parse the little-endian single-IFD TIFF header written by the filter
/// chain. Only the tag values are trusted; nothing about the byte layout
/// beyond the IFD itself is assumed.
fn parse_header(bytes: &[u8]) -> Result<TiffFax<'_>, DecodeError> {
    let header_err = || DecodeError::Parse("malformed CCITT TIFF container".to_string());

    if bytes.len() < 8 || &bytes[0..2] != b"II" || read_u16(bytes, 2) != 42 {
        return Err(header_err());
    }
    let ifd_offset = read_u32(bytes, 4) as usize;
    if ifd_offset + 2 > bytes.len() {
        return Err(header_err());
    }
    let count = read_u16(bytes, ifd_offset) as usize;
    let entries_end = ifd_offset + 2 + count * 12;
    if entries_end > bytes.len() {
        return Err(header_err());
    }

    let mut width = 0u32;
    let mut rows = 0u32;
    let mut compression = 4u32;
    let mut options = 0u32;
    let mut strip_offset = 0usize;
    let mut strip_len = 0usize;

    for i in 0..count {
        let at = ifd_offset + 2 + i * 12;
        let tag = read_u16(bytes, at);
        let kind = read_u16(bytes, at + 2);
        // SHORT values sit in the low bytes of the value field
        let value = if kind == 3 {
            u32::from(read_u16(bytes, at + 8))
        } else {
            read_u32(bytes, at + 8)
        };
        match tag {
            TAG_IMAGE_WIDTH => width = value,
            TAG_IMAGE_LENGTH => rows = value,
            TAG_COMPRESSION => compression = value,
            TAG_T4_OPTIONS | TAG_T6_OPTIONS => options = value,
            TAG_STRIP_OFFSETS => strip_offset = value as usize,
            TAG_STRIP_BYTE_COUNTS => strip_len = value as usize,
            _ => {}
        }
    }

    if width == 0 || strip_offset == 0 || strip_offset + strip_len > bytes.len() {
        return Err(header_err());
    }

    Ok(TiffFax {
        width,
        rows,
        group4: compression == 4,
        byte_align: options & 0x04 != 0,
        payload: &bytes[strip_offset..strip_offset + strip_len],
    })
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Convert a fax row of color-change positions to packed bits, 1 = black.
///
/// The transitions array holds positions where the run color flips,
/// starting from white: `[3, 5, 8]` means pixels 0–2 white, 3–4 black,
/// 5–7 white.
fn transitions_to_bytes(transitions: &[u16], width: usize) -> Vec<u8> {
    let mut row = vec![0u8; width.div_ceil(8)];
    let mut is_black = false;
    let mut start = 0usize;

    for &pos in transitions {
        let pos = pos as usize;
        if is_black {
            for x in start..pos.min(width) {
                row[x / 8] |= 1 << (7 - (x % 8));
            }
        }
        is_black = !is_black;
        start = pos;
    }
    if is_black {
        for x in start..width {
            row[x / 8] |= 1 << (7 - (x % 8));
        }
    }
    row
}
