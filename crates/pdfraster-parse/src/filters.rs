//! The stream filter chain.
//!
//! A PDF image stream names zero or more filters. The fully-decoding
//! filters (Flate, LZW, ASCII85, ASCIIHex, RunLength) are applied in
//! order; the native-container filters (DCT, JPX, CCITTFax) never decode
//! here — they may only stand in the final position, where the payload is
//! classified (and, for CCITT, rewrapped as TIFF) and handed to the raster
//! builder's blob path.

use std::io::Read;

use pdfraster_core::error::DecodeError;
use pdfraster_raster::NativeImage;

use crate::ccitt::{CcittParams, wrap_ccitt_in_tiff};
use crate::color_space::resolve_ref;

/// A stream filter, split between fully-decoding filters and native image
/// containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// FlateDecode (zlib/deflate).
    Flate,
    /// LZWDecode.
    Lzw,
    /// ASCII85Decode.
    Ascii85,
    /// ASCIIHexDecode.
    AsciiHex,
    /// RunLengthDecode.
    RunLength,
    /// Identity crypt filter; passes bytes through unchanged.
    Identity,
    /// DCTDecode (JPEG) — native container.
    Dct,
    /// JPXDecode (JPEG 2000) — native container.
    Jpx,
    /// CCITTFaxDecode — native container, rewrapped as TIFF.
    CcittFax,
}

impl Filter {
    /// Parse a filter name, including the inline-image abbreviations.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "FlateDecode" | "Fl" => Some(Filter::Flate),
            "LZWDecode" | "LZW" => Some(Filter::Lzw),
            "ASCII85Decode" | "A85" => Some(Filter::Ascii85),
            "ASCIIHexDecode" | "AHx" => Some(Filter::AsciiHex),
            "RunLengthDecode" | "RL" => Some(Filter::RunLength),
            "Crypt" => Some(Filter::Identity),
            "DCTDecode" | "DCT" => Some(Filter::Dct),
            "JPXDecode" => Some(Filter::Jpx),
            "CCITTFaxDecode" | "CCF" => Some(Filter::CcittFax),
            _ => None,
        }
    }

    /// The native container this filter leaves behind, if any.
    pub fn native_image(&self) -> Option<NativeImage> {
        match self {
            Filter::Dct => Some(NativeImage::Dct),
            Filter::Jpx => Some(NativeImage::Jpx),
            Filter::CcittFax => Some(NativeImage::CcittTiff),
            _ => None,
        }
    }
}

/// Result of running a filter chain: the (possibly partially) decoded
/// bytes plus the native container the final filter left, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChainOutput {
    /// Decoded bytes, or the native container payload.
    pub data: Vec<u8>,
    /// Set when the final filter was a native container.
    pub native: Option<NativeImage>,
}

/// Extract the filter list and per-filter parameter dictionaries from an
/// image stream dictionary.
///
/// `/Filter` may be a single name or an array; `/DecodeParms` (alias
/// `/DP`) pairs up positionally and may be absent, a single dictionary, or
/// an array with nulls.
///
/// # Errors
///
/// [`DecodeError::UnsupportedFilter`] for a filter name outside the
/// implemented set.
pub fn filters_from_dict(
    dict: &lopdf::Dictionary,
    doc: &lopdf::Document,
) -> Result<Vec<(Filter, Option<lopdf::Dictionary>)>, DecodeError> {
    let names: Vec<String> = match dict.get(b"Filter").or_else(|_| dict.get(b"F")) {
        Err(_) => Vec::new(),
        Ok(obj) => match resolve_ref(doc, obj) {
            lopdf::Object::Name(n) => vec![String::from_utf8_lossy(n).into_owned()],
            lopdf::Object::Array(arr) => arr
                .iter()
                .filter_map(|o| match resolve_ref(doc, o) {
                    lopdf::Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        },
    };

    let parms: Vec<Option<lopdf::Dictionary>> =
        match dict.get(b"DecodeParms").or_else(|_| dict.get(b"DP")) {
            Err(_) => Vec::new(),
            Ok(obj) => match resolve_ref(doc, obj) {
                lopdf::Object::Dictionary(d) => vec![Some(d.clone())],
                lopdf::Object::Array(arr) => arr
                    .iter()
                    .map(|o| match resolve_ref(doc, o) {
                        lopdf::Object::Dictionary(d) => Some(d.clone()),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            },
        };

    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let filter = Filter::from_name(name)
                .ok_or_else(|| DecodeError::UnsupportedFilter(name.clone()))?;
            Ok((filter, parms.get(i).cloned().flatten()))
        })
        .collect()
}

/// Apply a filter chain to a payload.
///
/// `image_dict` supplies the `/Height` fallback for CCITT `/Rows`.
///
/// # Errors
///
/// [`DecodeError::UnsupportedFilter`] when a native-container filter
/// appears before the final position, and [`DecodeError::Parse`] when a
/// decoding filter fails on its input.
pub fn apply_filter_chain(
    filters: &[(Filter, Option<lopdf::Dictionary>)],
    payload: &[u8],
    image_dict: &lopdf::Dictionary,
) -> Result<FilterChainOutput, DecodeError> {
    let mut data = payload.to_vec();
    let mut native = None;

    for (i, (filter, parms)) in filters.iter().enumerate() {
        let last = i + 1 == filters.len();

        if let Some(container) = filter.native_image() {
            if !last {
                return Err(DecodeError::UnsupportedFilter(format!(
                    "{filter:?} before the final filter position"
                )));
            }
            if *filter == Filter::CcittFax {
                let params = CcittParams::from_dicts(parms.as_ref(), image_dict);
                log::debug!(
                    "rewrapping CCITT payload as TIFF ({}x{}, K={})",
                    params.columns,
                    params.rows,
                    params.k
                );
                data = wrap_ccitt_in_tiff(&data, &params);
            }
            native = Some(container);
            break;
        }

        data = match filter {
            Filter::Flate => with_predictor(flate_decode(&data)?, parms.as_ref())?,
            Filter::Lzw => {
                let early_change = parms
                    .as_ref()
                    .and_then(|p| p.get(b"EarlyChange").ok())
                    .and_then(|o| o.as_i64().ok())
                    .unwrap_or(1);
                with_predictor(lzw_decode(&data, early_change != 0)?, parms.as_ref())?
            }
            Filter::Ascii85 => ascii85_decode(&data)?,
            Filter::AsciiHex => asciihex_decode(&data)?,
            Filter::RunLength => run_length_decode(&data),
            Filter::Identity => data,
            Filter::Dct | Filter::Jpx | Filter::CcittFax => unreachable!(),
        };
    }

    Ok(FilterChainOutput { data, native })
}

/// Apply the `/Predictor` from a parameter dictionary, if any.
fn with_predictor(
    data: Vec<u8>,
    parms: Option<&lopdf::Dictionary>,
) -> Result<Vec<u8>, DecodeError> {
    let parms = match parms {
        Some(p) => p,
        None => return Ok(data),
    };
    let get = |key: &[u8], default: i64| {
        parms
            .get(key)
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(default)
    };
    let predictor = get(b"Predictor", 1);
    if predictor <= 1 {
        return Ok(data);
    }
    let colors = get(b"Colors", 1).max(1) as usize;
    let bpc = get(b"BitsPerComponent", 8).max(1) as usize;
    let columns = get(b"Columns", 1).max(1) as usize;
    Ok(apply_predictor(&data, predictor, colors, bpc, columns))
}

/// Undo a TIFF (2) or PNG (10–15) predictor.
fn apply_predictor(
    data: &[u8],
    predictor: i64,
    colors: usize,
    bpc: usize,
    columns: usize,
) -> Vec<u8> {
    let bytes_per_pixel = (colors * bpc).div_ceil(8).max(1);
    let row_bytes = (columns * colors * bpc).div_ceil(8);

    if predictor == 2 {
        return tiff_predictor(data, row_bytes, bytes_per_pixel);
    }
    png_predictor(data, row_bytes, bytes_per_pixel)
}

/// TIFF predictor 2: horizontal byte differencing.
fn tiff_predictor(data: &[u8], row_bytes: usize, bytes_per_pixel: usize) -> Vec<u8> {
    let mut output = Vec::with_capacity(data.len());
    for row in data.chunks(row_bytes.max(1)) {
        let row_start = output.len();
        for (i, &byte) in row.iter().enumerate() {
            let left = if i >= bytes_per_pixel {
                output[row_start + i - bytes_per_pixel]
            } else {
                0
            };
            output.push(byte.wrapping_add(left));
        }
    }
    output
}

/// PNG predictors 10–15: every row carries a filter-type byte.
fn png_predictor(data: &[u8], row_bytes: usize, bytes_per_pixel: usize) -> Vec<u8> {
    let stride = row_bytes + 1;
    let mut output = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_bytes];
    let mut current = Vec::with_capacity(row_bytes);

    for row in data.chunks(stride) {
        let (filter, row_data) = match row.split_first() {
            Some(split) => split,
            None => continue,
        };
        current.clear();
        for (i, &byte) in row_data.iter().enumerate() {
            let a = if i >= bytes_per_pixel {
                current[i - bytes_per_pixel]
            } else {
                0
            };
            let b = prev_row.get(i).copied().unwrap_or(0);
            let c = if i >= bytes_per_pixel {
                prev_row.get(i - bytes_per_pixel).copied().unwrap_or(0)
            } else {
                0
            };
            let decoded = match filter {
                0 => byte,
                1 => byte.wrapping_add(a),
                2 => byte.wrapping_add(b),
                3 => byte.wrapping_add(((u16::from(a) + u16::from(b)) / 2) as u8),
                4 => byte.wrapping_add(paeth(a, b, c)),
                _ => byte,
            };
            current.push(decoded);
        }
        output.extend_from_slice(&current);
        prev_row.clear();
        prev_row.extend_from_slice(&current);
        prev_row.resize(row_bytes, 0);
    }
    output
}

/// PNG Paeth predictor function.
fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i32::from(a) + i32::from(b) - i32::from(c);
    let pa = (p - i32::from(a)).abs();
    let pb = (p - i32::from(b)).abs();
    let pc = (p - i32::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// FlateDecode: zlib, with a raw-deflate fallback for streams written
/// without the zlib header.
fn flate_decode(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let mut output = Vec::new();
    if flate2::read::ZlibDecoder::new(data)
        .read_to_end(&mut output)
        .is_ok()
    {
        return Ok(output);
    }
    let mut fallback = Vec::new();
    if flate2::read::DeflateDecoder::new(data)
        .read_to_end(&mut fallback)
        .is_ok()
    {
        log::debug!("flate stream decoded as raw deflate");
        return Ok(fallback);
    }
    Err(DecodeError::Parse("flate decode failed".to_string()))
}

/// LZWDecode via weezl, MSB-first with 8-bit symbols. `early_change`
/// selects the one-code-early table growth PDF defaults to.
fn lzw_decode(data: &[u8], early_change: bool) -> Result<Vec<u8>, DecodeError> {
    let mut decoder = if early_change {
        weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
    } else {
        weezl::decode::Decoder::new(weezl::BitOrder::Msb, 8)
    };
    decoder
        .decode(data)
        .map_err(|e| DecodeError::Parse(format!("LZW decode failed: {e}")))
}

/// ASCII85Decode. Tolerates the optional `<~` prefix and whitespace;
/// stops at the `~>` terminator.
fn ascii85_decode(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let data = data.strip_prefix(b"<~").unwrap_or(data);
    let mut output = Vec::new();
    let mut group = 0u32;
    let mut count = 0usize;

    for &byte in data {
        match byte {
            b'z' if count == 0 => output.extend_from_slice(&[0, 0, 0, 0]),
            b'~' => break,
            b'!'..=b'u' => {
                group = group
                    .wrapping_mul(85)
                    .wrapping_add(u32::from(byte - b'!'));
                count += 1;
                if count == 5 {
                    output.extend_from_slice(&group.to_be_bytes());
                    group = 0;
                    count = 0;
                }
            }
            b if is_filter_whitespace(b) => {}
            other => {
                return Err(DecodeError::Parse(format!(
                    "invalid ASCII85 byte 0x{other:02X}"
                )));
            }
        }
    }

    if count > 0 {
        // Partial group: pad with 'u' and keep count − 1 bytes
        for _ in count..5 {
            group = group.wrapping_mul(85).wrapping_add(84);
        }
        let bytes = group.to_be_bytes();
        output.extend_from_slice(&bytes[..count - 1]);
    }

    Ok(output)
}

fn is_filter_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0C | 0x00)
}

/// ASCIIHexDecode. Whitespace is skipped; `>` terminates; an odd trailing
/// digit is padded with zero.
fn asciihex_decode(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut output = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;

    for &byte in data {
        let nibble = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            b'>' => break,
            b if is_filter_whitespace(b) => continue,
            other => {
                return Err(DecodeError::Parse(format!(
                    "invalid ASCIIHex byte 0x{other:02X}"
                )));
            }
        };
        match high.take() {
            Some(h) => output.push((h << 4) | nibble),
            None => high = Some(nibble),
        }
    }
    if let Some(h) = high {
        output.push(h << 4);
    }
    Ok(output)
}

/// RunLengthDecode: `n < 128` copies `n + 1` literal bytes, `n > 128`
/// repeats the next byte `257 − n` times, 128 ends the data.
fn run_length_decode(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let count = data[i];
        i += 1;
        if count == 128 {
            break;
        } else if count < 128 {
            let n = count as usize + 1;
            let end = (i + n).min(data.len());
            output.extend_from_slice(&data[i..end]);
            i = end;
        } else if i < data.len() {
            let n = 257 - count as usize;
            output.extend(std::iter::repeat(data[i]).take(n));
            i += 1;
        }
    }
    output
}
