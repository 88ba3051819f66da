//! CCITT decode parameters and the TIFF rewrapper.
//!
//! CCITT payloads carry no container of their own, so downstream raster
//! readers cannot tell Group 3 from Group 4 or recover the row geometry.
//! [`wrap_ccitt_in_tiff`] synthesizes a minimal single-IFD little-endian
//! TIFF header around the still-compressed payload; the batch builder's
//! blob path parses the same header back.

/// CCITT decode parameters from a `/DecodeParms` dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct CcittParams {
    /// Coding scheme: negative = Group 4, 0 = Group 3 1-D, positive =
    /// Group 3 mixed 2-D.
    pub k: i32,
    /// Pixels per row.
    pub columns: u32,
    /// Number of rows; 0 when unknown.
    pub rows: u32,
    /// Rows are padded so each begins on a byte boundary.
    pub encoded_byte_align: bool,
    /// Decoded 1 bits are black.
    pub black_is_1: bool,
    /// Damaged rows tolerated before the decoder gives up.
    pub damaged_rows_before_error: u32,
}

impl Default for CcittParams {
    fn default() -> Self {
        Self {
            k: 0,
            columns: 1728,
            rows: 0,
            encoded_byte_align: false,
            black_is_1: false,
            damaged_rows_before_error: 0,
        }
    }
}

impl CcittParams {
    /// Read parameters from the filter's parameter dictionary, falling
    /// back to the image dictionary's `/Height` for `/Rows`.
    pub fn from_dicts(
        parms: Option<&lopdf::Dictionary>,
        image_dict: &lopdf::Dictionary,
    ) -> Self {
        let mut params = CcittParams::default();

        if let Some(parms) = parms {
            let int = |key: &[u8]| parms.get(key).ok().and_then(|o| o.as_i64().ok());
            let flag = |key: &[u8]| parms.get(key).ok().and_then(|o| o.as_bool().ok());

            if let Some(k) = int(b"K") {
                params.k = k as i32;
            }
            if let Some(columns) = int(b"Columns") {
                params.columns = columns.max(1) as u32;
            }
            if let Some(rows) = int(b"Rows") {
                params.rows = rows.max(0) as u32;
            }
            if let Some(eba) = flag(b"EncodedByteAlign") {
                params.encoded_byte_align = eba;
            }
            if let Some(black) = flag(b"BlackIs1") {
                params.black_is_1 = black;
            }
            if let Some(damaged) = int(b"DamagedRowsBeforeError") {
                params.damaged_rows_before_error = damaged.max(0) as u32;
            }
        }

        if params.rows == 0 {
            if let Ok(height) = image_dict.get(b"Height").and_then(|o| o.as_i64()) {
                params.rows = height.max(0) as u32;
            }
        }

        params
    }

}

const TIFF_TAG_COUNT: usize = 10;

/// Byte offset of the strip payload: `12 + 12 · num_tags`.
const STRIP_OFFSET: u32 = 12 + 12 * TIFF_TAG_COUNT as u32;

const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;

/// Wrap a CCITT payload in a minimal 10-tag little-endian TIFF IFD.
///
/// Compression is 3 (Group 3) when `K ≥ 0` and 4 (Group 4) otherwise. The
/// T4/T6 option tag packs `K > 0` as 0x01 and EncodedByteAlign as 0x04.
/// StripByteCounts is the payload length; StripOffsets is
/// `12 + 12 · num_tags`, and the IFD is padded so the payload really does
/// start there.
pub fn wrap_ccitt_in_tiff(payload: &[u8], params: &CcittParams) -> Vec<u8> {
    if params.damaged_rows_before_error > 0 {
        log::debug!(
            "CCITT DamagedRowsBeforeError={} not enforced by the reader",
            params.damaged_rows_before_error
        );
    }

    let group3 = params.k >= 0;
    let compression: u32 = if group3 { 3 } else { 4 };
    let option_tag = if group3 { 292 } else { 293 };
    let mut options = 0u32;
    if params.k > 0 {
        options |= 0x01;
    }
    if params.encoded_byte_align {
        options |= 0x04;
    }
    let photometric: u32 = if params.black_is_1 { 1 } else { 0 };

    // Ascending tag order, as a TIFF IFD requires
    let entries: [(u16, u16, u32); TIFF_TAG_COUNT] = [
        (256, TYPE_LONG, params.columns),          // ImageWidth
        (257, TYPE_LONG, params.rows),             // ImageLength
        (258, TYPE_SHORT, 1),                      // BitsPerSample
        (259, TYPE_SHORT, compression),            // Compression
        (262, TYPE_SHORT, photometric),            // PhotometricInterpretation
        (273, TYPE_LONG, STRIP_OFFSET),            // StripOffsets
        (277, TYPE_SHORT, 1),                      // SamplesPerPixel
        (278, TYPE_LONG, params.rows),             // RowsPerStrip
        (279, TYPE_LONG, payload.len() as u32),    // StripByteCounts
        (option_tag, TYPE_LONG, options),          // T4Options / T6Options
    ];

    let mut buf = Vec::with_capacity(STRIP_OFFSET as usize + payload.len());
    buf.extend_from_slice(b"II");
    buf.extend_from_slice(&42u16.to_le_bytes());
    buf.extend_from_slice(&8u32.to_le_bytes()); // IFD offset
    buf.extend_from_slice(&(TIFF_TAG_COUNT as u16).to_le_bytes());
    for (tag, kind, value) in entries {
        buf.extend_from_slice(&tag.to_le_bytes());
        buf.extend_from_slice(&kind.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&value.to_le_bytes());
    }
    // Pad the IFD tail so the strip lands exactly at STRIP_OFFSET
    buf.resize(STRIP_OFFSET as usize, 0);
    buf.extend_from_slice(payload);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    // --- Parameter extraction ---

    #[test]
    fn defaults_follow_the_fax_standard() {
        let params = CcittParams::default();
        assert_eq!(params.k, 0);
        assert_eq!(params.columns, 1728);
        assert_eq!(params.rows, 0);
        assert!(!params.encoded_byte_align);
        assert!(!params.black_is_1);
    }

    #[test]
    fn parameters_read_from_dictionary() {
        let parms = dictionary! {
            "K" => -1,
            "Columns" => 2480,
            "Rows" => 3508,
            "EncodedByteAlign" => true,
            "BlackIs1" => true,
        };
        let params = CcittParams::from_dicts(Some(&parms), &dictionary! {});
        assert_eq!(params.k, -1);
        assert_eq!(params.columns, 2480);
        assert_eq!(params.rows, 3508);
        assert!(params.encoded_byte_align);
        assert!(params.black_is_1);
    }

    #[test]
    fn rows_fall_back_to_image_height() {
        let image_dict = dictionary! { "Height" => 64 };
        let params = CcittParams::from_dicts(None, &image_dict);
        assert_eq!(params.rows, 64);

        // An explicit /Rows wins over /Height
        let parms = dictionary! { "Rows" => 32 };
        let params = CcittParams::from_dicts(Some(&parms), &image_dict);
        assert_eq!(params.rows, 32);
    }

    // --- TIFF wrapper ---

    fn tag_value(tiff: &[u8], wanted: u16) -> Option<u32> {
        let count = u16::from_le_bytes([tiff[8], tiff[9]]) as usize;
        (0..count).find_map(|i| {
            let at = 10 + i * 12;
            let tag = u16::from_le_bytes([tiff[at], tiff[at + 1]]);
            (tag == wanted).then(|| {
                let kind = u16::from_le_bytes([tiff[at + 2], tiff[at + 3]]);
                if kind == TYPE_SHORT {
                    u32::from(u16::from_le_bytes([tiff[at + 8], tiff[at + 9]]))
                } else {
                    u32::from_le_bytes([
                        tiff[at + 8],
                        tiff[at + 9],
                        tiff[at + 10],
                        tiff[at + 11],
                    ])
                }
            })
        })
    }

    #[test]
    fn header_magic_and_payload_position() {
        let params = CcittParams {
            rows: 4,
            ..CcittParams::default()
        };
        let tiff = wrap_ccitt_in_tiff(b"\xDE\xAD\xBE\xEF", &params);
        assert_eq!(&tiff[0..2], b"II");
        assert_eq!(u16::from_le_bytes([tiff[2], tiff[3]]), 42);
        assert_eq!(tag_value(&tiff, 273), Some(132)); // 12 + 12·10
        assert_eq!(&tiff[132..], b"\xDE\xAD\xBE\xEF");
    }

    #[test]
    fn group4_when_k_negative() {
        let params = CcittParams {
            k: -1,
            ..CcittParams::default()
        };
        let tiff = wrap_ccitt_in_tiff(b"x", &params);
        assert_eq!(tag_value(&tiff, 259), Some(4));
        assert!(tag_value(&tiff, 293).is_some());
        assert!(tag_value(&tiff, 292).is_none());
    }

    #[test]
    fn group3_when_k_zero_or_positive() {
        let params = CcittParams::default();
        let tiff = wrap_ccitt_in_tiff(b"x", &params);
        assert_eq!(tag_value(&tiff, 259), Some(3));
        assert!(tag_value(&tiff, 292).is_some());
    }

    #[test]
    fn option_tag_packs_k_and_byte_align() {
        let params = CcittParams {
            k: 4,
            encoded_byte_align: true,
            ..CcittParams::default()
        };
        let tiff = wrap_ccitt_in_tiff(b"x", &params);
        assert_eq!(tag_value(&tiff, 292), Some(0x05));
    }

    #[test]
    fn strip_byte_counts_matches_payload() {
        let payload = vec![0u8; 37];
        let tiff = wrap_ccitt_in_tiff(&payload, &CcittParams::default());
        assert_eq!(tag_value(&tiff, 279), Some(37));
        assert_eq!(tiff.len(), 132 + 37);
    }

    #[test]
    fn geometry_tags_carry_columns_and_rows() {
        let params = CcittParams {
            columns: 200,
            rows: 100,
            ..CcittParams::default()
        };
        let tiff = wrap_ccitt_in_tiff(b"x", &params);
        assert_eq!(tag_value(&tiff, 256), Some(200));
        assert_eq!(tag_value(&tiff, 257), Some(100));
        assert_eq!(tag_value(&tiff, 278), Some(100));
    }

    #[test]
    fn photometric_follows_black_is_1() {
        let tiff = wrap_ccitt_in_tiff(b"x", &CcittParams::default());
        assert_eq!(tag_value(&tiff, 262), Some(0));

        let params = CcittParams {
            black_is_1: true,
            ..CcittParams::default()
        };
        let tiff = wrap_ccitt_in_tiff(b"x", &params);
        assert_eq!(tag_value(&tiff, 262), Some(1));
    }
}
