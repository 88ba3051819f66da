//! JPEG (DCTDecode) container reading.

use std::io::Cursor;

use jpeg_decoder::{Decoder, PixelFormat};
use pdfraster_core::color::DeviceSpace;
use pdfraster_core::error::DecodeError;

/// A decoded JPEG container.
#[derive(Debug)]
pub(crate) struct JpegBlob {
    pub width: u32,
    pub height: u32,
    pub space: DeviceSpace,
    pub pixels: Vec<u8>,
    /// CMYK JPEGs store inverted channel values; the consumer flips its
    /// negation flag when this is set.
    pub inverted_cmyk: bool,
}

/// Decode a JPEG payload to interleaved bytes.
pub(crate) fn read_jpeg(bytes: &[u8]) -> Result<JpegBlob, DecodeError> {
    let mut decoder = Decoder::new(Cursor::new(bytes));
    decoder
        .read_info()
        .map_err(|e| DecodeError::Parse(format!("JPEG header: {e}")))?;
    let info = decoder
        .info()
        .ok_or_else(|| DecodeError::Parse("JPEG info unavailable".to_string()))?;
    let data = decoder
        .decode()
        .map_err(|e| DecodeError::Parse(format!("JPEG decode: {e}")))?;

    let (space, pixels, inverted_cmyk) = match info.pixel_format {
        PixelFormat::L8 => (DeviceSpace::Gray, data, false),
        PixelFormat::L16 => {
            // Keep the high byte of each 16-bit luma sample
            let down: Vec<u8> = data.chunks_exact(2).map(|pair| pair[0]).collect();
            (DeviceSpace::Gray, down, false)
        }
        PixelFormat::RGB24 => (DeviceSpace::Rgb, data, false),
        PixelFormat::CMYK32 => (DeviceSpace::Cmyk, data, true),
    };

    Ok(JpegBlob {
        width: u32::from(info.width),
        height: u32::from(info.height),
        space,
        pixels,
        inverted_cmyk,
    })
}
