//! JPEG 2000 (JPXDecode) container reading.

use pdfraster_core::color::DeviceSpace;
use pdfraster_core::error::DecodeError;

/// A decoded JPEG 2000 container.
#[derive(Debug)]
pub(crate) struct JpxBlob {
    pub width: u32,
    pub height: u32,
    pub space: DeviceSpace,
    pub pixels: Vec<u8>,
    /// Alpha plane when the container carries an opacity channel.
    pub alpha: Option<Vec<u8>>,
}

/// Decode a JPEG 2000 payload to interleaved bytes.
pub(crate) fn read_jpx(bytes: &[u8]) -> Result<JpxBlob, DecodeError> {
    let bitmap = hayro_jpeg2000::decode(bytes, &hayro_jpeg2000::DecodeSettings::default())
        .map_err(|_| DecodeError::Parse("JPEG 2000 decode failed".to_string()))?;

    let width = bitmap.width;
    let height = bitmap.height;

    let color_count = match &bitmap.color_space {
        hayro_jpeg2000::ColorSpace::Gray => 1usize,
        hayro_jpeg2000::ColorSpace::RGB => 3usize,
        hayro_jpeg2000::ColorSpace::CMYK => 4usize,
        hayro_jpeg2000::ColorSpace::Icc { num_channels, .. } => *num_channels as usize,
    };
    let space = match &bitmap.color_space {
        hayro_jpeg2000::ColorSpace::Gray => DeviceSpace::Gray,
        hayro_jpeg2000::ColorSpace::RGB => DeviceSpace::Rgb,
        hayro_jpeg2000::ColorSpace::CMYK => DeviceSpace::Cmyk,
        hayro_jpeg2000::ColorSpace::Icc { num_channels, .. } => {
            return Err(DecodeError::UnsupportedColorSpace(format!(
                "JPEG 2000 container with {num_channels} ICC color channels"
            )));
        }
    };

    let total_channels = color_count + if bitmap.has_alpha { 1 } else { 0 };
    let samples = if total_channels == 0 {
        0
    } else {
        bitmap.data.len() / total_channels
    };

    let (pixels, alpha) = if bitmap.has_alpha {
        let mut pixels = Vec::with_capacity(samples * color_count);
        let mut alpha = Vec::with_capacity(samples);
        for chunk in bitmap.data.chunks(total_channels) {
            pixels.extend_from_slice(&chunk[..color_count]);
            alpha.push(chunk[color_count]);
        }
        (pixels, Some(alpha))
    } else {
        (bitmap.data, None)
    };

    Ok(JpxBlob {
        width,
        height,
        space,
        pixels,
        alpha,
    })
}

/// Scale a channel to 8-bit samples. Depths of 8 pass through; shallower
/// depths stretch to the full byte range.
fn scale_channel(container: &[u8], bit_depth: u8) -> Vec<u8> {
    if bit_depth >= 8 {
        return container.to_vec();
    }
    let max = (1u16 << bit_depth) - 1;
    container
        .iter()
        .map(|&s| (u16::from(s) * 255 / max) as u8)
        .collect()
}
