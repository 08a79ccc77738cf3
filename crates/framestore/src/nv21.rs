//! NV21 preview buffers to JPEG.
//!
//! NV21 is a full-resolution luma plane followed by one interleaved V/U plane
//! subsampled 2x2. Conversion uses full-range BT.601 (JFIF) coefficients, the
//! same ones camera preview pipelines use when compressing previews.

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::error::StoreError;

/// Number of bytes an NV21 frame of the given size must carry.
pub fn nv21_len(width: u32, height: u32) -> usize {
    let (w, h) = (width as usize, height as usize);
    let chroma_w = w.div_ceil(2);
    let chroma_h = h.div_ceil(2);
    w * h + 2 * chroma_w * chroma_h
}

/// Convert an NV21 buffer to packed RGB8.
///
/// `frame_index` is only used to label the error.
pub fn nv21_to_rgb(
    frame_index: u32,
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<Vec<u8>, StoreError> {
    if width == 0 || height == 0 {
        return Err(StoreError::FrameEncodeFailed {
            index: frame_index,
            reason: format!("invalid frame size {}x{}", width, height),
        });
    }
    if data.is_empty() {
        return Err(StoreError::FrameEncodeFailed {
            index: frame_index,
            reason: "empty frame payload".to_string(),
        });
    }
    let expected = nv21_len(width, height);
    if data.len() < expected {
        return Err(StoreError::FrameEncodeFailed {
            index: frame_index,
            reason: format!(
                "short NV21 payload: {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            ),
        });
    }

    let (w, h) = (width as usize, height as usize);
    let luma_len = w * h;
    let chroma_stride = 2 * w.div_ceil(2);
    let mut rgb = Vec::with_capacity(luma_len * 3);

    for y in 0..h {
        let chroma_row = luma_len + (y / 2) * chroma_stride;
        for x in 0..w {
            let luma = data[y * w + x] as f32;
            let vu = chroma_row + (x / 2) * 2;
            let v = data[vu] as f32 - 128.0;
            let u = data[vu + 1] as f32 - 128.0;

            let r = luma + 1.402 * v;
            let g = luma - 0.344_136 * u - 0.714_136 * v;
            let b = luma + 1.772 * u;

            rgb.push(clamp_channel(r));
            rgb.push(clamp_channel(g));
            rgb.push(clamp_channel(b));
        }
    }

    Ok(rgb)
}

fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Compress an NV21 frame to JPEG bytes at `quality` (1-100).
pub fn encode_nv21_jpeg(
    frame_index: u32,
    data: &[u8],
    width: u32,
    height: u32,
    quality: u8,
) -> Result<Vec<u8>, StoreError> {
    let rgb = nv21_to_rgb(frame_index, data, width, height)?;

    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality);
    encoder
        .encode(&rgb, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| StoreError::FrameEncodeFailed {
            index: frame_index,
            reason: e.to_string(),
        })?;

    Ok(jpeg)
}
