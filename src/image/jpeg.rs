use anyhow::{anyhow, Context};
use image::ImageBuffer;
use jpeg_decoder::{Decoder, PixelFormat};

use super::Image;

/// Decodes a baseline or progressive JPEG into an RGBA [`Image`].
///
/// Webcams in MJPG mode send one of these per frame. Grayscale and CMYK JPEGs are rejected since
/// no camera produces them.
pub(super) fn decode_jpeg(data: &[u8]) -> anyhow::Result<Image> {
    let mut decoder = Decoder::new(data);
    let pixels = decoder.decode().context("failed to decode JPEG")?;
    let info = decoder
        .info()
        .ok_or_else(|| anyhow!("JPEG decoder returned no image info"))?;

    let rgb = match info.pixel_format {
        PixelFormat::RGB24 => pixels,
        other => anyhow::bail!("unsupported JPEG pixel format {:?}", other),
    };

    let (width, height) = (u32::from(info.width), u32::from(info.height));
    let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
    for px in rgb.chunks_exact(3) {
        rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
    }

    let buf = ImageBuffer::from_raw(width, height, rgba)
        .ok_or_else(|| anyhow!("JPEG data does not match its {width}x{height} header"))?;
    Ok(Image { buf })
}
