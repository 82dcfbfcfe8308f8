//! Image encoding: `DynamicImage` → PNG / JPEG / TIFF bytes.
//!
//! Runs on the calling blocking-pool thread, not on the pdfium worker. The
//! engine's admission permit is still held while encoding.

use crate::config::ExportFormat;
use image::codecs::jpeg::JpegEncoder;
use image::error::{EncodingError, ImageFormatHint};
use image::{DynamicImage, ImageError, ImageFormat};
use std::io::Cursor;
use tiff::encoder::compression::{Lzw, Uncompressed};
use tiff::encoder::{colortype, TiffEncoder};
use tracing::debug;

/// Encode a rasterised page in the requested format.
///
/// `quality` drives JPEG (clamped to 1–100) and TIFF (any positive value
/// selects LZW compression). PNG ignores it. JPEG has no alpha channel, so
/// the page is flattened to RGB first.
pub fn encode_page(
    img: &DynamicImage,
    format: ExportFormat,
    quality: u32,
) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    match format {
        ExportFormat::Png => img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?,
        ExportFormat::Tiff => encode_tiff(img, quality > 0, &mut buf)?,
        ExportFormat::Jpeg => {
            let quality = quality.clamp(1, 100) as u8;
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
        }
    }

    debug!(
        "Encoded {}x{} page → {} bytes {}",
        img.width(),
        img.height(),
        buf.len(),
        format
    );
    Ok(buf)
}

fn encode_tiff(img: &DynamicImage, compress: bool, buf: &mut Vec<u8>) -> Result<(), ImageError> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut encoder = TiffEncoder::new(Cursor::new(buf)).map_err(tiff_err)?;
    let written = if compress {
        encoder.write_image_with_compression::<colortype::RGBA8, _>(width, height, Lzw, &rgba)
    } else {
        encoder.write_image_with_compression::<colortype::RGBA8, _>(
            width,
            height,
            Uncompressed,
            &rgba,
        )
    };
    written.map_err(tiff_err)
}

fn tiff_err(e: tiff::TiffError) -> ImageError {
    ImageError::Encoding(EncodingError::new(
        ImageFormatHint::Exact(ImageFormat::Tiff),
        e,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn page() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(40, 30, |x, y| {
            Rgba([(x * 6) as u8, (y * 8) as u8, 128, 255])
        }))
    }

    #[test]
    fn png_magic() {
        let data = encode_page(&page(), ExportFormat::Png, 100).expect("encode should succeed");
        assert_eq!(&data[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn jpeg_magic_and_rgba_input() {
        let data = encode_page(&page(), ExportFormat::Jpeg, 90).expect("encode should succeed");
        assert_eq!(&data[..3], &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn tiff_magic() {
        let data = encode_page(&page(), ExportFormat::Tiff, 100).expect("encode should succeed");
        assert!(data.starts_with(b"II*\0") || data.starts_with(b"MM\0*"));
    }

    #[test]
    fn lower_jpeg_quality_is_smaller() {
        let noisy = DynamicImage::ImageRgba8(RgbaImage::from_fn(128, 128, |x, y| {
            let v = ((x * 31) ^ (y * 17)) as u8;
            Rgba([v, v.wrapping_mul(3), v.wrapping_add(91), 255])
        }));
        let high = encode_page(&noisy, ExportFormat::Jpeg, 100).unwrap();
        let low = encode_page(&noisy, ExportFormat::Jpeg, 10).unwrap();
        assert!(low.len() < high.len(), "{} !< {}", low.len(), high.len());
    }

    #[test]
    fn positive_quality_compresses_tiff() {
        let flat = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            200,
            100,
            Rgba([250, 250, 250, 255]),
        ));
        let raw = encode_page(&flat, ExportFormat::Tiff, 0).unwrap();
        let lzw = encode_page(&flat, ExportFormat::Tiff, 100).unwrap();
        assert!(raw.len() > 200 * 100 * 4, "uncompressed: {}", raw.len());
        assert!(lzw.len() * 10 < raw.len(), "{} !< {} / 10", lzw.len(), raw.len());

        let decoded = image::load_from_memory(&lzw).expect("decodable");
        assert_eq!(decoded.to_rgba8(), flat.to_rgba8());
    }

    #[test]
    fn out_of_range_jpeg_quality_is_clamped() {
        let data = encode_page(&page(), ExportFormat::Jpeg, 250).unwrap();
        assert_eq!(data, encode_page(&page(), ExportFormat::Jpeg, 100).unwrap());
    }

    #[test]
    fn decodes_back_to_same_dimensions() {
        for format in [ExportFormat::Png, ExportFormat::Jpeg, ExportFormat::Tiff] {
            let data = encode_page(&page(), format, 100).unwrap();
            let decoded = image::load_from_memory(&data).expect("decodable");
            assert_eq!((decoded.width(), decoded.height()), (40, 30), "{format}");
        }
    }
}
