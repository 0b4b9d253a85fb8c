//! Downscaling report images before upload.

use std::io::Cursor;

use image::ImageFormat;
use image::imageops::FilterType;

use crate::FeedError;

/// Widest image accepted by the blob store, in pixels.
pub const MAX_IMAGE_WIDTH: u32 = 800;

/// Tallest image accepted by the blob store, in pixels.
pub const MAX_IMAGE_HEIGHT: u32 = 600;

/// Shrinks an encoded image to fit `max_width` x `max_height`, keeping its
/// aspect ratio and its encoding format.
///
/// Images that already fit come back byte-for-byte unchanged. Images are
/// never enlarged.
///
/// # Errors
///
/// Returns [`FeedError::Image`] if `bytes` is not a supported image or the
/// resized image cannot be re-encoded.
pub fn fit_within(bytes: Vec<u8>, max_width: u32, max_height: u32) -> Result<Vec<u8>, FeedError> {
    let format = image::guess_format(&bytes)?;
    let decoded = image::load_from_memory_with_format(&bytes, format)?;
    let (width, height) = (decoded.width(), decoded.height());

    if width <= max_width && height <= max_height {
        return Ok(bytes);
    }

    let resized = decoded.resize(max_width, max_height, FilterType::Triangle);
    log::debug!(
        "Resized {format:?} image from {width}x{height} to {}x{}",
        resized.width(),
        resized.height()
    );

    let mut out = Cursor::new(Vec::new());
    resized.write_to(&mut out, format)?;
    Ok(out.into_inner())
}

/// [`fit_within`] with the blob store bounds.
///
/// # Errors
///
/// See [`fit_within`].
pub fn fit_for_upload(bytes: Vec<u8>) -> Result<Vec<u8>, FeedError> {
    fit_within(bytes, MAX_IMAGE_WIDTH, MAX_IMAGE_HEIGHT)
}

#[cfg(test)]
pub(crate) fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height))
        .write_to(&mut out, format)
        .unwrap();
    out.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dimensions(bytes: &[u8]) -> (u32, u32) {
        let decoded = image::load_from_memory(bytes).unwrap();
        (decoded.width(), decoded.height())
    }

    #[test]
    fn shrinks_landscape_to_bounds() {
        let resized = fit_for_upload(encoded(1600, 1200, ImageFormat::Png)).unwrap();
        assert_eq!(dimensions(&resized), (800, 600));
    }

    #[test]
    fn keeps_aspect_ratio_of_tall_images() {
        let resized = fit_for_upload(encoded(600, 1200, ImageFormat::Png)).unwrap();
        assert_eq!(dimensions(&resized), (300, 600));
    }

    #[test]
    fn keeps_encoding_format() {
        let resized = fit_for_upload(encoded(1000, 500, ImageFormat::Jpeg)).unwrap();
        assert_eq!(image::guess_format(&resized).unwrap(), ImageFormat::Jpeg);
        assert_eq!(dimensions(&resized), (800, 400));
    }

    #[test]
    fn small_images_pass_through() {
        let small = encoded(320, 240, ImageFormat::Png);
        assert_eq!(fit_for_upload(small.clone()).unwrap(), small);
    }

    #[test]
    fn rejects_non_images() {
        assert!(matches!(
            fit_for_upload(b"not an image".to_vec()),
            Err(FeedError::Image(_))
        ));
    }
}
