//! Image preparation for upload to the model endpoint
//!
//! Decode → drop alpha / normalize to 8-bit → downscale to fit → JPEG → base64.
//! Decoding and resizing are CPU-bound and run on the blocking pool.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Image preparation errors
#[derive(Debug, Error)]
pub enum ImageEncodeError {
    /// File could not be opened or read
    #[error("Cannot read image {0}: {1}")]
    Read(PathBuf, std::io::Error),

    /// File content is not a decodable image
    #[error("Cannot decode image {0}: {1}")]
    Decode(PathBuf, image::ImageError),

    /// JPEG encoding failed
    #[error("Cannot encode image {0}: {1}")]
    Encode(PathBuf, image::ImageError),

    /// Blocking task panicked or was cancelled
    #[error("Image task failed: {0}")]
    Task(String),
}

/// Prepare an image file for upload, returning base64-encoded JPEG bytes
pub async fn encode_image_for_upload(
    path: &Path,
    max_dim: u32,
) -> Result<String, ImageEncodeError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || encode_image_blocking(&path, max_dim))
        .await
        .map_err(|e| ImageEncodeError::Task(e.to_string()))?
}

/// Synchronous body of [`encode_image_for_upload`]
pub fn encode_image_blocking(path: &Path, max_dim: u32) -> Result<String, ImageEncodeError> {
    let image = ImageReader::open(path)
        .map_err(|e| ImageEncodeError::Read(path.to_path_buf(), e))?
        .with_guessed_format()
        .map_err(|e| ImageEncodeError::Read(path.to_path_buf(), e))?
        .decode()
        .map_err(|e| ImageEncodeError::Decode(path.to_path_buf(), e))?;

    let (width, height) = image.dimensions();
    let image = fit_within(to_opaque_8bit(image), max_dim);
    tracing::debug!(
        file = %path.display(),
        original = format!("{}x{}", width, height),
        resized = format!("{}x{}", image.width(), image.height()),
        "Prepared image for upload"
    );

    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Jpeg)
        .map_err(|e| ImageEncodeError::Encode(path.to_path_buf(), e))?;

    Ok(STANDARD.encode(buffer.into_inner()))
}

/// JPEG accepts only 8-bit gray or 8-bit RGB; everything else becomes RGB8
fn to_opaque_8bit(image: DynamicImage) -> DynamicImage {
    match image.color() {
        ColorType::L8 | ColorType::Rgb8 => image,
        color => {
            if color.has_alpha() {
                tracing::debug!(color = ?color, "Dropping alpha channel");
            }
            DynamicImage::ImageRgb8(image.to_rgb8())
        }
    }
}

/// Downscale so neither edge exceeds `max_dim`, keeping aspect ratio
///
/// Images already within bounds are returned untouched.
fn fit_within(image: DynamicImage, max_dim: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= max_dim && height <= max_dim {
        return image;
    }
    image.resize(max_dim, max_dim, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage, RgbImage};
    use tempfile::TempDir;

    fn decode_upload(encoded: &str) -> DynamicImage {
        let bytes = STANDARD.decode(encoded).unwrap();
        image::load_from_memory(&bytes).unwrap()
    }

    #[test]
    fn test_rgba_png_is_flattened_and_downscaled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wide.png");
        RgbaImage::from_pixel(1600, 400, Rgba([10, 200, 30, 128]))
            .save(&path)
            .unwrap();

        let encoded = encode_image_blocking(&path, 800).unwrap();
        let uploaded = decode_upload(&encoded);

        assert_eq!(uploaded.dimensions(), (800, 200));
        assert!(!uploaded.color().has_alpha());
    }

    #[test]
    fn test_small_image_not_upscaled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("small.png");
        RgbImage::new(120, 80).save(&path).unwrap();

        let encoded = encode_image_blocking(&path, 800).unwrap();
        assert_eq!(decode_upload(&encoded).dimensions(), (120, 80));
    }

    #[test]
    fn test_portrait_keeps_aspect_ratio() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tall.png");
        RgbImage::new(500, 2000).save(&path).unwrap();

        let encoded = encode_image_blocking(&path, 800).unwrap();
        assert_eq!(decode_upload(&encoded).dimensions(), (200, 800));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = encode_image_blocking(Path::new("/nonexistent/photo.jpg"), 800);
        assert!(matches!(result, Err(ImageEncodeError::Read(_, _))));
    }

    #[test]
    fn test_garbage_file_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.jpg");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let result = encode_image_blocking(&path, 800);
        assert!(matches!(result, Err(ImageEncodeError::Decode(_, _))));
    }

    #[tokio::test]
    async fn test_async_wrapper() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.png");
        RgbImage::new(10, 10).save(&path).unwrap();

        let encoded = encode_image_for_upload(&path, 800).await.unwrap();
        assert!(!encoded.is_empty());
    }
}
