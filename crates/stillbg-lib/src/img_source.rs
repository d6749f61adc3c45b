// SPDX-License-Identifier: MPL-2.0

//! Decoding of the background image.

use image::{DynamicImage, ImageReader, RgbaImage};
use std::{fmt, fs::File, io::BufReader, path::Path};

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("failed to read background image {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode background image {path}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to decode JPEG XL image {path}: {message}")]
    JpegXl { path: String, message: String },
    #[error("background image {path} is empty")]
    Empty { path: String },
}

/// The decoded background, shared by every output it is painted on.
pub struct SourceImage {
    pixels: RgbaImage,
}

impl SourceImage {
    /// Returns `None` for a zero-area image.
    #[must_use]
    pub fn new(pixels: RgbaImage) -> Option<Self> {
        (pixels.width() > 0 && pixels.height() > 0).then_some(Self { pixels })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    #[inline]
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

impl fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}

/// Decodes the image at `path` once, converting it to RGBA8.
pub fn load(path: &Path) -> Result<SourceImage, ImageError> {
    let shown = path.display().to_string();

    let image = if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jxl"))
    {
        decode_jpegxl(path)?
    } else {
        ImageReader::open(path)
            .map_err(|source| ImageError::Io {
                path: shown.clone(),
                source,
            })?
            .with_guessed_format()
            .map_err(|source| ImageError::Io {
                path: shown.clone(),
                source,
            })?
            .decode()
            .map_err(|source| ImageError::Decode {
                path: shown.clone(),
                source,
            })?
    };

    tracing::info!(
        path = %shown,
        width = image.width(),
        height = image.height(),
        "Loaded background image"
    );

    SourceImage::new(image.into_rgba8()).ok_or(ImageError::Empty { path: shown })
}

fn decode_jpegxl(path: &Path) -> Result<DynamicImage, ImageError> {
    let shown = path.display().to_string();
    let file = File::open(path).map_err(|source| ImageError::Io {
        path: shown.clone(),
        source,
    })?;

    let decoder = jxl_oxide::integration::JxlDecoder::new(BufReader::new(file)).map_err(|err| {
        ImageError::JpegXl {
            path: shown.clone(),
            message: err.to_string(),
        }
    })?;

    DynamicImage::from_decoder(decoder).map_err(|source| ImageError::Decode {
        path: shown,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("stillbg-{}-{name}", std::process::id()))
    }

    #[test]
    fn rejects_empty_image() {
        assert!(SourceImage::new(RgbaImage::new(0, 4)).is_none());
        assert!(SourceImage::new(RgbaImage::new(4, 0)).is_none());
        assert!(SourceImage::new(RgbaImage::new(1, 1)).is_some());
    }

    #[test]
    fn loads_png_as_rgba() {
        let path = temp_path("load.png");
        let mut pixels = RgbaImage::new(3, 2);
        pixels.put_pixel(2, 1, Rgba([10, 20, 30, 255]));
        pixels.save(&path).unwrap();

        let image = load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(image.size(), (3, 2));
        assert_eq!(image.pixels().get_pixel(2, 1), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load(Path::new("/nonexistent/stillbg/background.png")).unwrap_err();
        assert!(matches!(err, ImageError::Io { .. }));
    }

    #[test]
    fn garbage_is_decode_error() {
        let path = temp_path("garbage.png");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let err = load(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(err, ImageError::Decode { .. }));
    }

    #[test]
    fn debug_omits_pixel_data() {
        let image = SourceImage::new(RgbaImage::new(2, 3)).unwrap();
        assert_eq!(format!("{image:?}"), "SourceImage { width: 2, height: 3, .. }");
    }
}
