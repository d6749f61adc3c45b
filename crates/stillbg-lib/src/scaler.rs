// SPDX-License-Identifier: MPL-2.0

//! Image resampling backed by `fast_image_resize`.

use eyre::Context;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use image::RgbaImage;
use stillbg_config::FilterMethod;

fn resize_alg(filter: FilterMethod) -> ResizeAlg {
    match filter {
        FilterMethod::Nearest => ResizeAlg::Nearest,
        FilterMethod::Linear => ResizeAlg::Convolution(FilterType::Bilinear),
        FilterMethod::Lanczos => ResizeAlg::Convolution(FilterType::Lanczos3),
    }
}

/// Resamples the `crop` region `(left, top, width, height)` of `image`, given in
/// source pixels, to a `width` x `height` image.
pub fn resize(
    image: &RgbaImage,
    crop: (f64, f64, f64, f64),
    width: u32,
    height: u32,
    filter: FilterMethod,
) -> eyre::Result<RgbaImage> {
    let src = ImageRef::new(image.width(), image.height(), image.as_raw(), PixelType::U8x4)
        .wrap_err("invalid source image buffer")?;
    let mut dst = Image::new(width, height, PixelType::U8x4);

    let (left, top, crop_width, crop_height) = crop;
    let options = ResizeOptions::new()
        .resize_alg(resize_alg(filter))
        .crop(left, top, crop_width, crop_height);

    Resizer::new()
        .resize(&src, &mut dst, &options)
        .wrap_err("failed to resize image")?;

    RgbaImage::from_raw(width, height, dst.into_vec())
        .ok_or_else(|| eyre::eyre!("resized buffer does not match {width}x{height}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn halves() -> RgbaImage {
        RgbaImage::from_fn(2, 1, |x, _| if x == 0 { RED } else { BLUE })
    }

    #[test]
    fn nearest_upscale_keeps_halves() {
        let scaled = resize(&halves(), (0.0, 0.0, 2.0, 1.0), 8, 4, FilterMethod::Nearest).unwrap();

        assert_eq!(scaled.dimensions(), (8, 4));
        for (x, _, pixel) in scaled.enumerate_pixels() {
            assert_eq!(*pixel, if x < 4 { RED } else { BLUE }, "pixel at x={x}");
        }
    }

    #[test]
    fn crop_selects_source_region() {
        let scaled = resize(&halves(), (1.0, 0.0, 1.0, 1.0), 3, 3, FilterMethod::Nearest).unwrap();
        assert!(scaled.pixels().all(|p| *p == BLUE));
    }

    #[test]
    fn lanczos_produces_requested_size() {
        let image = RgbaImage::from_pixel(16, 9, RED);
        let scaled = resize(&image, (0.0, 0.0, 16.0, 9.0), 64, 36, FilterMethod::Lanczos).unwrap();
        assert_eq!(scaled.dimensions(), (64, 36));
    }
}
