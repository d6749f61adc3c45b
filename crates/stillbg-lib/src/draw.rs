// SPDX-License-Identifier: MPL-2.0

//! Painting into an output's `Xrgb8888` shared memory buffer.

use crate::{geometry::Geometry, img_source::SourceImage, scaler};
use image::RgbaImage;
use stillbg_config::{Color, FilterMethod};

const BYTES_PER_PIXEL: usize = 4;

/// A borrowed `Xrgb8888` pixel buffer for one output.
///
/// A canvas carries no transform state; every paint starts from the identity.
pub struct Canvas<'a> {
    data: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    /// # Panics
    ///
    /// Panics if `data` is smaller than `width * height` pixels.
    pub fn new(data: &'a mut [u8], width: u32, height: u32) -> Self {
        assert!(data.len() >= width as usize * height as usize * BYTES_PER_PIXEL);
        Self {
            data,
            width,
            height,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Color of the pixel at `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        let i = self.offset(x, y);
        let [b, g, r] = [self.data[i], self.data[i + 1], self.data[i + 2]];
        Color::from_rgb(u32::from_be_bytes([0, r, g, b]))
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.stride() + x as usize * BYTES_PER_PIXEL
    }

    /// Sets every pixel to `color`.
    pub fn clear(&mut self, color: Color) {
        let pixel = xrgb8888(color);
        let len = self.height as usize * self.stride();
        for chunk in self.data[..len].chunks_exact_mut(BYTES_PER_PIXEL) {
            chunk.copy_from_slice(&pixel);
        }
    }

    /// Paints `image` placed by `geometry` over an opaque black background.
    pub fn paint(
        &mut self,
        image: &SourceImage,
        geometry: Geometry,
        filter: FilterMethod,
    ) -> eyre::Result<()> {
        self.clear(Color::from_rgb(0));

        let Some(dest) = geometry.destination(image.size()) else {
            self.tile(image.pixels());
            return Ok(());
        };

        // Rounding is monotonic, so a destination covering the canvas still
        // covers it and one inside the canvas stays inside.
        let (left, top, right, bottom) = (
            dest.0.round() as i64,
            dest.1.round() as i64,
            dest.2.round() as i64,
            dest.3.round() as i64,
        );
        let (dest_width, dest_height) = (right - left, bottom - top);
        if dest_width <= 0 || dest_height <= 0 {
            return Ok(());
        }

        if (dest_width, dest_height) == (i64::from(image.width()), i64::from(image.height())) {
            self.blit(image.pixels(), left, top);
            return Ok(());
        }

        // Only the visible part of the destination is resampled.
        let visible_left = left.max(0);
        let visible_top = top.max(0);
        let visible_right = right.min(i64::from(self.width));
        let visible_bottom = bottom.min(i64::from(self.height));
        if visible_left >= visible_right || visible_top >= visible_bottom {
            return Ok(());
        }

        let (crop_left, crop_width) =
            source_span(left, (visible_left, visible_right), dest_width, image.width());
        let (crop_top, crop_height) =
            source_span(top, (visible_top, visible_bottom), dest_height, image.height());
        let crop = (crop_left, crop_top, crop_width, crop_height);

        let scaled = scaler::resize(
            image.pixels(),
            crop,
            (visible_right - visible_left) as u32,
            (visible_bottom - visible_top) as u32,
            filter,
        )?;

        self.blit(&scaled, visible_left, visible_top);
        Ok(())
    }

    /// Repeats `image` from the origin across the whole canvas.
    pub fn tile(&mut self, image: &RgbaImage) {
        let (tile_width, tile_height) = image.dimensions();
        if tile_width == 0 || tile_height == 0 {
            return;
        }

        for y in (0..self.height).step_by(tile_height as usize) {
            for x in (0..self.width).step_by(tile_width as usize) {
                self.blit(image, i64::from(x), i64::from(y));
            }
        }
    }

    /// Composites `image` with its top-left corner at `(x, y)`, clipping to the canvas.
    pub fn blit(&mut self, image: &RgbaImage, x: i64, y: i64) {
        let x_start = x.max(0);
        let y_start = y.max(0);
        let x_end = (x + i64::from(image.width())).min(i64::from(self.width));
        let y_end = (y + i64::from(image.height())).min(i64::from(self.height));

        for dy in y_start..y_end {
            for dx in x_start..x_end {
                let src = image.get_pixel((dx - x) as u32, (dy - y) as u32).0;
                let i = self.offset(dx as u32, dy as u32);
                let dst = &mut self.data[i..i + BYTES_PER_PIXEL];
                blend(dst, src);
            }
        }
    }
}

/// Source pixels `(start, length)` behind the `visible` part of a destination
/// span starting at `dest_start` and `dest_len` pixels long, for a source axis of
/// `src_len` pixels.
///
/// `start + length` never exceeds `src_len`, even where the scale factor does not
/// divide evenly.
fn source_span(dest_start: i64, visible: (i64, i64), dest_len: i64, src_len: u32) -> (f64, f64) {
    let src_len = f64::from(src_len);
    let per_pixel = src_len / dest_len as f64;
    let start = ((visible.0 - dest_start) as f64 * per_pixel).min(src_len);
    let end = ((visible.1 - dest_start) as f64 * per_pixel).min(src_len);

    let mut len = end - start;
    while len > 0.0 && start + len > src_len {
        len = f64::from_bits(len.to_bits() - 1);
    }
    (start, len)
}

/// Source-over of an RGBA pixel onto an opaque `Xrgb8888` pixel.
#[inline]
fn blend(dst: &mut [u8], [r, g, b, a]: [u8; 4]) {
    match a {
        0 => {}
        255 => dst.copy_from_slice(&[b, g, r, 0xff]),
        a => {
            let mix = |s: u8, d: u8| {
                ((u32::from(s) * u32::from(a) + u32::from(d) * (255 - u32::from(a)) + 127) / 255) as u8
            };
            let blended = [mix(b, dst[0]), mix(g, dst[1]), mix(r, dst[2]), 0xff];
            dst.copy_from_slice(&blended);
        }
    }
}

/// Little-endian `Xrgb8888` bytes of `color`.
#[inline]
pub fn xrgb8888(color: Color) -> [u8; 4] {
    [color.blue(), color.green(), color.red(), 0xff]
}
