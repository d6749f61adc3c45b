// SPDX-License-Identifier: MPL-2.0

//! Placement of a source image on an output for each scaling mode.
//!
//! The transform follows the usual "scale, then translate in image space"
//! convention: a source pixel at `(x, y)` lands at
//! `((x + offset_x) * scale_x, (y + offset_y) * scale_y)` on the target.

use stillbg_config::ScalingMode;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geometry {
    Transform {
        scale_x: f64,
        scale_y: f64,
        offset_x: f64,
        offset_y: f64,
    },
    /// Repeat the unscaled image from the origin.
    Tile,
}

impl Geometry {
    fn uniform(scale: f64, offset_x: f64, offset_y: f64) -> Self {
        Geometry::Transform {
            scale_x: scale,
            scale_y: scale,
            offset_x,
            offset_y,
        }
    }

    /// Target-space rectangle `(left, top, right, bottom)` covered by an image
    /// of the given size, or `None` for [`Geometry::Tile`].
    #[must_use]
    pub fn destination(&self, image: (u32, u32)) -> Option<(f64, f64, f64, f64)> {
        match *self {
            Geometry::Transform {
                scale_x,
                scale_y,
                offset_x,
                offset_y,
            } => Some((
                offset_x * scale_x,
                offset_y * scale_y,
                (offset_x + f64::from(image.0)) * scale_x,
                (offset_y + f64::from(image.1)) * scale_y,
            )),
            Geometry::Tile => None,
        }
    }
}

/// Resolves how an `image` sized image is painted on a `target` sized buffer.
///
/// Both sizes are physical pixels and must be non-zero.
#[must_use]
pub fn resolve(mode: ScalingMode, image: (u32, u32), target: (u32, u32)) -> Geometry {
    let (iw, ih) = (f64::from(image.0), f64::from(image.1));
    let (tw, th) = (f64::from(target.0), f64::from(target.1));

    let window_ratio = tw / th;
    let image_ratio = iw / ih;

    // Scaling to the target width centers vertically and vice versa.
    let match_width = || {
        let scale = tw / iw;
        Geometry::uniform(scale, 0.0, (th / 2.0) / scale - ih / 2.0)
    };
    let match_height = || {
        let scale = th / ih;
        Geometry::uniform(scale, (tw / 2.0) / scale - iw / 2.0, 0.0)
    };

    match mode {
        ScalingMode::Stretch => Geometry::Transform {
            scale_x: tw / iw,
            scale_y: th / ih,
            offset_x: 0.0,
            offset_y: 0.0,
        },
        ScalingMode::Fill => {
            if window_ratio > image_ratio {
                match_width()
            } else {
                match_height()
            }
        }
        ScalingMode::Fit => {
            if window_ratio > image_ratio {
                match_height()
            } else {
                match_width()
            }
        }
        ScalingMode::Center => Geometry::uniform(1.0, tw / 2.0 - iw / 2.0, th / 2.0 - ih / 2.0),
        ScalingMode::Tile => Geometry::Tile,
    }
}
