// SPDX-License-Identifier: MPL-2.0

//! Flat color backgrounds.

use crate::draw::Canvas;
use stillbg_config::Color;

/// Fills the whole canvas with `color`.
pub fn fill(canvas: &mut Canvas<'_>, color: Color) {
    tracing::trace!(%color, width = canvas.width(), height = canvas.height(), "filling solid color");
    canvas.clear(color);
}
