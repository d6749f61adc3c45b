// SPDX-License-Identifier: MPL-2.0

use crate::{
    colored,
    draw::Canvas,
    engine::StillBgLayer,
    geometry,
    img_source::{self, ImageError, SourceImage},
};
use stillbg_config::{Color, Entry, FilterMethod, ScalingMode, Source};

/// A surface the render loop can paint into.
pub trait RenderTarget {
    /// Buffer size in physical pixels (logical size times the output scale).
    ///
    /// `None` while the surface is not ready to be painted.
    fn physical_size(&self) -> Option<(u32, u32)>;

    fn needs_redraw(&self) -> bool;

    /// Hands a canvas of [`Self::physical_size`] to `paint`, then commits it.
    fn present(
        &mut self,
        paint: &mut dyn FnMut(&mut Canvas<'_>) -> eyre::Result<()>,
    ) -> eyre::Result<()>;
}

/// What gets painted, decoded once and shared by every layer.
#[derive(Debug)]
pub enum Backdrop {
    Color(Color),
    Image {
        image: SourceImage,
        scaling_mode: ScalingMode,
        filter_method: FilterMethod,
    },
}

impl Backdrop {
    pub fn load(entry: &Entry) -> Result<Self, ImageError> {
        Ok(match &entry.source {
            Source::Color(color) => Backdrop::Color(*color),
            Source::Path(path) => Backdrop::Image {
                image: img_source::load(path)?,
                scaling_mode: entry.scaling_mode,
                filter_method: entry.filter_method,
            },
        })
    }

    /// Paints the backdrop onto a canvas, placing images for the canvas' own size.
    pub fn paint(&self, canvas: &mut Canvas<'_>) -> eyre::Result<()> {
        match self {
            Backdrop::Color(color) => {
                colored::fill(canvas, *color);
                Ok(())
            }
            Backdrop::Image {
                image,
                scaling_mode,
                filter_method,
            } => {
                let geometry = geometry::resolve(*scaling_mode, image.size(), canvas.size());
                tracing::debug!(
                    mode = scaling_mode.as_str(),
                    target = ?canvas.size(),
                    ?geometry,
                    "painting background image"
                );
                canvas.paint(image, geometry, *filter_method)
            }
        }
    }
}

#[derive(Debug)]
pub struct Wallpaper<L = StillBgLayer> {
    pub entry: Entry,
    pub layers: Vec<L>,
    backdrop: Backdrop,
}

impl<L: RenderTarget> Wallpaper<L> {
    pub fn new(entry: Entry, backdrop: Backdrop) -> Self {
        Self {
            entry,
            layers: Vec::new(),
            backdrop,
        }
    }

    /// Decodes the entry's image, if any, before any surface exists.
    pub fn load(entry: Entry) -> Result<Self, ImageError> {
        let backdrop = Backdrop::load(&entry)?;
        Ok(Self::new(entry, backdrop))
    }

    #[inline]
    pub fn backdrop(&self) -> &Backdrop {
        &self.backdrop
    }

    /// Renders every layer that needs a redraw and is ready for it.
    pub fn draw(&mut self) {
        for layer in self.layers.iter_mut().filter(|l| l.needs_redraw()) {
            render(&self.backdrop, layer);
        }
    }

    /// Renders one layer regardless of its redraw state.
    pub fn draw_layer(&mut self, index: usize) {
        if let Some(layer) = self.layers.get_mut(index) {
            render(&self.backdrop, layer);
        }
    }
}

fn render<L: RenderTarget>(backdrop: &Backdrop, layer: &mut L) {
    // Not configured yet; the next configure triggers another pass.
    if layer.physical_size().is_none() {
        return;
    }

    if let Err(err) = layer.present(&mut |canvas: &mut Canvas<'_>| backdrop.paint(canvas)) {
        tracing::error!(?err, "failed to draw background");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use stillbg_config::OutputSelector;

    /// In-memory surface with the same readiness rules as a layer surface.
    #[derive(Debug, Default)]
    struct MemoryLayer {
        logical: Option<(u32, u32)>,
        scale: u32,
        buffer: Vec<u8>,
        needs_redraw: bool,
        presents: usize,
    }

    impl MemoryLayer {
        fn configured(width: u32, height: u32, scale: u32) -> Self {
            Self {
                logical: Some((width, height)),
                scale,
                needs_redraw: true,
                ..Self::default()
            }
        }

        fn pixel(&self, x: u32, y: u32) -> u32 {
            let (width, _) = self.physical_size().unwrap();
            let i = (y * width + x) as usize * 4;
            u32::from_be_bytes([0, self.buffer[i + 2], self.buffer[i + 1], self.buffer[i]])
        }
    }

    impl RenderTarget for MemoryLayer {
        fn physical_size(&self) -> Option<(u32, u32)> {
            self.logical.map(|(w, h)| (w * self.scale, h * self.scale))
        }

        fn needs_redraw(&self) -> bool {
            self.needs_redraw
        }

        fn present(
            &mut self,
            paint: &mut dyn FnMut(&mut Canvas<'_>) -> eyre::Result<()>,
        ) -> eyre::Result<()> {
            let (width, height) = self.physical_size().unwrap();
            self.buffer.resize(width as usize * height as usize * 4, 0);
            paint(&mut Canvas::new(&mut self.buffer, width, height))?;
            self.needs_redraw = false;
            self.presents += 1;
            Ok(())
        }
    }

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn halves_wallpaper(mode: ScalingMode) -> Wallpaper<MemoryLayer> {
        let image = RgbaImage::from_fn(2, 1, |x, _| if x == 0 { RED } else { BLUE });
        Wallpaper::new(
            Entry::new(OutputSelector::All, Source::Path("halves.png".into()))
                .scaling_mode(mode)
                .filter_method(FilterMethod::Nearest),
            Backdrop::Image {
                image: SourceImage::new(image).unwrap(),
                scaling_mode: mode,
                filter_method: FilterMethod::Nearest,
            },
        )
    }

    #[test]
    fn outputs_with_different_scales_get_their_own_geometry() {
        let mut wallpaper = halves_wallpaper(ScalingMode::Stretch);
        wallpaper.layers.push(MemoryLayer::configured(8, 4, 1));
        wallpaper.layers.push(MemoryLayer::configured(8, 4, 2));

        wallpaper.draw();

        let [low, high] = &wallpaper.layers[..] else {
            panic!("expected two layers");
        };
        assert_eq!(low.buffer.len(), 8 * 4 * 4);
        assert_eq!(high.buffer.len(), 16 * 8 * 4);

        // The red/blue boundary sits at half of each output's pixel width.
        assert_eq!(low.pixel(3, 3), 0xff0000);
        assert_eq!(low.pixel(4, 0), 0x0000ff);
        assert_eq!(high.pixel(7, 7), 0xff0000);
        assert_eq!(high.pixel(8, 0), 0x0000ff);
        assert_eq!(high.pixel(15, 7), 0x0000ff);
    }

    #[test]
    fn unconfigured_layers_are_skipped() {
        let mut wallpaper = halves_wallpaper(ScalingMode::Fill);
        wallpaper.layers.push(MemoryLayer {
            needs_redraw: true,
            scale: 1,
            ..MemoryLayer::default()
        });
        wallpaper.layers.push(MemoryLayer::configured(4, 4, 1));

        wallpaper.draw();

        assert_eq!(wallpaper.layers[0].presents, 0);
        assert!(wallpaper.layers[0].needs_redraw);
        assert_eq!(wallpaper.layers[1].presents, 1);
    }

    #[test]
    fn draw_only_touches_layers_needing_redraw() {
        let mut wallpaper = halves_wallpaper(ScalingMode::Center);
        wallpaper.layers.push(MemoryLayer::configured(4, 4, 1));
        wallpaper.layers.push(MemoryLayer::configured(6, 2, 1));

        wallpaper.draw();
        let untouched = wallpaper.layers[1].buffer.clone();

        wallpaper.layers[0].needs_redraw = true;
        wallpaper.draw();

        assert_eq!(wallpaper.layers[0].presents, 2);
        assert_eq!(wallpaper.layers[1].presents, 1);
        assert_eq!(wallpaper.layers[1].buffer, untouched);
    }

    #[test]
    fn draw_layer_is_idempotent() {
        let mut wallpaper = halves_wallpaper(ScalingMode::Fit);
        wallpaper.layers.push(MemoryLayer::configured(5, 9, 2));

        wallpaper.draw_layer(0);
        let first = wallpaper.layers[0].buffer.clone();
        wallpaper.draw_layer(0);

        assert_eq!(wallpaper.layers[0].presents, 2);
        assert_eq!(wallpaper.layers[0].buffer, first);
        // Out of range is ignored.
        wallpaper.draw_layer(3);
    }

    #[test]
    fn solid_color_fills_every_layer() {
        let color: Color = "#ff00aa".parse().unwrap();
        let mut wallpaper: Wallpaper<MemoryLayer> = Wallpaper::new(
            Entry::new(OutputSelector::All, Source::Color(color)),
            Backdrop::Color(color),
        );
        wallpaper.layers.push(MemoryLayer::configured(3, 3, 1));
        wallpaper.layers.push(MemoryLayer::configured(2, 5, 3));

        wallpaper.draw();

        for layer in &wallpaper.layers {
            let (width, height) = layer.physical_size().unwrap();
            for y in 0..height {
                for x in 0..width {
                    assert_eq!(layer.pixel(x, y), 0xff00aa);
                }
            }
        }
    }

    #[test]
    fn load_keeps_color_without_touching_disk() {
        let entry = Entry::from_args(
            OutputSelector::Index(0),
            "#102030",
            stillbg_config::Mode::SolidColor,
        )
        .unwrap();
        let wallpaper: Wallpaper<MemoryLayer> = Wallpaper::load(entry).unwrap();
        assert!(matches!(wallpaper.backdrop(), Backdrop::Color(c) if c.rgb() == 0x102030));
    }

    #[test]
    fn load_fails_for_missing_image() {
        let entry = Entry::new(
            OutputSelector::Index(0),
            Source::Path("/nonexistent/stillbg.png".into()),
        );
        assert!(Wallpaper::<MemoryLayer>::load(entry).is_err());
    }
}
