// SPDX-License-Identifier: MPL-2.0

pub mod colored;
pub mod draw;
pub mod engine;
pub mod geometry;
pub mod img_source;
pub mod scaler;
pub mod wallpaper;

pub use engine::{BackgroundEngine, EngineConfig, StillBg, StillBgLayer};
pub use geometry::Geometry;
pub use img_source::{ImageError, SourceImage};
pub use wallpaper::{Backdrop, RenderTarget, Wallpaper};

#[cfg(test)]
mod tests {
    use super::*;
    use stillbg_config::{Entry, Mode, OutputSelector};

    #[test]
    fn engine_config_carries_entry() {
        let entry = Entry::from_args(OutputSelector::Index(1), "#000000", Mode::SolidColor).unwrap();
        let config = EngineConfig::new(entry.clone());
        assert_eq!(config.entry, entry);
    }
}
