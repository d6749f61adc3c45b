// SPDX-License-Identifier: MPL-2.0

//! Typed configuration for a single stillbg invocation.

use derive_setters::Setters;
use std::{fmt, path::PathBuf, str::FromStr};

mod color;

pub use color::{Color, ColorError};

/// Token selecting solid color mode instead of an image scaling mode.
pub const SOLID_COLOR: &str = "solid_color";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid color: {0}")]
    Color(#[from] ColorError),
    #[error("unsupported scaling mode: {0}")]
    UnknownMode(String),
    #[error("unsupported filter method: {0}")]
    UnknownFilter(String),
    #[error("{0} is not an output index")]
    InvalidOutput(String),
}

/// Which outputs receive the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSelector {
    All,
    /// Position of the output in discovery order.
    Index(usize),
}

impl OutputSelector {
    #[must_use]
    pub fn matches(self, index: usize) -> bool {
        match self {
            OutputSelector::All => true,
            OutputSelector::Index(i) => i == index,
        }
    }
}

impl FromStr for OutputSelector {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "*" | "all" => Ok(OutputSelector::All),
            _ => s
                .parse::<usize>()
                .map(OutputSelector::Index)
                .map_err(|_| ConfigError::InvalidOutput(s.to_owned())),
        }
    }
}

impl fmt::Display for OutputSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputSelector::All => f.write_str("all"),
            OutputSelector::Index(i) => write!(f, "{i}"),
        }
    }
}

/// How an image is mapped onto an output.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ScalingMode {
    /// Scale both axes independently to the output size.
    #[default]
    Stretch,
    /// Keep aspect ratio and cover the output, cropping overflow.
    Fill,
    /// Keep aspect ratio and show the whole image, leaving bars.
    Fit,
    /// Draw unscaled in the middle of the output.
    Center,
    /// Repeat unscaled from the top-left corner.
    Tile,
}

impl ScalingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalingMode::Stretch => "stretch",
            ScalingMode::Fill => "fill",
            ScalingMode::Fit => "fit",
            ScalingMode::Center => "center",
            ScalingMode::Tile => "tile",
        }
    }
}

impl FromStr for ScalingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stretch" => Ok(ScalingMode::Stretch),
            "fill" => Ok(ScalingMode::Fill),
            "fit" => Ok(ScalingMode::Fit),
            "center" => Ok(ScalingMode::Center),
            "tile" => Ok(ScalingMode::Tile),
            _ => Err(ConfigError::UnknownMode(s.to_owned())),
        }
    }
}

/// The third command argument: a flat color or one of the image scaling modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    SolidColor,
    Scaled(ScalingMode),
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == SOLID_COLOR {
            return Ok(Mode::SolidColor);
        }

        s.parse().map(Mode::Scaled)
    }
}

/// Resampling filter used when an image is scaled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FilterMethod {
    Nearest,
    Linear,
    #[default]
    Lanczos,
}

impl FromStr for FilterMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nearest" => Ok(FilterMethod::Nearest),
            "linear" => Ok(FilterMethod::Linear),
            "lanczos" => Ok(FilterMethod::Lanczos),
            _ => Err(ConfigError::UnknownFilter(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Path(PathBuf),
    Color(Color),
}

/// A background assignment for one or all outputs.
#[derive(Debug, Clone, PartialEq, Eq, Setters)]
#[must_use]
pub struct Entry {
    pub output: OutputSelector,
    pub source: Source,
    /// Ignored for [`Source::Color`].
    pub scaling_mode: ScalingMode,
    pub filter_method: FilterMethod,
}

impl Entry {
    pub fn new(output: OutputSelector, source: Source) -> Self {
        Self {
            output,
            source,
            scaling_mode: ScalingMode::default(),
            filter_method: FilterMethod::default(),
        }
    }

    /// Builds an entry from the positional `<output> <image-or-color> <mode>` triple.
    pub fn from_args(output: OutputSelector, source: &str, mode: Mode) -> Result<Self, ConfigError> {
        let entry = match mode {
            Mode::SolidColor => Entry::new(output, Source::Color(source.parse()?)),
            Mode::Scaled(scaling_mode) => {
                Entry::new(output, Source::Path(PathBuf::from(source))).scaling_mode(scaling_mode)
            }
        };

        tracing::debug!(?entry, "parsed background entry");
        Ok(entry)
    }
}
