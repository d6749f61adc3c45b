// SPDX-License-Identifier: MPL-2.0

use std::{fmt, str::FromStr};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ColorError {
    #[error("{0} is not a valid color, expected #rrggbb (no alpha)")]
    InvalidLength(String),
    #[error("{0} is missing the leading '#', expected #rrggbb")]
    MissingHash(String),
    #[error("{0} contains a non-hexadecimal digit")]
    InvalidDigit(String),
}

/// A 24-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(u32);

impl Color {
    #[must_use]
    pub const fn from_rgb(rgb: u32) -> Self {
        Self(rgb & 0x00ff_ffff)
    }

    #[inline]
    pub const fn rgb(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[inline]
    pub const fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[inline]
    pub const fn blue(self) -> u8 {
        self.0 as u8
    }
}

impl FromStr for Color {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 7 {
            return Err(ColorError::InvalidLength(s.to_owned()));
        }

        let Some(digits) = s.strip_prefix('#') else {
            return Err(ColorError::MissingHash(s.to_owned()));
        };

        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ColorError::InvalidDigit(s.to_owned()));
        }

        u32::from_str_radix(digits, 16)
            .map(Color)
            .map_err(|_| ColorError::InvalidDigit(s.to_owned()))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}
