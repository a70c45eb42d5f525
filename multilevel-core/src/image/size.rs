use std::{fmt, str::FromStr};

use crate::error::Error;

/// Output dimensions in pixels, written as `<width>x<height>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const SQUARE_1024: ImageSize = ImageSize { width: 1024, height: 1024 };
}

impl Default for ImageSize {
    fn default() -> Self {
        Self::SQUARE_1024
    }
}

impl FromStr for ImageSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            Error::Validation(format!(
                "size must look like <width>x<height> with positive integers, got '{s}'"
            ))
        };

        let (w, h) = s.trim().split_once('x').ok_or_else(invalid)?;
        let width: u32 = w.parse().map_err(|_| invalid())?;
        let height: u32 = h.parse().map_err(|_| invalid())?;

        if width == 0 || height == 0 {
            return Err(invalid());
        }

        Ok(Self { width, height })
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_width_by_height() {
        assert_eq!("512x512".parse::<ImageSize>().unwrap(), ImageSize { width: 512, height: 512 });
        assert_eq!(
            "1024x1792".parse::<ImageSize>().unwrap(),
            ImageSize { width: 1024, height: 1792 }
        );
        assert_eq!(" 256x128 ".parse::<ImageSize>().unwrap().to_string(), "256x128");
    }

    #[test]
    fn rejects_malformed_sizes() {
        for bad in ["abc", "", "512", "512x", "x512", "0x512", "512x0", "-1x5", "12.5x3", "5x5x5", "1024X1024"] {
            let err = bad.parse::<ImageSize>().unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{bad:?} should be rejected");
        }
    }
}
