//! Output formats understood by the renderer adapter.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Image format requested for every view of one export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Svg,
    Pdf,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 3] = [ImageFormat::Png, ImageFormat::Svg, ImageFormat::Pdf];

    /// File extension used for archive entries, without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
            ImageFormat::Pdf => "pdf",
        }
    }

    /// Whether the payload is already compressed, in which case deflating it
    /// again only costs CPU.
    pub fn is_precompressed(self) -> bool {
        matches!(self, ImageFormat::Png | ImageFormat::Pdf)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported image format `{0}` (expected one of: png, svg, pdf)")]
pub struct UnsupportedFormat(pub String);

impl FromStr for ImageFormat {
    type Err = UnsupportedFormat;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        ImageFormat::ALL
            .into_iter()
            .find(|format| format.extension() == normalized)
            .ok_or_else(|| UnsupportedFormat(value.to_string()))
    }
}
