use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResizeError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
    #[error("No pages to export")]
    NoPages,
    #[error("Page {index} is out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },
    #[error("Unsupported source: not a PDF or a decodable image")]
    UnsupportedSource,
    #[error("More than one task resolves to {}", .0.display())]
    DuplicateOutput(PathBuf),
    #[error("Render error: {0}")]
    Render(String),
    #[error("Flatten error: {0}")]
    Flatten(String),
}

pub type Result<T> = std::result::Result<T, ResizeError>;

/// Output file format of an export task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OutputFormat {
    /// Vector output, one PDF document per task
    Pdf,
    /// Raster output, one PNG file per page
    Png,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Png => "png",
        }
    }

    /// Whether every exported page becomes its own file
    pub fn is_per_page(self) -> bool {
        matches!(self, OutputFormat::Png)
    }
}

/// One axis of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    Width,
    Height,
}

impl Axis {
    pub fn other(self) -> Axis {
        match self {
            Axis::Width => Axis::Height,
            Axis::Height => Axis::Width,
        }
    }
}

/// Whether the margin is carved out of the stated target size or added around it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PaddingPolicy {
    /// Canvas equals the target; content shrinks to leave a background border
    Inside,
    /// Canvas grows by twice the margin; content keeps the full target size
    #[default]
    Outside,
}

/// Background colour painted into padding bands and letterbox areas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
    };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `rrggbb`
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Components scaled to 0.0..=1.0, as PDF colour operators expect
    pub fn unit_components(self) -> (f64, f64, f64) {
        (
            self.r as f64 / 255.0,
            self.g as f64 / 255.0,
            self.b as f64 / 255.0,
        )
    }
}
