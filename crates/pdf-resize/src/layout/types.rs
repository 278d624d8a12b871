//! Layout data types
//!
//! These types describe what the user asked for (`SizeSpec`), what the source
//! page looks like (`SourceGeometry`) and the concrete canvas the engine
//! derives from the two (`OutputGeometry`).

use crate::types::{Axis, OutputFormat, PaddingPolicy};

/// A rectangular area, origin at the top-left corner of the canvas, y growing down
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge x coordinate
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge y coordinate
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Overlapping area of two rectangles, `None` when they do not overlap
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let overlap = Rect::new(
            x,
            y,
            self.right().min(other.right()) - x,
            self.bottom().min(other.bottom()) - y,
        );
        (!overlap.is_empty()).then_some(overlap)
    }
}

/// Sizing policy for vector (PDF) outputs, in millimetres
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum VectorMode {
    /// Exact canvas; content covers it and the overflowing axis is cropped
    Fill { width: f64, height: f64 },
    /// One axis is set, the other follows the source aspect ratio
    Fit { locked: Axis, length: f64 },
    /// Both axes are the source axes times one factor
    Scale { factor: f64 },
}

/// Which raster field is authoritative in aspect-preserving raster sizing
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PpiLock {
    /// Pixel width is set; height and resolution follow
    Width(f64),
    /// Pixel height is set; width and resolution follow
    Height(f64),
    /// Resolution is set; both pixel dimensions follow
    Ppi(f64),
}

/// Sizing policy for raster (PNG) outputs, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RasterMode {
    /// Exact pixel canvas; content covers it and the overflowing axis is cropped
    Fill { width: f64, height: f64 },
    /// Aspect-preserving size driven by one locked field
    Scale(PpiLock),
}

/// The authoritative sizing input of one output definition
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SizeMode {
    Vector(VectorMode),
    Raster(RasterMode),
}

impl SizeMode {
    pub fn output_format(&self) -> OutputFormat {
        match self {
            SizeMode::Vector(_) => OutputFormat::Pdf,
            SizeMode::Raster(_) => OutputFormat::Png,
        }
    }

    pub fn unit(&self) -> GeometryUnit {
        match self {
            SizeMode::Vector(_) => GeometryUnit::Mm,
            SizeMode::Raster(_) => GeometryUnit::Px,
        }
    }

    /// Whether the content may be cropped to fill the canvas
    pub fn is_fill(&self) -> bool {
        matches!(
            self,
            SizeMode::Vector(VectorMode::Fill { .. }) | SizeMode::Raster(RasterMode::Fill { .. })
        )
    }
}

/// One desired output definition
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SizeSpec {
    pub mode: SizeMode,
    /// Margin in the output unit (mm for PDF, px for PNG)
    #[cfg_attr(feature = "serde", serde(default))]
    pub margin: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub padding: PaddingPolicy,
    /// Optional display name, not used for layout
    #[cfg_attr(feature = "serde", serde(default))]
    pub label: Option<String>,
}

impl SizeSpec {
    pub fn new(mode: SizeMode) -> Self {
        Self {
            mode,
            margin: 0.0,
            padding: PaddingPolicy::default(),
            label: None,
        }
    }

    /// PDF canvas of exactly `width` x `height` mm, cropping the source to cover it
    pub fn pdf_fill(width: f64, height: f64) -> Self {
        Self::new(SizeMode::Vector(VectorMode::Fill { width, height }))
    }

    /// PDF with the width set and the height derived from the source
    pub fn pdf_width(width: f64) -> Self {
        Self::new(SizeMode::Vector(VectorMode::Fit {
            locked: Axis::Width,
            length: width,
        }))
    }

    /// PDF with the height set and the width derived from the source
    pub fn pdf_height(height: f64) -> Self {
        Self::new(SizeMode::Vector(VectorMode::Fit {
            locked: Axis::Height,
            length: height,
        }))
    }

    pub fn pdf_scale(factor: f64) -> Self {
        Self::new(SizeMode::Vector(VectorMode::Scale { factor }))
    }

    pub fn png_fill(width: f64, height: f64) -> Self {
        Self::new(SizeMode::Raster(RasterMode::Fill { width, height }))
    }

    pub fn png_width(width: f64) -> Self {
        Self::new(SizeMode::Raster(RasterMode::Scale(PpiLock::Width(width))))
    }

    pub fn png_height(height: f64) -> Self {
        Self::new(SizeMode::Raster(RasterMode::Scale(PpiLock::Height(height))))
    }

    pub fn png_ppi(ppi: f64) -> Self {
        Self::new(SizeMode::Raster(RasterMode::Scale(PpiLock::Ppi(ppi))))
    }

    pub fn with_margin(mut self, margin: f64, padding: PaddingPolicy) -> Self {
        self.margin = margin;
        self.padding = padding;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn output_format(&self) -> OutputFormat {
        self.mode.output_format()
    }
}

/// One page or image being processed, in millimetres
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceGeometry {
    /// Width after trim
    pub width: f64,
    /// Height after trim
    pub height: f64,
    /// 0-based page index; raster sources always use 0
    pub page_index: usize,
    /// Amount removed from every edge of the untrimmed page
    pub trim: f64,
}

impl SourceGeometry {
    /// Zero or negative dimensions are replaced by 1mm
    pub fn new(width: f64, height: f64, page_index: usize) -> Self {
        Self {
            width: at_least_one(width),
            height: at_least_one(height),
            page_index,
            trim: 0.0,
        }
    }

    /// Remove `trim` from every edge. The trimmed size never drops below 1mm.
    pub fn with_trim(self, trim: f64) -> Self {
        let full_width = self.full_width();
        let full_height = self.full_height();
        let max_trim = ((full_width.min(full_height) - 1.0) / 2.0).max(0.0);
        let trim = if trim.is_finite() {
            trim.clamp(0.0, max_trim)
        } else {
            0.0
        };
        Self {
            width: at_least_one(full_width - 2.0 * trim),
            height: at_least_one(full_height - 2.0 * trim),
            page_index: self.page_index,
            trim,
        }
    }

    /// Width before trim
    pub fn full_width(&self) -> f64 {
        self.width + 2.0 * self.trim
    }

    /// Height before trim
    pub fn full_height(&self) -> f64 {
        self.height + 2.0 * self.trim
    }

    pub fn dimension(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Width => self.width,
            Axis::Height => self.height,
        }
    }
}

fn at_least_one(value: f64) -> f64 {
    if value.is_finite() && value >= 1.0 {
        value
    } else {
        1.0
    }
}

/// Smallest and largest permitted canvas dimension for one output unit
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DimensionBounds {
    pub min: f64,
    pub max: f64,
}

impl DimensionBounds {
    /// Clamp a dimension into bounds; NaN becomes the minimum
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            self.min
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

/// Format-specific absolute size limits
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayoutLimits {
    /// Millimetre bounds for PDF pages
    pub vector: DimensionBounds,
    /// Pixel bounds for PNG canvases
    pub raster: DimensionBounds,
}

impl Default for LayoutLimits {
    fn default() -> Self {
        Self {
            // 14400pt is the largest page most PDF consumers accept
            vector: DimensionBounds {
                min: 1.0,
                max: 5080.0,
            },
            raster: DimensionBounds {
                min: 1.0,
                max: 16384.0,
            },
        }
    }
}

impl LayoutLimits {
    pub fn for_format(&self, format: OutputFormat) -> DimensionBounds {
        match format {
            OutputFormat::Pdf => self.vector,
            OutputFormat::Png => self.raster,
        }
    }

    pub fn is_valid(&self) -> bool {
        [self.vector, self.raster]
            .iter()
            .all(|b| b.min.is_finite() && b.max.is_finite() && b.min > 0.0 && b.min <= b.max)
    }
}

/// Unit of an `OutputGeometry`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryUnit {
    Mm,
    Px,
}

impl GeometryUnit {
    pub fn name(self) -> &'static str {
        match self {
            GeometryUnit::Mm => "mm",
            GeometryUnit::Px => "px",
        }
    }
}

/// Target size before padding, with the derived editing fields
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedSize {
    /// Target width in the output unit
    pub width: f64,
    /// Target height in the output unit
    pub height: f64,
    /// Output units per source millimetre for aspect-preserving modes,
    /// the cover scale for fill modes
    pub scale: f64,
    /// Raster resolution, `None` for vector outputs
    pub ppi: Option<f64>,
}

/// Concrete canvas for one (SizeSpec, SourceGeometry) pair
#[derive(Debug, Clone, PartialEq)]
pub struct OutputGeometry {
    pub unit: GeometryUnit,
    /// Final canvas width
    pub page_width: f64,
    /// Final canvas height
    pub page_height: f64,
    /// Placement of the scaled (trimmed) source
    pub content_rect: Rect,
    /// Area the content may paint into; content outside it is cropped
    pub clip_rect: Rect,
    /// Output units per source millimetre
    pub content_scale: f64,
    /// Bands painted with the background colour (inside padding)
    pub mask_regions: Vec<Rect>,
    /// Raster resolution, `None` for vector outputs
    pub ppi: Option<f64>,
}

impl OutputGeometry {
    /// Pixel canvas size; only meaningful for raster geometry
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            crate::units::round_px(self.page_width),
            crate::units::round_px(self.page_height),
        )
    }
}
