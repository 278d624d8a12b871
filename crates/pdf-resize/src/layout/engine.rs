//! Output geometry computation
//!
//! Turning a size specification into a canvas happens in three steps:
//! 1. Resolve the target size from the authoritative field and the source size
//! 2. Apply the padding policy to get the canvas and the usable area
//! 3. Scale and centre the source within the usable area
//!
//! Every step is a total function: out-of-range inputs are clamped, never rejected.

use crate::types::{Axis, PaddingPolicy};
use crate::units::{MM_PER_INCH, mm_to_px, ppi_for, round_px};

use super::{
    DimensionBounds, GeometryUnit, LayoutLimits, OutputGeometry, PpiLock, RasterMode, Rect,
    ResolvedSize, SizeMode, SizeSpec, SourceGeometry, VectorMode,
};

/// How the source is scaled into the usable area
#[derive(Debug, Clone, Copy, PartialEq)]
enum ScaleRule {
    /// Cover the area, cropping the overflowing axis
    Cover,
    /// Fit inside the area without cropping
    Contain,
    /// A scale fixed by the mode; used as-is when the usable area is the full target
    Exact(f64),
}

/// Compute the canvas, content placement and mask bands for one source page.
pub fn compute_geometry(
    spec: &SizeSpec,
    source: &SourceGeometry,
    limits: &LayoutLimits,
) -> OutputGeometry {
    let bounds = limits.for_format(spec.output_format());
    let (target, rule) = resolve_target(&spec.mode, source, bounds);

    let margin = clamp_margin(spec.margin, &target, spec.padding, bounds);
    let margin = match spec.mode.unit() {
        GeometryUnit::Px => margin.floor(),
        GeometryUnit::Mm => margin,
    };

    let (page_width, page_height, usable) = match spec.padding {
        PaddingPolicy::Outside => (
            target.width + 2.0 * margin,
            target.height + 2.0 * margin,
            Rect::new(margin, margin, target.width, target.height),
        ),
        PaddingPolicy::Inside => (
            target.width,
            target.height,
            Rect::new(
                margin,
                margin,
                (target.width - 2.0 * margin).max(bounds.min),
                (target.height - 2.0 * margin).max(bounds.min),
            ),
        ),
    };

    let inset = spec.padding == PaddingPolicy::Inside && margin > 0.0;
    let content_scale = match rule {
        ScaleRule::Exact(scale) if !inset => scale,
        ScaleRule::Cover => cover_scale(source, usable.width, usable.height),
        ScaleRule::Exact(_) | ScaleRule::Contain => {
            contain_scale(source, usable.width, usable.height)
        }
    };

    let content_width = source.width * content_scale;
    let content_height = source.height * content_scale;
    let content_rect = Rect::new(
        usable.x + (usable.width - content_width) / 2.0,
        usable.y + (usable.height - content_height) / 2.0,
        content_width,
        content_height,
    );

    let mask_regions = if inset {
        padding_bands(page_width, page_height, &usable)
    } else {
        Vec::new()
    };

    OutputGeometry {
        unit: spec.mode.unit(),
        page_width,
        page_height,
        content_rect,
        clip_rect: usable,
        content_scale,
        mask_regions,
        ppi: target.ppi,
    }
}

/// Target size and derived fields, before padding.
pub fn resolve_size(spec: &SizeSpec, source: &SourceGeometry, limits: &LayoutLimits) -> ResolvedSize {
    let bounds = limits.for_format(spec.output_format());
    resolve_target(&spec.mode, source, bounds).0
}

/// Permitted scale-factor range for a source.
///
/// The minimum lets the larger source axis shrink to the minimum dimension and
/// the maximum lets the smaller axis grow to the maximum dimension. The other
/// axis is then kept within bounds by the dimension clamp in `resolve_size`.
pub fn scale_bounds(source: &SourceGeometry, bounds: DimensionBounds) -> (f64, f64) {
    let smaller = source.width.min(source.height);
    let larger = source.width.max(source.height);
    let max = bounds.max / smaller;
    let min = (bounds.min / larger).min(max);
    (min, max)
}

/// Clamp a scale factor into `scale_bounds`; NaN or non-positive factors become the minimum.
pub fn clamp_scale(factor: f64, source: &SourceGeometry, bounds: DimensionBounds) -> f64 {
    let (min, max) = scale_bounds(source, bounds);
    if factor.is_nan() {
        min
    } else {
        factor.clamp(min, max)
    }
}

/// Clamp a margin for a resolved target size.
///
/// Margins never exceed half the smaller target side minus the minimum
/// dimension. Outside padding is further limited so the inflated canvas stays
/// within the maximum dimension.
pub fn clamp_margin(
    margin: f64,
    target: &ResolvedSize,
    padding: PaddingPolicy,
    bounds: DimensionBounds,
) -> f64 {
    let mut max_margin = target.width.min(target.height) / 2.0 - bounds.min;
    if padding == PaddingPolicy::Outside {
        max_margin = max_margin.min((bounds.max - target.width.max(target.height)) / 2.0);
    }
    let max_margin = max_margin.max(0.0);
    if margin.is_nan() {
        0.0
    } else {
        margin.clamp(0.0, max_margin)
    }
}

fn resolve_target(
    mode: &SizeMode,
    source: &SourceGeometry,
    bounds: DimensionBounds,
) -> (ResolvedSize, ScaleRule) {
    match *mode {
        SizeMode::Vector(VectorMode::Fill { width, height }) => {
            let width = bounds.clamp(width);
            let height = bounds.clamp(height);
            let scale = cover_scale(source, width, height);
            (
                ResolvedSize {
                    width,
                    height,
                    scale,
                    ppi: None,
                },
                ScaleRule::Cover,
            )
        }
        SizeMode::Vector(VectorMode::Fit { locked, length }) => {
            let (width, height) = lock_axis(locked, length, source, bounds);
            let scale = match locked {
                Axis::Width => width / source.width,
                Axis::Height => height / source.height,
            };
            (
                ResolvedSize {
                    width,
                    height,
                    scale,
                    ppi: None,
                },
                ScaleRule::Exact(scale),
            )
        }
        SizeMode::Vector(VectorMode::Scale { factor }) => {
            let factor = clamp_scale(factor, source, bounds);
            let width = bounds.clamp(source.width * factor);
            let height = bounds.clamp(source.height * factor);
            // An axis pinned by the bounds letterboxes instead of cropping
            let rule = if width == source.width * factor && height == source.height * factor {
                ScaleRule::Exact(factor)
            } else {
                ScaleRule::Contain
            };
            (
                ResolvedSize {
                    width,
                    height,
                    scale: factor,
                    ppi: None,
                },
                rule,
            )
        }
        SizeMode::Raster(RasterMode::Fill { width, height }) => {
            let width = bounds.clamp(round_px(width) as f64);
            let height = bounds.clamp(round_px(height) as f64);
            let scale = cover_scale(source, width, height);
            (
                ResolvedSize {
                    width,
                    height,
                    scale,
                    ppi: Some(scale * MM_PER_INCH),
                },
                ScaleRule::Cover,
            )
        }
        SizeMode::Raster(RasterMode::Scale(lock)) => {
            let (width, height, ppi) = resolve_ppi_lock(lock, source, bounds);
            (
                ResolvedSize {
                    width,
                    height,
                    scale: contain_scale(source, width, height),
                    ppi: Some(ppi),
                },
                ScaleRule::Contain,
            )
        }
    }
}

/// Set one axis and derive the other from the source aspect ratio.
///
/// The locked length is clamped so that neither axis exceeds the maximum.
fn lock_axis(
    locked: Axis,
    length: f64,
    source: &SourceGeometry,
    bounds: DimensionBounds,
) -> (f64, f64) {
    let locked_source = source.dimension(locked);
    let other_source = source.dimension(locked.other());
    let locked_max = bounds.max.min(bounds.max * locked_source / other_source);
    let length = if length.is_nan() {
        bounds.min
    } else {
        length.clamp(bounds.min.min(locked_max), locked_max)
    };
    // Guards against float noise pushing the derived axis past the limit
    let other = (length * (other_source / locked_source)).min(bounds.max);
    match locked {
        Axis::Width => (length, other),
        Axis::Height => (other, length),
    }
}

/// Pixel dimensions and resolution for an aspect-preserving raster size.
fn resolve_ppi_lock(
    lock: PpiLock,
    source: &SourceGeometry,
    bounds: DimensionBounds,
) -> (f64, f64, f64) {
    let width_in = source.width / MM_PER_INCH;
    let height_in = source.height / MM_PER_INCH;
    match lock {
        PpiLock::Width(px) => {
            let (width, height) = lock_axis(Axis::Width, px, source, bounds);
            let width = round_px(width) as f64;
            let height = bounds.clamp(round_px(height) as f64);
            (width, height, ppi_for(width, source.width))
        }
        PpiLock::Height(px) => {
            let (width, height) = lock_axis(Axis::Height, px, source, bounds);
            let height = round_px(height) as f64;
            let width = bounds.clamp(round_px(width) as f64);
            (width, height, ppi_for(height, source.height))
        }
        PpiLock::Ppi(ppi) => {
            let max_ppi = bounds.max / width_in.max(height_in);
            let ppi = if ppi.is_finite() && ppi > 0.0 {
                ppi.min(max_ppi)
            } else {
                max_ppi.min(crate::units::DEFAULT_SOURCE_PPI)
            };
            let width = round_px(mm_to_px(source.width, ppi)) as f64;
            let height = round_px(mm_to_px(source.height, ppi)) as f64;
            (width, height, ppi)
        }
    }
}

fn cover_scale(source: &SourceGeometry, width: f64, height: f64) -> f64 {
    (width / source.width).max(height / source.height)
}

fn contain_scale(source: &SourceGeometry, width: f64, height: f64) -> f64 {
    (width / source.width).min(height / source.height)
}

/// Four border bands between the canvas edge and the usable area
fn padding_bands(page_width: f64, page_height: f64, usable: &Rect) -> Vec<Rect> {
    let bands = [
        // top
        Rect::new(0.0, 0.0, page_width, usable.y),
        // bottom
        Rect::new(0.0, usable.bottom(), page_width, page_height - usable.bottom()),
        // left
        Rect::new(0.0, usable.y, usable.x, usable.height),
        // right
        Rect::new(usable.right(), usable.y, page_width - usable.right(), usable.height),
    ];
    bands.into_iter().filter(|band| !band.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaddingPolicy;

    const EPS: f64 = 1e-9;

    fn a4() -> SourceGeometry {
        SourceGeometry::new(210.0, 297.0, 0)
    }

    #[test]
    fn test_fill_covers_and_centres() {
        let spec = SizeSpec::pdf_fill(100.0, 100.0);
        let g = compute_geometry(&spec, &a4(), &LayoutLimits::default());

        assert_eq!((g.page_width, g.page_height), (100.0, 100.0));
        assert!((g.content_scale - 100.0 / 210.0).abs() < EPS);
        // Width fits exactly, height overflows and is cropped symmetrically
        assert!(g.content_rect.x.abs() < EPS);
        let overflow = g.content_rect.height - 100.0;
        assert!(overflow > 0.0);
        assert!((g.content_rect.y + overflow / 2.0).abs() < EPS);
        assert!(g.mask_regions.is_empty());
    }

    #[test]
    fn test_fit_derives_other_axis() {
        let spec = SizeSpec::pdf_width(150.0);
        let size = resolve_size(&spec, &a4(), &LayoutLimits::default());
        assert!((size.height - 150.0 * 297.0 / 210.0).abs() < EPS);
        assert_eq!(crate::units::format_mm(size.height), "212.14");
    }

    #[test]
    fn test_scale_one_is_identity() {
        let spec = SizeSpec::pdf_scale(1.0);
        let g = compute_geometry(&spec, &a4(), &LayoutLimits::default());
        assert_eq!((g.page_width, g.page_height), (210.0, 297.0));
        assert_eq!(g.content_scale, 1.0);
        assert_eq!(g.content_rect, Rect::new(0.0, 0.0, 210.0, 297.0));
    }

    #[test]
    fn test_scale_clamped_to_bounds() {
        let limits = LayoutLimits::default();
        let g = compute_geometry(&SizeSpec::pdf_scale(1000.0), &a4(), &limits);
        assert!((g.page_width - limits.vector.max).abs() < 1e-6);
        assert!((g.page_height - limits.vector.max).abs() < 1e-6);
        // The pinned axis letterboxes the content inside the canvas
        assert!((g.content_scale - limits.vector.max / 297.0).abs() < 1e-9);
        assert!(g.content_rect.x >= 0.0);

        let g = compute_geometry(&SizeSpec::pdf_scale(0.0), &a4(), &limits);
        assert!((g.page_width - limits.vector.min).abs() < 1e-6);
        assert!((g.page_height - limits.vector.min).abs() < 1e-6);
    }

    #[test]
    fn test_scale_bounds_divide_by_opposite_axis() {
        let (min, max) = scale_bounds(&a4(), LayoutLimits::default().vector);
        assert!((min - 1.0 / 297.0).abs() < EPS);
        assert!((max - 5080.0 / 210.0).abs() < EPS);

        // A factor inside the bounds is honoured even though the long axis is then pinned
        let size = resolve_size(&SizeSpec::pdf_scale(20.0), &a4(), &LayoutLimits::default());
        assert_eq!(size.scale, 20.0);
        assert_eq!((size.width, size.height), (4200.0, 5080.0));
    }

    #[test]
    fn test_outside_padding_inflates_canvas() {
        let spec = SizeSpec::pdf_fill(100.0, 50.0).with_margin(5.0, PaddingPolicy::Outside);
        let g = compute_geometry(&spec, &a4(), &LayoutLimits::default());
        assert_eq!((g.page_width, g.page_height), (110.0, 60.0));
        assert_eq!(g.clip_rect, Rect::new(5.0, 5.0, 100.0, 50.0));
        assert!(g.mask_regions.is_empty());
    }

    #[test]
    fn test_inside_padding_masks_four_bands() {
        let spec = SizeSpec::pdf_fill(100.0, 50.0).with_margin(5.0, PaddingPolicy::Inside);
        let g = compute_geometry(&spec, &a4(), &LayoutLimits::default());
        assert_eq!((g.page_width, g.page_height), (100.0, 50.0));
        assert_eq!(g.clip_rect, Rect::new(5.0, 5.0, 90.0, 40.0));
        assert_eq!(g.mask_regions.len(), 4);
        let area: f64 = g.mask_regions.iter().map(|r| r.width * r.height).sum();
        assert!((area - (100.0 * 50.0 - 90.0 * 40.0)).abs() < EPS);
    }

    #[test]
    fn test_margin_clamped() {
        let spec = SizeSpec::pdf_fill(20.0, 10.0).with_margin(50.0, PaddingPolicy::Inside);
        let g = compute_geometry(&spec, &a4(), &LayoutLimits::default());
        // max margin = 10/2 - 1 = 4
        assert_eq!(g.clip_rect, Rect::new(4.0, 4.0, 12.0, 2.0));
    }

    #[test]
    fn test_ppi_lock() {
        let source = SourceGeometry::new(100.0, 50.0, 0);
        let g = compute_geometry(&SizeSpec::png_ppi(300.0), &source, &LayoutLimits::default());
        assert_eq!(g.pixel_size(), (1181, 591));
        assert_eq!(g.ppi, Some(300.0));
    }

    #[test]
    fn test_width_lock_reports_ppi() {
        let source = SourceGeometry::new(100.0, 50.0, 0);
        let size = resolve_size(&SizeSpec::png_width(1000.0), &source, &LayoutLimits::default());
        assert_eq!((size.width, size.height), (1000.0, 500.0));
        assert!((size.ppi.unwrap() - 254.0).abs() < EPS);
    }

    #[test]
    fn test_raster_outside_margin_is_whole_pixels() {
        let source = SourceGeometry::new(100.0, 50.0, 0);
        let spec = SizeSpec::png_fill(400.0, 200.0).with_margin(10.6, PaddingPolicy::Outside);
        let g = compute_geometry(&spec, &source, &LayoutLimits::default());
        assert_eq!(g.pixel_size(), (420, 220));
    }

    #[test]
    fn test_scale_bounds_extreme_aspect() {
        let source = SourceGeometry::new(10000.0, 1.0, 0);
        let limits = LayoutLimits::default();
        let (min, max) = scale_bounds(&source, limits.vector);
        assert!(min <= max);
        assert!((min - 1e-4).abs() < EPS);
        assert!((max - 5080.0).abs() < EPS);

        let g = compute_geometry(&SizeSpec::pdf_scale(max), &source, &limits);
        assert!(g.page_width <= limits.vector.max);
        assert!(g.page_height <= limits.vector.max);
    }

    #[test]
    fn test_outside_margin_keeps_raster_canvas_within_limit() {
        let source = SourceGeometry::new(100.0, 100.0, 0);
        let spec = SizeSpec::png_fill(16384.0, 16384.0).with_margin(8000.0, PaddingPolicy::Outside);
        let g = compute_geometry(&spec, &source, &LayoutLimits::default());
        assert_eq!(g.pixel_size(), (16384, 16384));
        assert_eq!(g.clip_rect, Rect::new(0.0, 0.0, 16384.0, 16384.0));
    }

    #[test]
    fn test_outside_margin_shrinks_to_fit_page_limit() {
        let limits = LayoutLimits::default();
        let g = compute_geometry(
            &SizeSpec::pdf_fill(5080.0, 5080.0).with_margin(2000.0, PaddingPolicy::Outside),
            &a4(),
            &limits,
        );
        assert_eq!((g.page_width, g.page_height), (5080.0, 5080.0));

        // Only the headroom on the longer side is available
        let g = compute_geometry(
            &SizeSpec::pdf_fill(1000.0, 5000.0).with_margin(100.0, PaddingPolicy::Outside),
            &a4(),
            &limits,
        );
        assert_eq!(g.clip_rect.x, 40.0);
        assert_eq!((g.page_width, g.page_height), (1080.0, 5080.0));
    }
}
