//! Crop overlay for interactive previews
//!
//! The overlay is projected from `compute_geometry`, the same function the
//! renderers consume, so the preview can never disagree with the export.

use super::{LayoutLimits, SizeSpec, SourceGeometry, compute_geometry};

/// Widths of the four bands of the untrimmed source that will not be exported,
/// in display units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CropBands {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl CropBands {
    pub fn is_empty(&self) -> bool {
        self.top <= 0.0 && self.right <= 0.0 && self.bottom <= 0.0 && self.left <= 0.0
    }
}

/// Project the crop of one spec onto a preview of the untrimmed, unpadded source.
///
/// `display_scale` is preview display units per source millimetre. Each band
/// combines the trim with whatever the fill scale pushes outside the clip area.
pub fn crop_overlay(
    spec: &SizeSpec,
    source: &SourceGeometry,
    limits: &LayoutLimits,
    display_scale: f64,
) -> CropBands {
    let geometry = compute_geometry(spec, source, limits);
    let content = geometry.content_rect;
    let clip = geometry.clip_rect;
    let scale = geometry.content_scale;

    // Sub-nanometre overhangs are float noise from centring, not crop
    let excess = |outside: f64| {
        let excess = outside / scale;
        if excess > 1e-9 { excess } else { 0.0 }
    };
    let band = |outside: f64| (source.trim + excess(outside)) * display_scale;

    CropBands {
        top: band(clip.y - content.y),
        right: band(content.right() - clip.right()),
        bottom: band(content.bottom() - clip.bottom()),
        left: band(clip.x - content.x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaddingPolicy;

    #[test]
    fn test_fill_crop_bands_symmetric() {
        let source = SourceGeometry::new(210.0, 297.0, 0);
        let bands = crop_overlay(
            &SizeSpec::pdf_fill(100.0, 100.0),
            &source,
            &LayoutLimits::default(),
            1.0,
        );
        // Cover scale is width-bound; (297 - 210) / 2 of the height is cut top and bottom
        assert!(bands.left.abs() < 1e-9);
        assert!(bands.right.abs() < 1e-9);
        assert!((bands.top - 43.5).abs() < 1e-9);
        assert!((bands.bottom - 43.5).abs() < 1e-9);
    }

    #[test]
    fn test_fit_has_no_crop() {
        let source = SourceGeometry::new(210.0, 297.0, 0);
        let spec = SizeSpec::pdf_width(150.0).with_margin(10.0, PaddingPolicy::Inside);
        let bands = crop_overlay(&spec, &source, &LayoutLimits::default(), 2.0);
        assert!(bands.is_empty());
    }

    #[test]
    fn test_trim_shows_as_band() {
        let source = SourceGeometry::new(216.0, 303.0, 0).with_trim(3.0);
        let bands = crop_overlay(
            &SizeSpec::pdf_scale(1.0),
            &source,
            &LayoutLimits::default(),
            2.0,
        );
        assert_eq!(bands, CropBands {
            top: 6.0,
            right: 6.0,
            bottom: 6.0,
            left: 6.0,
        });
    }
}
