//! Interactive editing of a size specification
//!
//! Exactly one field of a `SizeSpec` is authoritative. Editing a field makes it
//! authoritative (switching variant where needed) and every other field is
//! re-derived from it through `resolve_size`.

use crate::types::Axis;
use crate::units::ppi_for;

use super::{
    LayoutLimits, PpiLock, RasterMode, SizeMode, SizeSpec, SourceGeometry, VectorMode,
    clamp_scale, resolve_size,
};

/// A single user edit
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizeEdit {
    Width(f64),
    Height(f64),
    Scale(f64),
    Ppi(f64),
}

/// The kind of sizing a user can switch a spec to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Fill,
    LockWidth,
    LockHeight,
    Scale,
    LockPpi,
}

impl SizeSpec {
    /// Apply one edit and make the edited field authoritative.
    ///
    /// Returns `false` when the field does not exist for this output format
    /// (resolution on a PDF spec, scale factor on a fill PNG spec).
    pub fn apply_edit(&mut self, edit: SizeEdit, source: &SourceGeometry, limits: &LayoutLimits) -> bool {
        let bounds = limits.for_format(self.output_format());
        let mode: SizeMode = match (self.mode, edit) {
            (SizeMode::Vector(VectorMode::Fill { height, .. }), SizeEdit::Width(width))
            | (SizeMode::Vector(VectorMode::Fill { width, .. }), SizeEdit::Height(height)) => {
                VectorMode::Fill {
                    width: bounds.clamp(width),
                    height: bounds.clamp(height),
                }
                .into()
            }
            (SizeMode::Vector(VectorMode::Scale { .. }), SizeEdit::Width(width)) => {
                VectorMode::Scale {
                    factor: clamp_scale(width / source.width, source, bounds),
                }
                .into()
            }
            (SizeMode::Vector(VectorMode::Scale { .. }), SizeEdit::Height(height)) => {
                VectorMode::Scale {
                    factor: clamp_scale(height / source.height, source, bounds),
                }
                .into()
            }
            (SizeMode::Vector(_), SizeEdit::Width(length)) => VectorMode::Fit {
                locked: Axis::Width,
                length,
            }
            .into(),
            (SizeMode::Vector(_), SizeEdit::Height(length)) => VectorMode::Fit {
                locked: Axis::Height,
                length,
            }
            .into(),
            (SizeMode::Vector(VectorMode::Fit { locked, .. }), SizeEdit::Scale(factor)) => {
                let factor = clamp_scale(factor, source, bounds);
                VectorMode::Fit {
                    locked,
                    length: source.dimension(locked) * factor,
                }
                .into()
            }
            (SizeMode::Vector(_), SizeEdit::Scale(factor)) => VectorMode::Scale {
                factor: clamp_scale(factor, source, bounds),
            }
            .into(),
            (SizeMode::Vector(_), SizeEdit::Ppi(_)) => return false,

            (SizeMode::Raster(RasterMode::Fill { height, .. }), SizeEdit::Width(width))
            | (SizeMode::Raster(RasterMode::Fill { width, .. }), SizeEdit::Height(height)) => {
                RasterMode::Fill {
                    width: bounds.clamp(width.round()),
                    height: bounds.clamp(height.round()),
                }
                .into()
            }
            (SizeMode::Raster(_), SizeEdit::Width(px)) => RasterMode::Scale(PpiLock::Width(px)).into(),
            (SizeMode::Raster(_), SizeEdit::Height(px)) => {
                RasterMode::Scale(PpiLock::Height(px)).into()
            }
            (SizeMode::Raster(_), SizeEdit::Ppi(ppi)) => RasterMode::Scale(PpiLock::Ppi(ppi)).into(),
            (SizeMode::Raster(_), SizeEdit::Scale(_)) => return false,
        };
        self.mode = mode;
        self.store_resolved(source, limits);
        true
    }

    /// Switch to another kind of sizing, seeding it from the current output size.
    ///
    /// `last_scale` is the scale factor the user last chose in this session; it
    /// seeds a switch to `Scale` instead of the current effective scale.
    /// Returns `false` when the kind does not exist for this output format.
    pub fn switch_mode(
        &mut self,
        kind: ModeKind,
        source: &SourceGeometry,
        limits: &LayoutLimits,
        last_scale: Option<f64>,
    ) -> bool {
        let current = resolve_size(self, source, limits);
        let mode: SizeMode = match (self.mode, kind) {
            (SizeMode::Vector(_), ModeKind::Fill) => VectorMode::Fill {
                width: current.width,
                height: current.height,
            }
            .into(),
            (SizeMode::Vector(_), ModeKind::LockWidth) => VectorMode::Fit {
                locked: Axis::Width,
                length: current.width,
            }
            .into(),
            (SizeMode::Vector(_), ModeKind::LockHeight) => VectorMode::Fit {
                locked: Axis::Height,
                length: current.height,
            }
            .into(),
            (SizeMode::Vector(_), ModeKind::Scale) => VectorMode::Scale {
                factor: last_scale.unwrap_or(current.width / source.width),
            }
            .into(),
            (SizeMode::Vector(_), ModeKind::LockPpi) => return false,

            (SizeMode::Raster(_), ModeKind::Fill) => RasterMode::Fill {
                width: current.width,
                height: current.height,
            }
            .into(),
            (SizeMode::Raster(_), ModeKind::LockWidth) => {
                RasterMode::Scale(PpiLock::Width(current.width)).into()
            }
            (SizeMode::Raster(_), ModeKind::LockHeight) => {
                RasterMode::Scale(PpiLock::Height(current.height)).into()
            }
            (SizeMode::Raster(_), ModeKind::Scale | ModeKind::LockPpi) => {
                let ppi = current.ppi.unwrap_or(ppi_for(current.width, source.width));
                RasterMode::Scale(PpiLock::Ppi(ppi)).into()
            }
        };
        self.mode = mode;
        self.store_resolved(source, limits);
        true
    }

    /// Replace the authoritative value with its clamped form, so the stored
    /// spec always shows what will actually be exported.
    fn store_resolved(&mut self, source: &SourceGeometry, limits: &LayoutLimits) {
        let resolved = resolve_size(self, source, limits);
        self.mode = match self.mode {
            SizeMode::Vector(VectorMode::Fill { .. }) => VectorMode::Fill {
                width: resolved.width,
                height: resolved.height,
            }
            .into(),
            SizeMode::Vector(VectorMode::Fit { locked, .. }) => VectorMode::Fit {
                locked,
                length: match locked {
                    Axis::Width => resolved.width,
                    Axis::Height => resolved.height,
                },
            }
            .into(),
            SizeMode::Vector(VectorMode::Scale { .. }) => VectorMode::Scale {
                factor: resolved.scale,
            }
            .into(),
            SizeMode::Raster(RasterMode::Fill { .. }) => RasterMode::Fill {
                width: resolved.width,
                height: resolved.height,
            }
            .into(),
            SizeMode::Raster(RasterMode::Scale(PpiLock::Width(_))) => {
                RasterMode::Scale(PpiLock::Width(resolved.width)).into()
            }
            SizeMode::Raster(RasterMode::Scale(PpiLock::Height(_))) => {
                RasterMode::Scale(PpiLock::Height(resolved.height)).into()
            }
            SizeMode::Raster(RasterMode::Scale(PpiLock::Ppi(ppi))) => {
                RasterMode::Scale(PpiLock::Ppi(resolved.ppi.unwrap_or(ppi))).into()
            }
        };
    }
}

impl From<VectorMode> for SizeMode {
    fn from(mode: VectorMode) -> Self {
        SizeMode::Vector(mode)
    }
}

impl From<RasterMode> for SizeMode {
    fn from(mode: RasterMode) -> Self {
        SizeMode::Raster(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a4() -> SourceGeometry {
        SourceGeometry::new(210.0, 297.0, 0)
    }

    #[test]
    fn test_width_edit_locks_width() {
        let limits = LayoutLimits::default();
        let mut spec = SizeSpec::pdf_scale(1.0);
        spec.switch_mode(ModeKind::LockWidth, &a4(), &limits, None);
        assert!(spec.apply_edit(SizeEdit::Width(150.0), &a4(), &limits));
        assert_eq!(
            spec.mode,
            SizeMode::Vector(VectorMode::Fit {
                locked: Axis::Width,
                length: 150.0
            })
        );
    }

    #[test]
    fn test_width_edit_in_scale_mode_updates_factor() {
        let limits = LayoutLimits::default();
        let mut spec = SizeSpec::pdf_scale(1.0);
        assert!(spec.apply_edit(SizeEdit::Width(105.0), &a4(), &limits));
        assert_eq!(spec.mode, SizeMode::Vector(VectorMode::Scale { factor: 0.5 }));
    }

    #[test]
    fn test_fill_edit_keeps_other_axis() {
        let limits = LayoutLimits::default();
        let mut spec = SizeSpec::pdf_fill(100.0, 80.0);
        spec.apply_edit(SizeEdit::Height(120.0), &a4(), &limits);
        assert_eq!(
            spec.mode,
            SizeMode::Vector(VectorMode::Fill {
                width: 100.0,
                height: 120.0
            })
        );
    }

    #[test]
    fn test_ppi_edit_rejected_for_pdf() {
        let mut spec = SizeSpec::pdf_fill(100.0, 80.0);
        let before = spec.clone();
        assert!(!spec.apply_edit(SizeEdit::Ppi(300.0), &a4(), &LayoutLimits::default()));
        assert_eq!(spec, before);
    }

    #[test]
    fn test_scale_edit_clamped() {
        let limits = LayoutLimits::default();
        let mut spec = SizeSpec::pdf_scale(1.0);
        spec.apply_edit(SizeEdit::Scale(1e9), &a4(), &limits);
        let SizeMode::Vector(VectorMode::Scale { factor }) = spec.mode else {
            panic!("expected scale mode");
        };
        assert!((factor - 5080.0 / 210.0).abs() < 1e-9);
    }

    #[test]
    fn test_switch_to_scale_uses_last_scale() {
        let limits = LayoutLimits::default();
        let mut spec = SizeSpec::pdf_fill(100.0, 100.0);
        spec.switch_mode(ModeKind::Scale, &a4(), &limits, Some(0.25));
        assert_eq!(spec.mode, SizeMode::Vector(VectorMode::Scale { factor: 0.25 }));
    }

    #[test]
    fn test_raster_switch_to_ppi() {
        let limits = LayoutLimits::default();
        let source = SourceGeometry::new(100.0, 50.0, 0);
        let mut spec = SizeSpec::png_width(1000.0);
        assert!(spec.switch_mode(ModeKind::LockPpi, &source, &limits, None));
        let SizeMode::Raster(RasterMode::Scale(PpiLock::Ppi(ppi))) = spec.mode else {
            panic!("expected ppi lock");
        };
        assert!((ppi - 254.0).abs() < 1e-9);
        assert!(!spec.apply_edit(SizeEdit::Scale(2.0), &source, &limits));
    }

    #[test]
    fn test_rederive_is_idempotent() {
        let limits = LayoutLimits::default();
        let source = a4();
        let mut first = SizeSpec::pdf_height(123.456);
        first.apply_edit(SizeEdit::Height(123.456), &source, &limits);
        let mut second = first.clone();
        second.apply_edit(SizeEdit::Height(123.456), &source, &limits);
        assert_eq!(first, second);
        let a = resolve_size(&first, &source, &limits);
        let b = resolve_size(&second, &source, &limits);
        assert_eq!(a.width.to_bits(), b.width.to_bits());
        assert_eq!(a.height.to_bits(), b.height.to_bits());
    }
}
