//! Unit conversion and number formatting
//!
//! Vector geometry is carried in millimetres at full precision. Points only
//! appear at the PDF boundary, pixels only at the raster boundary, and
//! rounding only happens when a value is displayed or put in a filename.

use std::str::FromStr;

// =============================================================================
// Unit Conversion
// =============================================================================

/// Millimetres per inch
pub const MM_PER_INCH: f64 = 25.4;

/// Points per millimetre (1 inch = 72 points, 1 inch = 25.4mm)
pub const POINTS_PER_MM: f64 = 72.0 / MM_PER_INCH;

/// Resolution assumed for raster sources that carry no physical size
pub const DEFAULT_SOURCE_PPI: f64 = 72.0;

/// Convert millimetres to points
#[inline]
pub fn mm_to_pt(mm: f64) -> f64 {
    mm * POINTS_PER_MM
}

/// Convert points to millimetres
#[inline]
pub fn pt_to_mm(pt: f64) -> f64 {
    pt / POINTS_PER_MM
}

/// Convert millimetres to (unrounded) pixels at `ppi`
#[inline]
pub fn mm_to_px(mm: f64, ppi: f64) -> f64 {
    mm / MM_PER_INCH * ppi
}

/// Convert pixels to millimetres at `ppi`
#[inline]
pub fn px_to_mm(px: f64, ppi: f64) -> f64 {
    px / ppi * MM_PER_INCH
}

/// Resolution at which `px` pixels span `mm` millimetres
#[inline]
pub fn ppi_for(px: f64, mm: f64) -> f64 {
    px / (mm / MM_PER_INCH)
}

/// Round to a whole pixel count, never below 1
pub fn round_px(value: f64) -> u32 {
    if !value.is_finite() || value < 1.0 {
        return 1;
    }
    value.round().min(u32::MAX as f64) as u32
}

// =============================================================================
// Length Units
// =============================================================================

/// Units a user may type a length in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LengthUnit {
    Mm,
    In,
    Pt,
    Px,
}

impl LengthUnit {
    pub fn name(self) -> &'static str {
        match self {
            LengthUnit::Mm => "mm",
            LengthUnit::In => "in",
            LengthUnit::Pt => "pt",
            LengthUnit::Px => "px",
        }
    }

    /// Convert a value in this unit to millimetres. `ppi` is only used for pixels.
    pub fn to_mm(self, value: f64, ppi: f64) -> f64 {
        match self {
            LengthUnit::Mm => value,
            LengthUnit::In => value * MM_PER_INCH,
            LengthUnit::Pt => pt_to_mm(value),
            LengthUnit::Px => px_to_mm(value, ppi),
        }
    }
}

impl FromStr for LengthUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mm" => Ok(LengthUnit::Mm),
            "in" | "\"" => Ok(LengthUnit::In),
            "pt" => Ok(LengthUnit::Pt),
            "px" => Ok(LengthUnit::Px),
            other => Err(format!("unknown unit '{}'", other)),
        }
    }
}

/// Split `"8.5in"` into `(8.5, Some(In))`. A bare number has no unit.
pub fn parse_quantity(s: &str) -> Result<(f64, Option<LengthUnit>), String> {
    let s = s.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid number '{}'", number))?;
    if !value.is_finite() {
        return Err(format!("invalid number '{}'", number));
    }
    let unit = if unit.trim().is_empty() {
        None
    } else {
        Some(unit.parse()?)
    };
    Ok((value, unit))
}

/// Parse a physical length into millimetres; bare numbers are millimetres.
pub fn parse_length(s: &str) -> Result<f64, String> {
    match parse_quantity(s)? {
        (value, None) => Ok(value),
        (_, Some(LengthUnit::Px)) => Err(format!("'{}' is not a physical length", s)),
        (value, Some(unit)) => Ok(unit.to_mm(value, DEFAULT_SOURCE_PPI)),
    }
}

// =============================================================================
// Formatting
// =============================================================================

/// Millimetres for display: two decimals, trailing zeros dropped
pub fn format_mm(value: f64) -> String {
    let text = format!("{:.2}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Whole units for display and file names: nearest integer, at least 1
pub fn format_px(value: f64) -> String {
    round_px(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mm_pt_roundtrip() {
        assert!((mm_to_pt(25.4) - 72.0).abs() < 1e-9);
        assert!((pt_to_mm(72.0) - 25.4).abs() < 1e-9);
    }

    #[test]
    fn test_px_conversions() {
        assert!((mm_to_px(25.4, 300.0) - 300.0).abs() < 1e-9);
        assert!((px_to_mm(300.0, 300.0) - 25.4).abs() < 1e-9);
        assert!((ppi_for(1181.0, 100.0) - 299.974).abs() < 1e-3);
    }

    #[test]
    fn test_round_px_floor() {
        assert_eq!(round_px(0.2), 1);
        assert_eq!(round_px(-5.0), 1);
        assert_eq!(round_px(f64::NAN), 1);
        assert_eq!(round_px(590.55), 591);
    }

    #[test]
    fn test_parse_length() {
        assert_eq!(parse_length("210").unwrap(), 210.0);
        assert_eq!(parse_length("210mm").unwrap(), 210.0);
        assert!((parse_length("8.5in").unwrap() - 215.9).abs() < 1e-9);
        assert!((parse_length("72pt").unwrap() - 25.4).abs() < 1e-9);
        assert!(parse_length("12px").is_err());
        assert!(parse_length("abc").is_err());
        assert!(parse_length("10 furlongs").is_err());
    }

    #[test]
    fn test_format_mm() {
        assert_eq!(format_mm(212.142857), "212.14");
        assert_eq!(format_mm(100.0), "100");
        assert_eq!(format_mm(12.5), "12.5");
        assert_eq!(format_mm(-0.001), "0");
    }

    #[test]
    fn test_format_px() {
        assert_eq!(format_px(1180.9), "1181");
        assert_eq!(format_px(0.0), "1");
    }
}
