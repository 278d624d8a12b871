//! Known paper formats and size-token detection

/// Absolute tolerance, in millimetres, when matching a page against a paper format
pub const PAPER_MATCH_TOLERANCE_MM: f64 = 1.0;

/// Paper orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    /// Portrait: height >= width
    #[default]
    Portrait,
    /// Landscape: width > height
    Landscape,
}

impl Orientation {
    pub fn of(width: f64, height: f64) -> Self {
        if width > height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }

    /// Suffix used in filenames: `v` (vertical) or `h` (horizontal)
    pub fn suffix(self) -> &'static str {
        match self {
            Orientation::Portrait => "v",
            Orientation::Landscape => "h",
        }
    }
}

/// Standard paper sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PaperFormat {
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
    A7,
    A8,
    B4,
    B5,
    Letter,
    Legal,
    Tabloid,
}

impl PaperFormat {
    pub const ALL: [PaperFormat; 14] = [
        PaperFormat::A0,
        PaperFormat::A1,
        PaperFormat::A2,
        PaperFormat::A3,
        PaperFormat::A4,
        PaperFormat::A5,
        PaperFormat::A6,
        PaperFormat::A7,
        PaperFormat::A8,
        PaperFormat::B4,
        PaperFormat::B5,
        PaperFormat::Letter,
        PaperFormat::Legal,
        PaperFormat::Tabloid,
    ];

    /// Base dimensions in millimetres (always portrait)
    pub fn dimensions_mm(self) -> (f64, f64) {
        match self {
            PaperFormat::A0 => (841.0, 1189.0),
            PaperFormat::A1 => (594.0, 841.0),
            PaperFormat::A2 => (420.0, 594.0),
            PaperFormat::A3 => (297.0, 420.0),
            PaperFormat::A4 => (210.0, 297.0),
            PaperFormat::A5 => (148.0, 210.0),
            PaperFormat::A6 => (105.0, 148.0),
            PaperFormat::A7 => (74.0, 105.0),
            PaperFormat::A8 => (52.0, 74.0),
            PaperFormat::B4 => (250.0, 353.0),
            PaperFormat::B5 => (176.0, 250.0),
            PaperFormat::Letter => (215.9, 279.4),
            PaperFormat::Legal => (215.9, 355.6),
            PaperFormat::Tabloid => (279.4, 431.8),
        }
    }

    /// Dimensions with orientation applied
    pub fn dimensions_with_orientation(self, orientation: Orientation) -> (f64, f64) {
        let (w, h) = self.dimensions_mm();
        match orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PaperFormat::A0 => "A0",
            PaperFormat::A1 => "A1",
            PaperFormat::A2 => "A2",
            PaperFormat::A3 => "A3",
            PaperFormat::A4 => "A4",
            PaperFormat::A5 => "A5",
            PaperFormat::A6 => "A6",
            PaperFormat::A7 => "A7",
            PaperFormat::A8 => "A8",
            PaperFormat::B4 => "B4",
            PaperFormat::B5 => "B5",
            PaperFormat::Letter => "Letter",
            PaperFormat::Legal => "Legal",
            PaperFormat::Tabloid => "Tabloid",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// Match a page size against the known formats, in either orientation.
///
/// The tolerance is absolute, so large and small formats get the same slack.
pub fn detect(width_mm: f64, height_mm: f64) -> Option<(PaperFormat, Orientation)> {
    let orientation = Orientation::of(width_mm, height_mm);
    PaperFormat::ALL.into_iter().find_map(|format| {
        let (w, h) = format.dimensions_with_orientation(orientation);
        let matches = (w - width_mm).abs() <= PAPER_MATCH_TOLERANCE_MM
            && (h - height_mm).abs() <= PAPER_MATCH_TOLERANCE_MM;
        matches.then_some((format, orientation))
    })
}

/// Filename code for a detected format, e.g. `A4v` or `Letterh`
pub fn format_code(format: PaperFormat, orientation: Orientation) -> String {
    format!("{}{}", format.name(), orientation.suffix())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_a4_both_orientations() {
        assert_eq!(
            detect(210.0, 297.0),
            Some((PaperFormat::A4, Orientation::Portrait))
        );
        assert_eq!(
            detect(297.0, 210.0),
            Some((PaperFormat::A4, Orientation::Landscape))
        );
    }

    #[test]
    fn test_detect_within_tolerance() {
        // 595 x 842 pt is the usual A4 MediaBox
        assert_eq!(
            detect(209.9, 297.04),
            Some((PaperFormat::A4, Orientation::Portrait))
        );
        assert_eq!(detect(212.0, 297.0), None);
    }

    #[test]
    fn test_format_code() {
        assert_eq!(format_code(PaperFormat::A4, Orientation::Portrait), "A4v");
        assert_eq!(
            format_code(PaperFormat::Letter, Orientation::Landscape),
            "Letterh"
        );
    }

    #[test]
    fn test_from_name() {
        assert_eq!(PaperFormat::from_name("a5"), Some(PaperFormat::A5));
        assert_eq!(PaperFormat::from_name("tabloid"), Some(PaperFormat::Tabloid));
        assert_eq!(PaperFormat::from_name("C4"), None);
    }
}
