//! Output filename templating
//!
//! A base name may contain three tokens, matched case-insensitively:
//! - `*size*`: paper format code (`A4v`) or `<width>x<height>` in the output unit
//! - `*YYMMDD*` and `*DDMMYY*`: the export date
//!
//! Anything else passes through unchanged, apart from characters that cannot
//! appear in a filename.

use crate::layout::{GeometryUnit, OutputGeometry};
use crate::paper::{detect, format_code};
use crate::units::format_px;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\*(size|yymmdd|ddmmyy)\*").expect("token pattern is valid"));

static UNDERSCORES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{2,}").expect("underscore pattern is valid"));

/// Name used when a template expands to nothing
pub const FALLBACK_BASE_NAME: &str = "resized";

/// Values that are the same for every task of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingContext {
    pub date: NaiveDate,
}

impl NamingContext {
    pub fn new(date: NaiveDate) -> Self {
        Self { date }
    }

    pub fn today() -> Self {
        Self::new(chrono::Local::now().date_naive())
    }
}

/// Put underscores around every token, collapse underscore runs and strip
/// leading/trailing underscores.
pub fn normalize_template(template: &str) -> String {
    let spaced = TOKEN.replace_all(template, "_${0}_");
    let collapsed = UNDERSCORES.replace_all(&spaced, "_");
    collapsed.trim_matches('_').to_string()
}

/// Expand a base-name template for one output geometry.
pub fn expand_template(template: &str, geometry: &OutputGeometry, context: &NamingContext) -> String {
    let normalized = normalize_template(template);
    let expanded = TOKEN.replace_all(&normalized, |caps: &regex::Captures| {
        match caps[1].to_ascii_lowercase().as_str() {
            "size" => size_token(geometry),
            "yymmdd" => context.date.format("%y%m%d").to_string(),
            _ => context.date.format("%d%m%y").to_string(),
        }
    });
    let name = sanitize_file_name(&expanded);
    if name.is_empty() {
        FALLBACK_BASE_NAME.to_string()
    } else {
        name
    }
}

/// Paper code when the page matches a known format, otherwise `<w>x<h>`.
///
/// Only millimetre geometry is matched against paper formats; pixel canvases
/// have no physical size.
pub fn size_token(geometry: &OutputGeometry) -> String {
    if geometry.unit == GeometryUnit::Mm {
        if let Some((format, orientation)) = detect(geometry.page_width, geometry.page_height) {
            return format_code(format, orientation);
        }
    }
    format!(
        "{}x{}",
        format_px(geometry.page_width),
        format_px(geometry.page_height)
    )
}

/// 1-based page suffix for per-page outputs
pub fn page_suffix(page_index: usize) -> String {
    format!("_p{}", page_index + 1)
}

/// Assemble the final file name
pub fn file_name(base: &str, page_suffix: Option<&str>, extension: &str) -> String {
    format!("{}{}.{}", base, page_suffix.unwrap_or(""), extension)
}

/// Replace path separators and characters reserved on common filesystems
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Rect;

    fn geometry(unit: GeometryUnit, width: f64, height: f64) -> OutputGeometry {
        OutputGeometry {
            unit,
            page_width: width,
            page_height: height,
            content_rect: Rect::new(0.0, 0.0, width, height),
            clip_rect: Rect::new(0.0, 0.0, width, height),
            content_scale: 1.0,
            mask_regions: Vec::new(),
            ppi: None,
        }
    }

    fn march_7() -> NamingContext {
        NamingContext::new(NaiveDate::from_ymd_opt(2025, 3, 7).unwrap())
    }

    #[test]
    fn test_normalize_adds_and_collapses_underscores() {
        assert_eq!(normalize_template("report*size*"), "report_*size*");
        assert_eq!(normalize_template("report__*size*___x"), "report_*size*_x");
        assert_eq!(normalize_template("_*YYMMDD*_"), "*YYMMDD*");
        assert_eq!(normalize_template("plain name"), "plain name");
    }

    #[test]
    fn test_expand_paper_code_and_date() {
        let g = geometry(GeometryUnit::Mm, 210.0, 297.0);
        assert_eq!(
            expand_template("report_*size*_*YYMMDD*", &g, &march_7()),
            "report_A4v_250307"
        );
        assert_eq!(expand_template("*ddmmyy*report", &g, &march_7()), "070325_report");
    }

    #[test]
    fn test_size_token_fallback() {
        assert_eq!(size_token(&geometry(GeometryUnit::Mm, 100.4, 99.6)), "100x100");
        assert_eq!(size_token(&geometry(GeometryUnit::Px, 1181.0, 591.0)), "1181x591");
        assert_eq!(size_token(&geometry(GeometryUnit::Mm, 420.0, 297.0)), "A3h");
    }

    #[test]
    fn test_expand_empty_falls_back() {
        let g = geometry(GeometryUnit::Mm, 10.0, 10.0);
        assert_eq!(expand_template("___", &g, &march_7()), FALLBACK_BASE_NAME);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_file_name("a/b:c"), "a-b-c");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("x", Some(&page_suffix(1)), "png"), "x_p2.png");
        assert_eq!(file_name("x", None, "pdf"), "x.pdf");
    }
}
