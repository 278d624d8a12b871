use crate::export::{ExecutionMode, PageSelection};
use crate::layout::{LayoutLimits, SizeSpec};
use crate::types::*;
use crate::units::DEFAULT_SOURCE_PPI;
use std::path::{Component, Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default filename template
pub const DEFAULT_BASE_NAME: &str = "*size*";

/// One complete export job
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExportOptions {
    // What to produce
    pub specs: Vec<SizeSpec>,
    pub selection: PageSelection,

    // Where to put it
    pub output_dir: PathBuf,
    /// Created inside `output_dir` before writing
    pub subfolder: Option<String>,
    /// Filename template, see `naming`
    pub base_name: String,

    // Rendering
    pub background: Color,
    /// Millimetres removed from every edge of each source page
    pub trim: f64,
    /// Resolution assumed for raster sources
    pub source_ppi: f64,
    /// Pass PDF outputs through Ghostscript before writing them
    pub flatten: bool,
    pub execution: ExecutionMode,
    pub limits: LayoutLimits,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            specs: Vec::new(),
            selection: PageSelection::default(),
            output_dir: PathBuf::from("."),
            subfolder: None,
            base_name: DEFAULT_BASE_NAME.to_string(),
            background: Color::WHITE,
            trim: 0.0,
            source_ppi: DEFAULT_SOURCE_PPI,
            flatten: false,
            execution: ExecutionMode::Sequential,
            limits: LayoutLimits::default(),
        }
    }
}

impl ExportOptions {
    /// Load options from a JSON file
    #[cfg(feature = "serde")]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let options = serde_json::from_slice(&bytes)
            .map_err(|e| ResizeError::Config(format!("Failed to parse config: {}", e)))?;
        Ok(options)
    }

    /// Save options to a JSON file
    #[cfg(feature = "serde")]
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ResizeError::Config(format!("Failed to serialize config: {}", e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Directory the files are written to
    pub fn destination(&self) -> PathBuf {
        match &self.subfolder {
            Some(sub) if !sub.trim().is_empty() => self.output_dir.join(sub.trim()),
            _ => self.output_dir.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.specs.is_empty() {
            return Err(ResizeError::Config("No output sizes specified".to_string()));
        }

        if self.base_name.trim().is_empty() {
            return Err(ResizeError::Config("Base filename is empty".to_string()));
        }

        if !(self.trim.is_finite() && self.trim >= 0.0) {
            return Err(ResizeError::Config(format!(
                "Trim must be zero or positive, got {}",
                self.trim
            )));
        }

        if !(self.source_ppi.is_finite() && self.source_ppi > 0.0) {
            return Err(ResizeError::Config(format!(
                "Source resolution must be positive, got {}",
                self.source_ppi
            )));
        }

        if let ExecutionMode::Concurrent { workers: 0 } = self.execution {
            return Err(ResizeError::Config(
                "Concurrent export needs at least one worker".to_string(),
            ));
        }

        if !self.limits.is_valid() {
            return Err(ResizeError::Config(
                "Layout limits must be positive with min <= max".to_string(),
            ));
        }

        if let Some(sub) = &self.subfolder {
            let escapes = Path::new(sub.trim())
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
            if escapes {
                return Err(ResizeError::Config(format!(
                    "Subfolder must be a relative path inside the output directory: {}",
                    sub
                )));
            }
        }

        for (index, spec) in self.specs.iter().enumerate() {
            if !(spec.margin.is_finite() && spec.margin >= 0.0) {
                return Err(ResizeError::Config(format!(
                    "Size {}: margin must be zero or positive",
                    index + 1
                )));
            }
        }

        Ok(())
    }
}
