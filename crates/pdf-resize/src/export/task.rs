//! Task expansion and output path resolution

use crate::layout::{SourceGeometry, compute_geometry};
use crate::naming::{NamingContext, expand_template, file_name, page_suffix};
use crate::options::ExportOptions;
use crate::render::{PageJob, RenderJob};
use crate::source::{SourceDocument, SourceKind};
use crate::types::*;
use std::collections::HashSet;
use std::path::PathBuf;

/// Which pages of the source are exported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PageSelection {
    /// One 0-based page
    Current(usize),
    All,
}

impl Default for PageSelection {
    fn default() -> Self {
        PageSelection::Current(0)
    }
}

/// One output file of an export run
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTask {
    /// Position in the run; reports are ordered by it
    pub index: usize,
    /// Index of the size spec this task was expanded from
    pub spec_index: usize,
    pub format: OutputFormat,
    /// Pages written into this file: one for PNG, one or more for PDF
    pub pages: Vec<PageJob>,
    pub path: PathBuf,
}

impl ExportTask {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn render_job(&self, background: Color) -> RenderJob {
        RenderJob {
            format: self.format,
            pages: self.pages.clone(),
            background,
        }
    }
}

/// Resolve the selection to 0-based page indices.
///
/// Raster sources have exactly one page, whatever was selected.
pub fn selected_pages(source: &SourceDocument, selection: PageSelection) -> Result<Vec<usize>> {
    let count = source.page_count();
    if count == 0 {
        return Err(ResizeError::NoPages);
    }
    if source.kind() == SourceKind::Raster {
        return Ok(vec![0]);
    }
    match selection {
        PageSelection::Current(index) if index < count => Ok(vec![index]),
        PageSelection::Current(index) => Err(ResizeError::PageOutOfRange { index, count }),
        PageSelection::All => Ok((0..count).collect()),
    }
}

/// Expand every size spec into export tasks with final output paths.
///
/// PDF specs produce one task holding all selected pages; PNG specs produce
/// one task per page, with a `_p<N>` suffix when more than one page is
/// selected. Two tasks resolving to the same path are a configuration error.
pub fn plan_tasks(
    source: &SourceDocument,
    options: &ExportOptions,
    context: &NamingContext,
) -> Result<Vec<ExportTask>> {
    let pages = selected_pages(source, options.selection)?;
    let geometries = pages
        .iter()
        .map(|&index| source.geometry(index, options.trim))
        .collect::<Result<Vec<SourceGeometry>>>()?;
    let destination = options.destination();

    let mut tasks = Vec::new();
    let mut seen = HashSet::new();

    for (spec_index, spec) in options.specs.iter().enumerate() {
        let format = spec.output_format();
        let jobs: Vec<PageJob> = geometries
            .iter()
            .map(|page| PageJob {
                source: *page,
                geometry: compute_geometry(spec, page, &options.limits),
            })
            .collect();

        let groups: Vec<(Vec<PageJob>, Option<String>)> = if format.is_per_page() {
            let numbered = jobs.len() > 1;
            jobs.into_iter()
                .map(|job| {
                    let suffix = numbered.then(|| page_suffix(job.page_index()));
                    (vec![job], suffix)
                })
                .collect()
        } else {
            vec![(jobs, None)]
        };

        for (pages, suffix) in groups {
            let Some(first) = pages.first() else {
                continue;
            };
            let base = expand_template(&options.base_name, &first.geometry, context);
            let path = destination.join(file_name(&base, suffix.as_deref(), format.extension()));
            if !seen.insert(path.clone()) {
                return Err(ResizeError::DuplicateOutput(path));
            }
            tasks.push(ExportTask {
                index: tasks.len(),
                spec_index,
                format,
                pages,
                path,
            });
        }
    }

    if tasks.is_empty() {
        return Err(ResizeError::NoPages);
    }
    Ok(tasks)
}
