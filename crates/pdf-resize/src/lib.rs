pub mod export;
pub mod flatten;
pub mod layout;
pub mod naming;
mod options;
pub mod paper;
pub mod render;
mod source;
mod types;
pub mod units;

pub use export::{
    ConflictEntry, ExecutionMode, ExportReport, ExportRun, ExportState, ExportTask, Exporter,
    FsSink, PageSelection, Sink, TaskFailure, plan_tasks, selected_pages,
};
pub use layout::{
    CropBands, LayoutLimits, ModeKind, OutputGeometry, PpiLock, RasterMode, Rect, SizeEdit,
    SizeMode, SizeSpec, SourceGeometry, VectorMode, compute_geometry, crop_overlay, resolve_size,
    scale_bounds,
};
pub use flatten::Ghostscript;
pub use naming::NamingContext;
pub use options::*;
pub use render::{DocumentRenderer, PageJob, RenderJob, Renderer};
pub use source::{SourceDocument, SourceKind, load_source};
pub use types::*;
