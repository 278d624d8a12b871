//! Layout engine
//!
//! Pure geometry: a size specification plus a source page size in, a concrete
//! canvas out. No I/O and no shared state, so it is safe to call from any thread.
//! - Target resolution per sizing mode (fill, single-axis lock, scale, resolution)
//! - Padding policy (inside bands vs. outside growth)
//! - Interactive editing of the authoritative field
//! - Crop overlay projection for previews

mod edit;
mod engine;
mod preview;
mod types;

pub use edit::*;
pub use engine::*;
pub use preview::*;
pub use types::*;
