//! Export orchestration
//!
//! An export run goes through these steps:
//! 1. Expand size specs and selected pages into tasks with final output paths
//! 2. Check the destination; existing paths put the run on hold for a decision
//! 3. Render and write the surviving tasks, one failure never stopping the rest
//! 4. Report written, skipped and failed files in task order

mod run;
mod sink;
mod task;

pub use run::*;
pub use sink::*;
pub use task::*;
