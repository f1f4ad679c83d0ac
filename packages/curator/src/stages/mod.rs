//! Pipeline stages.
//!
//! Each stage pushes its batch through a semaphore-bounded worker pool and
//! collects results in completion order, sleeping a configured pacing delay
//! between collected results to bound aggregate request rate. One item's
//! failure never aborts the batch.

pub mod depth;
pub mod priority;

pub use depth::AnalyzedReport;
