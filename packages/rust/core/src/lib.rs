//! Pipeline orchestration for arxivflat.
//!
//! This crate ties together identifier parsing, the bundle cache, the
//! fetcher, entry resolution and include inlining into one request:
//! reference in, merged LaTeX out.

pub mod locks;
pub mod pipeline;

pub use pipeline::{
    AssembleRequest, AssembledDocument, Pipeline, PipelineConfig, PipelineError, PipelineResult,
    ProgressReporter, SilentProgress,
};
