//! Batch driver around `nirva_analysis`: transcripts in, one validated
//! daily document out per date.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod store;
pub mod transcripts;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{BatchReport, DayOutcome, Pipeline};
