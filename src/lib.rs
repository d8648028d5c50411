//! vodforge: turn one uploaded video into a ready-to-serve HLS asset.
//!
//! Small uploads become a single rendition at source resolution; larger ones
//! become an adaptive ladder with a master playlist. See [`pipeline`] for the
//! run lifecycle and the `vf-*` crates for the individual stages.

pub mod pipeline;

pub use pipeline::{
    Pipeline, PipelineOutput, PipelineSettings, PipelineState, StateObserver,
};
