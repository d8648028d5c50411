//! vf-core: shared types, errors, and configuration.
//!
//! This crate is the foundational dependency for the other vf-* crates,
//! providing the transient domain values that flow through one pipeline run
//! (probe results, rendition specs, encoding plans), the stage-tagged error
//! taxonomy, and the JSON configuration surface.

pub mod config;
pub mod error;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{EncodeError, Error, PlannerError, ProbeError, Result, Stage, ToolError};
pub use media::*;
