//! # vf-av
//!
//! Media inspection and encoder orchestration for the vodforge pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with deadline
//!   and cancellation support; the child is killed, never orphaned.
//! - **Probing** ([`Prober`], [`FfprobeProber`]) -- resolution and audio
//!   presence from container metadata.
//! - **Planning** ([`plan_ladder`], [`select_strategy`]) -- pure ladder
//!   arithmetic and the size-based single/multi decision.
//! - **Encoding** ([`Encoder`], [`FfmpegEncoder`], [`OutputLayout`]) -- one
//!   ffmpeg pass producing every HLS rendition plus the master playlist.

pub mod command;
pub mod encoder;
pub mod ladder;
pub mod probe;
pub mod strategy;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use encoder::{EncodeOutput, Encoder, EncoderSettings, FfmpegEncoder, OutputLayout};
pub use ladder::{even_width, plan_ladder};
pub use probe::{FfprobeProber, Prober};
pub use strategy::{select_strategy, select_strategy_for_size};
pub use tools::{ResolvedTool, ToolRegistry, ToolSource, ToolStatus, FFMPEG, FFPROBE};
