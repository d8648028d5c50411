//! Transient domain values created once per pipeline run.

use serde::{Deserialize, Serialize};

/// Stream facts extracted from the input container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaProbe {
    /// Pixel width of the first video stream.
    pub width: u32,
    /// Pixel height of the first video stream.
    pub height: u32,
    /// Whether any audio stream is present.
    pub has_audio: bool,
}

impl MediaProbe {
    /// Source resolution as `(width, height)`.
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// True for portrait sources (taller than wide).
    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }
}

/// One rung of the adaptive bitrate ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionSpec {
    /// Output height in pixels.
    pub target_height: u32,
    /// Output width in pixels; always even.
    pub computed_width: u32,
    /// Peak bitrate ceiling in bits per second.
    pub max_bitrate_bps: u64,
}

impl RenditionSpec {
    /// Output resolution as `(width, height)`.
    pub fn resolution(&self) -> (u32, u32) {
        (self.computed_width, self.target_height)
    }

    /// Rate-control buffer size handed to the encoder (two seconds at the
    /// ceiling).
    pub fn bufsize_bps(&self) -> u64 {
        self.max_bitrate_bps.saturating_mul(2)
    }

    /// Short label such as `720p`.
    pub fn label(&self) -> String {
        format!("{}p", self.target_height)
    }
}

/// Decision made by the strategy selector from the input file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Strategy {
    /// One rendition at source resolution.
    SingleStream,
    /// An adaptive ladder with up to `rungs` renditions.
    MultiStream {
        /// Number of ladder rungs to plan.
        rungs: usize,
    },
}

impl Strategy {
    /// Whether this strategy produces a master playlist.
    pub fn is_multi(&self) -> bool {
        matches!(self, Strategy::MultiStream { .. })
    }
}

/// Concrete encoding shape after planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "renditions", rename_all = "snake_case")]
pub enum PlanStrategy {
    /// One rendition at source resolution.
    SingleStream,
    /// Renditions in ascending resolution order; position `N` is output `vN`.
    MultiStream(Vec<RenditionSpec>),
}

/// Everything the encoder needs to know, consumed once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingPlan {
    /// Single rendition or ladder.
    pub strategy: PlanStrategy,
    /// Whether the source carries audio (copy) or not (AAC fallback).
    pub has_audio: bool,
}

impl EncodingPlan {
    /// Plan for a single source-resolution rendition.
    pub fn single(has_audio: bool) -> Self {
        Self {
            strategy: PlanStrategy::SingleStream,
            has_audio,
        }
    }

    /// Plan for an adaptive ladder.
    pub fn multi(renditions: Vec<RenditionSpec>, has_audio: bool) -> Self {
        Self {
            strategy: PlanStrategy::MultiStream(renditions),
            has_audio,
        }
    }

    /// Number of output renditions (and `vN` directories).
    pub fn rendition_count(&self) -> usize {
        match &self.strategy {
            PlanStrategy::SingleStream => 1,
            PlanStrategy::MultiStream(renditions) => renditions.len(),
        }
    }

    /// Ladder rungs, empty for a single-stream plan.
    pub fn renditions(&self) -> &[RenditionSpec] {
        match &self.strategy {
            PlanStrategy::SingleStream => &[],
            PlanStrategy::MultiStream(renditions) => renditions,
        }
    }

    /// Whether a master playlist will be produced.
    pub fn is_multi(&self) -> bool {
        matches!(self.strategy, PlanStrategy::MultiStream(_))
    }
}
