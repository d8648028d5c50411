//! Rendition encoding.
//!
//! An [`Encoder`] turns one input plus an [`EncodingPlan`] into a complete
//! HLS tree under an [`OutputLayout`]. [`FfmpegEncoder`] does it in a single
//! ffmpeg pass.

mod ffmpeg;
mod layout;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use vf_core::{EncodeError, EncodingPlan};

pub use ffmpeg::{EncoderSettings, FfmpegEncoder};
pub use layout::{
    OutputLayout, MASTER_PLAYLIST, SEGMENT_PATTERN, SINGLE_PLAYLIST, VARIANT_PLAYLIST,
};

/// What an encoder reports on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOutput {
    /// Playlist a player should open.
    pub entry_playlist: PathBuf,
    /// Every media playlist written, in rendition order.
    pub media_playlists: Vec<PathBuf>,
}

/// Produces HLS renditions for a plan.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Encode `input` according to `plan` into `layout`.
    ///
    /// Implementations must stop promptly and report
    /// [`EncodeError::Cancelled`] once `cancel` fires.
    async fn encode(
        &self,
        input: &Path,
        plan: &EncodingPlan,
        layout: &OutputLayout,
        cancel: &CancellationToken,
    ) -> Result<EncodeOutput, EncodeError>;
}
