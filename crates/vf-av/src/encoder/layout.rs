//! On-disk layout of an HLS asset.
//!
//! ```text
//! <root>/master.m3u8             (multi-stream only)
//! <root>/v0/index.m3u8           (single-stream)
//! <root>/vN/prog_index.m3u8      (multi-stream, one per rung)
//! <root>/vN/segment_000.ts ...
//! ```
//!
//! Index `N` is the rung's position in the plan, so `vN` always pairs with
//! the N-th rendition's resolution and bitrate.

use std::path::{Path, PathBuf};

use vf_core::{EncodeError, EncodingPlan};
use vf_hls::{generate_master_playlist, MasterPlaylist, Variant};

/// Master playlist file name.
pub const MASTER_PLAYLIST: &str = "master.m3u8";
/// Media playlist name for a single-stream asset.
pub const SINGLE_PLAYLIST: &str = "index.m3u8";
/// Media playlist name inside each ladder rendition directory.
pub const VARIANT_PLAYLIST: &str = "prog_index.m3u8";
/// printf-style segment file pattern handed to the encoder.
pub const SEGMENT_PATTERN: &str = "segment_%03d.ts";

/// Paths of every file a plan produces under one output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    /// Layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout rooted in the directory containing `input`.
    pub fn beside(input: &Path) -> Self {
        let root = match input.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/v<index>`.
    pub fn rendition_dir(&self, index: usize) -> PathBuf {
        self.root.join(format!("v{index}"))
    }

    pub fn master_playlist(&self) -> PathBuf {
        self.root.join(MASTER_PLAYLIST)
    }

    /// Media playlist of rendition `index` under `plan`.
    pub fn media_playlist(&self, plan: &EncodingPlan, index: usize) -> PathBuf {
        let name = if plan.is_multi() {
            VARIANT_PLAYLIST
        } else {
            SINGLE_PLAYLIST
        };
        self.rendition_dir(index).join(name)
    }

    /// Playlist a player should open: the master for a ladder, otherwise
    /// `v0/index.m3u8`.
    pub fn entry_playlist(&self, plan: &EncodingPlan) -> PathBuf {
        if plan.is_multi() {
            self.master_playlist()
        } else {
            self.media_playlist(plan, 0)
        }
    }

    /// Every media playlist the plan declares, in rendition order.
    pub fn media_playlists(&self, plan: &EncodingPlan) -> Vec<PathBuf> {
        (0..plan.rendition_count())
            .map(|i| self.media_playlist(plan, i))
            .collect()
    }

    /// Create `v0..vN-1`. Existing directories are reused, so re-running a
    /// plan overwrites in place.
    pub async fn prepare(&self, plan: &EncodingPlan) -> Result<Vec<PathBuf>, EncodeError> {
        let mut dirs = Vec::with_capacity(plan.rendition_count());
        for index in 0..plan.rendition_count() {
            let dir = self.rendition_dir(index);
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| EncodeError::io(format!("creating {}", dir.display()), e))?;
            dirs.push(dir);
        }
        Ok(dirs)
    }

    /// Master playlist model for a ladder plan; `None` for single-stream.
    pub fn master_for(&self, plan: &EncodingPlan) -> Option<MasterPlaylist> {
        if !plan.is_multi() {
            return None;
        }
        let variants = plan
            .renditions()
            .iter()
            .enumerate()
            .map(|(index, rendition)| Variant {
                bandwidth_bps: rendition.max_bitrate_bps,
                resolution: Some(rendition.resolution()),
                codecs: None,
                uri: format!("v{index}/{VARIANT_PLAYLIST}"),
            })
            .collect();
        Some(MasterPlaylist { variants })
    }

    /// Write `master.m3u8` for a ladder plan. No-op for single-stream.
    pub async fn write_master(&self, plan: &EncodingPlan) -> Result<(), EncodeError> {
        let Some(master) = self.master_for(plan) else {
            return Ok(());
        };
        let path = self.master_playlist();
        tokio::fs::write(&path, generate_master_playlist(&master))
            .await
            .map_err(|e| EncodeError::io(format!("writing {}", path.display()), e))?;
        tracing::debug!("Wrote {}", path.display());
        Ok(())
    }
}
