//! ffmpeg-backed [`Encoder`].
//!
//! Single-stream plans map the source video (and audio) straight into one
//! HLS output. Ladder plans split the decoded video once, scale each branch,
//! and let the HLS muxer fan out into `v%v` directories via
//! `-var_stream_map`. The master playlist is written afterwards from the
//! plan so its BANDWIDTH values are the configured ceilings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use vf_core::config::TranscodeConfig;
use vf_core::{EncodeError, EncodingPlan, PlanStrategy, RenditionSpec};

use super::layout::{OutputLayout, SEGMENT_PATTERN, SINGLE_PLAYLIST, VARIANT_PLAYLIST};
use super::{EncodeOutput, Encoder};
use crate::command::ToolCommand;

/// Source-size scale for the single rendition. libx264 needs even
/// dimensions for 4:2:0; odd sizes round up, as ladder widths do.
const EVEN_SCALE: &str = "scale=ceil(iw/2)*2:ceil(ih/2)*2";

/// Encoder tunables shared by every rendition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    pub preset: String,
    pub crf: u32,
    /// GOP length in frames; also the minimum keyframe interval.
    pub keyframe_interval: u32,
    pub segment_duration_secs: u32,
    pub threads: u32,
    /// Bitrate of the AAC track used when the source has no audio to copy.
    pub audio_bitrate: String,
    pub timeout: Option<Duration>,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self::from(&TranscodeConfig::default())
    }
}

impl From<&TranscodeConfig> for EncoderSettings {
    fn from(cfg: &TranscodeConfig) -> Self {
        Self {
            preset: cfg.preset.clone(),
            crf: cfg.crf,
            keyframe_interval: cfg.keyframe_interval,
            segment_duration_secs: cfg.segment_duration_secs,
            threads: cfg.threads,
            audio_bitrate: cfg.audio_bitrate.clone(),
            timeout: cfg.encode_timeout(),
        }
    }
}

/// Runs one ffmpeg process per plan.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg_path: PathBuf,
    settings: EncoderSettings,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg_path: PathBuf, settings: EncoderSettings) -> Self {
        Self {
            ffmpeg_path,
            settings,
        }
    }

    /// Full ffmpeg argument list for `plan`. Pure; touches no files.
    pub fn build_args(
        &self,
        input: &Path,
        plan: &EncodingPlan,
        layout: &OutputLayout,
    ) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into(), "-hide_banner".into(), "-nostats".into()];
        args.extend(["-i".into(), path_arg(input)]);

        match &plan.strategy {
            PlanStrategy::SingleStream => {
                args.extend(["-map".into(), "0:v:0".into()]);
                if plan.has_audio {
                    args.extend(["-map".into(), "0:a:0".into()]);
                }
                args.extend(["-vf".into(), EVEN_SCALE.into()]);
                self.push_codec_args(&mut args, plan);
                self.push_hls_args(&mut args);

                let dir = layout.rendition_dir(0);
                args.extend([
                    "-hls_segment_filename".into(),
                    path_arg(&dir.join(SEGMENT_PATTERN)),
                    path_arg(&dir.join(SINGLE_PLAYLIST)),
                ]);
            }
            PlanStrategy::MultiStream(renditions) => {
                args.extend(["-filter_complex".into(), filter_graph(renditions)]);
                for index in 0..renditions.len() {
                    args.extend(["-map".into(), format!("[vout{index}]")]);
                    if plan.has_audio {
                        args.extend(["-map".into(), "0:a:0".into()]);
                    }
                }
                self.push_codec_args(&mut args, plan);
                for (index, rendition) in renditions.iter().enumerate() {
                    args.extend([
                        format!("-maxrate:v:{index}"),
                        rendition.max_bitrate_bps.to_string(),
                        format!("-bufsize:v:{index}"),
                        rendition.bufsize_bps().to_string(),
                    ]);
                }
                self.push_hls_args(&mut args);

                let pattern = layout.root().join("v%v");
                args.extend([
                    "-hls_segment_filename".into(),
                    path_arg(&pattern.join(SEGMENT_PATTERN)),
                    "-var_stream_map".into(),
                    var_stream_map(renditions.len(), plan.has_audio),
                    path_arg(&pattern.join(VARIANT_PLAYLIST)),
                ]);
            }
        }

        args
    }

    fn push_codec_args(&self, args: &mut Vec<String>, plan: &EncodingPlan) {
        let s = &self.settings;
        args.extend([
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            s.preset.clone(),
            "-crf".into(),
            s.crf.to_string(),
            "-g".into(),
            s.keyframe_interval.to_string(),
            "-keyint_min".into(),
            s.keyframe_interval.to_string(),
            "-sc_threshold".into(),
            "0".into(),
        ]);
        if plan.has_audio {
            args.extend(["-c:a".into(), "copy".into()]);
        } else {
            args.extend([
                "-c:a".into(),
                "aac".into(),
                "-b:a".into(),
                s.audio_bitrate.clone(),
            ]);
        }
        args.extend(["-threads".into(), s.threads.to_string()]);
    }

    fn push_hls_args(&self, args: &mut Vec<String>) {
        args.extend([
            "-f".into(),
            "hls".into(),
            "-hls_time".into(),
            self.settings.segment_duration_secs.to_string(),
            "-hls_list_size".into(),
            "0".into(),
            "-hls_playlist_type".into(),
            "vod".into(),
        ]);
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn encode(
        &self,
        input: &Path,
        plan: &EncodingPlan,
        layout: &OutputLayout,
        cancel: &CancellationToken,
    ) -> Result<EncodeOutput, EncodeError> {
        if cancel.is_cancelled() {
            return Err(EncodeError::Cancelled);
        }

        layout.prepare(plan).await?;

        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.args(self.build_args(input, plan, layout))
            .cancel_on(cancel.clone());
        if let Some(timeout) = self.settings.timeout {
            cmd.timeout(timeout);
        }

        tracing::info!(
            "Encoding {} into {} rendition(s) under {}",
            input.display(),
            plan.rendition_count(),
            layout.root().display()
        );
        cmd.execute().await?;

        layout.write_master(plan).await?;

        Ok(EncodeOutput {
            entry_playlist: layout.entry_playlist(plan),
            media_playlists: layout.media_playlists(plan),
        })
    }
}

/// `[0:v:0]split=N[vs0]...;[vs0]scale=W:H[vout0];...`
fn filter_graph(renditions: &[RenditionSpec]) -> String {
    let splits: String = (0..renditions.len()).map(|i| format!("[vs{i}]")).collect();
    let mut graph = format!("[0:v:0]split={}{splits}", renditions.len());
    for (index, rendition) in renditions.iter().enumerate() {
        graph.push_str(&format!(
            ";[vs{index}]scale={}:{}[vout{index}]",
            rendition.computed_width, rendition.target_height
        ));
    }
    graph
}

/// `v:0,a:0 v:1,a:1 ...`, or `v:0 v:1 ...` without audio.
fn var_stream_map(count: usize, has_audio: bool) -> String {
    (0..count)
        .map(|i| {
            if has_audio {
                format!("v:{i},a:{i}")
            } else {
                format!("v:{i}")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
