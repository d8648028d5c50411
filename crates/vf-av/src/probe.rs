//! Media probing.
//!
//! [`FfprobeProber`] shells out to
//! `ffprobe -v error -print_format json -show_streams` and reduces the JSON
//! to a [`MediaProbe`]: the display resolution of the first real video stream
//! and whether any audio stream exists.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use vf_core::{MediaProbe, ProbeError, ToolError};

use crate::command::ToolCommand;

/// Extracts the stream facts the planner needs from an input file.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Inspect `path`, stopping early once `cancel` fires.
    ///
    /// # Errors
    ///
    /// - [`ProbeError::Unreadable`] if the file is missing, empty, or cannot
    ///   be parsed as media.
    /// - [`ProbeError::NoVideoStream`] if no video stream is present.
    /// - [`ProbeError::Cancelled`] if `cancel` fired first.
    async fn probe(&self, path: &Path, cancel: &CancellationToken)
        -> Result<MediaProbe, ProbeError>;
}

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    /// Create a new prober using the given ffprobe path and deadline.
    pub fn new(ffprobe_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffprobe_path,
            timeout,
        }
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn probe(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<MediaProbe, ProbeError> {
        check_input(path).await?;

        let output = ToolCommand::new(self.ffprobe_path.clone())
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(path.to_string_lossy())
            .timeout(self.timeout)
            .cancel_on(cancel.clone())
            .execute()
            .await
            .map_err(|e| match e {
                ToolError::Cancelled { .. } => ProbeError::Cancelled {
                    path: path.to_path_buf(),
                },
                other => ProbeError::unreadable(path, other),
            })?;

        let probe = parse_ffprobe_json(path, &output.stdout)?;
        tracing::debug!(
            "Probed {}: {}x{}, audio={}",
            path.display(),
            probe.width,
            probe.height,
            probe.has_audio
        );
        Ok(probe)
    }
}

/// Reject missing, non-regular, and zero-length inputs before spawning
/// anything.
pub async fn check_input(path: &Path) -> Result<u64, ProbeError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| ProbeError::unreadable(path, e))?;
    if !meta.is_file() {
        return Err(ProbeError::unreadable(path, "not a regular file"));
    }
    if meta.len() == 0 {
        return Err(ProbeError::unreadable(path, "file is empty"));
    }
    Ok(meta.len())
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    disposition: FfprobeDisposition,
    #[serde(default)]
    tags: FfprobeTags,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    attached_pic: u8,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

impl FfprobeStream {
    fn is(&self, codec_type: &str) -> bool {
        self.codec_type.as_deref() == Some(codec_type)
    }

    /// Display rotation in degrees, from the display matrix or the legacy
    /// `rotate` tag.
    fn rotation(&self) -> Option<f64> {
        self.side_data_list
            .iter()
            .find_map(|sd| sd.rotation)
            .or_else(|| self.tags.rotate.as_deref()?.trim().parse().ok())
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Reduce ffprobe's JSON to a [`MediaProbe`].
///
/// Cover art (`attached_pic`) is not a video stream. Quarter-turn rotation
/// swaps the reported dimensions, since the encoder applies it before
/// scaling.
pub fn parse_ffprobe_json(path: &Path, json: &str) -> Result<MediaProbe, ProbeError> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| ProbeError::unreadable(path, format!("ffprobe JSON parse error: {e}")))?;

    let video = output
        .streams
        .iter()
        .find(|s| s.is("video") && s.disposition.attached_pic == 0)
        .ok_or_else(|| ProbeError::NoVideoStream {
            path: path.to_path_buf(),
        })?;

    // A stream without a usable picture size is no video stream at all.
    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(ProbeError::NoVideoStream {
                path: path.to_path_buf(),
            })
        }
    };

    let (width, height) = match video.rotation() {
        Some(deg) if is_quarter_turn(deg) => (height, width),
        _ => (width, height),
    };

    Ok(MediaProbe {
        width,
        height,
        has_audio: output.streams.iter().any(|s| s.is("audio")),
    })
}

fn is_quarter_turn(degrees: f64) -> bool {
    (degrees.round() as i64).rem_euclid(180) == 90
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn parse(json: &str) -> Result<MediaProbe, ProbeError> {
        parse_ffprobe_json(Path::new("/uploads/clip.mp4"), json)
    }

    #[test]
    fn landscape_with_audio() {
        let json = r#"{
            "streams": [
                {"index": 0, "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080},
                {"index": 1, "codec_type": "audio", "codec_name": "aac", "channels": 2}
            ]
        }"#;
        assert_eq!(
            parse(json).unwrap(),
            MediaProbe {
                width: 1920,
                height: 1080,
                has_audio: true
            }
        );
    }

    #[test]
    fn video_only() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 1280, "height": 720}]}"#;
        assert!(!parse(json).unwrap().has_audio);
    }

    #[test]
    fn first_video_stream_wins() {
        let json = r#"{"streams": [
            {"codec_type": "audio"},
            {"codec_type": "video", "width": 3840, "height": 2160},
            {"codec_type": "video", "width": 640, "height": 360}
        ]}"#;
        assert_eq!(parse(json).unwrap().resolution(), (3840, 2160));
    }

    #[test]
    fn cover_art_is_skipped() {
        let json = r#"{"streams": [
            {"codec_type": "video", "codec_name": "mjpeg", "width": 600, "height": 600, "disposition": {"attached_pic": 1}},
            {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080, "disposition": {"attached_pic": 0}}
        ]}"#;
        assert_eq!(parse(json).unwrap().resolution(), (1920, 1080));
    }

    #[test]
    fn rotated_phone_capture_reports_display_size() {
        let json = r#"{"streams": [{
            "codec_type": "video", "width": 1920, "height": 1080,
            "side_data_list": [{"side_data_type": "Display Matrix", "displaymatrix": "...", "rotation": -90}]
        }]}"#;
        let probe = parse(json).unwrap();
        assert_eq!(probe.resolution(), (1080, 1920));
        assert!(probe.is_portrait());

        let legacy = r#"{"streams": [{"codec_type": "video", "width": 1920, "height": 1080, "tags": {"rotate": "270"}}]}"#;
        assert_eq!(parse(legacy).unwrap().resolution(), (1080, 1920));

        let upside_down = r#"{"streams": [{"codec_type": "video", "width": 1920, "height": 1080, "tags": {"rotate": "180"}}]}"#;
        assert_eq!(parse(upside_down).unwrap().resolution(), (1920, 1080));
    }

    #[test]
    fn audio_only_has_no_video_stream() {
        let json = r#"{"streams": [{"codec_type": "audio"}]}"#;
        assert_matches!(parse(json), Err(ProbeError::NoVideoStream { .. }));
        assert_matches!(parse("{}"), Err(ProbeError::NoVideoStream { .. }));
    }

    #[test]
    fn garbage_is_unreadable() {
        assert_matches!(parse("not json"), Err(ProbeError::Unreadable { ref reason, .. }) if reason.contains("JSON"));
    }

    #[test]
    fn dimensionless_video_is_no_video_stream() {
        let no_dims = r#"{"streams": [{"codec_type": "video"}]}"#;
        assert_matches!(parse(no_dims), Err(ProbeError::NoVideoStream { .. }));
        let zero = r#"{"streams": [{"codec_type": "video", "width": 1920, "height": 0}]}"#;
        assert_matches!(parse(zero), Err(ProbeError::NoVideoStream { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_unreadable() {
        let prober = FfprobeProber::new(PathBuf::from("ffprobe"), Duration::from_secs(5));
        let result = prober
            .probe(Path::new("/nonexistent/upload.mp4"), &CancellationToken::new())
            .await;
        assert_matches!(result, Err(ProbeError::Unreadable { .. }));
    }

    #[tokio::test]
    async fn empty_file_is_unreadable_without_spawning() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let prober = FfprobeProber::new(
            PathBuf::from("nonexistent_ffprobe_xyz"),
            Duration::from_secs(5),
        );
        let result = prober.probe(file.path(), &CancellationToken::new()).await;
        assert_matches!(result, Err(ProbeError::Unreadable { ref reason, .. }) if reason == "file is empty");
    }

    #[tokio::test]
    async fn already_cancelled_probe_reports_cancelled() {
        use std::io::Write;

        let mut upload = tempfile::NamedTempFile::new().unwrap();
        upload.write_all(b"\x00\x00\x00\x18ftypmp42").unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let prober = FfprobeProber::new(PathBuf::from("ffprobe"), Duration::from_secs(30));
        assert_matches!(
            prober.probe(upload.path(), &token).await,
            Err(ProbeError::Cancelled { ref path }) if path == upload.path()
        );
    }

    #[tokio::test]
    async fn directory_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            check_input(dir.path()).await,
            Err(ProbeError::Unreadable { ref reason, .. }) if reason == "not a regular file"
        );
    }
}
