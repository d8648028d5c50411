//! Pipeline configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! tool overrides and every transcoding tunable. Every section defaults
//! sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub transcode: TranscodeConfig,
}

impl Config {
    /// Parse a JSON document. Missing sections and fields take defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::validation(format!("config parse error: {e}")))
    }

    /// Read `path` if given. A file that cannot be read or parsed is logged
    /// and replaced by the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("{} not found, using default config", path.display());
                return Self::default();
            }
            Err(e) => {
                tracing::warn!("cannot read config {}: {e}", path.display());
                return Self::default();
            }
        };

        Self::from_json(&text).unwrap_or_else(|e| {
            tracing::warn!("ignoring config {}: {e}", path.display());
            Self::default()
        })
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        self.transcode.validate()
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// One entry of the reference bitrate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RungConfig {
    /// Rung height in pixels.
    pub height: u32,
    /// Peak bitrate ceiling in bits per second.
    pub max_bitrate_bps: u64,
}

impl RungConfig {
    pub const fn new(height: u32, max_bitrate_bps: u64) -> Self {
        Self {
            height,
            max_bitrate_bps,
        }
    }
}

/// Reference ladder: 720p/5 Mbps, 1080p/8 Mbps, 1440p/16 Mbps.
///
/// Players expect exactly these ceilings; do not derive them.
pub const DEFAULT_LADDER: [RungConfig; 3] = [
    RungConfig::new(720, 5_000_000),
    RungConfig::new(1080, 8_000_000),
    RungConfig::new(1440, 16_000_000),
];

/// Transcoding tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Inputs at or below this size (MiB) get a single rendition.
    pub size_threshold_mb: u64,
    /// Number of ladder rungs for large inputs.
    pub max_rungs: usize,
    /// Reference bitrate table, ascending by height.
    pub ladder: Vec<RungConfig>,
    /// HLS target segment duration in seconds.
    pub segment_duration_secs: u32,
    /// GOP size in frames.
    pub keyframe_interval: u32,
    /// x264 constant rate factor.
    pub crf: u32,
    /// x264 preset.
    pub preset: String,
    /// Encoder thread count.
    pub threads: u32,
    /// Bitrate for the AAC fallback track.
    pub audio_bitrate: String,
    /// Optional deadline for the encoder process; none by default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encode_timeout_secs: Option<u64>,
    /// Deadline for the ffprobe call.
    pub probe_timeout_secs: u64,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            size_threshold_mb: 50,
            max_rungs: 2,
            ladder: DEFAULT_LADDER.to_vec(),
            segment_duration_secs: 10,
            keyframe_interval: 48,
            crf: 23,
            preset: "veryfast".into(),
            threads: 4,
            audio_bitrate: "128k".into(),
            encode_timeout_secs: None,
            probe_timeout_secs: 30,
        }
    }
}

impl TranscodeConfig {
    /// Encoder deadline as a [`Duration`], if configured.
    pub fn encode_timeout(&self) -> Option<Duration> {
        self.encode_timeout_secs.map(Duration::from_secs)
    }

    /// Probe deadline as a [`Duration`].
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.ladder.is_empty() {
            warnings.push("transcode.ladder is empty; large inputs cannot be encoded".into());
        }

        if self.max_rungs == 0 {
            warnings.push("transcode.max_rungs is 0; large inputs cannot be encoded".into());
        } else if self.max_rungs > self.ladder.len() {
            warnings.push(format!(
                "transcode.max_rungs ({}) exceeds the ladder size ({}); all rungs will be used",
                self.max_rungs,
                self.ladder.len()
            ));
        }

        if self.ladder.windows(2).any(|w| w[0].height >= w[1].height) {
            warnings.push(
                "transcode.ladder is not strictly ascending by height; it will be sorted".into(),
            );
        }

        for (i, rung) in self.ladder.iter().enumerate() {
            if rung.height == 0 || rung.height % 2 != 0 {
                warnings.push(format!(
                    "transcode.ladder[{i}].height {} is not a positive even number",
                    rung.height
                ));
            }
            if rung.max_bitrate_bps == 0 {
                warnings.push(format!("transcode.ladder[{i}].max_bitrate_bps is 0"));
            }
        }

        if self.segment_duration_secs == 0 {
            warnings.push("transcode.segment_duration_secs is 0".into());
        }
        if self.keyframe_interval == 0 {
            warnings.push("transcode.keyframe_interval is 0".into());
        }
        if self.crf > 51 {
            warnings.push(format!(
                "transcode.crf {} is outside the x264 range 0..=51",
                self.crf
            ));
        }
        if self.threads == 0 {
            warnings.push("transcode.threads is 0; the encoder will pick a thread count".into());
        }
        if self.preset.trim().is_empty() {
            warnings.push("transcode.preset is empty".into());
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_matches_reference_values() {
        let cfg = Config::default();
        let t = &cfg.transcode;
        assert_eq!(t.size_threshold_mb, 50);
        assert_eq!(t.max_rungs, 2);
        assert_eq!(t.segment_duration_secs, 10);
        assert_eq!(t.keyframe_interval, 48);
        assert_eq!(t.crf, 23);
        assert_eq!(t.threads, 4);
        assert_eq!(t.encode_timeout(), None);
        assert_eq!(
            t.ladder,
            vec![
                RungConfig::new(720, 5_000_000),
                RungConfig::new(1080, 8_000_000),
                RungConfig::new(1440, 16_000_000),
            ]
        );
    }

    #[test]
    fn default_config_no_warnings() {
        let warnings = Config::default().validate();
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn parse_empty_json_uses_defaults() {
        let cfg = Config::from_json("{}").unwrap();
        assert_eq!(cfg.transcode.max_rungs, 2);
        assert!(cfg.tools.ffmpeg_path.is_none());
    }

    #[test]
    fn parse_partial_transcode_section() {
        let json = r#"{"transcode": {"max_rungs": 3, "threads": 8, "encode_timeout_secs": 600}}"#;
        let cfg = Config::from_json(json).unwrap();
        assert_eq!(cfg.transcode.max_rungs, 3);
        assert_eq!(cfg.transcode.threads, 8);
        assert_eq!(cfg.transcode.crf, 23);
        assert_eq!(
            cfg.transcode.encode_timeout(),
            Some(Duration::from_secs(600))
        );
    }

    #[test]
    fn parse_invalid_json_is_validation_error() {
        let err = Config::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn load_or_default_with_none() {
        let cfg = Config::load_or_default(None);
        assert_eq!(cfg.transcode.size_threshold_mb, 50);
    }

    #[test]
    fn load_or_default_with_missing_file() {
        let cfg = Config::load_or_default(Some(Path::new("/nonexistent/vodforge.json")));
        assert_eq!(cfg.transcode.size_threshold_mb, 50);
    }

    #[test]
    fn load_or_default_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"transcode": {{"size_threshold_mb": 10}}}}"#).unwrap();
        let cfg = Config::load_or_default(Some(file.path()));
        assert_eq!(cfg.transcode.size_threshold_mb, 10);
    }

    #[test]
    fn unsorted_ladder_warns() {
        let mut cfg = Config::default();
        cfg.transcode.ladder = vec![
            RungConfig::new(1080, 8_000_000),
            RungConfig::new(720, 5_000_000),
        ];
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("ascending")));
    }

    #[test]
    fn odd_rung_height_warns() {
        let mut cfg = Config::default();
        cfg.transcode.ladder.push(RungConfig::new(2161, 20_000_000));
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("ladder[3].height")));
    }

    #[test]
    fn oversized_max_rungs_and_bad_crf_warn() {
        let mut cfg = Config::default();
        cfg.transcode.max_rungs = 5;
        cfg.transcode.crf = 60;
        cfg.transcode.threads = 0;
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("max_rungs")));
        assert!(warnings.iter().any(|w| w.contains("crf")));
        assert!(warnings.iter().any(|w| w.contains("threads")));
    }
}
